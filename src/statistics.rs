// Read-only aggregates over the catalog and the orders

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::catalog::bevanda_custom::BEVANDA_CUSTOM;
use crate::catalog::bevanda_standard::{BEVANDA_STANDARD, VENDIBILE};
use crate::catalog::dolce::DOLCE;
use crate::catalog::models::TipoArticolo;
use crate::error::{RepoResult, RepositoryError};
use crate::orders::status_workflow::StatusWorkflow;
use crate::pricing::PriceCalculator;
use crate::repository::check_date_range;
use crate::response::SingleResponse;
use crate::store::SelectBuilder;

/// Items of one kind and how many of them can be sold right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiepilogoTipo {
    pub tipo: TipoArticolo,
    pub totale: i64,
    pub disponibili: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiepilogoCatalogo {
    pub per_tipo: Vec<RiepilogoTipo>,
    pub totale: i64,
    pub disponibili: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConteggioPerPriorita {
    pub priorita: i32,
    pub conteggio: i64,
}

/// Orders currently sitting in one state; states with no orders are included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConteggioPerStato {
    pub stato_ordine_id: i64,
    pub stato_ordine: String,
    pub conteggio: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiepilogoPeriodo {
    pub ordini: i64,
    pub totale: Decimal,
}

/// Statistics over the shop data
#[derive(Clone)]
pub struct StatisticsRepository {
    pool: SqlitePool,
}

impl StatisticsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Counts per article kind. Custom drinks are made to order, so every
    /// one of them counts as available.
    pub async fn riepilogo_catalogo(&self) -> RepoResult<SingleResponse<RiepilogoCatalogo>> {
        let bevande_standard = RiepilogoTipo {
            tipo: TipoArticolo::BevandaStandard,
            totale: SelectBuilder::new(BEVANDA_STANDARD).count(&self.pool).await?,
            disponibili: SelectBuilder::new(BEVANDA_STANDARD)
                .filter(VENDIBILE)
                .count(&self.pool)
                .await?,
        };
        let bevande_custom = SelectBuilder::new(BEVANDA_CUSTOM).count(&self.pool).await?;
        let dolci = RiepilogoTipo {
            tipo: TipoArticolo::Dolce,
            totale: SelectBuilder::new(DOLCE).count(&self.pool).await?,
            disponibili: SelectBuilder::new(DOLCE)
                .eq("disponibile", true)
                .count(&self.pool)
                .await?,
        };

        let per_tipo = vec![
            bevande_standard,
            RiepilogoTipo {
                tipo: TipoArticolo::BevandaCustom,
                totale: bevande_custom,
                disponibili: bevande_custom,
            },
            dolci,
        ];
        let riepilogo = RiepilogoCatalogo {
            totale: per_tipo.iter().map(|t| t.totale).sum(),
            disponibili: per_tipo.iter().map(|t| t.disponibili).sum(),
            per_tipo,
        };

        tracing::debug!("Catalog summary: {} items", riepilogo.totale);
        Ok(SingleResponse::ok(riepilogo, "Riepilogo catalogo calcolato"))
    }

    /// Desserts per priority, highest priority first
    pub async fn dolci_per_priorita(&self) -> RepoResult<SingleResponse<Vec<ConteggioPerPriorita>>> {
        let rows = sqlx::query_as::<_, ConteggioPerPriorita>(
            r#"
            SELECT priorita, COUNT(*) AS conteggio
            FROM dolce
            GROUP BY priorita
            ORDER BY priorita DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(SingleResponse::ok(rows, "Dolci per priorità calcolati"))
    }

    /// Orders per state, in workflow order
    pub async fn ordini_per_stato(&self) -> RepoResult<SingleResponse<Vec<ConteggioPerStato>>> {
        let mut rows = sqlx::query_as::<_, ConteggioPerStato>(
            r#"
            SELECT s.stato_ordine_id, s.stato_ordine, COUNT(o.ordine_id) AS conteggio
            FROM stato_ordine s
            LEFT JOIN ordine o ON o.stato_ordine_id = s.stato_ordine_id
            GROUP BY s.stato_ordine_id, s.stato_ordine
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.sort_by(|a, b| StatusWorkflow::compare_stati_ordine(&a.stato_ordine, &b.stato_ordine));
        Ok(SingleResponse::ok(rows, "Ordini per stato calcolati"))
    }

    /// Number of orders created in `[start, end]` and the sum of their totals.
    ///
    /// # Errors
    /// `RepositoryError::InvalidArgument` when `end < start` or `end` is in the future.
    pub async fn ordini_nel_periodo(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<SingleResponse<RiepilogoPeriodo>> {
        check_date_range(start, end)?;

        let totali: Vec<f64> = sqlx::query_scalar(
            "SELECT totale FROM ordine WHERE data_creazione >= ? AND data_creazione <= ?",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let importi = totali
            .iter()
            .map(|totale| PriceCalculator::from_stored(*totale))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                tracing::error!("Stored order total cannot be read: {}", err);
                RepositoryError::data_integrity(format!("Totale ordine non valido: {err}"))
            })?;

        let riepilogo = RiepilogoPeriodo {
            ordini: importi.len() as i64,
            totale: PriceCalculator::calculate_total(&importi),
        };
        Ok(SingleResponse::ok(riepilogo, "Riepilogo ordini calcolato"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_catalog_summary_counts_availability() {
        let db = TestDb::new().await;
        let stats = StatisticsRepository::new(db.pool.clone());
        db.dolce("Mochi", 3.0).await;
        let finito = db.dolce("Cheesecake", 4.0).await;
        sqlx::query("UPDATE dolce SET disponibile = 0 WHERE articolo_id = ?")
            .bind(finito)
            .execute(&db.pool)
            .await
            .unwrap();

        let riepilogo = stats.riepilogo_catalogo().await.unwrap().data.unwrap();
        assert_eq!(riepilogo.totale, 2);
        assert_eq!(riepilogo.disponibili, 1);
        let dolci = riepilogo
            .per_tipo
            .iter()
            .find(|t| t.tipo == TipoArticolo::Dolce)
            .unwrap();
        assert_eq!((dolci.totale, dolci.disponibili), (2, 1));
    }

    #[tokio::test]
    async fn test_desserts_grouped_by_priority() {
        let db = TestDb::new().await;
        let stats = StatisticsRepository::new(db.pool.clone());
        db.dolce("Mochi", 3.0).await;
        db.dolce("Babà", 3.0).await;
        let alta = db.dolce("Tiramisù", 4.0).await;
        sqlx::query("UPDATE dolce SET priorita = 8 WHERE articolo_id = ?")
            .bind(alta)
            .execute(&db.pool)
            .await
            .unwrap();

        let gruppi = stats.dolci_per_priorita().await.unwrap().data.unwrap();
        assert_eq!(
            gruppi,
            vec![
                ConteggioPerPriorita { priorita: 8, conteggio: 1 },
                ConteggioPerPriorita { priorita: 1, conteggio: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_orders_per_state_in_workflow_order() {
        let db = TestDb::seeded().await;
        let stats = StatisticsRepository::new(db.pool.clone());
        let cliente = db.cliente_pronto().await;
        let pronto = db.stato_ordine_id("pronto").await;
        let non_pagato = db.stato_pagamento_id("non_pagato").await;
        db.ordine(cliente, pronto, non_pagato).await;
        db.ordine(cliente, pronto, non_pagato).await;

        let stati = stats.ordini_per_stato().await.unwrap().data.unwrap();
        assert_eq!(stati.len(), 7);
        assert_eq!(stati[0].stato_ordine, "bozza");
        assert_eq!(stati[0].conteggio, 0);
        assert_eq!(stati[4].stato_ordine, "pronto");
        assert_eq!(stati[4].conteggio, 2);
    }

    #[tokio::test]
    async fn test_orders_in_period() {
        let db = TestDb::seeded().await;
        let stats = StatisticsRepository::new(db.pool.clone());
        let start = Utc::now() - Duration::hours(1);
        let cliente = db.cliente_pronto().await;
        let bozza = db.stato_ordine_id("bozza").await;
        let non_pagato = db.stato_pagamento_id("non_pagato").await;
        let ordine = db.ordine(cliente, bozza, non_pagato).await;
        sqlx::query("UPDATE ordine SET totale = 12.5 WHERE ordine_id = ?")
            .bind(ordine)
            .execute(&db.pool)
            .await
            .unwrap();
        db.ordine(cliente, bozza, non_pagato).await;

        let riepilogo = stats
            .ordini_nel_periodo(start, Utc::now())
            .await
            .unwrap()
            .data
            .unwrap();
        assert_eq!(riepilogo.ordini, 2);
        assert_eq!(riepilogo.totale, dec!(12.50));

        let inverted = stats.ordini_nel_periodo(Utc::now(), start).await;
        assert!(matches!(inverted, Err(RepositoryError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_unreadable_stored_total_is_a_data_error() {
        let db = TestDb::seeded().await;
        let stats = StatisticsRepository::new(db.pool.clone());
        let start = Utc::now() - Duration::hours(1);
        let cliente = db.cliente_pronto().await;
        let bozza = db.stato_ordine_id("bozza").await;
        let non_pagato = db.stato_pagamento_id("non_pagato").await;
        let ordine = db.ordine(cliente, bozza, non_pagato).await;
        // 9e999 overflows to an infinite REAL
        sqlx::query("UPDATE ordine SET totale = 9e999 WHERE ordine_id = ?")
            .bind(ordine)
            .execute(&db.pool)
            .await
            .unwrap();

        let result = stats.ordini_nel_periodo(start, Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::DataIntegrity(_))));
    }
}
