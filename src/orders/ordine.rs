use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{RepoResult, RepositoryError};
use crate::guards::{DeletePlan, Dependency, DependencyGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::orders::models::{Ordine, OrdineDto};
use crate::orders::stato_ordine::{self, STATO_ORDINE};
use crate::orders::stato_pagamento::{self, STATO_PAGAMENTO};
use crate::orders::status_workflow::StatusWorkflow;
use crate::pagination::PageWindow;
use crate::pricing::PriceCalculator;
use crate::repository::{self, check_date_range, missing_reference, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, SqlValue, TableSpec};
use crate::validation::{validate_dto, validate_id};
use crate::venue::{CLIENTE, CLIENTE_LABEL};

pub const ORDINE: TableSpec = TableSpec {
    table: "ordine",
    id_column: "ordine_id",
    columns: "ordine_id, cliente_id, stato_ordine_id, stato_pagamento_id, sessione_id, totale, \
              priorita, data_creazione, data_aggiornamento",
};

pub const LABEL: Label = Label::maschile("Ordine", "un ordine");

/// Order lines go only on a forced delete. The status history belongs to
/// the order and is always removed with it.
const DEPENDENCIES: &[Dependency] = &[Dependency::new("order_item", "ordine_id", "righe d'ordine")];

/// Everything an order row takes with it when a parent cascades into it
const PER_ORDINE: &[Dependency] = &[
    Dependency::new("order_item", "ordine_id", "righe d'ordine"),
    Dependency::new("stato_storico_ordine", "ordine_id", "storico stati ordine"),
];

/// Orders referencing a parent through `column`, removed with their lines
/// and history.
pub(crate) const fn ordini(column: &'static str) -> Dependency {
    Dependency::new("ordine", column, "ordini").with_nested("ordine_id", PER_ORDINE)
}

const GUARD: DependencyGuard = DependencyGuard::new(DEPENDENCIES);

const ORDINAMENTO: &str = "data_creazione DESC, ordine_id DESC";

fn references(dto: &OrdineDto) -> [Reference; 3] {
    [
        Reference::new(CLIENTE, CLIENTE_LABEL, dto.cliente_id),
        Reference::new(STATO_ORDINE, stato_ordine::LABEL, dto.stato_ordine_id),
        Reference::new(STATO_PAGAMENTO, stato_pagamento::LABEL, dto.stato_pagamento_id),
    ]
}

/// Recomputes `ordine.totale` as the rounded sum of its lines' tax-inclusive totals.
pub(crate) async fn aggiorna_totale(
    conn: &mut SqliteConnection,
    ordine_id: i64,
    now: DateTime<Utc>,
) -> RepoResult<Decimal> {
    let righe: Vec<f64> = sqlx::query_scalar("SELECT totale_ivato FROM order_item WHERE ordine_id = ?")
        .bind(ordine_id)
        .fetch_all(&mut *conn)
        .await?;

    let totali = righe
        .into_iter()
        .map(PriceCalculator::from_stored)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            tracing::error!("Ordine {} has an unreadable line total: {}", ordine_id, err);
            RepositoryError::data_integrity(format!("Totale riga non valido: {err}"))
        })?;
    let totale = PriceCalculator::calculate_total(&totali);

    sqlx::query("UPDATE ordine SET totale = ?, data_aggiornamento = ? WHERE ordine_id = ?")
        .bind(PriceCalculator::to_stored(totale))
        .bind(now)
        .bind(ordine_id)
        .execute(&mut *conn)
        .await?;

    tracing::debug!("Ordine {} totale = {}", ordine_id, totale);
    Ok(totale)
}

/// Repository for orders and their status transitions
#[derive(Clone)]
pub struct OrdineRepository {
    pool: SqlitePool,
}

impl OrdineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent first
    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<Ordine>> {
        let builder = SelectBuilder::new(ORDINE).order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<Ordine>> {
        repository::find_by_id(&self.pool, ORDINE, LABEL, id).await
    }

    async fn get_by_reference(
        &self,
        column: &'static str,
        field: &str,
        id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Ordine>> {
        if let Err(err) = validate_id(id, field) {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(ORDINE).eq(column, id).order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_cliente(
        &self,
        cliente_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Ordine>> {
        self.get_by_reference("cliente_id", "ID cliente", cliente_id, page, page_size)
            .await
    }

    pub async fn get_by_stato(
        &self,
        stato_ordine_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Ordine>> {
        self.get_by_reference("stato_ordine_id", "ID stato ordine", stato_ordine_id, page, page_size)
            .await
    }

    pub async fn get_by_stato_pagamento(
        &self,
        stato_pagamento_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Ordine>> {
        self.get_by_reference(
            "stato_pagamento_id",
            "ID stato pagamento",
            stato_pagamento_id,
            page,
            page_size,
        )
        .await
    }

    /// Orders created within `[start, end]`.
    ///
    /// # Errors
    /// `RepositoryError::InvalidArgument` when `end < start` or `end` is in the future.
    pub async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Ordine>> {
        check_date_range(start, end)?;
        let builder = SelectBuilder::new(ORDINE)
            .between(
                "data_creazione",
                Some(SqlValue::from(start)),
                Some(SqlValue::from(end)),
            )
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    /// Creates the order with a zero total and opens its status history.
    pub async fn add(&self, dto: OrdineDto) -> RepoResult<SingleResponse<Ordine>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }

        let row = sqlx::query_as::<_, Ordine>(
            r#"
            INSERT INTO ordine
                (cliente_id, stato_ordine_id, stato_pagamento_id, sessione_id, totale, priorita,
                 data_creazione, data_aggiornamento)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            RETURNING ordine_id, cliente_id, stato_ordine_id, stato_pagamento_id, sessione_id, totale,
                      priorita, data_creazione, data_aggiornamento
            "#,
        )
        .bind(dto.cliente_id)
        .bind(dto.stato_ordine_id)
        .bind(dto.stato_pagamento_id)
        .bind(dto.sessione_id)
        .bind(dto.priorita)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        StatusWorkflow::open(&mut tx, row.ordine_id, row.stato_ordine_id, now).await?;
        tx.commit().await?;

        tracing::info!("Ordine created: {} for cliente {}", row.ordine_id, row.cliente_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    /// Updates the order header. A different `stato_ordine_id` goes through the
    /// status workflow so the history stays consistent.
    pub async fn update(&self, id: i64, dto: OrdineDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<Ordine, _>(&mut *tx, ORDINE, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let stato_cambiato = existing.stato_ordine_id != dto.stato_ordine_id;
        let unchanged = !stato_cambiato
            && existing.cliente_id == dto.cliente_id
            && existing.stato_pagamento_id == dto.stato_pagamento_id
            && existing.sessione_id == dto.sessione_id
            && existing.priorita == dto.priorita;
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE ordine
            SET cliente_id = ?, stato_pagamento_id = ?, sessione_id = ?, priorita = ?, data_aggiornamento = ?
            WHERE ordine_id = ?
            "#,
        )
        .bind(dto.cliente_id)
        .bind(dto.stato_pagamento_id)
        .bind(dto.sessione_id)
        .bind(dto.priorita)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if stato_cambiato {
            StatusWorkflow::transition(&mut tx, id, dto.stato_ordine_id, now).await?;
        }
        tx.commit().await?;

        tracing::info!("Ordine {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    /// Moves the order to another state, closing the current history
    /// interval and opening the next in the same transaction.
    pub async fn cambia_stato(&self, id: i64, nuovo_stato_id: i64) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) =
            validate_id(id, "ID").and_then(|_| validate_id(nuovo_stato_id, "ID stato ordine"))
        {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let Some(ordine) = store::fetch_by_id::<Ordine, _>(&mut *tx, ORDINE, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let references = [Reference::new(STATO_ORDINE, stato_ordine::LABEL, nuovo_stato_id)];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        if ordine.stato_ordine_id == nuovo_stato_id {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        StatusWorkflow::transition(&mut tx, id, nuovo_stato_id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            "Ordine {} moved from stato {} to {}",
            id,
            ordine.stato_ordine_id,
            nuovo_stato_id
        );
        Ok(SingleResponse::ok(true, "Stato ordine aggiornato con successo"))
    }

    pub async fn set_stato_pagamento(
        &self,
        id: i64,
        stato_pagamento_id: i64,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) =
            validate_id(id, "ID").and_then(|_| validate_id(stato_pagamento_id, "ID stato pagamento"))
        {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let Some(ordine) = store::fetch_by_id::<Ordine, _>(&mut *tx, ORDINE, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let references = [Reference::new(STATO_PAGAMENTO, stato_pagamento::LABEL, stato_pagamento_id)];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        if ordine.stato_pagamento_id == stato_pagamento_id {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        sqlx::query("UPDATE ordine SET stato_pagamento_id = ?, data_aggiornamento = ? WHERE ordine_id = ?")
            .bind(stato_pagamento_id)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Ordine {} stato pagamento = {}", id, stato_pagamento_id);
        Ok(SingleResponse::ok(true, "Stato pagamento aggiornato con successo"))
    }

    /// Recomputes the total from the order lines and returns it.
    pub async fn ricalcola_totale(&self, id: i64) -> RepoResult<SingleResponse<Decimal>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        if !store::row_exists(&mut *tx, ORDINE, id).await? {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        }
        let totale = aggiorna_totale(&mut tx, id, Utc::now()).await?;
        tx.commit().await?;

        Ok(SingleResponse::ok(totale, "Totale ricalcolato con successo"))
    }

    /// Deletes the order and its status history. Order lines block the
    /// delete unless `force_delete`, in which case they are removed first.
    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        if !store::row_exists(&mut *tx, ORDINE, id).await? {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        }

        let report = GUARD.inspect(&mut tx, id).await?;
        match DeletePlan::decide(&report, force_delete, LABEL) {
            DeletePlan::Rejected(message) => {
                tracing::warn!("Delete of ordine {} rejected: {}", id, report.describe());
                return Ok(SingleResponse::fail(message));
            }
            DeletePlan::Cascade => {
                let removed = GUARD.remove_dependents(&mut tx, id).await?;
                tracing::info!("Removed {} order lines of ordine {}", removed, id);
            }
            DeletePlan::Proceed => {}
        }

        sqlx::query("DELETE FROM stato_storico_ordine WHERE ordine_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        store::delete_by_id(&mut *tx, ORDINE, id).await?;
        tx.commit().await?;

        tracing::info!("Deleted ordine {}", id);
        Ok(SingleResponse::ok(true, messages::eliminato(LABEL)))
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, ORDINE, LABEL, id).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(ORDINE)).await
    }
}
