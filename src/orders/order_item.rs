use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::catalog::articolo::{self, ARTICOLO};
use crate::catalog::models::{Articolo, TipoArticolo};
use crate::error::RepoResult;
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::orders::models::{OrderItem, OrderItemDto, TaxRate};
use crate::orders::ordine::{self, aggiorna_totale, ORDINE};
use crate::orders::tax_rates::{self, TAX_RATES};
use crate::pagination::PageWindow;
use crate::pricing::{LineTotals, PriceCalculator, PricingError};
use crate::repository::{self, same_amount};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id};

pub const ORDER_ITEM: TableSpec = TableSpec {
    table: "order_item",
    id_column: "order_item_id",
    columns: "order_item_id, ordine_id, articolo_id, quantita, prezzo_unitario, sconto_applicato, \
              imponibile, totale_ivato, tax_rate_id, tipo_articolo, data_creazione, data_aggiornamento",
};

pub const LABEL: Label = Label::femminile("Riga d'ordine", "una riga d'ordine");

/// Priced line ready to be written
struct RigaPrezzata {
    tipo_articolo: TipoArticolo,
    totali: LineTotals,
}

/// Resolves the order, the article and the tax rate of a line and prices it.
/// `Ok(Err(message))` is a business failure to report in the envelope.
async fn prezza_riga(
    conn: &mut SqliteConnection,
    dto: &OrderItemDto,
) -> RepoResult<Result<RigaPrezzata, String>> {
    if !store::row_exists(&mut *conn, ORDINE, dto.ordine_id).await? {
        return Ok(Err(messages::non_trovato(ordine::LABEL, dto.ordine_id)));
    }
    let Some(articolo) = store::fetch_by_id::<Articolo, _>(&mut *conn, ARTICOLO, dto.articolo_id).await?
    else {
        return Ok(Err(messages::non_trovato(articolo::LABEL, dto.articolo_id)));
    };
    let Some(aliquota) = store::fetch_by_id::<TaxRate, _>(&mut *conn, TAX_RATES, dto.tax_rate_id).await?
    else {
        return Ok(Err(messages::non_trovato(tax_rates::LABEL, dto.tax_rate_id)));
    };

    Ok(calcola_totali(dto, aliquota.aliquota)
        .map(|totali| RigaPrezzata {
            tipo_articolo: articolo.tipo,
            totali,
        })
        .map_err(|err| err.to_string()))
}

fn calcola_totali(dto: &OrderItemDto, aliquota: f64) -> Result<LineTotals, PricingError> {
    PriceCalculator::calculate_line(
        dto.quantita,
        PriceCalculator::from_stored(dto.prezzo_unitario)?,
        PriceCalculator::from_stored(dto.sconto_applicato)?,
        PriceCalculator::from_stored(aliquota)?,
    )
}

fn is_unchanged(existing: &OrderItem, dto: &OrderItemDto) -> bool {
    existing.ordine_id == dto.ordine_id
        && existing.articolo_id == dto.articolo_id
        && existing.quantita == dto.quantita
        && existing.tax_rate_id == dto.tax_rate_id
        && same_amount(existing.prezzo_unitario, dto.prezzo_unitario)
        && same_amount(existing.sconto_applicato, dto.sconto_applicato)
}

/// Repository for order lines. Every write recomputes the line amounts and
/// the owning order's total in the same transaction.
#[derive(Clone)]
pub struct OrderItemRepository {
    pool: SqlitePool,
}

impl OrderItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<OrderItem>> {
        let builder = SelectBuilder::new(ORDER_ITEM).order_by("ordine_id ASC, order_item_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<OrderItem>> {
        repository::find_by_id(&self.pool, ORDER_ITEM, LABEL, id).await
    }

    pub async fn get_by_ordine(
        &self,
        ordine_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<OrderItem>> {
        if let Err(err) = validate_id(ordine_id, "ID ordine") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(ORDER_ITEM)
            .eq("ordine_id", ordine_id)
            .order_by("order_item_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(&self, dto: OrderItemDto) -> RepoResult<SingleResponse<OrderItem>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let riga = match prezza_riga(&mut tx, &dto).await? {
            Ok(riga) => riga,
            Err(message) => return Ok(SingleResponse::fail(message)),
        };

        let row = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_item
                (ordine_id, articolo_id, quantita, prezzo_unitario, sconto_applicato, imponibile,
                 totale_ivato, tax_rate_id, tipo_articolo, data_creazione, data_aggiornamento)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING order_item_id, ordine_id, articolo_id, quantita, prezzo_unitario, sconto_applicato,
                      imponibile, totale_ivato, tax_rate_id, tipo_articolo, data_creazione, data_aggiornamento
            "#,
        )
        .bind(dto.ordine_id)
        .bind(dto.articolo_id)
        .bind(dto.quantita)
        .bind(dto.prezzo_unitario)
        .bind(dto.sconto_applicato)
        .bind(PriceCalculator::to_stored(riga.totali.imponibile))
        .bind(PriceCalculator::to_stored(riga.totali.totale_ivato))
        .bind(dto.tax_rate_id)
        .bind(riga.tipo_articolo.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        aggiorna_totale(&mut tx, row.ordine_id, now).await?;
        tx.commit().await?;

        tracing::info!(
            "Order line {} added to ordine {}: {} x articolo {}",
            row.order_item_id,
            row.ordine_id,
            row.quantita,
            row.articolo_id
        );
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    /// Moving a line to another order recomputes both totals.
    pub async fn update(&self, id: i64, dto: OrderItemDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<OrderItem, _>(&mut *tx, ORDER_ITEM, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if is_unchanged(&existing, &dto) {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        let riga = match prezza_riga(&mut tx, &dto).await? {
            Ok(riga) => riga,
            Err(message) => return Ok(SingleResponse::fail(message)),
        };

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE order_item
            SET ordine_id = ?, articolo_id = ?, quantita = ?, prezzo_unitario = ?, sconto_applicato = ?,
                imponibile = ?, totale_ivato = ?, tax_rate_id = ?, tipo_articolo = ?, data_aggiornamento = ?
            WHERE order_item_id = ?
            "#,
        )
        .bind(dto.ordine_id)
        .bind(dto.articolo_id)
        .bind(dto.quantita)
        .bind(dto.prezzo_unitario)
        .bind(dto.sconto_applicato)
        .bind(PriceCalculator::to_stored(riga.totali.imponibile))
        .bind(PriceCalculator::to_stored(riga.totali.totale_ivato))
        .bind(dto.tax_rate_id)
        .bind(riga.tipo_articolo.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        ricalcola_ordini(&mut tx, existing.ordine_id, dto.ordine_id, now).await?;
        tx.commit().await?;

        tracing::info!("Order line {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<OrderItem, _>(&mut *tx, ORDER_ITEM, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        store::delete_by_id(&mut *tx, ORDER_ITEM, id).await?;
        aggiorna_totale(&mut tx, existing.ordine_id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!("Order line {} removed from ordine {}", id, existing.ordine_id);
        Ok(SingleResponse::ok(true, messages::eliminato(LABEL)))
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, ORDER_ITEM, LABEL, id).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(ORDER_ITEM)).await
    }

    pub async fn count_by_ordine(&self, ordine_id: i64) -> RepoResult<SingleResponse<i64>> {
        if let Err(err) = validate_id(ordine_id, "ID ordine") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        repository::count(&self.pool, SelectBuilder::new(ORDER_ITEM).eq("ordine_id", ordine_id)).await
    }
}

async fn ricalcola_ordini(
    conn: &mut SqliteConnection,
    precedente: i64,
    attuale: i64,
    now: DateTime<Utc>,
) -> RepoResult<()> {
    aggiorna_totale(&mut *conn, attuale, now).await?;
    if precedente != attuale {
        aggiorna_totale(&mut *conn, precedente, now).await?;
    }
    Ok(())
}
