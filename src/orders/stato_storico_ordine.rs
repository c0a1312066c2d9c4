use sqlx::SqlitePool;

use crate::error::RepoResult;
use crate::messages::{self, Label};
use crate::orders::models::StatoStoricoOrdine;
use crate::pagination::PageWindow;
use crate::repository;
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{SelectBuilder, TableSpec};
use crate::validation::validate_id;

pub const STATO_STORICO_ORDINE: TableSpec = TableSpec {
    table: "stato_storico_ordine",
    id_column: "stato_storico_ordine_id",
    columns: "stato_storico_ordine_id, ordine_id, stato_ordine_id, inizio, fine",
};

pub const LABEL: Label = Label::maschile("Storico stato ordine", "uno storico stato ordine");

/// Read access to order status history. Rows are written only by the
/// status workflow when an order is created or changes state.
#[derive(Clone)]
pub struct StatoStoricoOrdineRepository {
    pool: SqlitePool,
}

impl StatoStoricoOrdineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<StatoStoricoOrdine>> {
        let builder = SelectBuilder::new(STATO_STORICO_ORDINE)
            .order_by("ordine_id ASC, inizio ASC, stato_storico_ordine_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<StatoStoricoOrdine>> {
        repository::find_by_id(&self.pool, STATO_STORICO_ORDINE, LABEL, id).await
    }

    /// The timeline of one order, oldest interval first
    pub async fn get_by_ordine(
        &self,
        ordine_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<StatoStoricoOrdine>> {
        if let Err(err) = validate_id(ordine_id, "ID ordine") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(STATO_STORICO_ORDINE)
            .eq("ordine_id", ordine_id)
            .order_by("inizio ASC, stato_storico_ordine_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    /// The open interval of an order
    pub async fn get_stato_corrente(&self, ordine_id: i64) -> RepoResult<SingleResponse<StatoStoricoOrdine>> {
        if let Err(err) = validate_id(ordine_id, "ID ordine") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let row = SelectBuilder::new(STATO_STORICO_ORDINE)
            .eq("ordine_id", ordine_id)
            .filter("fine IS NULL")
            .order_by("inizio DESC, stato_storico_ordine_id DESC")
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("ordine {ordine_id}"))),
        })
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(STATO_STORICO_ORDINE)).await
    }

    pub async fn count_by_ordine(&self, ordine_id: i64) -> RepoResult<SingleResponse<i64>> {
        if let Err(err) = validate_id(ordine_id, "ID ordine") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        repository::count(
            &self.pool,
            SelectBuilder::new(STATO_STORICO_ORDINE).eq("ordine_id", ordine_id),
        )
        .await
    }
}
