// Articolo base rows and the composite lifecycle shared by the three variants
// Every sellable item is an `articolo` row plus exactly one variant row that
// reuses its id. Variant repositories create, touch and delete the pair
// through the helpers below so both rows always move in one transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::catalog::models::{Articolo, TipoArticolo};
use crate::error::RepoResult;
use crate::guards::{DeletePlan, Dependency, DependencyGuard};
use crate::messages::{self, Label};
use crate::pagination::PageWindow;
use crate::repository;
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::validate_id;

pub const ARTICOLO: TableSpec = TableSpec {
    table: "articolo",
    id_column: "articolo_id",
    columns: "articolo_id, tipo, data_creazione, data_aggiornamento",
};

pub const LABEL: Label = Label::maschile("Articolo", "un articolo");

/// Favourites and order lines go with the item on a forced delete; orders
/// that lose lines get their totals recomputed.
const DEPENDENCIES: &[Dependency] = &[
    Dependency::new("preferiti_cliente", "articolo_id", "preferiti dei clienti"),
    Dependency::new("order_item", "articolo_id", "righe d'ordine").refreshing_totals("ordine_id"),
];

const ORFANI_BS: &str =
    "DELETE FROM articolo WHERE tipo = 'BS' AND articolo_id NOT IN (SELECT articolo_id FROM bevanda_standard)";
const ORFANI_BC: &str =
    "DELETE FROM articolo WHERE tipo = 'BC' AND articolo_id NOT IN (SELECT articolo_id FROM bevanda_custom)";

/// Standard drinks referencing a parent through `column`. Their base rows
/// follow once the variants are gone.
pub(crate) const fn bevande_standard(column: &'static str) -> Dependency {
    Dependency::new("bevanda_standard", column, "bevande standard")
        .with_nested("articolo_id", DEPENDENCIES)
        .with_cleanup(ORFANI_BS)
}

pub(crate) const fn bevande_custom(column: &'static str) -> Dependency {
    Dependency::new("bevanda_custom", column, "bevande custom")
        .with_nested("articolo_id", DEPENDENCIES)
        .with_cleanup(ORFANI_BC)
}

const GUARD: DependencyGuard = DependencyGuard::new(DEPENDENCIES);

/// Inserts the base row for a new variant and returns the shared id.
pub(crate) async fn insert_articolo(
    conn: &mut SqliteConnection,
    tipo: TipoArticolo,
    now: DateTime<Utc>,
) -> RepoResult<i64> {
    let articolo_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO articolo (tipo, data_creazione, data_aggiornamento)
        VALUES (?, ?, ?)
        RETURNING articolo_id
        "#,
    )
    .bind(tipo.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!("Articolo {} opened with tipo {}", articolo_id, tipo);
    Ok(articolo_id)
}

/// Stamps the base row after a variant update.
pub(crate) async fn touch_articolo(
    conn: &mut SqliteConnection,
    articolo_id: i64,
    now: DateTime<Utc>,
) -> RepoResult<()> {
    sqlx::query("UPDATE articolo SET data_aggiornamento = ? WHERE articolo_id = ?")
        .bind(now)
        .bind(articolo_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Removes a variant and its base row together.
///
/// The item's dependents are checked first and removed only with
/// `force_delete`.
pub(crate) async fn delete_composite(
    pool: &SqlitePool,
    variant: TableSpec,
    label: Label,
    id: i64,
    force_delete: bool,
) -> RepoResult<SingleResponse<bool>> {
    if let Err(err) = validate_id(id, "ID") {
        return Ok(SingleResponse::fail(err.to_string()));
    }

    let mut tx = pool.begin().await?;

    if !store::row_exists(&mut *tx, variant, id).await? {
        return Ok(SingleResponse::fail(messages::non_trovato(label, id)));
    }

    let report = GUARD.inspect(&mut tx, id).await?;
    match DeletePlan::decide(&report, force_delete, label) {
        DeletePlan::Rejected(message) => {
            tracing::warn!("Delete of {} {} rejected: {}", variant.table, id, report.describe());
            return Ok(SingleResponse::fail(message));
        }
        DeletePlan::Cascade => {
            let removed = GUARD.remove_dependents(&mut tx, id).await?;
            tracing::info!("Removed {} dependent rows of articolo {}", removed, id);
        }
        DeletePlan::Proceed => {}
    }

    store::delete_by_id(&mut *tx, variant, id).await?;
    store::delete_by_id(&mut *tx, ARTICOLO, id).await?;
    tx.commit().await?;

    tracing::info!("Deleted {} {} with its articolo", variant.table, id);
    Ok(SingleResponse::ok(true, messages::eliminato(label)))
}

/// Read side of the base rows, across all kinds
#[derive(Clone)]
pub struct ArticoloRepository {
    pool: SqlitePool,
}

impl ArticoloRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<Articolo>> {
        let builder = SelectBuilder::new(ARTICOLO).order_by("articolo_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<Articolo>> {
        repository::find_by_id(&self.pool, ARTICOLO, LABEL, id).await
    }

    /// Items of one kind; `tipo` is the tag, e.g. `"BS"`
    pub async fn get_by_tipo(
        &self,
        tipo: &str,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Articolo>> {
        let Some(tipo) = TipoArticolo::parse(tipo) else {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                "Tipo articolo non valido: valori ammessi BS, BC, D",
            ));
        };
        let builder = SelectBuilder::new(ARTICOLO)
            .eq("tipo", tipo.as_str())
            .order_by("articolo_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, ARTICOLO, LABEL, id).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(ARTICOLO)).await
    }
}
