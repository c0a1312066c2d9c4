use sqlx::SqlitePool;

use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::orders::models::{StatoOrdine, StatoOrdineDto};
use crate::orders::ordine;
use crate::orders::status_workflow::StatusWorkflow;
use crate::pagination::PageWindow;
use crate::repository::{self, absorb_unique_violation};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_required_text};

pub const STATO_ORDINE: TableSpec = TableSpec {
    table: "stato_ordine",
    id_column: "stato_ordine_id",
    columns: "stato_ordine_id, stato_ordine, terminale",
};

pub const LABEL: Label = Label::maschile("Stato ordine", "uno stato ordine");

/// Orders in this state go first; history rows of other orders that passed
/// through it are removed afterwards.
const DEPENDENCIES: &[Dependency] = &[
    Dependency::new("config_soglie_tempi", "stato_ordine_id", "configurazioni soglie"),
    ordine::ordini("stato_ordine_id"),
    Dependency::new("stato_storico_ordine", "stato_ordine_id", "storico stati ordine"),
];

const UNIQUE: UniquenessGuard = UniquenessGuard::new(STATO_ORDINE);

/// Repository for order states
#[derive(Clone)]
pub struct StatoOrdineRepository {
    pool: SqlitePool,
}

impl StatoOrdineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// States in workflow order (bozza first, terminal states last).
    ///
    /// The set is small and the order is not expressible in SQL, so rows are
    /// sorted in memory and then windowed.
    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<StatoOrdine>> {
        let window = PageWindow::new(page, page_size);
        let mut rows: Vec<StatoOrdine> = SelectBuilder::new(STATO_ORDINE).fetch_all(&self.pool).await?;
        rows.sort_by(|a, b| StatusWorkflow::compare_stati_ordine(&a.stato_ordine, &b.stato_ordine));

        let total = rows.len() as i64;
        let data = window.slice(rows);
        Ok(PaginatedResponse::new(data, &window, total).with_message(messages::elenco(total)))
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<StatoOrdine>> {
        repository::find_by_id(&self.pool, STATO_ORDINE, LABEL, id).await
    }

    pub async fn get_by_nome(&self, nome: &str) -> RepoResult<SingleResponse<StatoOrdine>> {
        let nome = match validate_required_text(nome, "Stato ordine", 50) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let row = SelectBuilder::new(STATO_ORDINE)
            .eq_ignore_case("stato_ordine", &nome)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("nome '{nome}'"))),
        })
    }

    pub async fn get_terminali(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<StatoOrdine>> {
        let builder = SelectBuilder::new(STATO_ORDINE)
            .eq("terminale", true)
            .order_by("stato_ordine COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(&self, dto: StatoOrdineDto) -> RepoResult<SingleResponse<StatoOrdine>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.stato_ordine.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        if !UNIQUE
            .is_unique(&mut tx, &[KeyPart::Text("stato_ordine", &nome)], None)
            .await?
        {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, StatoOrdine>(
            r#"
            INSERT INTO stato_ordine (stato_ordine, terminale)
            VALUES (?, ?)
            RETURNING stato_ordine_id, stato_ordine, terminale
            "#,
        )
        .bind(&nome)
        .bind(dto.terminale)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Stato ordine created: {} ({})", row.stato_ordine_id, row.stato_ordine);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: StatoOrdineDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.stato_ordine.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<StatoOrdine, _>(&mut *tx, STATO_ORDINE, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.stato_ordine == nome && existing.terminale == dto.terminale {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if !UNIQUE
            .is_unique(&mut tx, &[KeyPart::Text("stato_ordine", &nome)], Some(id))
            .await?
        {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            "UPDATE stato_ordine SET stato_ordine = ?, terminale = ? WHERE stato_ordine_id = ?",
        )
        .bind(&nome)
        .bind(dto.terminale)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Stato ordine {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    /// A forced delete removes the orders in this state, any history row
    /// naming it and its threshold configuration.
    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            STATO_ORDINE,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, STATO_ORDINE, LABEL, id).await
    }

    pub async fn exists_by_nome(&self, nome: &str, exclude_id: Option<i64>) -> RepoResult<SingleResponse<bool>> {
        let nome = match validate_required_text(nome, "Stato ordine", 50) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let builder = SelectBuilder::new(STATO_ORDINE)
            .eq_ignore_case("stato_ordine", &nome)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(STATO_ORDINE)).await
    }
}
