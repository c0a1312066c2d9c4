use sqlx::SqlitePool;

use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::orders::ordine;
use crate::pagination::PageWindow;
use crate::repository::{self, absorb_unique_violation};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_range, validate_required_text};
use crate::venue::models::{Tavolo, TavoloDto};

pub const TAVOLO: TableSpec = TableSpec {
    table: "tavolo",
    id_column: "tavolo_id",
    columns: "tavolo_id, numero, disponibile, zona",
};

pub const LABEL: Label = Label::maschile("Tavolo", "un tavolo");

const PER_CLIENTE: &[Dependency] = &[
    Dependency::new("preferiti_cliente", "cliente_id", "preferiti"),
    ordine::ordini("cliente_id"),
];

/// Clients seated at the table go with their favourites and orders.
const DEPENDENCIES: &[Dependency] =
    &[Dependency::new("cliente", "tavolo_id", "clienti").with_nested("cliente_id", PER_CLIENTE)];

const UNIQUE: UniquenessGuard = UniquenessGuard::new(TAVOLO);

fn zona(dto: &TavoloDto) -> Option<String> {
    dto.zona
        .as_deref()
        .map(str::trim)
        .filter(|z| !z.is_empty())
        .map(str::to_string)
}

/// Repository for tables
#[derive(Clone)]
pub struct TavoloRepository {
    pool: SqlitePool,
}

impl TavoloRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<Tavolo>> {
        let builder = SelectBuilder::new(TAVOLO).order_by("numero ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<Tavolo>> {
        repository::find_by_id(&self.pool, TAVOLO, LABEL, id).await
    }

    pub async fn get_by_numero(&self, numero: i32) -> RepoResult<SingleResponse<Tavolo>> {
        if let Err(err) = validate_range(numero, 1, 9999, "Numero") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let row = SelectBuilder::new(TAVOLO)
            .eq("numero", numero)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("numero {numero}"))),
        })
    }

    pub async fn get_disponibili(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<Tavolo>> {
        let builder = SelectBuilder::new(TAVOLO)
            .eq("disponibile", true)
            .order_by("numero ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_zona(
        &self,
        zona: &str,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Tavolo>> {
        let zona = match validate_required_text(zona, "Zona", 50) {
            Ok(zona) => zona,
            Err(err) => {
                return Ok(PaginatedResponse::rejected(
                    &PageWindow::new(page, page_size),
                    err.to_string(),
                ))
            }
        };
        let builder = SelectBuilder::new(TAVOLO)
            .eq_ignore_case("zona", &zona)
            .order_by("numero ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(&self, dto: TavoloDto) -> RepoResult<SingleResponse<Tavolo>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &format!("numero {}", dto.numero));

        let mut tx = self.pool.begin().await?;

        let key = [KeyPart::Int("numero", i64::from(dto.numero))];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, Tavolo>(
            r#"
            INSERT INTO tavolo (numero, disponibile, zona)
            VALUES (?, ?, ?)
            RETURNING tavolo_id, numero, disponibile, zona
            "#,
        )
        .bind(dto.numero)
        .bind(dto.disponibile)
        .bind(zona(&dto))
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Tavolo created: {} (numero {})", row.tavolo_id, row.numero);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: TavoloDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &format!("numero {}", dto.numero));
        let zona = zona(&dto);

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<Tavolo, _>(&mut *tx, TAVOLO, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.numero == dto.numero && existing.disponibile == dto.disponibile && existing.zona == zona {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        let key = [KeyPart::Int("numero", i64::from(dto.numero))];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query("UPDATE tavolo SET numero = ?, disponibile = ?, zona = ? WHERE tavolo_id = ?")
            .bind(dto.numero)
            .bind(dto.disponibile)
            .bind(&zona)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Tavolo {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    /// Marks a table free or occupied; setting the current value is a no-op.
    pub async fn set_disponibilita(&self, id: i64, disponibile: bool) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<Tavolo, _>(&mut *tx, TAVOLO, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.disponibile == disponibile {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        sqlx::query("UPDATE tavolo SET disponibile = ? WHERE tavolo_id = ?")
            .bind(disponibile)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Tavolo {} disponibile = {}", id, disponibile);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            TAVOLO,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, TAVOLO, LABEL, id).await
    }

    pub async fn exists_by_numero(&self, numero: i32, exclude_id: Option<i64>) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_range(numero, 1, 9999, "Numero") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let builder = SelectBuilder::new(TAVOLO)
            .eq("numero", numero)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(TAVOLO)).await
    }

    pub async fn count_disponibili(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(TAVOLO).eq("disponibile", true)).await
    }
}
