use chrono::Utc;
use sqlx::SqlitePool;

use crate::catalog::articolo;
use crate::catalog::models::{Dolce, DolceDto, TipoArticolo};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pagination::PageWindow;
use crate::repository::{self, absorb_unique_violation, same_amount};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_range, validate_required_text};

pub const DOLCE: TableSpec = TableSpec {
    table: "dolce",
    id_column: "articolo_id",
    columns: "articolo_id, nome, prezzo, descrizione, immagine_url, disponibile, priorita, \
              data_creazione, data_aggiornamento",
};

pub const LABEL: Label = Label::maschile("Dolce", "un dolce");

const UNIQUE: UniquenessGuard = UniquenessGuard::new(DOLCE);

/// Highest priority first, then alphabetical
const ORDINAMENTO: &str = "priorita DESC, nome COLLATE KEY_NOCASE ASC";

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Repository for desserts
#[derive(Clone)]
pub struct DolceRepository {
    pool: SqlitePool,
}

impl DolceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<Dolce>> {
        let builder = SelectBuilder::new(DOLCE).order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<Dolce>> {
        repository::find_by_id(&self.pool, DOLCE, LABEL, id).await
    }

    pub async fn get_by_nome(&self, nome: &str) -> RepoResult<SingleResponse<Dolce>> {
        let nome = match validate_required_text(nome, "Nome", 100) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let row = SelectBuilder::new(DOLCE)
            .eq_ignore_case("nome", &nome)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("nome '{nome}'"))),
        })
    }

    pub async fn get_disponibili(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<Dolce>> {
        let builder = SelectBuilder::new(DOLCE)
            .eq("disponibile", true)
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_priorita(
        &self,
        priorita: i32,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Dolce>> {
        if let Err(err) = validate_range(priorita, 1, 10, "Priorità") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(DOLCE)
            .eq("priorita", priorita)
            .order_by("nome COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    /// Creates the articolo and the dessert in one transaction.
    pub async fn add(&self, dto: DolceDto) -> RepoResult<SingleResponse<Dolce>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("nome", &nome)], None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let articolo_id = articolo::insert_articolo(&mut tx, TipoArticolo::Dolce, now).await?;

        let inserted = sqlx::query_as::<_, Dolce>(
            r#"
            INSERT INTO dolce
                (articolo_id, nome, prezzo, descrizione, immagine_url, disponibile, priorita,
                 data_creazione, data_aggiornamento)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING articolo_id, nome, prezzo, descrizione, immagine_url, disponibile, priorita,
                      data_creazione, data_aggiornamento
            "#,
        )
        .bind(articolo_id)
        .bind(&nome)
        .bind(dto.prezzo)
        .bind(trimmed(&dto.descrizione))
        .bind(trimmed(&dto.immagine_url))
        .bind(dto.disponibile)
        .bind(dto.priorita)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Dolce created: {} ({})", row.articolo_id, row.nome);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: DolceDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();
        let descrizione = trimmed(&dto.descrizione);
        let immagine_url = trimmed(&dto.immagine_url);
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<Dolce, _>(&mut *tx, DOLCE, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let unchanged = existing.nome == nome
            && same_amount(existing.prezzo, dto.prezzo)
            && existing.descrizione == descrizione
            && existing.immagine_url == immagine_url
            && existing.disponibile == dto.disponibile
            && existing.priorita == dto.priorita;
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("nome", &nome)], Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let now = Utc::now();
        let updated = sqlx::query(
            r#"
            UPDATE dolce
            SET nome = ?, prezzo = ?, descrizione = ?, immagine_url = ?, disponibile = ?,
                priorita = ?, data_aggiornamento = ?
            WHERE articolo_id = ?
            "#,
        )
        .bind(&nome)
        .bind(dto.prezzo)
        .bind(&descrizione)
        .bind(&immagine_url)
        .bind(dto.disponibile)
        .bind(dto.priorita)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        articolo::touch_articolo(&mut tx, id, now).await?;
        tx.commit().await?;

        tracing::info!("Dolce {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        articolo::delete_composite(&self.pool, DOLCE, LABEL, id, force_delete).await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, DOLCE, LABEL, id).await
    }

    pub async fn exists_by_nome(&self, nome: &str, exclude_id: Option<i64>) -> RepoResult<SingleResponse<bool>> {
        let nome = match validate_required_text(nome, "Nome", 100) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let builder = SelectBuilder::new(DOLCE)
            .eq_ignore_case("nome", &nome)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(DOLCE)).await
    }

    pub async fn count_disponibili(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(DOLCE).eq("disponibile", true)).await
    }
}
