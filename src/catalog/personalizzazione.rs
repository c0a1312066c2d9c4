use chrono::Utc;
use sqlx::SqlitePool;

use crate::catalog::models::{Personalizzazione, PersonalizzazioneDto};
use crate::catalog::{articolo, personalizzazione_ingrediente};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::repository::{self, absorb_unique_violation};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_required_text};

pub const PERSONALIZZAZIONE: TableSpec = TableSpec {
    table: "personalizzazione",
    id_column: "personalizzazione_id",
    columns: "personalizzazione_id, nome, descrizione, dt_creazione",
};

pub const LABEL: Label = Label::femminile("Personalizzazione", "una personalizzazione");

const DEPENDENCIES: &[Dependency] = &[
    articolo::bevande_standard("personalizzazione_id"),
    personalizzazione_ingrediente::personalizzazioni_ingrediente(
        "personalizzazione_id",
        "ingredienti della ricetta",
    ),
];

const UNIQUE: UniquenessGuard = UniquenessGuard::new(PERSONALIZZAZIONE);

/// Repository for named recipes
#[derive(Clone)]
pub struct PersonalizzazioneRepository {
    pool: SqlitePool,
}

impl PersonalizzazioneRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Personalizzazione>> {
        let builder = SelectBuilder::new(PERSONALIZZAZIONE).order_by("nome COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<Personalizzazione>> {
        repository::find_by_id(&self.pool, PERSONALIZZAZIONE, LABEL, id).await
    }

    pub async fn get_by_nome(&self, nome: &str) -> RepoResult<SingleResponse<Personalizzazione>> {
        let nome = match validate_required_text(nome, "Nome", 50) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let row = SelectBuilder::new(PERSONALIZZAZIONE)
            .eq_ignore_case("nome", &nome)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("nome '{nome}'"))),
        })
    }

    pub async fn add(&self, dto: PersonalizzazioneDto) -> RepoResult<SingleResponse<Personalizzazione>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("nome", &nome)], None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, Personalizzazione>(
            r#"
            INSERT INTO personalizzazione (nome, descrizione, dt_creazione)
            VALUES (?, ?, ?)
            RETURNING personalizzazione_id, nome, descrizione, dt_creazione
            "#,
        )
        .bind(&nome)
        .bind(&descrizione)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Personalizzazione created: {} ({})", row.personalizzazione_id, row.nome);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: PersonalizzazioneDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        let Some(existing) =
            store::fetch_by_id::<Personalizzazione, _>(&mut *tx, PERSONALIZZAZIONE, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.nome == nome && existing.descrizione == descrizione {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("nome", &nome)], Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            "UPDATE personalizzazione SET nome = ?, descrizione = ? WHERE personalizzazione_id = ?",
        )
        .bind(&nome)
        .bind(&descrizione)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Personalizzazione {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            PERSONALIZZAZIONE,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, PERSONALIZZAZIONE, LABEL, id).await
    }

    pub async fn exists_by_nome(
        &self,
        nome: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        let nome = match validate_required_text(nome, "Nome", 50) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let builder = SelectBuilder::new(PERSONALIZZAZIONE)
            .eq_ignore_case("nome", &nome)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(PERSONALIZZAZIONE)).await
    }
}
