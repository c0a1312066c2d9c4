use sqlx::SqlitePool;

use crate::catalog::ingrediente::{self, INGREDIENTE};
use crate::catalog::models::{IngredientiPersonalizzazione, IngredientiPersonalizzazioneDto};
use crate::catalog::personalizzazione_custom::{self, PERSONALIZZAZIONE_CUSTOM};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pagination::PageWindow;
use crate::repository::{self, absorb_unique_violation, missing_reference, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id};

pub const INGREDIENTI_PERSONALIZZAZIONE: TableSpec = TableSpec {
    table: "ingredienti_personalizzazione",
    id_column: "ingredienti_pers_id",
    columns: "ingredienti_pers_id, pers_custom_id, ingrediente_id",
};

pub const LABEL: Label = Label::maschile("Ingrediente selezionato", "un ingrediente selezionato");

const UNIQUE: UniquenessGuard = UniquenessGuard::new(INGREDIENTI_PERSONALIZZAZIONE);

fn references(dto: &IngredientiPersonalizzazioneDto) -> [Reference; 2] {
    [
        Reference::new(PERSONALIZZAZIONE_CUSTOM, personalizzazione_custom::LABEL, dto.pers_custom_id),
        Reference::new(INGREDIENTE, ingrediente::LABEL, dto.ingrediente_id),
    ]
}

fn chiave(dto: &IngredientiPersonalizzazioneDto) -> String {
    format!(
        "personalizzazione custom {} e ingrediente {}",
        dto.pers_custom_id, dto.ingrediente_id
    )
}

/// Repository for the ingredient selection of custom recipes
#[derive(Clone)]
pub struct IngredientiPersonalizzazioneRepository {
    pool: SqlitePool,
}

impl IngredientiPersonalizzazioneRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<IngredientiPersonalizzazione>> {
        let builder = SelectBuilder::new(INGREDIENTI_PERSONALIZZAZIONE)
            .order_by("pers_custom_id ASC, ingrediente_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<IngredientiPersonalizzazione>> {
        repository::find_by_id(&self.pool, INGREDIENTI_PERSONALIZZAZIONE, LABEL, id).await
    }

    pub async fn get_by_personalizzazione_custom(
        &self,
        pers_custom_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<IngredientiPersonalizzazione>> {
        if let Err(err) = validate_id(pers_custom_id, "ID personalizzazione custom") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(INGREDIENTI_PERSONALIZZAZIONE)
            .eq("pers_custom_id", pers_custom_id)
            .order_by("ingrediente_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(
        &self,
        dto: IngredientiPersonalizzazioneDto,
    ) -> RepoResult<SingleResponse<IngredientiPersonalizzazione>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));

        let mut tx = self.pool.begin().await?;

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("pers_custom_id", dto.pers_custom_id),
            KeyPart::Int("ingrediente_id", dto.ingrediente_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, IngredientiPersonalizzazione>(
            r#"
            INSERT INTO ingredienti_personalizzazione (pers_custom_id, ingrediente_id)
            VALUES (?, ?)
            RETURNING ingredienti_pers_id, pers_custom_id, ingrediente_id
            "#,
        )
        .bind(dto.pers_custom_id)
        .bind(dto.ingrediente_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Ingredienti personalizzazione created: {}", row.ingredienti_pers_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(
        &self,
        id: i64,
        dto: IngredientiPersonalizzazioneDto,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<IngredientiPersonalizzazione, _>(
            &mut *tx,
            INGREDIENTI_PERSONALIZZAZIONE,
            id,
        )
        .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.pers_custom_id == dto.pers_custom_id && existing.ingrediente_id == dto.ingrediente_id {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("pers_custom_id", dto.pers_custom_id),
            KeyPart::Int("ingrediente_id", dto.ingrediente_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            "UPDATE ingredienti_personalizzazione SET pers_custom_id = ?, ingrediente_id = ? WHERE ingredienti_pers_id = ?",
        )
        .bind(dto.pers_custom_id)
        .bind(dto.ingrediente_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Ingredienti personalizzazione {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            INGREDIENTI_PERSONALIZZAZIONE,
            &DependencyGuard::none(),
            LABEL,
            id,
            false,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, INGREDIENTI_PERSONALIZZAZIONE, LABEL, id).await
    }

    pub async fn exists_by_combinazione(
        &self,
        pers_custom_id: i64,
        ingrediente_id: i64,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(pers_custom_id, "ID personalizzazione custom")
            .and_then(|_| validate_id(ingrediente_id, "ID ingrediente"))
        {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let builder = SelectBuilder::new(INGREDIENTI_PERSONALIZZAZIONE)
            .eq("pers_custom_id", pers_custom_id)
            .eq("ingrediente_id", ingrediente_id)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(INGREDIENTI_PERSONALIZZAZIONE)).await
    }
}
