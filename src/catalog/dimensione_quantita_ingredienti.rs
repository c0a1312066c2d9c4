use sqlx::SqlitePool;

use crate::catalog::dimensione_bicchiere::{self, DIMENSIONE_BICCHIERE};
use crate::catalog::models::{DimensioneQuantitaIngredienti, DimensioneQuantitaIngredientiDto};
use crate::catalog::personalizzazione_ingrediente::{self, PERSONALIZZAZIONE_INGREDIENTE};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pagination::PageWindow;
use crate::repository::{self, absorb_unique_violation, missing_reference, same_amount, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id};

pub const DIMENSIONE_QUANTITA_INGREDIENTI: TableSpec = TableSpec {
    table: "dimensione_quantita_ingredienti",
    id_column: "dimensione_id",
    columns: "dimensione_id, personalizzazione_ingrediente_id, dimensione_bicchiere_id, moltiplicatore",
};

pub const LABEL: Label = Label::femminile("Quantità per dimensione", "una quantità per dimensione");

const UNIQUE: UniquenessGuard = UniquenessGuard::new(DIMENSIONE_QUANTITA_INGREDIENTI);

fn chiave(dto: &DimensioneQuantitaIngredientiDto) -> String {
    format!(
        "ingrediente della personalizzazione {} e dimensione {}",
        dto.personalizzazione_ingrediente_id, dto.dimensione_bicchiere_id
    )
}

fn references(dto: &DimensioneQuantitaIngredientiDto) -> [Reference; 2] {
    [
        Reference::new(
            PERSONALIZZAZIONE_INGREDIENTE,
            personalizzazione_ingrediente::LABEL,
            dto.personalizzazione_ingrediente_id,
        ),
        Reference::new(
            DIMENSIONE_BICCHIERE,
            dimensione_bicchiere::LABEL,
            dto.dimensione_bicchiere_id,
        ),
    ]
}

/// Repository for per-size quantity multipliers of recipe lines
#[derive(Clone)]
pub struct DimensioneQuantitaIngredientiRepository {
    pool: SqlitePool,
}

impl DimensioneQuantitaIngredientiRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<DimensioneQuantitaIngredienti>> {
        let builder = SelectBuilder::new(DIMENSIONE_QUANTITA_INGREDIENTI)
            .order_by("personalizzazione_ingrediente_id ASC, dimensione_bicchiere_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<DimensioneQuantitaIngredienti>> {
        repository::find_by_id(&self.pool, DIMENSIONE_QUANTITA_INGREDIENTI, LABEL, id).await
    }

    pub async fn get_by_personalizzazione_ingrediente(
        &self,
        personalizzazione_ingrediente_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<DimensioneQuantitaIngredienti>> {
        if let Err(err) = validate_id(personalizzazione_ingrediente_id, "ID") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(DIMENSIONE_QUANTITA_INGREDIENTI)
            .eq("personalizzazione_ingrediente_id", personalizzazione_ingrediente_id)
            .order_by("dimensione_bicchiere_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(
        &self,
        dto: DimensioneQuantitaIngredientiDto,
    ) -> RepoResult<SingleResponse<DimensioneQuantitaIngredienti>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));

        let mut tx = self.pool.begin().await?;

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("personalizzazione_ingrediente_id", dto.personalizzazione_ingrediente_id),
            KeyPart::Int("dimensione_bicchiere_id", dto.dimensione_bicchiere_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, DimensioneQuantitaIngredienti>(
            r#"
            INSERT INTO dimensione_quantita_ingredienti
                (personalizzazione_ingrediente_id, dimensione_bicchiere_id, moltiplicatore)
            VALUES (?, ?, ?)
            RETURNING dimensione_id, personalizzazione_ingrediente_id, dimensione_bicchiere_id,
                      moltiplicatore
            "#,
        )
        .bind(dto.personalizzazione_ingrediente_id)
        .bind(dto.dimensione_bicchiere_id)
        .bind(dto.moltiplicatore)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Dimensione quantita created: {}", row.dimensione_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(
        &self,
        id: i64,
        dto: DimensioneQuantitaIngredientiDto,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<DimensioneQuantitaIngredienti, _>(
            &mut *tx,
            DIMENSIONE_QUANTITA_INGREDIENTI,
            id,
        )
        .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let unchanged = existing.personalizzazione_ingrediente_id == dto.personalizzazione_ingrediente_id
            && existing.dimensione_bicchiere_id == dto.dimensione_bicchiere_id
            && same_amount(existing.moltiplicatore, dto.moltiplicatore);
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("personalizzazione_ingrediente_id", dto.personalizzazione_ingrediente_id),
            KeyPart::Int("dimensione_bicchiere_id", dto.dimensione_bicchiere_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            r#"
            UPDATE dimensione_quantita_ingredienti
            SET personalizzazione_ingrediente_id = ?, dimensione_bicchiere_id = ?, moltiplicatore = ?
            WHERE dimensione_id = ?
            "#,
        )
        .bind(dto.personalizzazione_ingrediente_id)
        .bind(dto.dimensione_bicchiere_id)
        .bind(dto.moltiplicatore)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Dimensione quantita {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            DIMENSIONE_QUANTITA_INGREDIENTI,
            &DependencyGuard::none(),
            LABEL,
            id,
            false,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, DIMENSIONE_QUANTITA_INGREDIENTI, LABEL, id).await
    }

    pub async fn exists_by_combinazione(
        &self,
        personalizzazione_ingrediente_id: i64,
        dimensione_bicchiere_id: i64,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(personalizzazione_ingrediente_id, "ID")
            .and_then(|_| validate_id(dimensione_bicchiere_id, "ID dimensione bicchiere"))
        {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let builder = SelectBuilder::new(DIMENSIONE_QUANTITA_INGREDIENTI)
            .eq("personalizzazione_ingrediente_id", personalizzazione_ingrediente_id)
            .eq("dimensione_bicchiere_id", dimensione_bicchiere_id)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(DIMENSIONE_QUANTITA_INGREDIENTI)).await
    }
}
