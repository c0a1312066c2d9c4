use chrono::Utc;
use sqlx::SqlitePool;

use crate::catalog::articolo;
use crate::catalog::dimensione_bicchiere::{self, DIMENSIONE_BICCHIERE};
use crate::catalog::models::{PersonalizzazioneCustom, PersonalizzazioneCustomDto};
use crate::error::RepoResult;
use crate::guards::{self, Dependency, DependencyGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pagination::PageWindow;
use crate::repository::{self, missing_reference, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_range};

pub const PERSONALIZZAZIONE_CUSTOM: TableSpec = TableSpec {
    table: "personalizzazione_custom",
    id_column: "pers_custom_id",
    columns: "pers_custom_id, nome, grado_dolcezza, dimensione_bicchiere_id, data_creazione, data_aggiornamento",
};

pub const LABEL: Label = Label::femminile("Personalizzazione custom", "una personalizzazione custom");

pub(crate) const DEPENDENCIES: &[Dependency] = &[
    articolo::bevande_custom("pers_custom_id"),
    Dependency::new(
        "ingredienti_personalizzazione",
        "pers_custom_id",
        "ingredienti selezionati",
    ),
];

pub(crate) const fn personalizzazioni_custom(column: &'static str) -> Dependency {
    Dependency::new("personalizzazione_custom", column, "personalizzazioni custom")
        .with_nested("pers_custom_id", DEPENDENCIES)
}

/// Repository for customer-built recipes
#[derive(Clone)]
pub struct PersonalizzazioneCustomRepository {
    pool: SqlitePool,
}

impl PersonalizzazioneCustomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent first
    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<PersonalizzazioneCustom>> {
        let builder = SelectBuilder::new(PERSONALIZZAZIONE_CUSTOM)
            .order_by("data_creazione DESC, pers_custom_id DESC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<PersonalizzazioneCustom>> {
        repository::find_by_id(&self.pool, PERSONALIZZAZIONE_CUSTOM, LABEL, id).await
    }

    pub async fn get_by_dimensione(
        &self,
        dimensione_bicchiere_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<PersonalizzazioneCustom>> {
        if let Err(err) = validate_id(dimensione_bicchiere_id, "ID dimensione bicchiere") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(PERSONALIZZAZIONE_CUSTOM)
            .eq("dimensione_bicchiere_id", dimensione_bicchiere_id)
            .order_by("nome COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_grado_dolcezza(
        &self,
        grado_dolcezza: i32,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<PersonalizzazioneCustom>> {
        if let Err(err) = validate_range(grado_dolcezza, 1, 3, "Grado dolcezza") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(PERSONALIZZAZIONE_CUSTOM)
            .eq("grado_dolcezza", grado_dolcezza)
            .order_by("nome COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(
        &self,
        dto: PersonalizzazioneCustomDto,
    ) -> RepoResult<SingleResponse<PersonalizzazioneCustom>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let references = [Reference::new(
            DIMENSIONE_BICCHIERE,
            dimensione_bicchiere::LABEL,
            dto.dimensione_bicchiere_id,
        )];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }

        let row = sqlx::query_as::<_, PersonalizzazioneCustom>(
            r#"
            INSERT INTO personalizzazione_custom
                (nome, grado_dolcezza, dimensione_bicchiere_id, data_creazione, data_aggiornamento)
            VALUES (?, ?, ?, ?, ?)
            RETURNING pers_custom_id, nome, grado_dolcezza, dimensione_bicchiere_id,
                      data_creazione, data_aggiornamento
            "#,
        )
        .bind(&nome)
        .bind(dto.grado_dolcezza)
        .bind(dto.dimensione_bicchiere_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("Personalizzazione custom created: {}", row.pers_custom_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(
        &self,
        id: i64,
        dto: PersonalizzazioneCustomDto,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();

        let mut tx = self.pool.begin().await?;

        let Some(existing) =
            store::fetch_by_id::<PersonalizzazioneCustom, _>(&mut *tx, PERSONALIZZAZIONE_CUSTOM, id)
                .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let unchanged = existing.nome == nome
            && existing.grado_dolcezza == dto.grado_dolcezza
            && existing.dimensione_bicchiere_id == dto.dimensione_bicchiere_id;
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        let references = [Reference::new(
            DIMENSIONE_BICCHIERE,
            dimensione_bicchiere::LABEL,
            dto.dimensione_bicchiere_id,
        )];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }

        sqlx::query(
            r#"
            UPDATE personalizzazione_custom
            SET nome = ?, grado_dolcezza = ?, dimensione_bicchiere_id = ?, data_aggiornamento = ?
            WHERE pers_custom_id = ?
            "#,
        )
        .bind(&nome)
        .bind(dto.grado_dolcezza)
        .bind(dto.dimensione_bicchiere_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("Personalizzazione custom {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    /// With `force_delete` the custom drink built on the recipe goes too,
    /// base row included, along with the ingredient selection.
    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            PERSONALIZZAZIONE_CUSTOM,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, PERSONALIZZAZIONE_CUSTOM, LABEL, id).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(PERSONALIZZAZIONE_CUSTOM)).await
    }
}
