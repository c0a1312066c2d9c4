use sqlx::SqlitePool;

use crate::catalog::models::{UnitaDiMisura, UnitaDiMisuraDto};
use crate::catalog::{dimensione_bicchiere, personalizzazione_ingrediente};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::repository::{self, absorb_unique_violation};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_required_text};

pub const UNITA_DI_MISURA: TableSpec = TableSpec {
    table: "unita_di_misura",
    id_column: "unita_misura_id",
    columns: "unita_misura_id, sigla, descrizione",
};

pub const LABEL: Label = Label::femminile("Unità di misura", "un'unità di misura");

/// A forced delete reaches down to the drinks built on the removed sizes.
const DEPENDENCIES: &[Dependency] = &[
    dimensione_bicchiere::dimensioni_bicchiere("unita_misura_id"),
    personalizzazione_ingrediente::personalizzazioni_ingrediente(
        "unita_misura_id",
        "ingredienti di personalizzazione",
    ),
];

const UNIQUE: UniquenessGuard = UniquenessGuard::new(UNITA_DI_MISURA);

/// Repository for units of measure
#[derive(Clone)]
pub struct UnitaDiMisuraRepository {
    pool: SqlitePool,
}

impl UnitaDiMisuraRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<UnitaDiMisura>> {
        let builder = SelectBuilder::new(UNITA_DI_MISURA).order_by("sigla COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<UnitaDiMisura>> {
        repository::find_by_id(&self.pool, UNITA_DI_MISURA, LABEL, id).await
    }

    pub async fn get_by_sigla(&self, sigla: &str) -> RepoResult<SingleResponse<UnitaDiMisura>> {
        let sigla = match validate_required_text(sigla, "Sigla", 10) {
            Ok(sigla) => sigla,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let row = SelectBuilder::new(UNITA_DI_MISURA)
            .eq_ignore_case("sigla", &sigla)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("sigla '{sigla}'"))),
        })
    }

    pub async fn add(&self, dto: UnitaDiMisuraDto) -> RepoResult<SingleResponse<UnitaDiMisura>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let sigla = dto.sigla.trim().to_string();
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("sigla '{sigla}'"));

        let mut tx = self.pool.begin().await?;

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("sigla", &sigla)], None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, UnitaDiMisura>(
            r#"
            INSERT INTO unita_di_misura (sigla, descrizione)
            VALUES (?, ?)
            RETURNING unita_misura_id, sigla, descrizione
            "#,
        )
        .bind(&sigla)
        .bind(&descrizione)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Unita di misura created: {} ({})", row.unita_misura_id, row.sigla);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: UnitaDiMisuraDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let sigla = dto.sigla.trim().to_string();
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("sigla '{sigla}'"));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<UnitaDiMisura, _>(&mut *tx, UNITA_DI_MISURA, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.sigla == sigla && existing.descrizione == descrizione {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("sigla", &sigla)], Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            "UPDATE unita_di_misura SET sigla = ?, descrizione = ? WHERE unita_misura_id = ?",
        )
        .bind(&sigla)
        .bind(&descrizione)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Unita di misura {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            UNITA_DI_MISURA,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, UNITA_DI_MISURA, LABEL, id).await
    }

    pub async fn exists_by_sigla(
        &self,
        sigla: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        let sigla = match validate_required_text(sigla, "Sigla", 10) {
            Ok(sigla) => sigla,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let builder = SelectBuilder::new(UNITA_DI_MISURA)
            .eq_ignore_case("sigla", &sigla)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(UNITA_DI_MISURA)).await
    }
}
