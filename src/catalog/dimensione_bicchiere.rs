use sqlx::SqlitePool;

use crate::catalog::articolo;
use crate::catalog::models::{DimensioneBicchiere, DimensioneBicchiereDto};
use crate::catalog::personalizzazione_custom;
use crate::catalog::unita_di_misura::{self, UNITA_DI_MISURA};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::repository::{self, absorb_unique_violation, missing_reference, same_amount, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_required_text};

pub const DIMENSIONE_BICCHIERE: TableSpec = TableSpec {
    table: "dimensione_bicchiere",
    id_column: "dimensione_bicchiere_id",
    columns: "dimensione_bicchiere_id, sigla, descrizione, capienza, unita_misura_id, prezzo_base, moltiplicatore",
};

pub const LABEL: Label = Label::femminile("Dimensione bicchiere", "una dimensione bicchiere");

const DEPENDENCIES: &[Dependency] = &[
    articolo::bevande_standard("dimensione_bicchiere_id"),
    personalizzazione_custom::personalizzazioni_custom("dimensione_bicchiere_id"),
    Dependency::new(
        "dimensione_quantita_ingredienti",
        "dimensione_bicchiere_id",
        "quantità per dimensione",
    ),
];

pub(crate) const fn dimensioni_bicchiere(column: &'static str) -> Dependency {
    Dependency::new("dimensione_bicchiere", column, "dimensioni bicchiere")
        .with_nested("dimensione_bicchiere_id", DEPENDENCIES)
}

const UNIQUE: UniquenessGuard = UniquenessGuard::new(DIMENSIONE_BICCHIERE);

/// Repository for cup sizes
#[derive(Clone)]
pub struct DimensioneBicchiereRepository {
    pool: SqlitePool,
}

impl DimensioneBicchiereRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Cup sizes, smallest capacity first
    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<DimensioneBicchiere>> {
        let builder = SelectBuilder::new(DIMENSIONE_BICCHIERE)
            .order_by("capienza ASC, sigla COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<DimensioneBicchiere>> {
        repository::find_by_id(&self.pool, DIMENSIONE_BICCHIERE, LABEL, id).await
    }

    pub async fn get_by_sigla(&self, sigla: &str) -> RepoResult<SingleResponse<DimensioneBicchiere>> {
        let sigla = match validate_required_text(sigla, "Sigla", 10) {
            Ok(sigla) => sigla,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let row = SelectBuilder::new(DIMENSIONE_BICCHIERE)
            .eq_ignore_case("sigla", &sigla)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("sigla '{sigla}'"))),
        })
    }

    pub async fn add(
        &self,
        dto: DimensioneBicchiereDto,
    ) -> RepoResult<SingleResponse<DimensioneBicchiere>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let sigla = dto.sigla.trim().to_string();
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("sigla '{sigla}'"));

        let mut tx = self.pool.begin().await?;

        let references = [Reference::new(UNITA_DI_MISURA, unita_di_misura::LABEL, dto.unita_misura_id)];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("sigla", &sigla)], None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, DimensioneBicchiere>(
            r#"
            INSERT INTO dimensione_bicchiere
                (sigla, descrizione, capienza, unita_misura_id, prezzo_base, moltiplicatore)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING dimensione_bicchiere_id, sigla, descrizione, capienza, unita_misura_id,
                      prezzo_base, moltiplicatore
            "#,
        )
        .bind(&sigla)
        .bind(&descrizione)
        .bind(dto.capienza)
        .bind(dto.unita_misura_id)
        .bind(dto.prezzo_base)
        .bind(dto.moltiplicatore)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Dimensione bicchiere created: {} ({})", row.dimensione_bicchiere_id, row.sigla);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(
        &self,
        id: i64,
        dto: DimensioneBicchiereDto,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let sigla = dto.sigla.trim().to_string();
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("sigla '{sigla}'"));

        let mut tx = self.pool.begin().await?;

        let Some(existing) =
            store::fetch_by_id::<DimensioneBicchiere, _>(&mut *tx, DIMENSIONE_BICCHIERE, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };

        let unchanged = existing.sigla == sigla
            && existing.descrizione == descrizione
            && same_amount(existing.capienza, dto.capienza)
            && existing.unita_misura_id == dto.unita_misura_id
            && same_amount(existing.prezzo_base, dto.prezzo_base)
            && same_amount(existing.moltiplicatore, dto.moltiplicatore);
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        let references = [Reference::new(UNITA_DI_MISURA, unita_di_misura::LABEL, dto.unita_misura_id)];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("sigla", &sigla)], Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            r#"
            UPDATE dimensione_bicchiere
            SET sigla = ?, descrizione = ?, capienza = ?, unita_misura_id = ?,
                prezzo_base = ?, moltiplicatore = ?
            WHERE dimensione_bicchiere_id = ?
            "#,
        )
        .bind(&sigla)
        .bind(&descrizione)
        .bind(dto.capienza)
        .bind(dto.unita_misura_id)
        .bind(dto.prezzo_base)
        .bind(dto.moltiplicatore)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Dimensione bicchiere {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            DIMENSIONE_BICCHIERE,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, DIMENSIONE_BICCHIERE, LABEL, id).await
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
        let builder = SelectBuilder::new(DIMENSIONE_BICCHIERE)
            .eq_ignore_case("sigla", &sigla)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(DIMENSIONE_BICCHIERE)).await
    }
}
