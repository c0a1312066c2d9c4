use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::orders::models::{ConfigSoglieTempi, ConfigSoglieTempiDto};
use crate::orders::stato_ordine::{self, STATO_ORDINE};
use crate::repository::{self, absorb_unique_violation, missing_reference, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id};

pub const CONFIG_SOGLIE_TEMPI: TableSpec = TableSpec {
    table: "config_soglie_tempi",
    id_column: "soglia_id",
    columns: "soglia_id, stato_ordine_id, soglia_attenzione, soglia_critico, data_aggiornamento, \
              utente_aggiornamento",
};

pub const LABEL: Label = Label::femminile("Configurazione soglie", "una configurazione soglie");

const UNIQUE: UniquenessGuard = UniquenessGuard::new(CONFIG_SOGLIE_TEMPI);

const SOGLIE_INCOERENTI: &str = "La soglia di attenzione deve essere inferiore alla soglia critica";

/// Field validation plus the cross-field rule `attenzione < critico`.
fn validate(dto: &ConfigSoglieTempiDto) -> Result<(), String> {
    validate_dto(dto).map_err(|err| err.to_string())?;
    if dto.soglia_attenzione >= dto.soglia_critico {
        return Err(SOGLIE_INCOERENTI.to_string());
    }
    Ok(())
}

fn utente(dto: &ConfigSoglieTempiDto) -> Option<String> {
    dto.utente_aggiornamento
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// Repository for per-state waiting-time thresholds
#[derive(Clone)]
pub struct ConfigSoglieTempiRepository {
    pool: SqlitePool,
}

impl ConfigSoglieTempiRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<ConfigSoglieTempi>> {
        let builder = SelectBuilder::new(CONFIG_SOGLIE_TEMPI).order_by("stato_ordine_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<ConfigSoglieTempi>> {
        repository::find_by_id(&self.pool, CONFIG_SOGLIE_TEMPI, LABEL, id).await
    }

    pub async fn get_by_stato_ordine(&self, stato_ordine_id: i64) -> RepoResult<SingleResponse<ConfigSoglieTempi>> {
        if let Err(err) = validate_id(stato_ordine_id, "ID stato ordine") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let row = SelectBuilder::new(CONFIG_SOGLIE_TEMPI)
            .eq("stato_ordine_id", stato_ordine_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(
                LABEL,
                &format!("stato ordine {stato_ordine_id}"),
            )),
        })
    }

    pub async fn add(&self, dto: ConfigSoglieTempiDto) -> RepoResult<SingleResponse<ConfigSoglieTempi>> {
        if let Err(message) = validate(&dto) {
            return Ok(SingleResponse::fail(message));
        }
        let conflitto = messages::esiste_gia(LABEL, &format!("stato ordine {}", dto.stato_ordine_id));

        let mut tx = self.pool.begin().await?;

        let references = [Reference::new(STATO_ORDINE, stato_ordine::LABEL, dto.stato_ordine_id)];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [KeyPart::Int("stato_ordine_id", dto.stato_ordine_id)];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, ConfigSoglieTempi>(
            r#"
            INSERT INTO config_soglie_tempi
                (stato_ordine_id, soglia_attenzione, soglia_critico, data_aggiornamento, utente_aggiornamento)
            VALUES (?, ?, ?, ?, ?)
            RETURNING soglia_id, stato_ordine_id, soglia_attenzione, soglia_critico, data_aggiornamento,
                      utente_aggiornamento
            "#,
        )
        .bind(dto.stato_ordine_id)
        .bind(dto.soglia_attenzione)
        .bind(dto.soglia_critico)
        .bind(Utc::now())
        .bind(utente(&dto))
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Soglie configured for stato ordine {}", row.stato_ordine_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: ConfigSoglieTempiDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        if let Err(message) = validate(&dto) {
            return Ok(SingleResponse::fail(message));
        }
        let conflitto = messages::esiste_gia(LABEL, &format!("stato ordine {}", dto.stato_ordine_id));
        let utente_aggiornamento = utente(&dto);

        let mut tx = self.pool.begin().await?;

        let Some(existing) =
            store::fetch_by_id::<ConfigSoglieTempi, _>(&mut *tx, CONFIG_SOGLIE_TEMPI, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let unchanged = existing.stato_ordine_id == dto.stato_ordine_id
            && existing.soglia_attenzione == dto.soglia_attenzione
            && existing.soglia_critico == dto.soglia_critico
            && existing.utente_aggiornamento == utente_aggiornamento;
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        let references = [Reference::new(STATO_ORDINE, stato_ordine::LABEL, dto.stato_ordine_id)];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [KeyPart::Int("stato_ordine_id", dto.stato_ordine_id)];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            r#"
            UPDATE config_soglie_tempi
            SET stato_ordine_id = ?, soglia_attenzione = ?, soglia_critico = ?,
                data_aggiornamento = ?, utente_aggiornamento = ?
            WHERE soglia_id = ?
            "#,
        )
        .bind(dto.stato_ordine_id)
        .bind(dto.soglia_attenzione)
        .bind(dto.soglia_critico)
        .bind(Utc::now())
        .bind(&utente_aggiornamento)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Soglie {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            CONFIG_SOGLIE_TEMPI,
            &DependencyGuard::none(),
            LABEL,
            id,
            false,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, CONFIG_SOGLIE_TEMPI, LABEL, id).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(CONFIG_SOGLIE_TEMPI)).await
    }
}
