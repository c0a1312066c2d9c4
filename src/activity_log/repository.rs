use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::activity_log::models::{ConteggioPerTipo, LogAttivita, LogAttivitaDto};
use crate::config::AppConfig;
use crate::error::RepoResult;
use crate::messages::{self, Label};
use crate::pagination::PageWindow;
use crate::repository::{self, check_date_range, missing_reference, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{SelectBuilder, SqlValue, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_optional_text, validate_range, validate_required_text};

pub const LOG_ATTIVITA: TableSpec = TableSpec {
    table: "log_attivita",
    id_column: "log_id",
    columns: "log_id, tipo_attivita, descrizione, dettagli, data_esecuzione, utente_id",
};

pub const LABEL: Label = Label::maschile("Log attività", "un log attività");

const UTENTE: TableSpec = TableSpec {
    table: "utenti",
    id_column: "utente_id",
    columns: "utente_id, email, nome, cognome, tipo_utente, attivo, data_creazione",
};

const UTENTE_LABEL: Label = Label::maschile("Utente", "un utente");

/// Retention accepted by the purge, in days
const MAX_RETENTION_DAYS: i64 = 3650;

const ORDINAMENTO: &str = "data_esecuzione DESC, log_id DESC";

/// Repository for the activity log
#[derive(Clone)]
pub struct LogAttivitaRepository {
    pool: SqlitePool,
}

impl LogAttivitaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Newest first
    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<LogAttivita>> {
        let builder = SelectBuilder::new(LOG_ATTIVITA).order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<LogAttivita>> {
        repository::find_by_id(&self.pool, LOG_ATTIVITA, LABEL, id).await
    }

    pub async fn get_by_tipo(
        &self,
        tipo_attivita: &str,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<LogAttivita>> {
        let tipo = match validate_required_text(tipo_attivita, "Tipo attività", 50) {
            Ok(tipo) => tipo,
            Err(err) => {
                return Ok(PaginatedResponse::rejected(
                    &PageWindow::new(page, page_size),
                    err.to_string(),
                ))
            }
        };
        let builder = SelectBuilder::new(LOG_ATTIVITA)
            .eq_ignore_case("tipo_attivita", &tipo)
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_utente(
        &self,
        utente_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<LogAttivita>> {
        if let Err(err) = validate_id(utente_id, "ID utente") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(LOG_ATTIVITA)
            .eq("utente_id", utente_id)
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    /// Entries executed within `[start, end]`.
    ///
    /// # Errors
    /// `RepositoryError::InvalidArgument` when `end < start` or `end` is in the future.
    pub async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<LogAttivita>> {
        check_date_range(start, end)?;
        let builder = SelectBuilder::new(LOG_ATTIVITA)
            .between(
                "data_esecuzione",
                Some(SqlValue::from(start)),
                Some(SqlValue::from(end)),
            )
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    /// Records an activity. A user id, when given, must resolve.
    pub async fn add(&self, dto: LogAttivitaDto) -> RepoResult<SingleResponse<LogAttivita>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let dettagli = match validate_optional_text(dto.dettagli.as_deref(), "Dettagli", 4000) {
            Ok(dettagli) => dettagli,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };

        let mut conn = self.pool.acquire().await?;

        if let Some(utente_id) = dto.utente_id {
            let references = [Reference::new(UTENTE, UTENTE_LABEL, utente_id)];
            if let Some(message) = missing_reference(&mut conn, &references).await? {
                return Ok(SingleResponse::fail(message));
            }
        }

        let row = sqlx::query_as::<_, LogAttivita>(
            r#"
            INSERT INTO log_attivita (tipo_attivita, descrizione, dettagli, data_esecuzione, utente_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING log_id, tipo_attivita, descrizione, dettagli, data_esecuzione, utente_id
            "#,
        )
        .bind(dto.tipo_attivita.trim())
        .bind(dto.descrizione.trim())
        .bind(dettagli)
        .bind(Utc::now())
        .bind(dto.utente_id)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!("Activity logged: {} ({})", row.log_id, row.tipo_attivita);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    /// Deletes entries older than `days` days in one statement and returns
    /// how many were removed.
    pub async fn purge_older_than(&self, days: i64) -> RepoResult<SingleResponse<u64>> {
        if let Err(err) = validate_range(days, 1, MAX_RETENTION_DAYS, "Giorni di conservazione") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let cutoff = Utc::now() - Duration::days(days);

        let result = sqlx::query("DELETE FROM log_attivita WHERE data_esecuzione < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected();

        tracing::info!("Purged {} activity log entries older than {} days", removed, days);
        Ok(SingleResponse::ok(
            removed,
            format!("Eliminati {removed} log più vecchi di {days} giorni"),
        ))
    }

    pub async fn purge_with_retention(&self, config: &AppConfig) -> RepoResult<SingleResponse<u64>> {
        self.purge_older_than(config.log_retention_days).await
    }

    /// Entry count per activity type, most frequent first
    pub async fn conteggio_per_tipo(&self) -> RepoResult<SingleResponse<Vec<ConteggioPerTipo>>> {
        let rows = sqlx::query_as::<_, ConteggioPerTipo>(
            r#"
            SELECT tipo_attivita, COUNT(*) AS conteggio
            FROM log_attivita
            GROUP BY tipo_attivita
            ORDER BY conteggio DESC, tipo_attivita ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = rows.iter().map(|row| row.conteggio).sum();
        Ok(SingleResponse::ok(rows, messages::conteggio(total)))
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, LOG_ATTIVITA, LABEL, id).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(LOG_ATTIVITA)).await
    }
}
