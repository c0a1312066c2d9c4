// Read flows and write helpers shared by the entity repositories

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::error::{RepoResult, RepositoryError};
use crate::messages::{self, Label};
use crate::pagination::PageWindow;
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::validate_id;

/// A foreign key supplied by the caller, checked before writing
#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub spec: TableSpec,
    pub label: Label,
    pub id: i64,
}

impl Reference {
    pub const fn new(spec: TableSpec, label: Label, id: i64) -> Self {
        Self { spec, label, id }
    }
}

/// `get_by_id`: invalid id and missing row both yield a failed envelope.
pub async fn find_by_id<T>(
    pool: &SqlitePool,
    spec: TableSpec,
    label: Label,
    id: i64,
) -> RepoResult<SingleResponse<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    if let Err(err) = validate_id(id, "ID") {
        return Ok(SingleResponse::fail(err.to_string()));
    }

    tracing::debug!("Fetching {} {}", spec.table, id);
    match store::fetch_by_id::<T, _>(pool, spec, id).await? {
        Some(row) => Ok(SingleResponse::ok(row, messages::trovato(label))),
        None => Ok(SingleResponse::fail(messages::non_trovato(label, id))),
    }
}

/// Runs a filtered, sorted query through the pagination window.
pub async fn find_page<T>(
    pool: &SqlitePool,
    builder: SelectBuilder,
    page: i64,
    page_size: i64,
) -> RepoResult<PaginatedResponse<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let window = PageWindow::new(page, page_size);
    let (rows, total) = store::fetch_page::<T>(pool, builder, window).await?;
    Ok(PaginatedResponse::new(rows, &window, total).with_message(messages::elenco(total)))
}

/// `exists(id)`: success carries the boolean answer; only a malformed id fails.
pub async fn exists(
    pool: &SqlitePool,
    spec: TableSpec,
    label: Label,
    id: i64,
) -> RepoResult<SingleResponse<bool>> {
    if let Err(err) = validate_id(id, "ID") {
        return Ok(SingleResponse::fail(err.to_string()));
    }
    let found = store::row_exists(pool, spec, id).await?;
    Ok(SingleResponse::ok(found, messages::esistenza(label, found)))
}

/// Existence over an arbitrary predicate, e.g. a business key
pub async fn exists_where(
    pool: &SqlitePool,
    builder: SelectBuilder,
    label: Label,
) -> RepoResult<SingleResponse<bool>> {
    let found = builder.exists(pool).await?;
    Ok(SingleResponse::ok(found, messages::esistenza(label, found)))
}

pub async fn count(pool: &SqlitePool, builder: SelectBuilder) -> RepoResult<SingleResponse<i64>> {
    let total = builder.count(pool).await?;
    Ok(SingleResponse::ok(total, messages::conteggio(total)))
}

/// Returns the not-found message of the first reference that does not resolve.
pub async fn missing_reference(
    conn: &mut SqliteConnection,
    references: &[Reference],
) -> RepoResult<Option<String>> {
    for reference in references {
        if !store::row_exists(&mut *conn, reference.spec, reference.id).await? {
            return Ok(Some(messages::non_trovato(reference.label, reference.id)));
        }
    }
    Ok(None)
}

/// Turns a unique-index violation into `Ok(None)` so the caller can answer
/// with the conflict envelope; every other outcome passes through.
pub fn absorb_unique_violation<T>(result: RepoResult<T>) -> RepoResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_unique_violation() => {
            tracing::warn!("Unique index rejected write: {}", err);
            Ok(None)
        }
        Err(err) => {
            tracing::error!("Write failed: {}", err);
            Err(err)
        }
    }
}

/// Equality for stored REAL values
pub fn same_amount(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Date-range arguments are structural: an inverted range or an end in the
/// future is a caller bug, reported as `Err` rather than an envelope.
pub fn check_date_range(start: DateTime<Utc>, end: DateTime<Utc>) -> RepoResult<()> {
    if end < start {
        return Err(RepositoryError::invalid_argument(
            "La data di fine deve essere successiva alla data di inizio",
        ));
    }
    if end > Utc::now() {
        return Err(RepositoryError::invalid_argument(
            "La data di fine non può essere nel futuro",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_absorb_passes_success_through() {
        let result: RepoResult<i32> = Ok(3);
        assert_eq!(absorb_unique_violation(result).unwrap(), Some(3));
    }

    #[test]
    fn test_absorb_keeps_other_errors() {
        let result: RepoResult<i32> = Err(RepositoryError::invalid_argument("x"));
        assert!(absorb_unique_violation(result).is_err());
    }

    #[test]
    fn test_same_amount() {
        assert!(same_amount(0.1 + 0.2, 0.3));
        assert!(!same_amount(4.5, 4.51));
    }

    #[test]
    fn test_date_range_rules() {
        let now = Utc::now();
        assert!(check_date_range(now - Duration::days(2), now - Duration::days(1)).is_ok());
        assert!(matches!(
            check_date_range(now - Duration::days(1), now - Duration::days(2)),
            Err(RepositoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            check_date_range(now, now + Duration::days(1)),
            Err(RepositoryError::InvalidArgument(_))
        ));
    }
}
