// Uniqueness and dependency guards
// Both run on a connection borrowed from the caller's transaction so the
// check and the write that follows it share one unit of work.

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::RepoResult;
use crate::messages::{self, Label};
use crate::orders::ordine;
use crate::response::SingleResponse;
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::validate_id;

/// One component of a business key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyPart<'a> {
    /// Trimmed, case-insensitive text
    Text(&'static str, &'a str),
    Int(&'static str, i64),
    Real(&'static str, f64),
}

/// Checks business-key uniqueness for one table
#[derive(Debug, Clone, Copy)]
pub struct UniquenessGuard {
    spec: TableSpec,
}

impl UniquenessGuard {
    pub const fn new(spec: TableSpec) -> Self {
        Self { spec }
    }

    /// True when no other row carries `key`.
    ///
    /// # Arguments
    /// * `key` - Single or composite business key
    /// * `exclude_id` - Row being updated, ignored by the check
    pub async fn is_unique(
        &self,
        conn: &mut SqliteConnection,
        key: &[KeyPart<'_>],
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        let mut builder = SelectBuilder::new(self.spec);
        for part in key {
            builder = match *part {
                KeyPart::Text(column, value) => builder.eq_ignore_case(column, value),
                KeyPart::Int(column, value) => builder.eq(column, value),
                KeyPart::Real(column, value) => builder.approx_eq(column, value),
            };
        }
        let taken = builder.exclude_id(exclude_id).exists(conn).await?;
        if taken {
            tracing::warn!("Business key already present in {}", self.spec.table);
        }
        Ok(!taken)
    }
}

/// A relation whose rows reference the guarded entity.
///
/// A forced delete removes the rows of every relation. Rows that are
/// themselves referenced list those relations in `nested`; they are removed
/// first so the foreign keys hold at every statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub table: &'static str,
    /// Foreign-key column pointing at the guarded entity
    pub column: &'static str,
    /// Plural Italian description used in messages
    pub descrizione: &'static str,
    /// Primary key of `table`, referenced by the `nested` relations
    pub key: &'static str,
    pub nested: &'static [Dependency],
    /// Column naming the order whose total is derived from these rows
    pub totals_of: Option<&'static str>,
    /// Parameterless statement run once the rows are gone
    pub cleanup: Option<&'static str>,
}

impl Dependency {
    pub const fn new(table: &'static str, column: &'static str, descrizione: &'static str) -> Self {
        Self {
            table,
            column,
            descrizione,
            key: "",
            nested: &[],
            totals_of: None,
            cleanup: None,
        }
    }

    pub const fn with_nested(self, key: &'static str, nested: &'static [Dependency]) -> Self {
        Self { key, nested, ..self }
    }

    pub const fn refreshing_totals(self, column: &'static str) -> Self {
        Self {
            totals_of: Some(column),
            ..self
        }
    }

    pub const fn with_cleanup(self, sql: &'static str) -> Self {
        Self {
            cleanup: Some(sql),
            ..self
        }
    }
}

/// One statement of a forced delete. `Stale` and `Delete` bind the guarded
/// id exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeStep {
    /// Selects orders whose totals must be recomputed afterwards
    Stale(String),
    Delete(String),
    Cleanup(&'static str),
}

fn plan_removal(dep: &Dependency, scope: &str, steps: &mut Vec<CascadeStep>) {
    if !dep.nested.is_empty() {
        let keys = format!("SELECT {} FROM {} WHERE {}", dep.key, dep.table, scope);
        for child in dep.nested {
            plan_removal(child, &format!("{} IN ({})", child.column, keys), steps);
        }
    }
    if let Some(owner) = dep.totals_of {
        steps.push(CascadeStep::Stale(format!(
            "SELECT DISTINCT {} FROM {} WHERE {}",
            owner, dep.table, scope
        )));
    }
    steps.push(CascadeStep::Delete(format!("DELETE FROM {} WHERE {}", dep.table, scope)));
    if let Some(sql) = dep.cleanup {
        steps.push(CascadeStep::Cleanup(sql));
    }
}

/// Dependents found for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    pub presenti: Vec<(Dependency, i64)>,
}

impl DependencyReport {
    pub fn is_empty(&self) -> bool {
        self.presenti.is_empty()
    }

    /// `"ordini: 2, configurazioni soglie: 1"`
    pub fn describe(&self) -> String {
        self.presenti
            .iter()
            .map(|(dep, count)| format!("{}: {}", dep.descrizione, count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Outcome of applying the dependency rules to a delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePlan {
    /// No dependents
    Proceed,
    /// Forced delete: remove the dependents first
    Cascade,
    Rejected(String),
}

impl DeletePlan {
    pub fn decide(report: &DependencyReport, force_delete: bool, label: Label) -> Self {
        if report.is_empty() {
            DeletePlan::Proceed
        } else if force_delete {
            DeletePlan::Cascade
        } else {
            DeletePlan::Rejected(messages::dipendenze_presenti(label, &report.describe()))
        }
    }
}

/// Known dependent relations of one entity kind
#[derive(Debug, Clone, Copy)]
pub struct DependencyGuard {
    dependencies: &'static [Dependency],
}

impl DependencyGuard {
    pub const fn new(dependencies: &'static [Dependency]) -> Self {
        Self { dependencies }
    }

    pub const fn none() -> Self {
        Self { dependencies: &[] }
    }

    /// Counts referencing rows per relation; relations with no rows are omitted.
    pub async fn inspect(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> RepoResult<DependencyReport> {
        let mut report = DependencyReport::default();
        for dep in self.dependencies {
            let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", dep.table, dep.column);
            let count: i64 = sqlx::query_scalar(&sql)
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
            if count > 0 {
                report.presenti.push((*dep, count));
            }
        }
        Ok(report)
    }

    pub async fn check_dependencies(&self, conn: &mut SqliteConnection, id: i64) -> RepoResult<bool> {
        Ok(!self.inspect(conn, id).await?.is_empty())
    }

    /// Statements removing every dependent of one entity, leaves first
    pub fn cascade_plan(&self) -> Vec<CascadeStep> {
        let mut steps = Vec::new();
        for dep in self.dependencies {
            plan_removal(dep, &format!("{} = ?", dep.column), &mut steps);
        }
        steps
    }

    /// Deletes every dependent row, returning how many were removed.
    ///
    /// Orders that lose lines without being deleted get their totals
    /// recomputed on the same connection.
    pub async fn remove_dependents(&self, conn: &mut SqliteConnection, id: i64) -> RepoResult<u64> {
        let mut removed = 0;
        let mut stale = BTreeSet::new();
        for step in self.cascade_plan() {
            match step {
                CascadeStep::Stale(sql) => {
                    let ordini: Vec<i64> = sqlx::query_scalar(&sql)
                        .bind(id)
                        .fetch_all(&mut *conn)
                        .await?;
                    stale.extend(ordini);
                }
                CascadeStep::Delete(sql) => {
                    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
                    removed += result.rows_affected();
                }
                CascadeStep::Cleanup(sql) => {
                    let result = sqlx::query(sql).execute(&mut *conn).await?;
                    removed += result.rows_affected();
                }
            }
        }

        let now = Utc::now();
        for ordine_id in stale {
            if store::row_exists(&mut *conn, ordine::ORDINE, ordine_id).await? {
                ordine::aggiorna_totale(&mut *conn, ordine_id, now).await?;
            }
        }
        Ok(removed)
    }
}

/// Delete flow shared by single-table entities.
///
/// Validates the id, resolves the row, applies the dependency rules and
/// deletes (cascading when forced) in one transaction.
pub async fn guarded_delete(
    pool: &sqlx::SqlitePool,
    spec: TableSpec,
    guard: &DependencyGuard,
    label: Label,
    id: i64,
    force_delete: bool,
) -> RepoResult<SingleResponse<bool>> {
    if let Err(err) = validate_id(id, "ID") {
        return Ok(SingleResponse::fail(err.to_string()));
    }

    let mut tx = pool.begin().await?;

    let exists = SelectBuilder::new(spec)
        .eq(spec.id_column, id)
        .exists(&mut *tx)
        .await?;
    if !exists {
        return Ok(SingleResponse::fail(messages::non_trovato(label, id)));
    }

    let report = guard.inspect(&mut *tx, id).await?;
    match DeletePlan::decide(&report, force_delete, label) {
        DeletePlan::Rejected(message) => {
            tracing::warn!("Delete of {} {} rejected: {}", spec.table, id, report.describe());
            return Ok(SingleResponse::fail(message));
        }
        DeletePlan::Cascade => {
            let removed = guard.remove_dependents(&mut *tx, id).await?;
            tracing::info!("Removed {} dependent rows of {} {}", removed, spec.table, id);
        }
        DeletePlan::Proceed => {}
    }

    store::delete_by_id(&mut *tx, spec, id).await?;
    tx.commit().await?;

    tracing::info!("Deleted {} {}", spec.table, id);
    Ok(SingleResponse::ok(true, messages::eliminato(label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::stato_ordine::STATO_ORDINE;
    use crate::test_support::TestDb;

    const LABEL: Label = Label::maschile("Stato ordine", "uno stato ordine");

    const SOGLIE: Dependency =
        Dependency::new("config_soglie_tempi", "stato_ordine_id", "configurazioni soglie");
    const RIGHE: Dependency = Dependency::new("order_item", "ordine_id", "righe d'ordine");
    const STORICO: Dependency = Dependency::new("stato_storico_ordine", "ordine_id", "storico stati");
    const PER_ORDINE: &[Dependency] = &[RIGHE, STORICO];
    const ORDINI: Dependency =
        Dependency::new("ordine", "stato_ordine_id", "ordini").with_nested("ordine_id", PER_ORDINE);
    const STATO: &[Dependency] = &[SOGLIE, ORDINI];

    #[test]
    fn test_plan_without_dependents_proceeds() {
        let report = DependencyReport::default();
        assert_eq!(DeletePlan::decide(&report, false, LABEL), DeletePlan::Proceed);
    }

    #[test]
    fn test_plan_requires_force_for_dependents() {
        let report = DependencyReport {
            presenti: vec![(SOGLIE, 1), (ORDINI, 2)],
        };
        match DeletePlan::decide(&report, false, LABEL) {
            DeletePlan::Rejected(message) => {
                assert!(message.contains("dipendenze"));
                assert!(message.contains("configurazioni soglie: 1, ordini: 2"));
                assert!(message.contains("force_delete"));
            }
            other => panic!("unexpected plan {other:?}"),
        }
        assert_eq!(DeletePlan::decide(&report, true, LABEL), DeletePlan::Cascade);
    }

    #[test]
    fn test_report_describe() {
        let report = DependencyReport {
            presenti: vec![(ORDINI, 2), (SOGLIE, 1)],
        };
        assert_eq!(report.describe(), "ordini: 2, configurazioni soglie: 1");
    }

    #[test]
    fn test_cascade_plan_removes_nested_rows_first() {
        let steps = DependencyGuard::new(STATO).cascade_plan();
        let ordini = "SELECT ordine_id FROM ordine WHERE stato_ordine_id = ?";
        assert_eq!(
            steps,
            vec![
                CascadeStep::Delete("DELETE FROM config_soglie_tempi WHERE stato_ordine_id = ?".to_string()),
                CascadeStep::Delete(format!("DELETE FROM order_item WHERE ordine_id IN ({ordini})")),
                CascadeStep::Delete(format!("DELETE FROM stato_storico_ordine WHERE ordine_id IN ({ordini})")),
                CascadeStep::Delete("DELETE FROM ordine WHERE stato_ordine_id = ?".to_string()),
            ]
        );
    }

    #[test]
    fn test_cascade_plan_collects_stale_orders_and_cleans_up() {
        const LINES: &[Dependency] =
            &[Dependency::new("order_item", "articolo_id", "righe").refreshing_totals("ordine_id")];
        const VARIANTI: &[Dependency] = &[Dependency::new("dolce", "articolo_id", "dolci")
            .with_nested("articolo_id", LINES)
            .with_cleanup("DELETE FROM articolo WHERE tipo = 'D'")];

        let steps = DependencyGuard::new(VARIANTI).cascade_plan();
        assert_eq!(steps.len(), 4);
        assert_eq!(
            steps[0],
            CascadeStep::Stale(
                "SELECT DISTINCT ordine_id FROM order_item WHERE articolo_id IN \
                 (SELECT articolo_id FROM dolce WHERE articolo_id = ?)"
                    .to_string()
            )
        );
        assert!(matches!(&steps[1], CascadeStep::Delete(sql) if sql.starts_with("DELETE FROM order_item")));
        assert_eq!(steps[2], CascadeStep::Delete("DELETE FROM dolce WHERE articolo_id = ?".to_string()));
        assert_eq!(steps[3], CascadeStep::Cleanup("DELETE FROM articolo WHERE tipo = 'D'"));
    }

    #[tokio::test]
    async fn test_check_dependencies_around_forced_delete() {
        let db = TestDb::seeded().await;
        let cliente = db.cliente_pronto().await;
        let stato = db.stato_ordine("sospeso", false).await;
        let pagamento = db.stato_pagamento_id("non_pagato").await;
        db.config_soglie(stato).await;
        db.ordine(cliente, stato, pagamento).await;
        let guard = DependencyGuard::new(STATO);

        let mut conn = db.pool.acquire().await.unwrap();
        assert!(guard.check_dependencies(&mut conn, stato).await.unwrap());
        drop(conn);

        let refused = guarded_delete(&db.pool, STATO_ORDINE, &guard, LABEL, stato, false)
            .await
            .unwrap();
        assert!(!refused.success);
        assert_eq!(db.count("ordine").await, 1);

        let forced = guarded_delete(&db.pool, STATO_ORDINE, &guard, LABEL, stato, true)
            .await
            .unwrap();
        assert!(forced.success, "{}", forced.message);

        let mut conn = db.pool.acquire().await.unwrap();
        assert!(!guard.check_dependencies(&mut conn, stato).await.unwrap());
        drop(conn);
        assert_eq!(db.count("ordine").await, 0);
        assert_eq!(db.count("config_soglie_tempi").await, 0);
    }
}
