use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::RepoResult;

/// Order states created by `db::seed_defaults`, in workflow order, with their terminal flag
pub const SEED_STATI_ORDINE: &[(&str, bool)] = &[
    ("bozza", false),
    ("in_carrello", false),
    ("in attesa", false),
    ("in preparazione", false),
    ("pronto", false),
    ("completato", true),
    ("annullato", true),
];

/// Payment states created by `db::seed_defaults`, in workflow order
pub const SEED_STATI_PAGAMENTO: &[&str] = &["non_pagato", "in_attesa", "pagato", "rimborsato"];

/// Order status workflow: display ranking and history bookkeeping
///
/// Any state may follow any other. What the workflow guarantees is the
/// history: each order has exactly one open interval, and every change of
/// state closes it and opens the next one inside the caller's transaction.
pub struct StatusWorkflow;

impl StatusWorkflow {
    /// Position of an order state in the workflow; unknown names rank last.
    pub fn rank_stato_ordine(nome: &str) -> usize {
        rank(SEED_STATI_ORDINE.iter().map(|(seed, _)| *seed), nome)
    }

    pub fn rank_stato_pagamento(nome: &str) -> usize {
        rank(SEED_STATI_PAGAMENTO.iter().copied(), nome)
    }

    /// Workflow order, then case-insensitive name for states outside the seed set
    pub fn compare_stati_ordine(a: &str, b: &str) -> Ordering {
        Self::rank_stato_ordine(a)
            .cmp(&Self::rank_stato_ordine(b))
            .then_with(|| a.trim().to_lowercase().cmp(&b.trim().to_lowercase()))
    }

    pub fn compare_stati_pagamento(a: &str, b: &str) -> Ordering {
        Self::rank_stato_pagamento(a)
            .cmp(&Self::rank_stato_pagamento(b))
            .then_with(|| a.trim().to_lowercase().cmp(&b.trim().to_lowercase()))
    }

    /// Opens the first interval of a new order.
    pub async fn open(
        conn: &mut SqliteConnection,
        ordine_id: i64,
        stato_ordine_id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO stato_storico_ordine (ordine_id, stato_ordine_id, inizio, fine)
            VALUES (?, ?, ?, NULL)
            RETURNING stato_storico_ordine_id
            "#,
        )
        .bind(ordine_id)
        .bind(stato_ordine_id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Closes the open interval, if any, returning how many rows were closed.
    pub async fn close(
        conn: &mut SqliteConnection,
        ordine_id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE stato_storico_ordine SET fine = ? WHERE ordine_id = ? AND fine IS NULL",
        )
        .bind(now)
        .bind(ordine_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Moves an order to a new state: closes the current interval, opens the
    /// next one and updates the order row.
    pub async fn transition(
        conn: &mut SqliteConnection,
        ordine_id: i64,
        nuovo_stato_id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        let closed = Self::close(&mut *conn, ordine_id, now).await?;
        if closed == 0 {
            tracing::warn!("Order {} had no open status interval", ordine_id);
        }
        Self::open(&mut *conn, ordine_id, nuovo_stato_id, now).await?;

        sqlx::query(
            "UPDATE ordine SET stato_ordine_id = ?, data_aggiornamento = ? WHERE ordine_id = ?",
        )
        .bind(nuovo_stato_id)
        .bind(now)
        .bind(ordine_id)
        .execute(&mut *conn)
        .await?;

        tracing::debug!("Order {} moved to state {}", ordine_id, nuovo_stato_id);
        Ok(())
    }
}

fn rank<'a>(seed: impl Iterator<Item = &'a str>, nome: &str) -> usize {
    let nome = nome.trim().to_lowercase();
    let mut len = 0;
    for (index, candidate) in seed.enumerate() {
        if candidate == nome {
            return index;
        }
        len = index + 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_states_terminal_flags() {
        let terminali: Vec<_> = SEED_STATI_ORDINE
            .iter()
            .filter(|(_, terminale)| *terminale)
            .map(|(nome, _)| *nome)
            .collect();
        assert_eq!(terminali, vec!["completato", "annullato"]);
        assert_eq!(SEED_STATI_ORDINE.len(), 7);
    }

    #[test]
    fn test_rank_follows_workflow() {
        assert_eq!(StatusWorkflow::rank_stato_ordine("bozza"), 0);
        assert_eq!(StatusWorkflow::rank_stato_ordine("  PRONTO "), 4);
        assert_eq!(StatusWorkflow::rank_stato_ordine("sconosciuto"), 7);
        assert_eq!(StatusWorkflow::rank_stato_pagamento("pagato"), 2);
    }

    #[test]
    fn test_compare_puts_unknown_states_last_alphabetically() {
        let mut stati = vec!["zeta", "completato", "bozza", "alfa", "in preparazione"];
        stati.sort_by(|a, b| StatusWorkflow::compare_stati_ordine(a, b));
        assert_eq!(
            stati,
            vec!["bozza", "in preparazione", "completato", "alfa", "zeta"]
        );
    }
}
