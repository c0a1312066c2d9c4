use chrono::{Duration, Utc};

use super::*;
use crate::config::AppConfig;
use crate::error::RepositoryError;
use crate::test_support::TestDb;

fn entry(tipo: &str, utente_id: Option<i64>) -> LogAttivitaDto {
    LogAttivitaDto {
        tipo_attivita: tipo.to_string(),
        descrizione: format!("Operazione {tipo}"),
        dettagli: Some("  {\"origine\":\"backoffice\"}  ".to_string()),
        utente_id,
    }
}

async fn old_entry(db: &TestDb, giorni: i64) {
    sqlx::query(
        "INSERT INTO log_attivita (tipo_attivita, descrizione, data_esecuzione) VALUES ('PULIZIA', 'Vecchia', ?)",
    )
    .bind(Utc::now() - Duration::days(giorni))
    .execute(&db.pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_add_requires_existing_user() {
    let db = TestDb::new().await;
    let repo = LogAttivitaRepository::new(db.pool.clone());
    let utente_id = db.utente("gestore@shop.test").await;

    let anonymous = repo.add(entry("AVVIO", None)).await.unwrap();
    assert!(anonymous.success, "{}", anonymous.message);
    let log = anonymous.data.unwrap();
    assert_eq!(log.dettagli.as_deref(), Some("{\"origine\":\"backoffice\"}"));

    assert!(repo.add(entry("LOGIN", Some(utente_id))).await.unwrap().success);

    let unknown = repo.add(entry("LOGIN", Some(utente_id + 100))).await.unwrap();
    assert!(!unknown.success);
    assert!(unknown.message.starts_with("Utente con ID"));
    assert_eq!(db.count("log_attivita").await, 2);

    let by_user = repo.get_by_utente(utente_id, 1, 10).await.unwrap();
    assert_eq!(by_user.total_count, 1);
}

#[tokio::test]
async fn test_filters_and_counts_per_type() {
    let db = TestDb::new().await;
    let repo = LogAttivitaRepository::new(db.pool.clone());
    for tipo in ["LOGIN", "LOGIN", "ORDINE", "LOGIN"] {
        repo.add(entry(tipo, None)).await.unwrap();
    }

    assert_eq!(repo.get_by_tipo(" login ", 1, 10).await.unwrap().total_count, 3);

    let conteggi = repo.conteggio_per_tipo().await.unwrap().data.unwrap();
    assert_eq!(
        conteggi,
        vec![
            ConteggioPerTipo {
                tipo_attivita: "LOGIN".to_string(),
                conteggio: 3
            },
            ConteggioPerTipo {
                tipo_attivita: "ORDINE".to_string(),
                conteggio: 1
            },
        ]
    );
}

#[tokio::test]
async fn test_date_range_rejects_inverted_bounds() {
    let db = TestDb::new().await;
    let repo = LogAttivitaRepository::new(db.pool.clone());
    let start = Utc::now() - Duration::minutes(5);
    repo.add(entry("AVVIO", None)).await.unwrap();
    old_entry(&db, 30).await;

    let recent = repo.get_by_date_range(start, Utc::now(), 1, 10).await.unwrap();
    assert_eq!(recent.total_count, 1);

    let inverted = repo.get_by_date_range(Utc::now(), start, 1, 10).await;
    assert!(matches!(inverted, Err(RepositoryError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_purge_respects_retention() {
    let db = TestDb::new().await;
    let repo = LogAttivitaRepository::new(db.pool.clone());
    old_entry(&db, 120).await;
    old_entry(&db, 100).await;
    old_entry(&db, 10).await;
    repo.add(entry("AVVIO", None)).await.unwrap();

    let config = AppConfig::default();
    let purged = repo.purge_with_retention(&config).await.unwrap();
    assert_eq!(purged.data, Some(2));
    assert_eq!(db.count("log_attivita").await, 2);

    let invalid = repo.purge_older_than(0).await.unwrap();
    assert!(!invalid.success);
    assert_eq!(db.count("log_attivita").await, 2);
}
