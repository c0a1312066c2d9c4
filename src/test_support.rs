// Fixture builder for store-backed tests
// Every test opens its own in-memory database; nothing is shared between tests.

use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::db;

pub struct TestDb {
    pub pool: SqlitePool,
}

impl TestDb {
    /// Empty schema, no seed rows
    pub async fn new() -> Self {
        let options = db::connect_options("sqlite::memory:").expect("valid in-memory url");
        // the database lives inside the single connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("open in-memory database");
        db::run_migrations(&pool).await.expect("apply migrations");
        Self { pool }
    }

    /// Schema plus the seed order and payment states
    pub async fn seeded() -> Self {
        let db = Self::new().await;
        db::seed_defaults(&db.pool).await.expect("seed defaults");
        db
    }

    pub async fn count(&self, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .expect("count rows")
    }

    pub async fn tavolo(&self, numero: i32) -> i64 {
        sqlx::query("INSERT INTO tavolo (numero, disponibile, zona) VALUES (?, 1, 'Sala')")
            .bind(numero)
            .execute(&self.pool)
            .await
            .expect("insert tavolo")
            .last_insert_rowid()
    }

    pub async fn cliente(&self, tavolo_id: i64) -> i64 {
        sqlx::query("INSERT INTO cliente (tavolo_id, data_creazione) VALUES (?, ?)")
            .bind(tavolo_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .expect("insert cliente")
            .last_insert_rowid()
    }

    pub async fn utente(&self, email: &str) -> i64 {
        sqlx::query(
            "INSERT INTO utenti (email, nome, cognome, tipo_utente, attivo, data_creazione) \
             VALUES (?, 'Mario', 'Rossi', 'gestore', 1, ?)",
        )
        .bind(email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .expect("insert utente")
        .last_insert_rowid()
    }

    pub async fn unita(&self, sigla: &str) -> i64 {
        sqlx::query("INSERT INTO unita_di_misura (sigla, descrizione) VALUES (?, 'unità di test')")
            .bind(sigla)
            .execute(&self.pool)
            .await
            .expect("insert unita di misura")
            .last_insert_rowid()
    }

    pub async fn dimensione(
        &self,
        sigla: &str,
        unita_misura_id: i64,
        prezzo_base: f64,
        moltiplicatore: f64,
    ) -> i64 {
        sqlx::query(
            "INSERT INTO dimensione_bicchiere \
             (sigla, descrizione, capienza, unita_misura_id, prezzo_base, moltiplicatore) \
             VALUES (?, 'bicchiere di test', 500, ?, ?, ?)",
        )
        .bind(sigla)
        .bind(unita_misura_id)
        .bind(prezzo_base)
        .bind(moltiplicatore)
        .execute(&self.pool)
        .await
        .expect("insert dimensione bicchiere")
        .last_insert_rowid()
    }

    pub async fn ingrediente(&self, nome: &str, prezzo_aggiunto: f64) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO ingrediente \
             (nome, categoria, prezzo_aggiunto, disponibile, data_inserimento, data_aggiornamento) \
             VALUES (?, 'topping', ?, 1, ?, ?)",
        )
        .bind(nome)
        .bind(prezzo_aggiunto)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert ingrediente")
        .last_insert_rowid()
    }

    pub async fn personalizzazione(&self, nome: &str) -> i64 {
        sqlx::query(
            "INSERT INTO personalizzazione (nome, descrizione, dt_creazione) VALUES (?, 'ricetta', ?)",
        )
        .bind(nome)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .expect("insert personalizzazione")
        .last_insert_rowid()
    }

    pub async fn personalizzazione_ingrediente(
        &self,
        personalizzazione_id: i64,
        ingrediente_id: i64,
        quantita: f64,
        unita_misura_id: i64,
    ) -> i64 {
        sqlx::query(
            "INSERT INTO personalizzazione_ingrediente \
             (personalizzazione_id, ingrediente_id, quantita, unita_misura_id) VALUES (?, ?, ?, ?)",
        )
        .bind(personalizzazione_id)
        .bind(ingrediente_id)
        .bind(quantita)
        .bind(unita_misura_id)
        .execute(&self.pool)
        .await
        .expect("insert personalizzazione ingrediente")
        .last_insert_rowid()
    }

    pub async fn dimensione_quantita(
        &self,
        personalizzazione_ingrediente_id: i64,
        dimensione_bicchiere_id: i64,
        moltiplicatore: f64,
    ) -> i64 {
        sqlx::query(
            "INSERT INTO dimensione_quantita_ingredienti \
             (personalizzazione_ingrediente_id, dimensione_bicchiere_id, moltiplicatore) \
             VALUES (?, ?, ?)",
        )
        .bind(personalizzazione_ingrediente_id)
        .bind(dimensione_bicchiere_id)
        .bind(moltiplicatore)
        .execute(&self.pool)
        .await
        .expect("insert dimensione quantita")
        .last_insert_rowid()
    }

    pub async fn personalizzazione_custom(&self, nome: &str, dimensione_bicchiere_id: i64) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO personalizzazione_custom \
             (nome, grado_dolcezza, dimensione_bicchiere_id, data_creazione, data_aggiornamento) \
             VALUES (?, 2, ?, ?, ?)",
        )
        .bind(nome)
        .bind(dimensione_bicchiere_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert personalizzazione custom")
        .last_insert_rowid()
    }

    pub async fn ingrediente_selezionato(&self, pers_custom_id: i64, ingrediente_id: i64) -> i64 {
        sqlx::query(
            "INSERT INTO ingredienti_personalizzazione (pers_custom_id, ingrediente_id) VALUES (?, ?)",
        )
        .bind(pers_custom_id)
        .bind(ingrediente_id)
        .execute(&self.pool)
        .await
        .expect("insert ingredienti personalizzazione")
        .last_insert_rowid()
    }

    pub async fn stato_ordine(&self, nome: &str, terminale: bool) -> i64 {
        sqlx::query("INSERT INTO stato_ordine (stato_ordine, terminale) VALUES (?, ?)")
            .bind(nome)
            .bind(terminale)
            .execute(&self.pool)
            .await
            .expect("insert stato ordine")
            .last_insert_rowid()
    }

    /// Id of an existing state, looked up case-insensitively
    pub async fn stato_ordine_id(&self, nome: &str) -> i64 {
        sqlx::query_scalar("SELECT stato_ordine_id FROM stato_ordine WHERE stato_ordine = ?")
            .bind(nome)
            .fetch_one(&self.pool)
            .await
            .expect("stato ordine present")
    }

    pub async fn stato_pagamento(&self, nome: &str) -> i64 {
        sqlx::query("INSERT INTO stato_pagamento (stato_pagamento) VALUES (?)")
            .bind(nome)
            .execute(&self.pool)
            .await
            .expect("insert stato pagamento")
            .last_insert_rowid()
    }

    pub async fn stato_pagamento_id(&self, nome: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT stato_pagamento_id FROM stato_pagamento WHERE stato_pagamento = ?",
        )
        .bind(nome)
        .fetch_one(&self.pool)
        .await
        .expect("stato pagamento present")
    }

    pub async fn tax_rate(&self, aliquota: f64, descrizione: &str) -> i64 {
        sqlx::query("INSERT INTO tax_rates (aliquota, descrizione) VALUES (?, ?)")
            .bind(aliquota)
            .bind(descrizione)
            .execute(&self.pool)
            .await
            .expect("insert tax rate")
            .last_insert_rowid()
    }

    pub async fn config_soglie(&self, stato_ordine_id: i64) -> i64 {
        sqlx::query(
            "INSERT INTO config_soglie_tempi \
             (stato_ordine_id, soglia_attenzione, soglia_critico, data_aggiornamento) \
             VALUES (?, 10, 20, ?)",
        )
        .bind(stato_ordine_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .expect("insert config soglie")
        .last_insert_rowid()
    }

    /// Order without history rows, for tests that only need the reference
    pub async fn ordine(&self, cliente_id: i64, stato_ordine_id: i64, stato_pagamento_id: i64) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO ordine \
             (cliente_id, stato_ordine_id, stato_pagamento_id, totale, priorita, data_creazione, data_aggiornamento) \
             VALUES (?, ?, ?, 0, 1, ?, ?)",
        )
        .bind(cliente_id)
        .bind(stato_ordine_id)
        .bind(stato_pagamento_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert ordine")
        .last_insert_rowid()
    }

    /// Articolo plus its dessert variant
    pub async fn dolce(&self, nome: &str, prezzo: f64) -> i64 {
        let now = Utc::now();
        let articolo_id = sqlx::query(
            "INSERT INTO articolo (tipo, data_creazione, data_aggiornamento) VALUES ('D', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert articolo")
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO dolce \
             (articolo_id, nome, prezzo, disponibile, priorita, data_creazione, data_aggiornamento) \
             VALUES (?, ?, ?, 1, 1, ?, ?)",
        )
        .bind(articolo_id)
        .bind(nome)
        .bind(prezzo)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert dolce");
        articolo_id
    }

    pub async fn preferito(&self, cliente_id: i64, articolo_id: i64) -> i64 {
        sqlx::query(
            "INSERT INTO preferiti_cliente (cliente_id, articolo_id, data_aggiunta) VALUES (?, ?, ?)",
        )
        .bind(cliente_id)
        .bind(articolo_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .expect("insert preferito")
        .last_insert_rowid()
    }

    /// Shorthand: one table, one client, seeded states
    pub async fn cliente_pronto(&self) -> i64 {
        let numero: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(numero), 0) + 1 FROM tavolo")
            .fetch_one(&self.pool)
            .await
            .expect("next table number");
        let tavolo_id = self.tavolo(numero).await;
        self.cliente(tavolo_id).await
    }
}
