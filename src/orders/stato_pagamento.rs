use sqlx::SqlitePool;

use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::orders::models::{StatoPagamento, StatoPagamentoDto};
use crate::orders::ordine;
use crate::orders::status_workflow::StatusWorkflow;
use crate::pagination::PageWindow;
use crate::repository::{self, absorb_unique_violation};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_required_text};

pub const STATO_PAGAMENTO: TableSpec = TableSpec {
    table: "stato_pagamento",
    id_column: "stato_pagamento_id",
    columns: "stato_pagamento_id, stato_pagamento",
};

pub const LABEL: Label = Label::maschile("Stato pagamento", "uno stato pagamento");

const DEPENDENCIES: &[Dependency] = &[ordine::ordini("stato_pagamento_id")];

const UNIQUE: UniquenessGuard = UniquenessGuard::new(STATO_PAGAMENTO);

#[derive(Clone)]
pub struct StatoPagamentoRepository {
    pool: SqlitePool,
}

impl StatoPagamentoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Payment states in workflow order
    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<StatoPagamento>> {
        let window = PageWindow::new(page, page_size);
        let mut rows: Vec<StatoPagamento> =
            SelectBuilder::new(STATO_PAGAMENTO).fetch_all(&self.pool).await?;
        rows.sort_by(|a, b| StatusWorkflow::compare_stati_pagamento(&a.stato_pagamento, &b.stato_pagamento));

        let total = rows.len() as i64;
        let data = window.slice(rows);
        Ok(PaginatedResponse::new(data, &window, total).with_message(messages::elenco(total)))
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<StatoPagamento>> {
        repository::find_by_id(&self.pool, STATO_PAGAMENTO, LABEL, id).await
    }

    pub async fn get_by_nome(&self, nome: &str) -> RepoResult<SingleResponse<StatoPagamento>> {
        let nome = match validate_required_text(nome, "Stato pagamento", 50) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let row = SelectBuilder::new(STATO_PAGAMENTO)
            .eq_ignore_case("stato_pagamento", &nome)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("nome '{nome}'"))),
        })
    }

    pub async fn add(&self, dto: StatoPagamentoDto) -> RepoResult<SingleResponse<StatoPagamento>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.stato_pagamento.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        if !UNIQUE
            .is_unique(&mut tx, &[KeyPart::Text("stato_pagamento", &nome)], None)
            .await?
        {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, StatoPagamento>(
            "INSERT INTO stato_pagamento (stato_pagamento) VALUES (?) RETURNING stato_pagamento_id, stato_pagamento",
        )
        .bind(&nome)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Stato pagamento created: {}", row.stato_pagamento_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: StatoPagamentoDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.stato_pagamento.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        let Some(existing) =
            store::fetch_by_id::<StatoPagamento, _>(&mut *tx, STATO_PAGAMENTO, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.stato_pagamento == nome {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if !UNIQUE
            .is_unique(&mut tx, &[KeyPart::Text("stato_pagamento", &nome)], Some(id))
            .await?
        {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query("UPDATE stato_pagamento SET stato_pagamento = ? WHERE stato_pagamento_id = ?")
            .bind(&nome)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Stato pagamento {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            STATO_PAGAMENTO,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, STATO_PAGAMENTO, LABEL, id).await
    }

    pub async fn exists_by_nome(&self, nome: &str, exclude_id: Option<i64>) -> RepoResult<SingleResponse<bool>> {
        let nome = match validate_required_text(nome, "Stato pagamento", 50) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let builder = SelectBuilder::new(STATO_PAGAMENTO)
            .eq_ignore_case("stato_pagamento", &nome)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(STATO_PAGAMENTO)).await
    }
}
