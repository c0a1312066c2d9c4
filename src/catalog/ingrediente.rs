use chrono::Utc;
use sqlx::SqlitePool;

use crate::catalog::models::{Ingrediente, IngredienteDto};
use crate::catalog::personalizzazione_ingrediente;
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pagination::PageWindow;
use crate::repository::{self, absorb_unique_violation, same_amount};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_required_text};

pub const INGREDIENTE: TableSpec = TableSpec {
    table: "ingrediente",
    id_column: "ingrediente_id",
    columns: "ingrediente_id, nome, categoria, prezzo_aggiunto, disponibile, data_inserimento, data_aggiornamento",
};

pub const LABEL: Label = Label::maschile("Ingrediente", "un ingrediente");

const DEPENDENCIES: &[Dependency] = &[
    personalizzazione_ingrediente::personalizzazioni_ingrediente("ingrediente_id", "ricette che lo usano"),
    Dependency::new(
        "ingredienti_personalizzazione",
        "ingrediente_id",
        "selezioni di personalizzazioni custom",
    ),
];

const UNIQUE: UniquenessGuard = UniquenessGuard::new(INGREDIENTE);

const ORDER: &str = "nome COLLATE KEY_NOCASE ASC";

/// Repository for ingredients
#[derive(Clone)]
pub struct IngredienteRepository {
    pool: SqlitePool,
}

impl IngredienteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<Ingrediente>> {
        let builder = SelectBuilder::new(INGREDIENTE).order_by(ORDER);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<Ingrediente>> {
        repository::find_by_id(&self.pool, INGREDIENTE, LABEL, id).await
    }

    pub async fn get_by_nome(&self, nome: &str) -> RepoResult<SingleResponse<Ingrediente>> {
        let nome = match validate_required_text(nome, "Nome", 100) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let row = SelectBuilder::new(INGREDIENTE)
            .eq_ignore_case("nome", &nome)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &format!("nome '{nome}'"))),
        })
    }

    pub async fn get_disponibili(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Ingrediente>> {
        let builder = SelectBuilder::new(INGREDIENTE)
            .eq("disponibile", true)
            .order_by(ORDER);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_categoria(
        &self,
        categoria: &str,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<Ingrediente>> {
        let categoria = match validate_required_text(categoria, "Categoria", 50) {
            Ok(categoria) => categoria,
            Err(err) => {
                return Ok(PaginatedResponse::rejected(
                    &PageWindow::new(page, page_size),
                    err.to_string(),
                ))
            }
        };
        let builder = SelectBuilder::new(INGREDIENTE)
            .eq_ignore_case("categoria", &categoria)
            .order_by(ORDER);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(&self, dto: IngredienteDto) -> RepoResult<SingleResponse<Ingrediente>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();
        let categoria = dto.categoria.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("nome", &nome)], None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, Ingrediente>(
            r#"
            INSERT INTO ingrediente
                (nome, categoria, prezzo_aggiunto, disponibile, data_inserimento, data_aggiornamento)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING ingrediente_id, nome, categoria, prezzo_aggiunto, disponibile,
                      data_inserimento, data_aggiornamento
            "#,
        )
        .bind(&nome)
        .bind(&categoria)
        .bind(dto.prezzo_aggiunto)
        .bind(dto.disponibile)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Ingrediente created: {} ({})", row.ingrediente_id, row.nome);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: IngredienteDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let nome = dto.nome.trim().to_string();
        let categoria = dto.categoria.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &format!("nome '{nome}'"));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<Ingrediente, _>(&mut *tx, INGREDIENTE, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let unchanged = existing.nome == nome
            && existing.categoria == categoria
            && same_amount(existing.prezzo_aggiunto, dto.prezzo_aggiunto)
            && existing.disponibile == dto.disponibile;
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if !UNIQUE.is_unique(&mut tx, &[KeyPart::Text("nome", &nome)], Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            r#"
            UPDATE ingrediente
            SET nome = ?, categoria = ?, prezzo_aggiunto = ?, disponibile = ?, data_aggiornamento = ?
            WHERE ingrediente_id = ?
            "#,
        )
        .bind(&nome)
        .bind(&categoria)
        .bind(dto.prezzo_aggiunto)
        .bind(dto.disponibile)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Ingrediente {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    /// Toggles availability; setting the current value is a no-op.
    pub async fn set_disponibilita(&self, id: i64, disponibile: bool) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<Ingrediente, _>(&mut *tx, INGREDIENTE, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.disponibile == disponibile {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        sqlx::query("UPDATE ingrediente SET disponibile = ?, data_aggiornamento = ? WHERE ingrediente_id = ?")
            .bind(disponibile)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Ingrediente {} disponibile = {}", id, disponibile);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            INGREDIENTE,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, INGREDIENTE, LABEL, id).await
    }

    pub async fn exists_by_nome(
        &self,
        nome: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        let nome = match validate_required_text(nome, "Nome", 100) {
            Ok(nome) => nome,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let builder = SelectBuilder::new(INGREDIENTE)
            .eq_ignore_case("nome", &nome)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(INGREDIENTE)).await
    }
}
