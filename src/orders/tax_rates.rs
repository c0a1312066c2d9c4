use sqlx::SqlitePool;

use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::orders::models::{TaxRate, TaxRateDto};
use crate::repository::{self, absorb_unique_violation, same_amount};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id, validate_required_text};

pub const TAX_RATES: TableSpec = TableSpec {
    table: "tax_rates",
    id_column: "tax_rate_id",
    columns: "tax_rate_id, aliquota, descrizione",
};

pub const LABEL: Label = Label::femminile("Aliquota IVA", "un'aliquota IVA");

const DEPENDENCIES: &[Dependency] =
    &[Dependency::new("order_item", "tax_rate_id", "righe d'ordine").refreshing_totals("ordine_id")];

const UNIQUE: UniquenessGuard = UniquenessGuard::new(TAX_RATES);

fn chiave(aliquota: f64, descrizione: &str) -> String {
    format!("aliquota {aliquota}% e descrizione '{descrizione}'")
}

/// Repository for VAT rates
#[derive(Clone)]
pub struct TaxRatesRepository {
    pool: SqlitePool,
}

impl TaxRatesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Highest rate first
    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<TaxRate>> {
        let builder = SelectBuilder::new(TAX_RATES).order_by("aliquota DESC, descrizione COLLATE KEY_NOCASE ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<TaxRate>> {
        repository::find_by_id(&self.pool, TAX_RATES, LABEL, id).await
    }

    pub async fn add(&self, dto: TaxRateDto) -> RepoResult<SingleResponse<TaxRate>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &chiave(dto.aliquota, &descrizione));

        let mut tx = self.pool.begin().await?;

        let key = [
            KeyPart::Real("aliquota", dto.aliquota),
            KeyPart::Text("descrizione", &descrizione),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, TaxRate>(
            "INSERT INTO tax_rates (aliquota, descrizione) VALUES (?, ?) RETURNING tax_rate_id, aliquota, descrizione",
        )
        .bind(dto.aliquota)
        .bind(&descrizione)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Tax rate created: {} ({}%)", row.tax_rate_id, row.aliquota);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: TaxRateDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let descrizione = dto.descrizione.trim().to_string();
        let conflitto = messages::esiste_gia(LABEL, &chiave(dto.aliquota, &descrizione));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<TaxRate, _>(&mut *tx, TAX_RATES, id).await? else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if same_amount(existing.aliquota, dto.aliquota) && existing.descrizione == descrizione {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        let key = [
            KeyPart::Real("aliquota", dto.aliquota),
            KeyPart::Text("descrizione", &descrizione),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query("UPDATE tax_rates SET aliquota = ?, descrizione = ? WHERE tax_rate_id = ?")
            .bind(dto.aliquota)
            .bind(&descrizione)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Tax rate {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    /// A forced delete drops the order lines charged at this rate and
    /// recomputes the totals of their orders.
    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            TAX_RATES,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, TAX_RATES, LABEL, id).await
    }

    pub async fn exists_by_combinazione(
        &self,
        aliquota: f64,
        descrizione: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        let descrizione = match validate_required_text(descrizione, "Descrizione", 100) {
            Ok(descrizione) => descrizione,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };
        let builder = SelectBuilder::new(TAX_RATES)
            .approx_eq("aliquota", aliquota)
            .eq_ignore_case("descrizione", &descrizione)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(TAX_RATES)).await
    }
}
