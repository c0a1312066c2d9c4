use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::catalog::articolo;
use crate::catalog::dimensione_bicchiere::{self, DIMENSIONE_BICCHIERE};
use crate::catalog::models::{
    BevandaCustom, BevandaCustomDto, DimensioneBicchiere, PersonalizzazioneCustom, TipoArticolo,
};
use crate::catalog::personalizzazione_custom::{self, PERSONALIZZAZIONE_CUSTOM};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pricing::{PriceCalculator, PricingError};
use crate::repository::{self, absorb_unique_violation, missing_reference, same_amount, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id};

pub const BEVANDA_CUSTOM: TableSpec = TableSpec {
    table: "bevanda_custom",
    id_column: "articolo_id",
    columns: "articolo_id, pers_custom_id, prezzo, data_creazione, data_aggiornamento",
};

pub const LABEL: Label = Label::femminile("Bevanda custom", "una bevanda custom");

const UNIQUE: UniquenessGuard = UniquenessGuard::new(BEVANDA_CUSTOM);

fn chiave(pers_custom_id: i64) -> String {
    format!("personalizzazione custom {pers_custom_id}")
}

/// Repository for drinks sold from a customer-built recipe
#[derive(Clone)]
pub struct BevandaCustomRepository {
    pool: SqlitePool,
}

impl BevandaCustomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self, page: i64, page_size: i64) -> RepoResult<PaginatedResponse<BevandaCustom>> {
        let builder =
            SelectBuilder::new(BEVANDA_CUSTOM).order_by("data_creazione DESC, articolo_id DESC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<BevandaCustom>> {
        repository::find_by_id(&self.pool, BEVANDA_CUSTOM, LABEL, id).await
    }

    /// The drink sold for a recipe; at most one exists.
    pub async fn get_by_personalizzazione_custom(
        &self,
        pers_custom_id: i64,
    ) -> RepoResult<SingleResponse<BevandaCustom>> {
        if let Err(err) = validate_id(pers_custom_id, "ID personalizzazione custom") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let row = SelectBuilder::new(BEVANDA_CUSTOM)
            .eq("pers_custom_id", pers_custom_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => SingleResponse::ok(row, messages::trovato(LABEL)),
            None => SingleResponse::fail(messages::non_trovato_per(LABEL, &chiave(pers_custom_id))),
        })
    }

    pub async fn add(&self, dto: BevandaCustomDto) -> RepoResult<SingleResponse<BevandaCustom>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(dto.pers_custom_id));
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let references = [Reference::new(
            PERSONALIZZAZIONE_CUSTOM,
            personalizzazione_custom::LABEL,
            dto.pers_custom_id,
        )];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [KeyPart::Int("pers_custom_id", dto.pers_custom_id)];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let articolo_id = articolo::insert_articolo(&mut tx, TipoArticolo::BevandaCustom, now).await?;

        let inserted = sqlx::query_as::<_, BevandaCustom>(
            r#"
            INSERT INTO bevanda_custom (articolo_id, pers_custom_id, prezzo, data_creazione, data_aggiornamento)
            VALUES (?, ?, ?, ?, ?)
            RETURNING articolo_id, pers_custom_id, prezzo, data_creazione, data_aggiornamento
            "#,
        )
        .bind(articolo_id)
        .bind(dto.pers_custom_id)
        .bind(dto.prezzo)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Bevanda custom created: {}", row.articolo_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: BevandaCustomDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(dto.pers_custom_id));

        let mut tx = self.pool.begin().await?;

        let Some(existing) =
            store::fetch_by_id::<BevandaCustom, _>(&mut *tx, BEVANDA_CUSTOM, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        if existing.pers_custom_id == dto.pers_custom_id && same_amount(existing.prezzo, dto.prezzo) {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        let references = [Reference::new(
            PERSONALIZZAZIONE_CUSTOM,
            personalizzazione_custom::LABEL,
            dto.pers_custom_id,
        )];
        if let Some(message) = missing_reference(&mut tx, &references).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [KeyPart::Int("pers_custom_id", dto.pers_custom_id)];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE bevanda_custom SET pers_custom_id = ?, prezzo = ?, data_aggiornamento = ? WHERE articolo_id = ?",
        )
        .bind(dto.pers_custom_id)
        .bind(dto.prezzo)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        articolo::touch_articolo(&mut tx, id, now).await?;
        tx.commit().await?;

        tracing::info!("Bevanda custom {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        articolo::delete_composite(&self.pool, BEVANDA_CUSTOM, LABEL, id, force_delete).await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, BEVANDA_CUSTOM, LABEL, id).await
    }

    pub async fn exists_by_personalizzazione_custom(
        &self,
        pers_custom_id: i64,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(pers_custom_id, "ID personalizzazione custom") {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let builder = SelectBuilder::new(BEVANDA_CUSTOM)
            .eq("pers_custom_id", pers_custom_id)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(BEVANDA_CUSTOM)).await
    }

    /// Price from the recipe: its cup size price plus the surcharge of every
    /// selected ingredient.
    pub async fn calcola_prezzo(&self, id: i64) -> RepoResult<SingleResponse<Decimal>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut conn = self.pool.acquire().await?;

        let Some(bevanda) = store::fetch_by_id::<BevandaCustom, _>(&mut *conn, BEVANDA_CUSTOM, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let Some(ricetta) = store::fetch_by_id::<PersonalizzazioneCustom, _>(
            &mut *conn,
            PERSONALIZZAZIONE_CUSTOM,
            bevanda.pers_custom_id,
        )
        .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(
                personalizzazione_custom::LABEL,
                bevanda.pers_custom_id,
            )));
        };
        let Some(dimensione) = store::fetch_by_id::<DimensioneBicchiere, _>(
            &mut *conn,
            DIMENSIONE_BICCHIERE,
            ricetta.dimensione_bicchiere_id,
        )
        .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(
                dimensione_bicchiere::LABEL,
                ricetta.dimensione_bicchiere_id,
            )));
        };

        let supplementi: Vec<f64> = sqlx::query_scalar(
            r#"
            SELECT i.prezzo_aggiunto
            FROM ingredienti_personalizzazione ip
            JOIN ingrediente i ON i.ingrediente_id = ip.ingrediente_id
            WHERE ip.pers_custom_id = ?
            "#,
        )
        .bind(ricetta.pers_custom_id)
        .fetch_all(&mut *conn)
        .await?;

        let prezzo = prezzo_da_ricetta(&dimensione, &supplementi);
        match prezzo {
            Ok(prezzo) => {
                tracing::debug!("Prezzo bevanda custom {}: {}", id, prezzo);
                Ok(SingleResponse::ok(prezzo, "Prezzo calcolato con successo"))
            }
            Err(err) => Ok(SingleResponse::fail(err.to_string())),
        }
    }
}

fn prezzo_da_ricetta(dimensione: &DimensioneBicchiere, supplementi: &[f64]) -> Result<Decimal, PricingError> {
    let base = PriceCalculator::from_stored(dimensione.prezzo_base)?;
    let moltiplicatore = PriceCalculator::from_stored(dimensione.moltiplicatore)?;
    let supplementi = supplementi
        .iter()
        .map(|s| PriceCalculator::from_stored(*s))
        .collect::<Result<Vec<_>, _>>()?;
    PriceCalculator::prezzo_bevanda_custom(base, moltiplicatore, &supplementi)
}
