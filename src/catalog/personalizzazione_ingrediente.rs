use sqlx::SqlitePool;

use crate::catalog::dimensione_bicchiere::{self, DIMENSIONE_BICCHIERE};
use crate::catalog::dimensione_quantita_ingredienti::DIMENSIONE_QUANTITA_INGREDIENTI;
use crate::catalog::ingrediente::{self, INGREDIENTE};
use crate::catalog::models::{
    DimensioneQuantitaIngredienti, PersonalizzazioneIngrediente, PersonalizzazioneIngredienteDto,
    QuantitaPerDimensione,
};
use crate::catalog::personalizzazione::{self, PERSONALIZZAZIONE};
use crate::catalog::unita_di_misura::{self, UNITA_DI_MISURA};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{self, Dependency, DependencyGuard, KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pagination::PageWindow;
use crate::pricing::{scala_quantita, PriceCalculator};
use crate::repository::{self, absorb_unique_violation, missing_reference, same_amount, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id};

pub const PERSONALIZZAZIONE_INGREDIENTE: TableSpec = TableSpec {
    table: "personalizzazione_ingrediente",
    id_column: "personalizzazione_ingrediente_id",
    columns: "personalizzazione_ingrediente_id, personalizzazione_id, ingrediente_id, quantita, unita_misura_id",
};

pub const LABEL: Label = Label::maschile("Ingrediente della personalizzazione", "un ingrediente della personalizzazione");

const DEPENDENCIES: &[Dependency] = &[Dependency::new(
    "dimensione_quantita_ingredienti",
    "personalizzazione_ingrediente_id",
    "quantità per dimensione",
)];

pub(crate) const fn personalizzazioni_ingrediente(column: &'static str, descrizione: &'static str) -> Dependency {
    Dependency::new("personalizzazione_ingrediente", column, descrizione)
        .with_nested("personalizzazione_ingrediente_id", DEPENDENCIES)
}

const UNIQUE: UniquenessGuard = UniquenessGuard::new(PERSONALIZZAZIONE_INGREDIENTE);

fn chiave(dto: &PersonalizzazioneIngredienteDto) -> String {
    format!(
        "personalizzazione {} e ingrediente {}",
        dto.personalizzazione_id, dto.ingrediente_id
    )
}

fn references(dto: &PersonalizzazioneIngredienteDto) -> [Reference; 3] {
    [
        Reference::new(PERSONALIZZAZIONE, personalizzazione::LABEL, dto.personalizzazione_id),
        Reference::new(INGREDIENTE, ingrediente::LABEL, dto.ingrediente_id),
        Reference::new(UNITA_DI_MISURA, unita_di_misura::LABEL, dto.unita_misura_id),
    ]
}

/// Repository for recipe lines (recipe, ingredient, base quantity)
#[derive(Clone)]
pub struct PersonalizzazioneIngredienteRepository {
    pool: SqlitePool,
}

impl PersonalizzazioneIngredienteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<PersonalizzazioneIngrediente>> {
        let builder = SelectBuilder::new(PERSONALIZZAZIONE_INGREDIENTE)
            .order_by("personalizzazione_id ASC, ingrediente_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<PersonalizzazioneIngrediente>> {
        repository::find_by_id(&self.pool, PERSONALIZZAZIONE_INGREDIENTE, LABEL, id).await
    }

    pub async fn get_by_personalizzazione(
        &self,
        personalizzazione_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<PersonalizzazioneIngrediente>> {
        if let Err(err) = validate_id(personalizzazione_id, "ID personalizzazione") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(PERSONALIZZAZIONE_INGREDIENTE)
            .eq("personalizzazione_id", personalizzazione_id)
            .order_by("ingrediente_id ASC");
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn add(
        &self,
        dto: PersonalizzazioneIngredienteDto,
    ) -> RepoResult<SingleResponse<PersonalizzazioneIngrediente>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));

        let mut tx = self.pool.begin().await?;

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("personalizzazione_id", dto.personalizzazione_id),
            KeyPart::Int("ingrediente_id", dto.ingrediente_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let inserted = sqlx::query_as::<_, PersonalizzazioneIngrediente>(
            r#"
            INSERT INTO personalizzazione_ingrediente
                (personalizzazione_id, ingrediente_id, quantita, unita_misura_id)
            VALUES (?, ?, ?, ?)
            RETURNING personalizzazione_ingrediente_id, personalizzazione_id, ingrediente_id,
                      quantita, unita_misura_id
            "#,
        )
        .bind(dto.personalizzazione_id)
        .bind(dto.ingrediente_id)
        .bind(dto.quantita)
        .bind(dto.unita_misura_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!(
            "Personalizzazione ingrediente created: {}",
            row.personalizzazione_ingrediente_id
        );
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(
        &self,
        id: i64,
        dto: PersonalizzazioneIngredienteDto,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));

        let mut tx = self.pool.begin().await?;

        let Some(existing) = store::fetch_by_id::<PersonalizzazioneIngrediente, _>(
            &mut *tx,
            PERSONALIZZAZIONE_INGREDIENTE,
            id,
        )
        .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let unchanged = existing.personalizzazione_id == dto.personalizzazione_id
            && existing.ingrediente_id == dto.ingrediente_id
            && same_amount(existing.quantita, dto.quantita)
            && existing.unita_misura_id == dto.unita_misura_id;
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("personalizzazione_id", dto.personalizzazione_id),
            KeyPart::Int("ingrediente_id", dto.ingrediente_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let updated = sqlx::query(
            r#"
            UPDATE personalizzazione_ingrediente
            SET personalizzazione_id = ?, ingrediente_id = ?, quantita = ?, unita_misura_id = ?
            WHERE personalizzazione_ingrediente_id = ?
            "#,
        )
        .bind(dto.personalizzazione_id)
        .bind(dto.ingrediente_id)
        .bind(dto.quantita)
        .bind(dto.unita_misura_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        if absorb_unique_violation(updated)?.is_none() {
            return Ok(SingleResponse::fail(conflitto));
        }
        tx.commit().await?;

        tracing::info!("Personalizzazione ingrediente {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    /// With `force_delete` the per-size quantity rows are removed first.
    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        guards::guarded_delete(
            &self.pool,
            PERSONALIZZAZIONE_INGREDIENTE,
            &DependencyGuard::new(DEPENDENCIES),
            LABEL,
            id,
            force_delete,
        )
        .await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, PERSONALIZZAZIONE_INGREDIENTE, LABEL, id).await
    }

    pub async fn exists_by_combinazione(
        &self,
        personalizzazione_id: i64,
        ingrediente_id: i64,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(personalizzazione_id, "ID personalizzazione")
            .and_then(|_| validate_id(ingrediente_id, "ID ingrediente"))
        {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let builder = SelectBuilder::new(PERSONALIZZAZIONE_INGREDIENTE)
            .eq("personalizzazione_id", personalizzazione_id)
            .eq("ingrediente_id", ingrediente_id)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(PERSONALIZZAZIONE_INGREDIENTE)).await
    }

    /// Quantity of a recipe line for one cup size.
    ///
    /// Uses the per-size multiplier when present and the base quantity
    /// otherwise. An unknown cup size is a failure, not a fallback.
    pub async fn get_quantita_per_dimensione(
        &self,
        personalizzazione_ingrediente_id: i64,
        dimensione_bicchiere_id: i64,
    ) -> RepoResult<SingleResponse<QuantitaPerDimensione>> {
        if let Err(err) = validate_id(personalizzazione_ingrediente_id, "ID")
            .and_then(|_| validate_id(dimensione_bicchiere_id, "ID dimensione bicchiere"))
        {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut conn = self.pool.acquire().await?;

        let Some(riga) = store::fetch_by_id::<PersonalizzazioneIngrediente, _>(
            &mut *conn,
            PERSONALIZZAZIONE_INGREDIENTE,
            personalizzazione_ingrediente_id,
        )
        .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(
                LABEL,
                personalizzazione_ingrediente_id,
            )));
        };

        if !store::row_exists(&mut *conn, DIMENSIONE_BICCHIERE, dimensione_bicchiere_id).await? {
            return Ok(SingleResponse::fail(messages::non_trovato(
                dimensione_bicchiere::LABEL,
                dimensione_bicchiere_id,
            )));
        }

        let override_row: Option<DimensioneQuantitaIngredienti> =
            SelectBuilder::new(DIMENSIONE_QUANTITA_INGREDIENTI)
                .eq("personalizzazione_ingrediente_id", personalizzazione_ingrediente_id)
                .eq("dimensione_bicchiere_id", dimensione_bicchiere_id)
                .fetch_optional(&mut *conn)
                .await?;

        let calcolo = PriceCalculator::from_stored(riga.quantita).and_then(|base| {
            let moltiplicatore = override_row
                .map(|row| PriceCalculator::from_stored(row.moltiplicatore))
                .transpose()?;
            scala_quantita(base, moltiplicatore)
        });
        let quantita = match calcolo {
            Ok(quantita) => quantita,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };

        if quantita.is_fallback() {
            tracing::debug!(
                "No size override for line {} and size {}, using base quantity",
                personalizzazione_ingrediente_id,
                dimensione_bicchiere_id
            );
        }

        Ok(SingleResponse::ok(
            QuantitaPerDimensione {
                personalizzazione_ingrediente_id,
                dimensione_bicchiere_id,
                unita_misura_id: riga.unita_misura_id,
                quantita,
            },
            "Quantità calcolata con successo",
        ))
    }
}
