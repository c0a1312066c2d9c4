use chrono::Utc;
use sqlx::SqlitePool;

use crate::catalog::articolo;
use crate::catalog::dimensione_bicchiere::{self, DIMENSIONE_BICCHIERE};
use crate::catalog::models::{
    BevandaStandard, BevandaStandardDto, DimensioneBicchiere, PrezzoListino, TipoArticolo,
};
use crate::catalog::personalizzazione::{self, PERSONALIZZAZIONE};
use crate::error::{RepoResult, RepositoryError};
use crate::guards::{KeyPart, UniquenessGuard};
use crate::messages::{self, Label, NESSUNA_MODIFICA};
use crate::pagination::PageWindow;
use crate::pricing::PriceCalculator;
use crate::repository::{self, absorb_unique_violation, missing_reference, same_amount, Reference};
use crate::response::{PaginatedResponse, SingleResponse};
use crate::store::{self, SelectBuilder, TableSpec};
use crate::validation::{validate_dto, validate_id};

pub const BEVANDA_STANDARD: TableSpec = TableSpec {
    table: "bevanda_standard",
    id_column: "articolo_id",
    columns: "articolo_id, personalizzazione_id, dimensione_bicchiere_id, prezzo, immagine_url, \
              disponibile, sempre_disponibile, priorita, data_creazione, data_aggiornamento",
};

pub const LABEL: Label = Label::femminile("Bevanda standard", "una bevanda standard");

const UNIQUE: UniquenessGuard = UniquenessGuard::new(BEVANDA_STANDARD);

const ORDINAMENTO: &str = "priorita DESC, articolo_id ASC";

/// Sellable now: flagged available, or always available regardless of the flag
pub(crate) const VENDIBILE: &str = "(disponibile = 1 OR sempre_disponibile = 1)";

fn references(dto: &BevandaStandardDto) -> [Reference; 2] {
    [
        Reference::new(PERSONALIZZAZIONE, personalizzazione::LABEL, dto.personalizzazione_id),
        Reference::new(
            DIMENSIONE_BICCHIERE,
            dimensione_bicchiere::LABEL,
            dto.dimensione_bicchiere_id,
        ),
    ]
}

fn chiave(dto: &BevandaStandardDto) -> String {
    format!(
        "personalizzazione {} e dimensione {}",
        dto.personalizzazione_id, dto.dimensione_bicchiere_id
    )
}

fn immagine(dto: &BevandaStandardDto) -> Option<String> {
    dto.immagine_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// Repository for menu drinks built from a named recipe in one cup size
#[derive(Clone)]
pub struct BevandaStandardRepository {
    pool: SqlitePool,
}

impl BevandaStandardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<BevandaStandard>> {
        let builder = SelectBuilder::new(BEVANDA_STANDARD).order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> RepoResult<SingleResponse<BevandaStandard>> {
        repository::find_by_id(&self.pool, BEVANDA_STANDARD, LABEL, id).await
    }

    pub async fn get_disponibili(
        &self,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<BevandaStandard>> {
        let builder = SelectBuilder::new(BEVANDA_STANDARD)
            .filter(VENDIBILE)
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_dimensione(
        &self,
        dimensione_bicchiere_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<BevandaStandard>> {
        if let Err(err) = validate_id(dimensione_bicchiere_id, "ID dimensione bicchiere") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(BEVANDA_STANDARD)
            .eq("dimensione_bicchiere_id", dimensione_bicchiere_id)
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    pub async fn get_by_personalizzazione(
        &self,
        personalizzazione_id: i64,
        page: i64,
        page_size: i64,
    ) -> RepoResult<PaginatedResponse<BevandaStandard>> {
        if let Err(err) = validate_id(personalizzazione_id, "ID personalizzazione") {
            return Ok(PaginatedResponse::rejected(
                &PageWindow::new(page, page_size),
                err.to_string(),
            ));
        }
        let builder = SelectBuilder::new(BEVANDA_STANDARD)
            .eq("personalizzazione_id", personalizzazione_id)
            .order_by(ORDINAMENTO);
        repository::find_page(&self.pool, builder, page, page_size).await
    }

    /// Creates the articolo and the drink in one transaction.
    pub async fn add(&self, dto: BevandaStandardDto) -> RepoResult<SingleResponse<BevandaStandard>> {
        if let Err(err) = validate_dto(&dto) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("personalizzazione_id", dto.personalizzazione_id),
            KeyPart::Int("dimensione_bicchiere_id", dto.dimensione_bicchiere_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, None).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let articolo_id = articolo::insert_articolo(&mut tx, TipoArticolo::BevandaStandard, now).await?;

        let inserted = sqlx::query_as::<_, BevandaStandard>(
            r#"
            INSERT INTO bevanda_standard
                (articolo_id, personalizzazione_id, dimensione_bicchiere_id, prezzo, immagine_url,
                 disponibile, sempre_disponibile, priorita, data_creazione, data_aggiornamento)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING articolo_id, personalizzazione_id, dimensione_bicchiere_id, prezzo, immagine_url,
                      disponibile, sempre_disponibile, priorita, data_creazione, data_aggiornamento
            "#,
        )
        .bind(articolo_id)
        .bind(dto.personalizzazione_id)
        .bind(dto.dimensione_bicchiere_id)
        .bind(dto.prezzo)
        .bind(immagine(&dto))
        .bind(dto.disponibile)
        .bind(dto.sempre_disponibile)
        .bind(dto.priorita)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from);

        // dropping the transaction rolls back the articolo row as well
        let Some(row) = absorb_unique_violation(inserted)? else {
            return Ok(SingleResponse::fail(conflitto));
        };
        tx.commit().await?;

        tracing::info!("Bevanda standard created: {}", row.articolo_id);
        Ok(SingleResponse::ok(row, messages::creato(LABEL)))
    }

    pub async fn update(&self, id: i64, dto: BevandaStandardDto) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(id, "ID").and_then(|_| validate_dto(&dto)) {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let conflitto = messages::esiste_gia(LABEL, &chiave(&dto));
        let immagine_url = immagine(&dto);

        let mut tx = self.pool.begin().await?;

        let Some(existing) =
            store::fetch_by_id::<BevandaStandard, _>(&mut *tx, BEVANDA_STANDARD, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let unchanged = existing.personalizzazione_id == dto.personalizzazione_id
            && existing.dimensione_bicchiere_id == dto.dimensione_bicchiere_id
            && same_amount(existing.prezzo, dto.prezzo)
            && existing.immagine_url == immagine_url
            && existing.disponibile == dto.disponibile
            && existing.sempre_disponibile == dto.sempre_disponibile
            && existing.priorita == dto.priorita;
        if unchanged {
            return Ok(SingleResponse::ok_false(NESSUNA_MODIFICA));
        }

        if let Some(message) = missing_reference(&mut tx, &references(&dto)).await? {
            return Ok(SingleResponse::fail(message));
        }
        let key = [
            KeyPart::Int("personalizzazione_id", dto.personalizzazione_id),
            KeyPart::Int("dimensione_bicchiere_id", dto.dimensione_bicchiere_id),
        ];
        if !UNIQUE.is_unique(&mut tx, &key, Some(id)).await? {
            return Ok(SingleResponse::fail(conflitto));
        }

        let now = Utc::now();
        let updated = sqlx::query(
            r#"
            UPDATE bevanda_standard
            SET personalizzazione_id = ?, dimensione_bicchiere_id = ?, prezzo = ?, immagine_url = ?,
                disponibile = ?, sempre_disponibile = ?, priorita = ?, data_aggiornamento = ?
            WHERE articolo_id = ?
            "#,
        )
        .bind(dto.personalizzazione_id)
        .bind(dto.dimensione_bicchiere_id)
        .bind(dto.prezzo)
        .bind(&immagine_url)
        .bind(dto.disponibile)
        .bind(dto.sempre_disponibile)
        .bind(dto.priorita)
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

        tracing::info!("Bevanda standard {} updated", id);
        Ok(SingleResponse::ok(true, messages::aggiornato(LABEL)))
    }

    pub async fn delete(&self, id: i64, force_delete: bool) -> RepoResult<SingleResponse<bool>> {
        articolo::delete_composite(&self.pool, BEVANDA_STANDARD, LABEL, id, force_delete).await
    }

    pub async fn exists(&self, id: i64) -> RepoResult<SingleResponse<bool>> {
        repository::exists(&self.pool, BEVANDA_STANDARD, LABEL, id).await
    }

    pub async fn exists_by_combinazione(
        &self,
        personalizzazione_id: i64,
        dimensione_bicchiere_id: i64,
        exclude_id: Option<i64>,
    ) -> RepoResult<SingleResponse<bool>> {
        if let Err(err) = validate_id(personalizzazione_id, "ID personalizzazione")
            .and_then(|_| validate_id(dimensione_bicchiere_id, "ID dimensione bicchiere"))
        {
            return Ok(SingleResponse::fail(err.to_string()));
        }
        let builder = SelectBuilder::new(BEVANDA_STANDARD)
            .eq("personalizzazione_id", personalizzazione_id)
            .eq("dimensione_bicchiere_id", dimensione_bicchiere_id)
            .exclude_id(exclude_id);
        repository::exists_where(&self.pool, builder, LABEL).await
    }

    pub async fn count(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(BEVANDA_STANDARD)).await
    }

    pub async fn count_disponibili(&self) -> RepoResult<SingleResponse<i64>> {
        repository::count(&self.pool, SelectBuilder::new(BEVANDA_STANDARD).filter(VENDIBILE)).await
    }

    /// List price for the drink's cup size: `prezzo_base * moltiplicatore`.
    pub async fn calcola_prezzo_listino(&self, id: i64) -> RepoResult<SingleResponse<PrezzoListino>> {
        if let Err(err) = validate_id(id, "ID") {
            return Ok(SingleResponse::fail(err.to_string()));
        }

        let mut conn = self.pool.acquire().await?;

        let Some(bevanda) =
            store::fetch_by_id::<BevandaStandard, _>(&mut *conn, BEVANDA_STANDARD, id).await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(LABEL, id)));
        };
        let Some(dimensione) = store::fetch_by_id::<DimensioneBicchiere, _>(
            &mut *conn,
            DIMENSIONE_BICCHIERE,
            bevanda.dimensione_bicchiere_id,
        )
        .await?
        else {
            return Ok(SingleResponse::fail(messages::non_trovato(
                dimensione_bicchiere::LABEL,
                bevanda.dimensione_bicchiere_id,
            )));
        };

        let prezzo = PriceCalculator::from_stored(dimensione.prezzo_base).and_then(|base| {
            let moltiplicatore = PriceCalculator::from_stored(dimensione.moltiplicatore)?;
            let calcolato = PriceCalculator::prezzo_per_dimensione(base, moltiplicatore)?;
            Ok((base, moltiplicatore, calcolato))
        });
        let (prezzo_base, moltiplicatore, prezzo_calcolato) = match prezzo {
            Ok(values) => values,
            Err(err) => return Ok(SingleResponse::fail(err.to_string())),
        };

        tracing::debug!("Prezzo listino for bevanda {}: {}", id, prezzo_calcolato);
        Ok(SingleResponse::ok(
            PrezzoListino {
                articolo_id: id,
                dimensione_bicchiere_id: dimensione.dimensione_bicchiere_id,
                prezzo_base,
                moltiplicatore,
                prezzo_calcolato,
            },
            "Prezzo calcolato con successo",
        ))
    }
}
