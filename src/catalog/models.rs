use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::validation::{validate_finite, validate_not_blank, validate_safe_text};

/// Kind tag of an Articolo row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum TipoArticolo {
    #[sqlx(rename = "BS")]
    #[serde(rename = "BS")]
    BevandaStandard,
    #[sqlx(rename = "BC")]
    #[serde(rename = "BC")]
    BevandaCustom,
    #[sqlx(rename = "D")]
    #[serde(rename = "D")]
    Dolce,
}

impl TipoArticolo {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoArticolo::BevandaStandard => "BS",
            TipoArticolo::BevandaCustom => "BC",
            TipoArticolo::Dolce => "D",
        }
    }

    /// Parse a kind tag, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "BS" => Some(TipoArticolo::BevandaStandard),
            "BC" => Some(TipoArticolo::BevandaCustom),
            "D" => Some(TipoArticolo::Dolce),
            _ => None,
        }
    }
}

impl std::fmt::Display for TipoArticolo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Articolo {
    pub articolo_id: i64,
    pub tipo: TipoArticolo,
    pub data_creazione: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UnitaDiMisura {
    pub unita_misura_id: i64,
    pub sigla: String,
    pub descrizione: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UnitaDiMisuraDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 10))]
    pub sigla: String,
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub descrizione: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DimensioneBicchiere {
    pub dimensione_bicchiere_id: i64,
    pub sigla: String,
    pub descrizione: String,
    pub capienza: f64,
    pub unita_misura_id: i64,
    pub prezzo_base: f64,
    pub moltiplicatore: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DimensioneBicchiereDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 10))]
    pub sigla: String,
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub descrizione: String,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 1.0, max = 5000.0))]
    pub capienza: f64,
    #[validate(range(min = 1))]
    pub unita_misura_id: i64,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub prezzo_base: f64,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.1, max = 10.0))]
    pub moltiplicatore: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ingrediente {
    pub ingrediente_id: i64,
    pub nome: String,
    pub categoria: String,
    pub prezzo_aggiunto: f64,
    pub disponibile: bool,
    pub data_inserimento: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IngredienteDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub nome: String,
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 50))]
    pub categoria: String,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub prezzo_aggiunto: f64,
    pub disponibile: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Personalizzazione {
    pub personalizzazione_id: i64,
    pub nome: String,
    pub descrizione: String,
    pub dt_creazione: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersonalizzazioneDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 50))]
    pub nome: String,
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 255))]
    pub descrizione: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PersonalizzazioneIngrediente {
    pub personalizzazione_ingrediente_id: i64,
    pub personalizzazione_id: i64,
    pub ingrediente_id: i64,
    pub quantita: f64,
    pub unita_misura_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersonalizzazioneIngredienteDto {
    #[validate(range(min = 1))]
    pub personalizzazione_id: i64,
    #[validate(range(min = 1))]
    pub ingrediente_id: i64,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.001, max = 10000.0))]
    pub quantita: f64,
    #[validate(range(min = 1))]
    pub unita_misura_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DimensioneQuantitaIngredienti {
    pub dimensione_id: i64,
    pub personalizzazione_ingrediente_id: i64,
    pub dimensione_bicchiere_id: i64,
    pub moltiplicatore: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DimensioneQuantitaIngredientiDto {
    #[validate(range(min = 1))]
    pub personalizzazione_ingrediente_id: i64,
    #[validate(range(min = 1))]
    pub dimensione_bicchiere_id: i64,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.1, max = 10.0))]
    pub moltiplicatore: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PersonalizzazioneCustom {
    pub pers_custom_id: i64,
    pub nome: String,
    pub grado_dolcezza: i32,
    pub dimensione_bicchiere_id: i64,
    pub data_creazione: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersonalizzazioneCustomDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub nome: String,
    #[validate(range(min = 1, max = 3))]
    pub grado_dolcezza: i32,
    #[validate(range(min = 1))]
    pub dimensione_bicchiere_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct IngredientiPersonalizzazione {
    pub ingredienti_pers_id: i64,
    pub pers_custom_id: i64,
    pub ingrediente_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IngredientiPersonalizzazioneDto {
    #[validate(range(min = 1))]
    pub pers_custom_id: i64,
    #[validate(range(min = 1))]
    pub ingrediente_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BevandaStandard {
    pub articolo_id: i64,
    pub personalizzazione_id: i64,
    pub dimensione_bicchiere_id: i64,
    pub prezzo: f64,
    pub immagine_url: Option<String>,
    pub disponibile: bool,
    pub sempre_disponibile: bool,
    pub priorita: i32,
    pub data_creazione: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BevandaStandardDto {
    #[validate(range(min = 1))]
    pub personalizzazione_id: i64,
    #[validate(range(min = 1))]
    pub dimensione_bicchiere_id: i64,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub prezzo: f64,
    #[validate(custom = "validate_safe_text")]
    #[validate(length(max = 500))]
    pub immagine_url: Option<String>,
    pub disponibile: bool,
    pub sempre_disponibile: bool,
    #[validate(range(min = 1, max = 10))]
    pub priorita: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BevandaCustom {
    pub articolo_id: i64,
    pub pers_custom_id: i64,
    pub prezzo: f64,
    pub data_creazione: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BevandaCustomDto {
    #[validate(range(min = 1))]
    pub pers_custom_id: i64,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub prezzo: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Dolce {
    pub articolo_id: i64,
    pub nome: String,
    pub prezzo: f64,
    pub descrizione: Option<String>,
    pub immagine_url: Option<String>,
    pub disponibile: bool,
    pub priorita: i32,
    pub data_creazione: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DolceDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub nome: String,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub prezzo: f64,
    #[validate(custom = "validate_safe_text")]
    #[validate(length(max = 255))]
    pub descrizione: Option<String>,
    #[validate(custom = "validate_safe_text")]
    #[validate(length(max = 500))]
    pub immagine_url: Option<String>,
    pub disponibile: bool,
    #[validate(range(min = 1, max = 10))]
    pub priorita: i32,
}

/// Cup-size price of a standard drink, computed from its dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrezzoListino {
    pub articolo_id: i64,
    pub dimensione_bicchiere_id: i64,
    pub prezzo_base: rust_decimal::Decimal,
    pub moltiplicatore: rust_decimal::Decimal,
    pub prezzo_calcolato: rust_decimal::Decimal,
}

/// Ingredient quantity of a recipe line in one cup size
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantitaPerDimensione {
    pub personalizzazione_ingrediente_id: i64,
    pub dimensione_bicchiere_id: i64,
    pub unita_misura_id: i64,
    #[serde(flatten)]
    pub quantita: crate::pricing::QuantitaScalata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tipo_articolo_tags() {
        assert_eq!(TipoArticolo::BevandaStandard.as_str(), "BS");
        assert_eq!(TipoArticolo::parse(" bc "), Some(TipoArticolo::BevandaCustom));
        assert_eq!(TipoArticolo::parse("X"), None);
        assert_eq!(
            serde_json::to_string(&TipoArticolo::Dolce).expect("serialize"),
            "\"D\""
        );
    }
}
