// Catalog: sellable items, recipes, ingredients and cup sizes

pub mod articolo;
pub mod bevanda_custom;
pub mod bevanda_standard;
pub mod dimensione_bicchiere;
pub mod dimensione_quantita_ingredienti;
pub mod dolce;
pub mod ingrediente;
pub mod ingredienti_personalizzazione;
pub mod models;
pub mod personalizzazione;
pub mod personalizzazione_custom;
pub mod personalizzazione_ingrediente;
pub mod unita_di_misura;

pub use articolo::ArticoloRepository;
pub use bevanda_custom::BevandaCustomRepository;
pub use bevanda_standard::BevandaStandardRepository;
pub use dimensione_bicchiere::DimensioneBicchiereRepository;
pub use dimensione_quantita_ingredienti::DimensioneQuantitaIngredientiRepository;
pub use dolce::DolceRepository;
pub use ingrediente::IngredienteRepository;
pub use ingredienti_personalizzazione::IngredientiPersonalizzazioneRepository;
pub use models::*;
pub use personalizzazione::PersonalizzazioneRepository;
pub use personalizzazione_custom::PersonalizzazioneCustomRepository;
pub use personalizzazione_ingrediente::PersonalizzazioneIngredienteRepository;
pub use unita_di_misura::UnitaDiMisuraRepository;

#[cfg(test)]
mod tests;
