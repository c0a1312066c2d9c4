// Activity log: audit entries and retention

pub mod models;
pub mod repository;

pub use models::*;
pub use repository::LogAttivitaRepository;

#[cfg(test)]
mod tests;
