// Front of house: tables and the clients seated at them

pub mod models;
pub mod tavolo;

pub use models::*;
pub use tavolo::TavoloRepository;

use crate::messages::Label;
use crate::store::TableSpec;

/// Clients are created by the ordering front end; repositories here only
/// reference them.
pub const CLIENTE: TableSpec = TableSpec {
    table: "cliente",
    id_column: "cliente_id",
    columns: "cliente_id, tavolo_id, data_creazione",
};

pub const CLIENTE_LABEL: Label = Label::maschile("Cliente", "un cliente");
