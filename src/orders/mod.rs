// Orders: headers, lines, status workflow and reference tables

pub mod config_soglie_tempi;
pub mod models;
pub mod order_item;
pub mod ordine;
pub mod stato_ordine;
pub mod stato_pagamento;
pub mod stato_storico_ordine;
pub mod status_workflow;
pub mod tax_rates;

pub use config_soglie_tempi::ConfigSoglieTempiRepository;
pub use models::*;
pub use order_item::OrderItemRepository;
pub use ordine::OrdineRepository;
pub use stato_ordine::StatoOrdineRepository;
pub use stato_pagamento::StatoPagamentoRepository;
pub use stato_storico_ordine::StatoStoricoOrdineRepository;
pub use status_workflow::StatusWorkflow;
pub use tax_rates::TaxRatesRepository;
