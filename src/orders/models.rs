use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::catalog::models::TipoArticolo;
use crate::validation::{validate_finite, validate_not_blank, validate_safe_text};

/// Order status row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StatoOrdine {
    pub stato_ordine_id: i64,
    pub stato_ordine: String,
    /// Completed and cancelled orders sit in a terminal state
    pub terminale: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatoOrdineDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 50))]
    pub stato_ordine: String,
    pub terminale: bool,
}

/// Payment status row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StatoPagamento {
    pub stato_pagamento_id: i64,
    pub stato_pagamento: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatoPagamentoDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 50))]
    pub stato_pagamento: String,
}

/// Waiting-time thresholds (minutes) for one order status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConfigSoglieTempi {
    pub soglia_id: i64,
    pub stato_ordine_id: i64,
    pub soglia_attenzione: i32,
    pub soglia_critico: i32,
    pub data_aggiornamento: DateTime<Utc>,
    pub utente_aggiornamento: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfigSoglieTempiDto {
    #[validate(range(min = 1))]
    pub stato_ordine_id: i64,
    #[validate(range(min = 1, max = 1440))]
    pub soglia_attenzione: i32,
    #[validate(range(min = 1, max = 1440))]
    pub soglia_critico: i32,
    #[validate(custom = "validate_safe_text")]
    #[validate(length(max = 100))]
    pub utente_aggiornamento: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ordine {
    pub ordine_id: i64,
    pub cliente_id: i64,
    pub stato_ordine_id: i64,
    pub stato_pagamento_id: i64,
    pub sessione_id: Option<Uuid>,
    pub totale: f64,
    pub priorita: i32,
    pub data_creazione: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

/// Create/update payload for an order; the total is always derived from its lines
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrdineDto {
    #[validate(range(min = 1))]
    pub cliente_id: i64,
    #[validate(range(min = 1))]
    pub stato_ordine_id: i64,
    #[validate(range(min = 1))]
    pub stato_pagamento_id: i64,
    pub sessione_id: Option<Uuid>,
    #[validate(range(min = 1, max = 10))]
    pub priorita: i32,
}

/// One interval of an order's status history; `fine` is open while current
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StatoStoricoOrdine {
    pub stato_storico_ordine_id: i64,
    pub ordine_id: i64,
    pub stato_ordine_id: i64,
    pub inizio: DateTime<Utc>,
    pub fine: Option<DateTime<Utc>>,
}

impl StatoStoricoOrdine {
    pub fn is_corrente(&self) -> bool {
        self.fine.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub order_item_id: i64,
    pub ordine_id: i64,
    pub articolo_id: i64,
    pub quantita: i32,
    pub prezzo_unitario: f64,
    pub sconto_applicato: f64,
    pub imponibile: f64,
    pub totale_ivato: f64,
    pub tax_rate_id: i64,
    pub tipo_articolo: TipoArticolo,
    pub data_creazione: DateTime<Utc>,
    pub data_aggiornamento: DateTime<Utc>,
}

/// Order line payload; `imponibile` and `totale_ivato` are computed, never supplied
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderItemDto {
    #[validate(range(min = 1))]
    pub ordine_id: i64,
    #[validate(range(min = 1))]
    pub articolo_id: i64,
    #[validate(range(min = 1, max = 1000))]
    pub quantita: i32,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub prezzo_unitario: f64,
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 100000.0))]
    pub sconto_applicato: f64,
    #[validate(range(min = 1))]
    pub tax_rate_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaxRate {
    pub tax_rate_id: i64,
    pub aliquota: f64,
    pub descrizione: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TaxRateDto {
    #[validate(custom = "validate_finite")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub aliquota: f64,
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub descrizione: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_dto;

    #[test]
    fn test_order_item_dto_bounds() {
        let dto = OrderItemDto {
            ordine_id: 1,
            articolo_id: 1,
            quantita: 0,
            prezzo_unitario: 4.5,
            sconto_applicato: 0.0,
            tax_rate_id: 1,
        };
        assert!(validate_dto(&dto).is_err());
    }

    #[test]
    fn test_storico_corrente() {
        let now = Utc::now();
        let aperto = StatoStoricoOrdine {
            stato_storico_ordine_id: 1,
            ordine_id: 1,
            stato_ordine_id: 1,
            inizio: now,
            fine: None,
        };
        assert!(aperto.is_corrente());
        let chiuso = StatoStoricoOrdine {
            fine: Some(now),
            ..aperto
        };
        assert!(!chiuso.is_corrente());
    }
}
