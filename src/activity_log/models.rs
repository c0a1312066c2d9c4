use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::validation::validate_not_blank;

/// Audit entry written by back-office operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LogAttivita {
    pub log_id: i64,
    pub tipo_attivita: String,
    pub descrizione: String,
    pub dettagli: Option<String>,
    pub data_esecuzione: DateTime<Utc>,
    pub utente_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogAttivitaDto {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 50))]
    pub tipo_attivita: String,
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 500))]
    pub descrizione: String,
    #[validate(length(max = 4000))]
    pub dettagli: Option<String>,
    #[validate(range(min = 1))]
    pub utente_id: Option<i64>,
}

/// Number of log entries of one activity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConteggioPerTipo {
    pub tipo_attivita: String,
    pub conteggio: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_dto;

    fn dto(tipo: &str, descrizione: &str) -> LogAttivitaDto {
        LogAttivitaDto {
            tipo_attivita: tipo.to_string(),
            descrizione: descrizione.to_string(),
            dettagli: None,
            utente_id: None,
        }
    }

    #[test]
    fn test_log_dto_validation() {
        assert!(validate_dto(&dto("PULIZIA", "Pulizia log")).is_ok());
        assert!(validate_dto(&dto("   ", "Pulizia log")).is_err());
        assert!(validate_dto(&dto("PULIZIA", "<script>alert(1)</script>")).is_err());

        let mut utente_zero = dto("LOGIN", "Accesso");
        utente_zero.utente_id = Some(0);
        assert!(validate_dto(&utente_zero).is_err());
    }
}
