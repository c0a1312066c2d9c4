use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::validation::validate_safe_text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tavolo {
    pub tavolo_id: i64,
    pub numero: i32,
    pub disponibile: bool,
    /// Free-text area, e.g. "Sala" or "Dehors"
    pub zona: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TavoloDto {
    #[validate(range(min = 1, max = 9999))]
    pub numero: i32,
    pub disponibile: bool,
    #[validate(custom = "validate_safe_text")]
    #[validate(length(max = 50))]
    pub zona: Option<String>,
}
