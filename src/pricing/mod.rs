pub mod price_calculator;
pub mod quantity;

pub use price_calculator::*;
pub use quantity::*;
