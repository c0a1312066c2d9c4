use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PricingError;

/// Ingredient quantity resolved for one cup size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitaScalata {
    pub quantita_base: Decimal,
    /// `None` when the size has no override row and the base quantity is used as is
    pub moltiplicatore_applicato: Option<Decimal>,
    pub quantita: Decimal,
}

impl QuantitaScalata {
    pub fn is_fallback(&self) -> bool {
        self.moltiplicatore_applicato.is_none()
    }
}

/// Scales a recipe's base quantity by the per-size multiplier.
///
/// A missing multiplier falls back to the unscaled base quantity.
pub fn scala_quantita(
    quantita_base: Decimal,
    moltiplicatore: Option<Decimal>,
) -> Result<QuantitaScalata, PricingError> {
    if quantita_base <= Decimal::ZERO {
        return Err(PricingError::QuantitaNonValida);
    }

    let quantita = match moltiplicatore {
        Some(m) if m <= Decimal::ZERO => return Err(PricingError::QuantitaNonValida),
        Some(m) => (quantita_base * m).round_dp(4),
        None => quantita_base,
    };

    Ok(QuantitaScalata {
        quantita_base,
        moltiplicatore_applicato: moltiplicatore,
        quantita,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scales_by_multiplier() {
        let scalata = scala_quantita(dec!(30), Some(dec!(1.5))).unwrap();
        assert_eq!(scalata.quantita, dec!(45));
        assert!(!scalata.is_fallback());
    }

    #[test]
    fn test_missing_multiplier_keeps_base() {
        let scalata = scala_quantita(dec!(30), None).unwrap();
        assert_eq!(scalata.quantita, dec!(30));
        assert!(scalata.is_fallback());
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(scala_quantita(dec!(0), Some(dec!(1))).is_err());
        assert!(scala_quantita(dec!(10), Some(dec!(0))).is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_multiplier_one_is_identity(base_milli in 1u32..=1_000_000u32) {
            let base = Decimal::from(base_milli) / Decimal::from(1000);
            let scalata = scala_quantita(base, Some(Decimal::ONE)).unwrap();
            prop_assert_eq!(scalata.quantita, base);
        }

        #[test]
        fn prop_larger_multiplier_never_shrinks(
            base_milli in 1u32..=100_000u32,
            pct in 100u32..=400u32
        ) {
            let base = Decimal::from(base_milli) / Decimal::from(1000);
            let m = Decimal::from(pct) / Decimal::from(100);
            let scalata = scala_quantita(base, Some(m)).unwrap();
            prop_assert!(scalata.quantita >= base);
        }
    }
}
