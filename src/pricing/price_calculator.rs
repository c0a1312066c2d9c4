use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Pricing input that cannot produce a valid amount
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Quantità non valida")]
    QuantitaNonValida,

    #[error("Aliquota non valida: deve essere compresa tra 0 e 100")]
    AliquotaNonValida,

    #[error("Sconto applicato non valido")]
    ScontoNonValido,

    #[error("Importo non valido")]
    ImportoNonValido,
}

/// Taxable and tax-inclusive amounts of one order line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    pub imponibile: Decimal,
    pub totale_ivato: Decimal,
}

/// Service for calculating line totals, size prices and order totals
pub struct PriceCalculator;

impl PriceCalculator {
    /// Rounds to currency precision, half away from zero
    pub fn round_money(value: Decimal) -> Decimal {
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Converts a stored REAL amount; NaN and infinities are rejected.
    pub fn from_stored(value: f64) -> Result<Decimal, PricingError> {
        Decimal::from_f64(value).ok_or(PricingError::ImportoNonValido)
    }

    /// Converts back to the stored REAL representation.
    pub fn to_stored(value: Decimal) -> f64 {
        value.to_f64().unwrap_or_default()
    }

    /// Calculate the taxable amount of an order line
    ///
    /// # Arguments
    /// * `quantita` - Number of items ordered
    /// * `prezzo_unitario` - Price per item at time of order
    /// * `sconto_applicato` - Absolute discount on the whole line
    ///
    /// # Returns
    /// `quantita * prezzo_unitario - sconto_applicato`, rounded to 2 decimals
    pub fn calculate_imponibile(
        quantita: i32,
        prezzo_unitario: Decimal,
        sconto_applicato: Decimal,
    ) -> Result<Decimal, PricingError> {
        if quantita <= 0 {
            return Err(PricingError::QuantitaNonValida);
        }
        if prezzo_unitario < Decimal::ZERO {
            return Err(PricingError::ImportoNonValido);
        }

        let lordo = Decimal::from(quantita) * prezzo_unitario;
        if sconto_applicato < Decimal::ZERO || sconto_applicato > lordo {
            return Err(PricingError::ScontoNonValido);
        }
        Ok(Self::round_money(lordo - sconto_applicato))
    }

    /// `imponibile * (1 + aliquota / 100)`, rounded to 2 decimals
    pub fn calculate_totale_ivato(
        imponibile: Decimal,
        aliquota: Decimal,
    ) -> Result<Decimal, PricingError> {
        if aliquota < Decimal::ZERO || aliquota > Decimal::ONE_HUNDRED {
            return Err(PricingError::AliquotaNonValida);
        }
        let fattore = Decimal::ONE + aliquota / Decimal::ONE_HUNDRED;
        Ok(Self::round_money(imponibile * fattore))
    }

    pub fn calculate_line(
        quantita: i32,
        prezzo_unitario: Decimal,
        sconto_applicato: Decimal,
        aliquota: Decimal,
    ) -> Result<LineTotals, PricingError> {
        let imponibile = Self::calculate_imponibile(quantita, prezzo_unitario, sconto_applicato)?;
        let totale_ivato = Self::calculate_totale_ivato(imponibile, aliquota)?;
        Ok(LineTotals {
            imponibile,
            totale_ivato,
        })
    }

    /// Calculate total price for an order
    ///
    /// # Arguments
    /// * `line_totals` - Tax-inclusive totals of every order line
    pub fn calculate_total(line_totals: &[Decimal]) -> Decimal {
        Self::round_money(line_totals.iter().sum())
    }

    /// List price of a drink in a given cup size: `prezzo_base * moltiplicatore`
    pub fn prezzo_per_dimensione(
        prezzo_base: Decimal,
        moltiplicatore: Decimal,
    ) -> Result<Decimal, PricingError> {
        if prezzo_base < Decimal::ZERO || moltiplicatore <= Decimal::ZERO {
            return Err(PricingError::ImportoNonValido);
        }
        Ok(Self::round_money(prezzo_base * moltiplicatore))
    }

    /// Custom drink price: the size price plus every selected ingredient's surcharge
    pub fn prezzo_bevanda_custom(
        prezzo_base: Decimal,
        moltiplicatore: Decimal,
        supplementi: &[Decimal],
    ) -> Result<Decimal, PricingError> {
        let base = Self::prezzo_per_dimensione(prezzo_base, moltiplicatore)?;
        if supplementi.iter().any(|s| *s < Decimal::ZERO) {
            return Err(PricingError::ImportoNonValido);
        }
        let extra: Decimal = supplementi.iter().sum();
        Ok(Self::round_money(base + extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_two_items_at_22_percent() {
        let totals = PriceCalculator::calculate_line(2, dec!(4.50), dec!(0), dec!(22)).unwrap();
        assert_eq!(totals.imponibile, dec!(9.00));
        assert_eq!(totals.totale_ivato, dec!(10.98));
    }

    #[test]
    fn test_line_with_discount() {
        let totals = PriceCalculator::calculate_line(3, dec!(5.00), dec!(1.50), dec!(10)).unwrap();
        assert_eq!(totals.imponibile, dec!(13.50));
        assert_eq!(totals.totale_ivato, dec!(14.85));
    }

    #[test]
    fn test_zero_rate_keeps_imponibile() {
        let totals = PriceCalculator::calculate_line(1, dec!(3.75), dec!(0), dec!(0)).unwrap();
        assert_eq!(totals.totale_ivato, dec!(3.75));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // 1.25 * 1.10 = 1.375
        let totale = PriceCalculator::calculate_totale_ivato(dec!(1.25), dec!(10)).unwrap();
        assert_eq!(totale, dec!(1.38));
    }

    #[test]
    fn test_rejects_rate_out_of_range() {
        assert_eq!(
            PriceCalculator::calculate_totale_ivato(dec!(10), dec!(100.01)),
            Err(PricingError::AliquotaNonValida)
        );
        assert_eq!(
            PriceCalculator::calculate_totale_ivato(dec!(10), dec!(-1)),
            Err(PricingError::AliquotaNonValida)
        );
    }

    #[test]
    fn test_rejects_discount_above_gross() {
        assert_eq!(
            PriceCalculator::calculate_imponibile(1, dec!(2.00), dec!(2.01)),
            Err(PricingError::ScontoNonValido)
        );
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        assert_eq!(
            PriceCalculator::calculate_imponibile(0, dec!(2.00), dec!(0)),
            Err(PricingError::QuantitaNonValida)
        );
    }

    #[test]
    fn test_calculate_total() {
        let total = PriceCalculator::calculate_total(&[dec!(10.98), dec!(5.50), dec!(3.25)]);
        assert_eq!(total, dec!(19.73));
        assert_eq!(PriceCalculator::calculate_total(&[]), dec!(0));
    }

    #[test]
    fn test_prezzo_per_dimensione() {
        assert_eq!(
            PriceCalculator::prezzo_per_dimensione(dec!(3.50), dec!(1.5)).unwrap(),
            dec!(5.25)
        );
        assert!(PriceCalculator::prezzo_per_dimensione(dec!(3.50), dec!(0)).is_err());
    }

    #[test]
    fn test_prezzo_bevanda_custom() {
        let prezzo =
            PriceCalculator::prezzo_bevanda_custom(dec!(3.00), dec!(1.2), &[dec!(0.50), dec!(0.30)])
                .unwrap();
        assert_eq!(prezzo, dec!(4.40));
    }

    #[test]
    fn test_stored_conversion() {
        assert_eq!(PriceCalculator::from_stored(4.5).unwrap(), dec!(4.5));
        assert!(PriceCalculator::from_stored(f64::NAN).is_err());
        assert!((PriceCalculator::to_stored(dec!(10.98)) - 10.98).abs() < 1e-9);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Tax-inclusive total never drops below the taxable amount
    #[test]
    fn prop_totale_ivato_not_below_imponibile() {
        proptest!(|(
            quantita in 1i32..=100,
            price_cents in 0u32..=10000u32,
            aliquota in 0u32..=100u32
        )| {
            let prezzo = Decimal::from(price_cents) / Decimal::from(100);
            let totals = PriceCalculator::calculate_line(
                quantita,
                prezzo,
                Decimal::ZERO,
                Decimal::from(aliquota),
            ).unwrap();
            prop_assert!(totals.totale_ivato >= totals.imponibile);
            prop_assert!(totals.imponibile >= Decimal::ZERO);
        });
    }

    /// Without discount the taxable amount is exactly quantity times price
    #[test]
    fn prop_imponibile_is_product_without_discount() {
        proptest!(|(
            quantita in 1i32..=1000,
            price_cents in 1u32..=10000u32
        )| {
            let prezzo = Decimal::from(price_cents) / Decimal::from(100);
            let imponibile =
                PriceCalculator::calculate_imponibile(quantita, prezzo, Decimal::ZERO).unwrap();
            prop_assert_eq!(imponibile, Decimal::from(quantita) * prezzo);
        });
    }

    /// Results always carry at most two decimals
    #[test]
    fn prop_results_have_currency_scale() {
        proptest!(|(
            base_cents in 0u32..=2000u32,
            moltiplicatore_pct in 1u32..=300u32
        )| {
            let base = Decimal::from(base_cents) / Decimal::from(100);
            let moltiplicatore = Decimal::from(moltiplicatore_pct) / Decimal::from(100);
            let prezzo = PriceCalculator::prezzo_per_dimensione(base, moltiplicatore).unwrap();
            prop_assert!(prezzo.scale() <= 2);
        });
    }

    /// Order of line totals doesn't affect the order total
    #[test]
    fn prop_total_is_commutative() {
        proptest!(|(
            totals_cents in prop::collection::vec(1u32..=10000u32, 2..=10)
        )| {
            let totals: Vec<Decimal> = totals_cents
                .iter()
                .map(|&cents| Decimal::from(cents) / Decimal::from(100))
                .collect();
            let mut reversed = totals.clone();
            reversed.reverse();
            prop_assert_eq!(
                PriceCalculator::calculate_total(&totals),
                PriceCalculator::calculate_total(&reversed)
            );
        });
    }
}
