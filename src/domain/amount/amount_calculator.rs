//! Amount bounds for a single project on a single account

use rand::Rng;

use crate::shared::errors::TradeError;
use crate::shared::types::AmountSpec;
use crate::shared::utils::random_float;

/// Randomization bounds in native units.
/// Invariant: `0 <= min_native <= max_native <= balance - reserve`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountBounds {
    pub min_native: f64,
    pub max_native: f64,
}

impl AmountBounds {
    /// Compute bounds from the current balance observation. The reserve
    /// ("keep amount") is subtracted before anything else; a reserve that
    /// alone exceeds the balance is an error, not a clamp to zero.
    pub fn compute(
        balance: f64,
        reserve: f64,
        price_usd: f64,
        spec: &AmountSpec,
    ) -> Result<Self, TradeError> {
        let available = balance - reserve;
        if available < 0.0 {
            return Err(TradeError::InsufficientBalance {
                available,
                required: 0.0,
            });
        }

        let (min_native, max_native) = match *spec {
            AmountSpec::Usd(min_usd, max_usd) => (min_usd / price_usd, max_usd / price_usd),
            AmountSpec::Native(min, max) => (min, max),
            AmountSpec::Percent(min_pct, max_pct) => (
                available * min_pct as f64 / 100.0,
                available * max_pct as f64 / 100.0,
            ),
        };

        let max_native = max_native.min(available);
        if min_native > max_native {
            return Err(TradeError::InsufficientBalance {
                available,
                required: min_native,
            });
        }

        Ok(Self {
            min_native,
            max_native,
        })
    }

    /// Draw the final amount uniformly at random from the bounds
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        random_float(rng, self.min_native, self.max_native)
    }
}
