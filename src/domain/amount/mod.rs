//! Balance-safe randomized amount computation

mod amount_calculator;

pub use amount_calculator::AmountBounds;
