//! Utility functions and helpers

use ethers::types::U256;
use rand::Rng;

/// Count decimal places in the shortest display form of a float
fn decimal_places(value: f64) -> usize {
    let rendered = format!("{}", value);
    match rendered.split_once('.') {
        Some((_, frac)) => frac.len(),
        None => 0,
    }
}

/// Uniform random float in `[a, b]`, rounded to one digit more than the
/// wider of the two bounds so logged amounts look hand-entered.
pub fn random_float<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    random_float_diff(rng, a, b, 1)
}

pub fn random_float_diff<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64, diff: usize) -> f64 {
    let value = if a == b { a } else { rng.gen_range(a..=b) };
    let precision = decimal_places(a).max(decimal_places(b)) + diff;
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Convert a wei amount to native units
pub fn wei_to_ether(wei: U256) -> f64 {
    let (quot, rem) = (wei / U256::exp10(18), wei % U256::exp10(18));
    quot.as_u128() as f64 + rem.as_u128() as f64 / 1e18
}

/// Convert native units to wei
pub fn ether_to_wei(amount: f64) -> U256 {
    // f64 has ~15 significant digits; split to keep sub-unit precision
    let whole = amount.trunc() as u128;
    let frac = ((amount.fract()) * 1e18).round() as u128;
    U256::from(whole) * U256::exp10(18) + U256::from(frac)
}

/// Convert a raw ERC-20 amount to whole token units
pub fn raw_to_units(raw: U256, decimals: u8) -> f64 {
    let scale = U256::exp10(decimals as usize);
    let (quot, rem) = (raw / scale, raw % scale);
    quot.as_u128() as f64 + rem.as_u128() as f64 / 10f64.powi(decimals as i32)
}

pub fn explorer_tx_url(base_explorer_url: &str, tx_hash: &str) -> String {
    format!("{}tx/{}", with_trailing_slash(base_explorer_url), tx_hash)
}

pub fn explorer_address_url(base_explorer_url: &str, address: &str) -> String {
    format!("{}address/{}", with_trailing_slash(base_explorer_url), address)
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}
