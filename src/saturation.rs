//! Estimating the number of molecules behind a set of barcodes.
//!
//! Drawing `N` barcodes uniformly from an alphabet of `S` possible barcodes is expected to yield
//! `S·(1 − (1 − 1/S)^N)` distinct barcodes. When barcodes are short (or only a prefix of each is
//! compared), distinct molecules collide by chance and the distinct count `U` underestimates the
//! number of molecules; inverting the occupancy model recovers the estimate.

use crate::errors::CollapseError;
use serde::Serialize;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SaturationModel {
    /// N = ln(1 − U/S) / ln(1 − 1/S), the exact inverse of the occupancy model
    Exact,
    /// N = −S·ln(1 − U/S), the large alphabet limit of the occupancy model
    Poisson,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Rounding {
    Floor,
    Nearest,
    Ceil,
}

impl Rounding {
    pub fn apply(&self, estimate: f64) -> u64 {
        let rounded = match self {
            Rounding::Floor => estimate.floor(),
            Rounding::Nearest => estimate.round(),
            Rounding::Ceil => estimate.ceil(),
        };
        rounded.max(0.0) as u64
    }
}

/// Number of distinct barcodes of `length` symbols over an alphabet of `symbols` letters.
pub fn alphabet_size(symbols: u32, length: u32) -> f64 {
    (symbols as f64).powf(length as f64)
}

/// Expected number of distinct barcodes after `draws` uniform draws from `alphabet` barcodes.
pub fn expected_distinct(draws: f64, alphabet: f64) -> f64 {
    alphabet * (1.0 - (1.0 - 1.0 / alphabet).powf(draws))
}

/// Estimates how many molecules produced `distinct` different barcodes out of `draws` observed
/// ones, in a barcode space of `alphabet` barcodes.
///
/// # Errors
///
/// * `Configuration` if more distinct barcodes than draws are given, or the alphabet is empty or
///   too large to represent.
/// * `SaturationOverflow` if every barcode of the alphabet was observed, where the estimate
///   diverges.
pub fn estimate_molecules(
    distinct: usize,
    draws: usize,
    alphabet: f64,
    model: SaturationModel,
) -> Result<f64, CollapseError> {
    if distinct > draws {
        return Err(CollapseError::config(
            "distinct",
            format!("{distinct} distinct barcodes cannot come from {draws} draws"),
        ));
    }
    if !(alphabet >= 1.0) {
        return Err(CollapseError::config(
            "alphabet",
            format!("barcode alphabet of size {alphabet} is empty"),
        ));
    }
    if !alphabet.is_finite() {
        return Err(CollapseError::config(
            "alphabet",
            "the barcode alphabet is too large to represent; compare fewer bases",
        ));
    }
    if distinct == 0 {
        return Ok(0.0);
    }
    if distinct as f64 >= alphabet {
        return Err(CollapseError::SaturationOverflow { distinct, alphabet });
    }

    // ln_1p keeps precision when U/S and 1/S are tiny
    let occupied = (-(distinct as f64) / alphabet).ln_1p();
    let estimate = match model {
        SaturationModel::Exact => occupied / (-1.0 / alphabet).ln_1p(),
        SaturationModel::Poisson => -alphabet * occupied,
    };
    if !estimate.is_finite() {
        return Err(CollapseError::config(
            "alphabet",
            format!("no finite estimate for {distinct} distinct barcodes in an alphabet of {alphabet}"),
        ));
    }
    Ok(estimate)
}
