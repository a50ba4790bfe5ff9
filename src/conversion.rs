//! ITS-90 inverse polynomial for type K thermocouples.
//!
//! Maps a measured thermoelectric voltage to temperature in °C. The three
//! coefficient sets and their branch boundaries are the published NIST
//! ITS-90 values; evaluation order is fixed (Horner, highest order first) so
//! results reproduce bit-for-bit.

use crate::error::{Result, ThermoError};
use serde::{Deserialize, Serialize};

pub const K_TYPE_MIN_UV: f64 = -5891.0;
pub const K_TYPE_MAX_UV: f64 = 54886.0;
/// Last voltage handled by the mid branch (inclusive).
pub const K_TYPE_MID_MAX_UV: f64 = 20644.0;

// -200 °C .. 0 °C
const K_INV_COEFF_NEG: [f64; 9] = [
    0.0,
    2.517_346_2e-02,
    -1.166_287_8e-06,
    -1.083_363_8e-09,
    -8.977_354_0e-13,
    -3.734_237_7e-16,
    -8.663_264_3e-20,
    -1.045_059_8e-23,
    -5.192_057_7e-28,
];

// 0 °C .. 500 °C
const K_INV_COEFF_MID: [f64; 10] = [
    0.0,
    2.508_355e-02,
    7.860_106e-08,
    -2.503_131e-10,
    8.315_270e-14,
    -1.228_034e-17,
    9.804_036e-22,
    -4.413_030e-26,
    1.057_734e-30,
    -1.052_755e-35,
];

// 500 °C .. 1372 °C
const K_INV_COEFF_HIGH: [f64; 7] = [
    -1.318_058e+02,
    4.830_222e-02,
    -1.646_031e-06,
    5.464_731e-11,
    -9.650_715e-16,
    8.802_193e-21,
    -3.110_810e-26,
];

/// Coefficient set used for a given voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Branch {
    Negative,
    Mid,
    High,
}

impl Branch {
    /// Select the branch for an in-range voltage. Does not validate the range.
    pub fn for_microvolts(microvolts: f64) -> Self {
        if microvolts < 0.0 {
            Branch::Negative
        } else if microvolts <= K_TYPE_MID_MAX_UV {
            Branch::Mid
        } else {
            Branch::High
        }
    }

    fn coefficients(self) -> &'static [f64] {
        match self {
            Branch::Negative => &K_INV_COEFF_NEG,
            Branch::Mid => &K_INV_COEFF_MID,
            Branch::High => &K_INV_COEFF_HIGH,
        }
    }
}

/// Horner evaluation, accumulating from the highest-order coefficient down.
fn poly_eval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Convert a K-type voltage in microvolts to °C.
///
/// Fails with [`ThermoError::OutOfRange`] outside `[-5891, 54886]` µV
/// (NaN included).
pub fn uv_to_celsius(microvolts: f64) -> Result<f64> {
    if !(K_TYPE_MIN_UV..=K_TYPE_MAX_UV).contains(&microvolts) {
        return Err(ThermoError::OutOfRange { microvolts });
    }
    let branch = Branch::for_microvolts(microvolts);
    Ok(poly_eval(branch.coefficients(), microvolts))
}

/// Convert a K-type voltage in millivolts to °C.
pub fn mv_to_celsius(millivolts: f64) -> Result<f64> {
    uv_to_celsius(millivolts * 1000.0)
}
