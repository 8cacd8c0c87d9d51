//! Gompertz-type leaf disease progress model.
//!
//! `asymptote` bounds the severity for a given leaf temperature; `rate` peaks around
//! 28.5 °C and the wetness duration drives progress toward the asymptote.

use crate::error::{PredictorError, Result};

const ASYMPTOTE_INTERCEPT: f64 = -0.5506;
const ASYMPTOTE_LINEAR: f64 = 0.1221;
const ASYMPTOTE_QUADRATIC: f64 = -0.0025;
const RATE_SCALE: f64 = 8.1517;
const RATE_OPTIMUM_TEMPERATURE: f64 = 28.5159;
const RATE_SPREAD: f64 = 0.6577;
const SHAPE: f64 = 1.0553;

pub fn calculate_severity(temperature: f64, wetness: f64) -> Result<f64> {
    let fail = |reason| PredictorError::Computation {
        temperature,
        wetness,
        reason,
    };

    if !temperature.is_finite() || !wetness.is_finite() {
        return Err(fail("inputs must be finite"));
    }
    if temperature == 0.0 {
        return Err(fail("temperature is zero"));
    }
    if temperature / RATE_OPTIMUM_TEMPERATURE <= 0.0 {
        return Err(fail("temperature must be positive for the rate logarithm"));
    }

    let asymptote = ASYMPTOTE_INTERCEPT
        + (ASYMPTOTE_LINEAR * temperature)
        + (ASYMPTOTE_QUADRATIC * temperature.powi(2));
    let rate = (RATE_SCALE / temperature)
        * (-0.5 * ((temperature / RATE_OPTIMUM_TEMPERATURE).ln() / RATE_SPREAD).powi(2)).exp();
    let severity = asymptote * (1.0 - (-rate * wetness).exp()).powf(-1.0 / (1.0 - SHAPE));

    if !severity.is_finite() {
        return Err(fail("model produced a non-finite severity"));
    }
    Ok(severity)
}
