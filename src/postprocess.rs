//! Prediction post-processing
//!
//! Business rule: a price is never negative. The raw model output is
//! clamped, rounded to 2 decimal places, and optionally rendered as a
//! Brazilian currency string. The formatting swaps separators explicitly
//! (thousands `.`, decimal `,`) so the result never depends on the host
//! locale.

use crate::error::{PreverError, Result};

/// Clamp a raw prediction to the non-negative range
#[must_use]
pub fn clamp_non_negative(value: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else {
        value
    }
}

/// Round to 2 decimal places
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Apply the full post-processing chain to a raw model output
///
/// A non-finite raw output means the model or the vector is broken; that is
/// an internal error, never a fabricated prediction.
pub fn finalize_price(raw: f64) -> Result<f64> {
    if !raw.is_finite() {
        return Err(PreverError::Internal(format!(
            "non-finite model output: {raw}"
        )));
    }
    Ok(round2(clamp_non_negative(raw)))
}

/// Format a non-negative amount as `R$ 1.500,50`
///
/// Thousands separator `.`, decimal separator `,`, fixed 2 decimals.
#[must_use]
pub fn format_brl(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("R$ {sign}{grouped},{frac_part}")
}
