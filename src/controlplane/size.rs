//! Canonical size grammar used by storage directives and constraints.

use thiserror::Error;

/// Unit suffixes in ascending order; each step multiplies by 1024.
const SIZE_SUFFIXES: &[char] = &['M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

/// Error returned when a size string does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    /// The suffix is not one of the known units.
    #[error("invalid multiplier suffix {0:?}, expected one of MGTPEZY")]
    InvalidSuffix(String),

    /// The numeric part is missing, negative, or malformed.
    #[error("expected a non-negative number, got {0:?}")]
    InvalidNumber(String),

    /// The value does not fit in 64 bits of MiB.
    #[error("size {0:?} is too large")]
    Overflow(String),
}

/// Parses a human size such as `10G` into mebibytes.
///
/// A bare number is taken as MiB. Suffixes may be written as `G`, `GB`,
/// or `GiB`. Fractional results are rounded up.
///
/// # Errors
///
/// Returns an error if the suffix is unknown or the number is malformed.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let split = input.find(|c: char| c != '.' && !c.is_ascii_digit());

    let (number, multiplier) = match split {
        Some(index) if index > 0 => {
            let (number, suffix) = input.split_at(index);
            (number, suffix_multiplier(suffix)?)
        }
        _ => (input, 1.0),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| SizeError::InvalidNumber(number.to_string()))?;
    if value < 0.0 || !value.is_finite() {
        return Err(SizeError::InvalidNumber(number.to_string()));
    }

    let scaled = (value * multiplier).ceil();
    if scaled > u64::MAX as f64 {
        return Err(SizeError::Overflow(input.to_string()));
    }

    Ok(scaled as u64)
}

/// Returns the MiB multiplier for a suffix such as `G`, `GB`, or `GiB`.
fn suffix_multiplier(suffix: &str) -> Result<f64, SizeError> {
    SIZE_SUFFIXES
        .iter()
        .enumerate()
        .find(|(_, base)| {
            let base = base.to_string();
            suffix == base || suffix == format!("{base}B") || suffix == format!("{base}iB")
        })
        .map(|(step, _)| {
            #[allow(clippy::cast_precision_loss)]
            let multiplier = (1u64 << (step * 10)) as f64;
            multiplier
        })
        .ok_or_else(|| SizeError::InvalidSuffix(suffix.to_string()))
}

/// Formats a MiB value with the largest unit that divides it exactly.
#[must_use]
pub fn format_size(mib: u64) -> String {
    let mut value = mib;
    let mut step = 0;
    while value != 0 && value % 1024 == 0 && step + 1 < SIZE_SUFFIXES.len() {
        value /= 1024;
        step += 1;
    }
    format!("{value}{}", SIZE_SUFFIXES[step])
}
