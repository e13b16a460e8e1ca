use std::fmt;

use foundation::Scalar;

/// Rejected bin sequence. Indexes point at the offending entry so an editor
/// can highlight it.
#[derive(Debug, Clone, PartialEq)]
pub enum BinError {
    Empty,
    NotNumeric { index: usize, value: Scalar },
    NotAscending { index: usize, previous: f64, current: f64 },
    /// A numeric style was asked to classify data with no numeric values.
    NoNumericValues,
}

impl fmt::Display for BinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinError::Empty => write!(f, "at least one bin is required"),
            BinError::NotNumeric { index, value } => {
                write!(f, "bin {index} (`{value}`) is not a number")
            }
            BinError::NotAscending {
                index,
                previous,
                current,
            } => write!(
                f,
                "bin {index} ({current}) must be greater than bin {} ({previous})",
                index - 1
            ),
            BinError::NoNumericValues => write!(f, "dataset has no numeric values"),
        }
    }
}

impl std::error::Error for BinError {}

/// Accept user-supplied bins only if every entry is a finite number and the
/// sequence strictly increases. The first violation is reported.
pub fn validate_custom_bins(bins: &[Scalar]) -> Result<Vec<f64>, BinError> {
    if bins.is_empty() {
        return Err(BinError::Empty);
    }
    let mut out: Vec<f64> = Vec::with_capacity(bins.len());
    for (index, value) in bins.iter().enumerate() {
        let current = value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| BinError::NotNumeric {
                index,
                value: value.clone(),
            })?;
        if let Some(&previous) = out.last()
            && current <= previous
        {
            return Err(BinError::NotAscending {
                index,
                previous,
                current,
            });
        }
        out.push(current);
    }
    Ok(out)
}

/// Grow or shrink `bins` to `n` entries, keeping existing values.
///
/// New bins continue above the last one by the last observed step, or by
/// one unit when fewer than two bins exist. Shrinking drops from the end.
pub fn resize_bins(bins: &[f64], n: usize) -> Vec<f64> {
    if n <= bins.len() {
        return bins[..n].to_vec();
    }
    let step = match bins {
        [.., a, b] if b > a => b - a,
        _ => 1.0,
    };
    let mut out = bins.to_vec();
    let mut last = bins.last().copied().unwrap_or(0.0);
    while out.len() < n {
        last += step;
        out.push(last);
    }
    out
}
