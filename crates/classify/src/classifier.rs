use std::str::FromStr;

use foundation::math::round_significant;
use foundation::{Dataset, Scalar};
use serde::{Deserialize, Serialize};

use crate::custom::BinError;
use crate::quantile::quantile_breaks;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStyle {
    Continuous,
    Diverging,
    Categorical,
}

impl FromStr for ClassificationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(ClassificationStyle::Continuous),
            "diverging" => Ok(ClassificationStyle::Diverging),
            "categorical" => Ok(ClassificationStyle::Categorical),
            other => Err(format!("unknown classification style `{other}`")),
        }
    }
}

/// Ordered bins: ascending breaks for numeric styles, distinct values for
/// categorical ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassificationBins {
    Numeric(Vec<f64>),
    Categories(Vec<Scalar>),
}

impl ClassificationBins {
    pub fn len(&self) -> usize {
        match self {
            ClassificationBins::Numeric(v) => v.len(),
            ClassificationBins::Categories(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            ClassificationBins::Numeric(v) => Some(v),
            ClassificationBins::Categories(_) => None,
        }
    }
}

/// Classification settings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    pub significant_figures: u32,
    pub continuous_bins: usize,
    /// Breaks on each side of zero.
    pub diverging_breaks: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            significant_figures: 2,
            continuous_bins: 8,
            diverging_breaks: 3,
        }
    }
}

impl Classifier {
    /// Compute bins for `dataset`. `num_bins` overrides the style's default
    /// count (breaks per side for diverging).
    ///
    /// Numeric styles fail with [`BinError::NoNumericValues`] when the data
    /// holds no numbers.
    pub fn classify(
        &self,
        dataset: &Dataset,
        style: ClassificationStyle,
        num_bins: Option<usize>,
    ) -> Result<ClassificationBins, BinError> {
        match style {
            ClassificationStyle::Continuous => {
                let n = num_bins.unwrap_or(self.continuous_bins);
                self.continuous(&dataset.numeric_values(), n)
                    .map(ClassificationBins::Numeric)
            }
            ClassificationStyle::Diverging => {
                let n = num_bins.unwrap_or(self.diverging_breaks);
                self.diverging(&dataset.numeric_values(), n)
                    .map(ClassificationBins::Numeric)
            }
            ClassificationStyle::Categorical => {
                Ok(ClassificationBins::Categories(categories(dataset, &[])))
            }
        }
    }

    /// Rounded quantile breaks, deduplicated so they strictly increase.
    pub fn continuous(&self, values: &[f64], n: usize) -> Result<Vec<f64>, BinError> {
        let breaks = quantile_breaks(values, n);
        if breaks.is_empty() && n > 0 {
            return Err(BinError::NoNumericValues);
        }
        Ok(self.round_strict(breaks))
    }

    /// `[-b_n, ..., -b_1, 0, b_1, ..., b_n]` from quantiles of `|v|`.
    ///
    /// Zero and duplicate breaks collapse, so the sequence always has
    /// exactly one `0` and mirrors around it.
    pub fn diverging(&self, values: &[f64], n: usize) -> Result<Vec<f64>, BinError> {
        let magnitudes: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        let breaks = quantile_breaks(&magnitudes, n);
        if breaks.is_empty() && n > 0 {
            return Err(BinError::NoNumericValues);
        }
        let positive: Vec<f64> = self
            .round_strict(breaks)
            .into_iter()
            .filter(|b| *b > 0.0)
            .collect();

        let mut bins: Vec<f64> = positive.iter().rev().map(|b| -b).collect();
        bins.push(0.0);
        bins.extend(positive);
        Ok(bins)
    }

    fn round_strict(&self, breaks: Vec<f64>) -> Vec<f64> {
        let mut out: Vec<f64> = breaks
            .into_iter()
            .map(|b| round_significant(b, self.significant_figures))
            .collect();
        out.dedup();
        out
    }
}

/// Distinct values: `declared` first (deduplicated), then anything else in
/// the order it first appears in `dataset`.
pub fn categories(dataset: &Dataset, declared: &[Scalar]) -> Vec<Scalar> {
    let mut out: Vec<Scalar> = Vec::new();
    for value in declared.iter().chain(dataset.values()) {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}

/// Classify with the default settings.
pub fn classify(
    dataset: &Dataset,
    style: ClassificationStyle,
    num_bins: Option<usize>,
) -> Result<ClassificationBins, BinError> {
    Classifier::default().classify(dataset, style, num_bins)
}
