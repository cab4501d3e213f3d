//! Comparison metrics understood by the external diff tool.

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Image comparison metric, passed verbatim as `-metric <NAME>`.
///
/// The harness never computes these; the label only travels to the
/// comparator and back into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComparisonMetric {
    /// Absolute error count
    Ae,
    /// Structural dissimilarity index
    Dssim,
    /// Mean color distance
    Fuzz,
    /// Mean absolute error
    Mae,
    /// Mean error per pixel
    Mepp,
    /// Mean error squared
    Mse,
    /// Normalized cross correlation
    Ncc,
    /// Peak absolute error
    Pae,
    /// Perceptual hash
    Phash,
    /// Peak signal to noise ratio
    Psnr,
    /// Root mean squared error
    Rmse,
    /// Structural similarity index
    #[default]
    Ssim,
}

impl ComparisonMetric {
    pub fn all() -> [ComparisonMetric; 12] {
        use ComparisonMetric::*;
        [Ae, Dssim, Fuzz, Mae, Mepp, Mse, Ncc, Pae, Phash, Psnr, Rmse, Ssim]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonMetric::Ae => "AE",
            ComparisonMetric::Dssim => "DSSIM",
            ComparisonMetric::Fuzz => "FUZZ",
            ComparisonMetric::Mae => "MAE",
            ComparisonMetric::Mepp => "MEPP",
            ComparisonMetric::Mse => "MSE",
            ComparisonMetric::Ncc => "NCC",
            ComparisonMetric::Pae => "PAE",
            ComparisonMetric::Phash => "PHASH",
            ComparisonMetric::Psnr => "PSNR",
            ComparisonMetric::Rmse => "RMSE",
            ComparisonMetric::Ssim => "SSIM",
        }
    }

    /// Whether a larger score means the images are closer.
    ///
    /// Informational only: reports are always sorted by descending score.
    pub fn higher_is_similar(self) -> bool {
        matches!(
            self,
            ComparisonMetric::Ssim | ComparisonMetric::Ncc | ComparisonMetric::Psnr
        )
    }
}

impl fmt::Display for ComparisonMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonMetric {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ComparisonMetric::all()
            .into_iter()
            .find(|metric| metric.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| HarnessError::UnknownMetric(s.to_string()))
    }
}
