use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FvmError, Result};
use crate::numerics::WeightingScheme;
use crate::numerics::noc::DecompositionPolicy;

/// Guards against degenerate geometry. Hitting one aborts the phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericalTolerances {
    /// Smallest admissible centroid-to-centroid / centroid-to-node distance.
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,
    /// Smallest admissible `|d.S| / (|d| |S|)`.
    #[serde(default = "default_min_alignment")]
    pub min_alignment: f64,
    /// Smallest admissible `|R_kk|` relative to the largest one in the QR factor.
    #[serde(default = "default_rank_tolerance")]
    pub rank_tolerance: f64,
}

fn default_min_distance() -> f64 {
    1e-12
}

fn default_min_alignment() -> f64 {
    1e-8
}

fn default_rank_tolerance() -> f64 {
    1e-10
}

fn default_parallel_threshold() -> usize {
    2048
}

fn default_skewness_bins() -> usize {
    9
}

impl Default for NumericalTolerances {
    fn default() -> Self {
        Self {
            min_distance: default_min_distance(),
            min_alignment: default_min_alignment(),
            rank_tolerance: default_rank_tolerance(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscretizationConfig {
    #[serde(default)]
    pub decomposition: DecompositionPolicy,
    /// Cell-to-node interpolation.
    #[serde(default)]
    pub nodal_scheme: WeightingScheme,
    /// Cell-to-face interpolation.
    #[serde(default)]
    pub face_scheme: WeightingScheme,
    #[serde(default)]
    pub tolerances: NumericalTolerances,
    #[serde(default)]
    pub parallel: bool,
    /// Entity count from which a phase actually goes parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    /// Number of equal-width bins over 0..90 degrees in the skewness report.
    #[serde(default = "default_skewness_bins")]
    pub skewness_bins: usize,
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            decomposition: DecompositionPolicy::default(),
            nodal_scheme: WeightingScheme::default(),
            face_scheme: WeightingScheme::default(),
            tolerances: NumericalTolerances::default(),
            parallel: false,
            parallel_threshold: default_parallel_threshold(),
            skewness_bins: default_skewness_bins(),
        }
    }
}

impl DiscretizationConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: DiscretizationConfig = serde_json::from_str(&content)
            .map_err(|e| FvmError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| FvmError::Config(format!("serialization failed: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.tolerances;
        for (name, value) in [
            ("min_distance", t.min_distance),
            ("min_alignment", t.min_alignment),
            ("rank_tolerance", t.rank_tolerance),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(FvmError::Config(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if t.min_alignment >= 1.0 {
            return Err(FvmError::Config("min_alignment must be below 1".into()));
        }
        if self.skewness_bins == 0 {
            return Err(FvmError::Config("skewness_bins must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether a phase over `len` entities should run on the rayon pool.
    #[inline]
    pub fn runs_parallel(&self, len: usize) -> bool {
        self.parallel && len >= self.parallel_threshold
    }

    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn parallel() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 0,
            ..Self::default()
        }
    }
}
