//! Non-orthogonal decomposition of face area vectors.
//!
//! A face area vector `S` is split into `E`, collinear with the displacement
//! `d` between the two cell centroids, and the remainder `T = S - E`. `E`
//! carries the part of the diffusive flux that only needs the two cell values;
//! `T` requires a gradient-based correction.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// How the orthogonal part `E` is scaled along `d`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecompositionPolicy {
    /// `E = (d.S / d.d) d`, the projection of `S` on `d`.
    MinimumCorrection,
    /// `E = (|S| / |d|) d`.
    Orthogonal,
    /// `E = (S.S / d.S) d`. Better behaved on skewed meshes.
    #[default]
    OverRelaxed,
}

impl DecompositionPolicy {
    /// Orthogonal part of `s` along `d`.
    ///
    /// `d` must be non-zero and, for [`DecompositionPolicy::OverRelaxed`],
    /// not perpendicular to `s`; the caller guards against both.
    #[inline]
    pub fn orthogonal_part(self, d: &Vector3<f64>, s: &Vector3<f64>) -> Vector3<f64> {
        match self {
            DecompositionPolicy::MinimumCorrection => d * (d.dot(s) / d.dot(d)),
            DecompositionPolicy::Orthogonal => d * (s.norm() / d.norm()),
            DecompositionPolicy::OverRelaxed => d * (s.dot(s) / d.dot(s)),
        }
    }
}

/// Splits `s` into `(E, T)` with `T = s - E` and `E` parallel to `d`.
#[inline]
pub fn decompose(
    policy: DecompositionPolicy,
    d: &Vector3<f64>,
    s: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let e = policy.orthogonal_part(d, s);
    let t = s - e;
    (e, t)
}
