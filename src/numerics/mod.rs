pub mod interpolation;
pub mod least_squares;
pub mod noc;
pub mod pipeline;
pub mod timing;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Distance/volume based weighting used for cell-to-node and cell-to-face
/// interpolation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightingScheme {
    /// 1 / ||r||
    #[default]
    InverseDistance,
    /// 1 / ||r||^2
    InverseDistanceSquared,
    /// 1 / V
    InverseVolume,
}

impl WeightingScheme {
    pub const ALL: [WeightingScheme; 3] = [
        WeightingScheme::InverseDistance,
        WeightingScheme::InverseDistanceSquared,
        WeightingScheme::InverseVolume,
    ];

    /// Raw (un-normalized) weight for a distance `r` and a cell volume.
    #[inline]
    pub fn raw_weight(self, r: f64, volume: f64) -> f64 {
        match self {
            WeightingScheme::InverseDistance => 1.0 / r,
            WeightingScheme::InverseDistanceSquared => 1.0 / (r * r),
            WeightingScheme::InverseVolume => 1.0 / volume,
        }
    }
}

/// One value per [`WeightingScheme`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Weighting<T> {
    pub distance: T,
    pub distance_sq: T,
    pub volume: T,
}

impl<T> Weighting<T> {
    pub fn get(&self, scheme: WeightingScheme) -> &T {
        match scheme {
            WeightingScheme::InverseDistance => &self.distance,
            WeightingScheme::InverseDistanceSquared => &self.distance_sq,
            WeightingScheme::InverseVolume => &self.volume,
        }
    }

    pub fn get_mut(&mut self, scheme: WeightingScheme) -> &mut T {
        match scheme {
            WeightingScheme::InverseDistance => &mut self.distance,
            WeightingScheme::InverseDistanceSquared => &mut self.distance_sq,
            WeightingScheme::InverseVolume => &mut self.volume,
        }
    }

    pub fn splat(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            distance: value.clone(),
            distance_sq: value.clone(),
            volume: value,
        }
    }
}

/// Runs `f` on every item, in parallel when `parallel` is set.
///
/// Each item is only ever touched by one invocation of `f`.
pub(crate) fn for_each_mut<T, F>(items: &mut [T], parallel: bool, f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    if parallel {
        items.par_iter_mut().enumerate().for_each(|(i, item)| f(i, item));
    } else {
        items.iter_mut().enumerate().for_each(|(i, item)| f(i, item));
    }
}

/// Fallible variant of [`for_each_mut`]. Stops at the first error in
/// sequential mode; in parallel mode one of the errors is returned.
pub(crate) fn try_for_each_mut<T, E, F>(items: &mut [T], parallel: bool, f: F) -> Result<(), E>
where
    T: Send,
    E: Send,
    F: Fn(usize, &mut T) -> Result<(), E> + Sync + Send,
{
    if parallel {
        items
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, item)| f(i, item))
    } else {
        items
            .iter_mut()
            .enumerate()
            .try_for_each(|(i, item)| f(i, item))
    }
}

/// Maps every item to a result, in parallel when `parallel` is set, and
/// collects them in order. Nothing is returned unless every item succeeds.
pub(crate) fn try_map<T, R, E, F>(items: &[T], parallel: bool, f: F) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(usize, &T) -> Result<R, E> + Sync + Send,
{
    if parallel {
        items.par_iter().enumerate().map(|(i, item)| f(i, item)).collect()
    } else {
        items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
    }
}
