//! Power-law spherical binning of the first-octant, upper-hemisphere quadrant.
//!
//! Radial bins are uniform in `r^(1/r_power)` and costheta bins are uniform in
//! `1 - cos(theta)`. No bin edges are stored: lookups invert the binning analytically,
//! and edges are regenerated from the same formula when they are needed.
//!
//! Costheta edges follow the descending convention `edge[j] = 1 - j * w`, so for bin `j`
//! `costheta_bmin = edge[j]` is the larger value and `costheta_bmax = edge[j + 1]` the smaller.

use std::f64::consts::PI;
use std::fmt;

use itertools::iproduct;
use ndarray::Array1;
use serde::Deserialize;

use crate::error::BinningError;


/// Index of a spherical bin within the modelled octant/quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SphericalBinIndex {
    pub r_bin_idx: usize,
    pub costheta_bin_idx: usize,
}

impl SphericalBinIndex {
    pub fn new(r_bin_idx: usize, costheta_bin_idx: usize) -> Self {
        Self {
            r_bin_idx,
            costheta_bin_idx,
        }
    }
}

impl fmt::Display for SphericalBinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.r_bin_idx, self.costheta_bin_idx)
    }
}

/// Spherical binning of the photon table.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct SphericalBinning {
    pub r_max: f64,
    pub r_power: f64,
    pub n_rbins: usize,
    pub n_costhetabins: usize,
    pub n_phibins: usize,
}

impl SphericalBinning {
    pub fn validate(&self) -> Result<(), BinningError> {
        if !(self.r_max.is_finite() && self.r_max > 0.0) {
            return Err(BinningError::invalid(
                "r_max",
                self.r_max,
                "must be finite and positive",
            ));
        }
        if !(self.r_power.is_finite() && self.r_power > 0.0) {
            return Err(BinningError::invalid(
                "r_power",
                self.r_power,
                "must be finite and positive",
            ));
        }
        if self.n_rbins < 1 {
            return Err(BinningError::invalid(
                "n_rbins",
                self.n_rbins,
                "must be at least 1",
            ));
        }
        if self.n_costhetabins < 1 || self.n_costhetabins % 2 != 0 {
            return Err(BinningError::invalid(
                "n_costhetabins",
                self.n_costhetabins,
                "must be positive and even",
            ));
        }
        if self.n_phibins < 1 || self.n_phibins % 4 != 0 {
            return Err(BinningError::invalid(
                "n_phibins",
                self.n_phibins,
                "must be a positive multiple of 4",
            ));
        }
        Ok(())
    }

    /// Number of costheta bins with costheta >= 0.
    pub fn n_costheta_quadrant(&self) -> usize {
        self.n_costhetabins.div_ceil(2)
    }

    /// Number of spherical bins in the modelled quadrant.
    pub fn num_bins(&self) -> usize {
        self.n_rbins * self.n_costheta_quadrant()
    }

    /// Position of `index` in the `(r outer, costheta inner)` ordering.
    pub fn flat_index(&self, index: SphericalBinIndex) -> usize {
        index.r_bin_idx * self.n_costheta_quadrant() + index.costheta_bin_idx
    }

    /// All bin indices, `r_bin_idx` outer and `costheta_bin_idx` inner.
    pub fn indices(&self) -> impl Iterator<Item = SphericalBinIndex> {
        iproduct!(0..self.n_rbins, 0..self.n_costheta_quadrant())
            .map(|(r, ct)| SphericalBinIndex::new(r, ct))
    }

    pub fn r_bin_index(&self, r: f64) -> Option<usize> {
        BinLookup::new(self).r_bin_index(r)
    }

    pub fn costheta_bin_index(&self, z: f64, r: f64) -> Option<usize> {
        BinLookup::new(self).costheta_bin_index(z, r)
    }

    /// `(r_bmin, r_bmax)` of radial bin `i`.
    pub fn r_bounds(&self, i: usize) -> (f64, f64) {
        (self.r_edge(i), self.r_edge(i + 1))
    }

    fn r_edge(&self, i: usize) -> f64 {
        let width = self.r_max.powf(1.0 / self.r_power) / self.n_rbins as f64;
        (i as f64 * width).powf(self.r_power)
    }

    /// `(costheta_bmin, costheta_bmax)` of costheta bin `j`, with `bmin > bmax`.
    pub fn costheta_bounds(&self, j: usize) -> (f64, f64) {
        let width = 2.0 / self.n_costhetabins as f64;
        (1.0 - j as f64 * width, 1.0 - (j + 1) as f64 * width)
    }

    pub fn r_bin_edges(&self) -> Array1<f64> {
        (0..=self.n_rbins).map(|i| self.r_edge(i)).collect()
    }

    pub fn costheta_bin_edges(&self) -> Array1<f64> {
        Array1::linspace(1.0, -1.0, self.n_costhetabins + 1)
    }

    /// Geometric centre `(r_bcenter, costheta_bcenter)` of a bin.
    pub fn bin_centre(&self, index: SphericalBinIndex) -> (f64, f64) {
        let (r_bmin, r_bmax) = self.r_bounds(index.r_bin_idx);
        let (ct_bmin, ct_bmax) = self.costheta_bounds(index.costheta_bin_idx);
        (0.5 * (r_bmin + r_bmax), 0.5 * (ct_bmin + ct_bmax))
    }

    /// Exact volume of a bin restricted to the first octant.
    pub fn octant_volume(&self, index: SphericalBinIndex) -> f64 {
        self.wedge_volume(index, PI / 2.0)
    }

    /// Volume assigned to each gap-fill probe of an empty bin.
    pub fn phi_slice_volume(&self, index: SphericalBinIndex) -> f64 {
        self.wedge_volume(index, 2.0 * PI / self.n_phibins as f64)
    }

    fn wedge_volume(&self, index: SphericalBinIndex, dphi: f64) -> f64 {
        let (r_bmin, r_bmax) = self.r_bounds(index.r_bin_idx);
        let (ct_bmin, ct_bmax) = self.costheta_bounds(index.costheta_bin_idx);
        -(ct_bmax - ct_bmin) * (r_bmax.powi(3) - r_bmin.powi(3)) / 3.0 * dphi
    }
}

/// Precomputed constants for the hot-loop bin lookups.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BinLookup {
    r_max: f64,
    inv_power: f64,
    r_width: f64,
    n_rbins: usize,
    costheta_width: f64,
    n_costheta_quadrant: usize,
}

impl BinLookup {
    pub(crate) fn new(binning: &SphericalBinning) -> Self {
        let inv_power = 1.0 / binning.r_power;
        Self {
            r_max: binning.r_max,
            inv_power,
            r_width: binning.r_max.powf(inv_power) / binning.n_rbins as f64,
            n_rbins: binning.n_rbins,
            costheta_width: 2.0 / binning.n_costhetabins as f64,
            n_costheta_quadrant: binning.n_costheta_quadrant(),
        }
    }

    #[inline]
    pub(crate) fn r_bin_index(&self, r: f64) -> Option<usize> {
        if !(0.0..self.r_max).contains(&r) {
            return None;
        }
        let idx = (r.powf(self.inv_power) / self.r_width).floor() as usize;
        // rounding can push r just below r_max into bin n_rbins
        (idx < self.n_rbins).then_some(idx)
    }

    #[inline]
    pub(crate) fn costheta_bin_index(&self, z: f64, r: f64) -> Option<usize> {
        let costheta = if r > 0.0 { z / r } else { 1.0 };
        let idx = ((1.0 - costheta) / self.costheta_width).floor();
        if idx < 0.0 || idx >= self.n_costheta_quadrant as f64 {
            return None;
        }
        Some(idx as usize)
    }
}
