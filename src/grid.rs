use std::fmt;

use nalgebra::Point3;
use serde::Deserialize;

use crate::config::{MAX_ANTIALIAS, PROBE_CENTRE_OFFSET};
use crate::error::BinningError;

#[cfg(test)]
mod tests {

    use super::*;

    fn grid() -> CartesianGrid {
        CartesianGrid {
            cart_binwidth: 2.0,
            oversample: 2,
            antialias: 4,
        }
    }

    #[test]
    fn widths() {
        let grid = grid();
        assert_eq!(grid.oversampled_binwidth(), 1.0);
        assert_eq!(grid.antialias_binwidth(), 0.25);
        assert_eq!(grid.antialias_volume(), 0.25 * 0.25 * 0.25);
        assert_eq!(grid.cells_per_axis(9.0), 10);
        assert_eq!(grid.cells_per_axis(10.0), 10);
    }

    #[test]
    fn oversized_grid_does_not_overflow() {
        let grid = CartesianGrid {
            cart_binwidth: 1.0,
            oversample: usize::MAX,
            antialias: 1,
        };
        assert_eq!(grid.checked_cells_per_axis(1e10), None);
        assert_eq!(grid.cells_per_axis(1e10), usize::MAX);

        let grid = CartesianGrid {
            cart_binwidth: 1.0,
            oversample: 1 << 31,
            antialias: 1,
        };
        assert_eq!(grid.checked_cells_per_axis(2.0_f64.powi(33)), None);
        assert_eq!(grid.checked_cells_per_axis(1.0), Some(1 << 31));
    }

    #[test]
    fn index_array_conversion() {
        let cell = CartesianBinIndex::new(4, 0, 7);
        assert_eq!(cell.to_array(), [4, 0, 7]);
        assert_eq!(CartesianBinIndex::from_array([4, 0, 7]), cell);
    }

    #[test]
    fn probe_offsets_are_centred() {
        let grid = grid();
        let offsets = grid.probe_offsets();
        assert_eq!(offsets.as_slice(), &[0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn cell_lookup_clamps() {
        let grid = grid();
        let cell = grid.cell_of(&Point3::new(0.4, 3.9, 42.0), 10);
        assert_eq!(cell, CartesianBinIndex::new(0, 3, 9));
        let cell = grid.cell_of(&Point3::new(-0.1, 0.0, 1.0), 10);
        assert_eq!(cell, CartesianBinIndex::new(0, 0, 1));
    }

    #[test]
    fn cell_lookup_picks_nearest_centre() {
        // bw_os = 1, so cell 0 has its centre at 0.5 and cell 1 at 1.5
        let grid = grid();
        let cell = grid.cell_of(&Point3::new(0.6, 0.99, 1.01), 10);
        assert_eq!(cell, CartesianBinIndex::new(0, 0, 1));
    }

    #[test]
    fn antialias_limits() {
        let mut grid = grid();
        grid.antialias = 0;
        assert!(grid.validate().is_err());
        grid.antialias = MAX_ANTIALIAS + 1;
        assert!(grid.validate().is_err());
        grid.antialias = MAX_ANTIALIAS;
        assert!(grid.validate().is_ok());
    }
}

/// Index of an oversampled Cartesian cell in the first octant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CartesianBinIndex {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl CartesianBinIndex {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array([x, y, z]: [u32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for CartesianBinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Cartesian grid the spherical bins are resampled onto.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct CartesianGrid {
    pub cart_binwidth: f64,
    pub oversample: usize,
    pub antialias: usize,
}

impl CartesianGrid {
    pub fn validate(&self) -> Result<(), BinningError> {
        if !(self.cart_binwidth.is_finite() && self.cart_binwidth > 0.0) {
            return Err(BinningError::invalid(
                "cart_binwidth",
                self.cart_binwidth,
                "must be finite and positive",
            ));
        }
        if self.oversample < 1 {
            return Err(BinningError::invalid(
                "oversample",
                self.oversample,
                "must be at least 1",
            ));
        }
        if !(1..=MAX_ANTIALIAS).contains(&self.antialias) {
            return Err(BinningError::invalid(
                "antialias",
                self.antialias,
                "must lie in 1..=50",
            ));
        }
        Ok(())
    }

    /// Width of an oversampled cell.
    pub fn oversampled_binwidth(&self) -> f64 {
        self.cart_binwidth / self.oversample as f64
    }

    /// Width of an antialiasing sub-cell.
    pub fn antialias_binwidth(&self) -> f64 {
        self.oversampled_binwidth() / self.antialias as f64
    }

    /// Volume represented by a single probe.
    pub fn antialias_volume(&self) -> f64 {
        self.antialias_binwidth().powi(3)
    }

    /// Number of oversampled cells along each axis of the octant covering `r_max`.
    /// Saturates at `usize::MAX`; use [`Self::checked_cells_per_axis`] to detect overflow.
    pub fn cells_per_axis(&self, r_max: f64) -> usize {
        self.checked_cells_per_axis(r_max).unwrap_or(usize::MAX)
    }

    /// Cells per axis, or `None` if the count does not fit a `u32` cell index.
    pub fn checked_cells_per_axis(&self, r_max: f64) -> Option<usize> {
        let nominal = (r_max / self.cart_binwidth).ceil();
        if !nominal.is_finite() || nominal < 0.0 || nominal > u32::MAX as f64 {
            return None;
        }
        (nominal as usize)
            .checked_mul(self.oversample)
            .filter(|&cells| cells <= u32::MAX as usize)
    }

    pub fn probe_offsets(&self) -> ProbeOffsets {
        ProbeOffsets::new(self.antialias, self.antialias_binwidth())
    }

    /// Oversampled cell whose centre is nearest to `point`, clamped into the octant.
    pub fn cell_of(&self, point: &Point3<f64>, cells_per_axis: usize) -> CartesianBinIndex {
        let bw_os = self.oversampled_binwidth();
        let max = cells_per_axis.saturating_sub(1) as f64;
        let axis = |c: f64| (c / bw_os).floor().clamp(0.0, max) as u32;
        CartesianBinIndex::new(axis(point.x), axis(point.y), axis(point.z))
    }
}

/// Probe-centre offsets within an oversampled cell, one per antialiasing sub-cell.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOffsets {
    offsets: [f64; MAX_ANTIALIAS],
    len: usize,
}

impl ProbeOffsets {
    fn new(antialias: usize, bw_os_aa: f64) -> Self {
        let len = antialias.min(MAX_ANTIALIAS);
        let mut offsets = [0.0; MAX_ANTIALIAS];
        for (k, offset) in offsets.iter_mut().take(len).enumerate() {
            *offset = (k as f64 + PROBE_CENTRE_OFFSET) * bw_os_aa;
        }
        Self { offsets, len }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.offsets[..self.len]
    }
}
