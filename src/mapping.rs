//! Spherical-to-Cartesian bin mapping: orchestration, normalisation and packaging.
//!
//! The mapping is built in three phases:
//! - grid sweep over the oversampled first octant ([`crate::sweep`])
//! - gap fill for spherical bins the sweep missed ([`crate::gapfill`])
//! - normalisation of every bin to its analytic octant volume, then packaging
//!   into index-aligned `(indices, volumes)` arrays
//!
//! # Key Features
//!
//! - [`sph2cart`]: one-shot pure library call
//! - [`Binner`]: the same computation with progress reporting and a worker-count override
//! - [`BinMapping`]: the frozen result, ordered `r_bin_idx` outer and `costheta_bin_idx` inner

use std::fmt;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::{
    bins::{SphericalBinIndex, SphericalBinning},
    error::BinningError,
    gapfill::gap_fill,
    grid::{CartesianBinIndex, CartesianGrid},
    sweep::{Accumulator, Sweep},
};


/// Builds the bin mapping for a spherical binning and a Cartesian grid.
pub fn sph2cart(
    binning: &SphericalBinning,
    grid: &CartesianGrid,
) -> Result<BinMapping, BinningError> {
    Binner::new(*binning, *grid).run()
}

/// Configurable driver for the bin mapping computation.
///
/// **Context**: Realistic tables take tens of seconds to sweep, so callers running
/// interactively want feedback, and batch jobs may want to bound the worker count.
///
/// **How it Works**: Validates both inputs up front, optionally installs a dedicated rayon
/// pool, then runs sweep, gap fill, normalisation and packaging in turn. Nothing is
/// returned unless every phase succeeds.
#[derive(Debug, Clone)]
pub struct Binner {
    pub binning: SphericalBinning,
    pub grid: CartesianGrid,
    pub progress: bool,
    pub threads: Option<usize>,
}

impl Binner {
    pub fn new(binning: SphericalBinning, grid: CartesianGrid) -> Self {
        Self {
            binning,
            grid,
            progress: false,
            threads: None,
        }
    }

    /// Show a progress bar over the x-slabs of the sweep.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Run the sweep on a dedicated pool of `threads` workers.
    pub fn threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn validate(&self) -> Result<(), BinningError> {
        self.binning.validate()?;
        self.grid.validate()?;
        if self.grid.checked_cells_per_axis(self.binning.r_max).is_none() {
            return Err(BinningError::invalid(
                "cart_binwidth",
                self.grid.cart_binwidth,
                "grid has more cells per axis than a u32 index can address",
            ));
        }
        if self.threads == Some(0) {
            return Err(BinningError::invalid("threads", 0, "must be at least 1"));
        }
        Ok(())
    }

    pub fn run(&self) -> Result<BinMapping, BinningError> {
        self.validate()?;
        let start = Instant::now();

        let sweep = Sweep::new(&self.binning, &self.grid);
        let cells_per_axis = sweep.cells_per_axis();
        let pb = self.progress_bar(cells_per_axis);

        let mut acc = match self.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| BinningError::ThreadPool(e.to_string()))?
                .install(|| sweep.run(&pb)),
            None => sweep.run(&pb),
        };
        pb.finish_and_clear();

        let raw_totals = acc.totals();
        let gap_filled = gap_fill(&self.binning, &self.grid, cells_per_axis, &mut acc);

        normalize(&self.binning, &mut acc)?;
        let (ind_arrays, vol_arrays) = package(acc);

        let report = SweepReport {
            cells_per_axis,
            probes_per_cell: self.grid.antialias.pow(3),
            raw_totals,
            gap_filled,
            elapsed: start.elapsed(),
        };
        info!(
            "binned {} spherical bins onto {}^3 cells ({} gap-filled) in {:.2?}",
            self.binning.num_bins(),
            cells_per_axis,
            report.gap_filled.len(),
            report.elapsed
        );

        Ok(BinMapping {
            binning: self.binning,
            grid: self.grid,
            ind_arrays,
            vol_arrays,
            report,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
        ) {
            pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
        }
        pb.set_message("x-slab".to_string());
        pb
    }
}

/// Rescales every bin so its cell volumes sum to the bin's analytic octant volume.
fn normalize(binning: &SphericalBinning, acc: &mut Accumulator) -> Result<(), BinningError> {
    for index in binning.indices() {
        let cells = &mut acc.bins[binning.flat_index(index)];
        let total: f64 = cells.values().sum();
        let scale = binning.octant_volume(index) / total;
        if total == 0.0 || !total.is_finite() || !scale.is_finite() {
            return Err(BinningError::NumericDegeneracy {
                r_bin_idx: index.r_bin_idx,
                costheta_bin_idx: index.costheta_bin_idx,
                total,
            });
        }
        for volume in cells.values_mut() {
            *volume *= scale;
        }
    }
    debug!("normalised {} bins", binning.num_bins());
    Ok(())
}

fn package(acc: Accumulator) -> (Vec<Array2<u32>>, Vec<Array1<f64>>) {
    acc.bins
        .into_iter()
        .map(|cells| {
            let mut indices = Array2::<u32>::zeros((cells.len(), 3));
            let mut volumes = Array1::<f64>::zeros(cells.len());
            for (row, (cell, volume)) in cells.into_iter().enumerate() {
                indices[[row, 0]] = cell.x;
                indices[[row, 1]] = cell.y;
                indices[[row, 2]] = cell.z;
                volumes[row] = volume;
            }
            (indices, volumes)
        })
        .unzip()
}

/// Diagnostics collected while building a [`BinMapping`].
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub cells_per_axis: usize,
    pub probes_per_cell: usize,
    /// Per-bin volume found by the sweep, before gap fill and normalisation.
    pub raw_totals: Vec<f64>,
    /// Bins the sweep missed entirely.
    pub gap_filled: Vec<SphericalBinIndex>,
    pub elapsed: Duration,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw: f64 = self.raw_totals.iter().sum();
        writeln!(f, "Sweep:")?;
        writeln!(f, "  Cells per axis:   {}", self.cells_per_axis)?;
        writeln!(f, "  Probes per cell:  {}", self.probes_per_cell)?;
        writeln!(f, "  Spherical bins:   {}", self.raw_totals.len())?;
        writeln!(f, "  Raw volume:       {:.6}", raw)?;
        writeln!(f, "  Gap-filled bins:  {}", self.gap_filled.len())?;
        writeln!(f, "  Elapsed:          {:.2?}", self.elapsed)
    }
}

/// Overlap table between spherical bins and oversampled first-octant Cartesian cells.
///
/// `ind_arrays[i]` is an `N x 3` array of Cartesian cell indices and `vol_arrays[i]` the
/// matching `N` overlap volumes for the `i`-th spherical bin in `(r outer, costheta inner)`
/// order. Within a bin, cells are in ascending `(x, y, z)` order.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMapping {
    pub binning: SphericalBinning,
    pub grid: CartesianGrid,
    pub ind_arrays: Vec<Array2<u32>>,
    pub vol_arrays: Vec<Array1<f64>>,
    pub report: SweepReport,
}

impl BinMapping {
    pub fn len(&self) -> usize {
        self.ind_arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ind_arrays.is_empty()
    }

    pub fn get(
        &self,
        index: SphericalBinIndex,
    ) -> Option<(ArrayView2<'_, u32>, ArrayView1<'_, f64>)> {
        if index.r_bin_idx >= self.binning.n_rbins
            || index.costheta_bin_idx >= self.binning.n_costheta_quadrant()
        {
            return None;
        }
        let flat = self.binning.flat_index(index);
        Some((self.ind_arrays[flat].view(), self.vol_arrays[flat].view()))
    }

    /// Sum of the normalised volumes of one bin.
    pub fn total_volume(&self, index: SphericalBinIndex) -> Option<f64> {
        self.get(index).map(|(_, volumes)| volumes.sum())
    }

    /// Cells and volumes of one bin as `(cell, volume)` pairs.
    pub fn cells(&self, index: SphericalBinIndex) -> Vec<(CartesianBinIndex, f64)> {
        self.get(index)
            .map(|(indices, volumes)| {
                indices
                    .outer_iter()
                    .zip(volumes.iter())
                    .map(|(row, &v)| (CartesianBinIndex::from_array([row[0], row[1], row[2]]), v))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (SphericalBinIndex, ArrayView2<'_, u32>, ArrayView1<'_, f64>)> {
        self.binning
            .indices()
            .zip(self.ind_arrays.iter().zip(self.vol_arrays.iter()))
            .map(|(index, (ind, vol))| (index, ind.view(), vol.view()))
    }
}
