//! Grid sweep: probe every oversampled first-octant cell and tally the volume each
//! spherical bin occupies inside it.
//!
//! The octant is split into slabs of constant `x` cell index. Each slab is swept
//! independently (in parallel with rayon) and yields its own list of
//! `(bin, cell, volume)` contributions. Slabs never share cells, so merging them in
//! slab order produces the same accumulator regardless of scheduling.

use std::collections::BTreeMap;

use indicatif::ProgressBar;
use log::debug;
use rayon::prelude::*;

use crate::{
    bins::{BinLookup, SphericalBinning},
    config::CELL_TALLY_CAPACITY,
    grid::{CartesianBinIndex, CartesianGrid, ProbeOffsets},
};


pub(crate) type CellVolumes = BTreeMap<CartesianBinIndex, f64>;

/// Per-spherical-bin map of Cartesian cell to overlapping volume, indexed by flat bin index.
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    pub bins: Vec<CellVolumes>,
}

impl Accumulator {
    pub(crate) fn new(num_bins: usize) -> Self {
        Self {
            bins: vec![CellVolumes::new(); num_bins],
        }
    }

    fn add(&mut self, flat: usize, cell: CartesianBinIndex, volume: f64) {
        *self.bins[flat].entry(cell).or_insert(0.0) += volume;
    }

    /// Current total volume of each bin, summed in ascending cell order.
    pub(crate) fn totals(&self) -> Vec<f64> {
        self.bins.iter().map(|cells| cells.values().sum()).collect()
    }

    pub(crate) fn num_cells(&self) -> usize {
        self.bins.iter().map(|cells| cells.len()).sum()
    }
}

type SlabEntry = (usize, CartesianBinIndex, f64);

pub(crate) struct Sweep {
    lookup: BinLookup,
    n_costheta_quadrant: usize,
    num_bins: usize,
    r_max: f64,
    cells_per_axis: usize,
    bw_os: f64,
    aa_vol: f64,
    offsets: ProbeOffsets,
}

impl Sweep {
    pub(crate) fn new(binning: &SphericalBinning, grid: &CartesianGrid) -> Self {
        Self {
            lookup: BinLookup::new(binning),
            n_costheta_quadrant: binning.n_costheta_quadrant(),
            num_bins: binning.num_bins(),
            r_max: binning.r_max,
            cells_per_axis: grid.cells_per_axis(binning.r_max),
            bw_os: grid.oversampled_binwidth(),
            aa_vol: grid.antialias_volume(),
            offsets: grid.probe_offsets(),
        }
    }

    pub(crate) fn cells_per_axis(&self) -> usize {
        self.cells_per_axis
    }

    /// Sweeps all slabs on the current rayon pool and merges them in slab order.
    pub(crate) fn run(&self, pb: &ProgressBar) -> Accumulator {
        let n = self.cells_per_axis;
        let probes = self.offsets.as_slice().len().pow(3);
        debug!(
            "sweeping {}^3 oversampled cells with {} probes per cell",
            n, probes
        );

        let slabs: Vec<Vec<SlabEntry>> = (0..n)
            .into_par_iter()
            .map(|ix| {
                let entries = self.slab(ix);
                pb.inc(1);
                entries
            })
            .collect();

        let mut acc = Accumulator::new(self.num_bins);
        for (flat, cell, volume) in slabs.into_iter().flatten() {
            acc.add(flat, cell, volume);
        }

        debug!("sweep touched {} (cell, bin) pairs", acc.num_cells());
        acc
    }

    fn slab(&self, ix: usize) -> Vec<SlabEntry> {
        let n = self.cells_per_axis;
        let offsets = self.offsets.as_slice();
        let r_max_sq = self.r_max * self.r_max;

        let mut entries = Vec::new();
        let mut tally: Vec<(usize, u32)> = Vec::with_capacity(CELL_TALLY_CAPACITY);

        let x0 = ix as f64 * self.bw_os;
        for iy in 0..n {
            let y0 = iy as f64 * self.bw_os;
            for iz in 0..n {
                let z0 = iz as f64 * self.bw_os;
                // nearest corner already outside the sphere
                if x0 * x0 + y0 * y0 + z0 * z0 >= r_max_sq {
                    continue;
                }

                tally.clear();
                for &ox in offsets {
                    let x = x0 + ox;
                    let x2 = x * x;
                    for &oy in offsets {
                        let y = y0 + oy;
                        let xy2 = x2 + y * y;
                        for &oz in offsets {
                            let z = z0 + oz;
                            let r = (xy2 + z * z).sqrt();
                            let Some(r_idx) = self.lookup.r_bin_index(r) else {
                                continue;
                            };
                            let Some(ct_idx) = self.lookup.costheta_bin_index(z, r) else {
                                continue;
                            };
                            let flat = r_idx * self.n_costheta_quadrant + ct_idx;
                            match tally.iter_mut().find(|(bin, _)| *bin == flat) {
                                Some((_, count)) => *count += 1,
                                None => tally.push((flat, 1)),
                            }
                        }
                    }
                }

                let cell = CartesianBinIndex::new(ix as u32, iy as u32, iz as u32);
                entries.extend(
                    tally
                        .iter()
                        .map(|&(flat, count)| (flat, cell, count as f64 * self.aa_vol)),
                );
            }
        }
        entries
    }
}
