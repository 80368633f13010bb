use std::f64::consts::FRAC_PI_2;

use log::{debug, warn};
use nalgebra::Point3;

use crate::{
    bins::{SphericalBinIndex, SphericalBinning},
    grid::CartesianGrid,
    sweep::Accumulator,
};


/// Gives every spherical bin the sweep missed a synthetic volume.
///
/// **Context**: Bins much thinner than an antialiasing sub-cell can slip between probe
/// centres, leaving them with no Cartesian cells at all. Normalisation needs at least one
/// cell per bin to rescale.
///
/// **How it Works**: Places `n_phibins` azimuthal probes on the ring through the centre of
/// each empty bin and sets the cell each probe lands in to the bin's per-slice analytic
/// volume. Probes landing in the same cell overwrite each other rather than accumulate.
/// Returns the indices of the bins that were filled.
pub(crate) fn gap_fill(
    binning: &SphericalBinning,
    grid: &CartesianGrid,
    cells_per_axis: usize,
    acc: &mut Accumulator,
) -> Vec<SphericalBinIndex> {
    let dphi = FRAC_PI_2 / binning.n_phibins as f64;
    let mut filled = Vec::new();

    for index in binning.indices() {
        let cells = &mut acc.bins[binning.flat_index(index)];
        if !cells.is_empty() {
            continue;
        }

        let (r_bcenter, costheta_bcenter) = binning.bin_centre(index);
        let z_center = r_bcenter * costheta_bcenter;
        let rho_center = r_bcenter * (1.0 - costheta_bcenter * costheta_bcenter).max(0.0).sqrt();
        let volume = binning.phi_slice_volume(index);

        for k in 0..binning.n_phibins {
            let phi = (k as f64 + 0.5) * dphi;
            let probe = Point3::new(rho_center * phi.cos(), rho_center * phi.sin(), z_center);
            cells.insert(grid.cell_of(&probe, cells_per_axis), volume);
        }

        debug!(
            "gap-filled bin {} with {} cell(s) at r = {:.6}, costheta = {:.6}",
            index,
            cells.len(),
            r_bcenter,
            costheta_bcenter
        );
        filled.push(index);
    }

    if !filled.is_empty() {
        warn!(
            "{} of {} spherical bins were not covered by the grid sweep and were gap-filled",
            filled.len(),
            binning.num_bins()
        );
    }
    filled
}
