use std::f64::consts::PI;

use sph2cart::{
    settings, sph2cart, BinMapping, Binner, BinningError, CartesianBinIndex, CartesianGrid,
    SphericalBinIndex, SphericalBinning,
};

// Relative tolerance for comparing bin volumes against their analytic values
const TOL: f64 = 1e-9;

fn binning(
    r_max: f64,
    r_power: f64,
    n_rbins: usize,
    n_costhetabins: usize,
    n_phibins: usize,
) -> SphericalBinning {
    SphericalBinning {
        r_max,
        r_power,
        n_rbins,
        n_costhetabins,
        n_phibins,
    }
}

fn grid(cart_binwidth: f64, oversample: usize, antialias: usize) -> CartesianGrid {
    CartesianGrid {
        cart_binwidth,
        oversample,
        antialias,
    }
}

/// Analytic octant volume from the power-law edge inversion.
fn expected_volume(binning: &SphericalBinning, index: SphericalBinIndex) -> f64 {
    let width = binning.r_max.powf(1.0 / binning.r_power) / binning.n_rbins as f64;
    let r_bmin = (index.r_bin_idx as f64 * width).powf(binning.r_power);
    let r_bmax = ((index.r_bin_idx + 1) as f64 * width).powf(binning.r_power);
    let ct_width = 2.0 / binning.n_costhetabins as f64;
    ct_width * (r_bmax.powi(3) - r_bmin.powi(3)) / 3.0 * PI / 2.0
}

fn assert_conserved(binning: &SphericalBinning, mapping: &BinMapping) {
    for (index, _, volumes) in mapping.iter() {
        let expected = expected_volume(binning, index);
        let total = volumes.sum();
        assert!(
            ((total - expected) / expected).abs() < TOL,
            "bin {}: total {} expected {}",
            index,
            total,
            expected
        );
    }
}

#[test]
fn two_bin_scenario() {
    let binning = binning(10.0, 2.0, 2, 2, 4);
    let mapping = sph2cart(&binning, &grid(5.0, 1, 10)).unwrap();

    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping.vol_arrays.len(), 2);
    assert!(mapping.report.gap_filled.is_empty());

    // inner edge is (sqrt(10) / 2)^2 = 2.5
    let inner = 2.5_f64.powi(3) / 3.0 * PI / 2.0;
    let outer = (1000.0 - 2.5_f64.powi(3)) / 3.0 * PI / 2.0;
    let v0 = mapping.total_volume(SphericalBinIndex::new(0, 0)).unwrap();
    let v1 = mapping.total_volume(SphericalBinIndex::new(1, 0)).unwrap();
    assert!(((v0 - inner) / inner).abs() < TOL, "v0: {}", v0);
    assert!(((v1 - outer) / outer).abs() < TOL, "v1: {}", v1);
    assert_conserved(&binning, &mapping);
}

#[test]
fn volumes_positive_and_indices_in_octant() {
    let binning = binning(20.0, 2.0, 6, 6, 8);
    let grid = grid(3.0, 2, 3);
    let mapping = sph2cart(&binning, &grid).unwrap();
    let cells_per_axis = grid.cells_per_axis(binning.r_max) as u32;
    assert_eq!(cells_per_axis, 14);

    assert_eq!(mapping.len(), binning.n_rbins * 3);
    for (index, indices, volumes) in mapping.iter() {
        assert_eq!(indices.nrows(), volumes.len(), "bin {}", index);
        assert_eq!(indices.ncols(), 3);
        assert!(!volumes.is_empty(), "bin {}", index);
        assert!(volumes.iter().all(|&v| v > 0.0), "bin {}", index);
        assert!(indices.iter().all(|&i| i < cells_per_axis), "bin {}", index);
    }
    assert_conserved(&binning, &mapping);
}

#[test]
fn coarse_probes_need_gap_fill() {
    let binning = binning(10.0, 2.0, 4, 4, 8);
    let mapping = sph2cart(&binning, &grid(2.0, 2, 1)).unwrap();

    assert_eq!(
        mapping.report.gap_filled,
        vec![SphericalBinIndex::new(0, 0), SphericalBinIndex::new(0, 1)]
    );
    assert_eq!(mapping.report.raw_totals[0], 0.0);
    assert_eq!(mapping.report.raw_totals[1], 0.0);

    // every azimuthal probe of the innermost bin lands in the origin cell
    let cells = mapping.cells(SphericalBinIndex::new(0, 0));
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].0, CartesianBinIndex::new(0, 0, 0));
    assert_conserved(&binning, &mapping);
}

#[test]
fn fine_probes_cover_every_bin() {
    let mapping = sph2cart(&binning(10.0, 1.0, 5, 4, 4), &grid(1.0, 1, 5)).unwrap();
    assert!(mapping.report.gap_filled.is_empty());

    let mapping = sph2cart(&binning(10.0, 2.0, 4, 4, 8), &grid(2.0, 2, 5)).unwrap();
    assert!(mapping.report.gap_filled.is_empty());
}

#[test]
fn linear_edges_are_exact() {
    let binning = binning(12.0, 1.0, 4, 2, 4);
    let edges = binning.r_bin_edges();
    for (i, edge) in edges.iter().enumerate() {
        assert!((edge - i as f64 * 3.0).abs() < 1e-12, "edge {}: {}", i, edge);
    }
}

#[test]
fn deterministic_across_runs_and_threads() {
    let binning = binning(15.0, 2.0, 5, 4, 8);
    let grid = grid(2.5, 2, 3);

    let a = Binner::new(binning, grid).threads(Some(1)).run().unwrap();
    let b = Binner::new(binning, grid).threads(Some(4)).run().unwrap();
    let c = sph2cart(&binning, &grid).unwrap();

    for other in [&b, &c] {
        assert_eq!(a.ind_arrays, other.ind_arrays);
        for (va, vb) in a.vol_arrays.iter().zip(other.vol_arrays.iter()) {
            let bits_a: Vec<u64> = va.iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u64> = vb.iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }
}

#[test]
fn raw_totals_converge_with_antialias() {
    // a single bin covering the whole octant of a sphere inside one cell
    let binning = binning(10.0, 1.0, 1, 2, 4);
    let raw: Vec<f64> = [2, 4, 8, 16]
        .iter()
        .map(|&aa| sph2cart(&binning, &grid(10.0, 1, aa)).unwrap().report.raw_totals[0])
        .collect();

    let changes: Vec<f64> = raw.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    for w in changes.windows(2) {
        assert!(w[1] < w[0], "raw totals {:?}", raw);
    }
}

#[test]
fn invalid_parameters_are_rejected() {
    let good = binning(10.0, 2.0, 2, 2, 4);
    let grid = grid(5.0, 1, 2);

    let cases = [
        (SphericalBinning { n_rbins: 0, ..good }, "n_rbins"),
        (SphericalBinning { n_costhetabins: 0, ..good }, "n_costhetabins"),
        (SphericalBinning { n_costhetabins: 3, ..good }, "n_costhetabins"),
        (SphericalBinning { n_phibins: 0, ..good }, "n_phibins"),
        (SphericalBinning { n_phibins: 6, ..good }, "n_phibins"),
        (SphericalBinning { r_power: 0.0, ..good }, "r_power"),
        (SphericalBinning { r_max: -1.0, ..good }, "r_max"),
    ];
    for (binning, field) in cases {
        match sph2cart(&binning, &grid) {
            Err(BinningError::InvalidParameter { name, .. }) => assert_eq!(name, field),
            other => panic!("expected invalid {}, got {:?}", field, other),
        }
    }

    let grids = [
        (CartesianGrid { oversample: 0, ..grid }, "oversample"),
        (CartesianGrid { antialias: 0, ..grid }, "antialias"),
        (CartesianGrid { antialias: 51, ..grid }, "antialias"),
        (CartesianGrid { cart_binwidth: 0.0, ..grid }, "cart_binwidth"),
    ];
    for (grid, field) in grids {
        match sph2cart(&good, &grid) {
            Err(BinningError::InvalidParameter { name, .. }) => assert_eq!(name, field),
            other => panic!("expected invalid {}, got {:?}", field, other),
        }
    }

    let err = Binner::new(good, grid).threads(Some(0)).run().unwrap_err();
    assert!(matches!(err, BinningError::InvalidParameter { name: "threads", .. }));
}

#[test]
fn oversized_grid_is_rejected() {
    let cases = [
        (binning(1e10, 2.0, 2, 2, 4), grid(1.0, 10_000, 2)),
        (binning(2.0_f64.powi(33), 2.0, 2, 2, 4), grid(1.0, 1 << 31, 2)),
        (binning(1e300, 2.0, 2, 2, 4), grid(1e-300, 1, 2)),
    ];
    for (binning, grid) in cases {
        match sph2cart(&binning, &grid) {
            Err(BinningError::InvalidParameter { name, .. }) => assert_eq!(name, "cart_binwidth"),
            other => panic!("expected oversized grid to be rejected, got {:?}", other),
        }
    }
}

#[test]
fn vanishing_bins_are_degenerate() {
    // with r_power = 1000 the innermost bin edges underflow to zero
    let binning = binning(10.0, 1000.0, 10, 2, 4);
    let err = sph2cart(&binning, &grid(5.0, 1, 2)).unwrap_err();
    assert!(
        matches!(
            err,
            BinningError::NumericDegeneracy {
                r_bin_idx: 0,
                costheta_bin_idx: 0,
                ..
            }
        ),
        "{:?}",
        err
    );
}

#[test]
fn default_config_scaled_down() {
    let mut settings = settings::load_default_config().unwrap();
    // Reduce the grid for faster testing
    settings.spherical.r_max = 50.0;
    settings.spherical.n_rbins = 20;
    settings.spherical.n_costhetabins = 10;
    settings.spherical.n_phibins = 8;
    settings.cartesian.antialias = 2;

    let mapping = settings.binner().run().unwrap();
    assert_eq!(mapping.len(), 20 * 5);
    assert_conserved(&settings.spherical, &mapping);
}
