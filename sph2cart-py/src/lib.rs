use pyo3::exceptions::{PyArithmeticError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use ::sph2cart::{BinMapping, Binner, BinningError, CartesianGrid, SphericalBinning};

type Tables = (Vec<Vec<[u32; 3]>>, Vec<Vec<f64>>);

fn to_py_err(err: BinningError) -> PyErr {
    match err {
        BinningError::InvalidParameter { .. } => PyValueError::new_err(err.to_string()),
        BinningError::NumericDegeneracy { .. } => PyArithmeticError::new_err(err.to_string()),
        BinningError::ThreadPool(_) => PyRuntimeError::new_err(err.to_string()),
    }
}

fn to_tables(mapping: BinMapping) -> Tables {
    mapping
        .binning
        .indices()
        .map(|index| {
            mapping
                .cells(index)
                .into_iter()
                .map(|(cell, volume)| (cell.to_array(), volume))
                .unzip::<_, _, Vec<_>, Vec<_>>()
        })
        .unzip()
}

/// Compute the first-octant overlap between spherical bins and oversampled Cartesian cells.
///
/// Returns `(ind_arrays, vol_arrays)`, one entry per spherical bin ordered with the radial
/// index outer and the costheta index inner.
#[pyfunction]
#[pyo3(signature = (r_max, r_power, n_rbins, n_costhetabins, n_phibins, cart_binwidth, oversample, antialias, threads = None))]
#[allow(clippy::too_many_arguments)]
fn sph2cart(
    py: Python<'_>,
    r_max: f64,
    r_power: f64,
    n_rbins: usize,
    n_costhetabins: usize,
    n_phibins: usize,
    cart_binwidth: f64,
    oversample: usize,
    antialias: usize,
    threads: Option<usize>,
) -> PyResult<Tables> {
    let binning = SphericalBinning {
        r_max,
        r_power,
        n_rbins,
        n_costhetabins,
        n_phibins,
    };
    let grid = CartesianGrid {
        cart_binwidth,
        oversample,
        antialias,
    };
    let binner = Binner::new(binning, grid).threads(threads);

    let mapping = py.allow_threads(|| binner.run()).map_err(to_py_err)?;
    Ok(to_tables(mapping))
}

#[pymodule]
fn sph2cart_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(crate::sph2cart, m)?)?;
    Ok(())
}
