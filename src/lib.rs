//! Volume-weighted mapping from power-law spherical bins onto a uniform Cartesian grid.
//!
//! Only the first octant (and the costheta >= 0 quadrant of the spherical binning) is
//! computed. Mirroring the mapping across the full sphere and positioning it relative to
//! a physical point is left to the consumer of [`BinMapping`].

pub mod bins;
pub mod config;
pub mod error;
mod gapfill;
pub mod grid;
pub mod mapping;
pub mod settings;
mod sweep;

pub use bins::{SphericalBinIndex, SphericalBinning};
pub use error::BinningError;
pub use grid::{CartesianBinIndex, CartesianGrid};
pub use mapping::{sph2cart, BinMapping, Binner, SweepReport};
