use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use log::info;
use serde::Deserialize;

use crate::bins::SphericalBinning;
use crate::grid::CartesianGrid;
use crate::mapping::Binner;


/// Runtime configuration for the binner.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub spherical: SphericalBinning,
    pub cartesian: CartesianGrid,
    #[serde(default)]
    pub progress: bool,
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Settings {
    pub fn binner(&self) -> Binner {
        Binner::new(self.spherical, self.cartesian)
            .progress(self.progress)
            .threads(self.threads)
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings = Config::builder()
        .add_source(File::from(default_config_file.clone()).required(true))
        .build()
        .with_context(|| format!("loading configuration {:?}", default_config_file))?;

    let config: Settings = settings
        .try_deserialize()
        .context("deserializing configuration")?;

    validate_config(&config)?;

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    let config_file = if local_config.exists() {
        info!("using local configuration: {:?}", local_config);
        local_config
    } else {
        info!("using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings = Config::builder()
        .add_source(File::from(config_file.clone()).required(true))
        .add_source(Environment::with_prefix("sph2cart").separator("__"))
        .build()
        .with_context(|| format!("loading configuration {:?}", config_file))?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("deserializing configuration")?;

    CliArgs::parse().apply(&mut config);

    validate_config(&config)?;

    info!("{}", config);

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the SPH2CART_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("SPH2CART_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| anyhow!("could not find project root directory"))
}

fn validate_config(config: &Settings) -> Result<()> {
    config
        .binner()
        .validate()
        .context("invalid binning configuration")
}

#[derive(Parser, Debug)]
#[command(version, about = "sph2cart - spherical bin to Cartesian grid overlap tables")]
pub struct CliArgs {
    /// Outer radius of the spherical binning, in units of length.
    #[arg(long)]
    r_max: Option<f64>,

    /// Exponent of the power-law radial binning. Bins are uniform in `r^(1/r_power)`.
    #[arg(long)]
    r_power: Option<f64>,

    /// Number of radial bins.
    #[arg(long)]
    n_rbins: Option<usize>,

    /// Number of costheta bins over the full sphere. Must be even.
    #[arg(long)]
    n_costhetabins: Option<usize>,

    /// Number of azimuthal bins over the full sphere. Must be a multiple of 4.
    #[arg(long)]
    n_phibins: Option<usize>,

    /// Width of a (non-oversampled) Cartesian cell.
    #[arg(long)]
    binwidth: Option<f64>,

    /// Integer subdivision of each Cartesian cell used to register the grid.
    #[arg(long)]
    oversample: Option<usize>,

    /// Probe points per oversampled cell edge used to integrate overlap volume (1 to 50).
    #[arg(long)]
    antialias: Option<usize>,

    /// Number of worker threads for the sweep. Defaults to all available cores.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Show a progress bar during the sweep.
    #[arg(long)]
    progress: bool,
}

impl CliArgs {
    fn apply(self, config: &mut Settings) {
        if let Some(r_max) = self.r_max {
            config.spherical.r_max = r_max;
        }
        if let Some(r_power) = self.r_power {
            config.spherical.r_power = r_power;
        }
        if let Some(n_rbins) = self.n_rbins {
            config.spherical.n_rbins = n_rbins;
        }
        if let Some(n_costhetabins) = self.n_costhetabins {
            config.spherical.n_costhetabins = n_costhetabins;
        }
        if let Some(n_phibins) = self.n_phibins {
            config.spherical.n_phibins = n_phibins;
        }
        if let Some(binwidth) = self.binwidth {
            config.cartesian.cart_binwidth = binwidth;
        }
        if let Some(oversample) = self.oversample {
            config.cartesian.oversample = oversample;
        }
        if let Some(antialias) = self.antialias {
            config.cartesian.antialias = antialias;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if self.progress {
            config.progress = true;
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - r_max: {:.6}
  - r_power: {:.6}
  - n_rbins: {}
  - n_costhetabins: {}
  - n_phibins: {}
  - cart_binwidth: {:.6}
  - oversample: {}
  - antialias: {}
  - threads: {:?}
  ",
            self.spherical.r_max,
            self.spherical.r_power,
            self.spherical.n_rbins,
            self.spherical.n_costhetabins,
            self.spherical.n_phibins,
            self.cartesian.cart_binwidth,
            self.cartesian.oversample,
            self.cartesian.antialias,
            self.threads,
        )
    }
}
