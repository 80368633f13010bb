use thiserror::Error;

/// Errors raised while building a spherical-to-Cartesian bin mapping.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BinningError {
    /// An input parameter failed validation. Nothing was computed.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A spherical bin ended up with no usable volume to normalise against.
    #[error(
        "spherical bin (r={r_bin_idx}, costheta={costheta_bin_idx}) has degenerate total volume {total}"
    )]
    NumericDegeneracy {
        r_bin_idx: usize,
        costheta_bin_idx: usize,
        total: f64,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl BinningError {
    pub(crate) fn invalid(
        name: &'static str,
        value: impl ToString,
        reason: &'static str,
    ) -> Self {
        BinningError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}
