use thiserror::Error;

/// Invalid generation parameters
///
/// Reported before any table derivation or text emission takes place.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A width is below what the architecture needs
    #[error("{what} width {width} is below the minimum of {min} bits")]
    TooNarrow {
        /// Name of the offending width
        what: &'static str,
        /// Requested width
        width: u32,
        /// Smallest supported value
        min: u32,
    },
    /// The internal model works in 64 bit integers
    #[error("{what} width {width} exceeds the supported maximum of {max} bits")]
    TooWide {
        /// Name of the offending width
        what: &'static str,
        /// Requested width
        width: u32,
        /// Largest supported value
        max: u32,
    },
    /// Stage count outside `1..=64`
    #[error("stage count {0} outside 1..=64")]
    Stages(u32),
    /// At least one guard bit is needed to absorb the CORDIC gain
    #[error("at least one extra bit is required, got {0}")]
    ExtraBits(u32),
    /// The requested table would not fit any reasonable block RAM
    #[error("table log2 size {log2_size} is at or above the safety cap of {cap}")]
    TableTooLarge {
        /// Requested log2 table size
        log2_size: u32,
        /// Exclusive upper bound
        cap: u32,
    },
}

/// [`crate::HexTable`] construction errors
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TableError {
    /// A value does not fit the two's complement field
    #[error("entry {index} = {value} does not fit {bits} bits")]
    Range {
        /// Table address
        index: usize,
        /// Offending value
        value: i64,
        /// Field width
        bits: u32,
    },
    /// Field width outside `1..63`
    #[error("unsupported field width {0}")]
    Width(u32),
    /// Fewer than four entries
    #[error("table needs at least 4 entries, got {0}")]
    Size(usize),
}

/// Generator errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid request
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// The spline table search hit its cap without meeting the error bound
    #[error(
        "quadratic table did not converge: error {error:.4} LSB at log2 size {log2_size}"
    )]
    NonConvergence {
        /// Last table size tried
        log2_size: u32,
        /// Worst case error of that table, in working LSBs
        error: f64,
    },
    /// Coefficient serialization
    #[error("table: {0}")]
    Table(#[from] TableError),
    /// Text rendering
    #[error("formatting")]
    Fmt(#[from] core::fmt::Error),
}
