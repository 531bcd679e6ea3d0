use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    solver::{minimal_phase_bits, minimal_stage_count},
};

/// Width assumed when a request names none
pub const DEFAULT_WIDTH: u32 = 24;
/// Default guard bits below the working LSB
pub const DEFAULT_EXTRA_BITS: u32 = 3;
/// Largest register width the bit-accurate model represents exactly
pub const MAX_WIDTH: u32 = 62;
/// Largest supported stage count
pub const MAX_STAGES: u32 = 64;

/// Core family and architecture to generate
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::AsRefStr,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
pub enum Mode {
    /// Pipelined vector rotation (polar to rectangular)
    #[default]
    #[strum(serialize = "p2r")]
    Rotate,
    /// Iterative vector rotation
    #[strum(serialize = "sp2r")]
    SequentialRotate,
    /// Pipelined rectangular to polar conversion
    #[strum(serialize = "r2p")]
    Vectoring,
    /// Iterative rectangular to polar conversion
    #[strum(serialize = "sr2p")]
    SequentialVectoring,
    /// Full sine table lookup
    #[strum(serialize = "tbl")]
    SineTable,
    /// Quarter wave sine table lookup
    #[strum(serialize = "qtr")]
    QuarterWave,
    /// Quadratically interpolated sine table
    #[strum(serialize = "qtbl")]
    QuadraticTable,
}

impl Mode {
    /// Rotation engine parameters, `None` for the sine generators
    pub fn rotation(&self) -> Option<(CordicMode, Architecture)> {
        use Architecture::*;
        use CordicMode::*;
        Some(match self {
            Self::Rotate => (Rotate, Pipelined),
            Self::SequentialRotate => (Rotate, Iterative),
            Self::Vectoring => (Vectoring, Pipelined),
            Self::SequentialVectoring => (Vectoring, Iterative),
            _ => return None,
        })
    }

    /// Output file used when the request names none
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Rotate => "cordic.v",
            Self::SequentialRotate => "seqcordic.v",
            Self::Vectoring => "topolar.v",
            Self::SequentialVectoring => "seqpolar.v",
            Self::SineTable => "sintable.v",
            Self::QuarterWave => "quarterwav.v",
            Self::QuadraticTable => "quadtbl.v",
        }
    }
}

/// Rotation direction control
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CordicMode {
    /// Rotate `(x, y)` by an input phase
    Rotate,
    /// Rotate `(x, y)` onto the positive x axis, accumulating the phase
    Vectoring,
}

/// Hardware organization of the rotation engine
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    /// One register stage per micro-rotation, one result per clock
    Pipelined,
    /// One micro-rotation per clock on shared registers
    Iterative,
}

/// Register reset style of the emitted core
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::AsRefStr,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    /// Registers only have their `initial` values
    None,
    /// Active high `i_reset` sampled on the clock edge
    #[default]
    Sync,
    /// Active low `i_areset_n`
    Async,
}

/// What to generate
///
/// Unset widths are derived: see [`CoreConfiguration::resolve()`],
/// [`TableConfiguration::resolve()`] and [`SplineConfiguration::resolve()`].
///
/// ```
/// # use cordicgen::*;
/// let req = GenerationRequest::new(Mode::Vectoring)
///     .input_width(12)
///     .extra_bits(2)
///     .aux(true);
/// let cfg = CoreConfiguration::resolve(&req).unwrap();
/// assert_eq!(cfg.working_width(), 15);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    mode: Mode,
    input_width: Option<u32>,
    output_width: Option<u32>,
    extra_bits: u32,
    phase_bits: Option<u32>,
    stages: Option<u32>,
    reset: ResetPolicy,
    aux: bool,
    linear: bool,
    file_name: Option<String>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl GenerationRequest {
    /// A request with default widths and features
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            input_width: None,
            output_width: None,
            extra_bits: DEFAULT_EXTRA_BITS,
            phase_bits: None,
            stages: None,
            reset: ResetPolicy::default(),
            aux: false,
            linear: false,
            file_name: None,
        }
    }

    /// Input sample width
    ///
    /// For the sine tables this is taken as the phase width if no phase
    /// width is given.
    pub fn input_width(mut self, width: u32) -> Self {
        self.input_width = Some(width);
        self
    }

    /// Output sample width
    pub fn output_width(mut self, width: u32) -> Self {
        self.output_width = Some(width);
        self
    }

    /// Guard bits carried below the LSB
    pub fn extra_bits(mut self, bits: u32) -> Self {
        self.extra_bits = bits;
        self
    }

    /// Phase accumulator width (a full turn is `2^bits`)
    pub fn phase_bits(mut self, bits: u32) -> Self {
        self.phase_bits = Some(bits);
        self
    }

    /// Force a micro-rotation count
    pub fn stages(mut self, stages: u32) -> Self {
        self.stages = Some(stages);
        self
    }

    /// Reset style
    pub fn reset(mut self, reset: ResetPolicy) -> Self {
        self.reset = reset;
        self
    }

    /// Carry an auxiliary tag bit aligned with the data
    pub fn aux(mut self, aux: bool) -> Self {
        self.aux = aux;
        self
    }

    /// Drop the quadratic term of the interpolated sine table
    pub fn linear(mut self, linear: bool) -> Self {
        self.linear = linear;
        self
    }

    /// Output file name, the module name derives from it
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Selected generator
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Output file name
    pub fn output_file(&self) -> &str {
        self.file_name
            .as_deref()
            .unwrap_or_else(|| self.mode.default_file_name())
    }

    /// `(input, output)` widths, each defaulting to the other and both
    /// to [`DEFAULT_WIDTH`].
    fn io_widths(&self) -> (u32, u32) {
        match (self.input_width, self.output_width) {
            (Some(i), Some(o)) => (i, o),
            (Some(w), None) | (None, Some(w)) => (w, w),
            (None, None) => {
                log::warn!("Assuming input and output widths of {DEFAULT_WIDTH} bits");
                (DEFAULT_WIDTH, DEFAULT_WIDTH)
            }
        }
    }
}

fn at_least(what: &'static str, width: u32, min: u32) -> Result<u32, ConfigError> {
    if width < min {
        Err(ConfigError::TooNarrow { what, width, min })
    } else {
        Ok(width)
    }
}

fn at_most(what: &'static str, width: u32, max: u32) -> Result<u32, ConfigError> {
    if width > max {
        Err(ConfigError::TooWide { what, width, max })
    } else {
        Ok(width)
    }
}

/// Guard bits, bounded before any width arithmetic
fn extra_bits(bits: u32) -> Result<u32, ConfigError> {
    if bits < 1 {
        return Err(ConfigError::ExtraBits(bits));
    }
    at_most("extra", bits, MAX_WIDTH)
}

/// Fully resolved rotation engine parameters
///
/// Invariants: `working_width >= max(iw, ow) + extra_bits` (one more for
/// vectoring), `3 <= phase_bits <= 62`, `1 <= stage_count <= 64`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CoreConfiguration {
    input_width: u32,
    output_width: u32,
    extra_bits: u32,
    working_width: u32,
    phase_bits: u32,
    stage_count: u32,
    mode: CordicMode,
    architecture: Architecture,
    reset: ResetPolicy,
    aux: bool,
}

impl CoreConfiguration {
    /// Validate a rotation request and derive the missing parameters
    ///
    /// Sine table modes resolve as a pipelined rotator.
    pub fn resolve(req: &GenerationRequest) -> Result<Self, ConfigError> {
        let (mode, architecture) = req.mode.rotation().unwrap_or((
            CordicMode::Rotate,
            Architecture::Pipelined,
        ));
        let (iw, ow) = req.io_widths();
        let iw = at_most("input", at_least("input", iw, 1)?, MAX_WIDTH)?;
        let ow = at_most("output", at_least("output", ow, 1)?, MAX_WIDTH)?;
        let extra = extra_bits(req.extra_bits)?;
        let guard = match mode {
            CordicMode::Rotate => 0,
            CordicMode::Vectoring => 1,
        };
        let ww = at_most("working", iw.max(ow) + extra + guard, MAX_WIDTH)?;
        let pb = req.phase_bits.unwrap_or_else(|| minimal_phase_bits(ww));
        let pb = at_most("phase", at_least("phase", pb, 3)?, MAX_WIDTH)?;
        let n = match req.stages {
            Some(n) if (1..=MAX_STAGES).contains(&n) => n,
            Some(n) => return Err(ConfigError::Stages(n)),
            None => minimal_stage_count(ww, pb).max(1),
        };
        Ok(Self {
            input_width: iw,
            output_width: ow,
            extra_bits: extra,
            working_width: ww,
            phase_bits: pb,
            stage_count: n,
            mode,
            architecture,
            reset: req.reset,
            aux: req.aux,
        })
    }

    /// Input sample width
    pub fn input_width(&self) -> u32 {
        self.input_width
    }

    /// Output sample width
    pub fn output_width(&self) -> u32 {
        self.output_width
    }

    /// Requested guard bits
    pub fn extra_bits(&self) -> u32 {
        self.extra_bits
    }

    /// Internal register width
    pub fn working_width(&self) -> u32 {
        self.working_width
    }

    /// Phase accumulator width
    pub fn phase_bits(&self) -> u32 {
        self.phase_bits
    }

    /// Number of micro-rotations
    pub fn stage_count(&self) -> u32 {
        self.stage_count
    }

    /// Rotate or vectoring
    pub fn mode(&self) -> CordicMode {
        self.mode
    }

    /// Pipelined or iterative
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Reset style
    pub fn reset(&self) -> ResetPolicy {
        self.reset
    }

    /// Aux tag bit
    pub fn aux(&self) -> bool {
        self.aux
    }

    /// Clock enabled cycles from input to output
    pub fn latency(&self) -> u32 {
        self.stage_count + 2
    }

    /// Clocks between accepted inputs
    pub fn clocks_per_output(&self) -> u32 {
        match self.architecture {
            Architecture::Pipelined => 1,
            Architecture::Iterative => self.stage_count + 2,
        }
    }
}

/// Resolved direct or quarter wave sine table parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableConfiguration {
    /// Output sample width
    pub output_width: u32,
    /// Phase width, also the log2 of the full wave table size
    pub phase_bits: u32,
    /// Quarter wave symmetry folding
    pub quarter_wave: bool,
    /// Reset style
    pub reset: ResetPolicy,
    /// Aux tag bit
    pub aux: bool,
}

impl TableConfiguration {
    /// Exclusive phase width cap of the full table
    pub const FULL_CAP: u32 = 24;
    /// Exclusive phase width cap of the quarter wave table
    pub const QUARTER_CAP: u32 = 26;

    /// Validate a table request and derive the missing widths
    ///
    /// An input width without a phase width is taken as the phase width.
    /// A phase width alone selects the widest output that phase resolves.
    pub fn resolve(req: &GenerationRequest) -> Result<Self, ConfigError> {
        let quarter_wave = req.mode == Mode::QuarterWave;
        let mut phase_bits = req.phase_bits;
        match (req.input_width, phase_bits) {
            (Some(iw), None) => phase_bits = Some(iw),
            (Some(iw), Some(_)) => {
                log::warn!("Input width {iw} ignored for sine table generation")
            }
            _ => {}
        }
        let cap = if quarter_wave {
            Self::QUARTER_CAP
        } else {
            Self::FULL_CAP
        };
        if let Some(pb) = phase_bits.filter(|&pb| pb >= cap) {
            return Err(ConfigError::TableTooLarge { log2_size: pb, cap });
        }
        let output_width = req
            .output_width
            .or_else(|| {
                phase_bits.and_then(|pb| (1..=pb).rev().find(|&k| minimal_phase_bits(k) <= pb))
            })
            .unwrap_or_else(|| {
                log::warn!("Assuming an output width of {DEFAULT_WIDTH} bits");
                DEFAULT_WIDTH
            });
        let output_width = at_most("output", at_least("output", output_width, 2)?, MAX_WIDTH)?;
        let phase_bits = phase_bits.unwrap_or_else(|| minimal_phase_bits(output_width));
        // At least four stored entries
        let phase_bits = at_least("phase", phase_bits, if quarter_wave { 4 } else { 3 })?;
        if phase_bits >= cap {
            return Err(ConfigError::TableTooLarge {
                log2_size: phase_bits,
                cap,
            });
        }
        Ok(Self {
            output_width,
            phase_bits,
            quarter_wave,
            reset: req.reset,
            aux: req.aux,
        })
    }

    /// log2 of the number of stored entries
    pub fn log2_size(&self) -> u32 {
        if self.quarter_wave {
            self.phase_bits - 2
        } else {
            self.phase_bits
        }
    }

    /// Clock enabled cycles from phase to value
    pub fn latency(&self) -> u32 {
        if self.quarter_wave { 3 } else { 1 }
    }
}

/// Resolved interpolated sine table parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SplineConfiguration {
    /// Output sample width
    pub output_width: u32,
    /// Guard bits below the output LSB
    pub extra_bits: u32,
    /// Phase width
    pub phase_bits: u32,
    /// Drop the quadratic term
    pub linear: bool,
    /// Reset style
    pub reset: ResetPolicy,
    /// Aux tag bit
    pub aux: bool,
}

impl SplineConfiguration {
    /// Smallest segment count tried is `2^FIRST_LOG2_SIZE`
    pub const FIRST_LOG2_SIZE: u32 = 4;
    /// Hard cap on the segment table size
    pub const MAX_LOG2_SIZE: u32 = 20;

    /// Validate an interpolated table request and derive the missing widths
    pub fn resolve(req: &GenerationRequest) -> Result<Self, ConfigError> {
        let (_, ow) = req.io_widths();
        let ow = at_most("output", at_least("output", ow, 2)?, MAX_WIDTH)?;
        let extra = extra_bits(req.extra_bits)?;
        let ww = at_least("working", ow + extra, 7)?;
        at_most("working", ww, MAX_WIDTH)?;
        let pb = req.phase_bits.unwrap_or_else(|| minimal_phase_bits(ww));
        let pb = at_most(
            "phase",
            at_least("phase", pb, Self::FIRST_LOG2_SIZE + 1)?,
            MAX_WIDTH,
        )?;
        Ok(Self {
            output_width: ow,
            extra_bits: extra,
            phase_bits: pb,
            linear: req.linear,
            reset: req.reset,
            aux: req.aux,
        })
    }

    /// Internal register width
    pub fn working_width(&self) -> u32 {
        self.output_width + self.extra_bits
    }

    /// Largest segment table size the search may try
    pub fn log2_size_cap(&self) -> u32 {
        Self::MAX_LOG2_SIZE.min(self.phase_bits - 1)
    }

    /// Clock enabled cycles from phase to value
    pub fn latency(&self) -> u32 {
        if self.linear { 4 } else { 6 }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_strings() {
        use strum::IntoEnumIterator;
        for m in Mode::iter() {
            let s: &str = m.as_ref();
            assert_eq!(s.parse::<Mode>().unwrap(), m);
        }
        assert_eq!("sr2p".parse::<Mode>().unwrap(), Mode::SequentialVectoring);
        assert!("p2p".parse::<Mode>().is_err());
        assert_eq!("async".parse::<ResetPolicy>().unwrap(), ResetPolicy::Async);
    }

    #[test]
    fn rotation_defaults() {
        let req = GenerationRequest::new(Mode::Rotate)
            .input_width(12)
            .output_width(12);
        let cfg = CoreConfiguration::resolve(&req).unwrap();
        assert_eq!(cfg.working_width(), 15);
        assert_eq!(cfg.phase_bits(), 19);
        assert_eq!(cfg.stage_count(), 15);
        assert_eq!(cfg.latency(), 17);
        assert_eq!(cfg.clocks_per_output(), 1);
        assert_eq!(cfg.reset(), ResetPolicy::Sync);

        let cfg = CoreConfiguration::resolve(&GenerationRequest::new(Mode::Rotate)).unwrap();
        assert_eq!((cfg.input_width(), cfg.output_width()), (24, 24));
    }

    #[test]
    fn vectoring_guard_bit() {
        let req = GenerationRequest::new(Mode::SequentialVectoring).output_width(10);
        let cfg = CoreConfiguration::resolve(&req).unwrap();
        assert_eq!(cfg.input_width(), 10);
        assert_eq!(cfg.working_width(), 14);
        assert_eq!(cfg.architecture(), Architecture::Iterative);
        assert_eq!(cfg.clocks_per_output(), cfg.stage_count() + 2);
    }

    #[test]
    fn invalid() {
        let r = GenerationRequest::new(Mode::Rotate).input_width(12);
        assert_eq!(
            CoreConfiguration::resolve(&r.clone().phase_bits(2)),
            Err(ConfigError::TooNarrow {
                what: "phase",
                width: 2,
                min: 3
            })
        );
        assert_eq!(
            CoreConfiguration::resolve(&r.clone().extra_bits(0)),
            Err(ConfigError::ExtraBits(0))
        );
        assert_eq!(
            CoreConfiguration::resolve(&r.clone().stages(0)),
            Err(ConfigError::Stages(0))
        );
        assert!(matches!(
            CoreConfiguration::resolve(&r.input_width(0)),
            Err(ConfigError::TooNarrow { what: "input", .. })
        ));
        assert!(matches!(
            CoreConfiguration::resolve(&GenerationRequest::new(Mode::Rotate).input_width(60)),
            Err(ConfigError::TooWide { what: "working", .. })
        ));
        assert_eq!(
            CoreConfiguration::resolve(&GenerationRequest::new(Mode::Vectoring).extra_bits(u32::MAX)),
            Err(ConfigError::TooWide {
                what: "extra",
                width: u32::MAX,
                max: MAX_WIDTH
            })
        );
        assert!(matches!(
            CoreConfiguration::resolve(&GenerationRequest::new(Mode::Rotate).phase_bits(u32::MAX)),
            Err(ConfigError::TooWide { what: "phase", .. })
        ));
    }

    #[test]
    fn table_limits() {
        for req in [
            GenerationRequest::new(Mode::SineTable).phase_bits(200),
            GenerationRequest::new(Mode::SineTable).input_width(u32::MAX),
            GenerationRequest::new(Mode::QuarterWave).phase_bits(u32::MAX),
        ] {
            assert!(matches!(
                TableConfiguration::resolve(&req),
                Err(ConfigError::TableTooLarge { .. })
            ));
        }
        assert!(matches!(
            TableConfiguration::resolve(&GenerationRequest::new(Mode::SineTable).output_width(u32::MAX)),
            Err(ConfigError::TooWide { what: "output", .. })
        ));
        assert_eq!(
            TableConfiguration::resolve(&GenerationRequest::new(Mode::QuarterWave).phase_bits(3)),
            Err(ConfigError::TooNarrow {
                what: "phase",
                width: 3,
                min: 4
            })
        );
        let t = TableConfiguration::resolve(
            &GenerationRequest::new(Mode::SineTable)
                .output_width(8)
                .phase_bits(3),
        )
        .unwrap();
        assert_eq!(t.log2_size(), 3);
        let t = TableConfiguration::resolve(
            &GenerationRequest::new(Mode::QuarterWave)
                .output_width(8)
                .phase_bits(4),
        )
        .unwrap();
        assert_eq!(t.log2_size(), 2);
    }

    #[test]
    fn table_widths() {
        let t = TableConfiguration::resolve(&GenerationRequest::new(Mode::SineTable).output_width(8))
            .unwrap();
        assert_eq!(t.phase_bits, minimal_phase_bits(8));

        let t = TableConfiguration::resolve(&GenerationRequest::new(Mode::QuarterWave).phase_bits(12))
            .unwrap();
        assert_eq!(t.output_width, 8);
        assert_eq!(minimal_phase_bits(t.output_width), 12);
        assert_eq!(t.log2_size(), 10);

        let t = TableConfiguration::resolve(&GenerationRequest::new(Mode::SineTable).input_width(10))
            .unwrap();
        assert_eq!(t.phase_bits, 10);

        let err = TableConfiguration::resolve(
            &GenerationRequest::new(Mode::SineTable)
                .output_width(16)
                .phase_bits(24),
        );
        assert_eq!(
            err,
            Err(ConfigError::TableTooLarge {
                log2_size: 24,
                cap: 24
            })
        );
        assert!(
            TableConfiguration::resolve(
                &GenerationRequest::new(Mode::QuarterWave)
                    .output_width(16)
                    .phase_bits(25)
            )
            .is_ok()
        );
    }

    #[test]
    fn spline_widths() {
        let s = SplineConfiguration::resolve(
            &GenerationRequest::new(Mode::QuadraticTable)
                .output_width(13)
                .phase_bits(18),
        )
        .unwrap();
        assert_eq!(s.working_width(), 16);
        assert_eq!(s.log2_size_cap(), 17);
        assert_eq!(s.latency(), 6);

        let q = GenerationRequest::new(Mode::QuadraticTable).output_width(13);
        assert!(matches!(
            SplineConfiguration::resolve(&q.clone().extra_bits(u32::MAX)),
            Err(ConfigError::TooWide { what: "extra", .. })
        ));
        assert!(matches!(
            SplineConfiguration::resolve(&q.clone().output_width(u32::MAX)),
            Err(ConfigError::TooWide { what: "output", .. })
        ));
        assert!(matches!(
            SplineConfiguration::resolve(&q.phase_bits(u32::MAX)),
            Err(ConfigError::TooWide { what: "phase", .. })
        ));
    }
}
