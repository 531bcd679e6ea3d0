//! Machine readable description of a generated core
//!
//! The same record renders as JSON and as a C header for test benches.

use core::fmt::{self, Write};

use serde::Serialize;

use crate::{
    Architecture, CoreConfiguration, ErrorModel, QuadSplineTable, ResetPolicy,
    SplineConfiguration,
};

/// Rotation core parameters and predicted error behaviour
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RotationMetadata {
    /// Verilog module name
    pub name: String,
    /// Resolved parameters
    pub config: CoreConfiguration,
    /// Predicted error
    pub error: ErrorModel,
    /// Clock enabled cycles from input to output
    pub latency: u32,
    /// Clocks between accepted inputs
    pub clocks_per_output: u32,
}

/// Interpolated sine table parameters and measured error
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SplineMetadata {
    /// Verilog module name
    pub name: String,
    /// Output width
    pub output_width: u32,
    /// Guard bits
    pub extra_bits: u32,
    /// Phase width
    pub phase_bits: u32,
    /// log2 of the segment count
    pub log2_size: u32,
    /// Integer value of a unit sine in working LSBs
    pub scale: i64,
    /// Worst case table error, working LSBs
    pub error_lsb: f64,
    /// Worst case table error, sine units
    pub error_sine: f64,
    /// First image spur, dB
    pub spur_db: f64,
    /// Quadratic term dropped
    pub linear: bool,
    /// Clock enabled cycles from phase to value
    pub latency: u32,
    /// Reset style
    pub reset: ResetPolicy,
    /// Aux tag bit
    pub aux: bool,
}

/// Description of one generated core
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Metadata {
    /// CORDIC rotation or vectoring
    Rotation(RotationMetadata),
    /// Quadratically interpolated sine table
    Spline(SplineMetadata),
}

/// C `%.{prec}e` formatting: signed exponent of at least two digits
fn c_exp(v: f64, prec: usize) -> String {
    let s = format!("{v:.prec$e}");
    match s.split_once('e') {
        Some((m, e)) => {
            let e: i32 = e.parse().unwrap_or(0);
            let sign = if e < 0 { '-' } else { '+' };
            format!("{m}e{sign}{:02}", e.abs())
        }
        None => s,
    }
}

impl Metadata {
    /// Rotation core record
    pub fn rotation(name: &str, cfg: &CoreConfiguration) -> Self {
        Self::Rotation(RotationMetadata {
            name: name.into(),
            config: *cfg,
            error: ErrorModel::new(cfg),
            latency: cfg.latency(),
            clocks_per_output: cfg.clocks_per_output(),
        })
    }

    /// Interpolated sine table record
    pub fn spline(name: &str, cfg: &SplineConfiguration, table: &QuadSplineTable) -> Self {
        Self::Spline(SplineMetadata {
            name: name.into(),
            output_width: cfg.output_width,
            extra_bits: cfg.extra_bits,
            phase_bits: cfg.phase_bits,
            log2_size: table.log2_size(),
            scale: table.scale(),
            error_lsb: table.error_lsb(),
            error_sine: table.error_sine(),
            spur_db: table.spur_db(),
            linear: cfg.linear,
            latency: cfg.latency(),
            reset: cfg.reset,
            aux: cfg.aux,
        })
    }

    /// Module the record describes
    pub fn name(&self) -> &str {
        match self {
            Self::Rotation(m) => &m.name,
            Self::Spline(m) => &m.name,
        }
    }

    fn reset_and_aux(&self) -> (ResetPolicy, bool) {
        match self {
            Self::Rotation(m) => (m.config.reset(), m.config.aux()),
            Self::Spline(m) => (m.reset, m.aux),
        }
    }

    /// Pretty printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// C header with include guard `NAME_H`
    pub fn write_header<W: Write>(&self, w: &mut W) -> fmt::Result {
        let guard = format!("{}_H", self.name().to_uppercase());
        writeln!(w, "// {}.h: generated by {}", self.name(), env!("CARGO_PKG_NAME"))?;
        writeln!(w, "#ifndef\t{guard}")?;
        writeln!(w, "#define\t{guard}")?;
        let (reset, aux) = self.reset_and_aux();
        if reset == ResetPolicy::Async {
            writeln!(w, "#define\tASYNC_RESET")?;
        }
        match self {
            Self::Rotation(m) => {
                let c = &m.config;
                if c.architecture() == Architecture::Iterative {
                    writeln!(w, "#ifdef\tCLOCKS_PER_OUTPUT")?;
                    writeln!(w, "#undef\tCLOCKS_PER_OUTPUT")?;
                    writeln!(w, "#endif\t// CLOCKS_PER_OUTPUT")?;
                    writeln!(w, "#define\tCLOCKS_PER_OUTPUT\t{}\n", m.clocks_per_output)?;
                }
                for (k, v) in [
                    ("IW", c.input_width()),
                    ("OW", c.output_width()),
                    ("NEXTRA", c.extra_bits()),
                    ("WW", c.working_width()),
                    ("PW", c.phase_bits()),
                    ("NSTAGES", c.stage_count()),
                ] {
                    writeln!(w, "const int\t{k} = {v};")?;
                }
                let e = &m.error;
                writeln!(
                    w,
                    "const double\tQUANTIZATION_VARIANCE = {}; // (Units^2)",
                    c_exp(e.quantization_variance, 4)
                )?;
                writeln!(
                    w,
                    "const double\tPHASE_VARIANCE_RAD = {}; // (Radians^2)",
                    c_exp(e.phase_variance_rad, 4)
                )?;
                writeln!(w, "const double\tGAIN = {:.16};", e.gain)?;
                writeln!(w, "const double\tBEST_POSSIBLE_CNR = {:.2};", e.best_possible_cnr_db)?;
            }
            Self::Spline(m) => {
                writeln!(w, "const\tint\tOW         = {}; // bits", m.output_width)?;
                writeln!(w, "const\tint\tNEXTRA     = {}; // bits", m.extra_bits)?;
                writeln!(w, "const\tint\tPW         = {}; // bits", m.phase_bits)?;
                writeln!(w, "const\tlong\tTBL_LGSZ  = {}; // (Units)", m.log2_size)?;
                writeln!(w, "const\tlong\tTBL_SZ    = {}; // (Units)", 1u64 << m.log2_size)?;
                writeln!(w, "const\tlong\tSCALE     = {}; // (WW Units)", m.scale)?;
                writeln!(w, "const\tdouble\tITBL_ERR  = {:.2}; // (WW Units)", m.error_lsb)?;
                writeln!(w, "const\tdouble\tTBL_ERR   = {:.16}; // (sin Units)", m.error_sine)?;
                writeln!(w, "const\tdouble\tSPURDB    = {:6.2}; // dB", m.spur_db)?;
            }
        }
        writeln!(w, "const bool\tHAS_RESET = {};", reset != ResetPolicy::None)?;
        writeln!(w, "const bool\tHAS_AUX   = {aux};")?;
        if reset != ResetPolicy::None {
            writeln!(w, "#define\tHAS_RESET_WIRE")?;
        }
        if aux {
            writeln!(w, "#define\tHAS_AUX_WIRES")?;
        }
        writeln!(w, "#endif\t// {guard}")
    }

    /// Render the C header into a string
    pub fn header(&self) -> Result<String, fmt::Error> {
        let mut s = String::new();
        self.write_header(&mut s)?;
        Ok(s)
    }
}

/// Human readable parameter report
impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotation(m) => {
                let c = &m.config;
                writeln!(f, "{}: {:?} {:?}", m.name, c.architecture(), c.mode())?;
                writeln!(
                    f,
                    "  widths: IW {} OW {} WW {} PW {} (extra {})",
                    c.input_width(),
                    c.output_width(),
                    c.working_width(),
                    c.phase_bits(),
                    c.extra_bits()
                )?;
                writeln!(
                    f,
                    "  stages: {}, latency {}, clocks per output {}",
                    c.stage_count(),
                    m.latency,
                    m.clocks_per_output
                )?;
                writeln!(f, "  gain: {:.6}", m.error.gain)?;
                writeln!(
                    f,
                    "  quantization variance: {:.4e} LSB^2",
                    m.error.quantization_variance
                )?;
                writeln!(f, "  phase variance: {:.4e} rad^2", m.error.phase_variance_rad)?;
                write!(f, "  best possible CNR: {:.2} dB", m.error.best_possible_cnr_db)
            }
            Self::Spline(m) => {
                let kind = if m.linear { "linear" } else { "quadratic" };
                writeln!(f, "{}: {kind} sine table", m.name)?;
                writeln!(
                    f,
                    "  widths: OW {} PW {} (extra {})",
                    m.output_width, m.phase_bits, m.extra_bits
                )?;
                writeln!(
                    f,
                    "  segments: {} (log2 {}), latency {}",
                    1u64 << m.log2_size,
                    m.log2_size,
                    m.latency
                )?;
                writeln!(f, "  worst error: {:.4} LSB, {:.4e} sine", m.error_lsb, m.error_sine)?;
                write!(f, "  first spur: {:.2} dB", m.spur_db)
            }
        }
    }
}
