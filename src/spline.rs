//! Piecewise quadratic sine interpolation
//!
//! A turn is split into `2^L` segments. Each segment stores a constant,
//! a linear and a quadratic coefficient and evaluates
//! `c + (l + q·dx)·dx` for the fractional phase `dx` within the segment.
//! The segment count is the smallest that keeps the worst case error
//! within one working LSB.

use core::f64::consts::PI;
use core::fmt::{self, Write};

use serde::Serialize;

use crate::{
    Error, HexTable, SplineConfiguration, TableError,
    fixed::{mask, round_half_even_guarded, wrap},
    hdl::{
        Port, Verilog, always, banner, end_section, module_head, module_name, readmem_name,
        section, table_path,
    },
    model::Pipeline,
};

/// Points evaluated inside each segment by [`SplineFit::max_error()`]
const INTERIOR_POINTS: usize = 64;

/// Normalized sinc, `sin(pi x)/(pi x)`
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Level of the first image spur of a `2^log2_size` segment interpolator, dB
pub fn spur_db(log2_size: u32) -> f64 {
    20.0 * sinc(1.0 - 1.0 / (1u64 << log2_size) as f64).powi(3).log10()
}

/// Floating point spline coefficients, scaled so that the largest constant
/// term is one
#[derive(Clone, Debug, PartialEq)]
pub struct SplineFit {
    /// Value at the left segment edge
    pub constant: Vec<f64>,
    /// Slope per segment
    pub linear: Vec<f64>,
    /// Curvature per segment squared
    pub quadratic: Vec<f64>,
}

impl SplineFit {
    /// Fit `2^log2_size` segments from the segment center samples
    pub fn new(log2_size: u32) -> Self {
        let n = 1usize << log2_size;
        let half = PI / n as f64;
        let step = 2.0 * half;
        let sample = |i: f64| (step * i + half).sin();
        let s: Vec<f64> = (0..n).map(|i| sample(i as f64)).collect();
        let mut fit = Self {
            constant: Vec::with_capacity(n),
            linear: Vec::with_capacity(n),
            quadratic: Vec::with_capacity(n),
        };
        for i in 0..n {
            let (prev, mid, next) = (s[(i + n - 1) % n], s[i], s[(i + 1) % n]);
            let slope = (next - prev) / 2.0;
            let curve = -(mid - 0.5 * (next + prev));
            // Value the quadratic filter reproduces at the center, from the
            // unwrapped neighbours
            let x = i as f64;
            let center = 0.75 * sample(x) + (sample(x - 1.0) + sample(x + 1.0)) / 8.0;
            // Expand around the left edge instead of the center
            fit.constant.push(curve * 0.25 - slope * 0.5 + center);
            fit.linear.push(slope - curve);
            fit.quadratic.push(curve);
        }
        // Segment averages track an unscaled sine
        let gain = (1.0 / sinc(half)).powi(3);
        fit.scale(gain);
        let max = fit.constant.iter().fold(0f64, |m, c| m.max(c.abs()));
        fit.scale(1.0 / max);
        fit
    }

    fn scale(&mut self, k: f64) {
        for v in [&mut self.constant, &mut self.linear, &mut self.quadratic] {
            v.iter_mut().for_each(|c| *c *= k);
        }
    }

    /// Replace each segment by its chord
    pub fn into_linear(mut self) -> Self {
        for (l, q) in self.linear.iter_mut().zip(self.quadratic.iter_mut()) {
            *l += *q;
            *q = 0.0;
        }
        self
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.constant.len()
    }

    /// Whether there are no segments
    pub fn is_empty(&self) -> bool {
        self.constant.is_empty()
    }

    /// Interpolated value at `x` segments into the turn, `0 <= x < len()`
    pub fn value(&self, x: f64) -> f64 {
        let i = x.floor() as usize % self.len();
        let dx = x - x.floor();
        self.constant[i] + (self.linear[i] + self.quadratic[i] * dx) * dx
    }

    /// Signed worst case deviation from the sine, in sine units.
    ///
    /// Each segment is evaluated at both edges and at
    /// [`INTERIOR_POINTS`] evenly spaced offsets.
    pub fn max_error(&self) -> f64 {
        let n = self.len() as f64;
        let pick = |a: f64, b: f64| if b.abs() > a.abs() { b } else { a };
        (0..self.len()).fold(0.0, |worst, i| {
            let (c, l, q) = (self.constant[i], self.linear[i], self.quadratic[i]);
            let left = c - (2.0 * PI * i as f64 / n).sin();
            let right = c + l + q - (2.0 * PI * (i + 1) as f64 / n).sin();
            let inner = (0..INTERIOR_POINTS).fold(0.0, |m, k| {
                let dx = k as f64 / INTERIOR_POINTS as f64;
                let e = c + (l + q * dx) * dx - (2.0 * PI * (i as f64 + dx) / n).sin();
                pick(m, e)
            });
            pick(worst, pick(pick(left, right), inner))
        })
    }
}

/// One quantized coefficient array
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Coefficients {
    /// Two's complement field width
    pub bits: u32,
    /// Integer coefficients, truncated toward zero
    pub values: Vec<i64>,
}

impl Coefficients {
    fn quantize(values: &[f64], width: u32, scale: i64) -> Self {
        let max = values.iter().fold(0f64, |m, v| m.max(v.abs()));
        Self {
            bits: (width as i32 + max.log2().ceil() as i32) as u32,
            values: values.iter().map(|v| (scale as f64 * v) as i64).collect(),
        }
    }
}

/// Quantized spline table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuadSplineTable {
    log2_size: u32,
    width: u32,
    scale: i64,
    constant: Coefficients,
    linear: Coefficients,
    quadratic: Option<Coefficients>,
    error: f64,
}

impl QuadSplineTable {
    /// Quantize the fit for `2^log2_size` segments to a `width` bit
    /// working register
    pub fn build(log2_size: u32, width: u32, linear: bool) -> Self {
        let mut fit = SplineFit::new(log2_size);
        if linear {
            fit = fit.into_linear();
        }
        let scale = (1i64 << (width - 1)) - 2;
        Self {
            log2_size,
            width,
            scale,
            constant: Coefficients::quantize(&fit.constant, width, scale),
            linear: Coefficients::quantize(&fit.linear, width, scale),
            quadratic: (!linear).then(|| Coefficients::quantize(&fit.quadratic, width, scale)),
            error: fit.max_error() * scale as f64,
        }
    }

    /// Smallest table meeting one LSB of worst case error
    pub fn search(cfg: &SplineConfiguration) -> Result<Self, Error> {
        let cap = cfg.log2_size_cap();
        let mut log2_size = SplineConfiguration::FIRST_LOG2_SIZE;
        loop {
            let table = Self::build(log2_size, cfg.working_width(), cfg.linear);
            log::debug!("{} segments: worst error {:.4} LSB", 1 << log2_size, table.error);
            if table.error.abs() <= 1.0 {
                return Ok(table);
            }
            if log2_size >= cap {
                return Err(Error::NonConvergence {
                    log2_size,
                    error: table.error,
                });
            }
            log2_size += 1;
        }
    }

    /// log2 of the segment count
    pub fn log2_size(&self) -> u32 {
        self.log2_size
    }

    /// Integer value of a unit sine
    pub fn scale(&self) -> i64 {
        self.scale
    }

    /// Constant term
    pub fn constant(&self) -> &Coefficients {
        &self.constant
    }

    /// Linear term
    pub fn linear(&self) -> &Coefficients {
        &self.linear
    }

    /// Quadratic term, absent for linear interpolation
    pub fn quadratic(&self) -> Option<&Coefficients> {
        self.quadratic.as_ref()
    }

    /// Worst case error in working LSBs
    pub fn error_lsb(&self) -> f64 {
        self.error
    }

    /// Worst case error relative to `2^width`
    pub fn error_sine(&self) -> f64 {
        self.error * 0.5f64.powi(self.width as i32)
    }

    /// First image spur, dB
    pub fn spur_db(&self) -> f64 {
        spur_db(self.log2_size)
    }
}

/// An interpolated sine core
#[derive(Clone, Debug)]
pub struct SplineCore {
    cfg: SplineConfiguration,
    table: QuadSplineTable,
    name: String,
    file_name: String,
}

impl SplineCore {
    /// Search the table and name the module after `file_name`
    pub fn new(cfg: &SplineConfiguration, file_name: &str) -> Result<Self, Error> {
        Ok(Self {
            cfg: *cfg,
            table: QuadSplineTable::search(cfg)?,
            name: module_name(file_name),
            file_name: file_name.into(),
        })
    }

    /// Verilog module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The coefficient table in use
    pub fn table(&self) -> &QuadSplineTable {
        &self.table
    }

    fn dx_bits(&self) -> u32 {
        self.cfg.phase_bits - self.table.log2_size
    }

    /// Emitted arithmetic for one phase word, `o_sin`
    pub fn evaluate(&self, phase: u64) -> i64 {
        let t = &self.table;
        let s = self.dx_bits();
        let i = (mask(phase, self.cfg.phase_bits) >> s) as usize;
        let dx = mask(phase, s) as i128;
        // Products can exceed 64 bits before the shift
        let scaled = |v: i64| ((v as i128 * dx) >> s) as i64;
        let (cb, lb) = (t.constant.bits, t.linear.bits);
        let l = wrap(t.linear.values[i], lb);
        let lsum = match &t.quadratic {
            Some(q) => wrap(wrap(scaled(wrap(q.values[i], q.bits)), lb) + l, lb),
            None => l,
        };
        let r = wrap(wrap(scaled(lsum), cb) + wrap(t.constant.values[i], cb), cb);
        round_half_even_guarded(r, self.cfg.working_width(), self.cfg.extra_bits)
    }

    /// Clocked model of the emitted core
    pub fn model(&self) -> Pipeline<impl Fn(u64) -> i64 + '_> {
        Pipeline::new(move |p| self.evaluate(p), self.cfg.latency() as usize)
    }

    /// Coefficient files for `$readmemh`
    pub fn hex_tables(&self) -> Result<Vec<HexTable>, TableError> {
        let t = &self.table;
        let mut tables = vec![
            HexTable::new(
                table_path(&self.file_name, "_ctbl"),
                t.constant.bits,
                t.constant.values.clone(),
            )?,
            HexTable::new(
                table_path(&self.file_name, "_ltbl"),
                t.linear.bits,
                t.linear.values.clone(),
            )?,
        ];
        if let Some(q) = &t.quadratic {
            tables.push(HexTable::new(
                table_path(&self.file_name, "_qtbl"),
                q.bits,
                q.values.clone(),
            )?);
        }
        Ok(tables)
    }

    fn params(&self) -> Vec<(&'static str, u32, &'static str)> {
        let t = &self.table;
        let mut p = vec![
            ("PW", self.cfg.phase_bits, "phase bits"),
            ("OW", self.cfg.output_width, "output bits"),
            ("XTRA", self.cfg.extra_bits, "extra bits for internal precision"),
            ("WW", self.cfg.working_width(), "working bits"),
            ("LGTBL", t.log2_size, "log2 of the segment count"),
            ("DXBITS", self.dx_bits() + 1, "signed offset within a segment"),
            ("CBITS", t.constant.bits, "constant coefficient bits"),
            ("LBITS", t.linear.bits, "linear coefficient bits"),
        ];
        if let Some(q) = &t.quadratic {
            p.push(("QBITS", q.bits, "quadratic coefficient bits"));
        }
        p.push(("NSTAGES", self.cfg.latency(), "clocks from phase to value"));
        p
    }

    fn declarations<W: Write>(&self, w: &mut W) -> fmt::Result {
        let quad = self.table.quadratic.is_some();
        section(w, "Declarations")?;
        if quad {
            writeln!(w, "\treg\tsigned\t[(CBITS-1):0]\tcv, cv_1, cv_2, cv_3;")?;
            writeln!(w, "\treg\tsigned\t[(LBITS-1):0]\tlv, lv_1, lsum;")?;
            writeln!(w, "\treg\tsigned\t[(QBITS-1):0]\tqv;")?;
            writeln!(w, "\treg\tsigned\t[(DXBITS-1):0]\tdx, dx_1, dx_2;")?;
            writeln!(w, "\treg\tsigned\t[(QBITS+DXBITS-1):0]\tqprod;")?;
            writeln!(w, "\twire\tsigned\t[(LBITS-1):0]\tw_qprod;")?;
        } else {
            writeln!(w, "\treg\tsigned\t[(CBITS-1):0]\tcv, cv_1;")?;
            writeln!(w, "\treg\tsigned\t[(LBITS-1):0]\tlv;")?;
            writeln!(w, "\treg\tsigned\t[(DXBITS-1):0]\tdx;")?;
        }
        writeln!(w, "\treg\tsigned\t[(LBITS+DXBITS-1):0]\tlprod;")?;
        writeln!(w, "\twire\tsigned\t[(CBITS-1):0]\tw_lprod;")?;
        writeln!(w, "\treg\tsigned\t[(CBITS-1):0]\tr_value;")?;
        writeln!(w, "\treg\t\t[(WW-1):0]\tw_value;")?;
        if self.cfg.aux {
            writeln!(w, "\treg\t\t[(NSTAGES-1):0]\taux;")?;
        }
        writeln!(w)?;
        let mut tables = vec![("ctbl", "CBITS", "_ctbl"), ("ltbl", "LBITS", "_ltbl")];
        if quad {
            tables.push(("qtbl", "QBITS", "_qtbl"));
        }
        for (t, bits, _) in &tables {
            writeln!(w, "\treg\t\t[({bits}-1):0]\t{t} [0:((1<<LGTBL)-1)];")?;
        }
        writeln!(w, "\n\tinitial begin")?;
        for (t, _, suffix) in &tables {
            let file = readmem_name(&self.file_name, suffix);
            writeln!(w, "\t\t$readmemh(\"{file}\", {t});")?;
        }
        writeln!(w, "\tend")?;
        end_section(w)
    }

    fn stages<W: Write>(&self, w: &mut W) -> fmt::Result {
        let reset = self.cfg.reset;
        let quad = self.table.quadratic.is_some();
        let index = "i_phase[(PW-1):(DXBITS-1)]";

        if self.cfg.aux {
            section(w, "Aux tag")?;
            always(
                w,
                reset,
                &["aux"],
                Some("i_ce"),
                &["aux <= { aux[(NSTAGES-2):0], i_aux };".into()],
            )?;
            writeln!(w, "\tassign\to_aux = aux[(NSTAGES-1)];")?;
            end_section(w)?;
        }

        section(w, "Clock 1: coefficient lookup")?;
        let mut body = vec![];
        let mut zero = vec![];
        if quad {
            zero.push("qv");
            body.push(format!("qv <= qtbl[{index}];"));
        }
        zero.extend(["lv", "cv", "dx"]);
        body.extend([
            format!("lv <= ltbl[{index}];"),
            format!("cv <= ctbl[{index}];"),
            "dx <= { 1'b0, i_phase[(DXBITS-2):0] };".into(),
        ]);
        always(w, reset, &zero, Some("i_ce"), &body)?;
        end_section(w)?;

        writeln!(w, "\t// verilator lint_off WIDTH")?;
        if quad {
            writeln!(w, "\tassign\tw_qprod = qprod >>> (DXBITS-1);")?;
        }
        writeln!(w, "\tassign\tw_lprod = lprod >>> (DXBITS-1);")?;
        writeln!(w, "\t// verilator lint_on WIDTH\n")?;

        let c_last = if quad {
            section(w, "Clock 2: quadratic product")?;
            always(
                w,
                reset,
                &["qprod", "cv_1", "lv_1", "dx_1"],
                Some("i_ce"),
                &[
                    "qprod <= qv * dx;".into(),
                    "cv_1 <= cv;".into(),
                    "lv_1 <= lv;".into(),
                    "dx_1 <= dx;".into(),
                ],
            )?;
            end_section(w)?;

            section(w, "Clock 3: add the linear term")?;
            always(
                w,
                reset,
                &["lsum", "cv_2", "dx_2"],
                Some("i_ce"),
                &[
                    "lsum <= w_qprod + lv_1;".into(),
                    "cv_2 <= cv_1;".into(),
                    "dx_2 <= dx_1;".into(),
                ],
            )?;
            end_section(w)?;

            section(w, "Clock 4: linear product")?;
            always(
                w,
                reset,
                &["lprod", "cv_3"],
                Some("i_ce"),
                &["lprod <= lsum * dx_2;".into(), "cv_3 <= cv_2;".into()],
            )?;
            end_section(w)?;
            "cv_3"
        } else {
            section(w, "Clock 2: linear product")?;
            always(
                w,
                reset,
                &["lprod", "cv_1"],
                Some("i_ce"),
                &["lprod <= lv * dx;".into(), "cv_1 <= cv;".into()],
            )?;
            end_section(w)?;
            "cv_1"
        };

        let n = self.cfg.latency();
        section(w, &format!("Clock {}: add the constant", n - 1))?;
        always(
            w,
            reset,
            &["r_value"],
            Some("i_ce"),
            &[format!("r_value <= w_lprod + {c_last};")],
        )?;
        end_section(w)?;

        section(w, &format!("Clock {n}: round half to even"))?;
        let tail = if self.cfg.extra_bits > 1 {
            ", {(XTRA-1){!r_value[XTRA]}}"
        } else {
            ""
        };
        writeln!(w, "\talways @(*)")?;
        writeln!(w, "\tif ((!r_value[(WW-1)])&&(&r_value[(WW-2):XTRA]))")?;
        writeln!(w, "\t\tw_value = r_value; // Rounding up would overflow")?;
        writeln!(w, "\telse")?;
        writeln!(
            w,
            "\t\tw_value = r_value + {{ {{(OW){{1'b0}}}}, r_value[XTRA]{tail} }};\n"
        )?;
        always(
            w,
            reset,
            &["o_sin"],
            Some("i_ce"),
            &["o_sin <= w_value[(WW-1):XTRA];".into()],
        )?;
        writeln!(w, "\n\t// verilator lint_off UNUSED")?;
        writeln!(w, "\twire\tunused;")?;
        writeln!(w, "\tassign\tunused = &{{ 1'b0, w_value[(XTRA-1):0] }};")?;
        writeln!(w, "\t// verilator lint_on UNUSED")?;
        end_section(w)
    }
}

impl Verilog for SplineCore {
    fn write_module<W: Write>(&self, w: &mut W) -> fmt::Result {
        banner(
            w,
            &self.file_name,
            "Sine from a table of piecewise quadratic segments.\n\
             o_sin = (Q*dx + L)*dx + C, rounded to OW bits.",
        )?;
        let mut ports = vec![Port::input(&["i_phase"]).width("PW-1")];
        if self.cfg.aux {
            ports.push(Port::input(&["i_aux"]));
        }
        ports.push(Port::output(&["o_sin"]).signed().width("OW-1"));
        if self.cfg.aux {
            ports.push(Port::output(&["o_aux"]).wire());
        }
        module_head(
            w,
            &self.name,
            &self.params(),
            self.cfg.reset,
            &["i_ce"],
            &ports,
        )?;
        self.declarations(w)?;
        self.stages(w)?;
        writeln!(w, "endmodule")
    }
}
