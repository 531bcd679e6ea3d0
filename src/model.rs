//! Bit-accurate, cycle-accurate models of the emitted rotation cores.
//!
//! Each model holds exactly the registers of the Verilog it mirrors and
//! advances them once per [`Clocked::clock()`] call.

use crate::{
    CordicMode, CoreConfiguration,
    angles::angle_table,
    fixed::{mask, round_half_even, wrap},
};

/// A synchronous block advanced one clock edge at a time
pub trait Clocked<X: Copy, Y = X> {
    /// Apply the inputs, clock the registers and return the registered
    /// outputs after the edge.
    fn clock(&mut self, x: X) -> Y;

    /// Return every register to its reset value
    fn reset(&mut self);

    /// Clock a block of inputs into a block of outputs
    ///
    /// Input and output must be of the same size.
    fn block(&mut self, x: &[X], y: &mut [Y]) {
        debug_assert_eq!(x.len(), y.len());
        for (x, y) in x.iter().zip(y) {
            *y = self.clock(*x);
        }
    }
}

/// One input sample
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    /// `i_xval`, truncated to the input width
    pub x: i64,
    /// `i_yval`
    pub y: i64,
    /// `i_phase`, rotate mode only
    pub phase: u64,
    /// `i_aux`
    pub aux: bool,
}

/// Output of a rotation core
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// `o_xval`, `o_yval`
    Rect { x: i64, y: i64 },
    /// `o_mag`, `o_phase`
    Polar { mag: u64, phase: u64 },
}

/// Registered outputs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// Data outputs
    pub value: Value,
    /// `o_aux`
    pub aux: bool,
}

/// Outputs of the iterative core
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Strobed {
    /// `o_busy`
    pub busy: bool,
    /// `o_done`, high for one clock per result
    pub done: bool,
    /// Result registers, held until the next result
    pub output: Output,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Reg {
    x: i64,
    y: i64,
    ph: u64,
}

/// The arithmetic shared by both architectures
#[derive(Clone, Debug)]
pub struct Datapath {
    iw: u32,
    ow: u32,
    ww: u32,
    pb: u32,
    mode: CordicMode,
    angles: Vec<u64>,
}

impl Datapath {
    /// Datapath of a resolved configuration
    pub fn new(cfg: &CoreConfiguration) -> Self {
        Self {
            iw: cfg.input_width(),
            ow: cfg.output_width(),
            ww: cfg.working_width(),
            pb: cfg.phase_bits(),
            mode: cfg.mode(),
            angles: angle_table(cfg.stage_count(), cfg.phase_bits())
                .iter()
                .map(|a| a.phase_units)
                .collect(),
        }
    }

    fn stages(&self) -> usize {
        self.angles.len()
    }

    fn w(&self, v: i64) -> i64 {
        wrap(v, self.ww)
    }

    fn p(&self, ph: u64) -> u64 {
        mask(ph, self.pb)
    }

    /// Sign extension into the working width and quadrant pre-reduction
    fn prerotate(&self, s: &Sample) -> Reg {
        let (x, y) = (wrap(s.x, self.iw), wrap(s.y, self.iw));
        match self.mode {
            CordicMode::Rotate => {
                let sh = self.ww - self.iw - 1;
                let (ex, ey) = (x << sh, y << sh);
                let ph = self.p(s.phase);
                let q = 1u64 << (self.pb - 2);
                let (x, y, turn) = match ph >> (self.pb - 3) {
                    0b001 | 0b010 => (-ey, ex, q),
                    0b011 | 0b100 => (-ex, -ey, 2 * q),
                    0b101 | 0b110 => (ey, -ex, 3 * q),
                    _ => (ex, ey, 0),
                };
                Reg {
                    x: self.w(x),
                    y: self.w(y),
                    ph: self.p(ph.wrapping_sub(turn)),
                }
            }
            CordicMode::Vectoring => {
                let sh = self.ww - self.iw - 2;
                let (ex, ey) = (x << sh, y << sh);
                let (x, y, eighths) = match (x < 0, y < 0) {
                    (false, true) => (ex - ey, ex + ey, 7),
                    (true, false) => (-ex + ey, -ex - ey, 3),
                    (true, true) => (-ex - ey, ex - ey, 5),
                    (false, false) => (ex + ey, -ex + ey, 1),
                };
                Reg {
                    x: self.w(x),
                    y: self.w(y),
                    ph: self.p(eighths << (self.pb - 3)),
                }
            }
        }
    }

    /// Micro-rotation `i`, shifting by `i + 1`
    fn micro_rotate(&self, r: Reg, i: usize) -> Reg {
        let a = self.angles[i];
        if a == 0 || i as u32 >= self.ww {
            return r;
        }
        let s = i as u32 + 1;
        let (dx, dy) = (r.y >> s, r.x >> s);
        // Rotate follows the residual phase sign, vectoring the y sign
        let clockwise = match self.mode {
            CordicMode::Rotate => r.ph >> (self.pb - 1) & 1 != 0,
            CordicMode::Vectoring => r.y >= 0,
        };
        let (x, y, ph) = if clockwise {
            (r.x + dx, r.y - dy, r.ph.wrapping_add(a))
        } else {
            (r.x - dx, r.y + dy, r.ph.wrapping_sub(a))
        };
        Reg {
            x: self.w(x),
            y: self.w(y),
            ph: self.p(ph),
        }
    }

    /// Output rounding
    fn finish(&self, r: &Reg) -> Value {
        let d = self.ww - self.ow;
        match self.mode {
            CordicMode::Rotate => Value::Rect {
                x: round_half_even(r.x, self.ww, d),
                y: round_half_even(r.y, self.ww, d),
            },
            CordicMode::Vectoring => Value::Polar {
                mag: mask(round_half_even(r.x, self.ww, d) as u64, self.ow),
                phase: r.ph,
            },
        }
    }

    /// Output register contents after reset
    fn zero(&self) -> Output {
        let value = match self.mode {
            CordicMode::Rotate => Value::Rect { x: 0, y: 0 },
            CordicMode::Vectoring => Value::Polar { mag: 0, phase: 0 },
        };
        Output { value, aux: false }
    }

    /// Combinational reference: all micro-rotations applied at once
    pub fn evaluate(&self, s: &Sample) -> Value {
        let r = (0..self.stages()).fold(self.prerotate(s), |r, i| self.micro_rotate(r, i));
        self.finish(&r)
    }
}

/// Pipelined core: one register stage per micro-rotation
///
/// `clock(None)` models `i_ce` low.
#[derive(Clone, Debug)]
pub struct PipelinedCore {
    dp: Datapath,
    stages: Vec<Reg>,
    ax: u128,
    out: Output,
}

impl PipelinedCore {
    /// Model of the core emitted for `cfg`
    pub fn new(cfg: &CoreConfiguration) -> Self {
        let dp = Datapath::new(cfg);
        Self {
            stages: vec![Reg::default(); dp.stages() + 1],
            ax: 0,
            out: dp.zero(),
            dp,
        }
    }
}

impl Clocked<Option<Sample>, Output> for PipelinedCore {
    fn clock(&mut self, x: Option<Sample>) -> Output {
        let Some(s) = x else {
            return self.out;
        };
        let n = self.dp.stages();
        self.out = Output {
            value: self.dp.finish(&self.stages[n]),
            aux: self.ax >> n & 1 != 0,
        };
        for i in (0..n).rev() {
            self.stages[i + 1] = self.dp.micro_rotate(self.stages[i], i);
        }
        self.stages[0] = self.dp.prerotate(&s);
        self.ax = ((self.ax << 1) | s.aux as u128) & ((1 << (n + 1)) - 1);
        self.out
    }

    fn reset(&mut self) {
        self.stages.fill(Reg::default());
        self.ax = 0;
        self.out = self.dp.zero();
    }
}

/// Iterative core: one micro-rotation per clock on a single register set
///
/// `clock(Some(_))` models `i_stb` high. Strobes while busy are ignored.
#[derive(Clone, Debug)]
pub struct IterativeCore {
    dp: Datapath,
    idle: bool,
    state: usize,
    reg: Reg,
    aux: bool,
    done: bool,
    out: Output,
}

impl IterativeCore {
    /// Model of the core emitted for `cfg`
    pub fn new(cfg: &CoreConfiguration) -> Self {
        let dp = Datapath::new(cfg);
        Self {
            idle: true,
            state: 0,
            reg: Reg::default(),
            aux: false,
            done: false,
            out: dp.zero(),
            dp,
        }
    }
}

impl Clocked<Option<Sample>, Strobed> for IterativeCore {
    fn clock(&mut self, x: Option<Sample>) -> Strobed {
        self.done = false;
        if self.idle {
            if let Some(s) = x {
                self.reg = self.dp.prerotate(&s);
                self.aux = s.aux;
                self.state = 0;
                self.idle = false;
            }
        } else if self.state == self.dp.stages() {
            self.out = Output {
                value: self.dp.finish(&self.reg),
                aux: self.aux,
            };
            self.done = true;
            self.idle = true;
        } else {
            self.reg = self.dp.micro_rotate(self.reg, self.state);
            self.state += 1;
        }
        Strobed {
            busy: !self.idle,
            done: self.done,
            output: self.out,
        }
    }

    fn reset(&mut self) {
        self.idle = true;
        self.state = 0;
        self.reg = Reg::default();
        self.aux = false;
        self.done = false;
        self.out = self.dp.zero();
    }
}

/// A phase word for the sine generators
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Phase {
    /// `i_phase`
    pub phase: u64,
    /// `i_aux`
    pub aux: bool,
}

/// A sine generator output
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tagged {
    /// `o_val` or `o_sin`
    pub value: i64,
    /// `o_aux`
    pub aux: bool,
}

/// Feed-forward core: a combinational function of the phase followed by
/// `latency` register stages, all cleared by reset.
///
/// Exact for cores whose cleared registers evaluate to zero downstream.
#[derive(Clone, Debug)]
pub struct Pipeline<F> {
    f: F,
    line: Vec<Tagged>,
}

impl<F: Fn(u64) -> i64> Pipeline<F> {
    /// `latency >= 1`
    pub fn new(f: F, latency: usize) -> Self {
        debug_assert!(latency >= 1);
        Self {
            f,
            line: vec![Tagged::default(); latency],
        }
    }
}

impl<F: Fn(u64) -> i64> Clocked<Option<Phase>, Tagged> for Pipeline<F> {
    fn clock(&mut self, x: Option<Phase>) -> Tagged {
        if let Some(p) = x {
            self.line.rotate_right(1);
            self.line[0] = Tagged {
                value: (self.f)(p.phase),
                aux: p.aux,
            };
        }
        self.line[self.line.len() - 1]
    }

    fn reset(&mut self) {
        self.line.fill(Tagged::default());
    }
}
