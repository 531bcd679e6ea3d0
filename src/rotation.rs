//! Verilog for the rotation cores.
//!
//! One builder covers both CORDIC modes and both architectures. The
//! pre-reduction, the micro-rotation and the output rounding are rendered
//! by shared routines that take the register names of the architecture.

use core::fmt::{self, Write};

use crate::{
    Architecture, CordicMode, CoreConfiguration,
    angles::{AngleStorage, angle_table, emit_angles, literal},
    hdl::{
        Port, Verilog, always, always_init, banner, end_section, module_head, module_name,
        section, zeros,
    },
    solver::ceil_log2,
};

/// A rotation core ready to be rendered
#[derive(Clone, Debug)]
pub struct RotationCore {
    cfg: CoreConfiguration,
    name: String,
    file_name: String,
}

/// Register names of one architecture
struct Regs {
    /// Pre-reduced values
    pre: [&'static str; 3],
    /// Micro-rotation input
    cur: [&'static str; 3],
    /// Micro-rotation output
    next: [&'static str; 3],
    /// Shift and angle index
    index: &'static str,
}

const PIPELINED: Regs = Regs {
    pre: ["xv[0]", "yv[0]", "ph[0]"],
    cur: ["xv[i]", "yv[i]", "ph[i]"],
    next: ["xv[i+1]", "yv[i+1]", "ph[i+1]"],
    index: "i",
};

const ITERATIVE: Regs = Regs {
    pre: ["prex", "prey", "preph"],
    cur: ["xv", "yv", "ph"],
    next: ["xv", "yv", "ph"],
    index: "state",
};

impl RotationCore {
    /// Core for a resolved configuration, written to `file_name`
    pub fn new(cfg: &CoreConfiguration, file_name: &str) -> Self {
        Self {
            cfg: *cfg,
            name: module_name(file_name),
            file_name: file_name.into(),
        }
    }

    /// Verilog module name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn iterative(&self) -> bool {
        self.cfg.architecture() == Architecture::Iterative
    }

    fn vectoring(&self) -> bool {
        self.cfg.mode() == CordicMode::Vectoring
    }

    fn regs(&self) -> &'static Regs {
        if self.iterative() { &ITERATIVE } else { &PIPELINED }
    }

    /// Width of the iteration counter
    fn state_bits(&self) -> u32 {
        ceil_log2(self.cfg.stage_count() as u64 + 1).max(1)
    }

    fn purpose(&self) -> &'static str {
        match (self.cfg.mode(), self.cfg.architecture()) {
            (CordicMode::Rotate, Architecture::Pipelined) => {
                "Rotate (i_xval, i_yval) by i_phase, one result per clock.\n\
                 A phase of 2^PW is one full turn."
            }
            (CordicMode::Rotate, Architecture::Iterative) => {
                "Rotate (i_xval, i_yval) by i_phase, one micro-rotation\n\
                 per clock. o_done marks each result."
            }
            (CordicMode::Vectoring, Architecture::Pipelined) => {
                "Convert (i_xval, i_yval) to magnitude and phase,\n\
                 one result per clock."
            }
            (CordicMode::Vectoring, Architecture::Iterative) => {
                "Convert (i_xval, i_yval) to magnitude and phase, one\n\
                 micro-rotation per clock. o_done marks each result."
            }
        }
    }

    fn params(&self) -> Vec<(&'static str, u32, &'static str)> {
        let c = &self.cfg;
        let mut p = vec![
            ("IW", c.input_width(), "input bits"),
            ("OW", c.output_width(), "output bits"),
            ("NSTAGES", c.stage_count(), "micro-rotations"),
            ("WW", c.working_width(), "working bits"),
            ("PW", c.phase_bits(), "phase bits"),
        ];
        if self.iterative() {
            p.push(("SW", self.state_bits(), "iteration counter bits"));
        }
        p
    }

    fn ports(&self) -> Vec<Port> {
        let mut p = vec![Port::input(&["i_xval", "i_yval"]).signed().width("IW-1")];
        if !self.vectoring() {
            p.push(Port::input(&["i_phase"]).width("PW-1"));
        }
        if self.cfg.aux() {
            p.push(Port::input(&["i_aux"]));
        }
        if self.iterative() {
            p.push(Port::output(&["o_busy"]).wire());
            p.push(Port::output(&["o_done"]));
        }
        if self.vectoring() {
            p.push(Port::output(&["o_mag"]).width("OW-1"));
            p.push(Port::output(&["o_phase"]).width("PW-1"));
        } else {
            p.push(Port::output(&["o_xval", "o_yval"]).signed().width("OW-1"));
        }
        if self.cfg.aux() {
            p.push(Port::output(&["o_aux"]));
        }
        p
    }

    fn declarations<W: Write>(&self, w: &mut W) -> fmt::Result {
        section(w, "Register declarations")?;
        writeln!(w, "\twire\tsigned\t[(WW-1):0]\te_xval, e_yval;")?;
        if self.iterative() {
            writeln!(w, "\treg\tsigned\t[(WW-1):0]\tprex, prey, xv, yv;")?;
            writeln!(w, "\treg\t\t[(PW-1):0]\tpreph, ph;")?;
            writeln!(w, "\treg\t\t[(SW-1):0]\tstate;")?;
            writeln!(w, "\treg\t\t\tidle;")?;
            if self.cfg.aux() {
                writeln!(w, "\treg\t\t\taux;")?;
            }
        } else {
            writeln!(w, "\treg\tsigned\t[(WW-1):0]\txv\t[0:(NSTAGES)];")?;
            writeln!(w, "\treg\tsigned\t[(WW-1):0]\tyv\t[0:(NSTAGES)];")?;
            writeln!(w, "\treg\t\t[(PW-1):0]\tph\t[0:(NSTAGES)];")?;
            if self.cfg.aux() {
                writeln!(w, "\treg\t\t[(NSTAGES):0]\tax;")?;
            }
        }
        end_section(w)
    }

    /// Inputs placed in the working width, below the growth bits
    fn sign_extension<W: Write>(&self, w: &mut W) -> fmt::Result {
        let (iw, ww) = (self.cfg.input_width(), self.cfg.working_width());
        section(w, "Sign extension into the working width")?;
        for v in ["xval", "yval"] {
            if self.vectoring() {
                writeln!(
                    w,
                    "\tassign\te_{v} = {{ {{(2){{i_{v}[(IW-1)]}}}}, i_{v}{} }};",
                    zeros(ww - iw - 2)
                )?;
            } else {
                writeln!(
                    w,
                    "\tassign\te_{v} = {{ i_{v}[(IW-1)], i_{v}{} }};",
                    zeros(ww - iw - 1)
                )?;
            }
        }
        end_section(w)
    }

    /// Case statement reducing the input to within 45 degrees
    fn prerotation(&self, op: &str) -> Vec<String> {
        let [x, y, ph] = self.regs().pre;
        let pb = self.cfg.phase_bits();
        let (select, arms) = if self.vectoring() {
            let start = |eighths: u64| literal(eighths << (pb - 3), pb);
            (
                "{i_xval[(IW-1)], i_yval[(IW-1)]}",
                [
                    ("2'b01", "-90 .. 0", "e_xval - e_yval", "e_xval + e_yval", start(7)),
                    ("2'b10", "90 .. 180", "-e_xval + e_yval", "-e_xval - e_yval", start(3)),
                    ("2'b11", "-180 .. -90", "-e_xval - e_yval", "e_xval - e_yval", start(5)),
                    ("default", "0 .. 90", "e_xval + e_yval", "-e_xval + e_yval", start(1)),
                ],
            )
        } else {
            let minus =
                |quarters: u64| format!("i_phase - {}", literal(quarters << (pb - 2), pb));
            (
                "i_phase[(PW-1):(PW-3)]",
                [
                    ("3'b000, 3'b111", "-45 .. 45", "e_xval", "e_yval", "i_phase".into()),
                    ("3'b001, 3'b010", "45 .. 135", "-e_yval", "e_xval", minus(1)),
                    ("3'b011, 3'b100", "135 .. 225", "-e_xval", "-e_yval", minus(2)),
                    ("3'b101, 3'b110", "225 .. 315", "e_yval", "-e_xval", minus(3)),
                ],
            )
        };
        let mut lines = vec![format!("case({select})")];
        for (label, comment, vx, vy, vph) in arms {
            lines.push(format!("{label}: begin // {comment}"));
            lines.push(format!("\t{x} {op} {vx};"));
            lines.push(format!("\t{y} {op} {vy};"));
            lines.push(format!("\t{ph} {op} {vph};"));
            lines.push("\tend".into());
        }
        lines.push("endcase".into());
        lines
    }

    /// One micro-rotation, direction chosen by the residual
    fn micro_rotation(&self) -> Vec<String> {
        let Regs {
            cur: [x, y, ph],
            next: [nx, ny, nph],
            index: i,
            ..
        } = self.regs();
        let clockwise = if self.vectoring() {
            format!("!{y}[(WW-1)]")
        } else {
            format!("{ph}[(PW-1)]")
        };
        let turn = |sx: char, sy: char, sp: char| {
            [
                format!("\t{nx} <= {x} {sx} ({y}>>>({i}+1));"),
                format!("\t{ny} <= {y} {sy} ({x}>>>({i}+1));"),
                format!("\t{nph} <= {ph} {sp} cordic_angle[{i}];"),
            ]
        };
        let mut lines = vec![format!("if ({clockwise})"), "begin".into()];
        lines.extend(turn('+', '-', '+'));
        lines.push("end else begin".into());
        lines.extend(turn('-', '+', '-'));
        lines.push("end".into());
        lines
    }

    fn pipeline<W: Write>(&self, w: &mut W) -> fmt::Result {
        let reset = self.cfg.reset();
        if self.cfg.aux() {
            section(w, "Aux tag, aligned with the data through the pipeline")?;
            always(
                w,
                reset,
                &["ax"],
                Some("i_ce"),
                &["ax <= { ax[(NSTAGES-1):0], i_aux };".into()],
            )?;
            end_section(w)?;
        }

        section(w, "Quadrant pre-reduction")?;
        always(w, reset, &PIPELINED.pre, Some("i_ce"), &self.prerotation("<="))?;
        end_section(w)?;

        emit_angles(
            w,
            &angle_table(self.cfg.stage_count(), self.cfg.phase_bits()),
            self.cfg.phase_bits(),
            AngleStorage::Wires,
        )?;
        writeln!(w)?;

        section(w, "Micro-rotations")?;
        writeln!(w, "\tgenvar\ti;")?;
        writeln!(w, "\tgenerate for(i=0; i<NSTAGES; i=i+1)")?;
        writeln!(w, "\tbegin : CORDIC_STAGES")?;
        let mut body = vec![
            "if ((cordic_angle[i] == 0)||(i >= WW))".into(),
            "begin // Angles have vanished, pass through".into(),
            "\txv[i+1] <= xv[i];".into(),
            "\tyv[i+1] <= yv[i];".into(),
            "\tph[i+1] <= ph[i];".into(),
        ];
        let mut rotation = self.micro_rotation();
        rotation[0] = format!("end else {}", rotation[0]);
        body.extend(rotation);
        always(w, reset, &PIPELINED.next, Some("i_ce"), &body)?;
        writeln!(w, "\tend endgenerate")?;
        end_section(w)
    }

    fn iteration<W: Write>(&self, w: &mut W) -> fmt::Result {
        let reset = self.cfg.reset();
        let aux = self.cfg.aux();

        section(w, "Quadrant pre-reduction")?;
        writeln!(w, "\talways @(*)")?;
        writeln!(w, "\tbegin")?;
        for line in self.prerotation("=") {
            writeln!(w, "\t\t{line}")?;
        }
        writeln!(w, "\tend")?;
        end_section(w)?;

        emit_angles(
            w,
            &angle_table(self.cfg.stage_count(), self.cfg.phase_bits()),
            self.cfg.phase_bits(),
            AngleStorage::Memory,
        )?;
        writeln!(w)?;

        section(w, "Iteration state machine")?;
        let mut init = vec![
            ("idle", "1'b1"),
            ("state", "0"),
            ("xv", "0"),
            ("yv", "0"),
            ("ph", "0"),
        ];
        if aux {
            init.push(("aux", "1'b0"));
        }
        let mut body: Vec<String> = vec![
            "if (idle)".into(),
            "begin".into(),
            "\tif (i_stb)".into(),
            "\tbegin".into(),
            "\t\txv <= prex;".into(),
            "\t\tyv <= prey;".into(),
            "\t\tph <= preph;".into(),
        ];
        if aux {
            body.push("\t\taux <= i_aux;".into());
        }
        body.extend([
            "\t\tstate <= 0;".into(),
            "\t\tidle <= 1'b0;".into(),
            "\tend".into(),
            "end else if (state == NSTAGES)".into(),
            "\tidle <= 1'b1;".into(),
            "else begin".into(),
            "\tstate <= state + 1;".into(),
            "\tif ((cordic_angle[state] != 0)&&(state < WW))".into(),
            "\tbegin".into(),
        ]);
        body.extend(self.micro_rotation().into_iter().map(|l| format!("\t\t{l}")));
        body.extend(["\tend".into(), "end".into()]);
        always_init(w, reset, &init, None, &body)?;
        writeln!(w)?;
        writeln!(w, "\tassign\to_busy = !idle;")?;
        end_section(w)
    }

    /// Round half to even down to the output width
    ///
    /// The working width always exceeds the output width by at least the
    /// extra bits.
    fn rounding<W: Write>(&self, w: &mut W) -> fmt::Result {
        let d = self.cfg.working_width() - self.cfg.output_width();
        let src = |v: &str| {
            if self.iterative() {
                v.to_string()
            } else {
                format!("{v}[NSTAGES]")
            }
        };
        let names: &[&str] = if self.vectoring() { &["x"] } else { &["x", "y"] };
        section(w, "Round towards even")?;
        for v in names {
            let r = src(&format!("{v}v"));
            let tail = if d > 1 {
                format!(",\n\t\t\t{{(WW-OW-1){{!{r}[(WW-OW)]}}}}")
            } else {
                String::new()
            };
            writeln!(w, "\twire\tsigned\t[(WW-1):0]\tpre_{v}val;")?;
            writeln!(w, "\tassign\tpre_{v}val = {r} + $signed({{ {{(OW){{1'b0}}}},")?;
            writeln!(w, "\t\t\t{r}[(WW-OW)]{tail} }});")?;
        }
        writeln!(w)?;
        writeln!(w, "\t// verilator lint_off UNUSED")?;
        writeln!(w, "\twire\tunused_val;")?;
        let low: Vec<_> = names
            .iter()
            .map(|v| format!("pre_{v}val[(WW-OW-1):0]"))
            .collect();
        writeln!(w, "\tassign\tunused_val = &{{ 1'b0, {} }};", low.join(", "))?;
        writeln!(w, "\t// verilator lint_on UNUSED")?;
        end_section(w)
    }

    fn outputs<W: Write>(&self, w: &mut W) -> fmt::Result {
        let reset = self.cfg.reset();
        let aux = self.cfg.aux();
        let mut zero = vec![];
        let mut assign = vec![];
        if self.vectoring() {
            zero.extend(["o_mag", "o_phase"]);
            assign.push("o_mag <= pre_xval[(WW-1):(WW-OW)];".to_string());
            let ph = if self.iterative() { "ph" } else { "ph[NSTAGES]" };
            assign.push(format!("o_phase <= {ph};"));
        } else {
            zero.extend(["o_xval", "o_yval"]);
            assign.push("o_xval <= pre_xval[(WW-1):(WW-OW)];".into());
            assign.push("o_yval <= pre_yval[(WW-1):(WW-OW)];".into());
        }
        if aux {
            zero.push("o_aux");
            let tag = if self.iterative() { "aux" } else { "ax[NSTAGES]" };
            assign.push(format!("o_aux <= {tag};"));
        }
        section(w, "Output registers")?;
        if self.iterative() {
            zero.insert(0, "o_done");
            let mut body = vec![
                "o_done <= 1'b0;".to_string(),
                "if (!idle && (state == NSTAGES))".into(),
                "begin".into(),
                "\to_done <= 1'b1;".into(),
            ];
            body.extend(assign.into_iter().map(|l| format!("\t{l}")));
            body.push("end".into());
            always(w, reset, &zero, None, &body)?;
        } else {
            always(w, reset, &zero, Some("i_ce"), &assign)?;
        }
        end_section(w)
    }
}

impl Verilog for RotationCore {
    fn write_module<W: Write>(&self, w: &mut W) -> fmt::Result {
        banner(w, &self.file_name, self.purpose())?;
        let control = if self.iterative() { "i_stb" } else { "i_ce" };
        module_head(
            w,
            &self.name,
            &self.params(),
            self.cfg.reset(),
            &[control],
            &self.ports(),
        )?;
        self.declarations(w)?;
        self.sign_extension(w)?;
        if self.iterative() {
            self.iteration(w)?;
        } else {
            self.pipeline(w)?;
        }
        self.rounding(w)?;
        self.outputs(w)?;
        writeln!(w, "endmodule")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{GenerationRequest, Mode, ResetPolicy};

    fn text(mode: Mode, reset: ResetPolicy, aux: bool) -> String {
        let req = GenerationRequest::new(mode)
            .input_width(12)
            .output_width(10)
            .reset(reset)
            .aux(aux);
        let cfg = CoreConfiguration::resolve(&req).unwrap();
        RotationCore::new(&cfg, mode.default_file_name())
            .module_text()
            .unwrap()
    }

    #[test]
    fn ports() {
        let s = text(Mode::Rotate, ResetPolicy::Sync, true);
        log::debug!("{s}");
        assert!(s.contains("module\tcordic #("));
        assert!(s.contains("i_clk, i_reset, i_ce,\n"));
        assert!(s.contains("i_phase"));
        assert!(s.contains("o_xval, o_yval"));
        assert!(s.contains("ax <= { ax[(NSTAGES-1):0], i_aux };"));
        assert!(s.contains("o_aux <= ax[NSTAGES];"));
        assert!(!s.contains("o_done"));

        let s = text(Mode::SequentialVectoring, ResetPolicy::Async, false);
        assert!(s.contains("module\tseqpolar #("));
        assert!(s.contains("i_clk, i_areset_n, i_stb,\n"));
        assert!(s.contains("o_mag"));
        assert!(s.contains("o_phase <= ph;"));
        assert!(s.contains("output\twire\t\t\t\to_busy"));
        assert!(s.contains("o_done <= 1'b1;"));
        assert!(s.contains("SW= 5"));
        assert!(!s.contains("i_phase"));
        assert!(!s.contains("aux"));
        assert!(!s.contains("i_ce"));
    }

    #[test]
    fn without_reset() {
        for mode in [
            Mode::Rotate,
            Mode::SequentialRotate,
            Mode::Vectoring,
            Mode::SequentialVectoring,
        ] {
            let s = text(mode, ResetPolicy::None, true);
            assert!(!s.contains("reset"), "{mode:?}");
            assert!(s.contains("endmodule"));
        }
    }

    #[test]
    fn storage_and_extension() {
        let s = text(Mode::Rotate, ResetPolicy::Sync, false);
        // WW = 12 + 3, one growth bit above the input
        assert!(s.contains("assign\te_xval = { i_xval[(IW-1)], i_xval, {(2){1'b0}} };"));
        assert!(s.contains("\tassign\tcordic_angle[ 0] = "));
        assert!(s.contains("generate for(i=0; i<NSTAGES; i=i+1)"));

        let s = text(Mode::SequentialVectoring, ResetPolicy::Sync, false);
        // WW = 12 + 3 + 1, two growth bits
        assert!(s.contains("assign\te_xval = { {(2){i_xval[(IW-1)]}}, i_xval, {(2){1'b0}} };"));
        assert!(s.contains("\tinitial\tcordic_angle[ 0] = "));
        assert!(s.contains("always @(*)"));
        assert!(s.contains("prex = e_xval + e_yval;"));
    }

    #[test]
    fn single_dropped_bit() {
        // WW - OW = 1: the addend is the kept LSB alone
        let req = GenerationRequest::new(Mode::Rotate)
            .input_width(8)
            .output_width(8)
            .extra_bits(1);
        let cfg = CoreConfiguration::resolve(&req).unwrap();
        let s = RotationCore::new(&cfg, "r.v").module_text().unwrap();
        assert!(s.contains("xv[NSTAGES][(WW-OW)] });"));
        assert!(!s.contains("(WW-OW-1){"));
    }
}
