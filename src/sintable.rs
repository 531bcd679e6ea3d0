//! Plain sine table lookup
//!
//! The direct table stores a full turn and answers in one clock. The
//! quarter wave table stores the first quadrant only, sampled half an
//! address off the origin so that mirroring needs no offset, and answers
//! in three clocks.

use core::f64::consts::PI;
use core::fmt::{self, Write};

use crate::{
    HexTable, TableConfiguration, TableError,
    fixed::{bit, mask, wrap},
    hdl::{
        Port, Verilog, always, always_init, banner, end_section, module_head, module_name,
        readmem_name, section, table_path,
    },
    model::{Clocked, Phase, Tagged},
};

/// A direct or quarter wave sine table core
#[derive(Clone, Debug)]
pub struct SineTable {
    cfg: TableConfiguration,
    data: Vec<i64>,
    name: String,
    file_name: String,
}

impl SineTable {
    /// Build the table and name the module after `file_name`
    pub fn new(cfg: &TableConfiguration, file_name: &str) -> Self {
        let n = 1u64 << cfg.phase_bits;
        let maxv = ((1i64 << (cfg.output_width - 1)) - 1) as f64;
        let (entries, offset) = if cfg.quarter_wave {
            (n / 4, 0.5)
        } else {
            (n, 0.0)
        };
        let data = (0..entries)
            .map(|k| (maxv * (2.0 * PI * (k as f64 + offset) / n as f64).sin()) as i64)
            .collect();
        Self {
            cfg: *cfg,
            data,
            name: module_name(file_name),
            file_name: file_name.into(),
        }
    }

    /// Verilog module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored entries
    pub fn data(&self) -> &[i64] {
        &self.data
    }

    /// `$readmemh` contents
    pub fn hex_table(&self) -> Result<HexTable, TableError> {
        HexTable::new(
            table_path(&self.file_name, ""),
            self.cfg.output_width,
            self.data.clone(),
        )
    }

    fn quarter_index(&self, phase: u64) -> usize {
        let low = mask(phase, self.cfg.phase_bits - 2);
        let index = if bit(phase as i64, self.cfg.phase_bits - 2) {
            mask(!low, self.cfg.phase_bits - 2)
        } else {
            low
        };
        index as usize
    }

    /// Steady state `o_val` for one phase word
    pub fn evaluate(&self, phase: u64) -> i64 {
        let phase = mask(phase, self.cfg.phase_bits);
        if !self.cfg.quarter_wave {
            return self.data[phase as usize];
        }
        let v = self.data[self.quarter_index(phase)];
        if bit(phase as i64, self.cfg.phase_bits - 1) {
            wrap(-v, self.cfg.output_width)
        } else {
            v
        }
    }

    /// Clocked model of the emitted core, in its reset state
    pub fn model(&self) -> TableModel<'_> {
        TableModel {
            table: self,
            index: 0,
            negate: [false; 2],
            value: 0,
            aux: [false; 2],
            out: Tagged::default(),
        }
    }

    fn params(&self) -> [(&'static str, u32, &'static str); 2] {
        [
            ("PW", self.cfg.phase_bits, "bits in the input phase"),
            ("OW", self.cfg.output_width, "output bits"),
        ]
    }

    fn ports(&self) -> Vec<Port> {
        let mut ports = vec![Port::input(&["i_phase"]).width("PW-1")];
        if self.cfg.aux {
            ports.push(Port::input(&["i_aux"]));
        }
        ports.push(Port::output(&["o_val"]).signed().width("OW-1"));
        if self.cfg.aux {
            ports.push(Port::output(&["o_aux"]));
        }
        ports
    }

    fn direct<W: Write>(&self, w: &mut W) -> fmt::Result {
        let reset = self.cfg.reset;
        section(w, "Declarations")?;
        writeln!(w, "\treg\t[(OW-1):0]\ttbl\t[0:((1<<PW)-1)];")?;
        end_section(w)?;
        let file = readmem_name(&self.file_name, "");
        writeln!(w, "\tinitial\t$readmemh(\"{file}\", tbl);\n")?;

        section(w, "o_val")?;
        always(w, reset, &["o_val"], Some("i_ce"), &["o_val <= tbl[i_phase];".into()])?;
        end_section(w)?;

        if self.cfg.aux {
            section(w, "o_aux")?;
            always(w, reset, &["o_aux"], Some("i_ce"), &["o_aux <= i_aux;".into()])?;
            end_section(w)?;
        }
        Ok(())
    }

    fn quarter<W: Write>(&self, w: &mut W) -> fmt::Result {
        let reset = self.cfg.reset;
        section(w, "Declarations")?;
        writeln!(
            w,
            "\treg\t[(OW-1):0]\tquartertable\t[0:((1<<(PW-2))-1)];\n"
        )?;
        let file = readmem_name(&self.file_name, "");
        writeln!(w, "\tinitial\t$readmemh(\"{file}\", quartertable);\n")?;
        writeln!(w, "\treg\t[1:0]\t\tnegate;")?;
        writeln!(w, "\treg\t[(PW-3):0]\tindex;")?;
        writeln!(w, "\treg\t[(OW-1):0]\ttblvalue;")?;
        if self.cfg.aux {
            writeln!(w, "\treg\t[1:0]\t\taux;")?;
        }
        end_section(w)?;

        section(w, "negate, index, tblvalue, o_val")?;
        always_init(
            w,
            reset,
            &[
                ("negate", "2'b00"),
                ("index", "0"),
                ("tblvalue", "0"),
                ("o_val", "0"),
            ],
            Some("i_ce"),
            &[
                "// Clock 1: fold the phase into the first quadrant".into(),
                "negate[0] <= i_phase[(PW-1)];".into(),
                "if (i_phase[(PW-2)])".into(),
                "\tindex <= ~i_phase[(PW-3):0];".into(),
                "else".into(),
                "\tindex <=  i_phase[(PW-3):0];".into(),
                "// Clock 2: lookup".into(),
                "tblvalue <= quartertable[index];".into(),
                "negate[1] <= negate[0];".into(),
                "// Clock 3: restore the sign".into(),
                "if (negate[1])".into(),
                "\to_val <= -tblvalue;".into(),
                "else".into(),
                "\to_val <=  tblvalue;".into(),
            ],
        )?;
        end_section(w)?;

        if self.cfg.aux {
            section(w, "aux, o_aux")?;
            always(
                w,
                reset,
                &["{ o_aux, aux }"],
                Some("i_ce"),
                &["{ o_aux, aux } <= { aux, i_aux };".into()],
            )?;
            end_section(w)?;
        }
        Ok(())
    }
}

impl Verilog for SineTable {
    fn write_module<W: Write>(&self, w: &mut W) -> fmt::Result {
        let purpose = if self.cfg.quarter_wave {
            "Sine wave lookup from a quarter wave table.\n\
             Symmetry folds the phase into the first quadrant so the\n\
             table holds a fourth of a turn. Three clocks of latency."
        } else {
            "Sine wave lookup from a full turn table.\n\
             The lowest latency sine generator: one clock."
        };
        banner(w, &self.file_name, purpose)?;
        module_head(
            w,
            &self.name,
            &self.params(),
            self.cfg.reset,
            &["i_ce"],
            &self.ports(),
        )?;
        if self.cfg.quarter_wave {
            self.quarter(w)?;
        } else {
            self.direct(w)?;
        }
        writeln!(w, "endmodule")
    }
}

/// Register level model of a [`SineTable`] core
///
/// The quarter wave core clears its index on reset, so the second output
/// after a reset is the table entry at address zero rather than zero.
#[derive(Clone, Debug)]
pub struct TableModel<'a> {
    table: &'a SineTable,
    index: usize,
    negate: [bool; 2],
    value: i64,
    aux: [bool; 2],
    out: Tagged,
}

impl Clocked<Option<Phase>, Tagged> for TableModel<'_> {
    fn clock(&mut self, x: Option<Phase>) -> Tagged {
        let Some(p) = x else {
            return self.out;
        };
        let cfg = &self.table.cfg;
        if !cfg.quarter_wave {
            self.out = Tagged {
                value: self.table.evaluate(p.phase),
                aux: p.aux,
            };
            return self.out;
        }
        let value = if self.negate[1] {
            wrap(-self.value, cfg.output_width)
        } else {
            self.value
        };
        self.out = Tagged {
            value,
            aux: self.aux[1],
        };
        self.value = self.table.data[self.index];
        self.negate = [bit(p.phase as i64, cfg.phase_bits - 1), self.negate[0]];
        self.index = self.table.quarter_index(p.phase);
        self.aux = [p.aux, self.aux[0]];
        self.out
    }

    fn reset(&mut self) {
        *self = self.table.model();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{GenerationRequest, Mode, ResetPolicy};
    use quickcheck_macros::quickcheck;

    fn table(mode: Mode, ow: u32, pb: u32) -> SineTable {
        let cfg = TableConfiguration::resolve(
            &GenerationRequest::new(mode)
                .output_width(ow)
                .phase_bits(pb)
                .aux(true),
        )
        .unwrap();
        SineTable::new(&cfg, mode.default_file_name())
    }

    #[test]
    fn direct_entries() {
        let t = table(Mode::SineTable, 8, 6);
        assert_eq!(t.data().len(), 64);
        assert_eq!(t.data()[0], 0);
        assert_eq!(t.data()[16], 127);
        assert_eq!(t.data()[48], -127);
        // sin(pi/4) * 127 = 89.8 truncates
        assert_eq!(t.data()[8], 89);
        assert_eq!(t.data()[40], -89);
        let hex = t.hex_table().unwrap();
        assert_eq!(hex.path(), "sintable.hex");
        assert!(hex.to_string().starts_with("@00000000 00 0c 18 24 "));
    }

    #[test]
    fn quarter_entries() {
        let t = table(Mode::QuarterWave, 8, 6);
        assert_eq!(t.data().len(), 16);
        assert!(t.data().iter().all(|v| (1..=127).contains(v)));
        assert!(t.data().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(t.hex_table().unwrap().path(), "quarterwav.hex");
    }

    #[quickcheck]
    fn quarter_symmetry(p: u16) -> bool {
        let t = table(Mode::QuarterWave, 12, 10);
        let (n, p) = (1u64 << 10, p as u64 % (1 << 9));
        t.evaluate(p) == t.evaluate(n / 2 - 1 - p) && t.evaluate(p + n / 2) == -t.evaluate(p)
    }

    #[test]
    fn quarter_accuracy() {
        let t = table(Mode::QuarterWave, 12, 10);
        let n = 1u64 << 10;
        let worst = (0..n)
            .map(|p| {
                let ideal = 2047.0 * (2.0 * PI * (p as f64 + 0.5) / n as f64).sin();
                (t.evaluate(p) as f64 - ideal).abs()
            })
            .fold(0.0, f64::max);
        assert!(worst < 1.0);
    }

    fn run(t: &SineTable, phases: &[u64]) -> Vec<Tagged> {
        let mut m = t.model();
        phases
            .iter()
            .enumerate()
            .map(|(k, &phase)| {
                m.clock(Some(Phase {
                    phase,
                    aux: k == 0,
                }))
            })
            .collect()
    }

    #[test]
    fn latency() {
        let phases: Vec<u64> = (0..12).map(|k| (k * 37 + 5) % 64).collect();
        for (mode, n) in [(Mode::SineTable, 1), (Mode::QuarterWave, 3)] {
            let t = table(mode, 8, 6);
            let out = run(&t, &phases);
            for k in n - 1..phases.len() {
                assert_eq!(out[k].value, t.evaluate(phases[k + 1 - n]));
            }
            assert!(out.iter().enumerate().all(|(k, o)| o.aux == (k == n - 1)));
        }
    }

    #[test]
    fn quarter_reset_transient() {
        let t = table(Mode::QuarterWave, 8, 6);
        let mut m = t.model();
        let first = [0, 0].map(|_| m.clock(Some(Phase::default())).value);
        assert_eq!(first, [0, t.data()[0]]);
        let held = m.clock(None);
        assert_eq!(m.clock(None), held);
        m.reset();
        assert_eq!(m.clock(None), Tagged::default());
    }

    #[test]
    fn emission() {
        let t = table(Mode::QuarterWave, 8, 6);
        let s = t.module_text().unwrap();
        assert!(s.contains("module\tquarterwav #("));
        assert!(s.contains("$readmemh(\"quarterwav.hex\", quartertable);"));
        assert!(s.contains("\t\tnegate <= 2'b00;\n"));
        assert!(s.contains("\t\t\tindex <= ~i_phase[(PW-3):0];\n"));
        assert!(s.contains("{ o_aux, aux } <= { aux, i_aux };"));
        assert!(s.contains("output\treg\tsigned\t[(OW-1):0]\to_val,\n"));

        let cfg = TableConfiguration::resolve(
            &GenerationRequest::new(Mode::SineTable)
                .output_width(8)
                .reset(ResetPolicy::None)
                .file_name("rtl/sin.v"),
        )
        .unwrap();
        let t = SineTable::new(&cfg, "rtl/sin.v");
        let s = t.module_text().unwrap();
        assert!(!s.contains("reset"));
        assert!(!s.contains("aux"));
        assert!(s.contains("$readmemh(\"sin.hex\", tbl);"));
        assert!(s.contains("o_val <= tbl[i_phase];"));
        assert_eq!(t.hex_table().unwrap().path(), "rtl/sin.hex");
    }
}
