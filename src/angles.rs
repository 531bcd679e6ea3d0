use core::fmt::Write;

use serde::Serialize;

use crate::solver::{ceil_log2, gain, phase_variance, stage_angle};

/// One micro-rotation angle constant
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct StageAngle {
    /// Stage index `k`, the stage shifts by `k + 1`
    pub index: u32,
    /// `atan(2^-(k+1))` in phase units, truncated
    pub phase_units: u64,
    /// The exact angle in degrees
    pub degrees: f64,
}

/// Angle constants for `nstages` micro-rotations at `phase_bits` resolution.
///
/// Non-increasing. Entries past the resolution of the phase accumulator
/// truncate to zero.
pub fn angle_table(nstages: u32, phase_bits: u32) -> Vec<StageAngle> {
    (0..nstages)
        .map(|index| StageAngle {
            index,
            phase_units: stage_angle(index, phase_bits) as u64,
            degrees: 1f64.atan2(2f64.powi(index as i32 + 1)).to_degrees(),
        })
        .collect()
}

/// Verilog sized hex literal, `_` separated every 16 bits
pub(crate) fn literal(value: u64, bits: u32) -> String {
    let digits = bits.div_ceil(4) as usize;
    let hex = format!("{value:0digits$x}");
    let mut groups = Vec::new();
    let mut end = hex.len();
    while end > 4 {
        groups.push(&hex[end - 4..end]);
        end -= 4;
    }
    groups.push(&hex[..end]);
    groups.reverse();
    if bits <= 16 {
        format!("{bits}'h{hex}")
    } else {
        format!("{bits}'h{}", groups.join("_"))
    }
}

/// How the angle constants are held in the emitted module
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AngleStorage {
    /// `wire` array with one `assign` per stage
    Wires,
    /// `reg` memory with `initial` contents, padded to a power of two
    Memory,
}

/// Emit the angle table declaration, its contents and the gain notes.
pub(crate) fn emit_angles(
    w: &mut impl Write,
    table: &[StageAngle],
    phase_bits: u32,
    storage: AngleStorage,
) -> core::fmt::Result {
    let n = table.len() as u32;
    writeln!(w, "\t// Angle table")?;
    writeln!(w, "\t// {{{{{{")?;
    writeln!(w, "\t// atan(2^-(k+1)) in units of 2^{phase_bits} per turn, truncated")?;
    let (keyword, depth) = match storage {
        AngleStorage::Wires => {
            writeln!(w, "\twire\t[{}:0]\tcordic_angle [0:(NSTAGES-1)];\n", phase_bits - 1)?;
            ("assign", table.len())
        }
        AngleStorage::Memory => {
            let depth = 1usize << ceil_log2(n as u64);
            writeln!(w, "\treg\t[{}:0]\tcordic_angle [0:{}];\n", phase_bits - 1, depth - 1)?;
            ("initial", depth)
        }
    };
    for k in 0..depth {
        let (units, deg) = table
            .get(k)
            .map_or((0, 0.0), |a| (a.phase_units, a.degrees));
        writeln!(
            w,
            "\t{keyword}\tcordic_angle[{k:2}] = {}; //{deg:11.6} deg",
            literal(units, phase_bits)
        )?;
    }
    let g = gain(n);
    writeln!(w, "\t// Phase quantization: {:.6e} rad^2", phase_variance(n, phase_bits))?;
    writeln!(w, "\t// Gain is {g:.6}")?;
    writeln!(
        w,
        "\t// Multiply by 32'h{:08x} and shift right by 32 to remove it",
        ((1u64 << 32) as f64 / g) as u64
    )?;
    writeln!(w, "\t// }}}}}}")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::solver::minimal_stage_count;

    #[test]
    fn first_angles() {
        let t = angle_table(4, 19);
        let units: Vec<_> = t.iter().map(|a| a.phase_units).collect();
        // 2^19/(2 pi) * atan(2^-k)
        assert_eq!(units, [38688, 20441, 10376, 5208]);
        assert!((t[0].degrees - 26.565051).abs() < 1e-6);
    }

    #[test]
    fn non_increasing_and_vanishing() {
        for pb in 3..48 {
            let t = angle_table(64, pb);
            assert!(t.windows(2).all(|w| w[0].phase_units >= w[1].phase_units));
            let first_zero = t.iter().position(|a| a.phase_units == 0).unwrap() as u32;
            assert_eq!(first_zero, minimal_stage_count(64, pb));
        }
    }

    #[test]
    fn literals() {
        assert_eq!(literal(0x12, 8), "8'h12");
        assert_eq!(literal(0x972a, 16), "16'h972a");
        assert_eq!(literal(38688, 19), "19'h0_9720");
        assert_eq!(literal(0x1_0000_0001, 33), "33'h1_0000_0001");
    }

    #[test]
    fn memory_padding() {
        let mut s = String::new();
        emit_angles(&mut s, &angle_table(5, 12), 12, AngleStorage::Memory).unwrap();
        assert!(s.contains("cordic_angle [0:7];"));
        assert_eq!(s.matches("\tinitial\tcordic_angle[").count(), 8);
        assert!(s.contains("Gain is"));
    }
}
