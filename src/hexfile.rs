use core::fmt;

use serde::Serialize;

use crate::{TableError, fixed::mask};

/// A `$readmemh` table file
///
/// Values are two's complement fields of `bits` bits. Both signed and
/// unsigned interpretations are accepted, so the valid range is
/// `-2^(bits-1) ..= 2^bits - 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HexTable {
    path: String,
    bits: u32,
    data: Vec<i64>,
}

impl HexTable {
    /// Addresses per line
    pub const ROW: usize = 8;

    /// Validate the geometry and every entry
    pub fn new(path: impl Into<String>, bits: u32, data: Vec<i64>) -> Result<Self, TableError> {
        if !(1..63).contains(&bits) {
            return Err(TableError::Width(bits));
        }
        if data.len() < 4 {
            return Err(TableError::Size(data.len()));
        }
        let (lo, hi) = (-(1i64 << (bits - 1)), (1i64 << bits) - 1);
        if let Some((index, &value)) = data
            .iter()
            .enumerate()
            .find(|(_, v)| !(lo..=hi).contains(*v))
        {
            return Err(TableError::Range { index, value, bits });
        }
        Ok(Self {
            path: path.into(),
            bits,
            data,
        })
    }

    /// Output path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Field width
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Entries as given
    pub fn data(&self) -> &[i64] {
        &self.data
    }
}

impl fmt::Display for HexTable {
    /// `@address` every [`Self::ROW`] entries, then each entry masked to the
    /// field width in `ceil(bits/4)` hex digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.bits.div_ceil(4) as usize;
        for (row, chunk) in self.data.chunks(Self::ROW).enumerate() {
            if row != 0 {
                writeln!(f)?;
            }
            write!(f, "@{:08x} ", row * Self::ROW)?;
            for v in chunk {
                write!(f, "{:0digits$x} ", mask(*v as u64, self.bits))?;
            }
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout() {
        let t = HexTable::new("t.hex", 10, (-4..6).collect()).unwrap();
        assert_eq!(
            t.to_string(),
            "@00000000 3fc 3fd 3fe 3ff 000 001 002 003 \n@00000008 004 005 \n"
        );
        let t = HexTable::new("t.hex", 4, vec![15, -8, 7, 0]).unwrap();
        assert_eq!(t.to_string(), "@00000000 f 8 7 0 \n");
    }

    #[test]
    fn checks() {
        assert_eq!(
            HexTable::new("t.hex", 4, vec![0, 16, 0, 0]),
            Err(TableError::Range {
                index: 1,
                value: 16,
                bits: 4
            })
        );
        assert!(matches!(
            HexTable::new("t.hex", 4, vec![0, 0, -9, 0]),
            Err(TableError::Range { index: 2, .. })
        ));
        assert_eq!(HexTable::new("t.hex", 63, vec![0; 4]), Err(TableError::Width(63)));
        assert_eq!(HexTable::new("t.hex", 0, vec![0; 4]), Err(TableError::Width(0)));
        assert_eq!(HexTable::new("t.hex", 8, vec![0; 3]), Err(TableError::Size(3)));
        assert!(HexTable::new("t.hex", 62, vec![-(1 << 61), (1 << 62) - 1, 0, 0]).is_ok());
    }
}
