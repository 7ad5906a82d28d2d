use std::io::{Read, Write};

use crate::serial::{read_bytes, read_len, write_bytes, write_u64};
use crate::{BitVector, TrieError};

const MAX_LEVELS: usize = 4;

/// Byte-wise directly addressable codes over `u32` values.
///
/// Level 0 stores the low byte of every value. A set bit in `flags[l]`
/// means the value continues in level `l + 1`, at position
/// `flags[l].rank(i)`. Small values cost one byte plus a flag bit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dacs {
    levels: Vec<Vec<u8>>,
    flags: Vec<BitVector>,
}

impl Dacs {
    /// Encodes `values`.
    pub fn from_slice(values: &[u32]) -> Self {
        let mut levels: Vec<Vec<u8>> = Vec::new();
        let mut flags = Vec::new();
        let mut current: Vec<u32> = values.to_vec();

        for level in 0..MAX_LEVELS {
            levels.push(current.iter().map(|&v| v as u8).collect());
            if level + 1 == MAX_LEVELS || current.iter().all(|&v| v >> 8 == 0) {
                break;
            }
            flags.push(BitVector::from_bits(current.iter().map(|&v| v >> 8 != 0)));
            current = current.iter().filter(|&&v| v >> 8 != 0).map(|&v| v >> 8).collect();
        }

        if levels.is_empty() {
            levels.push(Vec::new());
        }
        Self { levels, flags }
    }

    /// Number of values.
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Returns true if no values are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the `i`-th value.
    ///
    /// # Panics
    /// If `i` is out of range.
    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        let mut value = u32::from(self.levels[0][i]);
        let mut pos = i;
        for (level, flags) in self.flags.iter().enumerate() {
            if !flags.get(pos) {
                break;
            }
            pos = flags.rank(pos);
            value |= u32::from(self.levels[level + 1][pos]) << (8 * (level + 1));
        }
        value
    }

    /// Serialized size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        8 + self.levels.iter().map(|l| 8 + l.len()).sum::<usize>()
            + self.flags.iter().map(BitVector::size_in_bytes).sum::<usize>()
    }

    /// Writes the level count, each level's bytes, then each level's flags.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TrieError> {
        write_u64(w, self.levels.len() as u64)?;
        for level in &self.levels {
            write_bytes(w, level)?;
        }
        for flags in &self.flags {
            flags.write_to(w)?;
        }
        Ok(())
    }

    /// Reads codes written by [`Dacs::write_to`].
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TrieError> {
        let num_levels = read_len(r)?;
        if num_levels == 0 || num_levels > MAX_LEVELS {
            return Err(TrieError::InvalidData("bad DACs level count"));
        }
        let mut levels = Vec::with_capacity(num_levels);
        for _ in 0..num_levels {
            levels.push(read_bytes(r)?);
        }
        let mut flags = Vec::with_capacity(num_levels - 1);
        for level in 0..num_levels - 1 {
            let f = BitVector::read_from(r)?;
            if f.len() != levels[level].len() || f.num_ones() != levels[level + 1].len() {
                return Err(TrieError::InvalidData("DACs flags disagree with levels"));
            }
            flags.push(f);
        }
        Ok(Self { levels, flags })
    }
}
