use std::io::{Read, Write};

use crate::serial::{read_len, read_u64, write_u64};
use crate::TrieError;

const WORD_BITS: usize = 64;
const BLOCK_WORDS: usize = 8;
const BLOCK_BITS: usize = WORD_BITS * BLOCK_WORDS;
/// One select hint is kept for every `SELECT_SAMPLE` set bits.
const SELECT_SAMPLE: usize = 512;

/// Collects bits for a [`BitVector`] during construction.
#[derive(Clone, Debug, Default)]
pub struct BitVectorBuilder {
    words: Vec<u64>,
    len: usize,
}

impl BitVectorBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder holding `len` cleared bits.
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Appends one bit.
    pub fn push(&mut self, bit: bool) {
        if self.len % WORD_BITS == 0 {
            self.words.push(0);
        }
        if bit {
            self.words[self.len / WORD_BITS] |= 1 << (self.len % WORD_BITS);
        }
        self.len += 1;
    }

    /// Sets the bit at `pos`.
    ///
    /// # Panics
    /// If `pos` is out of range.
    pub fn set(&mut self, pos: usize, bit: bool) {
        assert!(pos < self.len, "bit position {pos} out of range {}", self.len);
        let mask = 1u64 << (pos % WORD_BITS);
        if bit {
            self.words[pos / WORD_BITS] |= mask;
        } else {
            self.words[pos / WORD_BITS] &= !mask;
        }
    }

    /// Number of bits collected so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bits were collected.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Freezes the bits and builds the rank/select directories.
    pub fn build(self) -> BitVector {
        BitVector::from_words(self.words, self.len)
    }
}

/// An immutable bit sequence with rank and select support.
///
/// `rank(pos)` counts set bits strictly before `pos`; `select(k)` returns the
/// position of the k-th set bit (0-indexed), so `rank(select(k)) == k`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
    num_ones: usize,
    /// Set bits before each 512-bit block; one extra trailing entry.
    block_ranks: Vec<u64>,
    /// Block containing the `(i * SELECT_SAMPLE)`-th set bit.
    select_hints: Vec<u32>,
}

impl BitVector {
    /// Builds a bit vector from a sequence of bits.
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut builder = BitVectorBuilder::new();
        for bit in bits {
            builder.push(bit);
        }
        builder.build()
    }

    fn from_words(mut words: Vec<u64>, len: usize) -> Self {
        words.truncate(len.div_ceil(WORD_BITS));
        if len % WORD_BITS != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << (len % WORD_BITS)) - 1;
            }
        }

        let num_blocks = words.len().div_ceil(BLOCK_WORDS);
        let mut block_ranks = Vec::with_capacity(num_blocks + 1);
        let mut ones = 0u64;
        for block in words.chunks(BLOCK_WORDS) {
            block_ranks.push(ones);
            ones += block.iter().map(|w| u64::from(w.count_ones())).sum::<u64>();
        }
        block_ranks.push(ones);

        let mut select_hints = Vec::new();
        let mut next = 0u64;
        for b in 0..num_blocks {
            while next < block_ranks[b + 1] {
                select_hints.push(b as u32);
                next += SELECT_SAMPLE as u64;
            }
        }

        Self {
            words,
            len,
            num_ones: ones as usize,
            block_ranks,
            select_hints,
        }
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the vector holds no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits.
    #[inline]
    pub fn num_ones(&self) -> usize {
        self.num_ones
    }

    /// Returns the bit at `pos`; positions past the end read as unset.
    #[inline]
    pub fn get(&self, pos: usize) -> bool {
        pos < self.len && (self.words[pos / WORD_BITS] >> (pos % WORD_BITS)) & 1 == 1
    }

    /// Counts set bits at positions `< pos`.
    #[inline]
    pub fn rank(&self, pos: usize) -> usize {
        let pos = pos.min(self.len);
        let block = pos / BLOCK_BITS;
        let word = pos / WORD_BITS;
        let mut rank = self.block_ranks[block] as usize;
        for w in &self.words[block * BLOCK_WORDS..word] {
            rank += w.count_ones() as usize;
        }
        let rem = pos % WORD_BITS;
        if rem != 0 {
            rank += (self.words[word] & ((1u64 << rem) - 1)).count_ones() as usize;
        }
        rank
    }

    /// Position of the k-th set bit, or `None` if there are not that many.
    pub fn select(&self, k: usize) -> Option<usize> {
        if k >= self.num_ones {
            return None;
        }
        let sample = k / SELECT_SAMPLE;
        let mut lo = self.select_hints[sample] as usize;
        let mut hi = match self.select_hints.get(sample + 1) {
            Some(&b) => b as usize + 1,
            None => self.block_ranks.len() - 1,
        };
        // Invariant: block_ranks[lo] <= k < block_ranks[hi].
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.block_ranks[mid] as usize <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let mut remaining = k - self.block_ranks[lo] as usize;
        for (i, &w) in self.words[lo * BLOCK_WORDS..].iter().enumerate() {
            let ones = w.count_ones() as usize;
            if remaining < ones {
                return Some((lo * BLOCK_WORDS + i) * WORD_BITS + select_in_word(w, remaining));
            }
            remaining -= ones;
        }
        None
    }

    /// Serialized size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        16 + self.words.len() * 8
    }

    /// Writes `len`, the word count, then the words, all little-endian.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TrieError> {
        write_u64(w, self.len as u64)?;
        write_u64(w, self.words.len() as u64)?;
        for &word in &self.words {
            write_u64(w, word)?;
        }
        Ok(())
    }

    /// Reads a bit vector written by [`BitVector::write_to`] and rebuilds
    /// its directories.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TrieError> {
        let len = read_len(r)?;
        let num_words = read_len(r)?;
        if num_words != len.div_ceil(WORD_BITS) {
            return Err(TrieError::InvalidData("bit vector word count mismatch"));
        }
        let mut words = Vec::new();
        for _ in 0..num_words {
            words.push(read_u64(r)?);
        }
        Ok(Self::from_words(words, len))
    }
}

/// Position of the `k`-th set bit inside `word`. The caller guarantees it exists.
#[inline]
fn select_in_word(mut word: u64, k: usize) -> usize {
    for _ in 0..k {
        word &= word - 1;
    }
    word.trailing_zeros() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_rank(bits: &[bool], pos: usize) -> usize {
        bits[..pos].iter().filter(|&&b| b).count()
    }

    fn pattern(n: usize) -> Vec<bool> {
        // Irregular but deterministic density.
        (0..n).map(|i| (i * 7 + i / 3) % 5 == 0).collect()
    }

    #[test]
    fn empty() {
        let bv = BitVector::from_bits(std::iter::empty());
        assert!(bv.is_empty());
        assert_eq!(bv.num_ones(), 0);
        assert_eq!(bv.rank(0), 0);
        assert_eq!(bv.rank(10), 0);
        assert_eq!(bv.select(0), None);
        assert!(!bv.get(0));
    }

    #[test]
    fn small_rank_select() {
        let bv = BitVector::from_bits([true, false, false, true, true]);
        assert_eq!(bv.len(), 5);
        assert_eq!(bv.num_ones(), 3);
        assert_eq!(bv.rank(0), 0);
        assert_eq!(bv.rank(1), 1);
        assert_eq!(bv.rank(4), 2);
        assert_eq!(bv.rank(5), 3);
        assert_eq!(bv.select(0), Some(0));
        assert_eq!(bv.select(1), Some(3));
        assert_eq!(bv.select(2), Some(4));
        assert_eq!(bv.select(3), None);
    }

    #[test]
    fn rank_matches_naive_across_blocks() {
        let bits = pattern(3000);
        let bv = BitVector::from_bits(bits.iter().copied());
        for pos in [0, 1, 63, 64, 65, 511, 512, 513, 1024, 2047, 2999, 3000] {
            assert_eq!(bv.rank(pos), naive_rank(&bits, pos), "rank({pos})");
        }
    }

    #[test]
    fn select_inverts_rank() {
        let bits = pattern(5000);
        let bv = BitVector::from_bits(bits.iter().copied());
        for k in 0..bv.num_ones() {
            let pos = bv.select(k).unwrap();
            assert!(bv.get(pos));
            assert_eq!(bv.rank(pos), k);
        }
    }

    #[test]
    fn dense_select_uses_hints() {
        // Every bit set: more than one select sample per block boundary.
        let bv = BitVector::from_bits(std::iter::repeat_n(true, 4096 + 17));
        assert_eq!(bv.select(0), Some(0));
        assert_eq!(bv.select(512), Some(512));
        assert_eq!(bv.select(4096 + 16), Some(4096 + 16));
    }

    #[test]
    fn builder_set() {
        let mut b = BitVectorBuilder::with_len(130);
        b.set(0, true);
        b.set(129, true);
        b.set(64, true);
        b.set(64, false);
        let bv = b.build();
        assert_eq!(bv.num_ones(), 2);
        assert_eq!(bv.select(1), Some(129));
    }

    #[test]
    fn write_read_round_trip() {
        let bits = pattern(777);
        let bv = BitVector::from_bits(bits.iter().copied());
        let mut buf = Vec::new();
        bv.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), bv.size_in_bytes());
        let back = BitVector::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, bv);
    }

    #[test]
    fn read_truncated() {
        let bv = BitVector::from_bits(pattern(200));
        let mut buf = Vec::new();
        bv.write_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            BitVector::read_from(&mut buf.as_slice()),
            Err(TrieError::TruncatedData)
        ));
    }
}
