/// Bidirectional byte ↔ edge-code mapping stored as a fixed 512-byte table.
///
/// `table[byte]` is the code of `byte` and `table[code + 256]` is the byte
/// of `code`. The mapping is a full permutation of `0..=255`: bytes that
/// occur in the key set take the codes `0..alphabet_size` in descending
/// frequency order, so the busiest labels get the smallest XOR offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeTable {
    table: [u8; 512],
}

impl Default for CodeTable {
    /// The identity mapping.
    fn default() -> Self {
        Self::from_frequencies(&[0; 256])
    }
}

/// Counts how often each byte occurs across `keys`.
pub(crate) fn count_frequencies<K: AsRef<[u8]>>(keys: &[K]) -> [u64; 256] {
    let mut freq = [0u64; 256];
    for key in keys {
        for &b in key.as_ref() {
            freq[b as usize] += 1;
        }
    }
    freq
}

impl CodeTable {
    /// Builds a CodeTable from per-byte occurrence counts.
    ///
    /// Occurring bytes are ordered by frequency descending, then by byte
    /// ascending for stability; absent bytes follow in byte order.
    pub fn from_frequencies(freq: &[u64; 256]) -> Self {
        let mut order: Vec<u8> = (0..=255u8).collect();
        order.sort_by(|&a, &b| {
            let (fa, fb) = (freq[a as usize], freq[b as usize]);
            (fa == 0)
                .cmp(&(fb == 0))
                .then(fb.cmp(&fa))
                .then(a.cmp(&b))
        });

        let mut table = [0u8; 512];
        for (code, &byte) in order.iter().enumerate() {
            table[byte as usize] = code as u8;
            table[code + 256] = byte;
        }
        Self { table }
    }

    /// Restores a table from its raw image. Returns `None` unless the two
    /// halves form inverse permutations.
    pub fn from_raw(table: [u8; 512]) -> Option<Self> {
        let consistent = (0..256).all(|b| table[table[b] as usize + 256] as usize == b);
        consistent.then_some(Self { table })
    }

    /// The raw 512-byte image.
    #[inline]
    pub fn as_raw(&self) -> &[u8; 512] {
        &self.table
    }

    /// Returns the edge code for a byte.
    #[inline]
    pub fn code(&self, byte: u8) -> u32 {
        u32::from(self.table[byte as usize])
    }

    /// Returns the byte for an edge code. Only the low 8 bits are used.
    #[inline]
    pub fn byte(&self, code: u32) -> u8 {
        self.table[256 + (code & 0xFF) as usize]
    }
}
