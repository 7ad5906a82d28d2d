use std::io::{self, Read, Write};

use tracing::debug;

use crate::{BitVector, CodeTable, PackedArray, Trie, TrieError};

#[inline]
pub(crate) fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), TrieError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => TrieError::TruncatedData,
        _ => TrieError::Io(e),
    })
}

#[inline]
pub(crate) fn write_u64<W: Write>(w: &mut W, v: u64) -> Result<(), TrieError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

#[inline]
pub(crate) fn read_u64<R: Read>(r: &mut R) -> Result<u64, TrieError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[inline]
pub(crate) fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<(), TrieError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

#[inline]
pub(crate) fn read_u32<R: Read>(r: &mut R) -> Result<u32, TrieError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads a `u64` length and checks it is addressable on this platform.
pub(crate) fn read_len<R: Read>(r: &mut R) -> Result<usize, TrieError> {
    usize::try_from(read_u64(r)?).map_err(|_| TrieError::InvalidData("length overflows usize"))
}

/// Writes a length-prefixed byte buffer.
pub(crate) fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<(), TrieError> {
    write_u64(w, bytes.len() as u64)?;
    w.write_all(bytes)?;
    Ok(())
}

/// Reads a length-prefixed byte buffer.
///
/// The length is not trusted for preallocation; a corrupted prefix surfaces
/// as `TruncatedData` rather than a huge allocation.
pub(crate) fn read_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>, TrieError> {
    let len = read_u64(r)?;
    let mut buf = Vec::new();
    r.by_ref().take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(TrieError::TruncatedData);
    }
    Ok(buf)
}

impl<A: PackedArray> Trie<A> {
    /// Writes the dictionary image.
    ///
    /// Layout, in order: packed array, terminal flags, tail, boundary flags,
    /// alphabet, the raw 512-byte code table, `num_keys` and `max_length` as
    /// little-endian `u64`, and `bin_mode` as one byte.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TrieError> {
        self.array.write_to(w)?;
        self.terminal_flags.write_to(w)?;
        write_bytes(w, &self.tail)?;
        self.boundary_flags.write_to(w)?;
        write_bytes(w, &self.alphabet)?;
        w.write_all(self.code_table.as_raw())?;
        write_u64(w, self.num_keys as u64)?;
        write_u64(w, self.max_length as u64)?;
        w.write_all(&[u8::from(self.bin_mode)])?;
        Ok(())
    }

    /// Reads a dictionary image written by [`Trie::write_to`].
    ///
    /// The image must have been written with the same [`PackedArray`]
    /// encoding.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, TrieError> {
        let array = A::read_from(r)?;
        let terminal_flags = BitVector::read_from(r)?;
        let tail = read_bytes(r)?;
        let boundary_flags = BitVector::read_from(r)?;
        let alphabet = read_bytes(r)?;
        let mut raw = [0u8; 512];
        read_exact(r, &mut raw)?;
        let code_table = CodeTable::from_raw(raw)
            .ok_or(TrieError::InvalidData("code table is not a permutation"))?;
        let num_keys = read_len(r)?;
        let max_length = read_len(r)?;
        let mut flag = [0u8; 1];
        read_exact(r, &mut flag)?;
        let bin_mode = match flag[0] {
            0 => false,
            1 => true,
            _ => return Err(TrieError::InvalidData("bin_mode flag is not a boolean")),
        };

        if array.num_nodes() == 0 {
            return Err(TrieError::InvalidData("node array has no root"));
        }
        if terminal_flags.len() != array.num_nodes() {
            return Err(TrieError::InvalidData("terminal flags do not cover the node array"));
        }
        if terminal_flags.num_ones() != num_keys {
            return Err(TrieError::InvalidData("key count does not match terminal flags"));
        }
        if tail.is_empty() {
            return Err(TrieError::InvalidData("tail lacks its reserved first byte"));
        }
        // A key is at most a root-to-node path plus one stored suffix.
        if max_length > array.num_nodes() + tail.len() {
            return Err(TrieError::InvalidData("max_length exceeds what the image can encode"));
        }
        let expected_boundaries = if bin_mode { tail.len() } else { 0 };
        if boundary_flags.len() != expected_boundaries {
            return Err(TrieError::InvalidData("boundary flags do not match the tail"));
        }
        if !alphabet.windows(2).all(|w| w[0] < w[1])
            || alphabet
                .iter()
                .any(|&b| code_table.code(b) as usize >= alphabet.len())
        {
            return Err(TrieError::InvalidData("alphabet disagrees with the code table"));
        }

        debug!(
            variant = A::NAME,
            num_keys,
            num_nodes = array.num_nodes(),
            bin_mode,
            "deserialized trie"
        );

        Ok(Self::from_parts(crate::TrieParts {
            array,
            terminal_flags,
            tail,
            boundary_flags,
            alphabet,
            code_table,
            num_keys,
            max_length,
            bin_mode,
        }))
    }

    /// Serializes the dictionary to a byte vector.
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size_in_bytes());
        self.write_to(&mut buf)
            .expect("Trie::as_bytes: writing to a Vec cannot fail");
        buf
    }

    /// Deserializes a dictionary from a byte slice.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, TrieError> {
        Self::read_from(&mut bytes)
    }
}
