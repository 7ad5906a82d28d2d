//! A compressed string dictionary on a double-array trie.
//!
//! [`Trie`] maps a fixed, sorted key set bijectively to ids `0..num_keys()`
//! and supports exact lookup, id-to-key decoding, common prefix search and
//! predictive search. Branching nodes live in a XOR-addressed double array;
//! the unbranched remainder of each key is kept in a shared tail buffer.
//! Two array encodings are available: [`FastTrie`] stores cells verbatim,
//! [`SmallTrie`] compresses them with directly addressable codes.
//!
//! # Quick start
//!
//! ```
//! use lexime_dict::FastTrie;
//!
//! let keys = ["a", "an", "and", "ant"];
//! let trie = FastTrie::build(&keys).unwrap();
//!
//! let id = trie.lookup(b"and").unwrap();
//! assert_eq!(trie.access(id), b"and");
//! assert_eq!(trie.lookup(b"any"), None);
//!
//! let prefixes: Vec<_> = trie.common_prefix_search(b"ant").map(|m| m.key).collect();
//! assert_eq!(prefixes, vec![&b"a"[..], &b"an"[..], &b"ant"[..]]);
//!
//! let completions: Vec<_> = trie.predictive_search(b"an").map(|m| m.key).collect();
//! assert_eq!(completions, [b"an".to_vec(), b"and".to_vec(), b"ant".to_vec()]);
//! ```

#![warn(missing_docs)]

mod bit_vector;
mod build;
mod code_map;
mod dacs;
mod node;
mod packed_array;
mod search;
mod serial;
mod stats;

pub use bit_vector::{BitVector, BitVectorBuilder};
pub use build::TrieBuilder;
pub use code_map::CodeTable;
pub use dacs::Dacs;
pub use node::{Node, FREE_CHECK, MAX_NODE_ID};
pub use packed_array::{FastArray, PackedArray, SmallArray};
pub use search::{PredictiveIter, PrefixIter, PrefixMatch, SearchMatch};
pub use stats::TrieStats;

/// Errors that can occur while building or deserializing a trie.
///
/// Query misses are not errors: [`Trie::lookup`] returns `None` and
/// [`Trie::access`] returns an empty key for ids out of range.
#[derive(Debug, thiserror::Error)]
pub enum TrieError {
    /// The input keys are not strictly ascending.
    #[error("keys must be sorted and unique (violated at index {index})")]
    UnsortedKeys {
        /// Index of the first key not greater than its predecessor.
        index: usize,
    },
    /// Text mode was requested but a key contains a NUL byte.
    #[error("key at index {index} contains a NUL byte but text mode was requested")]
    NulInTextMode {
        /// Index of the offending key.
        index: usize,
    },
    /// The node array or tail outgrew the 31-bit address space.
    #[error("{what} exceeds the 31-bit address space")]
    CapacityExceeded {
        /// Which structure overflowed.
        what: &'static str,
    },
    /// The binary data is truncated.
    #[error("truncated or corrupted data")]
    TruncatedData,
    /// The binary data is structurally inconsistent.
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fully formed components handed from the builder or deserializer to the
/// single [`Trie`] constructor.
pub(crate) struct TrieParts<A> {
    pub(crate) array: A,
    pub(crate) terminal_flags: BitVector,
    pub(crate) tail: Vec<u8>,
    pub(crate) boundary_flags: BitVector,
    pub(crate) alphabet: Vec<u8>,
    pub(crate) code_table: CodeTable,
    pub(crate) num_keys: usize,
    pub(crate) max_length: usize,
    pub(crate) bin_mode: bool,
}

/// A read-only string dictionary over a double-array trie.
///
/// The trie owns all of its buffers and is immutable once built. It is not
/// `Clone`; move it, or share it by reference across threads.
#[derive(Debug)]
pub struct Trie<A: PackedArray = FastArray> {
    pub(crate) array: A,
    /// Bit per node: set when the node completes a key. Key ids are ranks.
    pub(crate) terminal_flags: BitVector,
    /// Leaf suffixes. Offset 0 is reserved for the empty suffix.
    pub(crate) tail: Vec<u8>,
    /// Binary mode only: set on the last byte of each suffix.
    pub(crate) boundary_flags: BitVector,
    /// Distinct key bytes, ascending.
    pub(crate) alphabet: Vec<u8>,
    pub(crate) code_table: CodeTable,
    pub(crate) num_keys: usize,
    pub(crate) max_length: usize,
    pub(crate) bin_mode: bool,
}

/// A trie whose cells are stored verbatim.
pub type FastTrie = Trie<FastArray>;

/// A trie whose cells are compressed with directly addressable codes.
pub type SmallTrie = Trie<SmallArray>;

impl<A: PackedArray> Trie<A> {
    pub(crate) fn from_parts(parts: TrieParts<A>) -> Self {
        Self {
            array: parts.array,
            terminal_flags: parts.terminal_flags,
            tail: parts.tail,
            boundary_flags: parts.boundary_flags,
            alphabet: parts.alphabet,
            code_table: parts.code_table,
            num_keys: parts.num_keys,
            max_length: parts.max_length,
            bin_mode: parts.bin_mode,
        }
    }

    /// Builds a trie from keys sorted in ascending byte order without
    /// duplicates, using the default [`TrieBuilder`] settings.
    pub fn build<K: AsRef<[u8]>>(keys: &[K]) -> Result<Self, TrieError> {
        TrieBuilder::new().build(keys)
    }

    /// Returns the number of registered keys.
    pub fn num_keys(&self) -> usize {
        self.num_keys
    }

    /// Returns true if no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.num_keys == 0
    }

    /// Returns true if suffixes are delimited by boundary flags rather than
    /// NUL bytes.
    pub fn bin_mode(&self) -> bool {
        self.bin_mode
    }

    /// Returns the length of the longest key.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Returns the number of distinct bytes used by the keys.
    pub fn alphabet_size(&self) -> usize {
        self.alphabet.len()
    }

    /// Returns the number of nodes, free slots included.
    pub fn num_nodes(&self) -> usize {
        self.array.num_nodes()
    }

    /// Returns the number of nodes that belong to the trie.
    pub fn num_used_nodes(&self) -> usize {
        self.array.num_used_nodes()
    }

    /// Returns the number of free slots.
    pub fn num_free_nodes(&self) -> usize {
        self.array.num_free_nodes()
    }

    /// Returns the serialized size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.array.size_in_bytes()
            + self.terminal_flags.size_in_bytes()
            + 8
            + self.tail.len()
            + self.boundary_flags.size_in_bytes()
            + 8
            + self.alphabet.len()
            + self.code_table.as_raw().len()
            + 8 // num_keys
            + 8 // max_length
            + 1 // bin_mode
    }
}
