use std::io::{Read, Write};

use crate::node::FREE_CHECK;
use crate::serial::{read_len, read_u32, write_u32, write_u64};
use crate::{BitVector, Dacs, Node, TrieError};

/// Random access to the BASE/CHECK/LINK/leaf fields of a double array.
///
/// Implementations differ only in encoding; [`Trie`](crate::Trie) runs the
/// same traversal over any of them. All node accessors require
/// `node_id < num_nodes()`.
pub trait PackedArray: Sized {
    /// Short encoding name used in reports.
    const NAME: &'static str;

    /// Encodes the cells produced by the builder.
    fn from_nodes(nodes: &[Node]) -> Self;

    /// XOR offset of an internal node.
    fn base(&self, node_id: u32) -> u32;

    /// Parent of a used node; [`FREE_CHECK`] for a free slot.
    fn check(&self, node_id: u32) -> u32;

    /// Tail offset of a leaf node, 0 for an empty suffix.
    fn link(&self, node_id: u32) -> u32;

    /// Whether the node stores a tail link instead of branching.
    fn is_leaf(&self, node_id: u32) -> bool;

    /// Number of slots, free ones included.
    fn num_nodes(&self) -> usize;

    /// Number of slots that belong to the trie.
    fn num_used_nodes(&self) -> usize;

    /// Number of free slots.
    fn num_free_nodes(&self) -> usize {
        self.num_nodes() - self.num_used_nodes()
    }

    /// Serialized size in bytes.
    fn size_in_bytes(&self) -> usize;

    /// Named byte sizes of the internal parts, for diagnostics.
    fn components(&self) -> Vec<(&'static str, usize)>;

    /// Writes the encoded array.
    fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TrieError>;

    /// Reads an array written by [`PackedArray::write_to`].
    fn read_from<R: Read>(r: &mut R) -> Result<Self, TrieError>;
}

/// Node cells stored verbatim, 8 bytes per slot.
#[derive(Clone, Debug, Default)]
pub struct FastArray {
    nodes: Vec<Node>,
    num_used: usize,
}

impl FastArray {
    fn new(nodes: Vec<Node>) -> Self {
        let num_used = nodes.iter().filter(|n| n.is_used()).count();
        Self { nodes, num_used }
    }
}

impl PackedArray for FastArray {
    const NAME: &'static str = "fast";

    fn from_nodes(nodes: &[Node]) -> Self {
        Self::new(nodes.to_vec())
    }

    #[inline]
    fn base(&self, node_id: u32) -> u32 {
        self.nodes[node_id as usize].base()
    }

    #[inline]
    fn check(&self, node_id: u32) -> u32 {
        let node = &self.nodes[node_id as usize];
        if node.is_used() {
            node.check()
        } else {
            FREE_CHECK
        }
    }

    #[inline]
    fn link(&self, node_id: u32) -> u32 {
        self.nodes[node_id as usize].link()
    }

    #[inline]
    fn is_leaf(&self, node_id: u32) -> bool {
        self.nodes[node_id as usize].is_leaf()
    }

    #[inline]
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_used_nodes(&self) -> usize {
        self.num_used
    }

    fn size_in_bytes(&self) -> usize {
        8 + self.nodes.len() * 8
    }

    fn components(&self) -> Vec<(&'static str, usize)> {
        vec![("nodes", self.size_in_bytes())]
    }

    fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TrieError> {
        write_u64(w, self.nodes.len() as u64)?;
        for node in &self.nodes {
            let (base, check) = node.to_raw();
            write_u32(w, base)?;
            write_u32(w, check)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> Result<Self, TrieError> {
        let len = read_len(r)?;
        let mut nodes = Vec::new();
        for _ in 0..len {
            let base = read_u32(r)?;
            let check = read_u32(r)?;
            nodes.push(Node::from_raw(base, check));
        }
        Ok(Self::new(nodes))
    }
}

/// Compressed cells: XOR-relative BASE and CHECK values in byte-wise DACs.
///
/// Internal nodes store `base ^ node_id`, leaves store their link, and every
/// used node stores `check ^ node_id`. Children sit close to their parent,
/// so most values fit in a single byte.
#[derive(Clone, Debug, Default)]
pub struct SmallArray {
    values: Dacs,
    checks: Dacs,
    leaf_flags: BitVector,
    used_flags: BitVector,
}

impl PackedArray for SmallArray {
    const NAME: &'static str = "small";

    fn from_nodes(nodes: &[Node]) -> Self {
        let mut values = Vec::with_capacity(nodes.len());
        let mut checks = Vec::with_capacity(nodes.len());
        for (id, node) in nodes.iter().enumerate() {
            let id = id as u32;
            values.push(match (node.is_used(), node.is_leaf()) {
                (_, true) => node.link(),
                (true, false) => node.base() ^ id,
                (false, false) => 0,
            });
            checks.push(if node.is_used() { node.check() ^ id } else { 0 });
        }
        Self {
            values: Dacs::from_slice(&values),
            checks: Dacs::from_slice(&checks),
            leaf_flags: BitVector::from_bits(nodes.iter().map(Node::is_leaf)),
            used_flags: BitVector::from_bits(nodes.iter().map(Node::is_used)),
        }
    }

    #[inline]
    fn base(&self, node_id: u32) -> u32 {
        self.values.get(node_id as usize) ^ node_id
    }

    #[inline]
    fn check(&self, node_id: u32) -> u32 {
        if self.used_flags.get(node_id as usize) {
            self.checks.get(node_id as usize) ^ node_id
        } else {
            FREE_CHECK
        }
    }

    #[inline]
    fn link(&self, node_id: u32) -> u32 {
        self.values.get(node_id as usize)
    }

    #[inline]
    fn is_leaf(&self, node_id: u32) -> bool {
        self.leaf_flags.get(node_id as usize)
    }

    #[inline]
    fn num_nodes(&self) -> usize {
        self.values.len()
    }

    fn num_used_nodes(&self) -> usize {
        self.used_flags.num_ones()
    }

    fn size_in_bytes(&self) -> usize {
        self.components().iter().map(|&(_, size)| size).sum()
    }

    fn components(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("values", self.values.size_in_bytes()),
            ("checks", self.checks.size_in_bytes()),
            ("leaf_flags", self.leaf_flags.size_in_bytes()),
            ("used_flags", self.used_flags.size_in_bytes()),
        ]
    }

    fn write_to<W: Write>(&self, w: &mut W) -> Result<(), TrieError> {
        self.values.write_to(w)?;
        self.checks.write_to(w)?;
        self.leaf_flags.write_to(w)?;
        self.used_flags.write_to(w)?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> Result<Self, TrieError> {
        let values = Dacs::read_from(r)?;
        let checks = Dacs::read_from(r)?;
        let leaf_flags = BitVector::read_from(r)?;
        let used_flags = BitVector::read_from(r)?;
        let n = values.len();
        if checks.len() != n || leaf_flags.len() != n || used_flags.len() != n {
            return Err(TrieError::InvalidData("packed array parts differ in length"));
        }
        Ok(Self {
            values,
            checks,
            leaf_flags,
            used_flags,
        })
    }
}
