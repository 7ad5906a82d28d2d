const IS_LEAF: u32 = 1 << 31;
const IS_USED: u32 = 1 << 31;
const MASK: u32 = 0x7FFF_FFFF;

/// Parent id stored in free slots. Never a valid node id, so a
/// `check(child) == parent` test against a free slot always fails.
pub const FREE_CHECK: u32 = MASK;

/// Largest node id the double array can address.
pub const MAX_NODE_ID: u32 = MASK - 1;

/// A cell in the double array.
///
/// Each node is exactly 8 bytes (`#[repr(C)]`):
/// - `base`: 31-bit XOR offset (or tail link for leaves) | IS_LEAF flag (MSB)
/// - `check`: 31-bit parent index | IS_USED flag (MSB)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    base: u32,
    check: u32,
}

impl Default for Node {
    /// A free slot.
    fn default() -> Self {
        Self {
            base: 0,
            check: FREE_CHECK,
        }
    }
}

impl Node {
    /// Returns the base value (XOR offset), masking out the IS_LEAF flag.
    #[inline]
    pub fn base(&self) -> u32 {
        self.base & MASK
    }

    /// Returns the check value (parent index), masking out the IS_USED flag.
    #[inline]
    pub fn check(&self) -> u32 {
        self.check & MASK
    }

    /// Returns true if this node stores a tail link instead of branching.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.base & IS_LEAF != 0
    }

    /// Returns true if this slot belongs to the trie.
    #[inline]
    pub fn is_used(&self) -> bool {
        self.check & IS_USED != 0
    }

    /// Returns the tail offset stored in a leaf node.
    /// Only meaningful when `is_leaf()` is true.
    #[inline]
    pub fn link(&self) -> u32 {
        self.base & MASK
    }

    /// Sets the base value (XOR offset), preserving the IS_LEAF flag.
    #[inline]
    pub fn set_base(&mut self, base: u32) {
        debug_assert!(base & IS_LEAF == 0, "base value must fit in 31 bits");
        self.base = (self.base & IS_LEAF) | base;
    }

    /// Claims the slot for `parent`, marking it used.
    #[inline]
    pub fn set_check(&mut self, parent: u32) {
        debug_assert!(parent & IS_USED == 0, "check value must fit in 31 bits");
        self.check = IS_USED | parent;
    }

    /// Marks this node as a leaf and stores the tail offset.
    #[inline]
    pub fn set_leaf(&mut self, link: u32) {
        debug_assert!(link & IS_LEAF == 0, "link must fit in 31 bits");
        self.base = IS_LEAF | link;
    }

    /// Raw words as stored, flags included.
    #[inline]
    pub(crate) fn to_raw(self) -> (u32, u32) {
        (self.base, self.check)
    }

    #[inline]
    pub(crate) fn from_raw(base: u32, check: u32) -> Self {
        Self { base, check }
    }
}
