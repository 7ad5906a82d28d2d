use tracing::{debug, trace};

use crate::code_map::count_frequencies;
use crate::node::MAX_NODE_ID;
use crate::{BitVector, BitVectorBuilder, CodeTable, Node, PackedArray, Trie, TrieError, TrieParts};

/// Slots are allocated in blocks of this size; `base ^ code` for any byte
/// code stays inside the block of `base`.
const BLOCK_SIZE: usize = 256;

/// Only the most recent blocks are searched for a free base.
const OPEN_BLOCKS: usize = 16;

/// Builds a [`Trie`] from a sorted, deduplicated key set.
///
/// ```
/// use lexime_dict::{SmallTrie, TrieBuilder};
///
/// let keys: Vec<&[u8]> = vec![b"abc", b"abd"];
/// let trie: SmallTrie = TrieBuilder::new().bin_mode(true).build(&keys).unwrap();
/// assert!(trie.bin_mode());
/// assert!(trie.lookup(b"abd").is_some());
/// ```
#[derive(Clone, Debug)]
pub struct TrieBuilder {
    bin_mode: Option<bool>,
    unify_tails: bool,
}

impl Default for TrieBuilder {
    fn default() -> Self {
        Self {
            bin_mode: None,
            unify_tails: true,
        }
    }
}

impl TrieBuilder {
    /// Creates a builder with default settings: suffix mode detected from
    /// the keys, tail unification on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces binary (`true`) or text (`false`) suffix storage.
    ///
    /// Without this, binary mode is chosen iff some key contains a NUL byte.
    pub fn bin_mode(mut self, bin_mode: bool) -> Self {
        self.bin_mode = Some(bin_mode);
        self
    }

    /// Lets a suffix share the tail bytes of a longer suffix it ends.
    pub fn unify_tails(mut self, unify_tails: bool) -> Self {
        self.unify_tails = unify_tails;
        self
    }

    /// Builds a trie from keys sorted in ascending byte order without
    /// duplicates.
    ///
    /// # Errors
    /// - [`TrieError::UnsortedKeys`] if the keys are not strictly ascending.
    /// - [`TrieError::NulInTextMode`] if text mode was forced and a key
    ///   contains a NUL byte.
    /// - [`TrieError::CapacityExceeded`] if the node array or tail outgrows
    ///   31-bit addressing.
    pub fn build<A: PackedArray, K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Trie<A>, TrieError> {
        for (i, pair) in keys.windows(2).enumerate() {
            if pair[0].as_ref() >= pair[1].as_ref() {
                return Err(TrieError::UnsortedKeys { index: i + 1 });
            }
        }

        let nul_key = keys.iter().position(|k| k.as_ref().contains(&0));
        let bin_mode = match (self.bin_mode, nul_key) {
            (Some(false), Some(index)) => return Err(TrieError::NulInTextMode { index }),
            (Some(forced), _) => forced,
            (None, found) => found.is_some(),
        };

        let freq = count_frequencies(keys);
        let code_table = CodeTable::from_frequencies(&freq);
        let alphabet: Vec<u8> = (0..=255u8).filter(|&b| freq[b as usize] > 0).collect();

        let mut da = DaBuilder::new(keys, &code_table);
        da.arrange()?;

        let mut tail = TailBuilder::new(bin_mode);
        let links = tail.append_all(&da.suffixes(), self.unify_tails)?;
        for (&(node_id, _, _), link) in da.leaves.iter().zip(links) {
            da.nodes[node_id as usize].set_leaf(link);
        }

        let mut terminal_flags = BitVectorBuilder::with_len(da.nodes.len());
        for &node_id in &da.terminals {
            terminal_flags.set(node_id as usize, true);
        }
        let terminal_flags = terminal_flags.build();
        debug_assert_eq!(terminal_flags.num_ones(), keys.len());
        let (tail, boundary_flags) = tail.finish();
        let array = A::from_nodes(&da.nodes);

        debug!(
            variant = A::NAME,
            num_keys = keys.len(),
            num_nodes = array.num_nodes(),
            num_used_nodes = array.num_used_nodes(),
            tail_bytes = tail.len(),
            bin_mode,
            "built trie"
        );

        Ok(Trie::from_parts(TrieParts {
            array,
            terminal_flags,
            tail,
            boundary_flags,
            alphabet,
            code_table,
            num_keys: keys.len(),
            max_length: keys.iter().map(|k| k.as_ref().len()).max().unwrap_or(0),
            bin_mode,
        }))
    }
}

/// Pending node: its id and the key range `begin..end` sharing its
/// `depth`-byte prefix.
struct Pending {
    node_id: u32,
    begin: usize,
    end: usize,
    depth: usize,
}

/// Places key-set nodes in the double array.
struct DaBuilder<'k, K> {
    keys: &'k [K],
    code_table: &'k CodeTable,
    nodes: Vec<Node>,
    /// Nodes that complete a key.
    terminals: Vec<u32>,
    /// `(node_id, key index, depth)` for every leaf, in placement order.
    leaves: Vec<(u32, usize, usize)>,
}

impl<'k, K: AsRef<[u8]>> DaBuilder<'k, K> {
    fn new(keys: &'k [K], code_table: &'k CodeTable) -> Self {
        let mut nodes = vec![Node::default(); BLOCK_SIZE];
        nodes[0].set_check(0);
        Self {
            keys,
            code_table,
            nodes,
            terminals: Vec::new(),
            leaves: Vec::new(),
        }
    }

    fn arrange(&mut self) -> Result<(), TrieError> {
        let mut stack = vec![Pending {
            node_id: 0,
            begin: 0,
            end: self.keys.len(),
            depth: 0,
        }];
        let mut labels: Vec<(u8, usize, usize)> = Vec::new();
        let mut codes: Vec<u32> = Vec::new();

        while let Some(Pending {
            node_id,
            mut begin,
            end,
            depth,
        }) = stack.pop()
        {
            // The root always branches so that it can stand for the empty key.
            if node_id != 0 && end - begin == 1 {
                self.terminals.push(node_id);
                self.leaves.push((node_id, begin, depth));
                continue;
            }

            if begin < end && self.keys[begin].as_ref().len() == depth {
                self.terminals.push(node_id);
                begin += 1;
            }
            if begin == end {
                continue;
            }

            labels.clear();
            for i in begin..end {
                let b = self.keys[i].as_ref()[depth];
                match labels.last_mut() {
                    Some(last) if last.0 == b => last.2 = i + 1,
                    _ => labels.push((b, i, i + 1)),
                }
            }
            codes.clear();
            codes.extend(labels.iter().map(|&(b, _, _)| self.code_table.code(b)));

            let base = self.find_base(&codes)?;
            self.nodes[node_id as usize].set_base(base);
            trace!(node_id, base, children = codes.len(), "placed children");

            for (&(_, child_begin, child_end), &code) in labels.iter().zip(&codes).rev() {
                let child_id = base ^ code;
                self.nodes[child_id as usize].set_check(node_id);
                stack.push(Pending {
                    node_id: child_id,
                    begin: child_begin,
                    end: child_end,
                    depth: depth + 1,
                });
            }
        }
        Ok(())
    }

    /// Finds a base whose children `base ^ code` all land on free, non-root
    /// slots, growing the array as needed.
    fn find_base(&mut self, codes: &[u32]) -> Result<u32, TrieError> {
        let mut slot = self
            .nodes
            .len()
            .saturating_sub(OPEN_BLOCKS * BLOCK_SIZE)
            .max(1);
        loop {
            if slot >= self.nodes.len() {
                self.grow()?;
            }
            if !self.nodes[slot].is_used() {
                let base = slot as u32 ^ codes[0];
                if self.fits(base, codes) {
                    return Ok(base);
                }
            }
            slot += 1;
        }
    }

    fn fits(&self, base: u32, codes: &[u32]) -> bool {
        codes.iter().all(|&code| {
            let id = (base ^ code) as usize;
            id != 0 && !self.nodes[id].is_used()
        })
    }

    fn grow(&mut self) -> Result<(), TrieError> {
        let len = self.nodes.len() + BLOCK_SIZE;
        if len > MAX_NODE_ID as usize + 1 {
            return Err(TrieError::CapacityExceeded { what: "node array" });
        }
        self.nodes.resize(len, Node::default());
        Ok(())
    }

    /// Remaining bytes of each leaf's key, in `leaves` order.
    fn suffixes(&self) -> Vec<&'k [u8]> {
        let keys = self.keys;
        self.leaves
            .iter()
            .map(|&(_, key, depth)| &keys[key].as_ref()[depth..])
            .collect()
    }
}

/// Accumulates leaf suffixes. Offset 0 holds a reserved byte so that link 0
/// can mean "no suffix".
struct TailBuilder {
    bin_mode: bool,
    bytes: Vec<u8>,
    boundaries: BitVectorBuilder,
}

impl TailBuilder {
    fn new(bin_mode: bool) -> Self {
        let mut boundaries = BitVectorBuilder::new();
        if bin_mode {
            boundaries.push(false);
        }
        Self {
            bin_mode,
            bytes: vec![0],
            boundaries,
        }
    }

    /// Stores every suffix and returns their links, in input order.
    fn append_all(&mut self, suffixes: &[&[u8]], unify: bool) -> Result<Vec<u32>, TrieError> {
        let mut links = vec![0u32; suffixes.len()];
        let mut order: Vec<usize> = (0..suffixes.len())
            .filter(|&i| !suffixes[i].is_empty())
            .collect();
        if unify {
            // Descending by reversed bytes: a suffix sorts right after any
            // longer suffix that ends with it.
            order.sort_by(|&a, &b| suffixes[b].iter().rev().cmp(suffixes[a].iter().rev()));
        }

        let mut prev: Option<(&[u8], u32)> = None;
        for i in order {
            let suffix = suffixes[i];
            links[i] = match prev {
                Some((p, link)) if unify && p.ends_with(suffix) => {
                    link + (p.len() - suffix.len()) as u32
                }
                _ => {
                    let link = self.append(suffix)?;
                    prev = Some((suffix, link));
                    link
                }
            };
        }
        Ok(links)
    }

    fn append(&mut self, suffix: &[u8]) -> Result<u32, TrieError> {
        let link = self.bytes.len();
        if link + suffix.len() + 1 > MAX_NODE_ID as usize {
            return Err(TrieError::CapacityExceeded { what: "tail" });
        }
        self.bytes.extend_from_slice(suffix);
        if self.bin_mode {
            for i in 0..suffix.len() {
                self.boundaries.push(i + 1 == suffix.len());
            }
        } else {
            self.bytes.push(0);
        }
        Ok(link as u32)
    }

    fn finish(self) -> (Vec<u8>, BitVector) {
        (self.bytes, self.boundaries.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FastTrie, SmallTrie};

    #[test]
    fn rejects_unsorted() {
        let keys = ["b", "a"];
        assert!(matches!(
            FastTrie::build(&keys),
            Err(TrieError::UnsortedKeys { index: 1 })
        ));
    }

    #[test]
    fn rejects_duplicates() {
        let keys = ["a", "b", "b"];
        assert!(matches!(
            SmallTrie::build(&keys),
            Err(TrieError::UnsortedKeys { index: 2 })
        ));
    }

    #[test]
    fn rejects_nul_in_forced_text_mode() {
        let keys: Vec<&[u8]> = vec![b"a", b"b\0"];
        let r: Result<FastTrie, _> = TrieBuilder::new().bin_mode(false).build(&keys);
        assert!(matches!(r, Err(TrieError::NulInTextMode { index: 1 })));
    }

    #[test]
    fn detects_binary_mode() {
        let text = FastTrie::build(&["a", "b"]).unwrap();
        assert!(!text.bin_mode());
        let keys: Vec<&[u8]> = vec![b"a", b"b\0"];
        let bin = FastTrie::build(&keys).unwrap();
        assert!(bin.bin_mode());
    }

    #[test]
    fn empty_key_set() {
        let keys: Vec<&[u8]> = vec![];
        let trie = FastTrie::build(&keys).unwrap();
        assert_eq!(trie.num_keys(), 0);
        assert_eq!(trie.num_used_nodes(), 1);
        assert_eq!(trie.alphabet_size(), 0);
        assert_eq!(trie.max_length(), 0);
    }

    #[test]
    fn counts() {
        let trie = FastTrie::build(&["a", "an", "and", "ant"]).unwrap();
        assert_eq!(trie.num_keys(), 4);
        assert_eq!(trie.alphabet_size(), 4);
        assert_eq!(trie.max_length(), 3);
        // root, a, n, d, t
        assert_eq!(trie.num_used_nodes(), 5);
        assert_eq!(
            trie.num_nodes(),
            trie.num_used_nodes() + trie.num_free_nodes()
        );
    }

    #[test]
    fn leaves_hold_suffixes() {
        // One branch at the root; everything else lives in the tail.
        let trie = FastTrie::build(&["apple", "banana"]).unwrap();
        assert_eq!(trie.num_used_nodes(), 3);
        assert_eq!(trie.tail, b"\0pple\0anana\0");
    }

    #[test]
    fn unified_tails_share_bytes() {
        let keys = ["xbanana", "yana"];
        let unified = FastTrie::build(&keys).unwrap();
        let plain: FastTrie = TrieBuilder::new().unify_tails(false).build(&keys).unwrap();
        assert!(unified.tail.len() < plain.tail.len());
        for trie in [&unified, &plain] {
            for key in keys {
                let id = trie.lookup(key.as_bytes()).unwrap();
                assert_eq!(trie.access(id), key.as_bytes());
            }
        }
    }

    #[test]
    fn unified_tails_binary_mode() {
        let keys: Vec<&[u8]> = vec![b"x\0na", b"yna", b"zz\0na"];
        let trie = FastTrie::build(&keys).unwrap();
        assert!(trie.bin_mode());
        // Only "z\0na" is stored; the other suffixes point into it.
        assert_eq!(trie.tail.len(), 1 + 4);
        for key in &keys {
            let id = trie.lookup(key).unwrap();
            assert_eq!(trie.access(id), *key);
        }
    }

    #[test]
    fn many_keys_grow_the_array() {
        let keys: Vec<String> = (0..3000).map(|i| format!("{i:05}")).collect();
        let trie = SmallTrie::build(&keys).unwrap();
        assert!(trie.num_nodes() > BLOCK_SIZE);
        for key in keys.iter().step_by(97) {
            let id = trie.lookup(key.as_bytes()).unwrap();
            assert_eq!(trie.access(id), key.as_bytes());
        }
    }
}
