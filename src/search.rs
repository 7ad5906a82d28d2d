use std::iter::FusedIterator;

use crate::{PackedArray, Trie};

/// Result of a common prefix search match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    /// The matched key, a prefix of the query.
    pub key: &'a [u8],
    /// The id of the matched key.
    pub id: u32,
}

/// Result of a predictive search match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchMatch {
    /// The full matched key.
    pub key: Vec<u8>,
    /// The id of the matched key.
    pub id: u32,
}

impl<A: PackedArray> Trie<A> {
    /// Follows the edge labelled `byte` out of `node_id`.
    ///
    /// The root is never anyone's child, and a slot whose check disagrees
    /// (free or owned by another parent) is not a transition.
    #[inline]
    pub(crate) fn child(&self, node_id: u32, byte: u8) -> Option<u32> {
        let child_id = self.array.base(node_id) ^ self.code_table.code(byte);
        if child_id == 0
            || child_id as usize >= self.array.num_nodes()
            || self.array.check(child_id) != node_id
        {
            return None;
        }
        Some(child_id)
    }

    /// Label of the edge from `parent_id` to `child_id`.
    #[inline]
    fn edge(&self, parent_id: u32, child_id: u32) -> u8 {
        self.code_table.byte(self.array.base(parent_id) ^ child_id)
    }

    #[inline]
    fn is_terminal(&self, node_id: u32) -> bool {
        self.terminal_flags.get(node_id as usize)
    }

    #[inline]
    fn to_key_id(&self, node_id: u32) -> u32 {
        self.terminal_flags.rank(node_id as usize) as u32
    }

    #[inline]
    fn to_node_id(&self, id: u32) -> Option<u32> {
        self.terminal_flags.select(id as usize).map(|pos| pos as u32)
    }

    /// Exact match search. Returns the id if the key is registered.
    pub fn lookup(&self, key: &[u8]) -> Option<u32> {
        let mut node_id = 0;
        let mut pos = 0;
        while !self.array.is_leaf(node_id) {
            if pos == key.len() {
                return self.is_terminal(node_id).then(|| self.to_key_id(node_id));
            }
            node_id = self.child(node_id, key[pos])?;
            pos += 1;
        }
        self.match_suffix(&key[pos..], self.array.link(node_id))
            .then(|| self.to_key_id(node_id))
    }

    /// Decodes the key registered under `id`.
    ///
    /// Ids outside `0..num_keys()` yield an empty key, indistinguishable from
    /// a registered empty key; check the range first if that matters.
    pub fn access(&self, id: u32) -> Vec<u8> {
        if id as usize >= self.num_keys {
            return Vec::new();
        }
        let Some(mut node_id) = self.to_node_id(id) else {
            return Vec::new();
        };

        let tail_pos = if self.array.is_leaf(node_id) {
            self.array.link(node_id)
        } else {
            0
        };

        // A well-formed parent chain reaches the root in fewer than
        // num_nodes steps; anything else decodes as empty.
        let num_nodes = self.array.num_nodes();
        let mut key = Vec::with_capacity(self.max_length);
        for _ in 0..num_nodes {
            if node_id == 0 {
                break;
            }
            let parent_id = self.array.check(node_id);
            if parent_id as usize >= num_nodes {
                return Vec::new();
            }
            key.push(self.edge(parent_id, node_id));
            node_id = parent_id;
        }
        if node_id != 0 {
            return Vec::new();
        }
        key.reverse();
        self.extract_suffix(tail_pos, &mut key);
        key
    }

    /// Checks that `rest` equals the suffix stored at `tail_pos` exactly.
    fn match_suffix(&self, rest: &[u8], tail_pos: u32) -> bool {
        if rest.is_empty() {
            return tail_pos == 0;
        }
        if tail_pos == 0 {
            return false;
        }
        let mut tail_pos = tail_pos as usize;
        if self.bin_mode {
            for (i, &b) in rest.iter().enumerate() {
                if self.tail.get(tail_pos) != Some(&b) {
                    return false;
                }
                if self.boundary_flags.get(tail_pos) {
                    return i + 1 == rest.len();
                }
                tail_pos += 1;
            }
            false
        } else {
            for &b in rest {
                match self.tail.get(tail_pos) {
                    Some(&t) if t != 0 && t == b => tail_pos += 1,
                    _ => return false,
                }
            }
            self.tail.get(tail_pos) == Some(&0)
        }
    }

    /// Checks that `rest` is a prefix of the suffix stored at `tail_pos`.
    ///
    /// On success returns where the unmatched remainder of the suffix starts,
    /// or 0 if nothing remains.
    fn match_suffix_prefix(&self, rest: &[u8], tail_pos: u32) -> Option<u32> {
        if tail_pos == 0 {
            return rest.is_empty().then_some(0);
        }
        let mut pos = tail_pos as usize;
        if self.bin_mode {
            for (i, &b) in rest.iter().enumerate() {
                if self.tail.get(pos) != Some(&b) {
                    return None;
                }
                if self.boundary_flags.get(pos) {
                    return (i + 1 == rest.len()).then_some(0);
                }
                pos += 1;
            }
        } else {
            for &b in rest {
                match self.tail.get(pos) {
                    Some(&t) if t != 0 && t == b => pos += 1,
                    _ => return None,
                }
            }
        }
        Some(pos as u32)
    }

    /// Checks that the suffix stored at `tail_pos` is a prefix of `rest` and
    /// returns its length.
    fn match_suffix_within(&self, rest: &[u8], tail_pos: u32) -> Option<usize> {
        if tail_pos == 0 {
            return Some(0);
        }
        let pos = tail_pos as usize;
        let mut len = 0;
        if self.bin_mode {
            loop {
                let t = *self.tail.get(pos + len)?;
                if rest.get(len) != Some(&t) {
                    return None;
                }
                len += 1;
                if self.boundary_flags.get(pos + len - 1) {
                    return Some(len);
                }
            }
        } else {
            loop {
                match self.tail.get(pos + len) {
                    Some(0) => return Some(len),
                    Some(t) if rest.get(len) == Some(t) => len += 1,
                    _ => return None,
                }
            }
        }
    }

    /// Appends the suffix stored at `tail_pos` to `buf`.
    fn extract_suffix(&self, tail_pos: u32, buf: &mut Vec<u8>) {
        if tail_pos == 0 {
            return;
        }
        let mut pos = tail_pos as usize;
        if self.bin_mode {
            while let Some(&b) = self.tail.get(pos) {
                buf.push(b);
                if self.boundary_flags.get(pos) {
                    break;
                }
                pos += 1;
            }
        } else {
            while let Some(&b) = self.tail.get(pos) {
                if b == 0 {
                    break;
                }
                buf.push(b);
                pos += 1;
            }
        }
    }

    /// Common prefix search. Returns an iterator over all registered keys
    /// that are prefixes of `query`, shortest first.
    pub fn common_prefix_search<'a>(&'a self, query: &'a [u8]) -> PrefixIter<'a, A> {
        PrefixIter {
            trie: self,
            query,
            pos: 0,
            node_id: 0,
            state: ScanState::Start,
        }
    }

    /// Predictive search. Returns an iterator over all registered keys that
    /// start with `prefix`, in ascending byte order.
    pub fn predictive_search<'a>(&'a self, prefix: &'a [u8]) -> PredictiveIter<'a, A> {
        PredictiveIter {
            trie: self,
            prefix,
            state: ScanState::Start,
            stack: Vec::new(),
            buf: Vec::with_capacity(self.max_length),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Start,
    Scanning,
    Done,
}

/// Iterator over the registered prefixes of a query.
///
/// Created by [`Trie::common_prefix_search`].
pub struct PrefixIter<'a, A: PackedArray> {
    trie: &'a Trie<A>,
    query: &'a [u8],
    pos: usize,
    node_id: u32,
    state: ScanState,
}

impl<'a, A: PackedArray> PrefixIter<'a, A> {
    #[inline]
    fn hit(&self) -> PrefixMatch<'a> {
        PrefixMatch {
            key: &self.query[..self.pos],
            id: self.trie.to_key_id(self.node_id),
        }
    }
}

impl<'a, A: PackedArray> Iterator for PrefixIter<'a, A> {
    type Item = PrefixMatch<'a>;

    fn next(&mut self) -> Option<PrefixMatch<'a>> {
        let trie = self.trie;
        match self.state {
            ScanState::Done => return None,
            ScanState::Start => {
                self.state = ScanState::Scanning;
                if trie.is_terminal(0) {
                    return Some(self.hit());
                }
            }
            ScanState::Scanning => {}
        }

        while !trie.array.is_leaf(self.node_id) {
            let next = self
                .query
                .get(self.pos)
                .and_then(|&b| trie.child(self.node_id, b));
            let Some(child_id) = next else {
                self.state = ScanState::Done;
                return None;
            };
            self.node_id = child_id;
            self.pos += 1;
            if !trie.array.is_leaf(child_id) && trie.is_terminal(child_id) {
                return Some(self.hit());
            }
        }

        // A leaf ends the scan: at most one more hit, if its key is a
        // prefix of the query.
        self.state = ScanState::Done;
        let rest = &self.query[self.pos..];
        let len = trie.match_suffix_within(rest, trie.array.link(self.node_id))?;
        self.pos += len;
        Some(self.hit())
    }
}

impl<A: PackedArray> FusedIterator for PrefixIter<'_, A> {}

/// DFS frame: the node, its depth in the key buffer, and the byte of the
/// edge leading into it.
#[derive(Clone, Copy, Debug)]
struct Frame {
    depth: usize,
    byte: u8,
    node_id: u32,
}

/// Outcome of walking the fixed prefix.
enum Descent {
    /// The prefix ends on a branching node; enumerate its subtree.
    Subtree(u32),
    /// The prefix runs into a leaf whose key extends it.
    Leaf(u32),
    Miss,
}

/// Iterator over the registered keys that extend a prefix, in ascending
/// byte order.
///
/// Created by [`Trie::predictive_search`].
pub struct PredictiveIter<'a, A: PackedArray> {
    trie: &'a Trie<A>,
    prefix: &'a [u8],
    state: ScanState,
    /// Pending subtrees. Children are pushed in descending byte order so
    /// they pop in ascending order.
    stack: Vec<Frame>,
    /// Key of the most recent node; truncated and rewritten per frame.
    buf: Vec<u8>,
}

impl<A: PackedArray> PredictiveIter<'_, A> {
    fn descend(&mut self) -> Descent {
        let trie = self.trie;
        let mut node_id = 0;
        for (pos, &b) in self.prefix.iter().enumerate() {
            if trie.array.is_leaf(node_id) {
                let rest = &self.prefix[pos..];
                let Some(remainder) = trie.match_suffix_prefix(rest, trie.array.link(node_id))
                else {
                    return Descent::Miss;
                };
                self.buf.extend_from_slice(rest);
                trie.extract_suffix(remainder, &mut self.buf);
                return Descent::Leaf(node_id);
            }
            match trie.child(node_id, b) {
                Some(child_id) => {
                    node_id = child_id;
                    self.buf.push(b);
                }
                None => return Descent::Miss,
            }
        }
        Descent::Subtree(node_id)
    }
}

impl<A: PackedArray> Iterator for PredictiveIter<'_, A> {
    type Item = SearchMatch;

    fn next(&mut self) -> Option<SearchMatch> {
        let trie = self.trie;
        match self.state {
            ScanState::Done => return None,
            ScanState::Start => {
                self.state = ScanState::Scanning;
                match self.descend() {
                    Descent::Subtree(node_id) => self.stack.push(Frame {
                        depth: self.buf.len(),
                        byte: self.buf.last().copied().unwrap_or(0),
                        node_id,
                    }),
                    Descent::Leaf(node_id) => {
                        self.state = ScanState::Done;
                        return Some(SearchMatch {
                            key: std::mem::take(&mut self.buf),
                            id: trie.to_key_id(node_id),
                        });
                    }
                    Descent::Miss => {
                        self.state = ScanState::Done;
                        return None;
                    }
                }
            }
            ScanState::Scanning => {}
        }

        while let Some(frame) = self.stack.pop() {
            if frame.depth > 0 {
                self.buf.resize(frame.depth, 0);
                self.buf[frame.depth - 1] = frame.byte;
            }
            let node_id = frame.node_id;

            if trie.array.is_leaf(node_id) {
                trie.extract_suffix(trie.array.link(node_id), &mut self.buf);
                return Some(SearchMatch {
                    key: self.buf.clone(),
                    id: trie.to_key_id(node_id),
                });
            }

            for &b in trie.alphabet.iter().rev() {
                if let Some(child_id) = trie.child(node_id, b) {
                    self.stack.push(Frame {
                        depth: frame.depth + 1,
                        byte: b,
                        node_id: child_id,
                    });
                }
            }

            // A key precedes all of its extensions.
            if trie.is_terminal(node_id) {
                return Some(SearchMatch {
                    key: self.buf.clone(),
                    id: trie.to_key_id(node_id),
                });
            }
        }

        self.state = ScanState::Done;
        None
    }
}

impl<A: PackedArray> FusedIterator for PredictiveIter<'_, A> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FastTrie, SmallTrie, TrieBuilder};

    fn build_fast(keys: &[&[u8]]) -> FastTrie {
        FastTrie::build(keys).unwrap()
    }

    fn keys_of(matches: impl Iterator<Item = SearchMatch>) -> Vec<Vec<u8>> {
        matches.map(|m| m.key).collect()
    }

    // === lookup tests ===

    #[test]
    fn lookup_found() {
        let trie = build_fast(&[b"abc", b"abd", b"xyz"]);
        for key in [&b"abc"[..], b"abd", b"xyz"] {
            let id = trie.lookup(key).unwrap();
            assert!((id as usize) < trie.num_keys());
        }
    }

    #[test]
    fn lookup_not_found() {
        let trie = build_fast(&[b"abc", b"abd"]);
        assert_eq!(trie.lookup(b"ab"), None);
        assert_eq!(trie.lookup(b"abcd"), None);
        assert_eq!(trie.lookup(b"zzz"), None);
        assert_eq!(trie.lookup(b""), None);
    }

    #[test]
    fn lookup_prefix_only() {
        // "ab" is a prefix of "abc" but not a key itself
        let trie = build_fast(&[b"abc"]);
        assert_eq!(trie.lookup(b"ab"), None);
        assert_eq!(trie.lookup(b"a"), None);
        assert_eq!(trie.lookup(b"abc"), Some(0));
    }

    #[test]
    fn lookup_empty_trie() {
        let trie = build_fast(&[]);
        assert!(trie.is_empty());
        assert_eq!(trie.lookup(b"abc"), None);
        assert_eq!(trie.lookup(b""), None);
    }

    #[test]
    fn lookup_empty_key() {
        let trie = build_fast(&[b"", b"a"]);
        let id = trie.lookup(b"").unwrap();
        assert_eq!(trie.access(id), b"");
        assert_ne!(trie.lookup(b"a"), Some(id));
    }

    #[test]
    fn lookup_bytes_outside_alphabet() {
        let trie = build_fast(&[b"ab", b"ac"]);
        assert_eq!(trie.lookup(b"a\xff"), None);
        assert_eq!(trie.lookup(b"\0"), None);
        assert_eq!(trie.lookup(b"ab\0"), None);
    }

    // === access tests ===

    #[test]
    fn access_inverts_lookup() {
        let keys: Vec<&[u8]> = vec![b"a", b"ab", b"abc", b"b", b"bc", b"bcd", b"tail-heavy"];
        let trie = build_fast(&keys);
        let mut seen = vec![false; keys.len()];
        for key in &keys {
            let id = trie.lookup(key).unwrap();
            assert_eq!(trie.access(id), *key);
            assert!(!seen[id as usize], "id {id} assigned twice");
            seen[id as usize] = true;
        }
    }

    #[test]
    fn access_out_of_range_is_empty() {
        let trie = build_fast(&[b"a", b"b"]);
        assert_eq!(trie.access(2), Vec::<u8>::new());
        assert_eq!(trie.access(u32::MAX), Vec::<u8>::new());
    }

    // === common_prefix_search tests ===

    #[test]
    fn common_prefix_search_scenario() {
        let trie = build_fast(&[b"a", b"an", b"and", b"ant"]);
        let results: Vec<PrefixMatch> = trie.common_prefix_search(b"ant").collect();
        let keys: Vec<&[u8]> = results.iter().map(|m| m.key).collect();
        assert_eq!(keys, vec![&b"a"[..], &b"an"[..], &b"ant"[..]]);
        for m in &results {
            assert_eq!(trie.lookup(m.key), Some(m.id));
        }
    }

    #[test]
    fn common_prefix_search_no_match() {
        let trie = build_fast(&[b"abc"]);
        assert_eq!(trie.common_prefix_search(b"xyz").count(), 0);
    }

    #[test]
    fn common_prefix_search_query_shorter_than_leaf() {
        let trie = build_fast(&[b"abc"]);
        assert_eq!(trie.common_prefix_search(b"ab").count(), 0);
        assert_eq!(trie.common_prefix_search(b"").count(), 0);
    }

    #[test]
    fn common_prefix_search_query_runs_past_keys() {
        let trie = build_fast(&[b"a", b"ab", b"abc", b"b"]);
        let lens: Vec<usize> = trie
            .common_prefix_search(b"abcd")
            .map(|m| m.key.len())
            .collect();
        assert_eq!(lens, vec![1, 2, 3]);
    }

    #[test]
    fn common_prefix_search_empty_key_first() {
        let trie = build_fast(&[b"", b"x", b"xy"]);
        let keys: Vec<&[u8]> = trie.common_prefix_search(b"xyz").map(|m| m.key).collect();
        assert_eq!(keys, vec![&b""[..], &b"x"[..], &b"xy"[..]]);
    }

    #[test]
    fn common_prefix_search_leaf_suffix_inside_query() {
        let trie = build_fast(&[b"abc", b"b"]);
        let keys: Vec<&[u8]> = trie.common_prefix_search(b"abcdef").map(|m| m.key).collect();
        assert_eq!(keys, vec![&b"abc"[..]]);
        assert_eq!(trie.common_prefix_search(b"abd").count(), 0);
    }

    #[test]
    fn common_prefix_search_is_fused() {
        let trie = build_fast(&[b"a"]);
        let mut it = trie.common_prefix_search(b"a");
        assert!(it.next().is_some());
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    // === predictive_search tests ===

    #[test]
    fn predictive_search_scenario() {
        let trie = build_fast(&[b"a", b"an", b"and", b"ant"]);
        let results: Vec<SearchMatch> = trie.predictive_search(b"an").collect();
        let keys: Vec<&[u8]> = results.iter().map(|m| m.key.as_slice()).collect();
        assert_eq!(keys, vec![&b"an"[..], &b"and"[..], &b"ant"[..]]);
        for m in &results {
            assert_eq!(trie.lookup(&m.key), Some(m.id));
        }
    }

    #[test]
    fn predictive_search_empty_prefix_lists_everything_sorted() {
        let keys: Vec<&[u8]> = vec![b"", b"a", b"ab", b"abc", b"b", b"ba", b"zz"];
        let trie = build_fast(&keys);
        let got = keys_of(trie.predictive_search(b""));
        let want: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn predictive_search_prefix_inside_tail() {
        let trie = build_fast(&[b"apple", b"banana"]);
        assert_eq!(keys_of(trie.predictive_search(b"ban")), vec![b"banana".to_vec()]);
        assert_eq!(keys_of(trie.predictive_search(b"banana")), vec![b"banana".to_vec()]);
        assert!(keys_of(trie.predictive_search(b"bananas")).is_empty());
        assert!(keys_of(trie.predictive_search(b"bx")).is_empty());
    }

    #[test]
    fn predictive_search_no_match() {
        let trie = build_fast(&[b"abc"]);
        assert_eq!(trie.predictive_search(b"x").count(), 0);
        let empty = build_fast(&[]);
        assert_eq!(empty.predictive_search(b"").count(), 0);
    }

    #[test]
    fn predictive_search_buffer_regrows_after_leaf() {
        // A long leaf key is yielded before a shorter sibling branch.
        let keys: Vec<&[u8]> = vec![b"aaaaaaaa", b"ab", b"abc"];
        let trie = build_fast(&keys);
        let want: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
        assert_eq!(keys_of(trie.predictive_search(b"a")), want);
    }

    // === binary mode ===

    #[test]
    fn binary_mode_keys_with_nul() {
        let keys: Vec<&[u8]> = vec![b"\0", b"\0\0", b"a\0", b"a\0b\0c", b"ab"];
        let trie = build_fast(&keys);
        assert!(trie.bin_mode());
        for key in &keys {
            let id = trie.lookup(key).unwrap();
            assert_eq!(trie.access(id), *key);
        }
        assert_eq!(trie.lookup(b"a\0b"), None);
        assert_eq!(trie.lookup(b"a\0b\0c\0"), None);

        let want: Vec<Vec<u8>> = vec![b"a\0".to_vec(), b"a\0b\0c".to_vec()];
        assert_eq!(keys_of(trie.predictive_search(b"a\0")), want);

        let prefixes: Vec<&[u8]> = trie
            .common_prefix_search(b"a\0b\0c")
            .map(|m| m.key)
            .collect();
        assert_eq!(prefixes, vec![&b"a\0"[..], &b"a\0b\0c"[..]]);
    }

    #[test]
    fn forced_binary_mode_matches_text_mode() {
        let keys: Vec<&[u8]> = vec![b"car", b"card", b"care", b"cart", b"dog"];
        let text = build_fast(&keys);
        let bin: FastTrie = TrieBuilder::new().bin_mode(true).build(&keys).unwrap();
        assert!(!text.bin_mode());
        assert!(bin.bin_mode());
        for key in &keys {
            assert_eq!(
                text.access(text.lookup(key).unwrap()),
                bin.access(bin.lookup(key).unwrap())
            );
        }
        assert_eq!(
            keys_of(text.predictive_search(b"car")),
            keys_of(bin.predictive_search(b"car"))
        );
    }

    // === small encoding ===

    #[test]
    fn small_trie_agrees_with_fast() {
        let keys: Vec<&[u8]> = vec![b"a", b"an", b"and", b"ant", b"bee", b"beer", b"beet"];
        let fast = build_fast(&keys);
        let small = SmallTrie::build(&keys).unwrap();
        for key in &keys {
            assert_eq!(fast.lookup(key), small.lookup(key));
        }
        for id in 0..fast.num_keys() as u32 {
            assert_eq!(fast.access(id), small.access(id));
        }
        assert_eq!(
            keys_of(fast.predictive_search(b"be")),
            keys_of(small.predictive_search(b"be"))
        );
    }
}
