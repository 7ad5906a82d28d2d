use std::fmt;

use crate::{PackedArray, Trie};

/// Size and shape statistics of a [`Trie`].
///
/// The `Display` impl renders a human-readable report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieStats {
    /// Encoding of the packed array (`"fast"` or `"small"`).
    pub variant: &'static str,
    /// Number of registered keys.
    pub num_keys: usize,
    /// Number of distinct key bytes.
    pub alphabet_size: usize,
    /// Number of nodes, free slots included.
    pub num_nodes: usize,
    /// Number of nodes that belong to the trie.
    pub num_used_nodes: usize,
    /// Number of free slots.
    pub num_free_nodes: usize,
    /// Total serialized size in bytes.
    pub size_in_bytes: usize,
    /// Byte size of each top-level component.
    pub components: Vec<(&'static str, usize)>,
    /// Byte size of each part of the packed array.
    pub array_components: Vec<(&'static str, usize)>,
}

impl<A: PackedArray> Trie<A> {
    /// Collects size and shape statistics.
    pub fn stats(&self) -> TrieStats {
        TrieStats {
            variant: A::NAME,
            num_keys: self.num_keys(),
            alphabet_size: self.alphabet_size(),
            num_nodes: self.num_nodes(),
            num_used_nodes: self.num_used_nodes(),
            num_free_nodes: self.num_free_nodes(),
            size_in_bytes: self.size_in_bytes(),
            components: vec![
                ("array", self.array.size_in_bytes()),
                ("terminal_flags", self.terminal_flags.size_in_bytes()),
                ("tail", 8 + self.tail.len()),
                ("boundary_flags", self.boundary_flags.size_in_bytes()),
                ("alphabet", 8 + self.alphabet.len()),
                ("table", self.code_table.as_raw().len()),
                ("scalars", 17),
            ],
            array_components: self.array.components(),
        }
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl fmt::Display for TrieStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "basic statistics of Trie<{}>", self.variant)?;
        writeln!(f, "\tnum keys:       {}", self.num_keys)?;
        writeln!(f, "\talphabet size:  {}", self.alphabet_size)?;
        writeln!(f, "\tnum nodes:      {}", self.num_nodes)?;
        writeln!(f, "\tnum used nodes: {}", self.num_used_nodes)?;
        writeln!(f, "\tnum free nodes: {}", self.num_free_nodes)?;
        writeln!(f, "\tsize in bytes:  {}", self.size_in_bytes)?;
        writeln!(f, "member size statistics of Trie<{}>", self.variant)?;
        for &(name, size) in &self.components {
            writeln!(
                f,
                "\t{:<15} {:>10} ({:5.2}%)",
                format!("{name}:"),
                size,
                ratio(size, self.size_in_bytes)
            )?;
        }
        writeln!(f, "packed array breakdown")?;
        for &(name, size) in &self.array_components {
            writeln!(
                f,
                "\t{:<15} {:>10} ({:5.2}%)",
                format!("{name}:"),
                size,
                ratio(size, self.size_in_bytes)
            )?;
        }
        Ok(())
    }
}
