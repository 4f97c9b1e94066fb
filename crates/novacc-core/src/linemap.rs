//! Preprocessed-line map (spec §3.8). Indexed by 1-based preprocessed line
//! number; each entry traces that line back to its originating source file,
//! source line, and the line in the parent file that `#include`d it (0 for
//! the top-level file), forming a tree walkable to reconstruct include
//! stacks on diagnostics (spec §7, §9 "`FileTree`").

use crate::interner::StringHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry {
    pub source_file_index: u32,
    pub source_line: u32,
    /// Preprocessed line, in the parent file, containing the `#include`
    /// that pulled this file in. 0 for the top-level translation unit.
    pub parent_line: u32,
}

#[derive(Default)]
pub struct LineMap {
    /// 0-indexed; `entries[0]` corresponds to preprocessed line 1.
    entries: Vec<LineEntry>,
    files: Vec<StringHandle>,
}

impl LineMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_file(&mut self, name: StringHandle) -> u32 {
        if let Some(pos) = self.files.iter().position(|f| *f == name) {
            return pos as u32;
        }
        self.files.push(name);
        (self.files.len() - 1) as u32
    }

    pub fn file_name(&self, index: u32) -> StringHandle {
        self.files[index as usize]
    }

    /// Appends an entry for the next preprocessed output line.
    pub fn append_line_with_tracking(
        &mut self,
        source_file_index: u32,
        source_line: u32,
        parent_line: u32,
    ) -> u32 {
        self.entries.push(LineEntry {
            source_file_index,
            source_line,
            parent_line,
        });
        self.entries.len() as u32 // the 1-based preprocessed line just appended
    }

    /// Looks up the entry for 1-based preprocessed line `line`.
    pub fn get(&self, line: u32) -> Option<LineEntry> {
        if line == 0 {
            return None;
        }
        self.entries.get((line - 1) as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walks `parent_line` from `line` up to the top-level file, returning
    /// `(file, line)` pairs innermost-first, suitable for the
    /// `included from <file>:<line>` diagnostic chain (spec §7).
    pub fn include_chain(&self, line: u32) -> Vec<(StringHandle, u32)> {
        let mut chain = Vec::new();
        let mut current = line;
        let mut guard = 0usize;
        while let Some(entry) = self.get(current) {
            chain.push((self.file_name(entry.source_file_index), entry.source_line));
            if entry.parent_line == 0 {
                break;
            }
            current = entry.parent_line;
            guard += 1;
            if guard > self.entries.len() + 1 {
                // Defensive: a malformed map must not spin forever even
                // though well-formed include trees are finite and acyclic.
                break;
            }
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;

    #[test]
    fn round_trips_simple_single_file() {
        let interner = Interner::new();
        let mut map = LineMap::new();
        let file = map.register_file(interner.intern("main.cpp"));
        for i in 1..=3u32 {
            map.append_line_with_tracking(file, i, 0);
        }
        let entry = map.get(2).unwrap();
        assert_eq!(entry.source_line, 2);
        assert_eq!(entry.parent_line, 0);
    }

    #[test]
    fn include_chain_walks_to_top_level() {
        let interner = Interner::new();
        let mut map = LineMap::new();
        let top = map.register_file(interner.intern("main.cpp"));
        let header = map.register_file(interner.intern("a.h"));
        // main.cpp line 1: #include "a.h"
        map.append_line_with_tracking(top, 1, 0); // preprocessed line 1
        // a.h line 1, included from preprocessed line 1
        map.append_line_with_tracking(header, 1, 1); // preprocessed line 2
        let chain = map.include_chain(2);
        assert_eq!(chain.len(), 2);
        assert_eq!(&*interner.view(chain[0].0), "a.h");
        assert_eq!(&*interner.view(chain[1].0), "main.cpp");
    }
}
