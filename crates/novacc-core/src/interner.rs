//! Process-wide string interner.
//!
//! Append-only: `intern` never removes or mutates a previously returned
//! [`StringHandle`]. Text is stored in fixed-size arena chunks so that a
//! [`&str`] handed out by [`Interner::view`] stays valid for the lifetime of
//! the interner, letting tokens and AST nodes hold `StringHandle` cheaply
//! instead of an owned `String`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Opaque, pointer-equal identifier into the interner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringHandle(u32);

impl fmt::Display for StringHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Chunk {
    data: String,
}

/// Temporary accumulator for strings assembled piece by piece (macro
/// stringification, mangled-name construction, …). `commit()` hands the
/// finished text to the interner and returns a stable handle.
#[derive(Default)]
pub struct StringBuilder {
    buf: String,
}

impl StringBuilder {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.buf.push_str(s);
        self
    }

    pub fn push(&mut self, c: char) -> &mut Self {
        self.buf.push(c);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn commit(self, interner: &Interner) -> StringHandle {
        interner.intern(&self.buf)
    }
}

/// Process-wide, append-only string interner.
///
/// Interior mutability (`RefCell`) is sufficient: spec §5 establishes a
/// single logical thread of control for the whole compilation.
pub struct Interner {
    inner: RefCell<InternerState>,
}

struct InternerState {
    map: HashMap<Box<str>, StringHandle>,
    // Index into `entries` for each handle; entries borrow from `chunks`.
    entries: Vec<(u32, u32, u32)>, // (chunk index, start offset, len)
    chunks: Vec<Chunk>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        Interner {
            inner: RefCell::new(InternerState {
                map: HashMap::new(),
                entries: Vec::new(),
                chunks: vec![Chunk {
                    data: String::with_capacity(CHUNK_SIZE),
                }],
            }),
        }
    }

    /// Interns `text`, returning a stable handle. Repeated interning of the
    /// same text returns the same handle (bijective, never reallocated).
    pub fn intern(&self, text: &str) -> StringHandle {
        {
            let state = self.inner.borrow();
            if let Some(handle) = state.map.get(text) {
                return *handle;
            }
        }
        let mut state = self.inner.borrow_mut();
        // Re-check under the write lock in case of a race under future
        // multi-threaded use; harmless under the current single-thread model.
        if let Some(handle) = state.map.get(text) {
            return *handle;
        }
        if state.chunks.last().unwrap().data.len() + text.len() > CHUNK_SIZE {
            state.chunks.push(Chunk {
                data: String::with_capacity(CHUNK_SIZE.max(text.len())),
            });
        }
        let chunk_idx = state.chunks.len() as u32 - 1;
        let chunk = &mut state.chunks[chunk_idx as usize];
        let start = chunk.data.len() as u32;
        chunk.data.push_str(text);
        let handle = StringHandle(state.entries.len() as u32);
        state
            .entries
            .push((chunk_idx, start, text.len() as u32));
        state.map.insert(text.into(), handle);
        handle
    }

    /// Borrows the text behind `handle`.
    ///
    /// # Panics
    /// Panics if `handle` was not produced by this interner.
    pub fn view(&self, handle: StringHandle) -> std::cell::Ref<'_, str> {
        std::cell::Ref::map(self.inner.borrow(), |state| {
            let (chunk, start, len) = state.entries[handle.0 as usize];
            &state.chunks[chunk as usize].data[start as usize..(start + len) as usize]
        })
    }

    pub fn view_owned(&self, handle: StringHandle) -> String {
        self.view(handle).to_string()
    }

    pub fn builder(&self) -> StringBuilder {
        StringBuilder::new()
    }

    /// Allocator statistics for `--perf-stats`.
    pub fn stats(&self) -> InternerStats {
        let state = self.inner.borrow();
        InternerStats {
            unique_strings: state.entries.len(),
            chunks: state.chunks.len(),
            bytes_committed: state.chunks.iter().map(|c| c.data.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InternerStats {
    pub unique_strings: usize,
    pub chunks: usize,
    pub bytes_committed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_are_stable_and_deduplicated() {
        let interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        let c = interner.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&*interner.view(a), "hello");
        assert_eq!(&*interner.view(c), "world");
    }

    #[test]
    fn builder_commits_concatenated_text() {
        let interner = Interner::new();
        let mut b = interner.builder();
        b.push_str("foo").push('_').push_str("bar");
        let handle = b.commit(&interner);
        assert_eq!(&*interner.view(handle), "foo_bar");
    }

    #[test]
    fn survives_chunk_boundary() {
        let interner = Interner::new();
        let long = "x".repeat(CHUNK_SIZE + 10);
        let h1 = interner.intern(&long);
        let h2 = interner.intern("short");
        assert_eq!(interner.view(h1).len(), long.len());
        assert_eq!(&*interner.view(h2), "short");
    }
}
