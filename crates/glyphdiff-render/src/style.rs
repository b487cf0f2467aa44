#![forbid(unsafe_code)]

//! Style interning.
//!
//! A style is an ordered list of `(open, close)` escape-code pairs. The
//! [`StyleRegistry`] dedupes those lists into dense [`StyleId`]s so that cell
//! comparisons are a single integer compare.
//!
//! # Invariants
//!
//! 1. `StyleId::NONE` (0) always maps to the empty list.
//! 2. Two cells with equal ids serialize identical escape sequences, as long
//!    as both were painted through the same registry.
//! 3. Ids are never reclaimed; the registry only grows.

use rustc_hash::FxHashMap;

/// One escape-code pair: the sequence that turns a style on and the one that
/// turns it off again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StylePair {
    /// Sequence emitted before styled glyphs.
    pub open: String,
    /// Sequence emitted to end the style.
    pub close: String,
}

impl StylePair {
    /// Create a pair from its open and close sequences.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

/// Dense handle for an interned style list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct StyleId(u32);

impl StyleId {
    /// The empty style.
    pub const NONE: Self = Self(0);

    /// Raw index into the registry.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// True for [`StyleId::NONE`].
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Interning table from style lists to [`StyleId`]s.
///
/// Alongside the reverse lookup the registry caches the byte length of each
/// style's open and close sequences, which is what the diff cost model needs.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    ids: FxHashMap<Box<[StylePair]>, StyleId>,
    styles: Vec<Box<[StylePair]>>,
    open_lens: Vec<usize>,
    close_lens: Vec<usize>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    /// Create a registry holding only the empty style.
    pub fn new() -> Self {
        Self {
            ids: FxHashMap::default(),
            styles: vec![Box::default()],
            open_lens: vec![0],
            close_lens: vec![0],
        }
    }

    /// Return the id for `styles`, interning it on first sight.
    ///
    /// An empty list always yields [`StyleId::NONE`].
    pub fn get_id(&mut self, styles: &[StylePair]) -> StyleId {
        if styles.is_empty() {
            return StyleId::NONE;
        }
        if let Some(&id) = self.ids.get(styles) {
            return id;
        }

        let id = StyleId(self.styles.len() as u32);
        let key: Box<[StylePair]> = styles.into();
        self.open_lens
            .push(key.iter().map(|pair| pair.open.len()).sum());
        self.close_lens
            .push(key.iter().map(|pair| pair.close.len()).sum());
        self.styles.push(key.clone());
        self.ids.insert(key, id);

        #[cfg(feature = "tracing")]
        tracing::trace!(id = id.0, pairs = styles.len(), "style interned");

        id
    }

    /// Inverse lookup. Unknown ids resolve to the empty list.
    #[inline]
    pub fn get_styles(&self, id: StyleId) -> &[StylePair] {
        self.styles.get(id.index()).map_or(&[][..], |styles| &styles[..])
    }

    /// Number of interned styles, including the empty style.
    #[inline]
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Always false: the empty style is always present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Total bytes of the open sequences of `id`.
    #[inline]
    pub fn open_len(&self, id: StyleId) -> usize {
        self.open_lens.get(id.index()).copied().unwrap_or(0)
    }

    /// Total bytes of the close sequences of `id`.
    #[inline]
    pub fn close_len(&self, id: StyleId) -> usize {
        self.close_lens.get(id.index()).copied().unwrap_or(0)
    }

    /// Bytes needed to switch the active style from `from` to `to`.
    #[inline]
    pub fn transition_len(&self, from: StyleId, to: StyleId) -> usize {
        if from == to {
            0
        } else {
            self.close_len(from) + self.open_len(to)
        }
    }

    /// Append the open sequences of `id` in order.
    pub fn push_open(&self, id: StyleId, out: &mut Vec<u8>) {
        for pair in self.get_styles(id) {
            out.extend_from_slice(pair.open.as_bytes());
        }
    }

    /// Append the close sequences of `id` in reverse order.
    pub fn push_close(&self, id: StyleId, out: &mut Vec<u8>) {
        for pair in self.get_styles(id).iter().rev() {
            out.extend_from_slice(pair.close.as_bytes());
        }
    }

    /// Append the bytes switching the active style from `from` to `to`.
    pub fn push_transition(&self, from: StyleId, to: StyleId, out: &mut Vec<u8>) {
        if from != to {
            self.push_close(from, out);
            self.push_open(to, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> StylePair {
        StylePair::new("\x1b[1m", "\x1b[22m")
    }

    fn red() -> StylePair {
        StylePair::new("\x1b[31m", "\x1b[39m")
    }

    #[test]
    fn empty_list_is_none() {
        let mut registry = StyleRegistry::new();
        assert_eq!(registry.get_id(&[]), StyleId::NONE);
        assert!(registry.get_styles(StyleId::NONE).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_list_same_id() {
        let mut registry = StyleRegistry::new();
        let a = registry.get_id(&[bold(), red()]);
        let b = registry.get_id(&[bold(), red()]);
        assert_eq!(a, b);
        assert_ne!(a, StyleId::NONE);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn order_matters() {
        let mut registry = StyleRegistry::new();
        let a = registry.get_id(&[bold(), red()]);
        let b = registry.get_id(&[red(), bold()]);
        assert_ne!(a, b);
    }

    #[test]
    fn reverse_lookup_roundtrips() {
        let mut registry = StyleRegistry::new();
        let id = registry.get_id(&[red()]);
        assert_eq!(registry.get_styles(id), &[red()]);
    }

    #[test]
    fn close_is_emitted_in_reverse() {
        let mut registry = StyleRegistry::new();
        let id = registry.get_id(&[bold(), red()]);
        let mut out = Vec::new();
        registry.push_close(id, &mut out);
        assert_eq!(out, b"\x1b[39m\x1b[22m");
    }

    #[test]
    fn transition_lengths_match_bytes() {
        let mut registry = StyleRegistry::new();
        let a = registry.get_id(&[bold()]);
        let b = registry.get_id(&[red()]);
        let mut out = Vec::new();
        registry.push_transition(a, b, &mut out);
        assert_eq!(out.len(), registry.transition_len(a, b));
        assert_eq!(registry.transition_len(a, a), 0);
    }

    #[test]
    fn unknown_id_is_empty() {
        let registry = StyleRegistry::new();
        assert!(registry.get_styles(StyleId(99)).is_empty());
        assert_eq!(registry.open_len(StyleId(99)), 0);
    }
}
