use std::collections::HashMap;

/// Stable handle to a registered source.
///
/// Handles are unique per set for its whole lifetime; they are never reused,
/// so a stale handle degrades to a lookup miss instead of aliasing another
/// source. Identity is the handle, never a display name — names may collide
/// (two renderers called "Body") and must not key anything.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SourceId(u32);

/// Insertion-ordered source registry.
///
/// Requirements served:
/// - stable ordinal per source (registration order)
/// - O(1) lookup by handle
/// - iteration in registration order
///
/// Internally an arena (`Vec`) carries the records in order and a side table
/// maps handles to arena slots.
#[derive(Debug)]
pub struct SourceSet<S> {
    records: Vec<(SourceId, S)>,
    lookup: HashMap<SourceId, usize>,
    next_id: u32,
}

impl<S> SourceSet<S> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            lookup: HashMap::new(),
            next_id: 0,
        }
    }

    /// Registers a source and returns its stable handle.
    ///
    /// The source's ordinal is `len() - 1` at the time of insertion and never
    /// changes afterwards.
    pub fn insert(&mut self, source: S) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;

        self.lookup.insert(id, self.records.len());
        self.records.push((id, source));
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: SourceId) -> Option<&S> {
        self.lookup.get(&id).map(|&i| &self.records[i].1)
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut S> {
        let i = *self.lookup.get(&id)?;
        Some(&mut self.records[i].1)
    }

    /// Registration-order ordinal of a source.
    pub fn ordinal_of(&self, id: SourceId) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    /// Iterates sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &S)> {
        self.records.iter().map(|(id, s)| (*id, s))
    }

    /// Mutable iteration in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SourceId, &mut S)> {
        self.records.iter_mut().map(|(id, s)| (*id, &mut *s))
    }

    /// Removes every source. Existing handles become misses; handles are not
    /// reused by later insertions.
    pub fn clear(&mut self) {
        self.records.clear();
        self.lookup.clear();
    }
}

impl<S> Default for SourceSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FromIterator<S> for SourceSet<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = Self::new();
        for s in iter {
            set.insert(s);
        }
        set
    }
}
