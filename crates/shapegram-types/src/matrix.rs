//! Change/index model.
//!
//! A [`Matrix`] is a sparse tree mirroring hierarchical indices: every
//! addressable slot holds nothing, a value, or a nested sub-matrix. Each
//! matrix caches the number of non-empty leaves below it, so a hierarchical
//! index can be translated into a flat list position by prefix-summing the
//! sizes of earlier siblings at every level.
//!
//! Matrices are persistent: [`Matrix::apply_change`] returns a new matrix
//! that shares every untouched sub-matrix with the old one.

use crate::index::Index;
use std::rc::Rc;

// ══════════════════════════════════════════════════════════════════════════════
// Changes
// ══════════════════════════════════════════════════════════════════════════════

/// A single leaf update addressed by a hierarchical index.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub index: Index,
    pub kind: ChangeKind<T>,
}

/// What a change does to its leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind<T> {
    /// Store a value, replacing whatever occupied the slot.
    Set(T),
    /// Clear the slot and everything below it.
    Unset,
}

impl<T> Change<T> {
    pub fn set(index: Index, value: T) -> Self {
        Self {
            index,
            kind: ChangeKind::Set(value),
        }
    }

    pub fn unset(index: Index) -> Self {
        Self {
            index,
            kind: ChangeKind::Unset,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Matrix
// ══════════════════════════════════════════════════════════════════════════════

/// One addressable position of a matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Empty,
    Value(T),
    Nested(Rc<Matrix<T>>),
}

impl<T> Slot<T> {
    /// Number of non-empty leaves held by this slot.
    pub fn size(&self) -> usize {
        match self {
            Slot::Empty => 0,
            Slot::Value(_) => 1,
            Slot::Nested(m) => m.size,
        }
    }
}

/// A sparse tree of values addressed by hierarchical index.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    slots: Vec<Slot<T>>,
    size: usize,
}

/// Where an index lands in the flat projection of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Flat position of the first leaf at or after the index.
    pub position: usize,
    /// Leaves a change at this index would displace.
    pub occupied: usize,
    /// The index passes through an existing value leaf.
    pub through_value: bool,
}

impl<T> Default for Matrix<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            size: 0,
        }
    }
}

impl<T> Matrix<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-empty leaves in the whole matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    /// The value stored exactly at `index`.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        let (&head, rest) = index.split_first()?;
        match (self.slots.get(head)?, rest.is_empty()) {
            (Slot::Value(v), true) => Some(v),
            (Slot::Nested(m), false) => m.get(rest),
            _ => None,
        }
    }

    /// Translate `index` into a flat position by prefix-summing the sizes
    /// of earlier siblings at each level.
    pub fn locate(&self, index: &[usize]) -> Location {
        let mut location = Location {
            position: 0,
            occupied: 0,
            through_value: false,
        };
        let mut matrix = self;
        let mut rest = index;
        while let Some((&head, tail)) = rest.split_first() {
            location.position += matrix
                .slots
                .iter()
                .take(head)
                .map(Slot::size)
                .sum::<usize>();
            match matrix.slots.get(head) {
                None | Some(Slot::Empty) => return location,
                Some(slot) if tail.is_empty() => {
                    location.occupied = slot.size();
                    return location;
                }
                Some(Slot::Value(_)) => {
                    location.occupied = 1;
                    location.through_value = true;
                    return location;
                }
                Some(Slot::Nested(m)) => matrix = m.as_ref(),
            }
            rest = tail;
        }
        location
    }
}

impl<T: Clone> Matrix<T> {
    /// Apply one change, returning the updated matrix.
    ///
    /// A `Set` below an existing value replaces that value with a
    /// sub-matrix. An `Unset` that addresses nothing, or passes through a
    /// value, returns an unchanged copy. Empty indices are ignored.
    pub fn apply_change(&self, change: &Change<T>) -> Matrix<T> {
        self.apply_at(&change.index, &change.kind)
    }

    fn apply_at(&self, index: &[usize], kind: &ChangeKind<T>) -> Matrix<T> {
        let Some((&head, rest)) = index.split_first() else {
            return self.clone();
        };
        let current = self.slots.get(head);

        let replacement = if rest.is_empty() {
            match kind {
                ChangeKind::Set(value) => Slot::Value(value.clone()),
                ChangeKind::Unset => Slot::Empty,
            }
        } else {
            let nested = match (current, kind) {
                (Some(Slot::Nested(m)), _) => m.apply_at(rest, kind),
                (_, ChangeKind::Set(_)) => Matrix::new().apply_at(rest, kind),
                (_, ChangeKind::Unset) => return self.clone(),
            };
            if nested.is_empty() {
                Slot::Empty
            } else {
                Slot::Nested(Rc::new(nested))
            }
        };

        let old_size = current.map_or(0, Slot::size);
        let new_size = replacement.size();
        let mut slots = self.slots.clone();
        if head >= slots.len() {
            if new_size == 0 {
                return self.clone();
            }
            slots.resize(head + 1, Slot::Empty);
        }
        slots[head] = replacement;
        while matches!(slots.last(), Some(Slot::Empty)) {
            slots.pop();
        }
        Matrix {
            slots,
            size: self.size - old_size + new_size,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Flat projection
// ══════════════════════════════════════════════════════════════════════════════

/// All leaves of a matrix in index order.
pub fn matrix_to_list<T: Clone>(matrix: &Matrix<T>) -> Vec<T> {
    let mut list = Vec::with_capacity(matrix.size());
    collect_leaves(matrix, &mut list);
    list
}

fn collect_leaves<T: Clone>(matrix: &Matrix<T>, out: &mut Vec<T>) {
    for slot in &matrix.slots {
        match slot {
            Slot::Empty => {}
            Slot::Value(v) => out.push(v.clone()),
            Slot::Nested(m) => collect_leaves(m, out),
        }
    }
}

/// A flat matrix with `list[i]` stored at index `[i]`.
pub fn list_to_matrix<T: Clone>(list: &[T]) -> Matrix<T> {
    Matrix {
        slots: list.iter().cloned().map(Slot::Value).collect(),
        size: list.len(),
    }
}

/// A matrix kept in step with its ordered flat projection.
///
/// Each change is located once in the old matrix and spliced into the list
/// at that position, so the list never needs a full rebuild.
#[derive(Debug, Clone)]
pub struct MatrixList<T> {
    matrix: Matrix<T>,
    list: Vec<T>,
}

impl<T> Default for MatrixList<T> {
    fn default() -> Self {
        Self {
            matrix: Matrix::new(),
            list: Vec::new(),
        }
    }
}

impl<T: Clone> MatrixList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, change: &Change<T>) {
        if change.index.is_empty() {
            return;
        }
        let location = self.matrix.locate(&change.index);
        let displaced = location.position..location.position + location.occupied;
        match &change.kind {
            ChangeKind::Set(value) => {
                self.list.splice(displaced, std::iter::once(value.clone()));
            }
            ChangeKind::Unset => {
                if location.through_value {
                    return;
                }
                self.list.drain(displaced);
            }
        }
        self.matrix = self.matrix.apply_change(change);
    }

    pub fn list(&self) -> &[T] {
        &self.list
    }

    pub fn matrix(&self) -> &Matrix<T> {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_leaves<T>(matrix: &Matrix<T>) -> usize {
        matrix
            .slots
            .iter()
            .map(|s| match s {
                Slot::Empty => 0,
                Slot::Value(_) => 1,
                Slot::Nested(m) => count_leaves(m),
            })
            .sum()
    }

    fn build(changes: &[Change<&'static str>]) -> Matrix<&'static str> {
        changes
            .iter()
            .fold(Matrix::new(), |m, c| m.apply_change(c))
    }

    #[test]
    fn set_nested_and_read_back() {
        let m = build(&[
            Change::set(vec![0, 1], "a"),
            Change::set(vec![2], "b"),
            Change::set(vec![0, 0, 3], "c"),
        ]);
        assert_eq!(m.size(), 3);
        assert_eq!(m.get(&[0, 1]), Some(&"a"));
        assert_eq!(m.get(&[0, 0, 3]), Some(&"c"));
        assert_eq!(m.get(&[2]), Some(&"b"));
        assert_eq!(m.get(&[1]), None);
        assert_eq!(matrix_to_list(&m), vec!["c", "a", "b"]);
    }

    #[test]
    fn unset_trims_and_collapses() {
        let m = build(&[Change::set(vec![0], "a"), Change::set(vec![3, 1], "b")]);
        assert_eq!(m.slots().len(), 4);
        let m = m.apply_change(&Change::unset(vec![3, 1]));
        assert_eq!(m.size(), 1);
        assert_eq!(m.slots().len(), 1, "trailing empty slots trimmed");
        let m = m.apply_change(&Change::unset(vec![0]));
        assert!(m.is_empty());
        assert!(m.slots().is_empty());
    }

    #[test]
    fn set_below_value_replaces_it() {
        let m = build(&[Change::set(vec![1], "a"), Change::set(vec![1, 0], "b")]);
        assert_eq!(m.size(), 1);
        assert_eq!(m.get(&[1]), None);
        assert_eq!(m.get(&[1, 0]), Some(&"b"));
    }

    #[test]
    fn unset_through_value_is_noop() {
        let m = build(&[Change::set(vec![1], "a")]);
        let after = m.apply_change(&Change::unset(vec![1, 4]));
        assert_eq!(after, m);
        let after = m.apply_change(&Change::unset(vec![9]));
        assert_eq!(after, m);
    }

    #[test]
    fn persistent_updates_leave_old_matrix_intact() {
        let old = build(&[Change::set(vec![0, 0], "a")]);
        let new = old.apply_change(&Change::set(vec![0, 1], "b"));
        assert_eq!(old.size(), 1);
        assert_eq!(new.size(), 2);
    }

    #[test]
    fn cached_size_matches_leaf_count() {
        let changes = vec![
            Change::set(vec![0, 0], "a"),
            Change::set(vec![0, 2, 1], "b"),
            Change::set(vec![4], "c"),
            Change::unset(vec![0, 2]),
            Change::set(vec![0, 2, 0], "d"),
            Change::set(vec![4, 4], "e"),
            Change::unset(vec![0]),
            Change::set(vec![1], "f"),
        ];
        let mut m = Matrix::new();
        for change in &changes {
            m = m.apply_change(change);
            assert_eq!(m.size(), count_leaves(&m), "after {change:?}");
        }
    }

    #[test]
    fn locate_prefix_sums_siblings() {
        let m = build(&[
            Change::set(vec![0, 0], "a"),
            Change::set(vec![0, 1], "b"),
            Change::set(vec![1], "c"),
            Change::set(vec![2, 5], "d"),
        ]);
        assert_eq!(m.locate(&[1]).position, 2);
        assert_eq!(m.locate(&[1]).occupied, 1);
        assert_eq!(m.locate(&[0]).occupied, 2);
        assert_eq!(m.locate(&[2, 0]).position, 3);
        assert_eq!(m.locate(&[2, 0]).occupied, 0);
        assert_eq!(m.locate(&[3]).position, 4);
        let through = m.locate(&[1, 7]);
        assert!(through.through_value);
        assert_eq!(through.position, 2);
    }

    #[test]
    fn matrix_list_tracks_projection() {
        let mut ml = MatrixList::new();
        let changes = vec![
            Change::set(vec![2], "c"),
            Change::set(vec![0, 1], "b"),
            Change::set(vec![0, 0], "a"),
            Change::set(vec![1], "x"),
            Change::set(vec![1], "y"),
            Change::set(vec![1, 0], "z"),
            Change::unset(vec![0]),
            Change::unset(vec![1, 0, 0]),
            Change::set(vec![3, 2, 1], "d"),
        ];
        for change in &changes {
            ml.apply(change);
            assert_eq!(ml.list(), matrix_to_list(ml.matrix()).as_slice(), "after {change:?}");
        }
        assert_eq!(ml.list(), &["z", "c", "d"]);
    }

    #[test]
    fn list_round_trip() {
        let m = list_to_matrix(&["a", "b", "c"]);
        assert_eq!(m.size(), 3);
        assert_eq!(m.get(&[1]), Some(&"b"));
        assert_eq!(matrix_to_list(&m), vec!["a", "b", "c"]);
    }
}
