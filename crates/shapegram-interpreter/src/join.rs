//! Join-by-index.
//!
//! Steps with parameters (operations, operators, `if` conditions, `switch`
//! selectors) need one value per parameter for the same index before they
//! can fire. Slot 0 holds the incoming value; slots `1..=n` the parameter
//! outputs. Values whose index matches no incoming value never fire, so a
//! parameter that fans out (e.g. a `parallel`) contributes nothing.
//!
//! A group is released exactly once. When a parameter emits several values
//! at the same index, the first one fills the slot and the rest are
//! ignored, whichever slot they arrive in.

use crate::compile::Node;
use crate::evaluator::Runtime;
use crate::value::Value;
use shapegram_types::Index;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

struct JoinGroup {
    members: Vec<Option<Value>>,
    released: bool,
}

/// Per-index accumulator of join members.
pub struct IndexJoin {
    arity: usize,
    groups: HashMap<Index, JoinGroup>,
}

impl IndexJoin {
    /// A join over `arity` slots, slot 0 included.
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            groups: HashMap::new(),
        }
    }

    /// Store `value` in `slot` of its index's group.
    ///
    /// Returns the full member tuple when this value fills the group's last
    /// empty slot. Values for an already filled slot or a released group
    /// are dropped.
    pub fn offer(&mut self, slot: usize, value: Value) -> Option<Vec<Value>> {
        let arity = self.arity;
        let group = self
            .groups
            .entry(value.index.clone())
            .or_insert_with(|| JoinGroup {
                members: vec![None; arity],
                released: false,
            });
        if group.released {
            return None;
        }
        let member = group.members.get_mut(slot)?;
        if member.is_some() {
            return None;
        }
        *member = Some(value);

        let complete: Option<Vec<Value>> = group.members.iter().cloned().collect();
        group.released = complete.is_some();
        complete
    }

    /// Number of indices with at least one member.
    pub fn pending(&self) -> usize {
        self.groups.len()
    }
}

/// A complete join tuple.
pub(crate) struct Joined {
    /// The incoming value, carrying the union of all members' generations.
    pub this: Value,
    pub parameters: Vec<Value>,
}

impl Joined {
    fn from_members(mut members: Vec<Value>) -> Option<Self> {
        if members.is_empty() {
            return None;
        }
        let parameters = members.split_off(1);
        let this = members.pop()?;
        let generation = parameters
            .iter()
            .fold(this.generation().clone(), |g, p| g.combine(p.generation()));
        Some(Self {
            this: this.with_generation(generation),
            parameters,
        })
    }
}

/// Run every input step on `value`, then call `release` with the tuple for
/// `value`'s index if every slot was filled.
pub(crate) fn join(rt: &Runtime<'_>, value: &Value, inputs: &[Rc<Node>], release: &dyn Fn(Joined)) {
    let state = RefCell::new(IndexJoin::new(inputs.len() + 1));
    let ready = RefCell::new(None);
    let deliver = |slot: usize, v: Value| {
        if v.index != value.index {
            return;
        }
        if let Some(members) = state.borrow_mut().offer(slot, v) {
            *ready.borrow_mut() = Some(members);
        }
    };

    deliver(0, value.clone());
    for (i, input) in inputs.iter().enumerate() {
        input.run(rt, value.clone(), &|out| deliver(i + 1, out));
    }
    if let Some(joined) = ready.into_inner().and_then(Joined::from_members) {
        release(joined);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Generation;
    use shapegram_types::Payload;

    fn at(raw: f64, index: Vec<usize>, epoch: u64) -> Value {
        Value::root(raw, index).with_generation(Generation::new(epoch))
    }

    #[test]
    fn releases_when_all_slots_filled() {
        let mut join = IndexJoin::new(3);
        assert!(join.offer(0, at(1.0, vec![0], 1)).is_none());
        assert!(join.offer(2, at(3.0, vec![0], 1)).is_none());
        let members = join.offer(1, at(2.0, vec![0], 1)).unwrap();
        let raws: Vec<_> = members.iter().map(|m| m.raw.clone()).collect();
        assert_eq!(
            raws,
            vec![Payload::Number(1.0), Payload::Number(2.0), Payload::Number(3.0)]
        );
    }

    #[test]
    fn groups_by_index() {
        let mut join = IndexJoin::new(2);
        join.offer(0, at(1.0, vec![0], 1));
        assert!(join.offer(1, at(2.0, vec![0, 1], 1)).is_none());
        assert_eq!(join.pending(), 2);
    }

    #[test]
    fn first_member_per_slot_wins() {
        let mut join = IndexJoin::new(2);
        assert!(join.offer(1, at(2.0, vec![0], 1)).is_none());
        assert!(join.offer(1, at(3.0, vec![0], 1)).is_none());
        let members = join.offer(0, at(1.0, vec![0], 1)).unwrap();
        assert_eq!(members[1].raw, Payload::Number(2.0));
    }

    #[test]
    fn groups_release_once() {
        let mut join = IndexJoin::new(2);
        join.offer(0, at(1.0, vec![0], 1));
        assert!(join.offer(1, at(2.0, vec![0], 1)).is_some());
        assert!(join.offer(1, at(3.0, vec![0], 1)).is_none());
        assert!(join.offer(0, at(4.0, vec![0], 1)).is_none());
    }

    #[test]
    fn joined_this_carries_all_generations() {
        let joined = Joined::from_members(vec![at(1.0, vec![0], 1), at(2.0, vec![0], 3)]).unwrap();
        assert_eq!(joined.this.generation().epochs(), &[1, 3]);
        assert_eq!(joined.parameters.len(), 1);
    }
}
