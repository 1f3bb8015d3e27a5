//! Engine-owned body storage.
//!
//! [`BodySet`] is a generational arena: bodies live in slots addressed by
//! [`BodyId`], and every slot remembers how many times it has been reused.
//! A stale id (its body was removed, the slot possibly recycled) simply
//! resolves to `None`, so a caller holding an old handle gets a local no-op
//! rather than silently touching whatever body landed in the slot next.
//!
//! All simulation state is exclusively owned by one engine; ids are plain
//! `Copy` values with no liveness of their own.

use crate::bodies::Dynamics;

/// Opaque handle to a body registered with an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    value: Option<Dynamics>,
}

/// Generational arena of simulated bodies.
#[derive(Debug, Default)]
pub struct BodySet {
    slots: Vec<Slot>,
    free: Vec<u32>, // indices of vacated slots, reused before growing
    len: usize,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bodies.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register a body, reusing a vacated slot when one exists.
    pub fn insert(&mut self, body: Dynamics) -> BodyId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(body);
            return BodyId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(body),
        });
        BodyId {
            index,
            generation: 0,
        }
    }

    /// Unregister a body. Bumps the slot generation so any ids still in the
    /// wild go stale. Stale or unknown ids return `None`.
    pub fn remove(&mut self, id: BodyId) -> Option<Dynamics> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation || slot.value.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        slot.value.take()
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: BodyId) -> Option<&Dynamics> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Dynamics> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Mutable access to two distinct bodies at once, for the agents that
    /// apply equal-and-opposite effects to a target and a source.
    /// `None` when either id is stale or both ids address the same slot.
    pub fn pair_mut(&mut self, a: BodyId, b: BodyId) -> Option<(&mut Dynamics, &mut Dynamics)> {
        if a.index == b.index {
            return None;
        }
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (ai, bi) = (a.index as usize, b.index as usize);
        // Split so each half holds exactly one of the two slots
        if ai < bi {
            let (left, right) = self.slots.split_at_mut(bi);
            Some((
                left[ai].value.as_mut().unwrap(),
                right[0].value.as_mut().unwrap(),
            ))
        } else {
            let (left, right) = self.slots.split_at_mut(ai);
            Some((
                right[0].value.as_mut().unwrap(),
                left[bi].value.as_mut().unwrap(),
            ))
        }
    }

    /// Resolve a target body together with an optional distinct source body.
    /// `None` when the target is stale; a stale or self-referential source
    /// degrades to `(target, None)` rather than failing the whole apply.
    pub fn target_and_source(
        &mut self,
        target: BodyId,
        source: Option<BodyId>,
    ) -> Option<(&mut Dynamics, Option<&mut Dynamics>)> {
        match source {
            Some(s) if s != target && self.contains(s) => {
                let (t, src) = self.pair_mut(target, s)?;
                Some((t, Some(src)))
            }
            _ => self.get_mut(target).map(|t| (t, None)),
        }
    }

    /// Ids of every live body, in slot order.
    pub fn ids(&self) -> Vec<BodyId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.value.as_ref().map(|_| BodyId {
                    index: i as u32,
                    generation: slot.generation,
                })
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &Dynamics)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|body| {
                (
                    BodyId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    body,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut Dynamics)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(move |body| {
                (
                    BodyId {
                        index: i as u32,
                        generation,
                    },
                    body,
                )
            })
        })
    }
}
