//! Marking hook for records that embed references to other records.
//!
//! Objects are traversed by the collector directly through their slots.
//! Native payloads (closures holding a scope chain, exceptions holding a
//! caught value, iterators, ...) report the records they embed by
//! implementing [`Mark`], usually through `#[derive(Mark)]`.

use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::gc::VarId;

/// A value that may embed references to heap records.
///
/// Implementations must report every embedded [`VarId`] to the marker.
/// A missed reference lets the collector reclaim a record that is still
/// in use.
pub trait Mark {
    fn mark(&self, marker: &mut Marker);
}

/// Collects the references reported by a [`Mark`] implementation.
///
/// The collector drains the marker after each call and pushes the
/// references on its own worklist, so `mark` never recurses into the heap.
#[derive(Debug, Default)]
pub struct Marker {
    refs: Vec<VarId>,
}

impl Marker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn visit(&mut self, id: VarId) {
        self.refs.push(id);
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub(crate) fn drain(&mut self) -> std::vec::Drain<'_, VarId> {
        self.refs.drain(..)
    }
}

// ============ Impls for common types ============

impl Mark for VarId {
    #[inline]
    fn mark(&self, marker: &mut Marker) {
        marker.visit(*self);
    }
}

impl<T: Mark> Mark for Option<T> {
    #[inline]
    fn mark(&self, marker: &mut Marker) {
        if let Some(value) = self {
            value.mark(marker);
        }
    }
}

impl<T: Mark> Mark for Vec<T> {
    fn mark(&self, marker: &mut Marker) {
        for value in self {
            value.mark(marker);
        }
    }
}

impl<T: Mark> Mark for VecDeque<T> {
    fn mark(&self, marker: &mut Marker) {
        for value in self {
            value.mark(marker);
        }
    }
}

impl<T: Mark> Mark for [T] {
    fn mark(&self, marker: &mut Marker) {
        for value in self {
            value.mark(marker);
        }
    }
}

impl<T: Mark, const N: usize> Mark for [T; N] {
    fn mark(&self, marker: &mut Marker) {
        for value in self {
            value.mark(marker);
        }
    }
}

impl<K, V: Mark, S> Mark for HashMap<K, V, S> {
    fn mark(&self, marker: &mut Marker) {
        for value in self.values() {
            value.mark(marker);
        }
    }
}

impl<T: Mark + ?Sized> Mark for Box<T> {
    #[inline]
    fn mark(&self, marker: &mut Marker) {
        (**self).mark(marker);
    }
}

impl<T: Mark + ?Sized> Mark for Rc<T> {
    #[inline]
    fn mark(&self, marker: &mut Marker) {
        (**self).mark(marker);
    }
}

impl<T: Mark> Mark for RefCell<T> {
    fn mark(&self, marker: &mut Marker) {
        self.borrow().mark(marker);
    }
}

impl<A: Mark, B: Mark> Mark for (A, B) {
    fn mark(&self, marker: &mut Marker) {
        self.0.mark(marker);
        self.1.mark(marker);
    }
}

macro_rules! impl_mark_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Mark for $ty {
                #[inline(always)]
                fn mark(&self, _marker: &mut Marker) {}
            }
        )*
    };
}

impl_mark_leaf!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, SmolStr, &'static str,
);
