// Dynamic object / property store
// Slots hold child references by index; names map qualified names to slots.
// A fresh instance shares its type's name table until the first mutation
// that touches names.

mod property_names;

use std::rc::Rc;

pub use property_names::{NameEntry, PropertyNames, SingleMatch};

use crate::ejs_value::QName;
use crate::ejs_vm::ejs_limits::{HASH_MIN_PROP, LOTSA_PROP, NUM_PROP, SLOT_BYTES, prop_roundup};
use crate::ejs_vm::{EjsError, EjsResult};
use crate::gc::{Slot, VarId};

#[derive(Debug, Clone)]
pub struct EjsObject {
    /// `slots.len()` is the allocated capacity
    slots: Vec<Slot>,
    names: Rc<PropertyNames>,
    num_prop: usize,
    dynamic: bool,
}

impl EjsObject {
    pub fn new(dynamic: bool) -> Self {
        Self {
            slots: Vec::new(),
            names: Rc::new(PropertyNames::default()),
            num_prop: 0,
            dynamic,
        }
    }

    /// Instance laid out after a type template. `separate` instances get a
    /// private name table up front, others share the template's table.
    pub fn from_template(
        template: &Rc<PropertyNames>,
        template_slots: usize,
        extra_slots: usize,
        dynamic: bool,
        separate: bool,
    ) -> Self {
        let num_prop = template_slots + extra_slots;
        let names = if separate || dynamic || extra_slots > 0 {
            let mut names = (**template).clone();
            names.ensure_len(num_prop);
            if extra_slots > 0 {
                names.make_hash(num_prop);
            }
            Rc::new(names)
        } else {
            Rc::clone(template)
        };
        Self {
            slots: vec![None; prop_roundup(num_prop)],
            names,
            num_prop,
            dynamic,
        }
    }

    #[inline]
    pub fn property_count(&self) -> usize {
        self.num_prop
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    #[inline]
    pub fn names(&self) -> &PropertyNames {
        &self.names
    }

    /// True while the name table is still the one in `template`
    pub fn shares_names_with(&self, template: &Rc<PropertyNames>) -> bool {
        Rc::ptr_eq(&self.names, template)
    }

    /// Bytes charged for slot storage
    #[inline]
    pub fn storage_bytes(&self) -> usize {
        self.slots.len() * SLOT_BYTES
    }

    /// Live slot contents, in slot order
    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots[..self.num_prop]
    }

    /// Non-null references held by this object
    pub fn references(&self) -> impl Iterator<Item = VarId> + '_ {
        self.slots().iter().filter_map(|slot| *slot)
    }

    pub fn get_property(&self, slot: usize) -> EjsResult<Slot> {
        if slot >= self.num_prop {
            return Err(EjsError::OutOfBounds);
        }
        Ok(self.slots[slot])
    }

    pub fn property_name_at(&self, slot: usize) -> EjsResult<&QName> {
        if slot >= self.num_prop {
            return Err(EjsError::OutOfBounds);
        }
        self.names.name_at(slot).ok_or(EjsError::OutOfBounds)
    }

    /// Resolve a slot argument for a store: negative appends, past-the-end
    /// grows. Growing the shape needs a dynamic object or compiler mode.
    pub fn check_slot(&mut self, slot: i32, compiler_mode: bool) -> EjsResult<usize> {
        let slot = if slot < 0 {
            self.num_prop
        } else {
            slot as usize
        };
        if slot >= self.num_prop {
            if !self.dynamic && !compiler_mode {
                return Err(EjsError::TypeError);
            }
            self.grow(slot + 1)?;
        }
        Ok(slot)
    }

    /// Store `value`; returns the slot written
    pub fn set_property(&mut self, slot: i32, value: Slot, compiler_mode: bool) -> EjsResult<usize> {
        let slot = self.check_slot(slot, compiler_mode)?;
        self.slots[slot] = value;
        Ok(slot)
    }

    /// Name (or rename) a slot, copying a shared name table first
    pub fn set_property_name(
        &mut self,
        slot: i32,
        qname: QName,
        compiler_mode: bool,
    ) -> EjsResult<usize> {
        let slot = self.check_slot(slot, compiler_mode)?;
        if self.names.name_at(slot) == Some(&qname) {
            return Ok(slot);
        }
        let num_prop = self.num_prop;
        let names = Rc::make_mut(&mut self.names);
        names.ensure_len(num_prop);
        names.remove_hash_entry(slot);
        names.set_raw(slot, qname);
        if num_prop > HASH_MIN_PROP || names.is_hashed() {
            names.hash_property(slot, num_prop);
        }
        Ok(slot)
    }

    pub fn lookup_property(&self, qname: &QName) -> Option<usize> {
        self.names.lookup(qname, self.num_prop)
    }

    pub fn lookup_single(&self, name: &str) -> SingleMatch {
        self.names.lookup_single(name, self.num_prop)
    }

    /// Unname and null a slot. Only the last slot shrinks the count.
    pub fn delete_property(&mut self, slot: usize, compiler_mode: bool) -> EjsResult<()> {
        if !self.dynamic && !compiler_mode {
            return Err(EjsError::TypeError);
        }
        if slot >= self.num_prop {
            return Err(EjsError::OutOfBounds);
        }
        if self.names.name_at(slot).is_some_and(|name| !name.is_empty()) {
            Rc::make_mut(&mut self.names).remove_hash_entry(slot);
        }
        self.slots[slot] = None;
        if slot + 1 == self.num_prop {
            self.num_prop -= 1;
        }
        Ok(())
    }

    /// Extra slot storage, in bytes, that growing to `count` properties
    /// would allocate. None when the size is not representable.
    pub fn growth_bytes(&self, count: usize) -> Option<usize> {
        if count <= self.slots.len() {
            return Some(0);
        }
        let capacity = grow_capacity(self.slots.len(), count)?;
        (capacity - self.slots.len()).checked_mul(SLOT_BYTES)
    }

    /// Grow to hold at least `count` properties. Capacity only ever grows.
    pub fn grow(&mut self, count: usize) -> EjsResult<()> {
        if count > self.slots.len() {
            let capacity =
                grow_capacity(self.slots.len(), count).ok_or(EjsError::OutOfMemory)?;
            self.slots
                .try_reserve_exact(capacity - self.slots.len())
                .map_err(|_| EjsError::OutOfMemory)?;
            let names_len = self.names.len();
            if count > names_len {
                let names = Rc::make_mut(&mut self.names);
                if !names.try_reserve(count - names_len) {
                    return Err(EjsError::OutOfMemory);
                }
            }
            self.slots.resize(capacity, None);
            let names = Rc::make_mut(&mut self.names);
            names.ensure_len(count);
            if self.num_prop > 0 {
                names.make_hash(count.max(self.num_prop));
            }
        } else if self.names.len() < count {
            Rc::make_mut(&mut self.names).ensure_len(count);
        }
        self.num_prop = self.num_prop.max(count);
        Ok(())
    }

    /// Open `incr` null slots at `offset`, shifting later slots up
    pub fn insert_grow(&mut self, incr: usize, offset: usize) -> EjsResult<()> {
        if offset > self.num_prop {
            return Err(EjsError::OutOfBounds);
        }
        if incr == 0 {
            return Ok(());
        }
        let old_count = self.num_prop;
        let count = old_count.checked_add(incr).ok_or(EjsError::OutOfBounds)?;
        self.grow(count)?;
        self.slots.copy_within(offset..old_count, offset + incr);
        self.slots[offset..offset + incr].fill(None);

        let num_prop = self.num_prop;
        let names = Rc::make_mut(&mut self.names);
        names.insert_entries(offset, incr);
        names.make_hash(num_prop);
        Ok(())
    }

    /// Compiler-only slot removal. With `compact` later slots shift down.
    pub fn remove_slot(&mut self, slot: usize, compact: bool, compiler_mode: bool) -> EjsResult<()> {
        if !compiler_mode {
            return Err(EjsError::TypeError);
        }
        if slot >= self.num_prop {
            return Err(EjsError::OutOfBounds);
        }
        let num_prop = self.num_prop;
        let names = Rc::make_mut(&mut self.names);
        if compact {
            self.slots.copy_within(slot + 1..num_prop, slot);
            self.slots[num_prop - 1] = None;
            names.remove_entry(slot);
            self.num_prop -= 1;
            names.make_hash(self.num_prop);
        } else {
            names.remove_hash_entry(slot);
            self.slots[slot] = None;
        }
        Ok(())
    }

    /// `(slot, name, value)` for every live slot
    pub fn properties(&self) -> impl Iterator<Item = (usize, Option<&QName>, Slot)> + '_ {
        self.slots()
            .iter()
            .enumerate()
            .map(|(slot, value)| (slot, self.names.name_at(slot), *value))
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot] {
        let num_prop = self.num_prop;
        &mut self.slots[..num_prop]
    }
}

/// Next capacity able to hold `count` slots
fn grow_capacity(capacity: usize, count: usize) -> Option<usize> {
    let mut size = count;
    if capacity > LOTSA_PROP {
        let factor = (capacity / 4).max(NUM_PROP);
        size = size.div_ceil(factor).checked_mul(factor)?;
    }
    size.div_ceil(NUM_PROP).checked_mul(NUM_PROP)
}
