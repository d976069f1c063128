// Property access on heap objects
// Every store goes through the write barrier; slot growth is charged to
// the heap's memory accounting.

use ahash::AHashMap;
use smol_str::SmolStr;

use crate::ejs_value::{EjsObject, QName, SingleMatch};
use crate::ejs_vm::{EjsError, EjsHeap, EjsResult};
use crate::gc::{Slot, VarBody, VarId};

impl EjsHeap {
    /// Run `op` on the object body of `id`, charging any change in slot storage
    fn object_op<R>(
        &mut self,
        id: VarId,
        op: impl FnOnce(&mut EjsObject, bool) -> EjsResult<R>,
    ) -> EjsResult<R> {
        let compiler_mode = self.option.compiler_mode;
        let result = match self.vars.get_live_mut(id) {
            Some(var) => match &mut var.body {
                VarBody::Object(obj) => {
                    let before = obj.storage_bytes();
                    let result = op(obj, compiler_mode);
                    let after = obj.storage_bytes();
                    if after != before {
                        self.gc.track_size(after as isize - before as isize);
                    }
                    result
                }
                _ => Err(EjsError::TypeError),
            },
            None => Err(EjsError::ReferenceError),
        };
        result.map_err(|err| {
            let msg = match err {
                EjsError::TypeError if self.object(id).is_ok() => {
                    format!("object {} has a fixed shape", id.0)
                }
                EjsError::TypeError => format!("record {} is not an object", id.0),
                EjsError::ReferenceError => format!("record {} is not live", id.0),
                EjsError::OutOfBounds => format!("bad property slot on object {}", id.0),
                other => format!("{other} on object {}", id.0),
            };
            self.fail(err, msg)
        })
    }

    /// Refuse slot growth of `obj` to `count` properties when the new
    /// storage would take the heap past its hard limit
    fn reserve_slots(&mut self, obj: VarId, count: usize) -> EjsResult<()> {
        let Ok(object) = self.object(obj) else {
            return Ok(());
        };
        if !object.is_dynamic() && !self.option.compiler_mode {
            return Ok(());
        }
        let used = self.gc.used_memory();
        let fits = object
            .growth_bytes(count)
            .and_then(|extra| used.checked_add(extra))
            .is_some_and(|total| total <= self.option.max_memory);
        if fits {
            return Ok(());
        }
        Err(self.fail(
            EjsError::OutOfMemory,
            format!("cannot grow object {} to {count} slots", obj.0),
        ))
    }

    /// Property count `obj` needs for a store at `slot`
    fn store_count(&self, obj: VarId, slot: i32) -> usize {
        match self.object(obj) {
            Ok(object) if slot < 0 => object.property_count() + 1,
            Ok(_) => slot as usize + 1,
            Err(_) => 0,
        }
    }

    pub fn get_property(&self, obj: VarId, slot: usize) -> EjsResult<Slot> {
        self.object(obj)?.get_property(slot)
    }

    /// Store `value` at `slot`. A negative slot appends. Returns the slot written.
    pub fn set_property(&mut self, obj: VarId, slot: i32, value: Slot) -> EjsResult<usize> {
        if let Some(id) = value {
            if !self.vars.is_live(id) {
                return Err(self.fail(
                    EjsError::ReferenceError,
                    format!("cannot store dead record {}", id.0),
                ));
            }
        }
        self.reserve_slots(obj, self.store_count(obj, slot))?;
        let slot = self.object_op(obj, |o, compiler_mode| {
            o.set_property(slot, value, compiler_mode)
        })?;
        self.gc.record_reference(&mut self.vars, obj, value);
        Ok(slot)
    }

    pub fn set_property_name(&mut self, obj: VarId, slot: i32, qname: QName) -> EjsResult<usize> {
        self.reserve_slots(obj, self.store_count(obj, slot))?;
        self.object_op(obj, |o, compiler_mode| {
            o.set_property_name(slot, qname, compiler_mode)
        })
    }

    /// Assign `qname`, appending a new named slot on a miss
    pub fn set_property_by_name(&mut self, obj: VarId, qname: &QName, value: Slot) -> EjsResult<usize> {
        let slot = match self.object(obj)?.lookup_property(qname) {
            Some(slot) => slot as i32,
            None => {
                self.reserve_slots(obj, self.store_count(obj, -1))?;
                let slot = self.object_op(obj, |o, compiler_mode| o.check_slot(-1, compiler_mode))?;
                self.set_property_name(obj, slot as i32, qname.clone())?;
                slot as i32
            }
        };
        self.set_property(obj, slot, value)
    }

    pub fn get_property_by_name(&self, obj: VarId, qname: &QName) -> EjsResult<Slot> {
        let object = self.object(obj)?;
        let slot = object.lookup_property(qname).ok_or(EjsError::NotFound)?;
        object.get_property(slot)
    }

    pub fn lookup_property(&self, obj: VarId, qname: &QName) -> EjsResult<usize> {
        self.object(obj)?
            .lookup_property(qname)
            .ok_or(EjsError::NotFound)
    }

    /// Resolve a bare name. Succeeds only when exactly one property carries
    /// the name and it lives in a standard namespace; returns the slot and
    /// that namespace.
    pub fn lookup_single(&self, obj: VarId, name: &str) -> EjsResult<(usize, SmolStr)> {
        let object = self.object(obj)?;
        match object.lookup_single(name) {
            SingleMatch::NotFound => Err(EjsError::NotFound),
            SingleMatch::Multiple => Err(EjsError::Ambiguous),
            SingleMatch::Unique(slot) => {
                let space = object.property_name_at(slot)?.space.clone();
                if self.standard_spaces.contains(&space) {
                    Ok((slot, space))
                } else {
                    Err(EjsError::Ambiguous)
                }
            }
        }
    }

    pub fn delete_property(&mut self, obj: VarId, slot: usize) -> EjsResult<()> {
        self.object_op(obj, |o, compiler_mode| o.delete_property(slot, compiler_mode))
    }

    pub fn delete_property_by_name(&mut self, obj: VarId, qname: &QName) -> EjsResult<()> {
        let Some(slot) = self.object(obj)?.lookup_property(qname) else {
            return Err(self.fail(EjsError::NotFound, format!("property {qname} not found")));
        };
        self.delete_property(obj, slot)
    }

    /// Ensure room for `count` properties
    pub fn grow_object(&mut self, obj: VarId, count: usize) -> EjsResult<()> {
        self.reserve_slots(obj, count)?;
        self.object_op(obj, |o, compiler_mode| {
            if count > o.property_count() && !o.is_dynamic() && !compiler_mode {
                return Err(EjsError::TypeError);
            }
            o.grow(count)
        })
    }

    /// Open `incr` null slots at `offset`
    pub fn insert_grow_object(&mut self, obj: VarId, incr: usize, offset: usize) -> EjsResult<()> {
        let count = self
            .object(obj)
            .map_or(0, |o| o.property_count().saturating_add(incr));
        self.reserve_slots(obj, count)?;
        self.object_op(obj, |o, compiler_mode| {
            if !o.is_dynamic() && !compiler_mode {
                return Err(EjsError::TypeError);
            }
            o.insert_grow(incr, offset)
        })
    }

    /// Compiler-mode slot removal
    pub fn remove_slot(&mut self, obj: VarId, slot: usize, compact: bool) -> EjsResult<()> {
        self.object_op(obj, |o, compiler_mode| o.remove_slot(slot, compact, compiler_mode))
    }

    pub fn property_count(&self, obj: VarId) -> EjsResult<usize> {
        Ok(self.object(obj)?.property_count())
    }

    pub fn property_name_at(&self, obj: VarId, slot: usize) -> EjsResult<&QName> {
        self.object(obj)?.property_name_at(slot)
    }

    /// Copy an object. A shallow copy shares the child records; a deep copy
    /// also copies every object reachable through slots, preserving cycles.
    pub fn clone_object(&mut self, obj: VarId, deep: bool) -> EjsResult<VarId> {
        let root = self.copy_one(obj)?;
        if !deep {
            self.record_slots(root);
            return Ok(root);
        }

        let mut copies: AHashMap<VarId, VarId> = AHashMap::default();
        copies.insert(obj, root);
        let mut pending = vec![root];
        while let Some(copy) = pending.pop() {
            let slots: Vec<Slot> = self.object(copy)?.slots().to_vec();
            for (slot, value) in slots.into_iter().enumerate() {
                let Some(child) = value else {
                    continue;
                };
                let is_object = self.object(child).is_ok();
                let is_permanent = self.vars.header(child).is_some_and(|h| h.permanent);
                if !is_object || is_permanent {
                    continue;
                }
                let replacement = match copies.get(&child) {
                    Some(&done) => done,
                    None => {
                        let fresh = self.copy_one(child)?;
                        copies.insert(child, fresh);
                        pending.push(fresh);
                        fresh
                    }
                };
                if let Some(VarBody::Object(o)) = self.vars.get_live_mut(copy).map(|v| &mut v.body) {
                    o.slots_mut()[slot] = Some(replacement);
                }
            }
        }
        for &copy in copies.values() {
            self.record_slots(copy);
        }
        Ok(root)
    }

    /// Allocate a copy of one object record. Ref links carry over, root links do not.
    fn copy_one(&mut self, obj: VarId) -> EjsResult<VarId> {
        let (type_id, ref_links, body) = match self.vars.get_live(obj) {
            Some(var) => match &var.body {
                VarBody::Object(o) => (var.type_id, var.header.ref_links, o.clone()),
                _ => return Err(self.fail(EjsError::TypeError, format!("record {} is not an object", obj.0))),
            },
            None => return Err(self.fail(EjsError::ReferenceError, format!("record {} is not live", obj.0))),
        };
        let copy = self.alloc_var(type_id, 0, VarBody::Object(body))?;
        if let Some(header) = self.vars.header_mut(copy) {
            header.ref_links = ref_links;
        }
        Ok(copy)
    }

    /// Run the write barrier over every slot of `obj`
    fn record_slots(&mut self, obj: VarId) {
        let refs: Vec<VarId> = match self.object(obj) {
            Ok(o) => o.references().collect(),
            Err(_) => return,
        };
        for id in refs {
            self.gc.record_reference(&mut self.vars, obj, Some(id));
        }
    }
}
