// Type descriptors
// A type fixes the record kind, the instance size charged to the allocator,
// the instance shape (dynamic or sealed) and the instance name template.

use std::rc::Rc;

use crate::ejs_value::QName;
use crate::ejs_value::ejs_object::PropertyNames;
use crate::gc::{EjsTypeId, VarKind};
use crate::ejs_vm::ejs_limits::HEADER_BYTES;

/// Built-in type ids, registered by every heap in this order
pub const TYPE_OBJECT: EjsTypeId = EjsTypeId(0);
pub const TYPE_STRING: EjsTypeId = EjsTypeId(1);
pub const TYPE_NUMBER: EjsTypeId = EjsTypeId(2);
pub const TYPE_BOOLEAN: EjsTypeId = EjsTypeId(3);
pub const TYPE_NATIVE: EjsTypeId = EjsTypeId(4);

#[derive(Debug, Clone)]
pub struct EjsType {
    pub id: EjsTypeId,
    pub qname: QName,
    pub kind: VarKind,
    /// Bytes charged per instance, header included
    pub instance_size: usize,
    /// Instances accept new properties and deletes
    pub dynamic_instance: bool,
    /// Instances get a private name table instead of sharing the template
    pub separate_instance_slots: bool,
    /// Run the payload finalizer before a swept instance is recycled
    pub has_finalizer: bool,
    instance_names: Rc<PropertyNames>,
    instance_slots: usize,
}

impl EjsType {
    pub(crate) fn new(id: EjsTypeId, def: TypeDef) -> Self {
        let mut names = PropertyNames::with_len(def.instance_properties.len());
        for (slot, qname) in def.instance_properties.into_iter().enumerate() {
            names.set_raw(slot, qname);
        }
        let instance_slots = names.len();
        names.make_hash(instance_slots);
        Self {
            id,
            qname: def.qname,
            kind: def.kind,
            instance_size: HEADER_BYTES + def.instance_size,
            dynamic_instance: def.dynamic_instance,
            separate_instance_slots: def.separate_instance_slots,
            has_finalizer: def.has_finalizer,
            instance_names: Rc::new(names),
            instance_slots,
        }
    }

    /// Name table shared by fresh instances
    #[inline]
    pub fn instance_template(&self) -> &Rc<PropertyNames> {
        &self.instance_names
    }

    #[inline]
    pub fn instance_slot_count(&self) -> usize {
        self.instance_slots
    }
}

/// Builder for a new type
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub qname: QName,
    pub kind: VarKind,
    pub instance_size: usize,
    pub dynamic_instance: bool,
    pub separate_instance_slots: bool,
    pub has_finalizer: bool,
    pub instance_properties: Vec<QName>,
}

impl TypeDef {
    pub fn new(qname: QName, kind: VarKind) -> Self {
        Self {
            qname,
            kind,
            instance_size: 0,
            dynamic_instance: false,
            separate_instance_slots: false,
            has_finalizer: false,
            instance_properties: Vec::new(),
        }
    }

    pub fn instance_size(mut self, size: usize) -> Self {
        self.instance_size = size;
        self
    }

    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic_instance = dynamic;
        self
    }

    pub fn separate_slots(mut self, separate: bool) -> Self {
        self.separate_instance_slots = separate;
        self
    }

    pub fn finalizer(mut self, has_finalizer: bool) -> Self {
        self.has_finalizer = has_finalizer;
        self
    }

    pub fn property(mut self, qname: QName) -> Self {
        self.instance_properties.push(qname);
        self
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<EjsType>,
}

impl TypeRegistry {
    /// Registry holding the built-in types
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.define(
            TypeDef::new(QName::public("Object"), VarKind::Object)
                .instance_size(16)
                .dynamic(true),
        );
        registry.define(TypeDef::new(QName::public("String"), VarKind::String).instance_size(16));
        registry.define(TypeDef::new(QName::public("Number"), VarKind::Number).instance_size(8));
        registry.define(TypeDef::new(QName::public("Boolean"), VarKind::Boolean).instance_size(1));
        registry.define(
            TypeDef::new(QName::public("Native"), VarKind::Native)
                .instance_size(16)
                .finalizer(true),
        );
        registry
    }

    pub fn define(&mut self, def: TypeDef) -> EjsTypeId {
        let id = EjsTypeId(self.types.len() as u32);
        self.types.push(EjsType::new(id, def));
        id
    }

    #[inline]
    pub fn get(&self, id: EjsTypeId) -> Option<&EjsType> {
        self.types.get(id.index())
    }

    pub fn lookup(&self, qname: &QName) -> Option<EjsTypeId> {
        self.types.iter().find(|ty| ty.qname == *qname).map(|ty| ty.id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EjsType> {
        self.types.iter()
    }
}

impl std::ops::Index<EjsTypeId> for TypeRegistry {
    type Output = EjsType;

    fn index(&self, id: EjsTypeId) -> &EjsType {
        &self.types[id.index()]
    }
}
