// ============ Variable records ============

use smol_str::SmolStr;

use crate::ejs_value::{EjsObject, NativeVar};
use crate::gc::{EjsTypeId, GEN_NEW, Marker, VarId, VarKind};

pub const VAR_MAGIC: u32 = 0xe1ee_a5a5; // In use
pub const FREE_MAGIC: u32 = 0xdead_beef; // Poisoned, sitting in a type pool

/// Collection state carried by every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcHeader {
    pub generation: u8,
    pub marked: bool,
    /// Survived one collection of its generation; the next survival promotes
    pub survived: bool,
    /// Never collected
    pub permanent: bool,
    /// Generations whose root table currently lists this record
    pub root_links: u8,
    /// Younger generations this record was last seen referencing
    pub ref_links: u8,
    /// Allocation sequence number, kept across pool reuse
    pub seqno: u32,
    /// Bytes charged to the heap for this record
    pub size: u32,
    pub magic: u32,
}

impl GcHeader {
    pub fn new(seqno: u32, size: u32) -> Self {
        GcHeader {
            generation: GEN_NEW,
            marked: false,
            survived: false,
            permanent: false,
            root_links: 0,
            ref_links: 0,
            seqno,
            size,
            magic: VAR_MAGIC,
        }
    }

    /// Overwrite with the free pattern, keeping the sequence number
    pub fn poison(&mut self) {
        *self = GcHeader {
            generation: u8::MAX,
            marked: true,
            survived: true,
            permanent: false,
            root_links: u8::MAX,
            ref_links: u8::MAX,
            seqno: self.seqno,
            size: self.size,
            magic: FREE_MAGIC,
        };
    }

    #[inline(always)]
    pub fn is_live(&self) -> bool {
        self.magic == VAR_MAGIC
    }
}

/// Kind-specific payload of a record
#[derive(Debug)]
pub enum VarBody {
    Object(EjsObject),
    String(SmolStr),
    Number(f64),
    Boolean(bool),
    Native(Box<dyn NativeVar>),
    /// Allocated native record awaiting its payload
    Empty,
    /// Recycled record waiting in its type pool
    Free,
}

impl VarBody {
    pub fn default_for(kind: VarKind) -> Self {
        match kind {
            VarKind::Object => VarBody::Object(EjsObject::new(false)),
            VarKind::String => VarBody::String(SmolStr::default()),
            VarKind::Number => VarBody::Number(0.0),
            VarKind::Boolean => VarBody::Boolean(false),
            VarKind::Native => VarBody::Empty,
        }
    }

    /// Report every record this body references
    pub fn mark_refs(&self, marker: &mut Marker) {
        match self {
            VarBody::Object(obj) => {
                for id in obj.references() {
                    marker.visit(id);
                }
            }
            VarBody::Native(native) => native.mark(marker),
            _ => {}
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&EjsObject> {
        match self {
            VarBody::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Bytes of out-of-line storage owned by the body
    pub fn storage_bytes(&self) -> usize {
        match self {
            VarBody::Object(obj) => obj.storage_bytes(),
            VarBody::String(s) if s.is_heap_allocated() => s.len(),
            _ => 0,
        }
    }
}

#[derive(Debug)]
pub struct GcVar {
    pub header: GcHeader,
    pub type_id: EjsTypeId,
    pub body: VarBody,
}

/// Record arena. Ids of released slots are reused by later allocations.
#[derive(Debug, Default)]
pub struct GcPool {
    vars: Vec<Option<GcVar>>,
    free_ids: Vec<u32>,
    occupied: usize,
}

impl GcPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: GcVar) -> VarId {
        self.occupied += 1;
        if let Some(id) = self.free_ids.pop() {
            self.vars[id as usize] = Some(var);
            VarId(id)
        } else {
            let id = self.vars.len() as u32;
            self.vars.push(Some(var));
            VarId(id)
        }
    }

    /// Record at `id`, live or pooled
    #[inline]
    pub fn get(&self, id: VarId) -> Option<&GcVar> {
        self.vars.get(id.index()).and_then(|slot| slot.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, id: VarId) -> Option<&mut GcVar> {
        self.vars.get_mut(id.index()).and_then(|slot| slot.as_mut())
    }

    /// Record at `id` if it is in use
    #[inline]
    pub fn get_live(&self, id: VarId) -> Option<&GcVar> {
        self.get(id).filter(|var| var.header.is_live())
    }

    #[inline]
    pub fn get_live_mut(&mut self, id: VarId) -> Option<&mut GcVar> {
        self.get_mut(id).filter(|var| var.header.is_live())
    }

    #[inline]
    pub fn header(&self, id: VarId) -> Option<&GcHeader> {
        self.get_live(id).map(|var| &var.header)
    }

    #[inline]
    pub fn header_mut(&mut self, id: VarId) -> Option<&mut GcHeader> {
        self.get_live_mut(id).map(|var| &mut var.header)
    }

    #[inline]
    pub fn is_live(&self, id: VarId) -> bool {
        self.get_live(id).is_some()
    }

    /// Give the slot back to the arena for any type
    pub fn release(&mut self, id: VarId) -> Option<GcVar> {
        let var = self.vars.get_mut(id.index())?.take()?;
        self.occupied -= 1;
        self.free_ids.push(id.0);
        Some(var)
    }

    /// Occupied slots, pooled records included
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }
}
