// ============ Record and type identifiers ============
// Every heap value lives in the record arena and is addressed by index.

/// Index of a variable record in the heap arena
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VarId(pub u32);

impl VarId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a type descriptor in the type registry
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EjsTypeId(pub u32);

impl EjsTypeId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A property slot value. `None` is the null value.
pub type Slot = Option<VarId>;

// ============ Generations ============
pub const GEN_NEW: u8 = 0; // Freshly allocated
pub const GEN_YOUNG: u8 = 1; // Promoted once
pub const GEN_OLD: u8 = 2; // Long lived, never promoted further
pub const GEN_ETERNAL: u8 = 3; // Never swept
pub const MAX_GEN: usize = 4;

/// Bit for `gen` in a root/ref link mask
#[inline(always)]
pub const fn gen_bit(generation: u8) -> u8 {
    1 << generation
}
