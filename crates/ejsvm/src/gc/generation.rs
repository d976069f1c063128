use crate::gc::VarId;

/// Per-generation statistics
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GenerationStats {
    pub live: usize,
    pub roots: usize,
    pub newly_created: usize,
    pub total_reclaimed: usize,
    pub total_sweeps: usize,
}

/// One age bucket of the heap
#[derive(Debug, Default)]
pub struct Generation {
    /// Every live record currently tagged with this generation
    pub(crate) live: Vec<VarId>,
    /// Elder records holding references into this generation
    pub(crate) roots: Vec<VarId>,
    /// Records added since this generation was last swept
    pub(crate) newly_created: usize,
    pub(crate) total_reclaimed: usize,
    pub(crate) total_sweeps: usize,
}

impl Generation {
    pub fn new(root_capacity: usize) -> Self {
        Self {
            roots: Vec::with_capacity(root_capacity),
            ..Default::default()
        }
    }

    #[inline]
    pub fn link(&mut self, id: VarId) {
        self.live.push(id);
        self.newly_created += 1;
    }

    #[inline]
    pub fn live(&self) -> &[VarId] {
        &self.live
    }

    #[inline]
    pub fn roots(&self) -> &[VarId] {
        &self.roots
    }

    pub fn stats(&self) -> GenerationStats {
        GenerationStats {
            live: self.live.len(),
            roots: self.roots.len(),
            newly_created: self.newly_created,
            total_reclaimed: self.total_reclaimed,
            total_sweeps: self.total_sweeps,
        }
    }
}
