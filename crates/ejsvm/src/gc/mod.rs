// Generational mark-and-sweep collector
//
// Records live in four generations. Collecting generation N also collects
// every younger generation. Elder records that reference into a collected
// generation are found through that generation's root table, which the
// write barrier maintains, so elder generations are never rescanned.
//
// A collection runs to completion on the mutator's thread:
//   mark   - from the heap roots, then from cross-generation root holders
//   sweep  - free unmarked records into their type pools, promote survivors
//   reset  - compact the root tables of the collected generations

mod gc_id;
mod gc_kind;
mod gc_object;
mod generation;
mod mark;
mod object_pool;
mod write_barrier;

pub use gc_id::*;
pub use gc_kind::VarKind;
pub use gc_object::{FREE_MAGIC, GcHeader, GcPool, GcVar, VAR_MAGIC, VarBody};
pub use generation::{Generation, GenerationStats};
pub use mark::{Mark, Marker};
pub use object_pool::{PoolAlloc, TypePoolStats, TypePools};

use tracing::{debug, trace};

use crate::ejs_value::TypeRegistry;
use crate::ejs_vm::HeapOption;
use crate::ejs_vm::ejs_limits::SMART_MAX_PASSES;

// ============ Collection modes and states ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CollectMode {
    Quick = 0, // Youngest generation only
    Smart = 1, // Generation picked from allocation counts
    Full = 2,  // Every collectable generation
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GcState {
    Idle = 0,
    Marking = 1,
    Sweeping = 2,
}

impl GcState {
    #[inline]
    pub fn is_idle(self) -> bool {
        self == GcState::Idle
    }
}

/// Mask of the bits for generations `0..=generation`
#[inline(always)]
fn gens_upto(generation: u8) -> u8 {
    ((1u16 << (generation + 1)) - 1) as u8
}

// ============ Statistics ============

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GcStats {
    pub collections: usize,
    pub quick_collections: usize,
    pub smart_collections: usize,
    pub full_collections: usize,
    /// Records currently allocated
    pub allocated_objects: usize,
    pub peak_allocated: usize,
    pub total_allocated: usize,
    pub total_reclaimed: usize,
    pub total_marked: usize,
    pub total_promoted: usize,
    pub total_overflows: usize,
    pub total_redlines: usize,
    pub used_memory: usize,
    pub peak_memory: usize,
}

/// Summary of one collection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CollectInfo {
    /// Mode actually run, after any upgrade to full
    pub mode: CollectMode,
    /// Oldest generation collected by the last pass, if any ran
    pub target: Option<u8>,
    pub passes: usize,
    pub marked: usize,
    pub reclaimed: usize,
    pub promoted: usize,
}

impl CollectInfo {
    fn new(mode: CollectMode) -> Self {
        Self {
            mode,
            target: None,
            passes: 0,
            marked: 0,
            reclaimed: 0,
            promoted: 0,
        }
    }
}

// ============ Collector ============

pub struct GC {
    pub(crate) generations: [Generation; MAX_GEN],
    /// Generation new records are linked into
    pub(crate) alloc_generation: u8,
    /// Oldest generation the mark phase may enter
    collect_generation: u8,
    pub(crate) state: GcState,
    pub(crate) enabled: bool,
    /// Allocation work reached the quota; a collection is due
    pub(crate) required: bool,
    /// A root table was full; the next collection must be full
    pub(crate) overflow: bool,
    /// Root tables are known to be incomplete for another reason
    pub(crate) pending_full: bool,
    pub(crate) work_done: usize,
    pub(crate) work_quota: usize,
    pub(crate) root_capacity: usize,
    stats: GcStats,
    worklist: Vec<VarId>,
    marker: Marker,
}

impl GC {
    pub fn new(option: &HeapOption) -> Self {
        GC {
            generations: std::array::from_fn(|_| Generation::new(option.num_cross_gen)),
            alloc_generation: GEN_NEW,
            collect_generation: GEN_NEW,
            state: GcState::Idle,
            enabled: !option.compiler_mode,
            required: false,
            overflow: false,
            pending_full: false,
            work_done: 0,
            work_quota: option.work_quota.max(1),
            root_capacity: option.num_cross_gen,
            stats: GcStats::default(),
            worklist: Vec::new(),
            marker: Marker::new(),
        }
    }

    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    #[inline]
    pub fn state(&self) -> GcState {
        self.state
    }

    #[inline]
    pub fn generation(&self, generation: u8) -> &Generation {
        &self.generations[generation as usize]
    }

    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.overflow
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[inline]
    pub fn used_memory(&self) -> usize {
        self.stats.used_memory
    }

    pub(crate) fn note_redline(&mut self) {
        self.stats.total_redlines += 1;
    }

    /// Charge or refund heap bytes
    #[inline]
    pub fn track_size(&mut self, delta: isize) {
        let used = self.stats.used_memory as isize + delta;
        self.stats.used_memory = used.max(0) as usize;
        self.stats.peak_memory = self.stats.peak_memory.max(self.stats.used_memory);
    }

    /// Link a freshly allocated record into the allocation generation
    pub fn add_var(&mut self, vars: &mut GcPool, id: VarId) {
        let generation = self.alloc_generation;
        if let Some(header) = vars.header_mut(id) {
            header.generation = generation;
        }
        self.generations[generation as usize].link(id);
        self.stats.total_allocated += 1;
        self.stats.allocated_objects += 1;
        self.stats.peak_allocated = self.stats.peak_allocated.max(self.stats.allocated_objects);
        self.work_done += 1;
        if self.work_done >= self.work_quota && self.enabled {
            self.required = true;
        }
    }

    /// Idle-time heuristic: enough idle time and enough allocation work
    pub fn is_time_for_gc(&self, time_till_next_event: u64, option: &HeapOption) -> bool {
        if time_till_next_event < option.min_time_for_gc {
            return false;
        }
        if !self.enabled || !self.state.is_idle() {
            return false;
        }
        self.work_done >= self.work_quota.saturating_sub(option.min_work_quota)
    }

    /// Run a collection. `roots` are the heap roots: the global object and
    /// its properties, frame slots, result and exception values, pending
    /// initializers.
    pub fn collect(
        &mut self,
        mode: CollectMode,
        roots: &[VarId],
        vars: &mut GcPool,
        pools: &mut TypePools,
        types: &TypeRegistry,
    ) -> CollectInfo {
        let repair = self.overflow || self.pending_full;
        let mode = if repair { CollectMode::Full } else { mode };
        let mut info = CollectInfo::new(mode);
        if !self.enabled || !self.state.is_idle() {
            return info;
        }
        self.required = false;
        self.work_done = 0;

        match mode {
            CollectMode::Quick => {
                self.collect_pass(GEN_NEW, roots, vars, pools, types, false, &mut info);
            }
            CollectMode::Full => {
                self.collect_pass(GEN_OLD, roots, vars, pools, types, repair, &mut info);
            }
            CollectMode::Smart => {
                for _ in 0..SMART_MAX_PASSES {
                    let Some(target) = self.smart_target() else {
                        break;
                    };
                    self.collect_pass(target, roots, vars, pools, types, false, &mut info);
                }
            }
        }

        self.stats.collections += 1;
        match mode {
            CollectMode::Quick => self.stats.quick_collections += 1,
            CollectMode::Smart => self.stats.smart_collections += 1,
            CollectMode::Full => self.stats.full_collections += 1,
        }
        debug!(
            ?mode,
            target = ?info.target,
            passes = info.passes,
            marked = info.marked,
            reclaimed = info.reclaimed,
            promoted = info.promoted,
            used_memory = self.stats.used_memory,
            "collection finished"
        );
        info
    }

    /// Oldest generation whose new records exceed the work quota, otherwise
    /// the one with the most new records. None when too little was created.
    fn smart_target(&self) -> Option<u8> {
        let mut total = 0;
        let mut busiest = (GEN_NEW, 0);
        let mut over_quota = None;
        for generation in GEN_NEW..GEN_ETERNAL {
            let count = self.generations[generation as usize].newly_created;
            total += count;
            if count > busiest.1 {
                busiest = (generation, count);
            }
            if count > self.work_quota {
                over_quota = Some(generation);
            }
        }
        if total < self.work_quota {
            return None;
        }
        Some(over_quota.unwrap_or(busiest.0))
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_pass(
        &mut self,
        target: u8,
        roots: &[VarId],
        vars: &mut GcPool,
        pools: &mut TypePools,
        types: &TypeRegistry,
        repair: bool,
        info: &mut CollectInfo,
    ) {
        debug!(target, repair, "collection start");
        let marked = self.mark(vars, target, roots, repair);
        let (reclaimed, promoted) = self.sweep(vars, pools, types, target);
        if repair {
            self.rebuild_roots(vars);
        } else {
            self.reset_roots(vars, target);
        }
        self.state = GcState::Idle;

        self.stats.total_marked += marked;
        info.target = Some(target);
        info.passes += 1;
        info.marked += marked;
        info.reclaimed += reclaimed;
        info.promoted += promoted;
    }

    // ============ Mark ============

    fn mark(&mut self, vars: &mut GcPool, target: u8, roots: &[VarId], repair: bool) -> usize {
        self.state = GcState::Marking;

        // Root holders get their link bits for the collected range recomputed
        let collected = gens_upto(target);
        for generation in 0..=target as usize {
            for &holder in &self.generations[generation].roots {
                if let Some(header) = vars.header_mut(holder) {
                    header.ref_links &= !collected;
                }
            }
        }

        self.collect_generation = target;
        self.worklist.extend_from_slice(roots);
        // Permanent records are never swept, so whatever they hold stays reachable
        for generation in 0..=target as usize {
            for &id in &self.generations[generation].live {
                if vars.header(id).is_some_and(|h| h.permanent) {
                    self.worklist.push(id);
                }
            }
        }
        let mut marked = self.drain(vars);

        // Holders outside the collected range are followed in the eternal
        // context so whatever they reach gets marked regardless of age
        self.collect_generation = GEN_ETERNAL;
        for generation in 0..=target as usize {
            for &holder in &self.generations[generation].roots {
                if vars.header(holder).is_some_and(|h| h.generation > target) {
                    self.worklist.push(holder);
                }
            }
        }
        if repair {
            self.worklist
                .extend_from_slice(&self.generations[GEN_ETERNAL as usize].live);
        }
        marked += self.drain(vars);
        marked
    }

    /// Mark everything reachable from the worklist within `collect_generation`
    fn drain(&mut self, vars: &mut GcPool) -> usize {
        let mut marked = 0;
        while let Some(id) = self.worklist.pop() {
            let Some(var) = vars.get_live_mut(id) else {
                continue;
            };
            if var.header.marked || var.header.generation > self.collect_generation {
                continue;
            }
            var.header.marked = true;
            marked += 1;
            let holder_gen = var.header.generation;
            var.body.mark_refs(&mut self.marker);

            let mut links = 0u8;
            for child in self.marker.drain() {
                let Some(header) = vars.header(child) else {
                    continue;
                };
                if header.generation >= GEN_ETERNAL {
                    continue;
                }
                if header.generation < holder_gen && !header.permanent {
                    links |= gen_bit(header.generation);
                }
                if !header.marked && header.generation <= self.collect_generation {
                    self.worklist.push(child);
                }
            }
            if links != 0 {
                if let Some(header) = vars.header_mut(id) {
                    header.ref_links |= links;
                }
            }
        }
        marked
    }

    // ============ Sweep ============

    fn sweep(
        &mut self,
        vars: &mut GcPool,
        pools: &mut TypePools,
        types: &TypeRegistry,
        target: u8,
    ) -> (usize, usize) {
        enum Fate {
            Keep,
            Promote,
            Free,
        }

        self.state = GcState::Sweeping;
        let mut total_reclaimed = 0;
        let mut total_promoted = 0;

        for generation in (GEN_NEW..=target).rev() {
            let live = std::mem::take(&mut self.generations[generation as usize].live);
            let mut kept = Vec::with_capacity(live.len());
            let mut promoted = Vec::new();
            let mut reclaimed = 0;

            for id in live {
                let Some(var) = vars.get_live_mut(id) else {
                    continue;
                };
                let header = &mut var.header;
                let fate = if header.marked {
                    header.marked = false;
                    if generation < GEN_OLD && header.survived {
                        header.survived = false;
                        header.generation = generation + 1;
                        Fate::Promote
                    } else {
                        if generation < GEN_OLD {
                            header.survived = true;
                        }
                        Fate::Keep
                    }
                } else if header.permanent {
                    Fate::Keep
                } else {
                    if types.get(var.type_id).is_some_and(|ty| ty.has_finalizer) {
                        if let VarBody::Native(native) = &mut var.body {
                            native.finalize();
                        }
                    }
                    Fate::Free
                };

                match fate {
                    Fate::Keep => kept.push(id),
                    Fate::Promote => promoted.push(id),
                    Fate::Free => {
                        let released = pools.free_var(vars, id);
                        self.track_size(-(released as isize));
                        reclaimed += 1;
                    }
                }
            }

            let bucket = &mut self.generations[generation as usize];
            bucket.live = kept;
            bucket.total_reclaimed += reclaimed;
            bucket.total_sweeps += 1;
            bucket.newly_created = 0;

            for &id in &promoted {
                trace!(?id, from = generation, "promote");
                self.generations[generation as usize + 1].link(id);
                self.add_root(vars, generation, id);
            }
            total_reclaimed += reclaimed;
            total_promoted += promoted.len();
        }

        // Elder generations may carry marks from the eternal-context pass
        for generation in (target as usize + 1)..MAX_GEN {
            for &id in &self.generations[generation].live {
                if let Some(header) = vars.header_mut(id) {
                    header.marked = false;
                }
            }
        }

        self.stats.allocated_objects = self.stats.allocated_objects.saturating_sub(total_reclaimed);
        self.stats.total_reclaimed += total_reclaimed;
        self.stats.total_promoted += total_promoted;
        (total_reclaimed, total_promoted)
    }

    // ============ Root tables ============

    /// Bits of the younger, collectable generations `holder` references now
    fn reference_mask(vars: &GcPool, marker: &mut Marker, holder: VarId) -> Option<u8> {
        let var = vars.get_live(holder)?;
        let holder_gen = var.header.generation;
        var.body.mark_refs(marker);
        let mut mask = 0u8;
        for child in marker.drain() {
            if let Some(header) = vars.header(child) {
                if header.generation < holder_gen
                    && header.generation < GEN_ETERNAL
                    && !header.permanent
                {
                    mask |= gen_bit(header.generation);
                }
            }
        }
        Some(mask)
    }

    /// Compact the root tables of generations `0..=target`. A holder stays
    /// listed only while it still references the generation; otherwise it
    /// moves to the youngest elder generation it still references.
    fn reset_roots(&mut self, vars: &mut GcPool, target: u8) {
        for generation in GEN_NEW..=target {
            let bit = gen_bit(generation);
            let roots = std::mem::take(&mut self.generations[generation as usize].roots);
            let mut kept = Vec::with_capacity(roots.len());
            let mut moved = Vec::new();

            for holder in roots {
                let Some(refs) = Self::reference_mask(vars, &mut self.marker, holder) else {
                    continue;
                };
                let Some(header) = vars.header_mut(holder) else {
                    continue;
                };
                header.ref_links = refs;
                if refs & bit != 0 {
                    kept.push(holder);
                    continue;
                }
                header.root_links &= !bit;
                let elder = refs & !gens_upto(generation);
                if elder != 0 {
                    let next = elder.trailing_zeros() as u8;
                    if header.root_links & gens_upto(next) == 0 {
                        moved.push((next, holder));
                    }
                }
            }

            self.generations[generation as usize].roots = kept;
            for (next, holder) in moved {
                self.add_root(vars, next, holder);
            }
        }
    }

    /// Recreate every root table from the live heap
    fn rebuild_roots(&mut self, vars: &mut GcPool) {
        self.overflow = false;
        self.pending_full = false;
        for generation in &mut self.generations {
            generation.roots.clear();
        }
        for generation in GEN_NEW as usize..MAX_GEN {
            for &id in &self.generations[generation].live {
                if let Some(header) = vars.header_mut(id) {
                    header.root_links = 0;
                }
            }
        }
        for generation in GEN_YOUNG as usize..MAX_GEN {
            let holders = self.generations[generation].live.clone();
            for holder in holders {
                let Some(refs) = Self::reference_mask(vars, &mut self.marker, holder) else {
                    continue;
                };
                if let Some(header) = vars.header_mut(holder) {
                    header.ref_links = refs;
                }
                for young in GEN_NEW..generation as u8 {
                    if refs & gen_bit(young) != 0 {
                        self.add_root(vars, young, holder);
                    }
                }
            }
        }
        debug!(
            overflow = self.overflow,
            roots = ?self.generations.iter().map(|g| g.roots.len()).collect::<Vec<_>>(),
            "root tables rebuilt"
        );
    }
}
