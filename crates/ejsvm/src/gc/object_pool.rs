// Type-pool allocator
// Swept records are poisoned and parked on a per-type free list instead of
// going back to the arena; the next allocation of that type recycles them.

use crate::ejs_value::EjsType;
use crate::gc::{EjsTypeId, GcHeader, GcPool, GcVar, VarBody, VarId};

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TypePoolStats {
    pub type_id: u32,
    /// Live records of this type
    pub allocated: usize,
    pub peak_allocated: usize,
    /// Records waiting on the free list
    pub count: usize,
    pub peak_count: usize,
    /// Allocations served from the free list
    pub reuse: usize,
}

#[derive(Debug, Default)]
struct TypePool {
    free: Vec<VarId>,
    allocated: usize,
    peak_allocated: usize,
    peak_count: usize,
    reuse: usize,
}

/// Outcome of a pool allocation
#[derive(Debug, Clone, Copy)]
pub struct PoolAlloc {
    pub id: VarId,
    pub reused: bool,
    /// Change in bytes charged to the heap
    pub delta: isize,
}

#[derive(Debug)]
pub struct TypePools {
    pools: Vec<TypePool>,
    max_types: usize,
    next_seqno: u32,
}

impl TypePools {
    pub fn new(max_types: usize) -> Self {
        Self {
            pools: Vec::new(),
            max_types,
            next_seqno: 0,
        }
    }

    #[inline]
    fn pool_mut(&mut self, type_id: EjsTypeId) -> Option<&mut TypePool> {
        let index = type_id.index();
        if index >= self.max_types {
            return None;
        }
        if index >= self.pools.len() {
            self.pools.resize_with(index + 1, TypePool::default);
        }
        self.pools.get_mut(index)
    }

    /// Whether an allocation of this type would recycle a pooled record
    #[inline]
    pub fn has_free(&self, type_id: EjsTypeId) -> bool {
        self.pools
            .get(type_id.index())
            .is_some_and(|pool| !pool.free.is_empty())
    }

    /// Allocate a record of `ty`, recycling a pooled one when available
    pub fn alloc_var(
        &mut self,
        vars: &mut GcPool,
        ty: &EjsType,
        extra_bytes: usize,
        body: VarBody,
    ) -> PoolAlloc {
        let size = (ty.instance_size + extra_bytes) as u32;
        let body_bytes = body.storage_bytes() as isize;
        self.next_seqno = self.next_seqno.wrapping_add(1);
        let seqno = self.next_seqno;

        let recycled = self.pool_mut(ty.id).and_then(|pool| {
            let id = pool.free.pop()?;
            pool.reuse += 1;
            Some(id)
        });

        let alloc = match recycled.and_then(|id| vars.get_mut(id).map(|var| (id, var))) {
            Some((id, var)) => {
                debug_assert!(!var.header.is_live(), "pooled record {id:?} is live");
                let old_size = var.header.size as isize;
                var.header = GcHeader::new(var.header.seqno, size);
                var.type_id = ty.id;
                var.body = body;
                PoolAlloc {
                    id,
                    reused: true,
                    delta: size as isize - old_size + body_bytes,
                }
            }
            None => {
                let id = vars.insert(GcVar {
                    header: GcHeader::new(seqno, size),
                    type_id: ty.id,
                    body,
                });
                PoolAlloc {
                    id,
                    reused: false,
                    delta: size as isize + body_bytes,
                }
            }
        };

        if let Some(pool) = self.pool_mut(ty.id) {
            pool.allocated += 1;
            pool.peak_allocated = pool.peak_allocated.max(pool.allocated);
        }
        alloc
    }

    /// Poison a record and park it on its type's free list, or hand the slot
    /// back to the arena when the type has no pool. Returns the bytes no
    /// longer charged to the heap.
    pub fn free_var(&mut self, vars: &mut GcPool, id: VarId) -> usize {
        let Some(var) = vars.get_mut(id) else {
            return 0;
        };
        debug_assert!(var.header.is_live(), "double free of {id:?}");
        let type_id = var.type_id;
        let mut released = var.body.storage_bytes();
        var.body = VarBody::Free;
        var.header.poison();
        let size = var.header.size as usize;

        match self.pool_mut(type_id) {
            Some(pool) => {
                pool.allocated = pool.allocated.saturating_sub(1);
                pool.free.push(id);
                pool.peak_count = pool.peak_count.max(pool.free.len());
            }
            None => {
                vars.release(id);
                released += size;
            }
        }
        released
    }

    /// Release every pooled record to the arena. Returns the bytes freed.
    pub fn prune(&mut self, vars: &mut GcPool) -> usize {
        let mut released = 0;
        for pool in &mut self.pools {
            for id in pool.free.drain(..) {
                if let Some(var) = vars.release(id) {
                    released += var.header.size as usize;
                }
            }
        }
        released
    }

    /// Total records sitting on free lists
    pub fn pooled_count(&self) -> usize {
        self.pools.iter().map(|pool| pool.free.len()).sum()
    }

    pub fn stats(&self, type_id: EjsTypeId) -> Option<TypePoolStats> {
        self.pools.get(type_id.index()).map(|pool| TypePoolStats {
            type_id: type_id.0,
            allocated: pool.allocated,
            peak_allocated: pool.peak_allocated,
            count: pool.free.len(),
            peak_count: pool.peak_count,
            reuse: pool.reuse,
        })
    }

    pub fn all_stats(&self) -> Vec<TypePoolStats> {
        (0..self.pools.len())
            .filter_map(|index| self.stats(EjsTypeId(index as u32)))
            .collect()
    }
}
