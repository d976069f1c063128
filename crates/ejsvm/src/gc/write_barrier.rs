// Write barrier
// Keeps the cross-generation root tables accurate: whenever an elder record
// is made to reference a younger one, the elder record is listed as a root
// of the younger generation so collecting that generation alone stays safe.

use tracing::debug;

use crate::gc::{GC, GcPool, Slot, VarId, gen_bit};

impl GC {
    /// Register `holder` in the root table of `generation`.
    ///
    /// Returns false when the table is full; the overflow flag then forces
    /// the next collection to be a full one.
    pub fn add_root(&mut self, vars: &mut GcPool, generation: u8, holder: VarId) -> bool {
        let Some(header) = vars.header_mut(holder) else {
            return false;
        };
        let bit = gen_bit(generation);
        header.ref_links |= bit;
        if header.root_links & bit != 0 {
            return true;
        }

        let table = &mut self.generations[generation as usize].roots;
        if table.len() >= self.root_capacity {
            if !self.overflow {
                debug!(
                    generation,
                    capacity = self.root_capacity,
                    "cross-generation root table overflow"
                );
            }
            self.overflow = true;
            self.stats.total_overflows += 1;
            return false;
        }
        header.root_links |= bit;
        table.push(holder);
        true
    }

    /// Called after `referent` has been stored into `container`
    pub fn record_reference(&mut self, vars: &mut GcPool, container: VarId, referent: Slot) {
        let Some(referent) = referent else {
            return;
        };
        let Some(target) = vars.header(referent) else {
            return;
        };
        if target.permanent {
            return;
        }
        let target_gen = target.generation;
        let Some(holder) = vars.header(container) else {
            return;
        };
        if target_gen >= holder.generation {
            return;
        }
        if holder.root_links & gen_bit(target_gen) != 0 {
            if let Some(holder) = vars.header_mut(container) {
                holder.ref_links |= gen_bit(target_gen);
            }
            return;
        }
        self.add_root(vars, target_gen, container);
    }
}
