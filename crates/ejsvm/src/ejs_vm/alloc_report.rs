use std::fmt;

use tracing::info;

use crate::ejs_vm::EjsHeap;
use crate::gc::{GcStats, GenerationStats, MAX_GEN, TypePoolStats};

/// Type pool line of an allocation report
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolReport {
    pub type_name: String,
    pub instance_size: usize,
    pub stats: TypePoolStats,
}

/// Snapshot of heap statistics. Diagnostic only.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AllocReport {
    pub gc: GcStats,
    pub generations: Vec<GenerationStats>,
    pub pools: Vec<PoolReport>,
    pub pooled_records: usize,
    pub degraded: bool,
}

/// `1234567` -> `1,234,567`
fn group_digits(n: usize) -> String {
    let mut buffer = itoa::Buffer::new();
    let digits = buffer.format(n);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for AllocReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gc = &self.gc;
        writeln!(f, "GC Statistics")?;
        writeln!(f, "  Used memory        {:>14}", group_digits(gc.used_memory))?;
        writeln!(f, "  Peak memory        {:>14}", group_digits(gc.peak_memory))?;
        writeln!(f, "  Allocated objects  {:>14}", group_digits(gc.allocated_objects))?;
        writeln!(f, "  Peak objects       {:>14}", group_digits(gc.peak_allocated))?;
        writeln!(f, "  Total allocations  {:>14}", group_digits(gc.total_allocated))?;
        writeln!(f, "  Total reclaimed    {:>14}", group_digits(gc.total_reclaimed))?;
        writeln!(f, "  Total promoted     {:>14}", group_digits(gc.total_promoted))?;
        writeln!(f, "  Collections        {:>14}", group_digits(gc.collections))?;
        writeln!(f, "  Root overflows     {:>14}", group_digits(gc.total_overflows))?;
        writeln!(f, "  Memory redlines    {:>14}", group_digits(gc.total_redlines))?;
        writeln!(f, "  Pooled records     {:>14}", group_digits(self.pooled_records))?;
        if self.degraded {
            writeln!(f, "  Heap is in degraded mode")?;
        }

        writeln!(f)?;
        writeln!(f, "  Gen        Live       Roots    Reclaimed   Sweeps")?;
        for (generation, stats) in self.generations.iter().enumerate() {
            writeln!(
                f,
                "  {:<3} {:>11} {:>11} {:>12} {:>8}",
                generation,
                group_digits(stats.live),
                group_digits(stats.roots),
                group_digits(stats.total_reclaimed),
                group_digits(stats.total_sweeps),
            )?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "  Type                     Size   Alloc    Peak    Pool  PeakPool   Reuse"
        )?;
        for pool in &self.pools {
            writeln!(
                f,
                "  {:<20} {:>8} {:>7} {:>7} {:>7} {:>9} {:>7}",
                pool.type_name,
                pool.instance_size,
                group_digits(pool.stats.allocated),
                group_digits(pool.stats.peak_allocated),
                group_digits(pool.stats.count),
                group_digits(pool.stats.peak_count),
                group_digits(pool.stats.reuse),
            )?;
        }
        Ok(())
    }
}

impl EjsHeap {
    pub fn alloc_report(&self) -> AllocReport {
        let pools = self
            .pools
            .all_stats()
            .into_iter()
            .filter(|stats| stats.peak_allocated > 0)
            .filter_map(|stats| {
                let ty = self.types.get(crate::gc::EjsTypeId(stats.type_id))?;
                Some(PoolReport {
                    type_name: ty.qname.to_string(),
                    instance_size: ty.instance_size,
                    stats,
                })
            })
            .collect();
        AllocReport {
            gc: self.gc.stats().clone(),
            generations: (0..MAX_GEN as u8)
                .map(|generation| self.gc.generation(generation).stats())
                .collect(),
            pools,
            pooled_records: self.pools.pooled_count(),
            degraded: self.is_degraded(),
        }
    }

    /// Log the allocation report at info level
    pub fn print_alloc_report(&self) {
        info!("\n{}", self.alloc_report());
    }
}

#[cfg(test)]
mod tests {
    use super::group_digits;

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(1234567), "1,234,567");
    }
}
