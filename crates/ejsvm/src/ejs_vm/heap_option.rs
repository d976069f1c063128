use crate::ejs_vm::ejs_limits::{GC_MIN_WORK_QUOTA, MIN_TIME_FOR_GC};

/// Build-time tuning profile: trade memory footprint against speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TuneProfile {
    Size,
    #[default]
    Balanced,
    Speed,
}

#[derive(Debug, Clone)]
pub struct HeapOption {
    /// Allocations between demand collections
    pub work_quota: usize,
    /// Capacity of each generation's cross-generation root table
    pub num_cross_gen: usize,
    /// Type ids below this get a recycling pool
    pub max_types: usize,
    /// Memory ceiling (bytes) above which pooled records are released after a collection
    pub redline_memory: usize,
    /// Hard memory limit in bytes
    pub max_memory: usize,
    /// Minimum idle time (msec) for `is_time_for_gc`
    pub min_time_for_gc: u64,
    /// Slack below `work_quota` tolerated by `is_time_for_gc`
    pub min_work_quota: usize,
    /// Run a smart collection from `collect_if_required` when the quota is reached
    pub enable_demand_collect: bool,
    /// Compiler mode: shapes are mutable and the collector stays off
    pub compiler_mode: bool,
}

impl HeapOption {
    pub fn tuned(profile: TuneProfile) -> Self {
        let (work_quota, num_cross_gen, max_types) = match profile {
            TuneProfile::Size => (512, 256, 256),
            TuneProfile::Balanced => (1024, 1024, 512),
            TuneProfile::Speed => (2048, 4096, 1024),
        };
        Self {
            work_quota,
            num_cross_gen,
            max_types,
            redline_memory: usize::MAX,
            max_memory: usize::MAX,
            min_time_for_gc: MIN_TIME_FOR_GC,
            min_work_quota: GC_MIN_WORK_QUOTA,
            enable_demand_collect: true,
            compiler_mode: false,
        }
    }
}

impl Default for HeapOption {
    fn default() -> Self {
        Self::tuned(TuneProfile::default())
    }
}
