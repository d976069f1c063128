pub mod test_memory;
pub mod test_property_store;

use crate::*;

/// Route collector logs to the test harness output. Set RUST_LOG to see them.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn new_heap() -> EjsHeap {
    init_logging();
    EjsHeap::new(HeapOption::default())
}

pub fn heap_with(option: HeapOption) -> EjsHeap {
    init_logging();
    EjsHeap::new(option)
}

/// Allocate an object in the eternal generation and pin it
pub fn eternal_object(heap: &mut EjsHeap) -> VarId {
    let saved = heap.set_allocation_generation(gc::GEN_ETERNAL);
    let id = heap.create_plain_object().unwrap();
    heap.make_permanent(id).unwrap();
    heap.set_allocation_generation(saved);
    id
}
