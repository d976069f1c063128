// Tests for memory accounting, the redline and the hard limit
use super::{heap_with, new_heap};
use crate::*;

/// Bytes one empty plain object is charged, and the bytes of a fresh heap
fn object_cost() -> (usize, usize) {
    let mut heap = new_heap();
    let base = heap.used_memory();
    heap.create_plain_object().unwrap();
    (base, heap.used_memory() - base)
}

#[test]
fn test_used_memory_tracks_allocation_and_growth() {
    let mut heap = new_heap();
    let base = heap.used_memory();
    let obj = heap.create_plain_object().unwrap();
    let after_alloc = heap.used_memory();
    assert!(after_alloc > base);

    heap.set_property(obj, -1, None).unwrap();
    assert!(heap.used_memory() > after_alloc);
    assert_eq!(heap.gc_stats().used_memory, heap.used_memory());
    assert!(heap.gc_stats().peak_memory >= heap.used_memory());
}

#[test]
fn test_pooled_records_stay_counted_until_pruned() {
    let (base, cost) = object_cost();
    let mut heap = new_heap();
    for _ in 0..3 {
        heap.create_plain_object().unwrap();
    }
    assert_eq!(heap.used_memory(), base + 3 * cost);

    let info = heap.collect(CollectMode::Quick).unwrap();
    assert_eq!(info.reclaimed, 3);
    assert_eq!(heap.pooled_count(), 3);
    assert_eq!(heap.used_memory(), base + 3 * cost);

    // Reuse charges nothing new
    heap.create_plain_object().unwrap();
    assert_eq!(heap.used_memory(), base + 3 * cost);
    assert_eq!(heap.pooled_count(), 2);
}

#[test]
fn test_redline_prunes_type_pools() {
    let (base, _) = object_cost();
    let mut heap = heap_with(HeapOption {
        redline_memory: 0,
        ..HeapOption::default()
    });
    for _ in 0..3 {
        heap.create_plain_object().unwrap();
    }
    heap.collect(CollectMode::Quick).unwrap();

    assert_eq!(heap.pooled_count(), 0);
    assert_eq!(heap.used_memory(), base);
    assert_eq!(heap.gc_stats().total_redlines, 1);
    assert!(!heap.is_degraded());
}

#[test]
fn test_hard_limit_degrades_until_memory_drops() {
    let (base, cost) = object_cost();
    let mut heap = heap_with(HeapOption {
        max_memory: base + 6 * cost,
        redline_memory: base + 3 * cost,
        ..HeapOption::default()
    });
    heap.push_frame(CallFrame::new(None, None, 6));
    for i in 0..6 {
        let id = heap.create_plain_object().unwrap();
        heap.current_frame_mut().unwrap().locals[i] = Some(id);
    }
    assert_eq!(heap.used_memory(), base + 6 * cost);

    // A fresh record would pass the limit
    assert_eq!(heap.create_plain_object(), Err(EjsError::OutOfMemory));
    assert!(!heap.error_message().is_empty());
    assert!(!heap.is_degraded());

    // Everything is reachable, so the collection cannot get back under the limit
    assert_eq!(heap.collect(CollectMode::Full), Err(EjsError::OutOfMemory));
    assert!(heap.is_degraded());
    assert_eq!(heap.create_plain_object(), Err(EjsError::OutOfMemory));

    heap.pop_frame();
    let info = heap.collect(CollectMode::Full).unwrap();
    assert_eq!(info.reclaimed, 6);
    assert!(!heap.is_degraded());
    assert_eq!(heap.pooled_count(), 0);
    assert_eq!(heap.used_memory(), base);
    assert!(heap.create_plain_object().is_ok());
}

#[test]
fn test_degraded_heap_stays_degraded_above_redline() {
    let (base, cost) = object_cost();
    let mut heap = heap_with(HeapOption {
        max_memory: base + 4 * cost,
        redline_memory: base + cost,
        ..HeapOption::default()
    });
    heap.push_frame(CallFrame::new(None, None, 4));
    for i in 0..4 {
        let id = heap.create_plain_object().unwrap();
        heap.current_frame_mut().unwrap().locals[i] = Some(id);
    }
    assert!(heap.collect(CollectMode::Full).is_err());
    assert!(heap.is_degraded());

    // Free two of the four; memory is under the hard limit but over the redline
    if let Some(frame) = heap.current_frame_mut() {
        frame.locals[0] = None;
        frame.locals[1] = None;
    }
    heap.collect(CollectMode::Full).unwrap();
    assert_eq!(heap.used_memory(), base + 2 * cost);
    assert!(heap.is_degraded());
    assert_eq!(heap.create_plain_object(), Err(EjsError::OutOfMemory));
}

#[test]
fn test_slot_growth_respects_hard_limit() {
    let (base, cost) = object_cost();
    let mut heap = heap_with(HeapOption {
        max_memory: base + cost + 4096,
        ..HeapOption::default()
    });
    let obj = heap.create_plain_object().unwrap();
    let before = heap.used_memory();

    assert_eq!(
        heap.set_property(obj, 1_000_000, None),
        Err(EjsError::OutOfMemory)
    );
    assert!(heap.error_message().contains("cannot grow"));
    assert_eq!(heap.grow_object(obj, 4_000_000), Err(EjsError::OutOfMemory));
    assert_eq!(
        heap.insert_grow_object(obj, usize::MAX, 0),
        Err(EjsError::OutOfMemory)
    );
    assert_eq!(heap.used_memory(), before);
    assert_eq!(heap.property_count(obj), Ok(0));

    // Growth that fits is still allowed
    assert_eq!(heap.set_property(obj, 99, None), Ok(99));
    assert!(heap.used_memory() <= base + cost + 4096);
}

#[test]
fn test_alloc_report_lists_types() {
    let mut heap = new_heap();
    let global = heap.global();
    let s = heap.create_string("kept").unwrap();
    heap.set_property(global, -1, Some(s)).unwrap();
    heap.create_plain_object().unwrap();
    heap.collect(CollectMode::Quick).unwrap();

    let report = heap.alloc_report();
    assert_eq!(report.generations.len(), gc::MAX_GEN);
    assert_eq!(report.pooled_records, 1);
    assert!(report.pools.iter().any(|pool| pool.type_name == "String"));

    let text = report.to_string();
    assert!(text.contains("GC Statistics"));
    assert!(text.contains("Object"));
    heap.print_alloc_report();
}

#[cfg(feature = "serde")]
#[test]
fn test_alloc_report_serializes() {
    let mut heap = new_heap();
    heap.create_plain_object().unwrap();
    let json = serde_json::to_value(heap.alloc_report()).unwrap();
    assert_eq!(json["gc"]["allocated_objects"], 2);
    assert!(json["pools"].is_array());
}
