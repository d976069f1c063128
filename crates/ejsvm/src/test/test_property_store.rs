// Tests for the object property store
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smol_str::SmolStr;
use std::collections::HashMap;

use super::new_heap;
use crate::ejs_vm::ejs_limits::HASH_MIN_PROP;
use crate::gc::VarKind;
use crate::*;

#[test]
fn test_append_then_get_round_trip() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let value = heap.create_number(3.5).unwrap();

    let slot = heap.set_property(obj, -1, Some(value)).unwrap();
    assert_eq!(heap.get_property(obj, slot), Ok(Some(value)));
    assert_eq!(heap.property_count(obj), Ok(1));
    assert_eq!(heap.get_property(obj, slot + 1), Err(EjsError::OutOfBounds));
}

#[test]
fn test_delete_then_lookup_misses() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let name = QName::public("gone");
    let slot = heap.set_property_by_name(obj, &name, None).unwrap();
    heap.set_property_by_name(obj, &QName::public("kept"), None)
        .unwrap();

    heap.delete_property(obj, slot).unwrap();
    assert_eq!(heap.lookup_property(obj, &name), Err(EjsError::NotFound));
    // Not the last slot, so nothing shifts
    assert_eq!(heap.property_count(obj), Ok(2));
    assert_eq!(heap.lookup_property(obj, &QName::public("kept")), Ok(1));

    heap.delete_property_by_name(obj, &QName::public("kept"))
        .unwrap();
    assert_eq!(heap.property_count(obj), Ok(1));
    assert_eq!(
        heap.delete_property_by_name(obj, &QName::public("kept")),
        Err(EjsError::NotFound)
    );
}

#[test]
fn test_twenty_properties_use_hash_index() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let mut values = Vec::new();
    for i in 0..20 {
        let value = heap.create_number(i as f64).unwrap();
        let slot = heap
            .set_property_by_name(obj, &QName::public(format!("prop{i}")), Some(value))
            .unwrap();
        assert_eq!(slot, i);
        values.push(value);
    }

    let object = heap.object(obj).unwrap();
    assert!(object.names().is_hashed());
    assert!(object.names().bucket_count() >= 20);
    assert!(object.names().check_chains(20));
    for i in 0..20 {
        let name = QName::public(format!("prop{i}"));
        assert_eq!(heap.lookup_property(obj, &name), Ok(i));
        assert_eq!(heap.get_property_by_name(obj, &name), Ok(Some(values[i])));
    }
    assert_eq!(
        heap.lookup_property(obj, &QName::public("prop20")),
        Err(EjsError::NotFound)
    );
}

#[test]
fn test_namespace_separates_same_name() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let public = heap
        .set_property_by_name(obj, &QName::public("x"), None)
        .unwrap();
    let internal = heap
        .set_property_by_name(obj, &QName::new("internal", "x"), None)
        .unwrap();
    assert_ne!(public, internal);
    assert_eq!(heap.lookup_property(obj, &QName::public("x")), Ok(public));
    assert_eq!(
        heap.lookup_property(obj, &QName::new("internal", "x")),
        Ok(internal)
    );
    assert_eq!(
        heap.lookup_property(obj, &QName::new("other", "x")),
        Err(EjsError::NotFound)
    );
}

#[test]
fn test_lookup_single_resolution() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let x = heap
        .set_property_by_name(obj, &QName::public("x"), None)
        .unwrap();
    let y = heap
        .set_property_by_name(obj, &QName::new("private", "y"), None)
        .unwrap();
    heap.set_property_by_name(obj, &QName::public("z"), None)
        .unwrap();
    heap.set_property_by_name(obj, &QName::new("intrinsic", "z"), None)
        .unwrap();

    assert_eq!(heap.lookup_single(obj, "x"), Ok((x, SmolStr::default())));
    assert_eq!(heap.lookup_single(obj, "y"), Err(EjsError::Ambiguous));
    assert_eq!(heap.lookup_single(obj, "z"), Err(EjsError::Ambiguous));
    assert_eq!(heap.lookup_single(obj, "w"), Err(EjsError::NotFound));

    heap.add_standard_space("private");
    assert_eq!(heap.lookup_single(obj, "y"), Ok((y, SmolStr::new("private"))));
}

#[test]
fn test_hash_and_linear_paths_agree() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut model: HashMap<QName, usize> = HashMap::new();
    let names: Vec<QName> = (0..40)
        .map(|i| {
            let space = if i % 3 == 0 { "internal" } else { "" };
            QName::new(space, format!("n{}", i % 25))
        })
        .collect();

    for _ in 0..600 {
        let name = &names[rng.gen_range(0..names.len())];
        if rng.gen_bool(0.65) {
            let slot = heap.set_property_by_name(obj, name, None).unwrap();
            if let Some(&previous) = model.get(name) {
                assert_eq!(slot, previous);
            }
            model.insert(name.clone(), slot);
        } else if let Some(slot) = model.remove(name) {
            heap.delete_property(obj, slot).unwrap();
        }

        let object = heap.object(obj).unwrap();
        assert!(object.names().check_chains(object.property_count()));
        for candidate in &names {
            let expected = model.get(candidate).copied().ok_or(EjsError::NotFound);
            assert_eq!(heap.lookup_property(obj, candidate), expected, "{candidate}");
        }
    }
    assert!(heap.object(obj).unwrap().names().is_hashed());
}

#[test]
fn test_small_objects_stay_linear() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    for i in 0..HASH_MIN_PROP {
        heap.set_property_by_name(obj, &QName::public(format!("p{i}")), None)
            .unwrap();
    }
    assert!(!heap.object(obj).unwrap().names().is_hashed());
    assert_eq!(
        heap.lookup_property(obj, &QName::public("p7")),
        Ok(HASH_MIN_PROP - 1)
    );
}

#[test]
fn test_sealed_type_rejects_shape_changes() {
    let mut heap = new_heap();
    let point = heap.define_type(
        TypeDef::new(QName::public("Point"), VarKind::Object)
            .instance_size(16)
            .property(QName::public("x"))
            .property(QName::public("y")),
    );
    let p = heap.create_object(point, 0).unwrap();
    let one = heap.create_number(1.0).unwrap();

    assert_eq!(heap.property_count(p), Ok(2));
    assert_eq!(heap.lookup_property(p, &QName::public("y")), Ok(1));
    assert_eq!(heap.set_property(p, 0, Some(one)), Ok(0));

    assert_eq!(heap.set_property(p, -1, Some(one)), Err(EjsError::TypeError));
    assert!(!heap.error_message().is_empty());
    assert_eq!(heap.delete_property(p, 0), Err(EjsError::TypeError));
    assert_eq!(heap.grow_object(p, 10), Err(EjsError::TypeError));
    assert_eq!(heap.insert_grow_object(p, 1, 0), Err(EjsError::TypeError));
    assert_eq!(heap.remove_slot(p, 0, true), Err(EjsError::TypeError));
}

#[test]
fn test_instances_share_template_names_until_renamed() {
    let mut heap = new_heap();
    let point = heap.define_type(
        TypeDef::new(QName::public("Point"), VarKind::Object)
            .property(QName::public("x"))
            .property(QName::public("y")),
    );
    let a = heap.create_object(point, 0).unwrap();
    let b = heap.create_object(point, 0).unwrap();
    let template = heap.get_type(point).unwrap().instance_template().clone();
    assert!(heap.object(a).unwrap().shares_names_with(&template));
    assert!(heap.object(b).unwrap().shares_names_with(&template));

    heap.set_property_name(a, 1, QName::public("w")).unwrap();
    assert!(!heap.object(a).unwrap().shares_names_with(&template));
    assert!(heap.object(b).unwrap().shares_names_with(&template));
    assert_eq!(heap.lookup_property(a, &QName::public("w")), Ok(1));
    assert_eq!(heap.lookup_property(b, &QName::public("y")), Ok(1));
    assert_eq!(heap.lookup_property(b, &QName::public("w")), Err(EjsError::NotFound));
}

#[test]
fn test_dynamic_and_separate_types_copy_names() {
    let mut heap = new_heap();
    let record = heap.define_type(
        TypeDef::new(QName::public("Record"), VarKind::Object)
            .separate_slots(true)
            .property(QName::public("id")),
    );
    let bag = heap.define_type(
        TypeDef::new(QName::public("Bag"), VarKind::Object)
            .dynamic(true)
            .property(QName::public("size")),
    );
    let r = heap.create_object(record, 0).unwrap();
    let g = heap.create_object(bag, 2).unwrap();
    let record_template = heap.get_type(record).unwrap().instance_template().clone();
    let bag_template = heap.get_type(bag).unwrap().instance_template().clone();

    assert!(!heap.object(r).unwrap().shares_names_with(&record_template));
    assert!(!heap.object(g).unwrap().shares_names_with(&bag_template));
    assert_eq!(heap.property_count(g), Ok(3));
    assert_eq!(heap.property_name_at(g, 0), Ok(&QName::public("size")));
    assert_eq!(heap.property_name_at(g, 2).map(|q| q.is_empty()), Ok(true));
    assert!(heap.object(g).unwrap().is_dynamic());
}

#[test]
fn test_set_past_end_grows_with_null_slots() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let value = heap.create_string("far").unwrap();
    assert_eq!(heap.set_property(obj, 11, Some(value)), Ok(11));
    assert_eq!(heap.property_count(obj), Ok(12));
    assert_eq!(heap.object(obj).unwrap().capacity(), 16);
    for slot in 0..11 {
        assert_eq!(heap.get_property(obj, slot), Ok(None));
    }
    assert_eq!(heap.get_property(obj, 11), Ok(Some(value)));

    heap.grow_object(obj, 40).unwrap();
    assert_eq!(heap.property_count(obj), Ok(40));
    assert_eq!(heap.object(obj).unwrap().capacity(), 40);
    assert_eq!(heap.get_property(obj, 11), Ok(Some(value)));
}

#[test]
fn test_insert_grow_keeps_lookups() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    for i in 0..10 {
        heap.set_property_by_name(obj, &QName::public(format!("p{i}")), None)
            .unwrap();
    }
    heap.insert_grow_object(obj, 2, 0).unwrap();
    assert_eq!(heap.property_count(obj), Ok(12));
    assert_eq!(heap.lookup_property(obj, &QName::public("p0")), Ok(2));
    assert_eq!(heap.lookup_property(obj, &QName::public("p9")), Ok(11));
    assert_eq!(heap.insert_grow_object(obj, 1, 13), Err(EjsError::OutOfBounds));
}

#[test]
fn test_property_errors_on_bad_records() {
    let mut heap = new_heap();
    let number = heap.create_number(1.0).unwrap();
    assert_eq!(heap.get_property(number, 0), Err(EjsError::TypeError));
    assert_eq!(heap.set_property(number, -1, None), Err(EjsError::TypeError));

    heap.create_plain_object().unwrap();
    heap.collect(CollectMode::Quick).unwrap();
    let obj = heap.create_plain_object().unwrap();
    assert_ne!(obj, number);
    assert_eq!(heap.property_count(number), Err(EjsError::ReferenceError));
    assert_eq!(
        heap.set_property(obj, -1, Some(number)),
        Err(EjsError::ReferenceError)
    );
    assert!(heap.error_message().contains("dead"));
}

#[test]
fn test_clone_object_shallow_and_deep() {
    let mut heap = new_heap();
    let global = heap.global();
    let a = heap.create_plain_object().unwrap();
    let b = heap.create_plain_object().unwrap();
    let label = heap.create_string("label").unwrap();
    heap.set_property_by_name(a, &QName::public("self"), Some(a))
        .unwrap();
    heap.set_property_by_name(a, &QName::public("child"), Some(b))
        .unwrap();
    heap.set_property_by_name(b, &QName::public("label"), Some(label))
        .unwrap();
    heap.set_property(global, -1, Some(a)).unwrap();

    let shallow = heap.clone_object(a, false).unwrap();
    assert_ne!(shallow, a);
    assert_eq!(
        heap.get_property_by_name(shallow, &QName::public("child")),
        Ok(Some(b))
    );
    assert_eq!(
        heap.get_property_by_name(shallow, &QName::public("self")),
        Ok(Some(a))
    );

    let deep = heap.clone_object(a, true).unwrap();
    let deep_self = heap
        .get_property_by_name(deep, &QName::public("self"))
        .unwrap();
    let deep_child = heap
        .get_property_by_name(deep, &QName::public("child"))
        .unwrap()
        .unwrap();
    assert_eq!(deep_self, Some(deep));
    assert_ne!(deep_child, b);
    assert_eq!(
        heap.get_property_by_name(deep_child, &QName::public("label")),
        Ok(Some(label))
    );
    assert_eq!(heap.get_property_by_name(b, &QName::public("label")), Ok(Some(label)));
}

#[test]
fn test_compiler_mode_allows_shape_changes() {
    let mut heap = super::heap_with(HeapOption {
        compiler_mode: true,
        ..HeapOption::default()
    });
    let point = heap.define_type(
        TypeDef::new(QName::public("Point"), VarKind::Object).property(QName::public("x")),
    );
    let p = heap.create_object(point, 0).unwrap();
    assert_eq!(heap.set_property(p, -1, None), Ok(1));
    heap.set_property_name(p, 1, QName::public("y")).unwrap();
    heap.delete_property(p, 0).unwrap();
    heap.remove_slot(p, 0, true).unwrap();
    assert_eq!(heap.property_count(p), Ok(1));
    assert_eq!(heap.lookup_property(p, &QName::public("y")), Ok(0));
}

#[test]
fn test_properties_iterates_names_and_values() {
    let mut heap = new_heap();
    let obj = heap.create_plain_object().unwrap();
    let v = heap.create_boolean(false).unwrap();
    heap.set_property_by_name(obj, &QName::public("a"), Some(v))
        .unwrap();
    heap.set_property_by_name(obj, &QName::public("b"), None)
        .unwrap();
    let listed: Vec<_> = heap
        .object(obj)
        .unwrap()
        .properties()
        .map(|(slot, name, value)| (slot, name.map(|q| q.name.to_string()), value))
        .collect();
    assert_eq!(
        listed,
        vec![
            (0, Some("a".to_string()), Some(v)),
            (1, Some("b".to_string()), None)
        ]
    );
}
