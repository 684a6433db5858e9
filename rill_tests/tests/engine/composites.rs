use super::helpers::{roundtrip_binary, roundtrip_text, verify_roundtrip};
use anyhow::Result;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rill_types::types::Loader;
use rill_types::value::{Value, ValueMap};

#[test]
fn nested_composites_roundtrip() -> Result<()> {
    let mut inner = ValueMap::new();
    inner.insert(Value::str("enabled"), Value::Bool(true));
    inner.insert(Value::Int(7), Value::seq(vec![Value::Null]));

    let mut outer = ValueMap::new();
    outer.insert(Value::str("config"), Value::map(inner));
    outer.insert(
        Value::str("token"),
        Value::sensitive(Value::str("s3cret")),
    );
    verify_roundtrip(&Value::map(outer))
}

#[test]
fn map_key_order_survives() -> Result<()> {
    let mut map = ValueMap::new();
    for key in ["zeta", "alpha", "mid"] {
        map.insert(Value::str(key), Value::Int(0));
    }
    for decoded in [
        roundtrip_binary(&Value::map(map.clone()), &Loader::new())?,
        roundtrip_text(&Value::map(map.clone()), &Loader::new())?,
    ] {
        let Value::Map(cell) = &decoded else { panic!() };
        let keys = cell
            .borrow()
            .keys()
            .map(|k| k.to_string())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }
    Ok(())
}

#[test]
fn shared_instance_encodes_once_and_decodes_shared() -> Result<()> {
    let shared = Value::map({
        let mut m = ValueMap::new();
        m.insert(Value::str("payload"), Value::str("only-once"));
        m
    });
    let outer = Value::seq(vec![shared.clone(), shared.clone(), shared]);

    // One full encoding; the other two positions are back-references.
    let bytes = rill_wire::to_binary(&outer)?;
    let needle = b"only-once";
    assert_eq!(
        bytes.windows(needle.len()).filter(|w| w == needle).count(),
        1
    );

    for decoded in [
        roundtrip_binary(&outer, &Loader::new())?,
        roundtrip_text(&outer, &Loader::new())?,
    ] {
        assert_eq!(decoded, outer);
        let Value::Seq(elems) = &decoded else { panic!() };
        let elems = elems.borrow();
        assert!(elems[0].same_instance(&elems[1]));
        assert!(elems[0].same_instance(&elems[2]));
    }
    Ok(())
}

#[test]
fn self_referential_map_reconstructs() -> Result<()> {
    let map = Value::map(ValueMap::new());
    if let Value::Map(cell) = &map {
        cell.borrow_mut().insert(Value::str("self"), map.clone());
        cell.borrow_mut().insert(Value::str("n"), Value::Int(1));
    }

    for decoded in [
        roundtrip_binary(&map, &Loader::new())?,
        roundtrip_text(&map, &Loader::new())?,
    ] {
        let Value::Map(cell) = &decoded else { panic!() };
        let entries = cell.borrow();
        assert!(entries.get_str("self").unwrap().same_instance(&decoded));
        assert_eq!(entries.get_str("n"), Some(&Value::Int(1)));
    }
    Ok(())
}

#[test]
fn map_keyed_by_itself_reconstructs() -> Result<()> {
    // The key scan inside insert must stay inert while the map's own cell
    // is mutably borrowed, on construction and during decode alike.
    let map = Value::map(ValueMap::new());
    if let Value::Map(cell) = &map {
        cell.borrow_mut()
            .insert(Value::map(ValueMap::new()), Value::Null);
        cell.borrow_mut().insert(map.clone(), Value::Null);
    }

    for decoded in [
        roundtrip_binary(&map, &Loader::new())?,
        roundtrip_text(&map, &Loader::new())?,
    ] {
        let Value::Map(cell) = &decoded else { panic!() };
        let entries = cell.borrow();
        assert_eq!(entries.len(), 2);
        assert!(entries.keys().nth(1).unwrap().same_instance(&decoded));
    }

    // The same shape as a raw document: MAP_START(2) holding an empty map
    // key and a back-reference to the outer map itself as the second key.
    let decoded = rill_wire::from_text("[17,2,[17,0],null,[1,0],null]", &Loader::new())?;
    let Value::Map(cell) = &decoded else { panic!() };
    let entries = cell.borrow();
    assert!(entries.keys().nth(1).unwrap().same_instance(&decoded));
    Ok(())
}

#[test]
fn sensitive_holding_shared_structure() -> Result<()> {
    let inner = Value::seq(vec![Value::Int(9)]);
    let outer = Value::seq(vec![
        Value::sensitive(inner.clone()),
        inner,
    ]);
    for decoded in [
        roundtrip_binary(&outer, &Loader::new())?,
        roundtrip_text(&outer, &Loader::new())?,
    ] {
        assert_eq!(decoded, outer);
        let Value::Seq(elems) = &decoded else { panic!() };
        let elems = elems.borrow();
        let Value::Sensitive(wrapped) = &elems[0] else {
            panic!()
        };
        assert!(wrapped.borrow().same_instance(&elems[1]));
    }
    Ok(())
}

#[test]
fn composite_shapes_roundtrip_in_any_order() -> Result<()> {
    let parts = vec![
        Value::seq(vec![Value::Int(1), Value::str("x")]),
        Value::map({
            let mut m = ValueMap::new();
            m.insert(Value::str("k"), Value::Null);
            m
        }),
        Value::sensitive(Value::symbol("hidden")),
        Value::seq(vec![]),
    ];
    let mut rng = rand::thread_rng();
    for subset in parts.iter().cloned().powerset() {
        let mut elems = subset;
        elems.shuffle(&mut rng);
        verify_roundtrip(&Value::seq(elems))?;
    }
    Ok(())
}

#[test]
fn pathological_nesting_fails_cleanly() -> Result<()> {
    let mut v = Value::Int(0);
    for _ in 0..600 {
        v = Value::seq(vec![v]);
    }
    let err = rill_wire::to_binary(&v).unwrap_err();
    assert!(err.to_string().contains("recursion limit"));
    Ok(())
}
