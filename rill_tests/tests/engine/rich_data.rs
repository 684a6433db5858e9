use super::helpers::LateBoundPair;
use anyhow::Result;
use rill_data::{from_data, from_data_with, to_data, to_data_with, FromDataOptions, ToDataOptions};
use rill_types::types::{AttrType, Attribute, Loader, ObjectDataType};
use rill_types::value::{Timestamp, Value, ValueMap};
use rill_types::CodecError;
use serde_json::json;

#[test]
fn sensitive_string_roundtrips_through_data() -> Result<()> {
    let v = Value::sensitive(Value::str("s3cret"));
    let data = to_data(&v)?;
    assert_eq!(data, json!({ "__type": "Sensitive", "__value": "s3cret" }));
    assert_eq!(from_data(&data, &Loader::new())?, v);
    Ok(())
}

#[test]
fn integer_keyed_map_roundtrips_through_data() -> Result<()> {
    let mut map = ValueMap::new();
    map.insert(Value::Int(1), Value::str("one"));
    map.insert(Value::str("two"), Value::Int(2));
    let v = Value::map(map);

    let data = to_data(&v)?;
    assert_eq!(from_data(&data, &Loader::new())?, v);
    Ok(())
}

#[test]
fn shared_sub_list_survives_as_a_local_ref() -> Result<()> {
    let shared = Value::seq(vec![Value::Int(1), Value::Int(2)]);
    let v = Value::seq(vec![shared.clone(), shared]);

    let data = to_data(&v)?;
    assert_eq!(
        data,
        json!([[1, 2], { "__type": "LocalRef", "__value": "$[0]" }])
    );

    let decoded = from_data(&data, &Loader::new())?;
    assert_eq!(decoded, v);
    let Value::Seq(elems) = &decoded else { panic!() };
    let elems = elems.borrow();
    assert!(elems[0].same_instance(&elems[1]));
    Ok(())
}

#[test]
fn cycle_with_local_references_roundtrips() -> Result<()> {
    let map = Value::map(ValueMap::new());
    if let Value::Map(cell) = &map {
        cell.borrow_mut().insert(Value::str("self"), map.clone());
    }

    let data = to_data(&map)?;
    assert_eq!(data, json!({ "self": { "__type": "LocalRef", "__value": "$" } }));

    let decoded = from_data(&data, &Loader::new())?;
    let Value::Map(cell) = &decoded else { panic!() };
    assert!(cell
        .borrow()
        .get_str("self")
        .unwrap()
        .same_instance(&decoded));
    Ok(())
}

#[test]
fn typed_object_by_name_needs_a_resolver() -> Result<()> {
    let loader = Loader::new();
    loader.bind_if_absent(
        "Core::Tagged",
        ObjectDataType::handle(
            "Core::Tagged",
            vec![Attribute::new("label", AttrType::Str)],
        ),
    )?;
    let dtype = loader.lookup("Core::Tagged").unwrap();
    let v = Value::object(dtype, vec![Value::str("bolt")]);

    let data = to_data(&v)?;
    assert_eq!(data, json!({ "__type": "Core::Tagged", "label": "bolt" }));
    assert_eq!(from_data(&data, &loader)?, v);

    // Without the binding the node is either an error or, when allowed,
    // a plain map.
    assert!(matches!(
        from_data(&data, &Loader::new()),
        Err(CodecError::NoImplementationMapping { .. })
    ));
    let plain = from_data_with(
        &data,
        &Loader::new(),
        FromDataOptions {
            allow_unresolved: true,
        },
    )?;
    assert!(matches!(plain, Value::Map(_)));
    Ok(())
}

#[test]
fn structural_type_tags_are_self_sufficient() -> Result<()> {
    let dtype = ObjectDataType::handle(
        "Acme::Widget",
        vec![
            Attribute::new("label", AttrType::Str),
            Attribute::new("count", AttrType::Int),
        ],
    );
    let v = Value::object(dtype, vec![Value::str("nut"), Value::Int(3)]);

    let opts = ToDataOptions {
        type_by_reference: false,
        ..ToDataOptions::default()
    };
    let data = to_data_with(&v, opts)?;
    assert_eq!(
        data,
        json!({
            "__type": {
                "name": "Acme::Widget",
                "attributes": { "label": "String", "count": "Integer" }
            },
            "label": "nut",
            "count": 3
        })
    );

    // An empty resolver suffices: the definition travels with the node.
    assert_eq!(from_data(&data, &Loader::new())?, v);
    Ok(())
}

#[test]
fn self_referential_object_through_data() -> Result<()> {
    let loader = Loader::new();
    loader.bind_if_absent(LateBoundPair::NAME, LateBoundPair::handle())?;
    let dtype = loader.lookup(LateBoundPair::NAME).unwrap();

    let v = Value::object(dtype, vec![]);
    if let Value::Object(cell) = &v {
        cell.borrow_mut().attrs.push(v.clone());
        cell.borrow_mut().attrs.push(Value::Int(5));
    }

    let data = to_data(&v)?;
    assert_eq!(
        data,
        json!({
            "__type": "Core::Pair",
            "first": { "__type": "LocalRef", "__value": "$" },
            "second": 5
        })
    );

    let decoded = from_data(&data, &loader)?;
    let Value::Object(cell) = &decoded else { panic!() };
    let attrs = cell.borrow().attrs.clone();
    assert!(attrs[0].same_instance(&decoded));
    assert_eq!(attrs[1], Value::Int(5));
    Ok(())
}

#[test]
fn cycle_without_local_references_fails() {
    let seq = Value::seq(vec![]);
    if let Value::Seq(cell) = &seq {
        cell.borrow_mut().push(seq.clone());
    }
    let opts = ToDataOptions {
        local_reference: false,
        ..ToDataOptions::default()
    };
    let err = to_data_with(&seq, opts).unwrap_err();
    assert!(matches!(err, CodecError::EndlessRecursion { .. }));
}

#[test]
fn non_rich_mode_degrades_instead_of_failing() -> Result<()> {
    let opts = ToDataOptions {
        rich_data: false,
        ..ToDataOptions::default()
    };
    let t = Value::Timestamp(Timestamp::new(9, 0)?);
    assert_eq!(to_data_with(&t, opts)?, json!("9.000000000"));
    assert_eq!(
        to_data_with(&Value::sensitive(Value::Int(1)), opts)?,
        json!("Sensitive [value redacted]")
    );
    assert_eq!(to_data_with(&Value::symbol("up"), opts)?, json!("up"));
    Ok(())
}

#[test]
fn wire_and_data_agree_on_values() -> Result<()> {
    // The same graph pushed through both pipelines reconstructs equal.
    let mut map = ValueMap::new();
    map.insert(Value::str("when"), Value::Timestamp(Timestamp::new(7, 5)?));
    map.insert(Value::str("tags"), Value::seq(vec![Value::symbol("a")]));
    let v = Value::map(map);

    let via_wire = rill_wire::from_binary(&rill_wire::to_binary(&v)?, &Loader::new())?;
    let via_data = from_data(&to_data(&v)?, &Loader::new())?;
    assert_eq!(via_wire, via_data);
    Ok(())
}
