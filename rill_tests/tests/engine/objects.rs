use super::helpers::{roundtrip_binary, roundtrip_text, LateBoundPair};
use anyhow::Result;
use rill_types::types::{AttrType, Attribute, Loader, ObjectDataType};
use rill_types::value::Value;
use rill_types::CodecError;
use std::sync::Arc;

fn widget_type() -> rill_types::types::TypeHandle {
    ObjectDataType::handle(
        "Acme::Widget",
        vec![
            Attribute::new("label", AttrType::Str),
            Attribute::new("count", AttrType::Int),
        ],
    )
}

#[test]
fn generic_object_carries_its_definition() -> Result<()> {
    let v = Value::object(widget_type(), vec![Value::str("bolt"), Value::Int(12)]);

    // The decoding side has never heard of Acme::Widget; the definition
    // travels inline and gets bound on first sight.
    let loader = Loader::new();
    for decoded in [
        roundtrip_binary(&v, &loader)?,
        roundtrip_text(&v, &loader)?,
    ] {
        assert_eq!(decoded, v);
        let Value::Object(cell) = &decoded else { panic!() };
        assert_eq!(
            cell.borrow().dtype.as_ref().unwrap().name(),
            "Acme::Widget"
        );
    }
    assert!(loader.lookup("Acme::Widget").is_some());
    Ok(())
}

#[test]
fn second_decode_reuses_the_loader_binding() -> Result<()> {
    let v = Value::object(widget_type(), vec![Value::str("nut"), Value::Int(3)]);
    let bytes = rill_wire::to_binary(&v)?;

    let loader = Loader::new();
    let first = rill_wire::from_binary(&bytes, &loader)?;
    let second = rill_wire::from_binary(&bytes, &loader)?;

    let dtype_of = |v: &Value| match v {
        Value::Object(cell) => cell.borrow().dtype.clone().unwrap(),
        _ => panic!(),
    };
    assert!(Arc::ptr_eq(&dtype_of(&first), &dtype_of(&second)));
    assert!(Arc::ptr_eq(
        &dtype_of(&first),
        &loader.lookup("Acme::Widget").unwrap()
    ));
    Ok(())
}

#[test]
fn objects_sharing_one_type_encode_its_definition_once() -> Result<()> {
    let dtype = widget_type();
    let v = Value::seq(vec![
        Value::object(dtype.clone(), vec![Value::str("a"), Value::Int(1)]),
        Value::object(dtype, vec![Value::str("b"), Value::Int(2)]),
    ]);
    let bytes = rill_wire::to_binary(&v)?;
    let needle = b"Widget";
    assert_eq!(
        bytes.windows(needle.len()).filter(|w| w == needle).count(),
        1
    );
    assert_eq!(roundtrip_binary(&v, &Loader::new())?, v);
    Ok(())
}

#[test]
fn named_object_requires_a_binding() -> Result<()> {
    let loader = Loader::new();
    loader.bind_if_absent(LateBoundPair::NAME, LateBoundPair::handle())?;
    let v = Value::object(
        loader.lookup(LateBoundPair::NAME).unwrap(),
        vec![Value::str("l"), Value::str("r")],
    );
    let bytes = rill_wire::to_binary(&v)?;

    assert_eq!(rill_wire::from_binary(&bytes, &loader)?, v);

    let err = rill_wire::from_binary(&bytes, &Loader::new()).unwrap_err();
    assert!(err
        .to_string()
        .contains("no implementation mapping found for 'Core::Pair'"));
    Ok(())
}

#[test]
fn pull_first_factory_reconstructs_self_reference() -> Result<()> {
    let loader = Loader::new();
    loader.bind_if_absent(LateBoundPair::NAME, LateBoundPair::handle())?;
    let dtype = loader.lookup(LateBoundPair::NAME).unwrap();

    let v = Value::object(dtype, vec![]);
    if let Value::Object(cell) = &v {
        cell.borrow_mut().attrs.push(v.clone());
        cell.borrow_mut().attrs.push(Value::Int(5));
    }

    for decoded in [
        roundtrip_binary(&v, &loader)?,
        roundtrip_text(&v, &loader)?,
    ] {
        let Value::Object(cell) = &decoded else { panic!() };
        let attrs = cell.borrow().attrs.clone();
        assert!(attrs[0].same_instance(&decoded));
        assert_eq!(attrs[1], Value::Int(5));
    }
    Ok(())
}

#[test]
fn mistyped_argument_names_the_index() -> Result<()> {
    let loader = Loader::new();
    loader.bind_if_absent("Core::Tagged", ObjectDataType::handle(
        "Core::Tagged",
        vec![Attribute::new("label", AttrType::Str)],
    ))?;
    let dtype = loader.lookup("Core::Tagged").unwrap();

    // Nothing stops a caller from building a mistyped instance; the decoder
    // is where the signature is enforced.
    let v = Value::object(dtype, vec![Value::Int(5)]);
    let bytes = rill_wire::to_binary(&v)?;
    let err = rill_wire::from_binary(&bytes, &loader).unwrap_err();
    match err {
        CodecError::TypeAssertion {
            type_name,
            index,
            param,
        } => {
            assert_eq!(type_name, "Core::Tagged");
            assert_eq!(index, 0);
            assert_eq!(param, "label");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn frozen_loader_rejects_discovered_types() -> Result<()> {
    let v = Value::object(widget_type(), vec![Value::str("x"), Value::Int(0)]);
    let bytes = rill_wire::to_binary(&v)?;

    let loader = Loader::new();
    loader.freeze();
    let err = rill_wire::from_binary(&bytes, &loader).unwrap_err();
    assert!(matches!(err, CodecError::Contract(_)));
    Ok(())
}

#[test]
fn reserved_type_handle_travels_by_reference() -> Result<()> {
    let loader = Loader::new();
    let meta = loader.lookup("Core::ObjectType").unwrap();
    let v = Value::seq(vec![Value::Type(meta)]);

    let decoded = roundtrip_binary(&v, &loader)?;
    let Value::Seq(elems) = &decoded else { panic!() };
    let elems = elems.borrow();
    let Value::Type(dtype) = &elems[0] else { panic!() };
    assert!(Arc::ptr_eq(dtype, &loader.lookup("Core::ObjectType").unwrap()));
    Ok(())
}

#[test]
fn bound_type_reference_resolves_on_decode() -> Result<()> {
    // An unresolved name encodes as TYPE_REFERENCE; when the decoding side
    // has the name bound, it comes back as the loader's own handle rather
    // than staying unresolved.
    let loader = Loader::new();
    loader.bind_if_absent("Acme::Widget", widget_type())?;

    let v = Value::seq(vec![Value::type_ref("Acme::Widget")]);
    for decoded in [
        roundtrip_binary(&v, &loader)?,
        roundtrip_text(&v, &loader)?,
    ] {
        let Value::Seq(elems) = &decoded else { panic!() };
        let elems = elems.borrow();
        let Value::Type(dtype) = &elems[0] else { panic!() };
        assert!(Arc::ptr_eq(dtype, &loader.lookup("Acme::Widget").unwrap()));
    }
    Ok(())
}
