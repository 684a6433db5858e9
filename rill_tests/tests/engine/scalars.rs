use super::helpers::verify_roundtrip;
use anyhow::Result;
use rill_types::types::Loader;
use rill_types::value::{Pattern, Timespan, Timestamp, Value, VersionRange};
use std::rc::Rc;

fn every_scalar_kind() -> Result<Vec<Value>> {
    Ok(vec![
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(i64::MIN),
        Value::Int(0),
        Value::Float(-0.5),
        Value::str(""),
        Value::str("plain text"),
        Value::binary(vec![]),
        Value::binary((0u8..=255).collect()),
        Value::symbol("running"),
        Value::comment("leading note"),
        Value::Pattern(Rc::new(Pattern::new(r"^\d{4}-\d{2}$")?)),
        Value::Version(Rc::new(semver::Version::parse("2.0.1-beta.3")?)),
        Value::VersionRange(Rc::new(VersionRange::parse(">=1.0.0, <3.0.0")?)),
        Value::Timestamp(Timestamp::new(1_700_000_000, 999_999_999)?),
        Value::Timespan(Timespan::new(-5, 0)?),
        Value::Default,
        Value::type_ref("Acme::Unbound"),
    ])
}

#[test]
fn every_scalar_kind_roundtrips_both_codecs() -> Result<()> {
    for v in every_scalar_kind()? {
        verify_roundtrip(&v)?;
    }
    // And all of them inside one document, exercising a mixed stream.
    verify_roundtrip(&Value::seq(every_scalar_kind()?))?;
    Ok(())
}

#[test]
fn text_documents_are_valid_json() -> Result<()> {
    let doc = rill_wire::to_text(&Value::seq(every_scalar_kind()?))?;
    serde_json::from_str::<serde_json::Value>(&doc)?;
    Ok(())
}

#[test]
fn equal_but_distinct_strings_tabulate_by_value() -> Result<()> {
    // Two separate allocations with the same text: the wire keeps one copy.
    let v = Value::seq(vec![Value::str("namespace"), Value::str("namespace")]);
    let bytes = rill_wire::to_binary(&v)?;
    let needle = b"namespace";
    let occurrences = bytes.windows(needle.len()).filter(|w| w == needle).count();
    assert_eq!(occurrences, 1);

    let decoded = super::helpers::roundtrip_binary(&v, &Loader::new())?;
    assert_eq!(decoded, v);
    Ok(())
}

#[test]
fn kinds_sharing_one_allocation_stay_distinct() -> Result<()> {
    // A Str and a Symbol built over the same Rc<str> must not alias in the
    // identity table: the second position is not a back-reference.
    let backing: Rc<str> = Rc::from("shared");
    let v = Value::seq(vec![Value::Symbol(backing.clone()), Value::Str(backing)]);

    for decoded in [
        super::helpers::roundtrip_binary(&v, &Loader::new())?,
        super::helpers::roundtrip_text(&v, &Loader::new())?,
    ] {
        assert_eq!(decoded, v);
        let Value::Seq(elems) = &decoded else { panic!() };
        let elems = elems.borrow();
        assert!(matches!(elems[0], Value::Symbol(_)));
        assert!(matches!(elems[1], Value::Str(_)));
    }
    Ok(())
}

#[test]
fn unknown_extension_tag_names_the_byte() {
    // A syntactically valid text document with an unassigned tag number.
    let err = rill_wire::from_text("[9]", &Loader::new()).unwrap_err();
    assert!(err
        .to_string()
        .contains("not a valid extension number: 0x09"));
}
