use anyhow::Result;
use rill_types::types::{
    ArgumentsSource, AttrType, Attribute, DataType, Loader, ObjectKind, TypeHandle,
};
use rill_types::value::Value;
use rill_types::CodecError;
use std::sync::Arc;

pub fn roundtrip_binary(value: &Value, loader: &Loader) -> Result<Value> {
    Ok(rill_wire::from_binary(&rill_wire::to_binary(value)?, loader)?)
}

pub fn roundtrip_text(value: &Value, loader: &Loader) -> Result<Value> {
    Ok(rill_wire::from_text(&rill_wire::to_text(value)?, loader)?)
}

/// Round-trips through both codecs and compares structurally. Only for
/// acyclic values; cyclic ones need targeted identity assertions instead.
pub fn verify_roundtrip(value: &Value) -> Result<()> {
    assert_eq!(&roundtrip_binary(value, &Loader::new())?, value);
    assert_eq!(&roundtrip_text(value, &Loader::new())?, value);
    Ok(())
}

/// A factory that pulls all of its arguments before calling remember,
/// forcing the decoder through the placeholder path. Lives in the reserved
/// namespace so its instances travel by name.
#[derive(Debug)]
pub struct LateBoundPair {
    attributes: Vec<Attribute>,
}

impl LateBoundPair {
    pub const NAME: &'static str = "Core::Pair";

    pub fn handle() -> TypeHandle {
        Arc::new(Self {
            attributes: vec![
                Attribute::new("first", AttrType::Any),
                Attribute::new("second", AttrType::Any),
            ],
        })
    }
}

impl DataType for LateBoundPair {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_instance(&self, value: &Value) -> bool {
        matches!(
            value,
            Value::Object(cell)
                if cell.borrow().dtype.as_ref().map_or(false, |t| t.name() == Self::NAME)
        )
    }

    fn object_kind(&self) -> Option<&dyn ObjectKind> {
        Some(self)
    }

    fn new_instance(
        &self,
        this: &TypeHandle,
        args: &mut dyn ArgumentsSource,
    ) -> rill_types::Result<Value> {
        let first = args.next()?;
        let second = args.next()?;
        Ok(args.remember(Value::object(this.clone(), vec![first, second])))
    }
}

impl ObjectKind for LateBoundPair {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    fn attribute_values(&self, value: &Value) -> rill_types::Result<Vec<Value>> {
        match value {
            Value::Object(cell) => Ok(cell.borrow().attrs.clone()),
            _ => Err(CodecError::NoDerivableType {
                kind: value.kind_name(),
            }),
        }
    }
}
