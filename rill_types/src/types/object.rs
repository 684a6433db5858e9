use crate::types::{
    ArgumentsSource, AttrType, Attribute, DataType, ObjectKind, TypeHandle, OBJECT_TYPE_NAME,
};
use crate::value::{Value, ValueMap};
use crate::{CodecError, Result};
use std::sync::Arc;

/// Backing cell of an object value: its type handle plus the ordered
/// attribute values.
///
/// A cell with no type yet is a construction placeholder: the decoder
/// registers it in its identity table before the factory runs, and fills it
/// in place once the real instance exists, so arguments that reference the
/// object under construction resolve correctly.
#[derive(Clone, Debug)]
pub struct ObjectCell {
    pub dtype: Option<TypeHandle>,
    pub attrs: Vec<Value>,
}

impl ObjectCell {
    pub fn new(dtype: TypeHandle, attrs: Vec<Value>) -> Self {
        Self {
            dtype: Some(dtype),
            attrs,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            dtype: None,
            attrs: vec![],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.dtype.is_none()
    }
}

/// The one concrete object type this crate ships: a named type with a flat,
/// ordered attribute list. Anything richer implements [`DataType`] itself.
#[derive(Debug)]
pub struct ObjectDataType {
    name: String,
    attributes: Vec<Attribute>,
}

impl ObjectDataType {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    pub fn handle(name: impl Into<String>, attributes: Vec<Attribute>) -> TypeHandle {
        Arc::new(Self::new(name, attributes))
    }

    /// The definition as plain values: attribute name to kind string, in
    /// declaration order. This is what travels when a non-reserved type is
    /// serialized inline.
    pub fn definition_of(dtype: &TypeHandle) -> Result<(Value, Value)> {
        let kind = dtype
            .object_kind()
            .ok_or_else(|| CodecError::malformed("type has no structural definition"))?;
        let mut def = ValueMap::with_capacity(kind.attributes().len());
        for attr in kind.attributes() {
            def.insert(Value::str(&attr.name), Value::str(attr.kind.as_str()));
        }
        Ok((Value::str(dtype.name()), Value::map(def)))
    }

    pub fn from_definition(name: &str, def: &ValueMap) -> Result<Self> {
        let mut attributes = Vec::with_capacity(def.len());
        for (k, v) in def.iter() {
            let (Value::Str(attr_name), Value::Str(kind)) = (k, v) else {
                return Err(CodecError::malformed(format!(
                    "definition of '{name}' must map attribute names to kind strings"
                )));
            };
            attributes.push(Attribute::new(&**attr_name, AttrType::parse(kind)?));
        }
        Ok(Self::new(name, attributes))
    }
}

impl DataType for ObjectDataType {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_instance(&self, value: &Value) -> bool {
        match value {
            Value::Object(cell) => match &cell.borrow().dtype {
                Some(t) => t.name() == self.name,
                None => false,
            },
            _ => false,
        }
    }

    fn object_kind(&self) -> Option<&dyn ObjectKind> {
        Some(self)
    }

    fn new_instance(&self, this: &TypeHandle, args: &mut dyn ArgumentsSource) -> Result<Value> {
        // Remember before pulling: the still-empty instance is registered up
        // front, and attributes referencing it resolve to the same cell.
        let instance = args.remember(Value::object(this.clone(), vec![]));
        for _ in 0..self.attributes.len() {
            let attr = args.next()?;
            match &instance {
                Value::Object(cell) => cell.borrow_mut().attrs.push(attr),
                _ => return Err(CodecError::Contract("remembered instance is not an object")),
            }
        }
        Ok(instance)
    }
}

impl ObjectKind for ObjectDataType {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    fn attribute_values(&self, value: &Value) -> Result<Vec<Value>> {
        let Value::Object(cell) = value else {
            return Err(CodecError::NoDerivableType {
                kind: value.kind_name(),
            });
        };
        let cell = cell.borrow();
        if cell.attrs.len() != self.attributes.len() {
            return Err(CodecError::malformed(format!(
                "instance of '{}' has {} attributes, declared {}",
                self.name,
                cell.attrs.len(),
                self.attributes.len()
            )));
        }
        Ok(cell.attrs.clone())
    }
}

/// The reserved `Core::ObjectType` meta-type. Its instances are object-type
/// definitions, which is how a non-reserved type travels inline with the
/// objects that use it and gets rebound into the decoder's loader.
#[derive(Debug)]
pub struct ObjectTypeMeta {
    attributes: Vec<Attribute>,
}

impl ObjectTypeMeta {
    pub fn new() -> Self {
        Self {
            attributes: vec![
                Attribute::new("name", AttrType::Str),
                Attribute::new("attributes", AttrType::Map),
            ],
        }
    }

    pub fn handle() -> TypeHandle {
        Arc::new(Self::new())
    }
}

impl Default for ObjectTypeMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl DataType for ObjectTypeMeta {
    fn name(&self) -> &str {
        OBJECT_TYPE_NAME
    }

    fn is_instance(&self, value: &Value) -> bool {
        matches!(value, Value::Type(_))
    }

    fn object_kind(&self) -> Option<&dyn ObjectKind> {
        Some(self)
    }

    fn new_instance(&self, _this: &TypeHandle, args: &mut dyn ArgumentsSource) -> Result<Value> {
        let name = match args.next()? {
            Value::Str(s) => s,
            other => {
                return Err(CodecError::malformed(format!(
                    "type definition name must be a string, got {}",
                    other.kind_name()
                )))
            }
        };
        let def = match args.next()? {
            Value::Map(map) => map,
            other => {
                return Err(CodecError::malformed(format!(
                    "type definition attributes must be a map, got {}",
                    other.kind_name()
                )))
            }
        };
        let dtype = ObjectDataType::from_definition(&name, &def.borrow())?;
        Ok(args.remember(Value::Type(Arc::new(dtype))))
    }
}

impl ObjectKind for ObjectTypeMeta {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    fn attribute_values(&self, value: &Value) -> Result<Vec<Value>> {
        let Value::Type(handle) = value else {
            return Err(CodecError::NoDerivableType {
                kind: value.kind_name(),
            });
        };
        let (name, def) = ObjectDataType::definition_of(handle)?;
        Ok(vec![name, def])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;

    #[test]
    fn definition_roundtrip() -> Result<()> {
        let dtype = ObjectDataType::handle(
            "Inventory::Item",
            vec![
                Attribute::new("label", AttrType::Str),
                Attribute::new("count", AttrType::Int),
            ],
        );
        let (name, def) = ObjectDataType::definition_of(&dtype)?;
        assert_eq!(name, Value::str("Inventory::Item"));

        let Value::Map(def) = def else { panic!() };
        let rebuilt = ObjectDataType::from_definition("Inventory::Item", &def.borrow())?;
        assert_eq!(rebuilt.attributes().len(), 2);
        assert_eq!(rebuilt.attributes()[1].kind, AttrType::Int);
        Ok(())
    }

    #[test]
    fn is_instance_by_type_name() {
        let dtype = ObjectDataType::handle("A", vec![]);
        let other = ObjectDataType::handle("B", vec![]);
        let v = Value::object(dtype.clone(), vec![]);
        assert!(dtype.is_instance(&v));
        assert!(!other.is_instance(&v));
        assert!(!dtype.is_instance(&Value::Int(0)));
    }
}
