use openapiv3::{
    AnySchema, Components, Example, MediaType, ReferenceOr, Response, Schema, SchemaKind,
    StringFormat, Type, VariantOrUnknownOrEmpty,
};
use serde_json::{json, Map, Value};

use super::RequestFault;

/// Reference chains and nested schemas deeper than this produce `null`.
const MAX_DEPTH: usize = 8;

fn unresolved(reference: &str) -> RequestFault {
    RequestFault::new(format!("unresolvable reference '{reference}'"))
}

/// Follow a `$ref` chain through one section of `components`.
fn follow<'a, T>(
    reference: &str,
    prefix: &str,
    lookup: impl Fn(&str) -> Option<&'a ReferenceOr<T>>,
) -> Result<&'a T, RequestFault> {
    let mut current = reference.to_string();
    for _ in 0..MAX_DEPTH {
        let name = current
            .strip_prefix(prefix)
            .ok_or_else(|| unresolved(&current))?;
        match lookup(name) {
            Some(ReferenceOr::Item(item)) => return Ok(item),
            Some(ReferenceOr::Reference { reference }) => current = reference.clone(),
            None => return Err(unresolved(&current)),
        }
    }
    Err(unresolved(reference))
}

/// Produces example payloads from response definitions.
///
/// Explicit examples always win; otherwise a value is synthesized from the
/// schema so every documented response has a body.
pub struct ExampleGenerator<'a> {
    components: Option<&'a Components>,
}

impl<'a> ExampleGenerator<'a> {
    pub fn new(components: Option<&'a Components>) -> Self {
        Self { components }
    }

    pub fn response<'r>(&self, response: &'r ReferenceOr<Response>) -> Result<&'r Response, RequestFault>
    where
        'a: 'r,
    {
        match response {
            ReferenceOr::Item(item) => Ok(item),
            ReferenceOr::Reference { reference } => {
                let components = self.components;
                follow(reference, "#/components/responses/", |name| {
                    components.and_then(|c| c.responses.get(name))
                })
            }
        }
    }

    fn example(&self, example: &'a ReferenceOr<Example>) -> Result<&'a Example, RequestFault> {
        match example {
            ReferenceOr::Item(item) => Ok(item),
            ReferenceOr::Reference { reference } => {
                let components = self.components;
                follow(reference, "#/components/examples/", |name| {
                    components.and_then(|c| c.examples.get(name))
                })
            }
        }
    }

    fn schema(&self, reference: &str) -> Result<&'a Schema, RequestFault> {
        let components = self.components;
        follow(reference, "#/components/schemas/", |name| {
            components.and_then(|c| c.schemas.get(name))
        })
    }

    /// The example body for one media type, or `None` if nothing describes it.
    pub fn media_example(&self, media: &'a MediaType) -> Result<Option<Value>, RequestFault> {
        if let Some(value) = &media.example {
            return Ok(Some(value.clone()));
        }
        if let Some((_, example)) = media.examples.iter().next() {
            if let Some(value) = &self.example(example)?.value {
                return Ok(Some(value.clone()));
            }
        }
        match &media.schema {
            Some(schema) => self.schema_example(schema).map(Some),
            None => Ok(None),
        }
    }

    pub fn schema_example(&self, schema: &'a ReferenceOr<Schema>) -> Result<Value, RequestFault> {
        self.from_ref(schema, 0)
    }

    fn from_ref(&self, schema: &'a ReferenceOr<Schema>, depth: usize) -> Result<Value, RequestFault> {
        match schema {
            ReferenceOr::Item(s) => self.from_schema(s, depth),
            ReferenceOr::Reference { reference } => self.from_schema(self.schema(reference)?, depth + 1),
        }
    }

    fn from_boxed(
        &self,
        schema: &'a ReferenceOr<Box<Schema>>,
        depth: usize,
    ) -> Result<Value, RequestFault> {
        match schema {
            ReferenceOr::Item(s) => self.from_schema(s, depth),
            ReferenceOr::Reference { reference } => self.from_schema(self.schema(reference)?, depth + 1),
        }
    }

    fn from_schema(&self, schema: &'a Schema, depth: usize) -> Result<Value, RequestFault> {
        if depth > MAX_DEPTH {
            return Ok(Value::Null);
        }
        let data = &schema.schema_data;
        if let Some(value) = data.example.as_ref().or(data.default.as_ref()) {
            return Ok(value.clone());
        }

        match &schema.schema_kind {
            SchemaKind::Type(ty) => self.from_type(ty, depth),
            SchemaKind::OneOf { one_of: choices } | SchemaKind::AnyOf { any_of: choices } => {
                match choices.first() {
                    Some(first) => self.from_ref(first, depth + 1),
                    None => Ok(Value::Null),
                }
            }
            SchemaKind::AllOf { all_of } => {
                let mut merged = Map::new();
                for part in all_of {
                    match self.from_ref(part, depth + 1)? {
                        Value::Object(fields) => merged.extend(fields),
                        // A non-object member wins outright; there is nothing to merge into.
                        other => return Ok(other),
                    }
                }
                Ok(Value::Object(merged))
            }
            SchemaKind::Not { .. } => Ok(Value::Null),
            SchemaKind::Any(any) => self.from_any(any, depth),
        }
    }

    fn from_type(&self, ty: &'a Type, depth: usize) -> Result<Value, RequestFault> {
        let value = match ty {
            Type::String(s) => {
                if let Some(first) = s.enumeration.iter().flatten().next() {
                    return Ok(Value::String(first.clone()));
                }
                Value::String(string_placeholder(&s.format))
            }
            Type::Number(n) => {
                if let Some(first) = n.enumeration.iter().flatten().next() {
                    return Ok(json!(first));
                }
                json!(n.minimum.unwrap_or(0.0))
            }
            Type::Integer(i) => {
                if let Some(first) = i.enumeration.iter().flatten().next() {
                    return Ok(json!(first));
                }
                json!(i.minimum.unwrap_or(0))
            }
            Type::Boolean(b) => {
                let first = b.enumeration.iter().flatten().next().copied();
                Value::Bool(first.unwrap_or(true))
            }
            Type::Object(o) => {
                let mut fields = Map::new();
                for (name, prop) in &o.properties {
                    fields.insert(name.clone(), self.from_boxed(prop, depth + 1)?);
                }
                Value::Object(fields)
            }
            Type::Array(a) => match &a.items {
                Some(items) => Value::Array(vec![self.from_boxed(items, depth + 1)?]),
                None => Value::Array(Vec::new()),
            },
        };
        Ok(value)
    }

    fn from_any(&self, any: &'a AnySchema, depth: usize) -> Result<Value, RequestFault> {
        if let Some(first) = any.enumeration.first() {
            return Ok(first.clone());
        }
        if !any.properties.is_empty() {
            let mut fields = Map::new();
            for (name, prop) in &any.properties {
                fields.insert(name.clone(), self.from_boxed(prop, depth + 1)?);
            }
            return Ok(Value::Object(fields));
        }
        if let Some(items) = &any.items {
            return Ok(Value::Array(vec![self.from_boxed(items, depth + 1)?]));
        }
        let value = match any.typ.as_deref() {
            Some("string") => Value::String("string".into()),
            Some("integer") => json!(0),
            Some("number") => json!(0.0),
            Some("boolean") => Value::Bool(true),
            Some("array") => Value::Array(Vec::new()),
            Some("object") => Value::Object(Map::new()),
            _ => Value::Null,
        };
        Ok(value)
    }
}

fn string_placeholder(format: &VariantOrUnknownOrEmpty<StringFormat>) -> String {
    let s = match format {
        VariantOrUnknownOrEmpty::Item(StringFormat::Date) => "2024-01-01",
        VariantOrUnknownOrEmpty::Item(StringFormat::DateTime) => "2024-01-01T00:00:00Z",
        VariantOrUnknownOrEmpty::Item(StringFormat::Password) => "********",
        VariantOrUnknownOrEmpty::Item(StringFormat::Byte) => "ZXhhbXBsZQ==",
        VariantOrUnknownOrEmpty::Item(StringFormat::Binary) => "",
        VariantOrUnknownOrEmpty::Unknown(other) => match other.as_str() {
            "email" => "user@example.com",
            "uuid" => "00000000-0000-0000-0000-000000000000",
            "uri" | "url" => "https://example.com",
            "hostname" => "example.com",
            "ipv4" => "127.0.0.1",
            "ipv6" => "::1",
            _ => "string",
        },
        VariantOrUnknownOrEmpty::Empty => "string",
    };
    s.to_string()
}
