// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Decoding of resolver output: the optional header block followed by a payload whose
//! interpretation depends on the field's declared type.

use async_graphql_value::{ConstValue, Name};
use common::http::Headers;
use core_model::{
    primitive_type::PrimitiveType,
    schema::LinkedSchema,
    types::{NamedType, TypeReference},
};

use crate::error::{CompileError, ResolverError};

/// Split `output` at its first blank line into response headers and payload. Output without a
/// blank line is all payload.
pub fn split_output(output: &[u8]) -> Result<(Headers, &[u8]), ResolverError> {
    let separator = [&b"\r\n\r\n"[..], &b"\n\n"[..]]
        .iter()
        .filter_map(|separator| {
            find(output, separator).map(|position| (position, separator.len()))
        })
        .min_by_key(|(position, _)| *position);

    match separator {
        None => Ok((Headers::new(), output)),
        Some((position, length)) => {
            let headers = parse_headers(&output[..position])?;
            Ok((headers, &output[position + length..]))
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_headers(block: &[u8]) -> Result<Headers, ResolverError> {
    let block = std::str::from_utf8(block)
        .map_err(|_| ResolverError::MalformedHeaders("header block is not UTF-8".to_string()))?;

    let mut entries: Vec<(String, String)> = vec![];

    for line in block.lines() {
        if line.starts_with([' ', '\t']) {
            // Continuation of the previous header's value
            match entries.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                    continue;
                }
                None => {
                    return Err(ResolverError::MalformedHeaders(format!(
                        "continuation without a header: {line:?}"
                    )));
                }
            }
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            ResolverError::MalformedHeaders(format!("expected 'Name: value', got {line:?}"))
        })?;

        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(ResolverError::MalformedHeaders(format!(
                "invalid header name {name:?}"
            )));
        }

        entries.push((name.to_string(), value.trim().to_string()));
    }

    Ok(Headers::from_vec(entries))
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[derive(Debug, Clone, PartialEq)]
enum OutputKind {
    Text,
    Int,
    Float,
    Boolean,
    DateTime,
    Enum(Vec<String>),
    /// Objects, lists of objects and interfaces, passed through as JSON
    Json,
}

/// Turns a payload into the value of one field. Chosen once per field when the schema is built.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecoder {
    kind: OutputKind,
    nullable: bool,
}

impl OutputDecoder {
    pub fn compile(
        schema: &LinkedSchema,
        object: &str,
        field: &str,
        typ: &TypeReference,
    ) -> Result<Self, CompileError> {
        let type_name = || schema.type_display(typ);
        let nullable = !typ.is_non_null();
        let innermost = typ.innermost();

        if let NamedType::Input(_) | NamedType::Unknown(_) = innermost {
            return Err(CompileError::InvalidOutput {
                object: object.to_string(),
                field: field.to_string(),
                type_name: type_name(),
            });
        }

        let kind = if typ.is_list() {
            match innermost {
                NamedType::Object(_) | NamedType::Interface(_) => OutputKind::Json,
                _ => {
                    return Err(CompileError::UnsupportedOutput {
                        object: object.to_string(),
                        field: field.to_string(),
                        type_name: type_name(),
                    });
                }
            }
        } else {
            match innermost {
                NamedType::Primitive(PrimitiveType::String | PrimitiveType::Id) => {
                    OutputKind::Text
                }
                NamedType::Primitive(PrimitiveType::Int) => OutputKind::Int,
                NamedType::Primitive(PrimitiveType::Float) => OutputKind::Float,
                NamedType::Primitive(PrimitiveType::Boolean) => OutputKind::Boolean,
                NamedType::Primitive(PrimitiveType::DateTime) => OutputKind::DateTime,
                NamedType::Enum(id) => OutputKind::Enum(
                    schema.enums[*id]
                        .values
                        .iter()
                        .map(|value| value.name.clone())
                        .collect(),
                ),
                _ => OutputKind::Json,
            }
        };

        Ok(Self { kind, nullable })
    }

    pub fn decode(&self, payload: &[u8]) -> Result<ConstValue, ResolverError> {
        if let OutputKind::Text = self.kind {
            if payload.is_empty() {
                return self.empty();
            }
            return String::from_utf8(payload.to_vec())
                .map(ConstValue::String)
                .map_err(|_| ResolverError::Decode("output is not UTF-8".to_string()));
        }

        let text = std::str::from_utf8(payload)
            .map_err(|_| ResolverError::Decode("output is not UTF-8".to_string()))?
            .trim();
        if text.is_empty() {
            return self.empty();
        }

        match &self.kind {
            OutputKind::Text => Ok(ConstValue::String(text.to_string())),
            OutputKind::Int => {
                let value: i64 = text
                    .parse()
                    .map_err(|_| ResolverError::Decode(format!("not an integer: {text:?}")))?;
                i32::try_from(value).map_err(|_| {
                    ResolverError::Decode(format!("integer out of range: {value}"))
                })?;
                Ok(ConstValue::Number(value.into()))
            }
            OutputKind::Float => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| ResolverError::Decode(format!("not a number: {text:?}")))?;
                serde_json::Number::from_f64(value)
                    .map(ConstValue::Number)
                    .ok_or_else(|| ResolverError::Decode(format!("not a finite number: {text}")))
            }
            OutputKind::Boolean => {
                if text.eq_ignore_ascii_case("true") {
                    Ok(ConstValue::Boolean(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(ConstValue::Boolean(false))
                } else {
                    Err(ResolverError::Decode(format!("not a boolean: {text:?}")))
                }
            }
            OutputKind::DateTime => chrono::DateTime::parse_from_rfc3339(text)
                .map(|timestamp| ConstValue::String(timestamp.to_rfc3339()))
                .map_err(|e| ResolverError::Decode(format!("not an RFC 3339 timestamp: {e}"))),
            OutputKind::Enum(values) => {
                let by_name = values.iter().find(|value| *value == text);
                let by_ordinal = || {
                    text.parse::<usize>()
                        .ok()
                        .and_then(|ordinal| values.get(ordinal))
                };

                by_name
                    .or_else(by_ordinal)
                    .map(|value| ConstValue::Enum(Name::new(value)))
                    .ok_or_else(|| ResolverError::Decode(format!("unknown enum value: {text:?}")))
            }
            OutputKind::Json => {
                let json: serde_json::Value = serde_json::from_str(text)
                    .map_err(|e| ResolverError::Decode(format!("invalid JSON: {e}")))?;
                ConstValue::from_json(json).map_err(|e| ResolverError::Decode(e.to_string()))
            }
        }
    }

    fn empty(&self) -> Result<ConstValue, ResolverError> {
        if self.nullable {
            Ok(ConstValue::Null)
        } else {
            Err(ResolverError::Decode(
                "empty output for a non-null field".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use core_model::{
        mapped_arena::MappedArena,
        types::{EnumType, EnumValue, ObjectType},
    };

    use super::*;

    fn schema() -> LinkedSchema {
        let mut enums = MappedArena::default();
        enums.add(
            "Color",
            EnumType {
                name: "Color".to_string(),
                description: None,
                values: ["RED", "GREEN"]
                    .iter()
                    .enumerate()
                    .map(|(ordinal, name)| EnumValue {
                        name: name.to_string(),
                        description: None,
                        ordinal,
                    })
                    .collect(),
            },
        );

        let mut objects = MappedArena::default();
        let query = objects.add(
            "Query",
            ObjectType {
                name: "Query".to_string(),
                description: None,
                fields: vec![],
                implements: vec![],
            },
        );

        LinkedSchema {
            enums,
            inputs: MappedArena::default(),
            objects,
            interfaces: MappedArena::default(),
            query,
            mutation: None,
        }
    }

    fn decoder(schema: &LinkedSchema, typ: TypeReference) -> OutputDecoder {
        OutputDecoder::compile(schema, "Query", "field", &typ).unwrap()
    }

    fn primitive(pt: PrimitiveType) -> TypeReference {
        TypeReference::Named(NamedType::Primitive(pt))
    }

    fn non_null(typ: TypeReference) -> TypeReference {
        TypeReference::NonNull(Box::new(typ))
    }

    #[test]
    fn header_block_and_payload() {
        let (headers, payload) = split_output(b"X-Cache: HIT\n\n{\"a\":1}").unwrap();
        assert_eq!(headers.get("x-cache").as_deref(), Some("HIT"));
        assert_eq!(payload, b"{\"a\":1}");

        let (headers, payload) =
            split_output(b"Set-Cookie: a=1\r\nSet-Cookie: b=2\r\nX-Long: one\r\n two\r\n\r\nbody")
                .unwrap();
        assert_eq!(headers.get_all("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(headers.get("x-long").as_deref(), Some("one two"));
        assert_eq!(payload, b"body");

        // Only the first blank line separates
        let (_, payload) = split_output(b"A: 1\n\nx\n\ny").unwrap();
        assert_eq!(payload, b"x\n\ny");

        let (headers, payload) = split_output(b"plain output\n").unwrap();
        assert!(headers.is_empty());
        assert_eq!(payload, b"plain output\n");
    }

    #[test]
    fn malformed_header_block() {
        assert!(matches!(
            split_output(b"not a header\n\npayload"),
            Err(ResolverError::MalformedHeaders(_))
        ));
        assert!(matches!(
            split_output(b"Bad Name: x\n\npayload"),
            Err(ResolverError::MalformedHeaders(_))
        ));
    }

    #[test]
    fn empty_payload_and_nullability() {
        let schema = schema();

        let nullable = decoder(&schema, primitive(PrimitiveType::String));
        assert_eq!(nullable.decode(b"").unwrap(), ConstValue::Null);

        let required = decoder(&schema, non_null(primitive(PrimitiveType::String)));
        assert!(matches!(
            required.decode(b""),
            Err(ResolverError::Decode(_))
        ));

        let int = decoder(&schema, primitive(PrimitiveType::Int));
        assert_eq!(int.decode(b"\n").unwrap(), ConstValue::Null);
    }

    #[test]
    fn scalar_payloads() {
        let schema = schema();

        let text = decoder(&schema, primitive(PrimitiveType::String));
        assert_eq!(
            text.decode(b"Hello, World\n").unwrap(),
            ConstValue::String("Hello, World\n".to_string())
        );

        let int = decoder(&schema, non_null(primitive(PrimitiveType::Int)));
        assert_eq!(int.decode(b"42\n").unwrap(), ConstValue::Number(42.into()));
        assert!(int.decode(b"4.2").is_err());
        assert!(int.decode(b"3000000000").is_err());

        let float = decoder(&schema, primitive(PrimitiveType::Float));
        assert_eq!(
            float.decode(b"2.5").unwrap(),
            ConstValue::Number(serde_json::Number::from_f64(2.5).unwrap())
        );
        assert!(float.decode(b"NaN").is_err());

        let boolean = decoder(&schema, primitive(PrimitiveType::Boolean));
        assert_eq!(boolean.decode(b"TRUE").unwrap(), ConstValue::Boolean(true));
        assert_eq!(boolean.decode(b"false\n").unwrap(), ConstValue::Boolean(false));
        assert!(boolean.decode(b"yes").is_err());
        assert!(boolean.decode(b"1").is_err());

        let timestamp = decoder(&schema, primitive(PrimitiveType::DateTime));
        assert_eq!(
            timestamp.decode(b"2024-05-06T07:08:09Z").unwrap(),
            ConstValue::String("2024-05-06T07:08:09+00:00".to_string())
        );
        assert!(timestamp.decode(b"yesterday").is_err());
    }

    #[test]
    fn enum_payloads() {
        let schema = schema();
        let color_id = schema.enums.get_id("Color").unwrap();
        let color = decoder(&schema, TypeReference::Named(NamedType::Enum(color_id)));

        assert_eq!(
            color.decode(b"GREEN").unwrap(),
            ConstValue::Enum(Name::new("GREEN"))
        );
        assert_eq!(
            color.decode(b"0\n").unwrap(),
            ConstValue::Enum(Name::new("RED"))
        );
        assert!(color.decode(b"BLUE").is_err());
        assert!(color.decode(b"2").is_err());
    }

    #[test]
    fn object_payloads() {
        let schema = schema();
        let object = TypeReference::Named(NamedType::Object(schema.query));

        let single = decoder(&schema, object.clone());
        let value = single.decode(b"{\"a\":1}").unwrap();
        assert_eq!(
            value.into_json().unwrap(),
            serde_json::json!({"a": 1})
        );
        assert!(single.decode(b"{oops").is_err());

        let list = decoder(&schema, TypeReference::List(Box::new(object)));
        let value = list.decode(b"[{\"a\":1},{\"a\":2}]").unwrap();
        assert_eq!(
            value.into_json().unwrap(),
            serde_json::json!([{"a": 1}, {"a": 2}])
        );
    }

    #[test]
    fn unsupported_output_types() {
        let schema = schema();

        let err = OutputDecoder::compile(
            &schema,
            "Query",
            "tags",
            &TypeReference::List(Box::new(primitive(PrimitiveType::String))),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedOutput {
                object: "Query".to_string(),
                field: "tags".to_string(),
                type_name: "[String]".to_string(),
            }
        );
    }
}
