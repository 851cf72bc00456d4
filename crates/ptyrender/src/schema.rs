//! JSON Schema of the emitted event stream.
//!
//! schemars produces draft 2020-12 schemas. Consumers of the event stream
//! commonly validate with draft-07 tooling, so the schema is normalized:
//! `$defs` becomes `definitions` (with references rewritten) and
//! `anyOf: [X, {"type": "null"}]` collapses to `X`.

use serde_json::{Map, Value};

use ptyrender_core::SessionEvent;

const DEFS_PREFIX: &str = "#/$defs/";
const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Draft-07 compatible schema of one JSON line written to stdout.
pub fn event_schema() -> Value {
    let schema = schemars::schema_for!(SessionEvent);
    to_draft07(schema.to_value())
}

/// Normalize a draft 2020-12 schema for draft-07 consumers.
pub fn to_draft07(mut schema: Value) -> Value {
    if let Some(root) = schema.as_object_mut() {
        if let Some(defs) = root.remove("$defs") {
            root.insert("definitions".to_string(), defs);
        }
    }
    normalize(&mut schema);
    schema
}

fn normalize(value: &mut Value) {
    match value {
        Value::Object(object) => {
            // Collapse first so a `$ref` lifted out of `anyOf` is rewritten too
            collapse_nullable(object);
            if let Some(reference) = object.get_mut("$ref") {
                if let Some(target) = reference.as_str().and_then(|r| r.strip_prefix(DEFS_PREFIX)) {
                    *reference = Value::String(format!("{DEFINITIONS_PREFIX}{target}"));
                }
            }
            object.values_mut().for_each(normalize);
        }
        Value::Array(items) => items.iter_mut().for_each(normalize),
        _ => {}
    }
}

fn is_bare_null(schema: &Value) -> bool {
    schema.as_object().map_or(false, |object| {
        object.len() == 1 && object.get("type").and_then(Value::as_str) == Some("null")
    })
}

/// Replace `anyOf: [X, null]` with the members of `X`.
fn collapse_nullable(object: &mut Map<String, Value>) {
    let inner = match object.get("anyOf").and_then(Value::as_array) {
        Some(variants) if variants.len() == 2 => {
            match (is_bare_null(&variants[0]), is_bare_null(&variants[1])) {
                (false, true) => variants[0].clone(),
                (true, false) => variants[1].clone(),
                _ => return,
            }
        }
        _ => return,
    };

    if let Value::Object(members) = inner {
        object.remove("anyOf");
        object.extend(members);
    }
}
