//! Turns the backend's loosely-typed command result into [`SymbolMatch`] values.

use migrator_protocol::{Location, SymbolKind, SymbolMatch};
use serde_json::{Map, Value};

/// Outcome of decoding one command result.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Decoded(Vec<SymbolMatch>),
    Unparseable(String),
}

impl Normalized {
    pub fn into_matches(self) -> Vec<SymbolMatch> {
        match self {
            Normalized::Decoded(matches) => matches,
            Normalized::Unparseable(reason) => {
                log::warn!("Failed to decode symbol results: {reason}");
                Vec::new()
            }
        }
    }
}

/// Strict decode first, then a per-item salvage pass over generic maps.
pub fn decode(raw: &Value) -> Normalized {
    if raw.is_null() {
        return Normalized::Decoded(Vec::new());
    }
    let strict_err = match serde_json::from_value::<Vec<SymbolMatch>>(raw.clone()) {
        Ok(matches) => return Normalized::Decoded(matches),
        Err(err) => err,
    };
    let Some(items) = raw.as_array() else {
        return Normalized::Unparseable(format!(
            "expected a list of symbols, got {}: {strict_err}",
            kind_of(raw)
        ));
    };

    let total = items.len();
    let matches: Vec<SymbolMatch> = items
        .iter()
        .filter_map(|item| match item.as_object() {
            Some(map) => salvage(map),
            None => {
                log::debug!("Dropping non-object symbol entry: {item}");
                None
            }
        })
        .collect();
    if matches.is_empty() && total > 0 {
        return Normalized::Unparseable(format!(
            "none of {total} symbol entries could be decoded: {strict_err}"
        ));
    }
    if matches.len() < total {
        log::debug!(
            "Recovered {} of {total} symbol entries (strict decode failed: {strict_err})",
            matches.len()
        );
    }
    Normalized::Decoded(matches)
}

pub fn normalize(raw: &Value) -> Vec<SymbolMatch> {
    decode(raw).into_matches()
}

fn salvage(map: &Map<String, Value>) -> Option<SymbolMatch> {
    let location = match map.get("location") {
        Some(value) => match serde_json::from_value::<Location>(value.clone()) {
            Ok(location) => location,
            Err(err) => {
                log::debug!("Dropping symbol with undecodable location: {err}");
                return None;
            }
        },
        None => {
            log::debug!("Dropping symbol without location");
            return None;
        }
    };

    let name = match map.get("name") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    // Unrecognized numbers are dropped, not defaulted.
    let kind = map
        .get("kind")
        .and_then(Value::as_u64)
        .and_then(SymbolKind::from_code);
    let container_name = map
        .get("containerName")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(SymbolMatch {
        name,
        kind,
        location,
        container_name,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn location(line: u32) -> Value {
        json!({
            "uri": "file:///app/src/main/java/App.java",
            "range": {"start": {"line": line, "character": 0}, "end": {"line": line, "character": 10}}
        })
    }

    #[test]
    fn strict_payload_decodes_directly() {
        let raw = json!([{"name": "Foo", "kind": 5, "location": location(1)}]);
        let Normalized::Decoded(matches) = decode(&raw) else {
            panic!("expected decoded");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Foo");
        assert_eq!(matches[0].kind, Some(SymbolKind::Class));
        assert_eq!(matches[0].location.range.start.line, 1);
    }

    #[test]
    fn salvage_drops_unknown_kind_and_bad_items() {
        let raw = json!([
            {"name": 42, "kind": 99, "location": location(2)},
            {"name": "NoLocation", "kind": 5},
            "garbage",
            {"name": "Bar", "kind": "not a number", "location": location(3), "containerName": "pkg"}
        ]);
        let matches = normalize(&raw);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name, "42");
        assert_eq!(matches[0].kind, None);
        assert_eq!(matches[1].name, "Bar");
        assert_eq!(matches[1].kind, None);
        assert_eq!(matches[1].container_name.as_deref(), Some("pkg"));
    }

    #[test]
    fn list_with_nothing_salvageable_is_unparseable() {
        let raw = json!([{"name": "NoLocation", "kind": 5}, "garbage"]);
        let Normalized::Unparseable(reason) = decode(&raw) else {
            panic!("expected unparseable");
        };
        assert!(reason.contains("none of 2"), "{reason}");
        assert!(normalize(&raw).is_empty());
        assert_eq!(decode(&json!([])), Normalized::Decoded(Vec::new()));
    }

    #[test]
    fn null_is_an_empty_result() {
        assert_eq!(decode(&Value::Null), Normalized::Decoded(Vec::new()));
    }

    #[test]
    fn non_list_payload_is_unparseable_and_normalizes_to_empty() {
        let raw = json!({"unexpected": true});
        assert!(matches!(decode(&raw), Normalized::Unparseable(_)));
        assert!(normalize(&raw).is_empty());
    }
}
