// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Placeholder substitution for message bodies.
//!
//! `{name}` is replaced with the request field `name`; the first `{body}` is
//! replaced with the whole request rendered as indented JSON. Placeholders
//! without a matching field are left as written. Substituted text is not
//! scanned again.

use serde_json::{Map, Value};

const BODY_PLACEHOLDER: &str = "{body}";

/// Render `template` against the fields of a send request.
pub fn render(template: &str, params: &Map<String, Value>) -> String {
    // The first literal `{body}` is found before named placeholders are
    // parsed, so it is replaced even inside an enclosing pair of braces.
    match template.find(BODY_PLACEHOLDER) {
        Some(at) => {
            let mut out = render_named(&template[..at], params);
            out.push_str(&serde_json::to_string_pretty(params).unwrap_or_default());
            out.push_str(&render_named(&template[at + BODY_PLACEHOLDER.len()..], params));
            out
        }
        None => render_named(template, params),
    }
}

fn render_named(template: &str, params: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) if close > 0 => {
                let name = &after[..close];
                match lookup(name, params) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn lookup(name: &str, params: &Map<String, Value>) -> Option<String> {
    // Later `{body}` occurrences stay literal.
    if name == "body" {
        return None;
    }

    params.get(name).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_named_placeholders() {
        let p = params(json!({ "name": "Ada", "count": 3, "vip": true, "note": null }));
        assert_eq!(
            render("Hello {name}, {count} items, vip={vip}, note={note}", &p),
            "Hello Ada, 3 items, vip=true, note=null"
        );
    }

    #[test]
    fn test_object_values_as_compact_json() {
        let p = params(json!({ "tags": ["a", "b"], "meta": { "k": 1 } }));
        assert_eq!(render("{tags} {meta}", &p), r#"["a","b"] {"k":1}"#);
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let p = params(json!({ "name": "Ada" }));
        assert_eq!(render("Dear {title} {name}", &p), "Dear {title} Ada");
    }

    #[test]
    fn test_body_placeholder() {
        let p = params(json!({ "subject": "Hi" }));
        assert_eq!(
            render("Data: {body}", &p),
            "Data: {\n  \"subject\": \"Hi\"\n}"
        );
    }

    #[test]
    fn test_only_first_body_replaced() {
        let p = params(json!({}));
        assert_eq!(render("{body} and {body}", &p), "{} and {body}");
    }

    #[test]
    fn test_body_inside_enclosing_braces() {
        let p = params(json!({ "a": 1 }));
        assert_eq!(
            render("{\"data\": {body}}", &p),
            "{\"data\": {\n  \"a\": 1\n}}"
        );
        assert_eq!(render("{x {body}", &p), "{x {\n  \"a\": 1\n}");
    }

    #[test]
    fn test_repeated_placeholder() {
        let p = params(json!({ "x": "1" }));
        assert_eq!(render("{x}{x}-{x}", &p), "11-1");
    }

    #[test]
    fn test_substitution_not_rescanned() {
        let p = params(json!({ "a": "{b}", "b": "nope" }));
        assert_eq!(render("{a}", &p), "{b}");
    }

    #[test]
    fn test_stray_braces() {
        let p = params(json!({ "x": "1" }));
        assert_eq!(render("{} {x}", &p), "{} 1");
        assert_eq!(render("{ {x}", &p), "{ {x}");
        assert_eq!(render("open { only", &p), "open { only");
    }
}
