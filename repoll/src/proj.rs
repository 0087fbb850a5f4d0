use serde_json::{Map, Value};

// Dot-path lookup and projection over JSON bodies:
// - dot paths: a.b.c
// - wildcard for arrays: items[*].state
// - @all keeps the whole body

/// Continuation predicate for JSON status bodies: keep polling while the
/// value at `path` equals one of `pending`.
#[derive(Clone, Debug)]
pub struct StatusMatcher {
    path: String,
    pending: Vec<String>,
}

impl StatusMatcher {
    pub fn new(path: impl Into<String>, pending: Vec<String>) -> Self {
        Self { path: path.into(), pending }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// A missing field counts as terminal, so a body without the status field ends the poll.
    /// For `[*]` paths the body is pending while any selected item matches; an
    /// array reached through a plain path is compared as a whole, by its JSON text.
    pub fn is_pending(&self, body: &Value) -> bool {
        match select_path(body, &self.path) {
            Value::Null => false,
            Value::Array(items) if self.path.contains("[*]") => items.iter().any(|v| self.matches(v)),
            v => self.matches(&v),
        }
    }

    fn matches(&self, v: &Value) -> bool {
        let text = match v {
            Value::String(s) => s.clone(),
            Value::Null => return false,
            other => other.to_string(),
        };
        self.pending.iter().any(|p| *p == text)
    }
}

pub fn project(input: &Value, fields: &[String]) -> Value {
    if fields.is_empty() || fields.iter().any(|f| f == "@all") {
        return input.clone();
    }
    let mut out = Map::new();
    for f in fields {
        let val = select_path(input, f);
        if !val.is_null() {
            merge_nested(&mut out, f, val);
        }
    }
    if out.is_empty() {
        // Nothing matched; the raw body is more useful than {}.
        return input.clone();
    }
    Value::Object(out)
}

pub fn select_path(input: &Value, path: &str) -> Value {
    let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    select_inner(input, &parts)
}

fn select_inner(input: &Value, parts: &[&str]) -> Value {
    let Some((head, tail)) = parts.split_first() else {
        return input.clone();
    };
    match input {
        Value::Object(map) => {
            if let Some(base) = head.strip_suffix("[*]") {
                return match map.get(base) {
                    Some(Value::Array(arr)) => {
                        Value::Array(arr.iter().map(|v| select_inner(v, tail)).collect())
                    }
                    _ => Value::Null,
                };
            }
            map.get(*head).map(|v| select_inner(v, tail)).unwrap_or(Value::Null)
        }
        Value::Array(arr) if *head == "[*]" => {
            Value::Array(arr.iter().map(|v| select_inner(v, tail)).collect())
        }
        Value::Array(arr) => match head.parse::<usize>() {
            Ok(idx) => arr.get(idx).map(|v| select_inner(v, tail)).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        _ => Value::Null,
    }
}

fn merge_nested(dst: &mut Map<String, Value>, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    let Some((last, init)) = parts.split_last() else {
        return;
    };
    let mut cur = dst;
    for p in init {
        let entry = cur.entry(p.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        cur = match entry {
            Value::Object(m) => m,
            _ => return,
        };
    }
    cur.insert(last.to_string(), value);
}
