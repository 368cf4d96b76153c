//! Template values and variable bindings
//!
//! Values are what template variables, component arguments, provided payloads and
//! per-instance asset data are made of. Maps are ordered by key so that a value
//! serializes the same way every time, which keeps content hashes stable.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// A set of named values, e.g. one environment frame or a component's template data
pub type Bindings = BTreeMap<String, Value>;

/// A value visible to templates
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(Bindings),
}

impl Value {
    /// Truthiness for `{% if %}`
    ///
    /// Empty strings, empty collections, `false`, zero and null are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Follow a dotted path into nested maps (and list indices)
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        match self {
            Value::Map(m) => m.get(first.as_ref()).and_then(|v| v.get_path(rest)),
            Value::List(items) => first
                .as_ref()
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .and_then(|v| v.get_path(rest)),
            _ => None,
        }
    }

    /// Render this value as template output
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::List(items) => items.iter().map(Value::render).collect::<Vec<_>>().join(", "),
            Value::Map(_) => self.to_json(),
        }
    }

    /// Canonical JSON form (map keys sorted)
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Bindings> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Integral numbers serialize as integers, matching how they render
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() < 1e15
}

fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Bindings> for Value {
    fn from(m: Bindings) -> Self {
        Value::Map(m)
    }
}

/// Build a `Bindings` map from `(name, value)` pairs
pub fn bindings<K, V, I>(pairs: I) -> Bindings
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
