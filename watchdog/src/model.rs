use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a type-checked lookup on loosely typed vendor JSON
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Present(T),
    Absent,
    WrongType(Value),
}

impl<T> Field<T> {
    fn extract(
        obj: &Map<String, Value>,
        key: &str,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Self {
        match obj.get(key) {
            None | Some(Value::Null) => Field::Absent,
            Some(raw) => match convert(raw) {
                Some(v) => Field::Present(v),
                None => Field::WrongType(raw.clone()),
            },
        }
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Present(v) => write!(f, "{}", v),
            Field::Absent => write!(f, "<absent>"),
            Field::WrongType(raw) => write!(f, "<unexpected {}>", raw),
        }
    }
}

/// A single data point value as reported by the device
#[derive(Debug, Clone, PartialEq)]
pub enum DpValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Other(Value),
}

impl DpValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DpValue::Bool(_) => "bool",
            DpValue::Number(_) => "number",
            DpValue::Text(_) => "string",
            DpValue::Other(_) => "json",
        }
    }
}

impl From<&Value> for DpValue {
    fn from(raw: &Value) -> Self {
        match raw {
            Value::Bool(b) => DpValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(DpValue::Number)
                .unwrap_or_else(|| DpValue::Other(raw.clone())),
            Value::String(s) => DpValue::Text(s.clone()),
            other => DpValue::Other(other.clone()),
        }
    }
}

impl fmt::Display for DpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpValue::Bool(b) => write!(f, "{}", b),
            DpValue::Number(n) => write!(f, "{}", n),
            DpValue::Text(s) => write!(f, "{}", s),
            DpValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Current device state from a single status read
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub online: Field<bool>,
    pub name: Option<String>,
    pub data_points: BTreeMap<String, DpValue>,
}

impl DeviceStatus {
    /// Builds a status from the `result` object of a device info response.
    /// Entries of the `status` array without a string `code` are skipped.
    pub fn from_result(result: &Value) -> Self {
        let empty = Map::new();
        let obj = result.as_object().unwrap_or(&empty);

        let data_points = obj
            .get("status")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let code = item.get("code")?.as_str()?;
                        let value = item.get("value").unwrap_or(&Value::Null);
                        Some((code.to_string(), DpValue::from(value)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            online: Field::extract(obj, "online", Value::as_bool),
            name: obj.get("name").and_then(Value::as_str).map(str::to_string),
            data_points,
        }
    }
}

/// One historical data point report
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub code: Option<String>,
    pub value: Field<String>,
    /// Epoch milliseconds
    pub event_time: Field<i64>,
    pub extra: Map<String, Value>,
}

impl LogEntry {
    pub fn from_value(raw: &Value) -> Self {
        let empty = Map::new();
        let obj = raw.as_object().unwrap_or(&empty);

        let extra = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "code" | "value" | "event_time"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            code: obj.get("code").and_then(Value::as_str).map(str::to_string),
            value: Field::extract(obj, "value", |v| v.as_str().map(str::to_string)),
            event_time: Field::extract(obj, "event_time", |v| {
                v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
            }),
            extra,
        }
    }
}

/// Most recent log entries, in the order the cloud returned them
pub type RecentHistory = Vec<LogEntry>;

/// Vendor response envelope shared by every endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub result: Value,
}
