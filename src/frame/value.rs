//! Typed field values and their type tags

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value as JsonValue;
use std::fmt;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Type tag of a field value
///
/// The string form (`STR`, `S32`, ...) is the abstract column type used by
/// the dialect type maps; the numeric code is the tag persisted alongside
/// context values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum FieldType {
    #[strum(serialize = "STR")]
    String,
    #[strum(serialize = "BOL")]
    Boolean,
    #[strum(serialize = "S8")]
    S8,
    #[strum(serialize = "U8")]
    U8,
    #[strum(serialize = "S16")]
    S16,
    #[strum(serialize = "U16")]
    U16,
    #[strum(serialize = "S32")]
    S32,
    #[strum(serialize = "U32")]
    U32,
    #[strum(serialize = "S64")]
    S64,
    #[strum(serialize = "U64")]
    U64,
    #[strum(serialize = "FLT")]
    Float,
    #[strum(serialize = "DBL")]
    Double,
    #[strum(serialize = "DAT")]
    Date,
    #[strum(serialize = "NUL")]
    Null,
}

impl FieldType {
    /// Numeric tag stored in the persisted context table
    pub fn code(&self) -> i32 {
        match self {
            FieldType::String => 3,
            FieldType::S8 => 4,
            FieldType::U8 => 5,
            FieldType::S16 => 6,
            FieldType::U16 => 7,
            FieldType::S32 => 8,
            FieldType::U32 => 9,
            FieldType::S64 => 10,
            FieldType::U64 => 11,
            FieldType::Float => 12,
            FieldType::Double => 13,
            FieldType::Boolean => 14,
            FieldType::Date => 15,
            FieldType::Null => 29,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let field_type = match code {
            3 => FieldType::String,
            4 => FieldType::S8,
            5 => FieldType::U8,
            6 => FieldType::S16,
            7 => FieldType::U16,
            8 => FieldType::S32,
            9 => FieldType::U32,
            10 => FieldType::S64,
            11 => FieldType::U64,
            12 => FieldType::Float,
            13 => FieldType::Double,
            14 => FieldType::Boolean,
            15 => FieldType::Date,
            29 => FieldType::Null,
            _ => return None,
        };
        Some(field_type)
    }
}

/// A single typed value held by a frame field or a symbol
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    Float(f32),
    Double(f64),
    Date(DateTime<Utc>),
    Null,
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Str(_) => FieldType::String,
            FieldValue::Bool(_) => FieldType::Boolean,
            FieldValue::S8(_) => FieldType::S8,
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::S16(_) => FieldType::S16,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::S32(_) => FieldType::S32,
            FieldValue::U32(_) => FieldType::U32,
            FieldValue::S64(_) => FieldType::S64,
            FieldValue::U64(_) => FieldType::U64,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::Null => FieldType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a boolean flag
    ///
    /// Strings accept `true/false`, `yes/no`, `on/off` and `1/0` in any case;
    /// integers are true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            other => other.as_i64().map(|n| n != 0),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::S8(n) => Some(i64::from(*n)),
            FieldValue::U8(n) => Some(i64::from(*n)),
            FieldValue::S16(n) => Some(i64::from(*n)),
            FieldValue::U16(n) => Some(i64::from(*n)),
            FieldValue::S32(n) => Some(i64::from(*n)),
            FieldValue::U32(n) => Some(i64::from(*n)),
            FieldValue::S64(n) => Some(*n),
            FieldValue::U64(n) => i64::try_from(*n).ok(),
            FieldValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(n) => Some(f64::from(*n)),
            FieldValue::Double(n) => Some(*n),
            FieldValue::Str(s) => s.trim().parse().ok(),
            FieldValue::U64(n) => Some(*n as f64),
            other => other.as_i64().map(|n| n as f64),
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Str(s) => parse_date(s),
            FieldValue::S64(millis) => Utc.timestamp_millis_opt(*millis).single(),
            _ => None,
        }
    }

    /// Text form used for template substitution and persistence
    ///
    /// Null renders as an empty string and dates as RFC 3339 UTC.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Str(s) => s.clone(),
            FieldValue::Null => String::new(),
            FieldValue::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            other => other.to_string(),
        }
    }

    /// Parse the text form of a value back into the given type
    ///
    /// Returns `None` when the text is not a valid representation of `field_type`.
    pub fn from_text(field_type: FieldType, text: &str) -> Option<Self> {
        let value = match field_type {
            FieldType::String => FieldValue::Str(text.to_string()),
            FieldType::Boolean => FieldValue::Bool(FieldValue::Str(text.to_string()).as_bool()?),
            FieldType::S8 => FieldValue::S8(text.trim().parse().ok()?),
            FieldType::U8 => FieldValue::U8(text.trim().parse().ok()?),
            FieldType::S16 => FieldValue::S16(text.trim().parse().ok()?),
            FieldType::U16 => FieldValue::U16(text.trim().parse().ok()?),
            FieldType::S32 => FieldValue::S32(text.trim().parse().ok()?),
            FieldType::U32 => FieldValue::U32(text.trim().parse().ok()?),
            FieldType::S64 => FieldValue::S64(text.trim().parse().ok()?),
            FieldType::U64 => FieldValue::U64(text.trim().parse().ok()?),
            FieldType::Float => FieldValue::Float(text.trim().parse().ok()?),
            FieldType::Double => FieldValue::Double(text.trim().parse().ok()?),
            FieldType::Date => FieldValue::Date(parse_date(text)?),
            FieldType::Null => FieldValue::Null,
        };
        Some(value)
    }

    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(b) => FieldValue::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::S64(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::U64(u)
                } else {
                    n.as_f64().map(FieldValue::Double).unwrap_or(FieldValue::Null)
                }
            }
            JsonValue::String(s) => FieldValue::Str(s.clone()),
            other => FieldValue::Str(other.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Str(s) => JsonValue::String(s.clone()),
            FieldValue::Bool(b) => JsonValue::Bool(*b),
            FieldValue::S8(n) => JsonValue::from(*n),
            FieldValue::U8(n) => JsonValue::from(*n),
            FieldValue::S16(n) => JsonValue::from(*n),
            FieldValue::U16(n) => JsonValue::from(*n),
            FieldValue::S32(n) => JsonValue::from(*n),
            FieldValue::U32(n) => JsonValue::from(*n),
            FieldValue::S64(n) => JsonValue::from(*n),
            FieldValue::U64(n) => JsonValue::from(*n),
            FieldValue::Float(n) => serde_json::Number::from_f64(f64::from(*n))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            FieldValue::Double(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            FieldValue::Date(_) => JsonValue::String(self.to_text()),
            FieldValue::Null => JsonValue::Null,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::S8(n) => write!(f, "{n}"),
            FieldValue::U8(n) => write!(f, "{n}"),
            FieldValue::S16(n) => write!(f, "{n}"),
            FieldValue::U16(n) => write!(f, "{n}"),
            FieldValue::S32(n) => write!(f, "{n}"),
            FieldValue::U32(n) => write!(f, "{n}"),
            FieldValue::S64(n) => write!(f, "{n}"),
            FieldValue::U64(n) => write!(f, "{n}"),
            FieldValue::Float(n) => write!(f, "{n}"),
            FieldValue::Double(n) => write!(f, "{n}"),
            FieldValue::Date(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::S32(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::S64(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Parse the date and time layouts the engine exchanges with readers and
/// databases: RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DD` and
/// `HH:MM:SS` (on the epoch date). Zone-less values are taken as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if let Ok(time) = NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
        return NaiveDate::from_ymd_opt(1970, 1, 1).map(|epoch| epoch.and_time(time).and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_type_tags_parse_case_insensitively() {
        assert_eq!(FieldType::from_str("s32").unwrap(), FieldType::S32);
        assert_eq!(FieldType::from_str("Str").unwrap(), FieldType::String);
        assert_eq!(FieldType::Double.to_string(), "DBL");
        assert!(FieldType::from_str("XYZ").is_err());
    }

    #[test]
    fn test_type_codes_are_unique_and_reversible() {
        let mut seen = std::collections::HashSet::new();
        for field_type in FieldType::iter() {
            assert!(seen.insert(field_type.code()), "duplicate code for {field_type}");
            assert_eq!(FieldType::from_code(field_type.code()), Some(field_type));
        }
        assert_eq!(FieldType::from_code(0), None);
    }

    #[test]
    fn test_text_form_survives_persistence() {
        let date = parse_date("2024-01-01T10:30:00Z").unwrap();
        let values = [
            FieldValue::Str("nightly".into()),
            FieldValue::Bool(true),
            FieldValue::S32(-42),
            FieldValue::U64(u64::MAX),
            FieldValue::Double(2.5),
            FieldValue::Date(date),
        ];
        for value in values {
            let text = value.to_text();
            assert_eq!(FieldValue::from_text(value.field_type(), &text), Some(value));
        }
    }

    #[test]
    fn test_unparseable_text_is_rejected() {
        assert_eq!(FieldValue::from_text(FieldType::S16, "forty"), None);
        assert_eq!(FieldValue::from_text(FieldType::Date, "yesterday"), None);
    }

    #[test]
    fn test_date_layouts() {
        assert!(parse_date("2024-01-01").is_some());
        assert!(parse_date("2024-01-01 08:15:00").is_some());
        assert!(parse_date("2024-01-01 08:15:00.250").is_some());
        assert_eq!(parse_date("08:15:00").unwrap().to_rfc3339(), "1970-01-01T08:15:00+00:00");
    }

    #[test]
    fn test_flags() {
        assert_eq!(FieldValue::from("YES").as_bool(), Some(true));
        assert_eq!(FieldValue::S32(0).as_bool(), Some(false));
        assert_eq!(FieldValue::from("maybe").as_bool(), None);
    }
}
