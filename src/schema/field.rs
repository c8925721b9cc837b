use chrono::{DateTime, NaiveDate, NaiveTime};
use serde_json::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Structural type of a field, with its bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Bounds count characters, not bytes
    String { min_len: Option<usize>, max_len: Option<usize> },
    Integer { min: Option<i64>, max: Option<i64> },
    /// `YYYY-MM-DD` or an RFC 3339 timestamp, normalized to `YYYY-MM-DD`
    Date,
    /// `HH:MM` or `HH:MM:SS`, normalized to `HH:MM:SS`
    Time,
}

/// How raw input is converted before type checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    None,
    /// Numeric strings (path segments, query values) become numbers
    StringToNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    pub coercion: Coercion,
}

impl Field {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            required: true,
            nullable: false,
            coercion: Coercion::None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String { min_len: None, max_len: None })
    }

    pub fn integer() -> Self {
        Self::of(FieldKind::Integer { min: None, max: None })
    }

    pub fn date() -> Self {
        Self::of(FieldKind::Date)
    }

    pub fn time() -> Self {
        Self::of(FieldKind::Time)
    }

    pub fn min_len(mut self, len: usize) -> Self {
        if let FieldKind::String { min_len, .. } = &mut self.kind {
            *min_len = Some(len);
        }
        self
    }

    pub fn max_len(mut self, len: usize) -> Self {
        if let FieldKind::String { max_len, .. } = &mut self.kind {
            *max_len = Some(len);
        }
        self
    }

    pub fn min(mut self, value: i64) -> Self {
        if let FieldKind::Integer { min, .. } = &mut self.kind {
            *min = Some(value);
        }
        self
    }

    pub fn max(mut self, value: i64) -> Self {
        if let FieldKind::Integer { max, .. } = &mut self.kind {
            *max = Some(value);
        }
        self
    }

    pub fn range(self, min: i64, max: i64) -> Self {
        self.min(min).max(max)
    }

    pub fn positive(self) -> Self {
        self.min(1)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn coerce(mut self) -> Self {
        self.coercion = Coercion::StringToNumber;
        self
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            FieldKind::String { .. } => "string",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Date => "date string",
            FieldKind::Time => "time string",
        }
    }

    /// Check one present value, returning the coerced/normalized value or a message.
    pub(crate) fn check(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(format!("Expected {}, received null", self.type_name()))
            };
        }

        match &self.kind {
            FieldKind::String { min_len, max_len } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| self.mismatch(value))?;
                let len = s.chars().count();
                if let Some(min) = min_len {
                    if len < *min {
                        return Err(format!("String must contain at least {} character(s)", min));
                    }
                }
                if let Some(max) = max_len {
                    if len > *max {
                        return Err(format!("String must contain at most {} character(s)", max));
                    }
                }
                Ok(Value::String(s.to_string()))
            }
            FieldKind::Integer { min, max } => {
                let n = self.integer_value(value)?;
                if let Some(min) = min {
                    if n < *min {
                        return Err(format!("Number must be greater than or equal to {}", min));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(format!("Number must be less than or equal to {}", max));
                    }
                }
                Ok(Value::from(n))
            }
            FieldKind::Date => {
                let s = value.as_str().ok_or_else(|| self.mismatch(value))?;
                parse_date(s)
                    .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                    .ok_or_else(|| "Invalid date format".to_string())
            }
            FieldKind::Time => {
                let s = value.as_str().ok_or_else(|| self.mismatch(value))?;
                parse_time(s)
                    .map(|t| Value::String(t.format(TIME_FORMAT).to_string()))
                    .ok_or_else(|| "Invalid time format".to_string())
            }
        }
    }

    fn integer_value(&self, value: &Value) -> Result<i64, String> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(i);
                }
                // 3.0 is an integer; 3.5 is not
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(f as i64)
                    }
                    _ => Err("Expected integer, received float".to_string()),
                }
            }
            Value::String(s) if self.coercion == Coercion::StringToNumber => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("Expected integer, received '{}'", s)),
            other => Err(self.mismatch(other)),
        }
    }

    fn mismatch(&self, value: &Value) -> String {
        format!("Expected {}, received {}", self.type_name(), json_type(value))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .ok()
        .or_else(|| NaiveTime::parse_from_str(s, "%H:%M").ok())
}
