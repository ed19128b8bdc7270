use crate::error::EvalError;
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    String(String),
    Number(f64),
    List(Vec<Value>),
    /// A JSON object that did not collapse into a scalar — e.g. the raw
    /// `responseObject` passed to `link()`.
    Object(Json),
    Null,
}

impl Value {
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(_) => Value::Object(json.clone()),
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::TypeError {
                expected: "bool".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvalError::TypeError {
                expected: "string".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Stringify for template interpolation / `+` concatenation.
    pub fn stringify(&self) -> Result<String, EvalError> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(format_number(*n)),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok(String::new()),
            other => Err(EvalError::TypeError {
                expected: "scalar".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Null => "null",
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_stays_object() {
        let json = serde_json::json!({"kind": "Deployment"});
        assert!(matches!(Value::from_json(&json), Value::Object(_)));
    }

    #[test]
    fn json_array_of_strings_becomes_list() {
        let json = serde_json::json!(["a", "b"]);
        let value = Value::from_json(&json);
        assert_eq!(
            value,
            Value::List(vec![Value::String("a".into()), Value::String("b".into())])
        );
    }

    #[test]
    fn whole_number_stringifies_without_decimal() {
        assert_eq!(Value::Number(201.0).stringify().unwrap(), "201");
    }
}
