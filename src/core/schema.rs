use std::str::FromStr;

use crate::core::value::Value;

/// A single declared parameter of a task function.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    /// `Some(Value::None)` still counts as a default.
    pub default: Option<Value>,
    /// String values given to this parameter are literals, never registry keys.
    pub literal: bool,
}

impl Parameter {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// The declared contract of a task function: its parameters and output arity.
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
    pub params: Vec<Parameter>,
    /// Number of values the function returns, when fixed.
    pub returns: Option<usize>,
    /// Parameters form mutually exclusive groups; input verification is skipped.
    pub context_dependent: bool,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: impl Into<String>) -> Self {
        self.push(name, None, false)
    }

    pub fn optional(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.push(name, Some(default.into()), false)
    }

    pub fn required_literal(self, name: impl Into<String>) -> Self {
        self.push(name, None, true)
    }

    pub fn optional_literal(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.push(name, Some(default.into()), true)
    }

    pub fn returns(mut self, count: usize) -> Self {
        self.returns = Some(count);
        self
    }

    pub fn context_dependent(mut self) -> Self {
        self.context_dependent = true;
        self
    }

    fn push(mut self, name: impl Into<String>, default: Option<Value>, literal: bool) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            default,
            literal,
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }
}

impl FromStr for ParameterSchema {
    type Err = String;

    /// Parses shorthand syntax: `"arrays, low_bound=-5.0, name:str=null -> 1"`.
    ///
    /// Each entry is `name[:str][=json-default]`; `..` marks the schema as
    /// context dependent; the optional `-> N` fixes the output arity.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (params_part, returns) = match s.split_once("->") {
            Some((params, ret)) => {
                let count = ret
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid output count '{}'", ret.trim()))?;
                (params, Some(count))
            }
            None => (s, None),
        };

        let mut schema = ParameterSchema::new();
        schema.returns = returns;

        for entry in split_top_level(params_part) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            if entry == ".." {
                schema.context_dependent = true;
                continue;
            }

            let (head, default) = match entry.split_once('=') {
                Some((head, json)) => {
                    let parsed: serde_json::Value = serde_json::from_str(json.trim())
                        .map_err(|e| format!("Invalid default for '{}': {}", head.trim(), e))?;
                    (head, Some(Value::from_json(&parsed)?))
                }
                None => (entry, None),
            };

            let (name, literal) = match head.split_once(':') {
                Some((name, kind)) if kind.trim() == "str" => (name.trim(), true),
                Some((_, kind)) => return Err(format!("Unknown parameter kind '{}'", kind.trim())),
                None => (head.trim(), false),
            };
            if name.is_empty() {
                return Err(format!("Missing parameter name in '{entry}'"));
            }
            schema = schema.push(name, default, literal);
        }

        Ok(schema)
    }
}

/// Splits on commas that are not nested inside brackets.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Macro for rapid schema creation: `schema!("arrays, cut_off=null -> 1")`.
#[macro_export]
macro_rules! schema {
    ($s:expr) => {
        $s.parse::<$crate::ParameterSchema>().expect("Invalid parameter schema shorthand")
    };
}
