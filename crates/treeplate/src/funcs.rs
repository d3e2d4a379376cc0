// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Helper functions callable from templates.
//!
//! [`Helpers`] is the function table a template set is compiled with. It
//! starts with the builtins below; [`Helpers::register`] adds or overrides
//! entries.
//!
//! | Function | Result |
//! |----------|--------|
//! | `and a b ...` | first falsy argument, or the last one |
//! | `or a b ...` | first truthy argument, or the last one |
//! | `not a` | negated truthiness |
//! | `len a` | length of a string, array or object |
//! | `index a k ...` | element of an array (by number) or object (by string) |
//! | `eq a b ...` | whether `a` equals any of the following arguments |
//! | `ne a b` | whether `a` differs from `b` |
//! | `lt`, `le`, `gt`, `ge` | ordering of two numbers or two strings |
//! | `print a ...` | printed arguments concatenated |
//! | `urlquery a ...` | printed arguments, query-escaped |
//! | `json a` | JSON encoding of `a` |

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a helper: arguments in, value or error message out.
pub type HelperFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// A table of helper functions.
#[derive(Clone)]
pub struct Helpers {
    funcs: HashMap<String, Arc<HelperFn>>,
}

impl fmt::Debug for Helpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.funcs.keys().collect();
        names.sort();
        f.debug_struct("Helpers").field("funcs", &names).finish()
    }
}

impl Default for Helpers {
    fn default() -> Self {
        Self::new()
    }
}

impl Helpers {
    /// Creates a table holding the builtin functions.
    pub fn new() -> Self {
        let mut helpers = Self::empty();
        helpers.register("and", |args| {
            Ok(args
                .iter()
                .find(|v| !truthy(v))
                .or(args.last())
                .cloned()
                .unwrap_or(Value::Null))
        });
        helpers.register("or", |args| {
            Ok(args
                .iter()
                .find(|v| truthy(v))
                .or(args.last())
                .cloned()
                .unwrap_or(Value::Null))
        });
        helpers.register("not", |args| {
            let [value] = args else {
                return Err(arity("not", 1, args.len()));
            };
            Ok(Value::Bool(!truthy(value)))
        });
        helpers.register("len", |args| {
            let [value] = args else {
                return Err(arity("len", 1, args.len()));
            };
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => return Err(format!("len of {}", type_name(other))),
            };
            Ok(Value::from(len))
        });
        helpers.register("index", |args| {
            let Some((first, keys)) = args.split_first() else {
                return Err(arity("index", 1, 0));
            };
            let mut current = first.clone();
            for key in keys {
                current = match (&current, key) {
                    (Value::Array(items), Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| items.get(i as usize))
                        .cloned()
                        .ok_or_else(|| format!("index {} out of range", n))?,
                    (Value::Object(map), Value::String(k)) => {
                        map.get(k).cloned().unwrap_or(Value::Null)
                    }
                    (Value::Null, _) => Value::Null,
                    (container, key) => {
                        return Err(format!(
                            "can't index {} with {}",
                            type_name(container),
                            type_name(key)
                        ))
                    }
                };
            }
            Ok(current)
        });
        helpers.register("eq", |args| {
            let Some((first, rest)) = args.split_first() else {
                return Err(arity("eq", 2, 0));
            };
            if rest.is_empty() {
                return Err(arity("eq", 2, 1));
            }
            Ok(Value::Bool(rest.iter().any(|other| same(first, other))))
        });
        helpers.register("ne", |args| {
            let [a, b] = args else {
                return Err(arity("ne", 2, args.len()));
            };
            Ok(Value::Bool(!same(a, b)))
        });
        helpers.register("lt", |args| compare("lt", args, |o| o == Ordering::Less));
        helpers.register("le", |args| compare("le", args, |o| o != Ordering::Greater));
        helpers.register("gt", |args| compare("gt", args, |o| o == Ordering::Greater));
        helpers.register("ge", |args| compare("ge", args, |o| o != Ordering::Less));
        helpers.register("print", |args| Ok(Value::String(sprint(args))));
        helpers.register("urlquery", |args| {
            let printed = sprint(args);
            Ok(Value::String(
                form_urlencoded::byte_serialize(printed.as_bytes()).collect(),
            ))
        });
        helpers.register("json", |args| {
            let [value] = args else {
                return Err(arity("json", 1, args.len()));
            };
            serde_json::to_string(value)
                .map(Value::String)
                .map_err(|e| e.to_string())
        });
        helpers
    }

    /// Creates a table with no functions at all, not even builtins.
    pub fn empty() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// Adds or replaces a function.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(func));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(name, func);
        self
    }

    /// Looks up a function.
    pub fn get(&self, name: &str) -> Option<&Arc<HelperFn>> {
        self.funcs.get(name)
    }

    /// Whether a function is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Number of functions in the table.
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

/// Template truthiness: null, false, 0, "", [] and {} are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form of a value as emitted into output (before escaping).
pub fn printable(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn arity(name: &str, want: usize, got: usize) -> String {
    format!("wrong number of args for {}: want {} got {}", name, want, got)
}

/// Equality where numbers compare by value regardless of representation.
fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(name: &str, args: &[Value], test: fn(Ordering) -> bool) -> Result<Value, String> {
    let [a, b] = args else {
        return Err(arity(name, 2, args.len()));
    };
    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    };
    ordering
        .map(|o| Value::Bool(test(o)))
        .ok_or_else(|| {
            format!(
                "incompatible types for comparison: {} and {}",
                type_name(a),
                type_name(b)
            )
        })
}

/// Concatenates printed arguments, with a space between two operands when
/// neither is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !args[i - 1].is_string() && !arg.is_string() {
            out.push(' ');
        }
        out.push_str(&printable(arg));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        let helpers = Helpers::new();
        let func = helpers.get(name).unwrap();
        func(args)
    }

    #[test]
    fn truthiness() {
        for value in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!truthy(&value), "{} should be falsy", value);
        }
        for value in [json!(true), json!(1), json!(-0.5), json!("x"), json!([0]), json!({"a": 0})] {
            assert!(truthy(&value), "{} should be truthy", value);
        }
    }

    #[test]
    fn printable_forms() {
        assert_eq!(printable(&json!(null)), "");
        assert_eq!(printable(&json!("a<b")), "a<b");
        assert_eq!(printable(&json!(42)), "42");
        assert_eq!(printable(&json!([1, "a"])), "[1,\"a\"]");
    }

    #[test]
    fn boolean_helpers() {
        assert_eq!(call("and", &[json!(1), json!(""), json!(2)]).unwrap(), json!(""));
        assert_eq!(call("and", &[json!(1), json!(2)]).unwrap(), json!(2));
        assert_eq!(call("or", &[json!(0), json!("x")]).unwrap(), json!("x"));
        assert_eq!(call("or", &[json!(0), json!(null)]).unwrap(), json!(null));
        assert_eq!(call("not", &[json!([])]).unwrap(), json!(true));
        assert!(call("not", &[]).is_err());
    }

    #[test]
    fn len_and_index() {
        assert_eq!(call("len", &[json!("héllo")]).unwrap(), json!(5));
        assert_eq!(call("len", &[json!([1, 2])]).unwrap(), json!(2));
        assert!(call("len", &[json!(3)]).is_err());

        let data = json!({"rows": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(
            call("index", &[data.clone(), json!("rows"), json!(1), json!("name")]).unwrap(),
            json!("b")
        );
        assert!(call("index", &[data, json!("rows"), json!(5)]).is_err());
    }

    #[test]
    fn comparisons() {
        assert_eq!(call("eq", &[json!(1), json!(1.0)]).unwrap(), json!(true));
        assert_eq!(call("eq", &[json!("a"), json!("b"), json!("a")]).unwrap(), json!(true));
        assert_eq!(call("ne", &[json!("a"), json!("b")]).unwrap(), json!(true));
        assert_eq!(call("lt", &[json!(1), json!(2)]).unwrap(), json!(true));
        assert_eq!(call("ge", &[json!("b"), json!("a")]).unwrap(), json!(true));
        assert!(call("lt", &[json!(1), json!("a")]).is_err());
    }

    #[test]
    fn printing() {
        assert_eq!(call("print", &[json!("a"), json!(1), json!(2), json!("b")]).unwrap(), json!("a1 2b"));
        assert_eq!(call("urlquery", &[json!("a b&c")]).unwrap(), json!("a+b%26c"));
        assert_eq!(call("json", &[json!({"k": [1]})]).unwrap(), json!("{\"k\":[1]}"));
    }

    #[test]
    fn registered_helpers_override_builtins() {
        let helpers = Helpers::new().with("len", |_| Ok(json!(99)));
        let func = helpers.get("len").unwrap();
        assert_eq!(func(&[json!("x")]).unwrap(), json!(99));
        assert!(Helpers::empty().is_empty());
    }
}
