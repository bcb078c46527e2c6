//! Built-in filter functions and the registry that resolves them by name

use crate::ast::JsonPath;
use crate::eval::EvaluationError;
use crate::value::{compare, number_value, values_equal};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Signature of a filter function; arguments arrive already evaluated
pub type FunctionImpl = fn(&[Cow<'_, Value>]) -> Result<Value, EvaluationError>;

/// A callable with a fixed number of arguments
#[derive(Debug, Clone, Copy)]
pub struct Function {
    pub arity: usize,
    pub call: FunctionImpl,
}

/// Name to function table consulted by the evaluator
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
}

static BUILTINS: LazyLock<FunctionRegistry> = LazyLock::new(|| {
    let mut registry = FunctionRegistry::empty();
    registry
        .register("abs", 1, fn_abs)
        .register("avg", 1, fn_avg)
        .register("ceil", 1, fn_ceil)
        .register("contains", 2, fn_contains)
        .register("count", 1, fn_count)
        .register("ends_with", 2, fn_ends_with)
        .register("floor", 1, fn_floor)
        .register("keys", 1, fn_keys)
        .register("length", 1, fn_length)
        .register("match", 2, fn_match)
        .register("max", 1, fn_max)
        .register("min", 1, fn_min)
        .register("prod", 1, fn_prod)
        .register("search", 2, fn_search)
        .register("starts_with", 2, fn_starts_with)
        .register("sum", 1, fn_sum)
        .register("to_number", 1, fn_to_number)
        .register("tokenize", 2, fn_tokenize);
    registry
});

impl FunctionRegistry {
    /// A registry with no functions at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The shared table of built-in functions
    pub fn builtin() -> &'static FunctionRegistry {
        &BUILTINS
    }

    /// An owned copy of the built-ins, ready to be extended
    pub fn with_builtins() -> Self {
        FunctionRegistry::clone(&BUILTINS)
    }

    /// Add or replace a function
    pub fn register(
        &mut self,
        name: impl Into<String>,
        arity: usize,
        call: FunctionImpl,
    ) -> &mut Self {
        self.functions.insert(name.into(), Function { arity, call });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Resolve every call in `path` up front so an unknown name or a wrong
    /// argument count fails the query before any traversal happens
    pub fn check(&self, path: &JsonPath) -> Result<(), EvaluationError> {
        path.visit_calls(&mut |name, found| {
            let function = self.get(name).ok_or_else(|| EvaluationError::UnknownFunction {
                name: name.to_string(),
            })?;
            if function.arity != found {
                return Err(EvaluationError::Arity {
                    name: name.to_string(),
                    expected: function.arity,
                    found,
                });
            }
            Ok(())
        })
    }
}

// Compiled patterns are cheap to clone; each worker thread keeps its own cache.
thread_local! {
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Get a cached regex or compile and cache a new one
fn get_or_compile_regex(pattern: &str) -> Result<Regex, EvaluationError> {
    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| EvaluationError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    })
}

fn type_error(name: &str, expected: &'static str) -> EvaluationError {
    EvaluationError::ArgumentType {
        name: name.to_string(),
        expected,
    }
}

fn number_arg(name: &str, arg: &Value) -> Result<f64, EvaluationError> {
    arg.as_f64().ok_or_else(|| type_error(name, "a number"))
}

fn string_arg<'v>(name: &str, arg: &'v Value) -> Result<&'v str, EvaluationError> {
    arg.as_str().ok_or_else(|| type_error(name, "a string"))
}

fn numbers_arg(name: &str, arg: &Value) -> Result<Vec<f64>, EvaluationError> {
    let Value::Array(items) = arg else {
        return Err(type_error(name, "an array of numbers"));
    };
    items
        .iter()
        .map(|item| item.as_f64().ok_or_else(|| type_error(name, "an array of numbers")))
        .collect()
}

fn fn_abs(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    Ok(number_value(number_arg("abs", &args[0])?.abs()))
}

fn fn_ceil(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    Ok(number_value(number_arg("ceil", &args[0])?.ceil()))
}

fn fn_floor(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    Ok(number_value(number_arg("floor", &args[0])?.floor()))
}

fn fn_avg(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let numbers = numbers_arg("avg", &args[0])?;
    if numbers.is_empty() {
        return Err(EvaluationError::EmptySequence {
            name: "avg".to_string(),
        });
    }
    Ok(number_value(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

fn fn_sum(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    Ok(number_value(numbers_arg("sum", &args[0])?.iter().sum()))
}

fn fn_prod(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let numbers = numbers_arg("prod", &args[0])?;
    if numbers.is_empty() {
        return Err(EvaluationError::EmptySequence {
            name: "prod".to_string(),
        });
    }
    Ok(number_value(numbers.iter().product()))
}

/// Shared body of `max` and `min`: all numbers or all strings, `null` when empty
fn extreme(name: &str, arg: &Value, wanted: Ordering) -> Result<Value, EvaluationError> {
    let Value::Array(items) = arg else {
        return Err(type_error(name, "an array of numbers or strings"));
    };
    let all_numbers = items.iter().all(Value::is_number);
    let all_strings = items.iter().all(Value::is_string);
    if !all_numbers && !all_strings {
        return Err(type_error(name, "an array of numbers or strings"));
    }

    let mut best: Option<&Value> = None;
    for item in items {
        best = match best {
            Some(current) if compare(item, current) != Some(wanted) => Some(current),
            _ => Some(item),
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn fn_max(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    extreme("max", &args[0], Ordering::Greater)
}

fn fn_min(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    extreme("min", &args[0], Ordering::Less)
}

/// Code points for strings, element count for arrays, member count for objects
fn fn_length(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    match args[0].as_ref() {
        Value::String(s) => Ok(Value::Number(s.chars().count().into())),
        Value::Array(arr) => Ok(Value::Number(arr.len().into())),
        Value::Object(obj) => Ok(Value::Number(obj.len().into())),
        _ => Err(type_error("length", "a string, array or object")),
    }
}

/// Size of a node list; a lone value counts as one
fn fn_count(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let count = match args[0].as_ref() {
        Value::Array(arr) => arr.len(),
        _ => 1,
    };
    Ok(Value::Number(count.into()))
}

fn fn_keys(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    match args[0].as_ref() {
        Value::Object(obj) => Ok(Value::Array(
            obj.keys().map(|k| Value::String(k.clone())).collect(),
        )),
        _ => Err(type_error("keys", "an object")),
    }
}

fn fn_contains(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    match (args[0].as_ref(), args[1].as_ref()) {
        (Value::Array(items), needle) => Ok(Value::Bool(
            items.iter().any(|item| values_equal(item, needle)),
        )),
        (Value::String(haystack), Value::String(needle)) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        _ => Err(type_error("contains", "an array, or a string and a string")),
    }
}

fn fn_starts_with(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let s = string_arg("starts_with", &args[0])?;
    let prefix = string_arg("starts_with", &args[1])?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

fn fn_ends_with(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let s = string_arg("ends_with", &args[0])?;
    let suffix = string_arg("ends_with", &args[1])?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

/// Numbers pass through; numeric strings are parsed, other strings give `null`
fn fn_to_number(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    match args[0].as_ref() {
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::String(s) => Ok(s
            .trim()
            .parse::<f64>()
            .map(number_value)
            .unwrap_or(Value::Null)),
        _ => Err(type_error("to_number", "a number or a string")),
    }
}

/// Split on regex matches, dropping the empty pieces at either end
fn fn_tokenize(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let s = string_arg("tokenize", &args[0])?;
    let re = get_or_compile_regex(string_arg("tokenize", &args[1])?)?;

    let mut pieces: Vec<&str> = re.split(s).collect();
    while pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    let start = pieces.iter().take_while(|p| p.is_empty()).count();
    Ok(Value::Array(
        pieces[start..]
            .iter()
            .map(|p| Value::String((*p).to_string()))
            .collect(),
    ))
}

/// Whole-string regex match; non-string input is simply not a match
fn fn_match(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let Value::String(s) = args[0].as_ref() else {
        return Ok(Value::Bool(false));
    };
    let pattern = string_arg("match", &args[1])?;
    let re = get_or_compile_regex(&format!("^(?:{pattern})$"))?;
    Ok(Value::Bool(re.is_match(s)))
}

/// Regex search anywhere in the string
fn fn_search(args: &[Cow<'_, Value>]) -> Result<Value, EvaluationError> {
    let Value::String(s) = args[0].as_ref() else {
        return Ok(Value::Bool(false));
    };
    let re = get_or_compile_regex(string_arg("search", &args[1])?)?;
    Ok(Value::Bool(re.is_match(s)))
}
