//! jpx_core - extended JSONPath processor core library
//!
//! This library parses JSONPath expressions (RFC 9535 plus the parent
//! operator, pipes, regex matching, arithmetic and multi-branch brackets)
//! and evaluates them against `serde_json` documents.

pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod node;
pub mod options;
pub mod parser;
pub mod path;
pub mod value;

pub use ast::JsonPath;
pub use eval::{EvaluationError, Evaluator};
pub use functions::{FunctionImpl, FunctionRegistry};
pub use node::Node;
pub use options::{ExecutionMode, QueryOptions};
pub use parser::ParseError;
pub use path::{NormalizedPath, PathElement};

use serde_json::Value;
use std::str::FromStr;

/// Error type for JSONPath operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl JsonPath {
    /// Parse an expression string
    pub fn parse(expression: &str) -> Result<Self, ParseError> {
        parser::Parser::parse(expression)
    }

    /// Selected values, in result order
    pub fn select<'a>(
        &self,
        json: &'a Value,
        options: &QueryOptions,
    ) -> Result<Vec<&'a Value>, EvaluationError> {
        Ok(self
            .select_nodes(json, options)?
            .into_iter()
            .map(|node| node.value)
            .collect())
    }

    /// Normalized paths of the selected values
    pub fn select_paths(
        &self,
        json: &Value,
        options: &QueryOptions,
    ) -> Result<Vec<NormalizedPath>, EvaluationError> {
        Ok(self
            .select_nodes(json, options)?
            .into_iter()
            .map(|node| node.path)
            .collect())
    }

    /// Values paired with their paths
    pub fn select_nodes<'a>(
        &self,
        json: &'a Value,
        options: &QueryOptions,
    ) -> Result<Vec<Node<'a>>, EvaluationError> {
        let nodes = Evaluator::new(json).with_mode(options.mode).evaluate(self)?;
        Ok(options.apply(nodes))
    }
}

impl FromStr for JsonPath {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Execute a JSONPath query against a JSON value
///
/// # Arguments
/// * `jsonpath` - A JSONPath query string (e.g., "$.store.book[*].author")
/// * `json` - The JSON value to query
///
/// # Returns
/// A vector of matching JSON values, or an error if the query is invalid
///
/// # Example
/// ```
/// use serde_json::json;
/// use jpx_core::query;
///
/// let json = json!({"foo": "bar"});
/// let results = query("$.foo", &json).unwrap();
/// assert_eq!(results, vec![json!("bar")]);
/// ```
pub fn query(jsonpath: &str, json: &Value) -> Result<Vec<Value>, Error> {
    query_with(jsonpath, json, &QueryOptions::default())
}

/// Like [`query`], with deduplication, sorting or parallel branches
///
/// ```
/// use serde_json::json;
/// use jpx_core::{query_with, QueryOptions};
///
/// let json = json!({"a": 1, "b": 2});
/// let options = QueryOptions::new().with_no_duplicates(true);
/// let results = query_with("$['a','b','a']", &json, &options).unwrap();
/// assert_eq!(results, vec![json!(1), json!(2)]);
/// ```
pub fn query_with(
    jsonpath: &str,
    json: &Value,
    options: &QueryOptions,
) -> Result<Vec<Value>, Error> {
    let path = JsonPath::parse(jsonpath)?;
    let results = path.select(json, options)?;
    Ok(results.into_iter().cloned().collect())
}

/// Normalized paths selected by a query
pub fn query_paths(
    jsonpath: &str,
    json: &Value,
    options: &QueryOptions,
) -> Result<Vec<NormalizedPath>, Error> {
    let path = JsonPath::parse(jsonpath)?;
    Ok(path.select_paths(json, options)?)
}

/// Values and paths selected by a query
pub fn query_nodes<'a>(
    jsonpath: &str,
    json: &'a Value,
    options: &QueryOptions,
) -> Result<Vec<Node<'a>>, Error> {
    let path = JsonPath::parse(jsonpath)?;
    Ok(path.select_nodes(json, options)?)
}
