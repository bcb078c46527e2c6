//! Evaluator for parsed path expressions
//!
//! Evaluation walks the selector list left to right. Each visited node is
//! recorded in a [`PathArena`] so that the parent operator can climb back up
//! and result paths can be materialized at the end.

use crate::ast::{
    Anchor, ArithOp, CompOp, Expr, JsonPath, Literal, LogicalOp, Selector, Slice,
};
use crate::functions::FunctionRegistry;
use crate::node::Node;
use crate::options::ExecutionMode;
use crate::path::{PathArena, StepId};
use crate::value::{compare, is_truthy, number_value, values_equal};
use rayon::prelude::*;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// Evaluation-time failure; aborts the whole query
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function '{name}' expects {expected}")]
    ArgumentType { name: String, expected: &'static str },
    #[error("function '{name}' requires a non-empty sequence")]
    EmptySequence { name: String },
    #[error("invalid regex {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// Result of evaluating an expression
#[derive(Debug, Clone)]
enum Operand<'a> {
    /// A single JSON value
    Value(Cow<'a, Value>),
    /// Values selected by a non-singular path
    Nodes(Vec<&'a Value>),
    /// No result (missing member, non-numeric arithmetic, etc.)
    Nothing,
}

impl<'a> Operand<'a> {
    fn is_truthy(&self) -> bool {
        match self {
            Operand::Value(v) => is_truthy(v),
            Operand::Nodes(list) => !list.is_empty(),
            Operand::Nothing => false,
        }
    }

    /// The single value this operand stands for, if there is exactly one
    fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(v) => Some(&**v),
            Operand::Nodes(list) if list.len() == 1 => list.first().copied(),
            _ => None,
        }
    }

    /// A node list holding more than one value cannot take part in a comparison
    fn is_singular(&self) -> bool {
        match self {
            Operand::Nodes(list) => list.len() <= 1,
            Operand::Value(_) | Operand::Nothing => true,
        }
    }

    /// Function arguments see node lists as arrays
    fn into_argument(self) -> Option<Cow<'a, Value>> {
        match self {
            Operand::Value(v) => Some(v),
            Operand::Nodes(list) => Some(Cow::Owned(Value::Array(
                list.into_iter().cloned().collect(),
            ))),
            Operand::Nothing => None,
        }
    }

    fn boolean(b: bool) -> Self {
        Operand::Value(Cow::Owned(Value::Bool(b)))
    }

    fn number(n: f64) -> Self {
        match number_value(n) {
            Value::Null => Operand::Nothing,
            v => Operand::Value(Cow::Owned(v)),
        }
    }
}

/// Evaluation context: the document root, the function table and the branch
/// execution mode. The current node is passed along each call.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    root: &'a Value,
    functions: &'a FunctionRegistry,
    mode: ExecutionMode,
}

impl<'a> Evaluator<'a> {
    /// Evaluate against `root` with the built-in functions, sequentially
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            functions: FunctionRegistry::builtin(),
            mode: ExecutionMode::Sequential,
        }
    }

    pub fn with_functions(mut self, functions: &'a FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Evaluate `path`, returning nodes in document-traversal order
    pub fn evaluate(&self, path: &JsonPath) -> Result<Vec<Node<'a>>, EvaluationError> {
        self.functions.check(path)?;
        log::debug!("evaluating expression ({:?} branches)", self.mode);

        let mut arena = PathArena::new(self.root);
        let ids = self.eval_path(&mut arena, path, PathArena::ROOT)?;
        Ok(ids
            .into_iter()
            .map(|id| Node {
                value: arena.value(id),
                path: arena.path(id),
            })
            .collect())
    }

    fn eval_path(
        &self,
        arena: &mut PathArena<'a>,
        path: &JsonPath,
        current: StepId,
    ) -> Result<Vec<StepId>, EvaluationError> {
        let start = match path.anchor {
            Anchor::Root => PathArena::ROOT,
            Anchor::Current => current,
        };
        self.apply_selectors(arena, &path.selectors, vec![start])
    }

    fn apply_selectors(
        &self,
        arena: &mut PathArena<'a>,
        selectors: &[Selector],
        mut nodes: Vec<StepId>,
    ) -> Result<Vec<StepId>, EvaluationError> {
        for selector in selectors {
            let mut next = Vec::new();
            for &node in &nodes {
                self.apply_selector(arena, selector, node, &mut next)?;
            }
            nodes = next;
        }
        Ok(nodes)
    }

    fn apply_selector(
        &self,
        arena: &mut PathArena<'a>,
        selector: &Selector,
        node: StepId,
        out: &mut Vec<StepId>,
    ) -> Result<(), EvaluationError> {
        let value = arena.value(node);
        match selector {
            Selector::Name(name) => {
                if let Value::Object(map) = value
                    && let Some((key, child)) = map.get_key_value(name)
                {
                    out.push(arena.push_name(node, key, child));
                }
            }
            Selector::Wildcard => push_children(arena, node, out),
            Selector::Index(idx) => {
                if let Value::Array(arr) = value
                    && let Some(i) = normalize_index(*idx, arr.len())
                {
                    out.push(arena.push_index(node, i, &arr[i]));
                }
            }
            Selector::Slice(slice) => {
                if let Value::Array(arr) = value {
                    for i in slice_indices(arr.len(), slice) {
                        out.push(arena.push_index(node, i, &arr[i]));
                    }
                }
            }
            Selector::RecursiveDescent => collect_descendants(arena, node, out),
            Selector::Union(selectors) => {
                for selector in selectors {
                    self.apply_selector(arena, selector, node, out)?;
                }
            }
            Selector::Filter(expr) => self.evaluate_filter(arena, expr, node, out)?,
            Selector::Parent(count) => {
                let mut ancestor = Some(node);
                for _ in 0..*count {
                    ancestor = ancestor.and_then(|id| arena.parent(id));
                }
                // Climbing past the root selects nothing
                out.extend(ancestor);
            }
            Selector::Pipe { lhs, rhs } => {
                for piped in self.eval_path(arena, lhs, node)? {
                    out.extend(self.apply_selectors(arena, &rhs.selectors, vec![piped])?);
                }
            }
            Selector::MultiBranch(branches) => {
                self.evaluate_branches(arena, branches, node, out)?;
            }
        }
        Ok(())
    }

    /// Keep each child of `node` for which the predicate is truthy
    fn evaluate_filter(
        &self,
        arena: &mut PathArena<'a>,
        expr: &Expr,
        node: StepId,
        out: &mut Vec<StepId>,
    ) -> Result<(), EvaluationError> {
        let mut candidates = Vec::new();
        push_children(arena, node, &mut candidates);

        for candidate in candidates {
            // Steps taken inside the predicate are never part of the result
            let mark = arena.len();
            let keep = self.evaluate_expr(arena, expr, candidate)?.is_truthy();
            arena.truncate(mark);
            if keep {
                out.push(candidate);
            }
        }
        Ok(())
    }

    fn evaluate_branches(
        &self,
        arena: &mut PathArena<'a>,
        branches: &[JsonPath],
        node: StepId,
        out: &mut Vec<StepId>,
    ) -> Result<(), EvaluationError> {
        match self.mode {
            ExecutionMode::Sequential => {
                for branch in branches {
                    out.extend(self.eval_path(arena, branch, node)?);
                }
            }
            ExecutionMode::Parallel => {
                log::trace!("evaluating {} branches in parallel", branches.len());
                let shared: &PathArena<'a> = arena;
                let results = branches
                    .par_iter()
                    .map(|branch| {
                        let (mut fork, local, chain) = shared.fork(node);
                        let ids = self.eval_path(&mut fork, branch, local)?;
                        Ok((fork, chain, ids))
                    })
                    .collect::<Result<Vec<_>, EvaluationError>>()?;

                for (fork, chain, ids) in results {
                    let mapping = arena.absorb(fork, &chain);
                    out.extend(ids.into_iter().map(|id| PathArena::translate(&mapping, id)));
                }
            }
        }
        Ok(())
    }

    /// Evaluate an expression with `@` bound to `current`
    fn evaluate_expr(
        &self,
        arena: &mut PathArena<'a>,
        expr: &Expr,
        current: StepId,
    ) -> Result<Operand<'a>, EvaluationError> {
        let result = match expr {
            Expr::CurrentNode => Operand::Value(Cow::Borrowed(arena.value(current))),
            Expr::RootNode => Operand::Value(Cow::Borrowed(self.root)),
            Expr::Path(path) => {
                let ids = self.eval_path(arena, path, current)?;
                if path.is_singular() {
                    match ids.first() {
                        Some(&id) => Operand::Value(Cow::Borrowed(arena.value(id))),
                        None => Operand::Nothing,
                    }
                } else {
                    Operand::Nodes(ids.into_iter().map(|id| arena.value(id)).collect())
                }
            }
            Expr::Literal(lit) => literal_operand(lit),
            Expr::Comparison { left, op, right } => {
                let left = self.evaluate_expr(arena, left, current)?;
                let right = self.evaluate_expr(arena, right, current)?;
                Operand::boolean(compare_operands(&left, *op, &right))
            }
            Expr::Logical { left, op, right } => {
                let left = self.evaluate_expr(arena, left, current)?.is_truthy();
                let result = match op {
                    LogicalOp::And => {
                        left && self.evaluate_expr(arena, right, current)?.is_truthy()
                    }
                    LogicalOp::Or => {
                        left || self.evaluate_expr(arena, right, current)?.is_truthy()
                    }
                };
                Operand::boolean(result)
            }
            Expr::Not(inner) => {
                Operand::boolean(!self.evaluate_expr(arena, inner, current)?.is_truthy())
            }
            Expr::Arithmetic { left, op, right } => {
                let left = self.evaluate_expr(arena, left, current)?;
                let right = self.evaluate_expr(arena, right, current)?;
                let operands = left
                    .as_value()
                    .and_then(Value::as_f64)
                    .zip(right.as_value().and_then(Value::as_f64));
                match operands {
                    Some((l, r)) => Operand::number(match op {
                        ArithOp::Add => l + r,
                        ArithOp::Sub => l - r,
                        ArithOp::Mul => l * r,
                        ArithOp::Div => l / r,
                        ArithOp::Rem => l % r,
                    }),
                    None => Operand::Nothing,
                }
            }
            Expr::Negate(inner) => {
                let inner = self.evaluate_expr(arena, inner, current)?;
                match inner.as_value().and_then(Value::as_f64) {
                    Some(n) => Operand::number(-n),
                    None => Operand::Nothing,
                }
            }
            Expr::FunctionCall { name, args } => {
                self.evaluate_function(arena, name, args, current)?
            }
            Expr::RegexMatch { value, pattern } => {
                let value = self.evaluate_expr(arena, value, current)?;
                let matched = match value.as_value() {
                    Some(Value::String(s)) => pattern.regex.is_match(s),
                    _ => false,
                };
                Operand::boolean(matched)
            }
        };
        Ok(result)
    }

    fn evaluate_function(
        &self,
        arena: &mut PathArena<'a>,
        name: &str,
        args: &[Expr],
        current: StepId,
    ) -> Result<Operand<'a>, EvaluationError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownFunction {
                name: name.to_string(),
            })?;
        if function.arity != args.len() {
            return Err(EvaluationError::Arity {
                name: name.to_string(),
                expected: function.arity,
                found: args.len(),
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.evaluate_expr(arena, arg, current)?.into_argument() {
                Some(value) => values.push(value),
                // A missing member propagates instead of failing the call
                None => return Ok(Operand::Nothing),
            }
        }

        log::trace!("calling {name} with {} argument(s)", values.len());
        Ok(Operand::Value(Cow::Owned((function.call)(&values)?)))
    }
}

/// Record every element or member value of `node`, in order
fn push_children<'a>(arena: &mut PathArena<'a>, node: StepId, out: &mut Vec<StepId>) {
    match arena.value(node) {
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                out.push(arena.push_index(node, i, child));
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                out.push(arena.push_name(node, key, child));
            }
        }
        _ => {}
    }
}

/// `node` followed by all of its descendants, depth-first pre-order
fn collect_descendants<'a>(arena: &mut PathArena<'a>, node: StepId, out: &mut Vec<StepId>) {
    let mut stack = vec![node];
    let mut children = Vec::new();

    while let Some(current) = stack.pop() {
        out.push(current);
        push_children(arena, current, &mut children);
        // Push in reverse order to maintain traversal order
        stack.extend(children.drain(..).rev());
    }
}

fn literal_operand<'a>(lit: &Literal) -> Operand<'a> {
    match lit {
        Literal::Null => Operand::Value(Cow::Owned(Value::Null)),
        Literal::Bool(b) => Operand::boolean(*b),
        Literal::Number(n) => Operand::number(*n),
        Literal::String(s) => Operand::Value(Cow::Owned(Value::String(s.clone()))),
    }
}

/// Compare two operands; a node list with several values never compares
fn compare_operands(left: &Operand<'_>, op: CompOp, right: &Operand<'_>) -> bool {
    if !left.is_singular() || !right.is_singular() {
        return false;
    }

    match (left.as_value(), right.as_value()) {
        (Some(l), Some(r)) => compare_json_values(l, op, r),
        // Both sides are Nothing (absent) - equal in being absent
        (None, None) => matches!(op, CompOp::Eq | CompOp::Le | CompOp::Ge),
        // One side is Nothing, one has a value - not equal
        _ => matches!(op, CompOp::Ne),
    }
}

fn compare_json_values(left: &Value, op: CompOp, right: &Value) -> bool {
    match op {
        CompOp::Eq => values_equal(left, right),
        CompOp::Ne => !values_equal(left, right),
        CompOp::Lt => compare(left, right) == Some(Ordering::Less),
        CompOp::Gt => compare(left, right) == Some(Ordering::Greater),
        CompOp::Le => values_equal(left, right) || compare(left, right) == Some(Ordering::Less),
        CompOp::Ge => {
            values_equal(left, right) || compare(left, right) == Some(Ordering::Greater)
        }
    }
}

fn normalize_index(idx: i64, len: usize) -> Option<usize> {
    let len_i64 = len as i64;
    if idx >= 0 {
        let i = idx as usize;
        if i < len { Some(i) } else { None }
    } else {
        let normalized = len_i64 + idx;
        if normalized >= 0 {
            Some(normalized as usize)
        } else {
            None
        }
    }
}

/// Indices selected by a slice, in selection order
///
/// Bounds clamp to `[0, len]` for a forward step and to `[-1, len - 1]` for
/// a backward one, so an out-of-range start never wraps onto an element.
fn slice_indices(len: usize, slice: &Slice) -> Vec<usize> {
    let len = len as i64;
    let step = slice.step;
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let bound = |b: i64| {
        if b < 0 {
            (len + b).max(lower)
        } else {
            b.min(upper)
        }
    };

    let (start, end) = if step > 0 {
        (slice.start.map_or(lower, bound), slice.stop.map_or(upper, bound))
    } else {
        (slice.start.map_or(upper, bound), slice.stop.map_or(lower, bound))
    };

    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        indices.push(i as usize);
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    indices
}
