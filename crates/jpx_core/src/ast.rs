//! AST definitions for the extended JSONPath dialect

use regex::Regex;

/// A parsed path expression: an anchor followed by steps applied left to right
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    pub anchor: Anchor,
    pub selectors: Vec<Selector>,
}

/// Where a path starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `$` - the document root
    Root,
    /// `@` - the current node
    Current,
}

/// A single step of a path
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Name selector: `.key` or `['key']`
    Name(String),
    /// Wildcard selector: `*` or `[*]`
    Wildcard,
    /// Index selector: `[0]` or `[-1]`
    Index(i64),
    /// Array slice selector: `[start:stop:step]`
    Slice(Slice),
    /// `..` - the current node and all of its descendants, pre-order
    RecursiveDescent,
    /// `[a,b,...]` made only of names, indices, slices and wildcards
    Union(Vec<Selector>),
    /// Filter selector: `[?expr]` or `[?(expr)]`
    Filter(Box<Expr>),
    /// One or more `^`
    Parent(usize),
    /// `lhs | rhs`
    Pipe { lhs: Box<JsonPath>, rhs: Box<JsonPath> },
    /// Bracket list holding filters or relative paths, each evaluated
    /// against the same node
    MultiBranch(Vec<JsonPath>),
}

/// Slice bounds; `step` is never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: i64,
}

/// An expression in a filter
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Current node reference: `@`
    CurrentNode,
    /// Root node reference: `$`
    RootNode,
    /// Path relative to the current node or the root: `@.foo.bar` or `$.foo`
    Path(JsonPath),
    /// Literal value
    Literal(Literal),
    /// Comparison expression: `@.price < 10`
    Comparison {
        left: Box<Expr>,
        op: CompOp,
        right: Box<Expr>,
    },
    /// Logical AND/OR expression: `@.a && @.b`
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    /// Logical NOT expression: `!@.archived`
    Not(Box<Expr>),
    /// Arithmetic expression: `@.price * 2`
    Arithmetic {
        left: Box<Expr>,
        op: ArithOp,
        right: Box<Expr>,
    },
    /// Unary minus: `-@.delta`
    Negate(Box<Expr>),
    /// Function call: `length(@.items)`
    FunctionCall { name: String, args: Vec<Expr> },
    /// Regex match: `@.name =~ /^a.*/i`
    RegexMatch { value: Box<Expr>, pattern: Pattern },
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    /// Equal: `==`
    Eq,
    /// Not equal: `!=`
    Ne,
    /// Less than: `<`
    Lt,
    /// Greater than: `>`
    Gt,
    /// Less than or equal: `<=`
    Le,
    /// Greater than or equal: `>=`
    Ge,
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Logical AND: `&&`
    And,
    /// Logical OR: `||`
    Or,
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number (integer or floating-point)
    Number(f64),
    /// String value
    String(String),
}

/// A regex literal compiled at parse time
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub case_insensitive: bool,
    pub regex: Regex,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

impl JsonPath {
    pub fn new(anchor: Anchor, selectors: Vec<Selector>) -> Self {
        Self { anchor, selectors }
    }

    /// A path is singular when it can select at most one node
    pub fn is_singular(&self) -> bool {
        self.selectors
            .iter()
            .all(|s| matches!(s, Selector::Name(_) | Selector::Index(_) | Selector::Parent(_)))
    }

    /// Visit every function call reachable from this path, including those
    /// nested in filters, branches and pipes
    pub fn visit_calls<'p, E>(
        &'p self,
        visit: &mut impl FnMut(&'p str, usize) -> Result<(), E>,
    ) -> Result<(), E> {
        for selector in &self.selectors {
            selector.visit_calls(visit)?;
        }
        Ok(())
    }
}

impl Selector {
    fn visit_calls<'p, E>(
        &'p self,
        visit: &mut impl FnMut(&'p str, usize) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Selector::Filter(expr) => expr.visit_calls(visit),
            Selector::Union(selectors) => {
                for selector in selectors {
                    selector.visit_calls(visit)?;
                }
                Ok(())
            }
            Selector::Pipe { lhs, rhs } => {
                lhs.visit_calls(visit)?;
                rhs.visit_calls(visit)
            }
            Selector::MultiBranch(branches) => {
                for branch in branches {
                    branch.visit_calls(visit)?;
                }
                Ok(())
            }
            Selector::Name(_)
            | Selector::Wildcard
            | Selector::Index(_)
            | Selector::Slice(_)
            | Selector::RecursiveDescent
            | Selector::Parent(_) => Ok(()),
        }
    }
}

impl Expr {
    fn visit_calls<'p, E>(
        &'p self,
        visit: &mut impl FnMut(&'p str, usize) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Expr::CurrentNode | Expr::RootNode | Expr::Literal(_) => Ok(()),
            Expr::Path(path) => path.visit_calls(visit),
            Expr::Comparison { left, right, .. }
            | Expr::Logical { left, right, .. }
            | Expr::Arithmetic { left, right, .. } => {
                left.visit_calls(visit)?;
                right.visit_calls(visit)
            }
            Expr::Not(inner) | Expr::Negate(inner) => inner.visit_calls(visit),
            Expr::RegexMatch { value, .. } => value.visit_calls(visit),
            Expr::FunctionCall { name, args } => {
                visit(name.as_str(), args.len())?;
                for arg in args {
                    arg.visit_calls(visit)?;
                }
                Ok(())
            }
        }
    }
}
