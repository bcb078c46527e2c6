//! Parser for extended JSONPath expressions

use crate::ast::{
    Anchor, ArithOp, CompOp, Expr, JsonPath, Literal, LogicalOp, Pattern, Selector, Slice,
};
use crate::lexer::{Lexer, LexerError, Token, TokenKind};
use regex::RegexBuilder;

/// Parser error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("at position {position}, {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl From<LexerError> for ParseError {
    fn from(e: LexerError) -> Self {
        Self {
            message: e.message,
            position: e.position,
        }
    }
}

/// One comma-separated element of a bracket list
enum Element {
    /// Name, index, slice or wildcard
    Simple(Selector),
    /// `?expr`
    Filter(Selector),
    /// `@...` or `$...`
    Path(JsonPath),
}

/// Parser for path expressions
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

/// Deepest nesting of brackets and prefixed or parenthesized expressions
const MAX_NESTING: usize = 64;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    /// Parse an expression string
    pub fn parse(input: &str) -> Result<JsonPath, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self::new(tokens);
        let path = parser.parse_query()?;
        log::debug!("parsed expression {input:?}");
        Ok(path)
    }

    fn parse_query(&mut self) -> Result<JsonPath, ParseError> {
        if self.current_kind() != Some(&TokenKind::Root) {
            return Err(ParseError {
                message: "expression must start with '$'".to_string(),
                position: 0,
            });
        }
        let mut path = self.parse_path()?;

        while self.current_kind() == Some(&TokenKind::Pipe) {
            self.advance(); // consume '|'
            if !matches!(
                self.current_kind(),
                Some(TokenKind::Root) | Some(TokenKind::At)
            ) {
                return Err(ParseError {
                    message: "expected '$' or '@' after '|'".to_string(),
                    position: self.current_position(),
                });
            }
            let rhs = self.parse_path()?;
            path = JsonPath::new(
                Anchor::Root,
                vec![Selector::Pipe {
                    lhs: Box::new(path),
                    rhs: Box::new(rhs),
                }],
            );
        }

        match self.current_kind() {
            None => Ok(path),
            Some(kind) => Err(ParseError {
                message: format!("unexpected token: {kind:?}"),
                position: self.current_position(),
            }),
        }
    }

    /// Parse `$` or `@` followed by any number of steps
    fn parse_path(&mut self) -> Result<JsonPath, ParseError> {
        let anchor = match self.current_kind() {
            Some(TokenKind::Root) => Anchor::Root,
            Some(TokenKind::At) => Anchor::Current,
            _ => {
                return Err(ParseError {
                    message: "expected '$' or '@'".to_string(),
                    position: self.current_position(),
                });
            }
        };
        self.advance();
        let selectors = self.parse_steps()?;
        Ok(JsonPath::new(anchor, selectors))
    }

    fn at_step(&self) -> bool {
        matches!(
            self.current_kind(),
            Some(TokenKind::Dot)
                | Some(TokenKind::DotDot)
                | Some(TokenKind::BracketOpen)
                | Some(TokenKind::Caret)
        )
    }

    fn parse_steps(&mut self) -> Result<Vec<Selector>, ParseError> {
        let mut selectors = Vec::new();

        while self.at_step() {
            match self.current_kind() {
                Some(TokenKind::DotDot) => {
                    self.advance();
                    selectors.push(Selector::RecursiveDescent);
                    selectors.push(self.parse_selector_after_dot()?);
                }
                Some(TokenKind::Dot) => {
                    self.advance();
                    selectors.push(self.parse_selector_after_dot()?);
                }
                Some(TokenKind::BracketOpen) => {
                    selectors.push(self.parse_bracket()?);
                }
                _ => {
                    let mut count = 0;
                    while self.current_kind() == Some(&TokenKind::Caret) {
                        self.advance();
                        count += 1;
                    }
                    selectors.push(Selector::Parent(count));
                }
            }
        }

        Ok(selectors)
    }

    fn parse_selector_after_dot(&mut self) -> Result<Selector, ParseError> {
        match self.current_kind().cloned() {
            Some(TokenKind::Ident(name)) => {
                self.advance();
                Ok(Selector::Name(name))
            }
            // Keywords are ordinary member names after a dot
            Some(TokenKind::True) => {
                self.advance();
                Ok(Selector::Name("true".to_string()))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Selector::Name("false".to_string()))
            }
            Some(TokenKind::Null) => {
                self.advance();
                Ok(Selector::Name("null".to_string()))
            }
            Some(TokenKind::Wildcard) => {
                self.advance();
                Ok(Selector::Wildcard)
            }
            Some(TokenKind::BracketOpen) => self.parse_bracket(),
            Some(kind) => Err(ParseError {
                message: format!("expected identifier or wildcard after '.', got {kind:?}"),
                position: self.current_position(),
            }),
            None => Err(ParseError {
                message: "expected identifier or wildcard after '.'".to_string(),
                position: self.current_position(),
            }),
        }
    }

    fn parse_bracket(&mut self) -> Result<Selector, ParseError> {
        self.nested(Self::parse_bracket_elements)
    }

    fn parse_bracket_elements(&mut self) -> Result<Selector, ParseError> {
        if self.current_kind() != Some(&TokenKind::BracketOpen) {
            return Err(ParseError {
                message: "expected '['".to_string(),
                position: self.current_position(),
            });
        }
        self.advance();

        let mut elements = Vec::new();

        loop {
            elements.push(self.parse_element()?);

            match self.current_kind() {
                Some(TokenKind::Comma) => {
                    self.advance();
                    continue;
                }
                Some(TokenKind::BracketClose) => {
                    self.advance();
                    break;
                }
                Some(kind) => {
                    return Err(ParseError {
                        message: format!("expected ',' or ']', got {kind:?}"),
                        position: self.current_position(),
                    });
                }
                None => {
                    return Err(ParseError {
                        message: "unclosed bracket".to_string(),
                        position: self.current_position(),
                    });
                }
            }
        }

        Ok(Self::combine(elements))
    }

    /// Fold bracket elements into a single selector
    fn combine(mut elements: Vec<Element>) -> Selector {
        if elements.len() == 1 {
            match elements.pop() {
                Some(Element::Simple(selector)) | Some(Element::Filter(selector)) => {
                    return selector;
                }
                Some(Element::Path(path)) => return Selector::MultiBranch(vec![path]),
                None => {}
            }
        }

        if elements.iter().all(|e| matches!(e, Element::Simple(_))) {
            let selectors = elements
                .into_iter()
                .filter_map(|e| match e {
                    Element::Simple(selector) => Some(selector),
                    _ => None,
                })
                .collect();
            return Selector::Union(selectors);
        }

        let branches = elements
            .into_iter()
            .map(|e| match e {
                Element::Simple(selector) | Element::Filter(selector) => {
                    JsonPath::new(Anchor::Current, vec![selector])
                }
                Element::Path(path) => path,
            })
            .collect();
        Selector::MultiBranch(branches)
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        match self.current_kind().cloned() {
            Some(TokenKind::Wildcard) => {
                self.advance();
                Ok(Element::Simple(Selector::Wildcard))
            }
            Some(TokenKind::String(s)) => {
                self.advance();
                Ok(Element::Simple(Selector::Name(s)))
            }
            Some(TokenKind::Number(_)) | Some(TokenKind::Colon) => {
                Ok(Element::Simple(self.parse_index_or_slice()?))
            }
            Some(TokenKind::Question) => {
                self.advance(); // consume '?'
                let expr = self.parse_expression()?;
                Ok(Element::Filter(Selector::Filter(Box::new(expr))))
            }
            Some(TokenKind::At) | Some(TokenKind::Root) => Ok(Element::Path(self.parse_path()?)),
            Some(kind) => Err(ParseError {
                message: format!("unexpected token in selector: {kind:?}"),
                position: self.current_position(),
            }),
            None => Err(ParseError {
                message: "unexpected end of input in selector".to_string(),
                position: self.current_position(),
            }),
        }
    }

    fn parse_index_or_slice(&mut self) -> Result<Selector, ParseError> {
        // `i`, `i:`, `:j`, `i:j`, `i:j:k` and any bound left out
        let start = self.try_parse_integer()?;

        if self.current_kind() != Some(&TokenKind::Colon) {
            // Just an index
            return match start {
                Some(n) => Ok(Selector::Index(n)),
                None => Err(ParseError {
                    message: "expected number".to_string(),
                    position: self.current_position(),
                }),
            };
        }

        // It's a slice
        self.advance(); // consume first ':'

        let stop = self.try_parse_integer()?;

        let step = if self.current_kind() == Some(&TokenKind::Colon) {
            self.advance(); // consume second ':'
            let position = self.current_position();
            match self.try_parse_integer()? {
                Some(0) => {
                    return Err(ParseError {
                        message: "slice step cannot be zero".to_string(),
                        position,
                    });
                }
                Some(step) => step,
                None => 1,
            }
        } else {
            1
        };

        Ok(Selector::Slice(Slice { start, stop, step }))
    }

    fn try_parse_integer(&mut self) -> Result<Option<i64>, ParseError> {
        let Some(TokenKind::Number(n)) = self.current_kind() else {
            return Ok(None);
        };
        let n = *n;
        if n.fract() != 0.0 || n.abs() > i64::MAX as f64 {
            return Err(ParseError {
                message: format!("expected integer, got {n}"),
                position: self.current_position(),
            });
        }
        self.advance();
        Ok(Some(n as i64))
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError {
                message: format!("expression nested deeper than {MAX_NESTING} levels"),
                position: self.current_position(),
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn current_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn current_position(&self) -> usize {
        self.current().map(|t| t.position).unwrap_or(
            // At end of input, report just past the last token
            self.tokens.last().map(|t| t.position + 1).unwrap_or(0),
        )
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    // --- predicate expressions ---

    /// Predicate expression, loosest binding first
    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or_expression()
    }

    /// `a || b`
    fn parse_or_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.current_kind() == Some(&TokenKind::Or) {
            self.advance(); // consume '||'
            let right = self.parse_and_expression()?;
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// `a && b`
    fn parse_and_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison_expression()?;

        while self.current_kind() == Some(&TokenKind::And) {
            self.advance(); // consume '&&'
            let right = self.parse_comparison_expression()?;
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parse comparison expression: expr op expr, or expr =~ /regex/
    fn parse_comparison_expression(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive_expression()?;

        if let Some(TokenKind::Regex { pattern, flags }) = self.current_kind().cloned() {
            let position = self.current_position();
            self.advance(); // consume '=~ /.../'
            let pattern = compile_pattern(pattern, &flags, position)?;
            return Ok(Expr::RegexMatch {
                value: Box::new(left),
                pattern,
            });
        }

        let op = match self.current_kind() {
            Some(TokenKind::Equal) => Some(CompOp::Eq),
            Some(TokenKind::NotEqual) => Some(CompOp::Ne),
            Some(TokenKind::LessThan) => Some(CompOp::Lt),
            Some(TokenKind::GreaterThan) => Some(CompOp::Gt),
            Some(TokenKind::LessEq) => Some(CompOp::Le),
            Some(TokenKind::GreaterEq) => Some(CompOp::Ge),
            _ => None,
        };

        if let Some(op) = op {
            self.advance(); // consume operator
            let right = self.parse_additive_expression()?;
            Ok(Expr::Comparison {
                left: Box::new(left),
                op,
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    /// Parse additive expression: expr + expr, expr - expr
    fn parse_additive_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative_expression()?;

        loop {
            let op = match self.current_kind() {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = Expr::Arithmetic {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parse multiplicative expression: expr * expr, expr / expr, expr % expr
    fn parse_multiplicative_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expression()?;

        loop {
            let op = match self.current_kind() {
                Some(TokenKind::Wildcard) => ArithOp::Mul,
                Some(TokenKind::Slash) => ArithOp::Div,
                Some(TokenKind::Percent) => ArithOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expression()?;
            left = Expr::Arithmetic {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_prefixed)
    }

    /// `!expr`, `-expr` or an atom
    fn parse_prefixed(&mut self) -> Result<Expr, ParseError> {
        match self.current_kind() {
            Some(TokenKind::Not) => {
                self.advance(); // consume '!'
                let expr = self.parse_unary_expression()?;
                Ok(Expr::Not(Box::new(expr)))
            }
            Some(TokenKind::Minus) => {
                self.advance(); // consume '-'
                let expr = self.parse_unary_expression()?;
                Ok(Expr::Negate(Box::new(expr)))
            }
            _ => self.parse_atom(),
        }
    }

    /// Paths, literals, calls and parenthesized groups
    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.current_kind().cloned() {
            Some(TokenKind::At) => self.parse_path_or_node(Expr::CurrentNode),
            Some(TokenKind::Root) => self.parse_path_or_node(Expr::RootNode),
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Some(TokenKind::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            Some(TokenKind::Number(n)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            Some(TokenKind::String(s)) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            Some(TokenKind::Ident(name)) => {
                self.advance();
                // name( starts a call
                if self.current_kind() == Some(&TokenKind::ParenOpen) {
                    self.parse_function_call(name)
                } else {
                    Err(ParseError {
                        message: format!("unexpected identifier '{name}' in expression"),
                        position: self.current_position(),
                    })
                }
            }
            Some(TokenKind::ParenOpen) => {
                self.advance(); // consume '('
                let expr = self.parse_expression()?;
                if self.current_kind() != Some(&TokenKind::ParenClose) {
                    return Err(ParseError {
                        message: "expected ')' after expression".to_string(),
                        position: self.current_position(),
                    });
                }
                self.advance(); // consume ')'
                Ok(expr)
            }
            Some(kind) => Err(ParseError {
                message: format!("unexpected token in expression: {kind:?}"),
                position: self.current_position(),
            }),
            None => Err(ParseError {
                message: "unexpected end of input in expression".to_string(),
                position: self.current_position(),
            }),
        }
    }

    /// Parse path steps after @ or $, or return the node itself
    fn parse_path_or_node(&mut self, node: Expr) -> Result<Expr, ParseError> {
        let anchor = if node == Expr::RootNode {
            Anchor::Root
        } else {
            Anchor::Current
        };
        self.advance(); // consume '@' or '$'

        if !self.at_step() {
            return Ok(node);
        }

        let selectors = self.parse_steps()?;
        Ok(Expr::Path(JsonPath::new(anchor, selectors)))
    }

    /// `name(arg, ...)` once the name has been consumed
    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        // Consume '('
        if self.current_kind() != Some(&TokenKind::ParenOpen) {
            return Err(ParseError {
                message: "expected '(' after function name".to_string(),
                position: self.current_position(),
            });
        }
        self.advance();

        let mut args = Vec::new();

        if self.current_kind() != Some(&TokenKind::ParenClose) {
            args.push(self.parse_expression()?);

            while self.current_kind() == Some(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }

        if self.current_kind() != Some(&TokenKind::ParenClose) {
            return Err(ParseError {
                message: "expected ')' after function arguments".to_string(),
                position: self.current_position(),
            });
        }
        self.advance();

        Ok(Expr::FunctionCall { name, args })
    }
}

/// Compile a regex literal; `i` is the only supported flag
fn compile_pattern(source: String, flags: &str, position: usize) -> Result<Pattern, ParseError> {
    let mut case_insensitive = false;
    for flag in flags.chars() {
        match flag {
            'i' => case_insensitive = true,
            other => {
                return Err(ParseError {
                    message: format!("unsupported regex flag '{other}'"),
                    position,
                });
            }
        }
    }

    let regex = RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| ParseError {
            message: format!("invalid regex /{source}/: {e}"),
            position,
        })?;

    Ok(Pattern {
        source,
        case_insensitive,
        regex,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn selectors(input: &str) -> Vec<Selector> {
        Parser::parse(input).unwrap().selectors
    }

    fn filter_expr(input: &str) -> Expr {
        match selectors(input).pop() {
            Some(Selector::Filter(expr)) => *expr,
            other => panic!("expected Filter selector, got {other:?}"),
        }
    }

    fn current_path(selectors: Vec<Selector>) -> Expr {
        Expr::Path(JsonPath::new(Anchor::Current, selectors))
    }

    #[test]
    fn test_parse_root_only() {
        let path = Parser::parse("$").unwrap();
        assert_eq!(path.anchor, Anchor::Root);
        assert_eq!(path.selectors.len(), 0);
    }

    #[test]
    fn test_parse_simple_name() {
        assert_eq!(selectors("$.foo"), vec![Selector::Name("foo".to_string())]);
    }

    #[test]
    fn test_parse_bracket_name() {
        assert_eq!(selectors("$['foo']"), vec![Selector::Name("foo".to_string())]);
    }

    #[test]
    fn test_parse_keyword_names() {
        assert_eq!(
            selectors("$.null.true"),
            vec![
                Selector::Name("null".to_string()),
                Selector::Name("true".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(selectors("$[0]"), vec![Selector::Index(0)]);
    }

    #[test]
    fn test_parse_negative_index() {
        assert_eq!(selectors("$[-1]"), vec![Selector::Index(-1)]);
    }

    #[test]
    fn test_parse_fractional_index_rejected() {
        assert!(Parser::parse("$[1.5]").is_err());
    }

    #[test]
    fn test_parse_wildcard() {
        assert_eq!(selectors("$[*]"), vec![Selector::Wildcard]);
        assert_eq!(selectors("$.*"), vec![Selector::Wildcard]);
    }

    #[test]
    fn test_parse_descendant() {
        assert_eq!(
            selectors("$..foo"),
            vec![
                Selector::RecursiveDescent,
                Selector::Name("foo".to_string())
            ]
        );
        assert_eq!(
            selectors("$..[0]"),
            vec![Selector::RecursiveDescent, Selector::Index(0)]
        );
    }

    #[test]
    fn test_parse_slice() {
        assert_eq!(
            selectors("$[1:3]"),
            vec![Selector::Slice(Slice {
                start: Some(1),
                stop: Some(3),
                step: 1
            })]
        );
        assert_eq!(
            selectors("$[::-1]"),
            vec![Selector::Slice(Slice {
                start: None,
                stop: None,
                step: -1
            })]
        );
    }

    #[test]
    fn test_parse_zero_step_rejected() {
        let err = Parser::parse("$[0:3:0]").unwrap_err();
        assert!(err.message.contains("step cannot be zero"));
        assert_eq!(err.position, 6);
    }

    #[test]
    fn test_parse_nesting_limit() {
        let nots = format!("$[?{}@.a]", "!".repeat(100_000));
        assert!(Parser::parse(&nots).unwrap_err().message.contains("nested deeper"));

        let parens = format!("$[?{}@.a]", "(".repeat(100_000));
        assert!(Parser::parse(&parens).unwrap_err().message.contains("nested deeper"));

        let brackets = format!("$.a{}", "[?@".repeat(100_000));
        assert!(Parser::parse(&brackets).unwrap_err().message.contains("nested deeper"));

        let ok = format!("$[?{}@.a{}]", "(".repeat(20), ")".repeat(20));
        assert!(Parser::parse(&ok).is_ok());
    }

    #[test]
    fn test_parse_complex_path() {
        assert_eq!(selectors("$.store.book[0].author").len(), 4);
    }

    #[test]
    fn test_parse_union() {
        assert_eq!(
            selectors("$[0,1].title"),
            vec![
                Selector::Union(vec![Selector::Index(0), Selector::Index(1)]),
                Selector::Name("title".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_parent() {
        assert_eq!(
            selectors("$.a.b^^"),
            vec![
                Selector::Name("a".to_string()),
                Selector::Name("b".to_string()),
                Selector::Parent(2)
            ]
        );
    }

    #[test]
    fn test_parse_filter_then_parent() {
        let parsed = selectors("$[*].reviews[?(@.rating==5)]^");
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[3], Selector::Parent(1));
    }

    #[test]
    fn test_parse_multi_branch_filters() {
        match selectors("$[?@.a == 1, ?@.b == 2]").pop() {
            Some(Selector::MultiBranch(branches)) => {
                assert_eq!(branches.len(), 2);
                assert!(branches.iter().all(|b| b.anchor == Anchor::Current));
                assert!(matches!(branches[0].selectors[0], Selector::Filter(_)));
            }
            other => panic!("expected MultiBranch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_multi_branch_relative_paths() {
        let parsed = selectors("$..[@.first, @.address.city]");
        assert_eq!(parsed[0], Selector::RecursiveDescent);
        match &parsed[1] {
            Selector::MultiBranch(branches) => {
                assert_eq!(
                    branches[1],
                    JsonPath::new(
                        Anchor::Current,
                        vec![
                            Selector::Name("address".to_string()),
                            Selector::Name("city".to_string())
                        ]
                    )
                );
            }
            other => panic!("expected MultiBranch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_mixed_union_becomes_branches() {
        match selectors("$[0:2, -1, ?@.author == 'x']").pop() {
            Some(Selector::MultiBranch(branches)) => {
                assert_eq!(branches.len(), 3);
                assert_eq!(branches[1].selectors, vec![Selector::Index(-1)]);
            }
            other => panic!("expected MultiBranch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_pipe() {
        let path = Parser::parse("$.a | @.b").unwrap();
        match &path.selectors[..] {
            [Selector::Pipe { lhs, rhs }] => {
                assert_eq!(lhs.selectors, vec![Selector::Name("a".to_string())]);
                assert_eq!(rhs.anchor, Anchor::Current);
                assert_eq!(rhs.selectors, vec![Selector::Name("b".to_string())]);
            }
            other => panic!("expected Pipe, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_pipe_requires_path() {
        assert!(Parser::parse("$.a | b").is_err());
        assert!(Parser::parse("$.a |").is_err());
    }

    #[test]
    fn test_parse_must_start_with_root() {
        let err = Parser::parse("@.a").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(Parser::parse("invalid").is_err());
    }

    #[test]
    fn test_parse_trailing_garbage() {
        let err = Parser::parse("$.a b").unwrap_err();
        assert_eq!(err.position, 4);
    }

    #[test]
    fn test_parse_unclosed_bracket() {
        assert!(Parser::parse("$['a'").is_err());
        assert!(Parser::parse("$[?(@.a > 1]").is_err());
    }

    // filters

    #[test]
    fn test_parse_simple_filter() {
        assert_eq!(
            filter_expr("$[?@.price]"),
            current_path(vec![Selector::Name("price".to_string())])
        );
    }

    #[test]
    fn test_parse_parenthesized_filter() {
        assert_eq!(filter_expr("$[?(@.price)]"), filter_expr("$[?@.price]"));
    }

    #[test]
    fn test_parse_filter_comparison() {
        match filter_expr("$[?@.price < 10]") {
            Expr::Comparison { left, op, right } => {
                assert_eq!(op, CompOp::Lt);
                assert_eq!(
                    *left,
                    current_path(vec![Selector::Name("price".to_string())])
                );
                assert_eq!(*right, Expr::Literal(Literal::Number(10.0)));
            }
            other => panic!("expected Comparison expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_logical_precedence() {
        match filter_expr("$[?@.a || @.b && @.c]") {
            Expr::Logical { op, right, .. } => {
                assert_eq!(op, LogicalOp::Or);
                assert!(matches!(
                    *right,
                    Expr::Logical {
                        op: LogicalOp::And,
                        ..
                    }
                ));
            }
            other => panic!("expected Logical expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_not() {
        match filter_expr("$[?!@.archived]") {
            Expr::Not(inner) => {
                assert_eq!(
                    *inner,
                    current_path(vec![Selector::Name("archived".to_string())])
                );
            }
            other => panic!("expected Not expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_function_call() {
        match filter_expr("$[?length(@.items) > 0]") {
            Expr::Comparison { left, op, right } => {
                assert_eq!(op, CompOp::Gt);
                match *left {
                    Expr::FunctionCall { name, args } => {
                        assert_eq!(name, "length");
                        assert_eq!(args.len(), 1);
                    }
                    other => panic!("expected FunctionCall on left, got {other:?}"),
                }
                assert_eq!(*right, Expr::Literal(Literal::Number(0.0)));
            }
            other => panic!("expected Comparison expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_function_is_accepted() {
        assert!(Parser::parse("$[?(bogus(@.x))]").is_ok());
    }

    #[test]
    fn test_parse_root_aggregate_in_filter() {
        match filter_expr("$.books[?(@.price > avg($.books[*].price))]") {
            Expr::Comparison { right, .. } => match *right {
                Expr::FunctionCall { name, args } => {
                    assert_eq!(name, "avg");
                    match &args[0] {
                        Expr::Path(path) => {
                            assert_eq!(path.anchor, Anchor::Root);
                            assert!(!path.is_singular());
                        }
                        other => panic!("expected Path argument, got {other:?}"),
                    }
                }
                other => panic!("expected FunctionCall, got {other:?}"),
            },
            other => panic!("expected Comparison expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_with_literals() {
        match filter_expr("$[?@.name == \"test\" && @.value != null]") {
            Expr::Logical { left, right, .. } => {
                assert!(matches!(
                    *left,
                    Expr::Comparison { ref right, .. }
                        if **right == Expr::Literal(Literal::String("test".to_string()))
                ));
                assert!(matches!(
                    *right,
                    Expr::Comparison { op: CompOp::Ne, ref right, .. }
                        if **right == Expr::Literal(Literal::Null)
                ));
            }
            other => panic!("expected Logical expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_current_node_only() {
        assert_eq!(filter_expr("$[?@]"), Expr::CurrentNode);
    }

    #[test]
    fn test_parse_regex_match() {
        match filter_expr("$[?(@.name =~ /^j.*n$/i)]") {
            Expr::RegexMatch { value, pattern } => {
                assert_eq!(
                    *value,
                    current_path(vec![Selector::Name("name".to_string())])
                );
                assert_eq!(pattern.source, "^j.*n$");
                assert!(pattern.case_insensitive);
                assert!(pattern.regex.is_match("JOHN"));
            }
            other => panic!("expected RegexMatch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_regex() {
        let err = Parser::parse("$[?(@.name =~ /a(b/)]").unwrap_err();
        assert!(err.message.contains("invalid regex"));
        assert!(Parser::parse("$[?(@.name =~ /ab/x)]").is_err());
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        match filter_expr("$[?@.a + @.b * 2 > 10]") {
            Expr::Comparison { left, .. } => match *left {
                Expr::Arithmetic { op, right, .. } => {
                    assert_eq!(op, ArithOp::Add);
                    assert!(matches!(
                        *right,
                        Expr::Arithmetic {
                            op: ArithOp::Mul,
                            ..
                        }
                    ));
                }
                other => panic!("expected Arithmetic, got {other:?}"),
            },
            other => panic!("expected Comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_negation() {
        assert_eq!(
            filter_expr("$[?-@.a]"),
            Expr::Negate(Box::new(current_path(vec![Selector::Name(
                "a".to_string()
            )])))
        );
        assert_eq!(
            filter_expr("$[?@.a-1]"),
            Expr::Arithmetic {
                left: Box::new(current_path(vec![Selector::Name("a".to_string())])),
                op: ArithOp::Sub,
                right: Box::new(Expr::Literal(Literal::Number(1.0))),
            }
        );
    }

    #[test]
    fn test_parse_wildcard_in_filter_path_is_not_multiplication() {
        assert_eq!(
            filter_expr("$[?@.*]"),
            current_path(vec![Selector::Wildcard])
        );
    }
}
