//! Recursive-descent / precedence-climbing parser.
//!
//! Builds an [`ExpressionNode`] tree directly from the token stream; there
//! is no separate concrete syntax tree. Precedence follows the eleven-level
//! table (unary/indexer/path tightest, `implies` loosest); every binary
//! operator is left-associative except `implies`, which is right-associative.

use std::sync::Arc;

use crate::ast::{BinaryOp, ExpressionNode, Literal, Span, TypeOp, TypeSpecifier, UnaryOp};
use crate::error::{FhirPathError, Position, Result};
use crate::lexer::{tokenize, Spanned, Token};

/// Parse a complete FHIRPath expression from source text.
pub fn parse(source: &str) -> Result<ExpressionNode> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_implies()?;
    if let Some(tok) = parser.peek() {
        return Err(parser.unexpected(tok, "end of expression"));
    }
    Ok(expr)
}

struct Parser<'input> {
    source: &'input str,
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

/// Binding power levels, lowest first, matching the spec table (11 = loosest).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Level {
    Implies,    // 11
    OrXor,      // 10
    And,        // 9
    InContains, // 8
    Equality,   // 7
    Relational, // 6
    IsAs,       // 5
    Union,      // 4
    Additive,   // 3
    Multiplicative, // 2
}

impl<'input> Parser<'input> {
    fn peek(&self) -> Option<&Token<'input>> {
        self.tokens.get(self.pos).map(|s| &s.value)
    }

    fn peek_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(s) => Span::new(s.start, s.end),
            None => {
                let end = self.source.len();
                Span::new(end, end)
            }
        }
    }

    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn position_at(&self, offset: usize) -> Position {
        Position::from_offset(self.source, offset)
    }

    fn unexpected(&self, found: &Token<'input>, expected: &str) -> FhirPathError {
        FhirPathError::ParseError {
            expected: expected.to_string(),
            found: found.describe(),
            position: self.position_at(self.peek_span().start),
        }
    }

    fn eof_error(&self, expected: &str) -> FhirPathError {
        FhirPathError::ParseError {
            expected: expected.to_string(),
            found: "end of input".to_string(),
            position: self.position_at(self.source.len()),
        }
    }

    fn expect(&mut self, token: Token<'input>, expected: &str) -> Result<Span> {
        match self.peek() {
            Some(tok) if std::mem::discriminant(tok) == discriminant_of(&token) => {
                let span = self.peek_span();
                self.advance();
                Ok(span)
            }
            Some(tok) => Err(self.unexpected(&tok.clone(), expected)),
            None => Err(self.eof_error(expected)),
        }
    }

    fn binary_op_at(&self, level: Level) -> Option<BinaryOp> {
        match (level, self.peek()?) {
            (Level::Implies, Token::Implies) => Some(BinaryOp::Implies),
            (Level::OrXor, Token::Or) => Some(BinaryOp::Or),
            (Level::OrXor, Token::Xor) => Some(BinaryOp::Xor),
            (Level::And, Token::And) => Some(BinaryOp::And),
            (Level::InContains, Token::In) => Some(BinaryOp::In),
            (Level::InContains, Token::Contains) => Some(BinaryOp::Contains),
            (Level::Equality, Token::Eq) => Some(BinaryOp::Equal),
            (Level::Equality, Token::Ne) => Some(BinaryOp::NotEqual),
            (Level::Equality, Token::Equiv) => Some(BinaryOp::Equivalent),
            (Level::Equality, Token::NotEquiv) => Some(BinaryOp::NotEquivalent),
            (Level::Relational, Token::Lt) => Some(BinaryOp::Less),
            (Level::Relational, Token::Le) => Some(BinaryOp::LessOrEqual),
            (Level::Relational, Token::Gt) => Some(BinaryOp::Greater),
            (Level::Relational, Token::Ge) => Some(BinaryOp::GreaterOrEqual),
            (Level::Union, Token::Pipe) => Some(BinaryOp::Union),
            (Level::Additive, Token::Plus) => Some(BinaryOp::Add),
            (Level::Additive, Token::Minus) => Some(BinaryOp::Subtract),
            (Level::Additive, Token::Amp) => Some(BinaryOp::Concat),
            (Level::Multiplicative, Token::Star) => Some(BinaryOp::Multiply),
            (Level::Multiplicative, Token::Slash) => Some(BinaryOp::Divide),
            (Level::Multiplicative, Token::Div) => Some(BinaryOp::Div),
            (Level::Multiplicative, Token::Mod) => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    fn next_level(level: Level) -> Option<Level> {
        use Level::*;
        Some(match level {
            Implies => OrXor,
            OrXor => And,
            And => InContains,
            InContains => Equality,
            Equality => Relational,
            Relational => IsAs,
            IsAs => Union,
            Union => Additive,
            Additive => Multiplicative,
            Multiplicative => return None,
        })
    }

    /// `implies` is the only right-associative level; every other binary
    /// level parses left-to-right by looping.
    fn parse_level(&mut self, level: Level) -> Result<ExpressionNode> {
        if level == Level::IsAs {
            return self.parse_is_as();
        }
        let Some(inner) = Self::next_level(level) else {
            return self.parse_unary();
        };

        if level == Level::Implies {
            let lhs = self.parse_level(inner)?;
            if self.binary_op_at(level).is_some() {
                self.advance();
                let rhs = self.parse_level(level)?; // right-associative
                let span = lhs.span().to(rhs.span());
                return Ok(ExpressionNode::Binary {
                    op: BinaryOp::Implies,
                    lhs: Arc::new(lhs),
                    rhs: Arc::new(rhs),
                    span,
                });
            }
            return Ok(lhs);
        }

        let mut lhs = self.parse_level(inner)?;
        while let Some(op) = self.binary_op_at(level) {
            self.advance();
            let rhs = self.parse_level(inner)?;
            let span = lhs.span().to(rhs.span());
            lhs = ExpressionNode::Binary {
                op,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_implies(&mut self) -> Result<ExpressionNode> {
        self.parse_level(Level::Implies)
    }

    fn parse_is_as(&mut self) -> Result<ExpressionNode> {
        let mut lhs = self.parse_level(Level::Union)?;
        loop {
            let op = match self.peek() {
                Some(Token::Is) => TypeOp::Is,
                Some(Token::As) => TypeOp::As,
                _ => break,
            };
            self.advance();
            let target = self.parse_type_specifier()?;
            let span = lhs.span();
            lhs = ExpressionNode::TypeExpr {
                op,
                operand: Arc::new(lhs),
                target,
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_type_specifier(&mut self) -> Result<TypeSpecifier> {
        let first = match self.advance() {
            Some(Spanned {
                value: Token::Identifier(name),
                ..
            }) => name.to_string(),
            Some(spanned) => return Err(self.unexpected(&spanned.value, "type name")),
            None => return Err(self.eof_error("type name")),
        };
        if matches!(self.peek(), Some(Token::Dot)) {
            self.advance();
            let second = match self.advance() {
                Some(Spanned {
                    value: Token::Identifier(name),
                    ..
                }) => name.to_string(),
                Some(spanned) => return Err(self.unexpected(&spanned.value, "type name")),
                None => return Err(self.eof_error("type name")),
            };
            Ok(TypeSpecifier {
                namespace: Some(first),
                name: second,
            })
        } else {
            Ok(TypeSpecifier {
                namespace: None,
                name: first,
            })
        }
    }

    fn parse_unary(&mut self) -> Result<ExpressionNode> {
        let start = self.peek_span();
        let op = match self.peek() {
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Minus) => Some(UnaryOp::Negate),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.to(operand.span());
            return Ok(ExpressionNode::Unary {
                op,
                operand: Arc::new(operand),
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ExpressionNode> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let step = self.parse_path_step()?;
                    let span = expr.span().to(step.span());
                    expr = ExpressionNode::Path {
                        base: Arc::new(expr),
                        step: Arc::new(step),
                        span,
                    };
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_implies()?;
                    let end = self.expect(Token::RBracket, "']'")?;
                    let span = expr.span().to(end);
                    expr = ExpressionNode::Indexer {
                        base: Arc::new(expr),
                        index: Arc::new(index),
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// A single step after `.`: either a bare member name or a function call.
    fn parse_path_step(&mut self) -> Result<ExpressionNode> {
        let start = self.peek_span();
        let name = match self.advance() {
            Some(Spanned {
                value: Token::Identifier(name),
                ..
            }) => name.to_string(),
            Some(Spanned { value: Token::As, .. }) => "as".to_string(),
            Some(Spanned { value: Token::Is, .. }) => "is".to_string(),
            Some(Spanned {
                value: Token::DollarThis,
                ..
            }) => return Ok(ExpressionNode::This(start)),
            Some(spanned) => return Err(self.unexpected(&spanned.value, "member name")),
            None => return Err(self.eof_error("member name")),
        };
        if matches!(self.peek(), Some(Token::LParen)) {
            return self.parse_function_call(name, start);
        }
        Ok(ExpressionNode::Identifier { name, span: start })
    }

    fn parse_function_call(&mut self, name: String, start: Span) -> Result<ExpressionNode> {
        self.advance(); // '('
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            loop {
                args.push(self.parse_implies()?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        let end = self.expect(Token::RParen, "')'")?;
        Ok(ExpressionNode::FunctionCall {
            name,
            args,
            span: start.to(end),
        })
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode> {
        let span = self.peek_span();
        let spanned = match self.advance() {
            Some(spanned) => spanned,
            None => return Err(self.eof_error("expression")),
        };
        match spanned.value {
            Token::Integer(n) => Ok(ExpressionNode::Literal {
                value: Literal::Integer(n),
                span,
            }),
            Token::Decimal(s) => Ok(ExpressionNode::Literal {
                value: Literal::Decimal(s.to_string()),
                span,
            }),
            Token::String(s) => Ok(ExpressionNode::Literal {
                value: Literal::String(s),
                span,
            }),
            Token::True => Ok(ExpressionNode::Literal {
                value: Literal::Boolean(true),
                span,
            }),
            Token::False => Ok(ExpressionNode::Literal {
                value: Literal::Boolean(false),
                span,
            }),
            Token::Date(s) => Ok(ExpressionNode::Literal {
                value: Literal::Date(s.to_string()),
                span,
            }),
            Token::DateTime(s) => Ok(ExpressionNode::Literal {
                value: Literal::DateTime(s.to_string()),
                span,
            }),
            Token::Time(s) => Ok(ExpressionNode::Literal {
                value: Literal::Time(s.to_string()),
                span,
            }),
            Token::Quantity { value, unit } => Ok(ExpressionNode::Literal {
                value: Literal::Quantity {
                    value: value.to_string(),
                    unit: unit.to_string(),
                },
                span,
            }),
            Token::DollarThis => Ok(ExpressionNode::This(span)),
            Token::DollarIndex => Ok(ExpressionNode::Index(span)),
            Token::DollarTotal => Ok(ExpressionNode::Total(span)),
            Token::ExternalVariable(name) => Ok(ExpressionNode::Variable {
                name: name.to_string(),
                span,
            }),
            Token::Identifier(name) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.parse_function_call(name.to_string(), span)
                } else {
                    Ok(ExpressionNode::Identifier {
                        name: name.to_string(),
                        span,
                    })
                }
            }
            Token::Not => {
                // `not` is a function name, not a prefix operator, per grammar.
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.parse_function_call("not".to_string(), span)
                } else {
                    Ok(ExpressionNode::Identifier {
                        name: "not".to_string(),
                        span,
                    })
                }
            }
            Token::LParen => {
                let inner = self.parse_implies()?;
                let end = self.expect(Token::RParen, "')'")?;
                Ok(ExpressionNode::Parenthesized {
                    inner: Arc::new(inner),
                    span: span.to(end),
                })
            }
            Token::LBrace => {
                let end = self.expect(Token::RBrace, "'}'")?;
                Ok(ExpressionNode::Literal {
                    value: Literal::Empty,
                    span: span.to(end),
                })
            }
            other => Err(self.unexpected(&other, "expression")),
        }
    }
}

fn discriminant_of<'input>(token: &Token<'input>) -> std::mem::Discriminant<Token<'input>> {
    std::mem::discriminant(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> ExpressionNode {
        parse(src).unwrap_or_else(|e| panic!("failed to parse {src:?}: {e}"))
    }

    #[test]
    fn simple_path() {
        let expr = parse_ok("Patient.name.given");
        match expr {
            ExpressionNode::Path { .. } => {}
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn precedence_additive_before_comparison() {
        let expr = parse_ok("1 + 2 < 5");
        match expr {
            ExpressionNode::Binary {
                op: BinaryOp::Less, ..
            } => {}
            other => panic!("expected top-level Less, got {other:?}"),
        }
    }

    #[test]
    fn implies_is_right_associative() {
        // a implies b implies c  ==  a implies (b implies c)
        let expr = parse_ok("a implies b implies c");
        if let ExpressionNode::Binary {
            op: BinaryOp::Implies,
            rhs,
            ..
        } = expr
        {
            assert!(matches!(
                *rhs,
                ExpressionNode::Binary {
                    op: BinaryOp::Implies,
                    ..
                }
            ));
        } else {
            panic!("expected Implies");
        }
    }

    #[test]
    fn unary_minus_binds_tighter_than_multiply() {
        let expr = parse_ok("-2 * 3");
        match expr {
            ExpressionNode::Binary {
                op: BinaryOp::Multiply,
                lhs,
                ..
            } => assert!(matches!(*lhs, ExpressionNode::Unary { .. })),
            other => panic!("expected Multiply at top, got {other:?}"),
        }
    }

    #[test]
    fn function_call_with_predicate() {
        let expr = parse_ok("name.where(use = 'official')");
        match expr {
            ExpressionNode::Path { step, .. } => {
                assert!(matches!(*step, ExpressionNode::FunctionCall { .. }));
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn indexer_and_type_operators() {
        let expr = parse_ok("name[0] is FHIR.HumanName");
        assert!(matches!(
            expr,
            ExpressionNode::TypeExpr {
                op: TypeOp::Is,
                ..
            }
        ));
    }

    #[test]
    fn unterminated_paren_is_parse_error() {
        let err = parse("(1 + 2").unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn trailing_garbage_is_parse_error() {
        let err = parse("1 2").unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }
}
