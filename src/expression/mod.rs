//! Numeric and boolean expressions
//!
//! Evaluated by `SetSymbol` once placeholders have been rendered, so an
//! expression only ever sees literals. Operators, loosest binding first:
//!
//! ```text
//! ||  or
//! &&  and
//! !   not
//! ==  !=  <  <=  >  >=
//! +  -
//! *  /  %
//! unary -
//! ^               right associative
//! ```
//!
//! Numbers are `f64`. Arithmetic and ordering need numbers, the logical
//! operators need booleans, and equality needs two operands of the same kind.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;
use tracing::trace;

use crate::errors::{ExpressionError, ExpressionResult};
use crate::frame::FieldValue;

/// Result of an evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluated {
    Number(f64),
    Boolean(bool),
}

impl Evaluated {
    fn number(self, operator: &'static str) -> ExpressionResult<f64> {
        match self {
            Evaluated::Number(n) => Ok(n),
            Evaluated::Boolean(_) => Err(ExpressionError::TypeMismatch {
                operator,
                expected: "numeric",
            }),
        }
    }

    fn boolean(self, operator: &'static str) -> ExpressionResult<bool> {
        match self {
            Evaluated::Boolean(b) => Ok(b),
            Evaluated::Number(_) => Err(ExpressionError::TypeMismatch {
                operator,
                expected: "boolean",
            }),
        }
    }
}

impl From<Evaluated> for FieldValue {
    fn from(value: Evaluated) -> Self {
        match value {
            Evaluated::Number(n) => FieldValue::Double(n),
            Evaluated::Boolean(b) => FieldValue::Bool(b),
        }
    }
}

impl fmt::Display for Evaluated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluated::Number(n) => write!(f, "{n}"),
            Evaluated::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Boolean(bool),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
}

impl Token {
    fn symbol(&self) -> &'static str {
        match self {
            Token::Number(_) => "number",
            Token::Boolean(_) => "boolean",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Equal => "==",
            Token::NotEqual => "!=",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Not => "!",
            Token::LeftParen => "(",
            Token::RightParen => ")",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Boolean(b) => write!(f, "{b}"),
            other => f.write_str(other.symbol()),
        }
    }
}

/// Evaluate a numeric or boolean expression
pub fn evaluate(expression: &str) -> ExpressionResult<Evaluated> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };

    let value = parser.or()?;
    if let Some((token, position)) = tokens.get(parser.pos) {
        return Err(ExpressionError::UnexpectedToken {
            token: token.to_string(),
            position: *position,
        });
    }

    trace!("Evaluated '{}' to {}", expression, value);
    Ok(value)
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    chars.next_if(|&(_, c)| c == expected).is_some()
}

fn tokenize(expression: &str) -> ExpressionResult<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '=' => {
                next_is(&mut chars, '=');
                Token::Equal
            }
            '!' if next_is(&mut chars, '=') => Token::NotEqual,
            '!' => Token::Not,
            '<' if next_is(&mut chars, '=') => Token::LessEqual,
            '<' => Token::Less,
            '>' if next_is(&mut chars, '=') => Token::GreaterEqual,
            '>' => Token::Greater,
            '&' if next_is(&mut chars, '&') => Token::And,
            '|' if next_is(&mut chars, '|') => Token::Or,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = position + c.len_utf8();
                while let Some((i, n)) = chars.next_if(|&(_, n)| n.is_ascii_digit() || n == '.') {
                    end = i + n.len_utf8();
                }
                let text = &expression[position..end];
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::UnexpectedToken {
                        token: text.to_string(),
                        position,
                    })?;
                Token::Number(number)
            }
            c if c.is_alphabetic() => {
                let mut end = position + c.len_utf8();
                while let Some((i, n)) = chars.next_if(|&(_, n)| n.is_alphanumeric() || n == '_') {
                    end = i + n.len_utf8();
                }
                let word = &expression[position..end];
                match word.to_ascii_lowercase().as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => {
                        return Err(ExpressionError::UnexpectedToken {
                            token: word.to_string(),
                            position,
                        });
                    }
                }
            }
            character => {
                return Err(ExpressionError::UnexpectedCharacter { character, position });
            }
        };
        tokens.push((token, position));
    }

    Ok(tokens)
}

/// Recursive descent over the token list, one method per precedence level
struct Parser<'a> {
    tokens: &'a [(Token, usize)],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn advance_if(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume the next token if it is one of `candidates`
    fn advance_any(&mut self, candidates: &[Token]) -> Option<Token> {
        let token = self.peek().filter(|t| candidates.contains(*t)).cloned()?;
        self.pos += 1;
        Some(token)
    }

    fn unexpected(&self) -> ExpressionError {
        match self.tokens.get(self.pos) {
            Some((token, position)) => ExpressionError::UnexpectedToken {
                token: token.to_string(),
                position: *position,
            },
            None => ExpressionError::UnexpectedEnd,
        }
    }

    fn or(&mut self) -> ExpressionResult<Evaluated> {
        let mut left = self.and()?;
        while self.advance_if(&Token::Or) {
            let right = self.and()?;
            left = Evaluated::Boolean(left.boolean("||")? || right.boolean("||")?);
        }
        Ok(left)
    }

    fn and(&mut self) -> ExpressionResult<Evaluated> {
        let mut left = self.not()?;
        while self.advance_if(&Token::And) {
            let right = self.not()?;
            left = Evaluated::Boolean(left.boolean("&&")? && right.boolean("&&")?);
        }
        Ok(left)
    }

    fn not(&mut self) -> ExpressionResult<Evaluated> {
        if self.advance_if(&Token::Not) {
            let operand = self.not()?;
            return Ok(Evaluated::Boolean(!operand.boolean("!")?));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ExpressionResult<Evaluated> {
        let left = self.additive()?;
        let Some(operator) = self.advance_any(&[
            Token::Equal,
            Token::NotEqual,
            Token::Less,
            Token::LessEqual,
            Token::Greater,
            Token::GreaterEqual,
        ]) else {
            return Ok(left);
        };
        let right = self.additive()?;
        let symbol = operator.symbol();

        let result = match operator {
            Token::Equal => equal(left, right, symbol)?,
            Token::NotEqual => !equal(left, right, symbol)?,
            Token::Less => left.number(symbol)? < right.number(symbol)?,
            Token::LessEqual => left.number(symbol)? <= right.number(symbol)?,
            Token::Greater => left.number(symbol)? > right.number(symbol)?,
            _ => left.number(symbol)? >= right.number(symbol)?,
        };
        Ok(Evaluated::Boolean(result))
    }

    fn additive(&mut self) -> ExpressionResult<Evaluated> {
        let mut left = self.term()?;
        while let Some(operator) = self.advance_any(&[Token::Plus, Token::Minus]) {
            let symbol = operator.symbol();
            let (a, b) = (left.number(symbol)?, self.term()?.number(symbol)?);
            left = Evaluated::Number(if operator == Token::Plus { a + b } else { a - b });
        }
        Ok(left)
    }

    fn term(&mut self) -> ExpressionResult<Evaluated> {
        let mut left = self.unary()?;
        while let Some(operator) = self.advance_any(&[Token::Star, Token::Slash, Token::Percent]) {
            let symbol = operator.symbol();
            let (a, b) = (left.number(symbol)?, self.unary()?.number(symbol)?);
            let value = match operator {
                Token::Star => a * b,
                _ if b == 0.0 => return Err(ExpressionError::DivisionByZero),
                Token::Slash => a / b,
                _ => a % b,
            };
            left = Evaluated::Number(value);
        }
        Ok(left)
    }

    fn unary(&mut self) -> ExpressionResult<Evaluated> {
        if self.advance_if(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Evaluated::Number(-operand.number("-")?));
        }
        if self.advance_if(&Token::Plus) {
            let operand = self.unary()?;
            return Ok(Evaluated::Number(operand.number("+")?));
        }
        self.power()
    }

    fn power(&mut self) -> ExpressionResult<Evaluated> {
        let base = self.primary()?;
        if self.advance_if(&Token::Caret) {
            let exponent = self.unary()?;
            return Ok(Evaluated::Number(base.number("^")?.powf(exponent.number("^")?)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> ExpressionResult<Evaluated> {
        let value = match self.peek() {
            Some(Token::Number(n)) => Evaluated::Number(*n),
            Some(Token::Boolean(b)) => Evaluated::Boolean(*b),
            Some(Token::LeftParen) => {
                self.pos += 1;
                let inner = self.or()?;
                if !self.advance_if(&Token::RightParen) {
                    return Err(self.unexpected());
                }
                return Ok(inner);
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(value)
    }
}

fn equal(left: Evaluated, right: Evaluated, operator: &'static str) -> ExpressionResult<bool> {
    match (left, right) {
        (Evaluated::Number(a), Evaluated::Number(b)) => Ok(a == b),
        (Evaluated::Boolean(a), Evaluated::Boolean(b)) => Ok(a == b),
        _ => Err(ExpressionError::TypeMismatch {
            operator,
            expected: "matching",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("7 / 2", 3.5)]
    #[case("10 % 4", 2.0)]
    #[case("2 ^ 3 ^ 2", 512.0)]
    #[case("-2 ^ 2", -4.0)]
    #[case("10 - 4 - 3", 3.0)]
    #[case(" 0.5*4 ", 2.0)]
    fn test_numeric_expressions(#[case] expression: &str, #[case] expected: f64) {
        assert_eq!(evaluate(expression).unwrap(), Evaluated::Number(expected));
    }

    #[rstest]
    #[case("3 > 2 && 1 == 1", true)]
    #[case("!(1 < 2) || false", false)]
    #[case("true and not false", true)]
    #[case("2 >= 2", true)]
    #[case("1 != 1", false)]
    #[case("1 + 1 = 2", true)]
    #[case("TRUE == false", false)]
    fn test_boolean_expressions(#[case] expression: &str, #[case] expected: bool) {
        assert_eq!(evaluate(expression).unwrap(), Evaluated::Boolean(expected));
    }

    #[test]
    fn test_invalid_expressions() {
        assert_eq!(evaluate("1 +"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(evaluate("1 / 0"), Err(ExpressionError::DivisionByZero));
        assert_eq!(
            evaluate("1 )"),
            Err(ExpressionError::UnexpectedToken {
                token: ")".to_string(),
                position: 2
            })
        );
        assert_eq!(
            evaluate("1 & 2"),
            Err(ExpressionError::UnexpectedCharacter {
                character: '&',
                position: 2
            })
        );
        assert!(matches!(
            evaluate("true + 1"),
            Err(ExpressionError::TypeMismatch { operator: "+", .. })
        ));
        assert!(matches!(
            evaluate("1 == true"),
            Err(ExpressionError::TypeMismatch { operator: "==", .. })
        ));
        assert!(matches!(evaluate("count > 2"), Err(ExpressionError::UnexpectedToken { .. })));
    }

    #[test]
    fn test_results_convert_to_field_values() {
        assert_eq!(FieldValue::from(Evaluated::Number(1.5)), FieldValue::Double(1.5));
        assert_eq!(FieldValue::from(Evaluated::Boolean(true)), FieldValue::Bool(true));
    }
}
