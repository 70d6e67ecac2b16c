//! Condition expressions for logic nodes.
//!
//! A deliberately small language: literals (numbers, quoted strings, true/
//! false), dotted paths into the node's inputs (`input`, `input.length`,
//! `payload.user.name`), comparisons (`== != > >= < <=`), boolean `&&`,
//! `||`, `!` and parentheses. `.length` works on strings, arrays and
//! objects. Anything unparsable is an error, never silently false.

use serde_json::Value;
use std::fmt;

use super::NodeInputs;

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionError(pub String);

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConditionError {}

type CondResult<T> = std::result::Result<T, ConditionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Parsed condition AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> CondResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::And);
                    i += 2;
                } else {
                    return Err(ConditionError("expected '&&'".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::Or);
                    i += 2;
                } else {
                    return Err(ConditionError("expected '||'".to_string()));
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Cmp(CmpOp::Eq));
                    i += 2;
                } else {
                    return Err(ConditionError("expected '==' (single '=' is not assignment)".to_string()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Cmp(CmpOp::Ne));
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Cmp(CmpOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Cmp(CmpOp::Gt));
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Cmp(CmpOp::Le));
                    i += 2;
                } else {
                    tokens.push(Token::Cmp(CmpOp::Lt));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                        None => return Err(ConditionError("unterminated string literal".to_string())),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '0'..='9' | '-' => {
                let start = i;
                if c == '-' {
                    i += 1;
                    if !matches!(chars.get(i), Some('0'..='9')) {
                        return Err(ConditionError("expected digit after '-'".to_string()));
                    }
                }
                while matches!(chars.get(i), Some('0'..='9') | Some('.')) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while matches!(chars.get(i), Some(&ch) if ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == '-')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(word));
            }
            other => {
                return Err(ConditionError(format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // or := and ('||' and)*
    fn parse_or(&mut self) -> CondResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // and := cmp ('&&' cmp)*
    fn parse_and(&mut self) -> CondResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // cmp := unary (cmp_op unary)?
    fn parse_comparison(&mut self) -> CondResult<Expr> {
        let left = self.parse_unary()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.next();
            let right = self.parse_unary()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    // unary := '!' unary | primary
    fn parse_unary(&mut self) -> CondResult<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> CondResult<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => Ok(Expr::Path(word.split('.').map(str::to_string).collect())),
            },
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ConditionError("expected ')'".to_string())),
                }
            }
            Some(other) => Err(ConditionError(format!("unexpected token {:?}", other))),
            None => Err(ConditionError("unexpected end of expression".to_string())),
        }
    }
}

/// Parses a condition expression into an AST.
pub fn parse(source: &str) -> CondResult<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ConditionError("empty condition".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ConditionError(format!(
            "trailing tokens after expression (at position {})",
            parser.pos
        )));
    }
    Ok(expr)
}

/// Resolves a dotted path against the node inputs.
///
/// The first segment selects an input: a handle name if one matches, with
/// `input` falling back to the primary input. Later segments index into the
/// value; `length` on a string, array or object yields its size.
fn resolve_path(path: &[String], inputs: &NodeInputs) -> CondResult<Value> {
    let head = &path[0];
    let mut current = match inputs.get(head) {
        Some(v) => v.clone(),
        None if head == "input" => inputs.primary().cloned().unwrap_or(Value::Null),
        None => {
            return Err(ConditionError(format!(
                "unknown input '{}' in condition",
                head
            )))
        }
    };

    for segment in &path[1..] {
        if segment == "length" {
            let len = match &current {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::Null => 0,
                other => {
                    return Err(ConditionError(format!(
                        "'length' is not defined for {}",
                        type_name(other)
                    )))
                }
            };
            current = Value::Number(len.into());
            continue;
        }
        current = match &current {
            Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }

    Ok(current)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truthiness for a bare (non-comparison) operand.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> CondResult<bool> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match ordering {
        Some(ord) => Ok(match op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
        }),
        // Values of different types are equal to nothing, ordered with nothing.
        None => match op {
            CmpOp::Eq => Ok(false),
            CmpOp::Ne => Ok(true),
            _ => Err(ConditionError(format!(
                "cannot order {} against {}",
                type_name(left),
                type_name(right)
            ))),
        },
    }
}

fn eval_value(expr: &Expr, inputs: &NodeInputs) -> CondResult<Value> {
    match expr {
        Expr::Number(n) => Ok(serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Path(path) => resolve_path(path, inputs),
        _ => Ok(Value::Bool(eval(expr, inputs)?)),
    }
}

/// Evaluates a parsed condition against the node inputs.
pub fn eval(expr: &Expr, inputs: &NodeInputs) -> CondResult<bool> {
    match expr {
        Expr::Not(inner) => Ok(!eval(inner, inputs)?),
        Expr::And(a, b) => Ok(eval(a, inputs)? && eval(b, inputs)?),
        Expr::Or(a, b) => Ok(eval(a, inputs)? || eval(b, inputs)?),
        Expr::Compare(left, op, right) => {
            let left = eval_value(left, inputs)?;
            let right = eval_value(right, inputs)?;
            compare(&left, *op, &right)
        }
        other => Ok(truthy(&eval_value(other, inputs)?)),
    }
}

/// Parses and evaluates in one step.
pub fn evaluate(source: &str, inputs: &NodeInputs) -> CondResult<bool> {
    let expr = parse(source)?;
    eval(&expr, inputs)
}
