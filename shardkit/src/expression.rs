// shardkit/src/expression.rs
//
// Sharding-key expression parser
// Turns `modulo(cityHash64(userId),16)` style keys into an expression tree
//

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed sharding-key expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    Field(String),
    Function { name: String, args: Vec<Expression> },
}

impl Expression {
    pub fn field(name: impl Into<String>) -> Self {
        Expression::Field(name.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Field(name) => write!(f, "{}", name),
            Expression::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse a sharding key. Blank input means "no sharding key".
///
/// An argument list is either plain field names or exactly one nested call:
/// the arguments of a call are everything between its first `(` and the last
/// `)`, so `f(g(a),b)` parses as `f(g(a))`.
pub fn parse(text: &str) -> Option<Expression> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if !text.contains('(') {
        return Some(Expression::field(text));
    }

    Some(parse_function(text))
}

fn parse_function(expr: &str) -> Expression {
    let Some(open) = expr.find('(') else {
        return Expression::field(expr);
    };
    let name = &expr[..open];

    // Unterminated call: arguments run to the end of the input
    let close = expr.rfind(')').filter(|&i| i > open).unwrap_or(expr.len());
    let args_text = &expr[open + 1..close];

    if args_text.trim().is_empty() {
        return Expression::function(name, Vec::new());
    }

    if !args_text.contains('(') {
        let mut pieces: Vec<&str> = args_text.split(',').collect();
        while pieces.last().is_some_and(|piece| piece.is_empty()) {
            pieces.pop();
        }
        let args = pieces.into_iter().map(Expression::field).collect();
        return Expression::function(name, args);
    }

    Expression::function(name, vec![parse_function(args_text)])
}
