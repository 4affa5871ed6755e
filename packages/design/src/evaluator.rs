//! Expression evaluation over a [`Namespace`].
//!
//! [`SexprEvaluator`] understands prefix arithmetic over variable codes and
//! numbers:
//!
//! ```text
//! B01001001
//! (+ B01001003 B01001004 B01001005)
//! (/ (+ B15003022 B15003023) B15003001)
//! (* 100 (/ B17001002 B17001001))
//! ```
//!
//! `+` and `*` take one or more arguments; `-` and `/` take two or more and
//! fold left. The result must be an estimate; an expression that reduces
//! to a plain number is rejected.

use geo_profile_estimate::{Estimate, Operand};

use crate::EvalError;
use crate::namespace::Namespace;

/// Evaluates data point expressions.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates `expression` with variables looked up in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] if the expression is invalid, a variable is
    /// missing, or the arithmetic fails.
    fn evaluate(&self, expression: &str, namespace: &Namespace<'_>) -> Result<Estimate, EvalError>;

    /// Every variable code `expression` reads, in first-use order.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Parse`] if the expression is invalid.
    fn extract_variables(&self, expression: &str) -> Result<Vec<String>, EvalError>;
}

/// Prefix-notation arithmetic evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SexprEvaluator;

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String),
    Call(String, Vec<Expr>),
}

impl ExpressionEvaluator for SexprEvaluator {
    fn evaluate(&self, expression: &str, namespace: &Namespace<'_>) -> Result<Estimate, EvalError> {
        let parsed = parse(expression)?;
        Ok(eval(&parsed, namespace)?.into_estimate()?)
    }

    fn extract_variables(&self, expression: &str) -> Result<Vec<String>, EvalError> {
        let parsed = parse(expression)?;
        let mut variables = Vec::new();
        collect_variables(&parsed, &mut variables);
        Ok(variables)
    }
}

fn collect_variables(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Variable(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Expr::Call(_, args) => {
            for arg in args {
                collect_variables(arg, out);
            }
        }
    }
}

fn eval(expr: &Expr, namespace: &Namespace<'_>) -> Result<Operand, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Operand::Number(*n)),
        Expr::Variable(name) => Ok(Operand::Estimate(namespace.get(name)?)),
        Expr::Call(operator, args) => {
            let (apply, min_args, expected): (
                fn(Operand, Operand) -> Result<Operand, _>,
                usize,
                &'static str,
            ) = match operator.as_str() {
                "+" => (Operand::add, 1, "at least 1 argument"),
                "*" => (Operand::multiply, 1, "at least 1 argument"),
                "-" => (Operand::subtract, 2, "at least 2 arguments"),
                "/" => (Operand::divide, 2, "at least 2 arguments"),
                _ => {
                    return Err(EvalError::UnknownOperator {
                        operator: operator.clone(),
                    });
                }
            };

            if args.len() < min_args {
                return Err(EvalError::Arity {
                    operator: operator.clone(),
                    expected,
                    count: args.len(),
                });
            }

            let mut values = args.iter().map(|arg| eval(arg, namespace));
            let mut acc = values.next().transpose()?.ok_or_else(|| EvalError::Arity {
                operator: operator.clone(),
                expected,
                count: 0,
            })?;
            for value in values {
                acc = apply(acc, value?)?;
            }
            Ok(acc)
        }
    }
}

fn parse(expression: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(expression);
    let mut position = 0;
    let expr = parse_expr(expression, &tokens, &mut position)?;

    if position != tokens.len() {
        return Err(parse_error(expression, "unexpected trailing tokens"));
    }
    Ok(expr)
}

fn tokenize(expression: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in expression.char_indices() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(&expression[s..i]);
            }
            if !c.is_whitespace() {
                tokens.push(&expression[i..i + 1]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&expression[s..]);
    }

    tokens
}

fn parse_expr(expression: &str, tokens: &[&str], position: &mut usize) -> Result<Expr, EvalError> {
    let Some(&token) = tokens.get(*position) else {
        return Err(parse_error(expression, "unexpected end of expression"));
    };
    *position += 1;

    match token {
        "(" => {
            let Some(&operator) = tokens.get(*position) else {
                return Err(parse_error(expression, "missing operator"));
            };
            if operator == "(" || operator == ")" {
                return Err(parse_error(expression, "expected an operator after `(`"));
            }
            *position += 1;

            let mut args = Vec::new();
            loop {
                match tokens.get(*position) {
                    Some(&")") => {
                        *position += 1;
                        return Ok(Expr::Call(operator.to_string(), args));
                    }
                    Some(_) => args.push(parse_expr(expression, tokens, position)?),
                    None => return Err(parse_error(expression, "unclosed `(`")),
                }
            }
        }
        ")" => Err(parse_error(expression, "unexpected `)`")),
        atom if is_numeric_literal(atom) => atom
            .parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| parse_error(expression, &format!("invalid number `{atom}`"))),
        atom => Ok(Expr::Variable(atom.to_string())),
    }
}

/// Digits with optional sign, point and exponent. Words such as `inf` or
/// `nan` are variable codes.
fn is_numeric_literal(atom: &str) -> bool {
    atom.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
        && atom.chars().any(|c| c.is_ascii_digit())
        && atom
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

fn parse_error(expression: &str, message: &str) -> EvalError {
    EvalError::Parse {
        expression: expression.to_string(),
        message: message.to_string(),
    }
}
