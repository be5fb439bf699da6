//! Calculator tool — evaluates mathematical expressions.
//!
//! Supports `+`, `-`, `*`, `/`, parentheses, and unary negation, using a
//! two-stack precedence evaluator. No dependencies beyond std.

use async_trait::async_trait;
use serde_json::{Map, Value};
use vireo_core::error::ToolError;
use vireo_core::tool::Tool;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The mathematical expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let expr = arguments
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        let value = evaluate(expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason,
        })?;

        // Format nicely: no trailing .0 for integral results.
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(format!("{}", value as i64))
        } else {
            Ok(format!("{value}"))
        }
    }
}

// ── Two-stack precedence evaluator ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    LParen,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::LParen => 0,
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
            Op::Neg => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Operator(char),
    LParen,
    RParen,
}

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }

    let mut values: Vec<f64> = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    // Tracks whether the previous token completed an operand, which is how
    // a unary minus is told apart from a binary one.
    let mut after_operand = false;

    for token in tokens {
        match token {
            Token::Number(n) => {
                if after_operand {
                    return Err("Expected an operator before number".into());
                }
                values.push(n);
                after_operand = true;
            }
            Token::LParen => {
                if after_operand {
                    return Err("Expected an operator before '('".into());
                }
                ops.push(Op::LParen);
            }
            Token::RParen => {
                if !after_operand {
                    return Err("Unexpected ')'".into());
                }
                loop {
                    match ops.pop() {
                        Some(Op::LParen) => break,
                        Some(op) => apply(op, &mut values)?,
                        None => return Err("Unbalanced parentheses".into()),
                    }
                }
            }
            Token::Operator(c) => {
                let op = match (c, after_operand) {
                    ('-', false) => Op::Neg,
                    (_, false) => return Err(format!("Unexpected operator '{c}'")),
                    ('+', true) => Op::Add,
                    ('-', true) => Op::Sub,
                    ('*', true) => Op::Mul,
                    ('/', true) => Op::Div,
                    _ => unreachable!(),
                };
                // Negation is right-associative, binary operators left.
                while let Some(&top) = ops.last() {
                    let pops = if op == Op::Neg {
                        top.precedence() > op.precedence()
                    } else {
                        top.precedence() >= op.precedence()
                    };
                    if top == Op::LParen || !pops {
                        break;
                    }
                    ops.pop();
                    apply(top, &mut values)?;
                }
                ops.push(op);
                after_operand = false;
            }
        }
    }

    if !after_operand {
        return Err("Expression ends with an operator".into());
    }
    while let Some(op) = ops.pop() {
        if op == Op::LParen {
            return Err("Unbalanced parentheses".into());
        }
        apply(op, &mut values)?;
    }

    match values.as_slice() {
        [result] => Ok(*result),
        _ => Err("Malformed expression".into()),
    }
}

fn apply(op: Op, values: &mut Vec<f64>) -> Result<(), String> {
    if op == Op::Neg {
        let v = values.pop().ok_or("Missing operand")?;
        values.push(-v);
        return Ok(());
    }
    let b = values.pop().ok_or("Missing operand")?;
    let a = values.pop().ok_or("Missing operand")?;
    let result = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => {
            if b == 0.0 {
                return Err("Division by zero".into());
            }
            a / b
        }
        Op::Neg | Op::LParen => unreachable!(),
    };
    values.push(result);
    Ok(())
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            c @ ('+' | '-' | '*' | '/') => {
                tokens.push(Token::Operator(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number: f64 = literal
                    .parse()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Number(number));
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(json: Value) -> Map<String, Value> {
        json.as_object().cloned().unwrap()
    }

    #[test]
    fn precedence_and_parens() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert_eq!(evaluate("1 - 2 - 3").unwrap(), -4.0);
    }

    #[test]
    fn unary_negation() {
        assert_eq!(evaluate("-5").unwrap(), -5.0);
        assert_eq!(evaluate("4 * -2").unwrap(), -8.0);
        assert_eq!(evaluate("-(2 + 3)").unwrap(), -5.0);
        assert_eq!(evaluate("--3").unwrap(), 3.0);
    }

    #[test]
    fn malformed_expressions() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(2 + 3").is_err());
        assert!(evaluate("2 3").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("2 $ 3").is_err());
    }

    #[tokio::test]
    async fn execute_formats_integral_results() {
        let tool = CalculatorTool;
        let output = tool
            .execute(args(serde_json::json!({"expression": "(2 + 3) * 4"})))
            .await
            .unwrap();
        assert_eq!(output, "20");
    }

    #[tokio::test]
    async fn execute_keeps_fractional_results() {
        let tool = CalculatorTool;
        let output = tool
            .execute(args(serde_json::json!({"expression": "10 / 4"})))
            .await
            .unwrap();
        assert_eq!(output, "2.5");
    }

    #[tokio::test]
    async fn missing_expression_is_invalid_arguments() {
        let tool = CalculatorTool;
        let err = tool.execute(Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
