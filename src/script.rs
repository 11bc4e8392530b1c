//! Reference Payload Interpreter
//!
//! A small assignment language for driving the bridge without a real host runtime. Scripts see
//! three bindings: `params` (read-only request parameters), `result` (the command's result
//! container) and `host` (a key/value store standing in for host application state, persisted
//! across commands on the privileged thread).
//!
//! ```text
//! host['count'] = 1
//! result['x'] = params['a'] * 2 + 1
//! fail 'bad input'
//! ```
//!
//! Integer arithmetic stays integral where the result is exact.

pub mod parser;

use crate::dispatcher::{Namespace, PayloadInterpreter, ScriptFault};
use parser::{BinaryOp, Expr, Statement, Target};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Host application state reachable from scripts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostState {
    values: BTreeMap<String, Value>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

/// Interpreter for the assignment language
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptInterpreter;

impl PayloadInterpreter for ScriptInterpreter {
    type Environment = HostState;

    fn interpret(
        &self,
        script: &str,
        namespace: &mut Namespace<'_, HostState>,
    ) -> Result<(), ScriptFault> {
        let program = parser::parse_program(script)
            .map_err(|e| ScriptFault::new(format!("SyntaxError: {}", e.trim_end())))?;

        for located in &program.statements {
            execute(&located.statement, namespace)
                .map_err(|e| ScriptFault::new(format!("line {}: {}", located.line, e)))?;
        }
        Ok(())
    }
}

fn execute(statement: &Statement, ns: &mut Namespace<'_, HostState>) -> Result<(), String> {
    match statement {
        Statement::Assign(target, expr) => {
            let value = evaluate(expr, ns)?;
            assign(target, value, ns)
        }
        Statement::Fail(expr) => {
            let message = match evaluate(expr, ns)? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Err(format!("ScriptError: {}", message))
        }
        Statement::Loop => loop {
            std::hint::spin_loop();
        },
    }
}

fn assign(target: &Target, value: Value, ns: &mut Namespace<'_, HostState>) -> Result<(), String> {
    match target {
        Target::Result => {
            ns.result = value;
            Ok(())
        }
        Target::ResultKey(key) => match &mut ns.result {
            Value::Object(map) => {
                map.insert(key.clone(), value);
                Ok(())
            }
            other => Err(format!(
                "TypeError: result is {}, not an object",
                type_name(other)
            )),
        },
        Target::HostKey(key) => {
            ns.environment.set(key.clone(), value);
            Ok(())
        }
    }
}

fn evaluate(expr: &Expr, ns: &Namespace<'_, HostState>) -> Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Params => Ok(Value::Object(ns.params.clone())),
        Expr::Param(key) => lookup(ns.params, key, "params"),
        Expr::Result => Ok(ns.result.clone()),
        Expr::ResultKey(key) => match &ns.result {
            Value::Object(map) => lookup(map, key, "result"),
            other => Err(format!(
                "TypeError: result is {}, not an object",
                type_name(other)
            )),
        },
        Expr::HostKey(key) => ns
            .environment
            .get(key)
            .cloned()
            .ok_or_else(|| format!("KeyError: host['{}']", key)),
        Expr::Neg(inner) => negate(evaluate(inner, ns)?),
        Expr::Chain(first, rest) => rest.iter().try_fold(evaluate(first, ns)?, |acc, (op, rhs)| {
            binary(*op, acc, evaluate(rhs, ns)?)
        }),
    }
}

fn lookup(map: &Map<String, Value>, key: &str, binding: &str) -> Result<Value, String> {
    map.get(key)
        .cloned()
        .ok_or_else(|| format!("KeyError: {}['{}']", binding, key))
}

fn negate(value: Value) -> Result<Value, String> {
    if let Some(i) = value.as_i64() {
        if let Some(n) = i.checked_neg() {
            return Ok(Value::from(n));
        }
    }
    match value.as_f64() {
        Some(f) => float(-f),
        None => Err(format!("TypeError: bad operand for unary -: {}", type_name(&value))),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, String> {
    if let (BinaryOp::Add, Value::String(a), Value::String(b)) = (op, &lhs, &rhs) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }

    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(format!(
            "TypeError: unsupported operand types for {}: {} and {}",
            symbol(op),
            type_name(&lhs),
            type_name(&rhs)
        ));
    };
    if op == BinaryOp::Div && b == 0.0 {
        return Err("ZeroDivisionError: division by zero".to_string());
    }

    if let (Some(x), Some(y)) = (lhs.as_i64(), rhs.as_i64()) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => x.checked_rem(y).filter(|r| *r == 0).and_then(|_| x.checked_div(y)),
        };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }

    float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
    })
}

fn float(f: f64) -> Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "OverflowError: result is not a finite number".to_string())
}

fn symbol(op: BinaryOp) -> char {
    match op {
        BinaryOp::Add => '+',
        BinaryOp::Sub => '-',
        BinaryOp::Mul => '*',
        BinaryOp::Div => '/',
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
