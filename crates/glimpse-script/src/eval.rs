//! Statement and expression evaluation.
//!
//! Every function returns `Result<_, Error>` and errors propagate with `?`.
//! Native host functions run under `catch_unwind`: a panic inside one leaves
//! the session in an unknown state and is reported as `Error::Internal`.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::ast::{AssignTarget, BinOp, Body, Expr, Stmt, UnOp};
use crate::builtins::MAX_SEQUENCE_LEN;
use crate::diagnostic::Diagnostic;
use crate::error::Error;
use crate::module::NativeFunction;
use crate::runtime::{Member, Runtime};
use crate::value::{Function, Value};

/// Execute top-level statements.
///
/// The result is the value of the final statement if it is an expression
/// statement, and `None` otherwise.
pub(crate) fn exec_program(stmts: &[Stmt], runtime: &mut Runtime) -> Result<Option<Value>, Error> {
    let mut last = None;
    for stmt in stmts {
        last = exec_statement(stmt, runtime)?;
    }
    Ok(last)
}

/// Execute one statement. Only expression statements produce a value.
pub(crate) fn exec_statement(stmt: &Stmt, runtime: &mut Runtime) -> Result<Option<Value>, Error> {
    match stmt {
        Stmt::Use { path, line } => {
            let namespace = path.join(".");
            if !runtime.import(&namespace)? {
                runtime.report(Diagnostic::warning(format!(
                    "line {}: namespace '{}' is already imported",
                    line, namespace
                )));
            }
            Ok(None)
        }

        Stmt::Let { name, value, line } => {
            let value = eval_expr(value, runtime)?;
            let at_top_level = runtime.frame_depth() == 0;
            if runtime.define_var(name, value) && at_top_level {
                runtime.report(Diagnostic::warning(format!(
                    "line {}: '{}' redefines an existing binding",
                    line, name
                )));
            }
            Ok(None)
        }

        Stmt::Fn(decl) => {
            let at_top_level = runtime.frame_depth() == 0;
            let func = Value::Function(Function::Script(decl.clone()));
            if runtime.define_var(&decl.name, func) && at_top_level {
                runtime.report(Diagnostic::warning(format!(
                    "function '{}' redefines an existing binding",
                    decl.name
                )));
            }
            Ok(None)
        }

        Stmt::Assign { target, value } => {
            let value = eval_expr(value, runtime)?;
            match target {
                AssignTarget::Name(name) => runtime.set_var(name, value).map_err(Error::Runtime)?,
                AssignTarget::Property { name, property } => {
                    let mut obj = match runtime.get_var(name) {
                        Some(Value::Object(obj)) => obj.clone(),
                        Some(other) => {
                            return Err(Error::type_error(format!(
                                "cannot set property '{}' on {}",
                                property,
                                other.type_name()
                            )))
                        }
                        None => return Err(Error::Undefined(name.clone())),
                    };
                    obj.set(property, value).map_err(Error::Type)?;
                    runtime
                        .set_var(name, Value::Object(obj))
                        .map_err(Error::Runtime)?;
                }
            }
            Ok(None)
        }

        Stmt::Expr(expr) => Ok(Some(eval_expr(expr, runtime)?)),
    }
}

/// Evaluate a block. Its value is that of the final expression statement,
/// or null.
fn eval_block(stmts: &[Stmt], runtime: &mut Runtime) -> Result<Value, Error> {
    let mut result = Value::Null;
    for stmt in stmts {
        result = exec_statement(stmt, runtime)?.unwrap_or_default();
    }
    Ok(result)
}

/// Evaluate an expression.
pub(crate) fn eval_expr(expr: &Expr, runtime: &mut Runtime) -> Result<Value, Error> {
    runtime.enter_expr()?;
    let result = eval_nested(expr, runtime);
    runtime.exit_expr();
    result
}

fn eval_nested(expr: &Expr, runtime: &mut Runtime) -> Result<Value, Error> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Boolean(*b)),
        Expr::Null => Ok(Value::Null),

        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, runtime)?);
            }
            Ok(Value::List(values))
        }

        Expr::Ident(name) => {
            if let Some(value) = runtime.get_var(name) {
                return Ok(value.clone());
            }
            let member = runtime.resolve_unqualified(name)?;
            member_value(name, member)
        }

        Expr::Field { object, name } => {
            // `ns.member` where `ns` is not a binding is a qualified name.
            if let Some(path) = expr.as_path() {
                if runtime.get_var(&path[0]).is_none() {
                    return eval_qualified(&path, runtime);
                }
            }
            let target = eval_expr(object, runtime)?;
            match target {
                Value::Object(obj) => obj
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::Undefined(format!("{}.{}", obj.qualified_name(), name))),
                other => Err(Error::type_error(format!(
                    "cannot access field '{}' on {}",
                    name,
                    other.type_name()
                ))),
            }
        }

        Expr::Index { object, index } => {
            let target = eval_expr(object, runtime)?;
            let index = eval_expr(index, runtime)?;
            match (&target, &index) {
                (Value::List(items), Value::Number(n)) => {
                    let i = list_index(*n, items.len())?;
                    Ok(items[i].clone())
                }
                (Value::String(s), Value::Number(n)) => {
                    let chars: Vec<char> = s.chars().collect();
                    let i = list_index(*n, chars.len())?;
                    Ok(Value::String(chars[i].to_string()))
                }
                _ => Err(Error::type_error(format!(
                    "cannot index {} with {}",
                    target.type_name(),
                    index.type_name()
                ))),
            }
        }

        Expr::Call { callee, args } => {
            let callee_value = eval_expr(callee, runtime)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(eval_expr(arg, runtime)?);
            }
            match callee_value {
                Value::Function(func) => call_function(&func, arg_values, runtime),
                other => Err(Error::type_error(format!("{} is not callable", other.type_name()))),
            }
        }

        Expr::New { path, args } => {
            let display = path.join(".");
            let member = match path.split_last() {
                Some((name, [])) => runtime.resolve_unqualified(name)?,
                Some((name, namespace)) => runtime.resolve(&namespace.join("."), name)?,
                None => None,
            };
            match member {
                Some(Member::Type(def)) => {
                    if !args.is_empty() {
                        return Err(Error::type_error(format!(
                            "constructor of '{}' takes no arguments",
                            def.qualified_name()
                        )));
                    }
                    Ok(Value::Object(def.instantiate()))
                }
                Some(Member::Function(_)) => {
                    Err(Error::type_error(format!("'{}' is a function, not a type", display)))
                }
                None => Err(Error::Undefined(format!("type '{}'", display))),
            }
        }

        Expr::If { condition, then_block, else_block } => {
            if eval_expr(condition, runtime)?.to_bool() {
                eval_block(then_block, runtime)
            } else if let Some(else_block) = else_block {
                eval_block(else_block, runtime)
            } else {
                Ok(Value::Null)
            }
        }

        Expr::Binary { op, left, right } => eval_binary(*op, left, right, runtime),

        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, runtime)?;
            match (op, value) {
                (UnOp::Not, value) => Ok(Value::Boolean(!value.to_bool())),
                (UnOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                (UnOp::Neg, other) => {
                    Err(Error::type_error(format!("cannot negate {}", other.type_name())))
                }
            }
        }
    }
}

fn list_index(n: f64, len: usize) -> Result<usize, Error> {
    if n < 0.0 || n.fract() != 0.0 || n as usize >= len {
        return Err(Error::runtime(format!("index {} out of range for length {}", n, len)));
    }
    Ok(n as usize)
}

/// Turn a resolved member into a value. Types are not values.
fn member_value(display: &str, member: Option<Member>) -> Result<Value, Error> {
    match member {
        Some(Member::Function(native)) => Ok(Value::Function(Function::Native(native))),
        Some(Member::Type(def)) => Err(Error::type_error(format!(
            "'{}' is a type; construct it with `new {}()`",
            display,
            def.qualified_name()
        ))),
        None => Err(Error::Undefined(display.to_string())),
    }
}

fn eval_qualified(path: &[String], runtime: &Runtime) -> Result<Value, Error> {
    let display = path.join(".");
    let Some((name, namespace)) = path.split_last() else {
        return Err(Error::Undefined(display));
    };
    let namespace = namespace.join(".");
    if !runtime.has_namespace(&namespace) {
        return Err(Error::Undefined(path[0].clone()));
    }
    let member = runtime.resolve(&namespace, name)?;
    member_value(&display, member)
}

fn eval_binary(op: BinOp, left: &Expr, right: &Expr, runtime: &mut Runtime) -> Result<Value, Error> {
    match op {
        BinOp::And => {
            let left = eval_expr(left, runtime)?.to_bool();
            return Ok(Value::Boolean(left && eval_expr(right, runtime)?.to_bool()));
        }
        BinOp::Or => {
            let left = eval_expr(left, runtime)?.to_bool();
            return Ok(Value::Boolean(left || eval_expr(right, runtime)?.to_bool()));
        }
        _ => {}
    }

    let left_val = eval_expr(left, runtime)?;
    let right_val = eval_expr(right, runtime)?;

    let result = match op {
        BinOp::Add => match (left_val, right_val) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::List(mut a), Value::List(b)) => {
                check_len("list", a.len() + b.len())?;
                a.extend(b);
                Value::List(a)
            }
            (Value::String(a), b) => concat(&a, &b.to_string_value())?,
            (a, Value::String(b)) => concat(&a.to_string_value(), &b)?,
            (a, b) => {
                return Err(Error::type_error(format!(
                    "cannot add {} and {}",
                    a.type_name(),
                    b.type_name()
                )))
            }
        },
        BinOp::Sub => num_op(&left_val, &right_val, |a, b| a - b)?,
        BinOp::Mul => num_op(&left_val, &right_val, |a, b| a * b)?,
        BinOp::Div | BinOp::Rem => {
            if right_val == Value::Number(0.0) {
                return Err(Error::runtime("division by zero"));
            }
            if op == BinOp::Div {
                num_op(&left_val, &right_val, |a, b| a / b)?
            } else {
                num_op(&left_val, &right_val, |a, b| a % b)?
            }
        }
        BinOp::Eq => Value::Boolean(left_val == right_val),
        BinOp::NotEq => Value::Boolean(left_val != right_val),
        BinOp::Lt => compare_values(&left_val, &right_val, |ord| ord.is_lt())?,
        BinOp::Le => compare_values(&left_val, &right_val, |ord| ord.is_le())?,
        BinOp::Gt => compare_values(&left_val, &right_val, |ord| ord.is_gt())?,
        BinOp::Ge => compare_values(&left_val, &right_val, |ord| ord.is_ge())?,
        BinOp::And | BinOp::Or => unreachable!("short-circuit operators handled above"),
    };

    Ok(result)
}

fn check_len(what: &str, len: usize) -> Result<(), Error> {
    if len > MAX_SEQUENCE_LEN {
        return Err(Error::runtime(format!(
            "{} of length {} exceeds the limit of {}",
            what, len, MAX_SEQUENCE_LEN
        )));
    }
    Ok(())
}

fn concat(a: &str, b: &str) -> Result<Value, Error> {
    check_len("string", a.len() + b.len())?;
    Ok(Value::String(format!("{}{}", a, b)))
}

fn num_op(left: &Value, right: &Value, op: fn(f64, f64) -> f64) -> Result<Value, Error> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op(*a, *b))),
        _ => Err(Error::type_error(format!(
            "cannot perform numeric operation on {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn compare_values(
    a: &Value,
    b: &Value,
    pred: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, Error> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Boolean(pred(
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
        ))),
        (Value::String(a), Value::String(b)) => Ok(Value::Boolean(pred(a.cmp(b)))),
        _ => Err(Error::type_error(format!(
            "cannot compare {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Call a script or native function with evaluated arguments.
pub(crate) fn call_function(
    func: &Function,
    args: Vec<Value>,
    runtime: &mut Runtime,
) -> Result<Value, Error> {
    match func {
        Function::Native(native) => call_native(native, &args, runtime),
        Function::Script(decl) => {
            if args.len() != decl.params.len() {
                return Err(Error::type_error(format!(
                    "{}() takes {} arguments, got {}",
                    decl.name,
                    decl.params.len(),
                    args.len()
                )));
            }
            let locals: HashMap<String, Value> = decl.params.iter().cloned().zip(args).collect();
            runtime.enter_call(locals)?;
            let result = match &decl.body {
                Body::Expr(expr) => eval_expr(expr, runtime),
                Body::Block(stmts) => eval_block(stmts, runtime),
            };
            runtime.exit_call();
            result
        }
    }
}

fn call_native(native: &NativeFunction, args: &[Value], runtime: &Runtime) -> Result<Value, Error> {
    let ctx = runtime.host_context();
    match panic::catch_unwind(AssertUnwindSafe(|| native.call(&ctx, args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => Err(Error::Runtime(format!(
            "{}.{}: {}",
            native.namespace, native.name, message
        ))),
        Err(payload) => Err(Error::Internal(format!(
            "native function '{}.{}' panicked: {}",
            native.namespace,
            native.name,
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
