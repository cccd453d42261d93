//! The `core` module every interpreter references implicitly.

use crate::module::{HostContext, Module};
use crate::value::Value;

/// Name of the built-in module.
pub const CORE_MODULE: &str = "core";

/// Longest list or string (in bytes) a script may build.
pub const MAX_SEQUENCE_LEN: usize = 10_000_000;

fn check_len(name: &str, len: u64) -> Result<(), String> {
    if len > MAX_SEQUENCE_LEN as u64 {
        return Err(format!(
            "{}() result of length {} exceeds the limit of {}",
            name, len, MAX_SEQUENCE_LEN
        ));
    }
    Ok(())
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "{}() takes {} argument{}, got {}",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            args.len()
        ))
    }
}

fn number_arg(name: &str, value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(format!("{}() expects a number, got {}", name, other.type_name())),
    }
}

fn string_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str, String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(format!("{}() expects a string, got {}", name, other.type_name())),
    }
}

fn list_arg<'v>(name: &str, value: &'v Value) -> Result<&'v [Value], String> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(format!("{}() expects a list, got {}", name, other.type_name())),
    }
}

fn print(ctx: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
    let text: Vec<String> = args.iter().map(|v| v.to_string_value()).collect();
    ctx.info(text.join(" "));
    Ok(Value::Null)
}

fn len(_: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
    arity("len", args, 1)?;
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Object(obj) if obj.is_container() => obj.children.as_ref().map_or(0, Vec::len),
        other => return Err(format!("len() is not defined for {}", other.type_name())),
    };
    Ok(Value::Number(n as f64))
}

fn range(_: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
    let (start, end) = match args {
        [end] => (0.0, number_arg("range", end)?),
        [start, end] => (number_arg("range", start)?, number_arg("range", end)?),
        _ => return Err(format!("range() takes 1 or 2 arguments, got {}", args.len())),
    };
    let (start, end) = (start as i64, end as i64);
    check_len("range", end.saturating_sub(start).max(0) as u64)?;
    Ok(Value::List((start..end).map(|n| Value::Number(n as f64)).collect()))
}

fn sum(_: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
    arity("sum", args, 1)?;
    let mut total = 0.0;
    for item in list_arg("sum", &args[0])? {
        total += number_arg("sum", item)?;
    }
    Ok(Value::Number(total))
}

fn push(_: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
    arity("push", args, 2)?;
    let items = list_arg("push", &args[0])?;
    check_len("push", items.len() as u64 + 1)?;
    let mut items = items.to_vec();
    items.push(args[1].clone());
    Ok(Value::List(items))
}

fn join(_: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
    arity("join", args, 2)?;
    let items = list_arg("join", &args[0])?;
    let separator = string_arg("join", &args[1])?;
    let parts: Vec<String> = items.iter().map(|v| v.to_string_value()).collect();
    let total = parts.iter().map(String::len).sum::<usize>()
        + separator.len() * parts.len().saturating_sub(1);
    check_len("join", total as u64)?;
    Ok(Value::String(parts.join(separator)))
}

fn contains(_: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
    arity("contains", args, 2)?;
    let found = match &args[0] {
        Value::String(s) => s.contains(string_arg("contains", &args[1])?),
        Value::List(items) => items.contains(&args[1]),
        other => return Err(format!("contains() is not defined for {}", other.type_name())),
    };
    Ok(Value::Boolean(found))
}

fn map_string(
    name: &'static str,
    f: fn(&str) -> String,
) -> impl Fn(&HostContext<'_>, &[Value]) -> Result<Value, String> + Send + Sync + 'static {
    move |_, args| {
        arity(name, args, 1)?;
        Ok(Value::String(f(string_arg(name, &args[0])?)))
    }
}

/// Build the `core` module: `core`, `core.collections` and `core.text`.
pub fn core_module() -> Module {
    Module::new(CORE_MODULE)
        .with_function("core", "print", print)
        .with_function("core", "len", len)
        .with_function("core", "str", |_, args| {
            arity("str", args, 1)?;
            Ok(Value::String(args[0].to_string_value()))
        })
        .with_function("core", "type_of", |_, args| {
            arity("type_of", args, 1)?;
            Ok(Value::String(args[0].type_name()))
        })
        .with_function("core.collections", "range", range)
        .with_function("core.collections", "sum", sum)
        .with_function("core.collections", "push", push)
        .with_function("core.collections", "first", |_, args| {
            arity("first", args, 1)?;
            Ok(list_arg("first", &args[0])?.first().cloned().unwrap_or_default())
        })
        .with_function("core.collections", "last", |_, args| {
            arity("last", args, 1)?;
            Ok(list_arg("last", &args[0])?.last().cloned().unwrap_or_default())
        })
        .with_function("core.text", "upper", map_string("upper", str::to_uppercase))
        .with_function("core.text", "lower", map_string("lower", str::to_lowercase))
        .with_function("core.text", "trim", map_string("trim", |s| s.trim().to_string()))
        .with_function("core.text", "join", join)
        .with_function("core.text", "contains", contains)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(namespace: &str, name: &str, args: &[Value]) -> Result<Value, String> {
        let module = core_module();
        let func = module
            .find_function(namespace, name)
            .unwrap_or_else(|| panic!("missing {}.{}", namespace, name));
        func.call(&HostContext::new(None), args)
    }

    #[test]
    fn test_range_and_sum() {
        let list = call("core.collections", "range", &[Value::Number(1.0), Value::Number(4.0)]).unwrap();
        assert_eq!(
            list,
            Value::List(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)])
        );
        assert_eq!(call("core.collections", "sum", &[list]).unwrap(), Value::Number(6.0));
    }

    #[test]
    fn test_range_is_bounded() {
        let err = call("core.collections", "range", &[Value::Number(1e12)]).unwrap_err();
        assert!(err.contains("exceeds the limit"), "{}", err);
        assert!(call("core.collections", "range", &[Value::Number(f64::INFINITY)]).is_err());
        assert_eq!(
            call("core.collections", "range", &[Value::Number(5.0), Value::Number(1.0)]).unwrap(),
            Value::List(vec![])
        );
    }

    #[test]
    fn test_text_functions() {
        let s = Value::String("  Hi ".to_string());
        assert_eq!(call("core.text", "trim", &[s.clone()]).unwrap(), Value::String("Hi".to_string()));
        assert_eq!(call("core.text", "upper", &[s]).unwrap(), Value::String("  HI ".to_string()));
    }

    #[test]
    fn test_arity_errors() {
        let err = call("core", "len", &[]).unwrap_err();
        assert_eq!(err, "len() takes 1 argument, got 0");
    }

    #[test]
    fn test_print_reports_info() {
        let (tx, rx) = std::sync::mpsc::channel();
        let module = core_module();
        let print = module.find_function("core", "print").unwrap();
        print
            .call(&HostContext::new(Some(&tx)), &[Value::String("a".to_string()), Value::Number(1.0)])
            .unwrap();
        let message = rx.try_recv().unwrap();
        assert_eq!(message.text, "a 1");
        assert_eq!(message.severity, crate::Severity::Info);
    }
}
