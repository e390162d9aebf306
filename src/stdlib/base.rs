use std::{
    rc::Rc,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use rand::Rng;

use super::{ensure_exact, ensure_range, expect_int, expect_number, expect_str, Builtins};
use crate::{
    diagnostics::{runtime_error, type_error, Result},
    stack::ensure_sufficient_stack,
    value::{Value, ValueKind},
};

pub(super) fn install(builtins: &mut Builtins) {
    builtins.register("print", print);
    builtins.register("len", len);
    builtins.register("range", range);
    builtins.register("time", time);
    builtins.register("sleep", sleep);
    builtins.register("random", random);
    builtins.register("randint", randint);
    builtins.register("int", to_int);
    builtins.register("float", to_float);
    builtins.register("str", to_str);
    builtins.register("bool", to_bool);
    builtins.register("type", type_of);
    builtins.register("typeof", type_of);
    builtins.register("stringify", stringify);
    builtins.register("parse", parse);
    builtins.register("isNumber", is_number);
    builtins.register("isString", is_string);
    builtins.register("isBoolean", is_boolean);
    builtins.register("isNull", is_null);
    builtins.register("isFunction", is_function);
}

fn print(args: &[Value]) -> Result<Value> {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
    Ok(Value::null())
}

fn len(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "len")?;
    let len = match &*args[0].0 {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::Array(values) => values.borrow().len(),
        ValueKind::Object(map) => map.borrow().len(),
        ValueKind::Set(members) => members.borrow().len(),
        _ => {
            return Err(type_error(format!(
                "`len` expected string, array, object or set but found {}",
                args[0].type_name()
            )))
        }
    };
    Ok(Value::int(len as i64))
}

fn range(args: &[Value]) -> Result<Value> {
    ensure_range(args, 1, 3, "range")?;
    let (start, stop) = if args.len() == 1 {
        (0, expect_int(&args[0], "range")?)
    } else {
        (expect_int(&args[0], "range")?, expect_int(&args[1], "range")?)
    };
    let step = match args.get(2) {
        Some(step) => expect_int(step, "range")?,
        None => 1,
    };
    if step == 0 {
        return Err(runtime_error("`range` step must not be zero"));
    }

    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        values.push(Value::int(current));
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::array(values))
}

fn time(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 0, "time")?;
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| runtime_error(format!("system clock is before the epoch: {err}")))?;
    Ok(Value::float(elapsed.as_secs_f64()))
}

fn sleep(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "sleep")?;
    let seconds = expect_number(&args[0], "sleep")?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(runtime_error("`sleep` expects a non-negative duration"));
    }
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|_| runtime_error(format!("`sleep` duration {seconds} is out of range")))?;
    thread::sleep(duration);
    Ok(Value::null())
}

fn random(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 0, "random")?;
    Ok(Value::float(rand::thread_rng().gen::<f64>()))
}

fn randint(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "randint")?;
    let low = expect_int(&args[0], "randint")?;
    let high = expect_int(&args[1], "randint")?;
    if low > high {
        return Err(runtime_error(format!(
            "`randint` received an empty range {low}..={high}"
        )));
    }
    Ok(Value::int(rand::thread_rng().gen_range(low..=high)))
}

fn to_int(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "int")?;
    match &*args[0].0 {
        ValueKind::Int(n) => Ok(Value::int(*n)),
        ValueKind::Bool(b) => Ok(Value::int(i64::from(*b))),
        ValueKind::Float(f) => {
            if !f.is_finite() || f.trunc().abs() >= 9.2e18 {
                return Err(runtime_error(format!("cannot convert {f} to int")));
            }
            Ok(Value::int(f.trunc() as i64))
        }
        ValueKind::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::int)
            .map_err(|_| runtime_error(format!("invalid literal for int: {s:?}"))),
        _ => Err(type_error(format!(
            "cannot convert {} to int",
            args[0].type_name()
        ))),
    }
}

fn to_float(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "float")?;
    match &*args[0].0 {
        ValueKind::Int(n) => Ok(Value::float(*n as f64)),
        ValueKind::Float(f) => Ok(Value::float(*f)),
        ValueKind::Bool(b) => Ok(Value::float(if *b { 1.0 } else { 0.0 })),
        ValueKind::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::float)
            .map_err(|_| runtime_error(format!("invalid literal for float: {s:?}"))),
        _ => Err(type_error(format!(
            "cannot convert {} to float",
            args[0].type_name()
        ))),
    }
}

fn to_str(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "str")?;
    Ok(Value::string(args[0].to_string()))
}

fn to_bool(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "bool")?;
    Ok(Value::bool(args[0].is_truthy()))
}

fn type_of(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "type")?;
    Ok(Value::string(args[0].type_name()))
}

fn stringify(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "stringify")?;
    let json = to_json(&args[0], &mut Vec::new())?;
    Ok(Value::string(json.to_string()))
}

fn parse(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "parse")?;
    let text = expect_str(&args[0], "parse")?;
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| runtime_error(format!("invalid JSON: {err}")))?;
    Ok(from_json(json))
}

fn to_json(value: &Value, active: &mut Vec<*const ValueKind>) -> Result<serde_json::Value> {
    use serde_json::Value as Json;

    let ptr = Rc::as_ptr(&value.0);
    if matches!(&*value.0, ValueKind::Array(_) | ValueKind::Object(_)) {
        if active.contains(&ptr) {
            return Err(runtime_error("cannot encode a self-referencing value as JSON"));
        }
        active.push(ptr);
    }
    let json = match &*value.0 {
        ValueKind::Null => Json::Null,
        ValueKind::Bool(b) => Json::Bool(*b),
        ValueKind::Int(n) => Json::from(*n),
        ValueKind::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| runtime_error(format!("cannot encode {f} as JSON")))?,
        ValueKind::String(s) => Json::String(s.clone()),
        ValueKind::Array(values) => {
            let mut items = Vec::new();
            for item in values.borrow().iter() {
                items.push(ensure_sufficient_stack(|| to_json(item, active))?);
            }
            Json::Array(items)
        }
        ValueKind::Set(members) => Json::Array(
            members
                .borrow()
                .iter()
                .map(|member| to_json(&member.to_value(), active))
                .collect::<Result<Vec<_>>>()?,
        ),
        ValueKind::Object(map) => {
            let mut object = serde_json::Map::new();
            for (key, value) in map.borrow().iter() {
                object.insert(key.clone(), ensure_sufficient_stack(|| to_json(value, active))?);
            }
            Json::Object(object)
        }
        ValueKind::Function(_) | ValueKind::NativeFunction(_) => {
            return Err(type_error("functions cannot be encoded as JSON"))
        }
    };
    if matches!(&*value.0, ValueKind::Array(_) | ValueKind::Object(_)) {
        active.pop();
    }
    Ok(json)
}

fn from_json(json: serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match json {
        Json::Null => Value::null(),
        Json::Bool(b) => Value::bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::int(i),
            None => Value::float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::string(s),
        Json::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        Json::Object(map) => Value::object(
            map.into_iter()
                .map(|(key, value)| (key, from_json(value)))
                .collect::<IndexMap<_, _>>(),
        ),
    }
}

fn is_number(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isNumber")?;
    Ok(Value::bool(args[0].as_number().is_some()))
}

fn is_string(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isString")?;
    Ok(Value::bool(matches!(&*args[0].0, ValueKind::String(_))))
}

fn is_boolean(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isBoolean")?;
    Ok(Value::bool(matches!(&*args[0].0, ValueKind::Bool(_))))
}

fn is_null(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isNull")?;
    Ok(Value::bool(args[0].is_null()))
}

fn is_function(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isFunction")?;
    Ok(Value::bool(matches!(
        &*args[0].0,
        ValueKind::Function(_) | ValueKind::NativeFunction(_)
    )))
}
