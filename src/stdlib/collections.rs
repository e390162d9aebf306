use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};

use super::{
    ensure_exact, ensure_range, expect_int, expect_str, mismatch, slice_bounds,
    Builtins,
};
use crate::{
    diagnostics::{runtime_error, type_error, Result},
    value::{SetKey, Value, ValueKind},
};

pub(super) fn install(builtins: &mut Builtins) {
    builtins.register("array", array);
    builtins.register("isArray", is_array);
    builtins.register("push", push);
    builtins.register("pop", pop);
    builtins.register("shift", shift);
    builtins.register("unshift", unshift);
    builtins.register("reverse", reverse);
    builtins.register("sort", sort);
    builtins.register("slice", slice);
    builtins.register("join", join);
    builtins.register("includes", includes);
    builtins.register("indexOf", index_of);
    builtins.register("length", length);
    builtins.register("get", get);
    builtins.register("put", put);

    builtins.register("object", object);
    builtins.register("isObject", is_object);
    builtins.register("keys", keys);
    builtins.register("values", values);
    builtins.register("has", has);
    builtins.register("delete", delete);
    builtins.register("merge", merge);

    builtins.register("set", set);
    builtins.register("isSet", is_set);
    builtins.register("add", add);
    builtins.register("remove", remove);
    builtins.register("size", size);
    builtins.register("union", union);
    builtins.register("intersection", intersection);
    builtins.register("difference", difference);
}

fn expect_array<'a>(value: &'a Value, name: &str) -> Result<&'a std::cell::RefCell<Vec<Value>>> {
    match &*value.0 {
        ValueKind::Array(values) => Ok(values),
        _ => Err(mismatch(name, "array", value)),
    }
}

fn expect_object<'a>(
    value: &'a Value,
    name: &str,
) -> Result<&'a std::cell::RefCell<IndexMap<String, Value>>> {
    match &*value.0 {
        ValueKind::Object(map) => Ok(map),
        _ => Err(mismatch(name, "object", value)),
    }
}

fn expect_set<'a>(value: &'a Value, name: &str) -> Result<&'a std::cell::RefCell<IndexSet<SetKey>>> {
    match &*value.0 {
        ValueKind::Set(members) => Ok(members),
        _ => Err(mismatch(name, "set", value)),
    }
}

fn hash_key(value: &Value, name: &str) -> Result<SetKey> {
    SetKey::from_value(value).ok_or_else(|| {
        type_error(format!(
            "`{name}` received unhashable value of type {}",
            value.type_name()
        ))
    })
}

fn checked_index(index: i64, len: usize, name: &str) -> Result<usize> {
    if index < 0 || index as u64 >= len as u64 {
        return Err(runtime_error(format!(
            "`{name}` index {index} out of bounds for length {len}"
        )));
    }
    Ok(index as usize)
}

fn array(args: &[Value]) -> Result<Value> {
    Ok(Value::array(args.to_vec()))
}

fn is_array(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isArray")?;
    Ok(Value::bool(matches!(&*args[0].0, ValueKind::Array(_))))
}

fn push(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "push")?;
    expect_array(&args[0], "push")?
        .borrow_mut()
        .push(args[1].clone());
    Ok(Value::null())
}

fn pop(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "pop")?;
    expect_array(&args[0], "pop")?
        .borrow_mut()
        .pop()
        .ok_or_else(|| runtime_error("pop from empty array"))
}

fn shift(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "shift")?;
    let values = expect_array(&args[0], "shift")?;
    let mut values = values.borrow_mut();
    if values.is_empty() {
        return Err(runtime_error("shift from empty array"));
    }
    Ok(values.remove(0))
}

fn unshift(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "unshift")?;
    expect_array(&args[0], "unshift")?
        .borrow_mut()
        .insert(0, args[1].clone());
    Ok(Value::null())
}

fn reverse(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "reverse")?;
    expect_array(&args[0], "reverse")?.borrow_mut().reverse();
    Ok(Value::null())
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (&*left.0, &*right.0) {
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        _ => left.as_number()?.partial_cmp(&right.as_number()?),
    }
}

fn sort(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "sort")?;
    let values = expect_array(&args[0], "sort")?;
    let mut sorted = values.borrow().clone();
    let all_strings = sorted
        .iter()
        .all(|value| matches!(value.kind(), ValueKind::String(_)));
    let all_numbers = sorted
        .iter()
        .all(|value| value.as_number().map_or(false, |n| !n.is_nan()));
    if !all_strings && !all_numbers {
        return Err(runtime_error(
            "`sort` requires an array of numbers or an array of strings",
        ));
    }
    sorted.sort_by(|a, b| compare(a, b).unwrap_or(Ordering::Equal));
    *values.borrow_mut() = sorted;
    Ok(Value::null())
}

fn slice(args: &[Value]) -> Result<Value> {
    ensure_range(args, 2, 3, "slice")?;
    let values = expect_array(&args[0], "slice")?.borrow();
    let start = expect_int(&args[1], "slice")?;
    let end = args.get(2).map(|end| expect_int(end, "slice")).transpose()?;
    let (start, end) = slice_bounds(values.len(), start, end);
    Ok(Value::array(values[start..end].to_vec()))
}

fn join(args: &[Value]) -> Result<Value> {
    ensure_range(args, 1, 2, "join")?;
    let values = expect_array(&args[0], "join")?.borrow();
    let separator = match args.get(1) {
        Some(sep) => expect_str(sep, "join")?,
        None => "",
    };
    let joined = values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(separator);
    Ok(Value::string(joined))
}

fn includes(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "includes")?;
    let values = expect_array(&args[0], "includes")?.borrow();
    Ok(Value::bool(values.iter().any(|value| value.equals(&args[1]))))
}

fn index_of(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "indexOf")?;
    let index = match &*args[0].0 {
        ValueKind::Array(values) => values
            .borrow()
            .iter()
            .position(|value| value.equals(&args[1])),
        ValueKind::String(text) => {
            let needle = expect_str(&args[1], "indexOf")?;
            text.find(needle)
                .map(|byte_idx| text[..byte_idx].chars().count())
        }
        _ => return Err(mismatch("indexOf", "array or string", &args[0])),
    };
    Ok(Value::int(index.map(|idx| idx as i64).unwrap_or(-1)))
}

fn length(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "length")?;
    let len = expect_array(&args[0], "length")?.borrow().len();
    Ok(Value::int(len as i64))
}

fn get(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "get")?;
    match &*args[0].0 {
        ValueKind::Array(values) => {
            let values = values.borrow();
            let index = checked_index(expect_int(&args[1], "get")?, values.len(), "get")?;
            Ok(values[index].clone())
        }
        ValueKind::Object(map) => {
            let key = expect_str(&args[1], "get")?;
            map.borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| runtime_error(format!("object has no key {key:?}")))
        }
        _ => Err(mismatch("get", "array or object", &args[0])),
    }
}

fn put(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 3, "put")?;
    match &*args[0].0 {
        ValueKind::Array(values) => {
            let mut values = values.borrow_mut();
            let index = checked_index(expect_int(&args[1], "put")?, values.len(), "put")?;
            values[index] = args[2].clone();
        }
        ValueKind::Object(map) => {
            let key = expect_str(&args[1], "put")?;
            map.borrow_mut().insert(key.to_string(), args[2].clone());
        }
        _ => return Err(mismatch("put", "array or object", &args[0])),
    }
    Ok(Value::null())
}

fn object(args: &[Value]) -> Result<Value> {
    if args.len() % 2 != 0 {
        return Err(type_error(
            "`object` expects alternating keys and values",
        ));
    }
    let mut map = IndexMap::new();
    for pair in args.chunks(2) {
        let key = expect_str(&pair[0], "object")?;
        map.insert(key.to_string(), pair[1].clone());
    }
    Ok(Value::object(map))
}

fn is_object(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isObject")?;
    Ok(Value::bool(matches!(&*args[0].0, ValueKind::Object(_))))
}

fn keys(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "keys")?;
    let map = expect_object(&args[0], "keys")?.borrow();
    Ok(Value::array(map.keys().map(Value::string).collect()))
}

fn values(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "values")?;
    let map = expect_object(&args[0], "values")?.borrow();
    Ok(Value::array(map.values().cloned().collect()))
}

fn has(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "has")?;
    match &*args[0].0 {
        ValueKind::Object(map) => {
            let key = expect_str(&args[1], "has")?;
            Ok(Value::bool(map.borrow().contains_key(key)))
        }
        ValueKind::Set(members) => {
            let key = hash_key(&args[1], "has")?;
            Ok(Value::bool(members.borrow().contains(&key)))
        }
        _ => Err(mismatch("has", "object or set", &args[0])),
    }
}

fn delete(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "delete")?;
    let map = expect_object(&args[0], "delete")?;
    let key = expect_str(&args[1], "delete")?;
    let removed = map.borrow_mut().shift_remove(key).is_some();
    Ok(Value::bool(removed))
}

fn merge(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "merge")?;
    let mut merged = expect_object(&args[0], "merge")?.borrow().clone();
    for (key, value) in expect_object(&args[1], "merge")?.borrow().iter() {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::object(merged))
}

fn set(args: &[Value]) -> Result<Value> {
    let members = args
        .iter()
        .map(|arg| hash_key(arg, "set"))
        .collect::<Result<IndexSet<_>>>()?;
    Ok(Value::set(members))
}

fn is_set(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "isSet")?;
    Ok(Value::bool(matches!(&*args[0].0, ValueKind::Set(_))))
}

fn add(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "add")?;
    let members = expect_set(&args[0], "add")?;
    let key = hash_key(&args[1], "add")?;
    members.borrow_mut().insert(key);
    Ok(Value::null())
}

fn remove(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "remove")?;
    let members = expect_set(&args[0], "remove")?;
    let key = hash_key(&args[1], "remove")?;
    let removed = members.borrow_mut().shift_remove(&key);
    Ok(Value::bool(removed))
}

fn size(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "size")?;
    let len = expect_set(&args[0], "size")?.borrow().len();
    Ok(Value::int(len as i64))
}

fn set_pair<'a>(
    args: &'a [Value],
    name: &str,
) -> Result<(
    std::cell::Ref<'a, IndexSet<SetKey>>,
    std::cell::Ref<'a, IndexSet<SetKey>>,
)> {
    ensure_exact(args, 2, name)?;
    Ok((
        expect_set(&args[0], name)?.borrow(),
        expect_set(&args[1], name)?.borrow(),
    ))
}

fn union(args: &[Value]) -> Result<Value> {
    let (left, right) = set_pair(args, "union")?;
    Ok(Value::set(left.union(&*right).cloned().collect()))
}

fn intersection(args: &[Value]) -> Result<Value> {
    let (left, right) = set_pair(args, "intersection")?;
    Ok(Value::set(left.intersection(&*right).cloned().collect()))
}

fn difference(args: &[Value]) -> Result<Value> {
    let (left, right) = set_pair(args, "difference")?;
    Ok(Value::set(left.difference(&*right).cloned().collect()))
}
