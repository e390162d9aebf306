use super::{ensure_exact, ensure_range, expect_int, expect_str, slice_bounds, Builtins};
use crate::{
    diagnostics::{runtime_error, Result},
    value::Value,
};

pub(super) fn install(builtins: &mut Builtins) {
    builtins.register("uppercase", uppercase);
    builtins.register("lowercase", lowercase);
    builtins.register("capitalize", capitalize);
    builtins.register("trim", trim);
    builtins.register("split", split);
    builtins.register("replace", replace);
    builtins.register("substring", substring);
    builtins.register("startsWith", starts_with);
    builtins.register("endsWith", ends_with);
    builtins.register("contains", contains);
    builtins.register("repeat", repeat);
}

fn uppercase(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "uppercase")?;
    Ok(Value::string(expect_str(&args[0], "uppercase")?.to_uppercase()))
}

fn lowercase(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "lowercase")?;
    Ok(Value::string(expect_str(&args[0], "lowercase")?.to_lowercase()))
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "capitalize")?;
    let text = expect_str(&args[0], "capitalize")?;
    let mut chars = text.chars();
    let capitalized = match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    };
    Ok(Value::string(capitalized))
}

fn trim(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "trim")?;
    Ok(Value::string(expect_str(&args[0], "trim")?.trim()))
}

fn split(args: &[Value]) -> Result<Value> {
    ensure_range(args, 1, 2, "split")?;
    let text = expect_str(&args[0], "split")?;
    let separator = match args.get(1) {
        Some(sep) => expect_str(sep, "split")?,
        None => " ",
    };
    if separator.is_empty() {
        return Err(runtime_error("`split` separator must not be empty"));
    }
    Ok(Value::array(text.split(separator).map(Value::string).collect()))
}

fn replace(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 3, "replace")?;
    let text = expect_str(&args[0], "replace")?;
    let from = expect_str(&args[1], "replace")?;
    let to = expect_str(&args[2], "replace")?;
    Ok(Value::string(text.replace(from, to)))
}

fn substring(args: &[Value]) -> Result<Value> {
    ensure_range(args, 2, 3, "substring")?;
    let chars: Vec<char> = expect_str(&args[0], "substring")?.chars().collect();
    let start = expect_int(&args[1], "substring")?;
    let end = args
        .get(2)
        .map(|end| expect_int(end, "substring"))
        .transpose()?;
    let (start, end) = slice_bounds(chars.len(), start, end);
    Ok(Value::string(chars[start..end].iter().collect::<String>()))
}

fn starts_with(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "startsWith")?;
    let text = expect_str(&args[0], "startsWith")?;
    let prefix = expect_str(&args[1], "startsWith")?;
    Ok(Value::bool(text.starts_with(prefix)))
}

fn ends_with(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "endsWith")?;
    let text = expect_str(&args[0], "endsWith")?;
    let suffix = expect_str(&args[1], "endsWith")?;
    Ok(Value::bool(text.ends_with(suffix)))
}

fn contains(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "contains")?;
    let text = expect_str(&args[0], "contains")?;
    let needle = expect_str(&args[1], "contains")?;
    Ok(Value::bool(text.contains(needle)))
}

fn repeat(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "repeat")?;
    let text = expect_str(&args[0], "repeat")?;
    let count = expect_int(&args[1], "repeat")?;
    if count < 0 {
        return Err(runtime_error("`repeat` count must not be negative"));
    }
    repeat_text(text, count).map(Value::string)
}

/// `text` repeated `count` times; fails instead of aborting when the result
/// cannot be allocated.
pub fn repeat_text(text: &str, count: i64) -> Result<String> {
    let count = usize::try_from(count).unwrap_or(0);
    if text.is_empty() || count == 0 {
        return Ok(String::new());
    }
    let too_long = || {
        runtime_error(format!(
            "repeating a {}-byte string {count} times is too long",
            text.len()
        ))
    };
    let total = text.len().checked_mul(count).ok_or_else(too_long)?;
    let mut out = String::new();
    out.try_reserve_exact(total).map_err(|_| too_long())?;
    for _ in 0..count {
        out.push_str(text);
    }
    Ok(out)
}
