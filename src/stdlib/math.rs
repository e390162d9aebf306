use super::{ensure_exact, ensure_min, ensure_range, expect_int, expect_number, mismatch, Builtins};
use crate::{
    diagnostics::{runtime_error, Result},
    value::{Value, ValueKind},
};

pub(super) fn install(builtins: &mut Builtins) {
    builtins.register("sqrt", sqrt);
    builtins.register("sin", sin);
    builtins.register("cos", cos);
    builtins.register("tan", tan);
    builtins.register("exp", exp);
    builtins.register("log", log);
    builtins.register("floor", floor);
    builtins.register("ceil", ceil);
    builtins.register("round", round);
    builtins.register("gcd", gcd);
    builtins.register("lcm", lcm);
    builtins.register("abs", abs);
    builtins.register("min", min);
    builtins.register("max", max);
}

fn unary(args: &[Value], name: &str, op: fn(f64) -> f64) -> Result<Value> {
    ensure_exact(args, 1, name)?;
    Ok(Value::float(op(expect_number(&args[0], name)?)))
}

fn sqrt(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "sqrt")?;
    let n = expect_number(&args[0], "sqrt")?;
    if n < 0.0 {
        return Err(runtime_error("`sqrt` of a negative number"));
    }
    Ok(Value::float(n.sqrt()))
}

fn sin(args: &[Value]) -> Result<Value> {
    unary(args, "sin", f64::sin)
}

fn cos(args: &[Value]) -> Result<Value> {
    unary(args, "cos", f64::cos)
}

fn tan(args: &[Value]) -> Result<Value> {
    unary(args, "tan", f64::tan)
}

fn exp(args: &[Value]) -> Result<Value> {
    unary(args, "exp", f64::exp)
}

fn log(args: &[Value]) -> Result<Value> {
    ensure_range(args, 1, 2, "log")?;
    let n = expect_number(&args[0], "log")?;
    let base = match args.get(1) {
        Some(base) => expect_number(base, "log")?,
        None => 10.0,
    };
    if n <= 0.0 {
        return Err(runtime_error("`log` of a non-positive number"));
    }
    if base <= 0.0 || base == 1.0 {
        return Err(runtime_error(format!("`log` base {base} is invalid")));
    }
    let result = if base == 10.0 {
        n.log10()
    } else if base == 2.0 {
        n.log2()
    } else {
        n.ln() / base.ln()
    };
    Ok(Value::float(result))
}

fn to_int(n: f64, name: &str) -> Result<Value> {
    if !n.is_finite() || n.abs() >= 9.2e18 {
        return Err(runtime_error(format!("`{name}` result {n} does not fit in an int")));
    }
    Ok(Value::int(n as i64))
}

fn floor(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "floor")?;
    match &*args[0].0 {
        ValueKind::Int(n) => Ok(Value::int(*n)),
        _ => to_int(expect_number(&args[0], "floor")?.floor(), "floor"),
    }
}

fn ceil(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "ceil")?;
    match &*args[0].0 {
        ValueKind::Int(n) => Ok(Value::int(*n)),
        _ => to_int(expect_number(&args[0], "ceil")?.ceil(), "ceil"),
    }
}

/// `round(x)` yields an int; `round(x, digits)` keeps a float.
fn round(args: &[Value]) -> Result<Value> {
    ensure_range(args, 1, 2, "round")?;
    if let ValueKind::Int(n) = &*args[0].0 {
        if args.len() == 1 {
            return Ok(Value::int(*n));
        }
    }
    let n = expect_number(&args[0], "round")?;
    match args.get(1) {
        None => to_int(n.round(), "round"),
        Some(digits) => {
            let digits = expect_int(digits, "round")?.clamp(-308, 308) as i32;
            let factor = 10f64.powi(digits);
            Ok(Value::float((n * factor).round() / factor))
        }
    }
}

fn gcd_of(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a.wrapping_rem(b));
    }
    a.wrapping_abs()
}

fn gcd(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "gcd")?;
    let a = expect_int(&args[0], "gcd")?;
    let b = expect_int(&args[1], "gcd")?;
    Ok(Value::int(gcd_of(a, b)))
}

fn lcm(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 2, "lcm")?;
    let a = expect_int(&args[0], "lcm")?;
    let b = expect_int(&args[1], "lcm")?;
    if a == 0 || b == 0 {
        return Ok(Value::int(0));
    }
    (a / gcd_of(a, b))
        .checked_mul(b)
        .and_then(i64::checked_abs)
        .map(Value::int)
        .ok_or_else(|| runtime_error("`lcm` overflowed"))
}

fn abs(args: &[Value]) -> Result<Value> {
    ensure_exact(args, 1, "abs")?;
    match &*args[0].0 {
        ValueKind::Int(n) => n
            .checked_abs()
            .map(Value::int)
            .ok_or_else(|| runtime_error("`abs` overflowed")),
        ValueKind::Float(f) => Ok(Value::float(f.abs())),
        _ => Err(mismatch("abs", "number", &args[0])),
    }
}

fn extremum(args: &[Value], name: &str, prefer: fn(f64, f64) -> bool) -> Result<Value> {
    ensure_min(args, 1, name)?;
    let mut best = &args[0];
    let mut best_n = expect_number(best, name)?;
    for arg in &args[1..] {
        let n = expect_number(arg, name)?;
        if prefer(n, best_n) {
            best = arg;
            best_n = n;
        }
    }
    Ok(best.clone())
}

fn min(args: &[Value]) -> Result<Value> {
    extremum(args, "min", |n, best| n < best)
}

fn max(args: &[Value]) -> Result<Value> {
    extremum(args, "max", |n, best| n > best)
}
