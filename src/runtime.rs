use std::rc::Rc;

use tracing::trace;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, Program, Stmt, StmtKind, TypeTag, UnaryOp},
    diagnostics::{name_error, runtime_error, type_error, Result},
    environment::Environment,
    module_loader::ModuleLoader,
    parser,
    stack::ensure_sufficient_stack,
    stdlib::{repeat_text, Builtins},
    value::{Scope, UserFunction, Value, ValueKind},
};

/// Nested user-function calls allowed before evaluation is aborted.
pub const MAX_CALL_DEPTH: usize = 256;

/// Evaluates py++ programs.
///
/// Statement and expression evaluation grow the native stack on demand, so
/// an interpreter runs on any thread regardless of its stack size.
pub struct Interpreter {
    env: Environment,
    builtins: Rc<Builtins>,
    loader: Rc<ModuleLoader>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_loader(Rc::new(ModuleLoader::default()))
    }

    pub fn with_loader(loader: Rc<ModuleLoader>) -> Self {
        Self::with_parts(Rc::new(Builtins::standard()), loader)
    }

    pub fn with_parts(builtins: Rc<Builtins>, loader: Rc<ModuleLoader>) -> Self {
        Self {
            env: Environment::new(),
            builtins,
            loader,
        }
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse_program(source)?;
        self.evaluate(&program)
    }

    /// Runs `program` and yields the value of its last statement.
    pub fn evaluate(&mut self, program: &Program) -> Result<Value> {
        match self.execute_block(&program.statements)? {
            Flow::Normal(value) | Flow::Return(value) => Ok(value),
            Flow::Break | Flow::Continue => Err(runtime_error("loop control outside of a loop")),
        }
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.env.globals().get(name).cloned()
    }

    /// Top-level bindings visible to importers.
    pub fn exports(&self) -> Scope {
        self.env
            .globals()
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn builtins(&self) -> &Rc<Builtins> {
        &self.builtins
    }

    pub fn loader(&self) -> &Rc<ModuleLoader> {
        &self.loader
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Flow> {
        ensure_sufficient_stack(|| self.execute_statement_inner(stmt))
    }

    fn execute_statement_inner(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Let {
                name,
                annotation,
                value,
            } => {
                let value = self.evaluate_expr(value)?;
                if let Some(tag) = annotation {
                    check_tag(*tag, &value).map_err(|err| err.at(stmt.pos))?;
                }
                self.env.define(name.clone(), value);
                Ok(Flow::Normal(Value::null()))
            }
            StmtKind::Function(decl) => {
                let function = UserFunction {
                    decl: Rc::clone(decl),
                    captured: self.env.snapshot(),
                };
                self.env
                    .define(decl.name.clone(), Value::new(ValueKind::Function(function)));
                Ok(Flow::Normal(Value::null()))
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Value::null(),
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_expr(condition)?.is_truthy() {
                    self.execute_block(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_block(branch)
                } else {
                    Ok(Flow::Normal(Value::null()))
                }
            }
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.execute_statement(init)?;
                }
                loop {
                    if let Some(condition) = condition {
                        if !self.evaluate_expr(condition)?.is_truthy() {
                            break;
                        }
                    }
                    match self.execute_block(body)? {
                        Flow::Normal(_) | Flow::Continue => {}
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                    if let Some(update) = update {
                        self.evaluate_expr(update)?;
                    }
                }
                Ok(Flow::Normal(Value::null()))
            }
            StmtKind::While { condition, body } => {
                while self.evaluate_expr(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        Flow::Normal(_) | Flow::Continue => {}
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }
                Ok(Flow::Normal(Value::null()))
            }
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::Expr(expr) => Ok(Flow::Normal(self.evaluate_expr(expr)?)),
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Import(name) => {
                self.import(name).map_err(|err| err.at(stmt.pos))?;
                Ok(Flow::Normal(Value::null()))
            }
        }
    }

    /// Blocks share the enclosing scope; only calls push frames.
    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        let mut last = Value::null();
        for stmt in statements {
            match self.execute_statement(stmt)? {
                Flow::Normal(value) => last = value,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn import(&mut self, name: &str) -> Result<()> {
        let builtins = Rc::clone(&self.builtins);
        let exports = self
            .loader
            .load_module(name, |loader| Interpreter::with_parts(builtins, loader))?;
        for (export, value) in exports {
            self.env.define(export, value);
        }
        Ok(())
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr_inner(expr))
    }

    fn evaluate_expr_inner(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Identifier(name) => self.lookup(name, expr),
            ExprKind::Binary { op, left, right } => {
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                binary(*op, &left, &right).map_err(|err| err.at(expr.pos))
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate_expr(operand)?;
                unary(*op, &value).map_err(|err| err.at(expr.pos))
            }
            ExprKind::Assign { name, value } => {
                let value = self.evaluate_expr(value)?;
                self.env.define(name.clone(), value.clone());
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let callee = self.evaluate_expr(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate_expr(arg)?);
                }
                self.call(&callee, values).map_err(|err| err.at(expr.pos))
            }
            ExprKind::Member { object, member } => {
                let object = self.evaluate_expr(object)?;
                match object.kind() {
                    ValueKind::Object(map) => {
                        let field = map.borrow().get(member).cloned();
                        Ok(field.unwrap_or_else(Value::null))
                    }
                    _ => Err(type_error(format!(
                        "cannot access member `{member}` on value of type {}",
                        object.type_name()
                    ))
                    .at(expr.pos)),
                }
            }
        }
    }

    fn lookup(&self, name: &str, expr: &Expr) -> Result<Value> {
        self.env
            .get(name)
            .or_else(|| self.builtins.get(name))
            .ok_or_else(|| name_error(format!("undefined variable `{name}`"), expr.pos))
    }

    fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        match callee.kind() {
            ValueKind::NativeFunction(fun) => fun.call(&args),
            ValueKind::Function(fun) => self.call_function(fun, args),
            _ => Err(type_error(format!(
                "value of type {} is not callable",
                callee.type_name()
            ))),
        }
    }

    fn call_function(&mut self, fun: &UserFunction, args: Vec<Value>) -> Result<Value> {
        let decl = &fun.decl;
        if args.len() != decl.params.len() {
            return Err(type_error(format!(
                "function `{}` expected {} argument(s), got {}",
                decl.name,
                decl.params.len(),
                args.len()
            )));
        }
        if self.env.depth() >= MAX_CALL_DEPTH {
            return Err(runtime_error(format!(
                "maximum call depth of {MAX_CALL_DEPTH} exceeded in `{}`",
                decl.name
            )));
        }

        let mut frame = fun.captured.clone();
        for (param, arg) in decl.params.iter().zip(args) {
            if let Some(tag) = param.annotation {
                check_tag(tag, &arg).map_err(|_| {
                    type_error(format!(
                        "parameter `{}` of `{}` expected {tag}, got {}",
                        param.name,
                        decl.name,
                        arg.type_name()
                    ))
                })?;
            }
            frame.insert(param.name.clone(), arg);
        }

        trace!(function = %decl.name, depth = self.env.depth() + 1, "call");
        self.env.push_frame(frame);
        let flow = self.execute_block(&decl.body);
        self.env.pop_frame();

        let result = match flow? {
            Flow::Return(value) => value,
            _ => Value::null(),
        };
        if let Some(tag) = decl.return_type {
            check_tag(tag, &result).map_err(|_| {
                type_error(format!(
                    "`{}` declared return type {tag}, got {}",
                    decl.name,
                    result.type_name()
                ))
            })?;
        }
        Ok(result)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Float(n) => Value::float(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Null => Value::null(),
    }
}

fn check_tag(tag: TypeTag, value: &Value) -> Result<()> {
    let matches = matches!(
        (tag, value.kind()),
        (TypeTag::Int, ValueKind::Int(_))
            | (TypeTag::Float, ValueKind::Int(_) | ValueKind::Float(_))
            | (TypeTag::String, ValueKind::String(_))
            | (TypeTag::Bool, ValueKind::Bool(_))
    );
    if matches {
        Ok(())
    } else {
        Err(type_error(format!(
            "expected {tag}, got {}",
            value.type_name()
        )))
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> crate::diagnostics::PyppError {
    type_error(format!(
        "unsupported operand types for `{}`: {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow(op: BinaryOp) -> crate::diagnostics::PyppError {
    runtime_error(format!("integer overflow in `{}`", op.symbol()))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    use ValueKind::*;

    match op {
        BinaryOp::Add => match (left.kind(), right.kind()) {
            (Int(a), Int(b)) => a.checked_add(*b).map(Value::int).ok_or_else(|| overflow(op)),
            (String(a), String(b)) => Ok(Value::string(format!("{a}{b}"))),
            (Array(a), Array(b)) => {
                let mut joined = a.borrow().clone();
                joined.extend(b.borrow().iter().cloned());
                Ok(Value::array(joined))
            }
            _ => float_op(op, left, right, |a, b| a + b),
        },
        BinaryOp::Sub => match (left.kind(), right.kind()) {
            (Int(a), Int(b)) => a.checked_sub(*b).map(Value::int).ok_or_else(|| overflow(op)),
            _ => float_op(op, left, right, |a, b| a - b),
        },
        BinaryOp::Mul => match (left.kind(), right.kind()) {
            (Int(a), Int(b)) => a.checked_mul(*b).map(Value::int).ok_or_else(|| overflow(op)),
            (String(s), Int(n)) | (Int(n), String(s)) => {
                repeat_text(s, (*n).max(0)).map(Value::string)
            }
            _ => float_op(op, left, right, |a, b| a * b),
        },
        BinaryOp::Div => {
            let (a, b) = numbers(op, left, right)?;
            if b == 0.0 {
                return Err(runtime_error("division by zero"));
            }
            Ok(Value::float(a / b))
        }
        BinaryOp::Mod => match (left.kind(), right.kind()) {
            (Int(a), Int(b)) => {
                if *b == 0 {
                    return Err(runtime_error("division by zero"));
                }
                let rem = a.checked_rem(*b).ok_or_else(|| overflow(op))?;
                Ok(Value::int(if rem != 0 && (rem < 0) != (*b < 0) {
                    rem + b
                } else {
                    rem
                }))
            }
            _ => {
                let (a, b) = numbers(op, left, right)?;
                if b == 0.0 {
                    return Err(runtime_error("division by zero"));
                }
                let rem = a % b;
                Ok(Value::float(if rem != 0.0 && (rem < 0.0) != (b < 0.0) {
                    rem + b
                } else {
                    rem
                }))
            }
        },
        BinaryOp::Equal => Ok(Value::bool(left.equals(right))),
        BinaryOp::NotEqual => Ok(Value::bool(!left.equals(right))),
        BinaryOp::Less => compare(op, left, right, |ord| ord.is_lt()),
        BinaryOp::LessEqual => compare(op, left, right, |ord| ord.is_le()),
        BinaryOp::Greater => compare(op, left, right, |ord| ord.is_gt()),
        BinaryOp::GreaterEqual => compare(op, left, right, |ord| ord.is_ge()),
        BinaryOp::And => Ok(Value::bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::bool(left.is_truthy() || right.is_truthy())),
    }
}

fn numbers(op: BinaryOp, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(unsupported(op, left, right)),
    }
}

fn float_op(op: BinaryOp, left: &Value, right: &Value, func: fn(f64, f64) -> f64) -> Result<Value> {
    let (a, b) = numbers(op, left, right)?;
    Ok(Value::float(func(a, b)))
}

fn compare(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    test: fn(std::cmp::Ordering) -> bool,
) -> Result<Value> {
    let ordering = match (left.kind(), right.kind()) {
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        _ => {
            let (a, b) = numbers(op, left, right).map_err(|_| {
                type_error(format!(
                    "cannot compare {} and {} with `{}`",
                    left.type_name(),
                    right.type_name(),
                    op.symbol()
                ))
            })?;
            a.partial_cmp(&b)
        }
    };
    // NaN compares false against everything.
    Ok(Value::bool(ordering.map(test).unwrap_or(false)))
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Negate => match value.kind() {
            ValueKind::Int(n) => n
                .checked_neg()
                .map(Value::int)
                .ok_or_else(|| runtime_error("integer overflow in unary `-`")),
            ValueKind::Float(n) => Ok(Value::float(-n)),
            _ => Err(type_error(format!(
                "unary `-` expects a number, got {}",
                value.type_name()
            ))),
        },
        UnaryOp::Not => Ok(Value::bool(!value.is_truthy())),
    }
}
