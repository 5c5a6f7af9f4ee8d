//! The tree-walking interpreter.
//!
//! A [`Runtime`] owns a set of module instances. Instantiating a module
//! binds its imports to instances that already exist, binds its function
//! globals and runs its `init` function once. Evaluation walks the IR
//! expression tree directly.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::Arc;

use zuri_common::Fingerprint;
use zuri_ir::{
    BinaryOp, Builtin, Expr, ExprKind, GlobalId, GlobalKind, IrModule, IrSpan, Stmt, UnaryOp,
};
use zuri_lower::{Session, SessionImport, SessionSymbol};
use zuri_source::ModuleId;

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::value::{FunctionRef, Value};

/// Default limit on nested calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Where `print` output goes.
enum Output {
    Capture(Vec<String>),
    Stream(Box<dyn Write + Send>),
}

struct Instance {
    ir: Arc<IrModule>,
    fingerprint: Fingerprint,
    globals: Vec<Option<Value>>,
    /// Instance index per import, in import order.
    imports: Vec<usize>,
}

#[derive(Clone, Copy)]
struct SessionSlot {
    instance: usize,
    global: GlobalId,
    mutable: bool,
}

/// What [`Runtime::instantiate`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instantiated {
    /// Index of the instance.
    pub instance: usize,
    /// `false` when an instance with the same fingerprint already existed
    /// and nothing ran.
    pub fresh: bool,
    /// Value of the last top-level expression or binding, if any.
    pub value: Option<Value>,
}

enum Flow {
    Next,
    Return(Value),
}

struct Frame {
    instance: usize,
    locals: Vec<Option<Value>>,
}

/// Executes IR modules.
pub struct Runtime {
    instances: Vec<Instance>,
    by_name: HashMap<String, usize>,
    session: BTreeMap<String, SessionSlot>,
    namespaces: BTreeMap<String, SessionImport>,
    output: Output,
    max_depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A runtime that captures `print` output; see [`Runtime::take_output`].
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            by_name: HashMap::new(),
            session: BTreeMap::new(),
            namespaces: BTreeMap::new(),
            output: Output::Capture(Vec::new()),
            max_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// A runtime that writes `print` output to `writer` as it happens.
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            output: Output::Stream(writer),
            ..Self::new()
        }
    }

    /// Sets the limit on nested calls.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Returns and clears captured `print` output.
    pub fn take_output(&mut self) -> Vec<String> {
        match &mut self.output {
            Output::Capture(lines) => std::mem::take(lines),
            Output::Stream(_) => Vec::new(),
        }
    }

    /// Whether a module named `name` is instantiated.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Reads an exported global of an instantiated module.
    pub fn global(&self, module: &str, name: &str) -> Option<&Value> {
        let instance = &self.instances[*self.by_name.get(module)?];
        let (id, _) = instance.ir.export(name)?;
        instance.globals.get(id.as_raw() as usize)?.as_ref()
    }

    /// Instantiates `ir` and runs its initializer.
    ///
    /// Every import must already be instantiated with the fingerprint the
    /// module was compiled against. A module whose fingerprint is already
    /// loaded is not run again. If the initializer fails, the instance is
    /// discarded.
    pub fn instantiate(
        &mut self,
        fingerprint: Fingerprint,
        ir: Arc<IrModule>,
    ) -> Result<Instantiated, RuntimeError> {
        if let Some(&existing) = self.by_name.get(&ir.name) {
            if self.instances[existing].fingerprint == fingerprint {
                return Ok(Instantiated {
                    instance: existing,
                    fresh: false,
                    value: None,
                });
            }
        }

        let mut imports = Vec::with_capacity(ir.imports.len());
        for (_, import) in ir.imports.iter() {
            let found = self
                .by_name
                .get(&import.module)
                .copied()
                .filter(|&idx| self.instances[idx].fingerprint == import.fingerprint);
            match found {
                Some(idx) => imports.push(idx),
                None => {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::UnknownModule,
                        format!(
                            "module '{}' imports '{}', which is not loaded at fingerprint {}",
                            ir.name,
                            import.module,
                            import.fingerprint.short()
                        ),
                        ir.name.clone(),
                        IrSpan::default(),
                    ))
                }
            }
        }

        let index = self.instances.len();
        let globals = ir
            .globals
            .iter()
            .map(|(_, global)| match global.kind {
                GlobalKind::Function(func) => Some(Value::Function(FunctionRef {
                    instance: index,
                    func,
                })),
                GlobalKind::Value => None,
            })
            .collect();
        let previous = self.by_name.insert(ir.name.clone(), index);
        self.instances.push(Instance {
            ir: ir.clone(),
            fingerprint,
            globals,
            imports,
        });
        tracing::debug!(module = %ir.name, fingerprint = %fingerprint.short(), "instantiating module");

        match self.run_init(index, &ir) {
            Ok(value) => Ok(Instantiated {
                instance: index,
                fresh: true,
                value,
            }),
            Err(err) => {
                self.instances.pop();
                match previous {
                    Some(prev) => self.by_name.insert(ir.name.clone(), prev),
                    None => self.by_name.remove(&ir.name),
                };
                Err(err)
            }
        }
    }

    /// Makes every global and imported namespace of `instance` visible to
    /// later fragments. A name rebound by the instance replaces the older
    /// binding of either kind.
    pub fn expose_globals(&mut self, instance: usize) {
        let Some(inst) = self.instances.get(instance) else {
            return;
        };
        for (id, global) in inst.ir.globals.iter() {
            let name = inst.ir.symbols.name(global.name).to_string();
            self.namespaces.remove(&name);
            self.session.insert(
                name,
                SessionSlot {
                    instance,
                    global: id,
                    mutable: global.mutable,
                },
            );
        }
        for ((_, import), &target) in inst.ir.imports.iter().zip(&inst.imports) {
            let Ok(module) = ModuleId::parse(&import.module) else {
                continue;
            };
            let alias = inst.ir.symbols.name(import.alias).to_string();
            self.session.remove(&alias);
            self.namespaces.insert(
                alias.clone(),
                SessionImport {
                    alias,
                    module,
                    fingerprint: self.instances[target].fingerprint,
                },
            );
        }
    }

    /// The session globals, sorted by name.
    pub fn session_symbols(&self) -> Vec<SessionSymbol> {
        self.session
            .iter()
            .map(|(name, slot)| SessionSymbol {
                name: name.clone(),
                mutable: slot.mutable,
            })
            .collect()
    }

    /// The namespaces earlier fragments imported, sorted by alias.
    pub fn session_imports(&self) -> Vec<SessionImport> {
        self.namespaces.values().cloned().collect()
    }

    /// Everything a new fragment may refer to.
    pub fn session(&self) -> Session {
        Session {
            globals: self.session_symbols(),
            imports: self.session_imports(),
        }
    }

    /// The current value of a session global.
    pub fn session_value(&self, name: &str) -> Option<&Value> {
        let slot = self.session.get(name)?;
        self.instances
            .get(slot.instance)?
            .globals
            .get(slot.global.as_raw() as usize)?
            .as_ref()
    }

    /// Drops every instance and session global.
    pub fn reset(&mut self) {
        self.instances.clear();
        self.by_name.clear();
        self.session.clear();
        self.namespaces.clear();
        self.take_output();
    }

    fn run_init(&mut self, index: usize, ir: &IrModule) -> Result<Option<Value>, RuntimeError> {
        let mut frame = Frame {
            instance: index,
            locals: vec![None; ir.init.locals.len()],
        };
        let mut last = None;
        for stmt in &ir.init.body {
            last = match stmt {
                Stmt::Expr(expr) => Some(self.eval(&mut frame, ir, expr, 0)?),
                Stmt::SetGlobal { global, value } => {
                    let value = self.eval(&mut frame, ir, value, 0)?;
                    self.set_global(index, *global, value.clone(), ir, value_span(stmt))?;
                    Some(value)
                }
                other => {
                    if let Flow::Return(_) = self.exec(&mut frame, ir, other, 0)? {
                        return Err(invalid(ir, "return outside a function", value_span(other)));
                    }
                    None
                }
            };
        }
        Ok(last.filter(|v| *v != Value::Unit))
    }

    fn emit(&mut self, line: String) {
        match &mut self.output {
            Output::Capture(lines) => lines.push(line),
            Output::Stream(writer) => {
                if let Err(err) = writeln!(writer, "{line}") {
                    tracing::warn!(error = %err, "failed to write program output");
                }
            }
        }
    }

    fn set_global(
        &mut self,
        instance: usize,
        global: GlobalId,
        value: Value,
        ir: &IrModule,
        span: IrSpan,
    ) -> Result<(), RuntimeError> {
        let slot = self.instances[instance]
            .globals
            .get_mut(global.as_raw() as usize)
            .ok_or_else(|| invalid(ir, "unknown global", span))?;
        *slot = Some(value);
        Ok(())
    }

    fn exec_block(
        &mut self,
        frame: &mut Frame,
        ir: &IrModule,
        body: &[Stmt],
        depth: usize,
    ) -> Result<Flow, RuntimeError> {
        for stmt in body {
            if let Flow::Return(value) = self.exec(frame, ir, stmt, depth)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(
        &mut self,
        frame: &mut Frame,
        ir: &IrModule,
        stmt: &Stmt,
        depth: usize,
    ) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Let { local, value } | Stmt::SetLocal { local, value } => {
                let v = self.eval(frame, ir, value, depth)?;
                let slot = frame
                    .locals
                    .get_mut(local.as_raw() as usize)
                    .ok_or_else(|| invalid(ir, "unknown local", value.span))?;
                *slot = Some(v);
            }
            Stmt::SetGlobal { global, value } => {
                let v = self.eval(frame, ir, value, depth)?;
                self.set_global(frame.instance, *global, v, ir, value.span)?;
            }
            Stmt::SetSession { symbol, value } => {
                let v = self.eval(frame, ir, value, depth)?;
                let name = ir.symbols.name(*symbol);
                let slot = self.session_slot(ir, name, value.span)?;
                self.set_global(slot.instance, slot.global, v, ir, value.span)?;
            }
            Stmt::Expr(expr) => {
                self.eval(frame, ir, expr, depth)?;
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let body = if self.eval_bool(frame, ir, cond, depth)? {
                    then_body
                } else {
                    else_body
                };
                return self.exec_block(frame, ir, body, depth);
            }
            Stmt::While { cond, body } => {
                while self.eval_bool(frame, ir, cond, depth)? {
                    if let Flow::Return(value) = self.exec_block(frame, ir, body, depth)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Return(value) => {
                let v = match value {
                    Some(expr) => self.eval(frame, ir, expr, depth)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Next)
    }

    fn session_slot(&self, ir: &IrModule, name: &str, span: IrSpan) -> Result<SessionSlot, RuntimeError> {
        self.session.get(name).copied().ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::UndefinedGlobal,
                format!("session global `{name}` is not defined"),
                ir.name.clone(),
                span,
            )
        })
    }

    fn read_global(
        &self,
        instance: usize,
        global: GlobalId,
        ir: &IrModule,
        span: IrSpan,
    ) -> Result<Value, RuntimeError> {
        let inst = &self.instances[instance];
        match inst.globals.get(global.as_raw() as usize) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(RuntimeError::new(
                RuntimeErrorKind::UndefinedGlobal,
                format!(
                    "`{}` is used before it is initialized",
                    inst.ir.global_name(global)
                ),
                ir.name.clone(),
                span,
            )),
            None => Err(invalid(ir, "unknown global", span)),
        }
    }

    fn eval_bool(
        &mut self,
        frame: &mut Frame,
        ir: &IrModule,
        expr: &Expr,
        depth: usize,
    ) -> Result<bool, RuntimeError> {
        match self.eval(frame, ir, expr, depth)? {
            Value::Bool(b) => Ok(b),
            other => Err(type_error(
                ir,
                format!("expected Bool, found {}", other.type_name()),
                expr.span,
            )),
        }
    }

    fn eval(
        &mut self,
        frame: &mut Frame,
        ir: &IrModule,
        expr: &Expr,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Const(constant) => Ok(Value::from(constant)),
            ExprKind::Local(local) => match frame.locals.get(local.as_raw() as usize) {
                Some(Some(value)) => Ok(value.clone()),
                Some(None) => Err(RuntimeError::new(
                    RuntimeErrorKind::UndefinedGlobal,
                    "local variable read before assignment",
                    ir.name.clone(),
                    expr.span,
                )),
                None => Err(invalid(ir, "unknown local", expr.span)),
            },
            ExprKind::Global(global) => self.read_global(frame.instance, *global, ir, expr.span),
            ExprKind::Session(symbol) => {
                let slot = self.session_slot(ir, ir.symbols.name(*symbol), expr.span)?;
                self.read_global(slot.instance, slot.global, ir, expr.span)
            }
            ExprKind::Imported { import, symbol } => {
                let dep = *self.instances[frame.instance]
                    .imports
                    .get(import.as_raw() as usize)
                    .ok_or_else(|| invalid(ir, "unknown import", expr.span))?;
                let name = ir.symbols.name(*symbol);
                let dep_ir = self.instances[dep].ir.clone();
                let (global, _) = dep_ir.export(name).ok_or_else(|| {
                    RuntimeError::new(
                        RuntimeErrorKind::UndefinedGlobal,
                        format!("module '{}' does not export `{name}`", dep_ir.name),
                        ir.name.clone(),
                        expr.span,
                    )
                })?;
                self.read_global(dep, global, ir, expr.span)
            }
            ExprKind::Builtin(builtin) => Ok(Value::Builtin(*builtin)),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(frame, ir, operand, depth)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Int(v)) => v
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| overflow(ir, expr.span)),
                    (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
                    (op, other) => Err(type_error(
                        ir,
                        format!("cannot apply {op:?} to {}", other.type_name()),
                        expr.span,
                    )),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(frame, ir, *op, lhs, rhs, expr.span, depth),
            ExprKind::Call { callee, args } => {
                let callee_value = self.eval(frame, ir, callee, depth)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, ir, arg, depth)?);
                }
                self.call(ir, callee_value, values, expr.span, depth)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_binary(
        &mut self,
        frame: &mut Frame,
        ir: &IrModule,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: IrSpan,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        match op {
            BinaryOp::And => {
                return Ok(Value::Bool(
                    self.eval_bool(frame, ir, lhs, depth)? && self.eval_bool(frame, ir, rhs, depth)?,
                ))
            }
            BinaryOp::Or => {
                return Ok(Value::Bool(
                    self.eval_bool(frame, ir, lhs, depth)? || self.eval_bool(frame, ir, rhs, depth)?,
                ))
            }
            _ => {}
        }
        let l = self.eval(frame, ir, lhs, depth)?;
        let r = self.eval(frame, ir, rhs, depth)?;
        let mismatch = |l: &Value, r: &Value| {
            type_error(
                ir,
                format!(
                    "cannot apply `{}` to {} and {}",
                    op.symbol(),
                    l.type_name(),
                    r.type_name()
                ),
                span,
            )
        };
        match (op, &l, &r) {
            (BinaryOp::Eq, _, _) => Ok(Value::Bool(l == r)),
            (BinaryOp::Ne, _, _) => Ok(Value::Bool(l != r)),
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
                Ok(Value::Str(Arc::from(format!("{a}{b}").as_str())))
            }
            (BinaryOp::Div | BinaryOp::Rem, Value::Int(_), Value::Int(0)) => Err(RuntimeError::new(
                RuntimeErrorKind::DivisionByZero,
                "division by zero",
                ir.name.clone(),
                span,
            )),
            (_, Value::Int(a), Value::Int(b)) => {
                let (a, b) = (*a, *b);
                let result = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Rem => a.checked_rem(b),
                    BinaryOp::Lt => return Ok(Value::Bool(a < b)),
                    BinaryOp::Le => return Ok(Value::Bool(a <= b)),
                    BinaryOp::Gt => return Ok(Value::Bool(a > b)),
                    BinaryOp::Ge => return Ok(Value::Bool(a >= b)),
                    _ => return Err(mismatch(&l, &r)),
                };
                result.map(Value::Int).ok_or_else(|| overflow(ir, span))
            }
            (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, Value::Str(a), Value::Str(b)) => {
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::Le => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                }))
            }
            _ => Err(mismatch(&l, &r)),
        }
    }

    fn call(
        &mut self,
        ir: &IrModule,
        callee: Value,
        args: Vec<Value>,
        span: IrSpan,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Builtin(builtin) => self.call_builtin(ir, builtin, args, span),
            Value::Function(target) => self.call_function(ir, target, args, span, depth),
            other => Err(RuntimeError::new(
                RuntimeErrorKind::NotCallable,
                format!("a value of type {} is not callable", other.type_name()),
                ir.name.clone(),
                span,
            )),
        }
    }

    fn call_builtin(
        &mut self,
        ir: &IrModule,
        builtin: Builtin,
        args: Vec<Value>,
        span: IrSpan,
    ) -> Result<Value, RuntimeError> {
        let [arg] = <[Value; 1]>::try_from(args).map_err(|args| {
            arity(ir, builtin.name(), 1, args.len(), span)
        })?;
        match builtin {
            Builtin::Print => {
                self.emit(arg.to_string());
                Ok(Value::Unit)
            }
            Builtin::Str => Ok(Value::Str(Arc::from(arg.to_string().as_str()))),
            Builtin::Len => match arg {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                other => Err(type_error(
                    ir,
                    format!("len expects Str, found {}", other.type_name()),
                    span,
                )),
            },
        }
    }

    fn call_function(
        &mut self,
        ir: &IrModule,
        target: FunctionRef,
        args: Vec<Value>,
        span: IrSpan,
        depth: usize,
    ) -> Result<Value, RuntimeError> {
        if depth >= self.max_depth {
            return Err(RuntimeError::new(
                RuntimeErrorKind::CallDepthExceeded,
                format!("call depth exceeded the limit of {}", self.max_depth),
                ir.name.clone(),
                span,
            ));
        }
        let callee_ir = self
            .instances
            .get(target.instance)
            .map(|inst| inst.ir.clone())
            .ok_or_else(|| invalid(ir, "call into an unknown module", span))?;
        let function = callee_ir
            .functions
            .get(target.func)
            .ok_or_else(|| invalid(ir, "call to an unknown function", span))?;
        if function.params.len() != args.len() {
            let name = callee_ir.symbols.name(function.name);
            return Err(arity(ir, name, function.params.len(), args.len(), span));
        }
        let mut frame = Frame {
            instance: target.instance,
            locals: vec![None; function.locals.len()],
        };
        for (param, arg) in function.params.iter().zip(args) {
            if let Some(slot) = frame.locals.get_mut(param.as_raw() as usize) {
                *slot = Some(arg);
            }
        }
        match self.exec_block(&mut frame, &callee_ir, &function.body, depth + 1)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Unit),
        }
    }
}

fn value_span(stmt: &Stmt) -> IrSpan {
    match stmt {
        Stmt::Let { value, .. }
        | Stmt::SetLocal { value, .. }
        | Stmt::SetGlobal { value, .. }
        | Stmt::SetSession { value, .. }
        | Stmt::Expr(value) => value.span,
        Stmt::If { cond, .. } | Stmt::While { cond, .. } => cond.span,
        Stmt::Return(value) => value.as_ref().map(|v| v.span).unwrap_or_default(),
    }
}

fn invalid(ir: &IrModule, what: &str, span: IrSpan) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::InvalidIr,
        format!("invalid IR in module '{}': {what}", ir.name),
        ir.name.clone(),
        span,
    )
}

fn type_error(ir: &IrModule, message: String, span: IrSpan) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::TypeError, message, ir.name.clone(), span)
}

fn overflow(ir: &IrModule, span: IrSpan) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::IntegerOverflow,
        "integer overflow",
        ir.name.clone(),
        span,
    )
}

fn arity(ir: &IrModule, name: &str, expected: usize, found: usize, span: IrSpan) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::Arity,
        format!("`{name}` takes {expected} argument(s) but {found} were supplied"),
        ir.name.clone(),
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use zuri_common::Interner;
    use zuri_lower::{lower, DependencyInterface, LowerContext};
    use zuri_source::{FileId, ModuleId};

    fn compile(name: &str, source: &str, deps: Vec<DependencyInterface>) -> Arc<IrModule> {
        let interner = Interner::new();
        let tree = zuri_syntax::parse(source, FileId::from_raw(0), &interner).unwrap();
        let ctx = LowerContext::new(ModuleId::parse(name).unwrap(), &interner).with_dependencies(deps);
        Arc::new(lower(&tree, &ctx).unwrap_or_else(|e| panic!("{e}")))
    }

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_raw([byte; 16])
    }

    fn run(source: &str) -> (Result<Instantiated, RuntimeError>, Vec<String>) {
        let mut rt = Runtime::new();
        let result = rt.instantiate(fp(1), compile("app", source, vec![]));
        (result, rt.take_output())
    }

    fn run_err(source: &str) -> RuntimeErrorKind {
        run(source).0.unwrap_err().kind
    }

    #[test]
    fn evaluates_arithmetic_and_print() {
        let (result, output) = run("let x = 1 + 2\nprint(x * 10)\nprint(\"a\" + str(x))");
        assert!(result.unwrap().fresh);
        assert_eq!(output, ["30", "a3"]);
    }

    #[test]
    fn last_binding_is_the_result() {
        let (result, _) = run("let x = 1 + 2");
        assert_eq!(result.unwrap().value, Some(Value::Int(3)));
        let (result, _) = run("print(1)");
        assert_eq!(result.unwrap().value, None);
    }

    #[test]
    fn functions_loops_and_recursion() {
        let source = "def fact(n: Int) -> Int {\n  if n <= 1 { return 1 }\n  return n * fact(n - 1)\n}\n\
                      var total = 0\nvar i = 0\nwhile i < 4 {\n  i = i + 1\n  total = total + i\n}\n\
                      print(fact(5))\nprint(total)\nprint(len(\"hello\"))";
        let (result, output) = run(source);
        result.unwrap();
        assert_eq!(output, ["120", "10", "5"]);
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(run_err("let z = 0\nprint(1 / z)"), RuntimeErrorKind::DivisionByZero);
        assert_eq!(run_err("let m = 9223372036854775807\nprint(m + 1)"), RuntimeErrorKind::IntegerOverflow);
        assert_eq!(run_err("def f(x) { return x + 1 }\nf(\"s\")"), RuntimeErrorKind::TypeError);
        assert_eq!(run_err("def f(x) { return x() }\nf(3)"), RuntimeErrorKind::NotCallable);
    }

    #[test]
    fn call_depth_is_bounded() {
        let mut rt = Runtime::new().with_max_call_depth(16);
        let err = rt
            .instantiate(fp(1), compile("app", "def f(n) { return f(n + 1) }\nf(0)", vec![]))
            .unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::CallDepthExceeded);
        assert_eq!(err.message, "call depth exceeded the limit of 16");
    }

    #[test]
    fn imports_bind_to_loaded_instances() {
        let mut rt = Runtime::new();
        let util = compile("util", "def twice(x: Int) -> Int { return x * 2 }\nlet base = 21", vec![]);
        rt.instantiate(fp(7), util.clone()).unwrap();
        let deps = vec![DependencyInterface {
            module: ModuleId::parse("util").unwrap(),
            fingerprint: fp(7),
            ir: util,
        }];
        let app = compile("app", "import util\nprint(util.twice(util.base))", deps);
        rt.instantiate(fp(8), app.clone()).unwrap();
        assert_eq!(rt.take_output(), ["42"]);
        assert_eq!(rt.global("util", "base"), Some(&Value::Int(21)));

        let again = rt.instantiate(fp(8), app).unwrap();
        assert!(!again.fresh);
        assert!(rt.take_output().is_empty());
    }

    #[test]
    fn missing_import_is_unknown_module() {
        let util = compile("util", "let base = 1", vec![]);
        let deps = vec![DependencyInterface {
            module: ModuleId::parse("util").unwrap(),
            fingerprint: fp(7),
            ir: util.clone(),
        }];
        let app = compile("app", "import util\nprint(util.base)", deps);
        let mut rt = Runtime::new();
        rt.instantiate(fp(9), util).unwrap();
        let err = rt.instantiate(fp(8), app).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::UnknownModule);
        assert!(!rt.is_loaded("app"));
    }

    #[test]
    fn failed_init_is_discarded() {
        let mut rt = Runtime::new();
        let err = rt
            .instantiate(fp(1), compile("app", "let x = 1 / 0", vec![]))
            .unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::DivisionByZero);
        assert_eq!(rt.instance_count(), 0);
    }

    #[test]
    fn session_globals() {
        let mut rt = Runtime::new();
        let first = rt
            .instantiate(fp(1), compile("fragment1", "var count = 1", vec![]))
            .unwrap();
        rt.expose_globals(first.instance);
        assert_eq!(
            rt.session_symbols(),
            vec![SessionSymbol {
                name: "count".into(),
                mutable: true
            }]
        );

        let interner = Interner::new();
        let tree = zuri_syntax::parse("count = count + 41\ncount", FileId::from_raw(0), &interner).unwrap();
        let ctx = LowerContext::new(ModuleId::parse("fragment2").unwrap(), &interner)
            .with_session(rt.session());
        let second = Arc::new(lower(&tree, &ctx).unwrap());
        let result = rt.instantiate(fp(2), second).unwrap();
        assert_eq!(result.value, Some(Value::Int(42)));
        assert_eq!(rt.session_value("count"), Some(&Value::Int(42)));

        rt.reset();
        assert!(rt.session_symbols().is_empty());
    }

    #[test]
    fn session_namespaces() {
        let util = compile("util", "let base = 20
var hits = 0", vec![]);
        let deps = vec![DependencyInterface {
            module: ModuleId::parse("util").unwrap(),
            fingerprint: fp(9),
            ir: util.clone(),
        }];
        let mut rt = Runtime::new();
        rt.instantiate(fp(9), util).unwrap();
        let first = rt
            .instantiate(fp(1), compile("fragment1", "import util", deps.clone()))
            .unwrap();
        rt.expose_globals(first.instance);
        let session = rt.session();
        assert!(session.globals.is_empty());
        assert_eq!(
            session.imports,
            vec![SessionImport {
                alias: "util".into(),
                module: ModuleId::parse("util").unwrap(),
                fingerprint: fp(9),
            }]
        );

        let interner = Interner::new();
        let tree = zuri_syntax::parse("util.base + 1", FileId::from_raw(0), &interner).unwrap();
        let ctx = LowerContext::new(ModuleId::parse("fragment2").unwrap(), &interner)
            .with_dependencies(deps)
            .with_session(session);
        let second = rt.instantiate(fp(2), Arc::new(lower(&tree, &ctx).unwrap())).unwrap();
        assert_eq!(second.value, Some(Value::Int(21)));

        let third = rt
            .instantiate(fp(3), compile("fragment3", "let util = 5", vec![]))
            .unwrap();
        rt.expose_globals(third.instance);
        assert!(rt.session_imports().is_empty());
        assert_eq!(rt.session_value("util"), Some(&Value::Int(5)));

        rt.reset();
        assert!(rt.session().is_empty());
    }

    #[test]
    fn streaming_output() {
        #[derive(Clone, Default)]
        struct Shared(Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let sink = Shared::default();
        let mut rt = Runtime::with_writer(Box::new(sink.clone()));
        rt.instantiate(fp(1), compile("app", "print(\"hi\")", vec![])).unwrap();
        assert_eq!(&*sink.0.lock().unwrap(), b"hi\n");
        assert!(rt.take_output().is_empty());
    }
}
