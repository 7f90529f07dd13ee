use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{BinOp, BoolOp, Expr, FunctionDef, Stmt, StmtKind};
use crate::builtins::{self, collections, computation, io};
use crate::error::{Exception, ExceptionKind};
use crate::loops;
use crate::parser::Mode;
use crate::probe::compile;
use crate::types::{Args, Class, CompilerFlags, Env, Function, Instance, State, Value};

/// Nesting limit for user function calls.
pub const MAX_DEPTH: usize = 100;

/// Captured result of running one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub stdout: String,
    /// Traceback or syntax error text; empty on success.
    pub stderr: String,
    /// Flags in effect after the unit, including any it declared.
    pub flags: CompilerFlags,
}

impl Execution {
    pub fn succeeded(&self) -> bool {
        self.stderr.is_empty()
    }
}

/// The code execution engine behind a console session.
pub trait Evaluator {
    /// Compile and run one interactive unit under `flags`.
    fn execute(&mut self, unit: &str, flags: CompilerFlags) -> Execution;

    /// Compile and run a whole script under `flags`.
    fn run_script(&mut self, source: &str, flags: CompilerFlags) -> Execution;

    /// Forget every binding made so far.
    fn reset(&mut self);

    /// Names currently visible at top level, for completion.
    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

// ========== Interpreter ==========

/// Tree-walking interpreter for the host language.
pub struct Interpreter {
    state: State,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let mut state = State::new();
        builtins::register_builtins(&mut state);
        Interpreter { state }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    fn run(&mut self, source: &str, mode: Mode, flags: CompilerFlags) -> Execution {
        let unit = match compile(source, mode) {
            Ok(unit) => unit,
            Err(err) => {
                debug!(%err, "unit failed to compile");
                return Execution {
                    stdout: String::new(),
                    stderr: err.render(source),
                    flags,
                };
            }
        };

        let flags = flags | unit.future;
        self.state.flags = flags;
        self.state.stdout.clear();
        self.state.depth = 0;

        let stderr = match exec_module(&mut self.state, &unit.body, mode == Mode::Single) {
            Ok(()) => String::new(),
            Err(exc) => {
                debug!(%exc, "unit raised");
                exc.traceback()
            }
        };
        Execution {
            stdout: std::mem::take(&mut self.state.stdout),
            stderr,
            flags,
        }
    }
}

impl Evaluator for Interpreter {
    fn execute(&mut self, unit: &str, flags: CompilerFlags) -> Execution {
        self.run(unit, Mode::Single, flags)
    }

    fn run_script(&mut self, source: &str, flags: CompilerFlags) -> Execution {
        self.run(source, Mode::Exec, flags)
    }

    fn reset(&mut self) {
        *self = Interpreter::new();
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.globals.vars.borrow().keys().cloned().collect();
        names.extend(self.state.builtins.keys().map(|name| name.to_string()));
        names.sort();
        names.dedup();
        names
    }
}

// ========== Frames ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Function,
    Class,
}

/// Outcome of executing a statement.
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Name resolution context for the code being executed.
pub struct Frame {
    env: Rc<Env>,
    kind: ScopeKind,
    /// Names declared `global` in a function body.
    declared_global: HashSet<String>,
    /// Echo expression statement results (interactive top level).
    echo: bool,
    /// Scope captured by functions defined in this frame.
    closure: Option<Rc<Env>>,
}

impl Frame {
    fn module(state: &State, echo: bool) -> Self {
        Frame {
            env: state.globals.clone(),
            kind: ScopeKind::Module,
            declared_global: HashSet::new(),
            echo,
            closure: None,
        }
    }

    fn writes_global(&self, name: &str) -> bool {
        self.kind == ScopeKind::Module || self.declared_global.contains(name)
    }

    pub fn lookup(&self, state: &State, name: &str) -> Result<Value, Exception> {
        let local = if self.writes_global(name) {
            None
        } else {
            self.env.lookup(name)
        };
        local
            .or_else(|| state.globals.lookup(name))
            .or_else(|| state.builtins.get(name).cloned())
            .ok_or_else(|| Exception::name_error(name))
    }

    pub fn assign(&self, state: &State, name: &str, value: Value) {
        if self.writes_global(name) {
            state.globals.set(name, value);
        } else {
            self.env.set(name, value);
        }
    }

    fn delete(&self, state: &State, name: &str) -> Result<(), Exception> {
        let env = if self.writes_global(name) {
            &state.globals
        } else {
            &self.env
        };
        match env.vars.borrow_mut().remove(name) {
            Some(_) => Ok(()),
            None => Err(Exception::name_error(name)),
        }
    }
}

/// Run a compiled module body at top level.
pub fn exec_module(state: &mut State, body: &[Stmt], echo: bool) -> Result<(), Exception> {
    let frame = Frame::module(state, echo);
    exec_block(state, &frame, body).map(|_| ())
}

// ========== Statements ==========

pub fn exec_block(state: &mut State, frame: &Frame, body: &[Stmt]) -> Result<Flow, Exception> {
    for stmt in body {
        let flow = exec_stmt(state, frame, stmt).map_err(|e| e.at_line(stmt.line))?;
        if !matches!(flow, Flow::Normal) {
            return Ok(flow);
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(state: &mut State, frame: &Frame, stmt: &Stmt) -> Result<Flow, Exception> {
    trace!(line = stmt.line, "exec");
    match &stmt.kind {
        StmtKind::Expr(expr) => {
            let value = eval_expr(state, frame, expr)?;
            if frame.echo && !value.is_none() {
                let text = io::repr(state, &value)?;
                state.stdout.push_str(&text);
                state.stdout.push('\n');
                state.builtins.insert("_", value);
            }
        }
        StmtKind::Assign { targets, value } => {
            let value = eval_expr(state, frame, value)?;
            for target in targets {
                assign_target(state, frame, target, value.clone())?;
            }
        }
        StmtKind::AugAssign { target, op, value } => exec_aug_assign(state, frame, target, *op, value)?,
        StmtKind::Pass | StmtKind::Global(_) => {}
        StmtKind::Break => return Ok(Flow::Break),
        StmtKind::Continue => return Ok(Flow::Continue),
        StmtKind::Return(value) => {
            let value = match value {
                Some(expr) => eval_expr(state, frame, expr)?,
                None => Value::None,
            };
            return Ok(Flow::Return(value));
        }
        StmtKind::Raise(value) => {
            return Err(match value {
                Some(expr) => {
                    let value = eval_expr(state, frame, expr)?;
                    to_exception(value)
                }
                None => Exception::new(ExceptionKind::RuntimeError, "No active exception to reraise"),
            })
        }
        StmtKind::Assert { test, msg } => {
            if !eval_expr(state, frame, test)?.truthy() {
                let message = match msg {
                    Some(expr) => {
                        let value = eval_expr(state, frame, expr)?;
                        io::to_str(state, &value)?
                    }
                    None => String::new(),
                };
                return Err(Exception::new(ExceptionKind::AssertionError, message));
            }
        }
        StmtKind::Del(targets) => {
            for target in targets {
                delete_target(state, frame, target)?;
            }
        }
        StmtKind::Import(names) => {
            let name = names.first().map(String::as_str).unwrap_or("");
            return Err(Exception::new(
                ExceptionKind::ImportError,
                format!("No module named {}", name),
            ));
        }
        StmtKind::ImportFrom { module, .. } => {
            // Future imports took effect at compile time.
            if module != "__future__" {
                return Err(Exception::new(
                    ExceptionKind::ImportError,
                    format!("No module named {}", module),
                ));
            }
        }
        StmtKind::If { test, body, orelse } => {
            let branch = if eval_expr(state, frame, test)?.truthy() {
                body
            } else {
                orelse
            };
            return exec_block(state, frame, branch);
        }
        StmtKind::While { test, body, orelse } => {
            return loops::execute_while(state, frame, test, body, orelse)
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => return loops::execute_for(state, frame, target, iter, body, orelse),
        StmtKind::FunctionDef(def) => {
            let function = make_function(state, frame, def)?;
            frame.assign(state, &def.name, function);
        }
        StmtKind::ClassDef { name, bases, body } => {
            let class = make_class(state, frame, name, bases, body)?;
            frame.assign(state, name, class);
        }
    }
    Ok(Flow::Normal)
}

fn exec_aug_assign(
    state: &mut State,
    frame: &Frame,
    target: &Expr,
    op: BinOp,
    value: &Expr,
) -> Result<(), Exception> {
    match target {
        Expr::Name(name) => {
            let current = frame.lookup(state, name)?;
            let rhs = eval_expr(state, frame, value)?;
            let result = in_place_op(state, op, current, rhs)?;
            frame.assign(state, name, result);
        }
        Expr::Attribute { value: object, attr } => {
            let object = eval_expr(state, frame, object)?;
            let current = get_attr(&object, attr)?;
            let rhs = eval_expr(state, frame, value)?;
            let result = in_place_op(state, op, current, rhs)?;
            set_attr(&object, attr, result)?;
        }
        Expr::Subscript { value: object, index } => {
            let object = eval_expr(state, frame, object)?;
            let index = eval_expr(state, frame, index)?;
            let current = collections::get_item(state, &object, &index)?;
            let rhs = eval_expr(state, frame, value)?;
            let result = in_place_op(state, op, current, rhs)?;
            collections::set_item(&object, index, result)?;
        }
        _ => return Err(Exception::type_error("illegal expression for augmented assignment")),
    }
    Ok(())
}

/// `+=` extends lists in place; everything else rebinds.
fn in_place_op(
    state: &mut State,
    op: BinOp,
    current: Value,
    rhs: Value,
) -> Result<Value, Exception> {
    if let (BinOp::Add, Value::List(items)) = (op, &current) {
        let extra = collections::iterate(&rhs)?;
        items.borrow_mut().extend(extra);
        return Ok(current);
    }
    computation::binary_op(state, op, &current, &rhs)
}

/// Bind `value` to an assignment target.
pub fn assign_target(state: &mut State, frame: &Frame, target: &Expr, value: Value) -> Result<(), Exception> {
    match target {
        Expr::Name(name) => {
            frame.assign(state, name, value);
            Ok(())
        }
        Expr::Attribute { value: object, attr } => {
            let object = eval_expr(state, frame, object)?;
            set_attr(&object, attr, value)
        }
        Expr::Subscript { value: object, index } => {
            let object = eval_expr(state, frame, object)?;
            let index = eval_expr(state, frame, index)?;
            collections::set_item(&object, index, value)
        }
        Expr::Tuple(targets) | Expr::List(targets) => {
            let values = collections::iterate(&value)?;
            if values.len() > targets.len() {
                return Err(Exception::value_error(format!(
                    "too many values to unpack (expected {})",
                    targets.len()
                )));
            }
            if values.len() < targets.len() {
                return Err(Exception::value_error(format!(
                    "not enough values to unpack (expected {}, got {})",
                    targets.len(),
                    values.len()
                )));
            }
            for (target, value) in targets.iter().zip(values) {
                assign_target(state, frame, target, value)?;
            }
            Ok(())
        }
        _ => Err(Exception::type_error("can't assign to expression")),
    }
}

fn delete_target(state: &mut State, frame: &Frame, target: &Expr) -> Result<(), Exception> {
    match target {
        Expr::Name(name) => frame.delete(state, name),
        Expr::Subscript { value, index } => {
            let object = eval_expr(state, frame, value)?;
            let index = eval_expr(state, frame, index)?;
            collections::del_item(state, &object, &index)
        }
        Expr::Attribute { value, attr } => {
            let object = eval_expr(state, frame, value)?;
            let removed = match &object {
                Value::Instance(instance) => instance.attrs.borrow_mut().remove(attr),
                Value::Class(class) => class.attrs.borrow_mut().remove(attr),
                _ => None,
            };
            removed
                .map(|_| ())
                .ok_or_else(|| no_attribute(&object, attr))
        }
        Expr::Tuple(items) | Expr::List(items) => {
            items.iter().try_for_each(|item| delete_target(state, frame, item))
        }
        _ => Err(Exception::type_error("can't delete expression")),
    }
}

/// Convert a raised value into the exception it stands for.
fn to_exception(value: Value) -> Exception {
    match value {
        Value::Exception(exc) => (*exc).clone(),
        Value::ExceptionType(kind) => Exception::new(kind, ""),
        other => Exception::type_error(format!(
            "exceptions must derive from BaseException, not {}",
            other.type_name()
        )),
    }
}

fn make_function(state: &mut State, frame: &Frame, def: &Rc<FunctionDef>) -> Result<Value, Exception> {
    let mut defaults = Vec::with_capacity(def.params.len());
    for param in &def.params {
        defaults.push(match &param.default {
            Some(expr) => Some(eval_expr(state, frame, expr)?),
            None => None,
        });
    }
    Ok(Value::Function(Rc::new(Function {
        def: def.clone(),
        defaults,
        closure: frame.closure.clone(),
    })))
}

fn make_class(
    state: &mut State,
    frame: &Frame,
    name: &str,
    bases: &[Expr],
    body: &[Stmt],
) -> Result<Value, Exception> {
    let mut base_classes = Vec::with_capacity(bases.len());
    for base in bases {
        match eval_expr(state, frame, base)? {
            Value::Class(class) => base_classes.push(class),
            other => {
                return Err(Exception::type_error(format!(
                    "cannot use {} as a base class",
                    other.type_name()
                )))
            }
        }
    }

    let env = Env::new(frame.closure.clone());
    let class_frame = Frame {
        env: env.clone(),
        kind: ScopeKind::Class,
        declared_global: HashSet::new(),
        echo: false,
        closure: frame.closure.clone(),
    };
    exec_block(state, &class_frame, body)?;

    let attrs: HashMap<String, Value> = env.vars.take();
    Ok(Value::Class(Rc::new(Class {
        name: name.to_string(),
        bases: base_classes,
        attrs: RefCell::new(attrs),
    })))
}

/// Names a function body declares `global`, outside nested definitions.
fn declared_globals(body: &[Stmt], names: &mut HashSet<String>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Global(list) => names.extend(list.iter().cloned()),
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => {
                declared_globals(body, names);
                declared_globals(orelse, names);
            }
            _ => {}
        }
    }
}

// ========== Expressions ==========

pub fn eval_expr(state: &mut State, frame: &Frame, expr: &Expr) -> Result<Value, Exception> {
    match expr {
        Expr::Name(name) => frame.lookup(state, name),
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Ok(Value::str(s.as_str())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::None => Ok(Value::None),
        Expr::List(items) => Ok(Value::list(eval_all(state, frame, items)?)),
        Expr::Tuple(items) => Ok(Value::tuple(eval_all(state, frame, items)?)),
        Expr::Dict(pairs) => {
            let mut items = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                let key = eval_expr(state, frame, key)?;
                let value = eval_expr(state, frame, value)?;
                key.check_hashable()?;
                collections::dict_insert(&mut items, key, value);
            }
            Ok(Value::dict(items))
        }
        Expr::Unary { op, operand } => {
            let value = eval_expr(state, frame, operand)?;
            computation::unary_op(*op, &value)
        }
        Expr::Binary { op, left, right } => {
            let left = eval_expr(state, frame, left)?;
            let right = eval_expr(state, frame, right)?;
            computation::binary_op(state, *op, &left, &right)
        }
        Expr::BoolOp { op, left, right } => {
            let left = eval_expr(state, frame, left)?;
            let short_circuit = match op {
                BoolOp::And => !left.truthy(),
                BoolOp::Or => left.truthy(),
            };
            if short_circuit {
                Ok(left)
            } else {
                eval_expr(state, frame, right)
            }
        }
        Expr::Compare { left, ops } => {
            let mut left = eval_expr(state, frame, left)?;
            for (op, right) in ops {
                let right = eval_expr(state, frame, right)?;
                if !computation::compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::IfExp { test, body, orelse } => {
            if eval_expr(state, frame, test)?.truthy() {
                eval_expr(state, frame, body)
            } else {
                eval_expr(state, frame, orelse)
            }
        }
        Expr::Call { func, args, keywords } => {
            let callee = eval_expr(state, frame, func)?;
            let positional = eval_all(state, frame, args)?;
            let mut named = Vec::with_capacity(keywords.len());
            for (name, value) in keywords {
                named.push((name.clone(), eval_expr(state, frame, value)?));
            }
            call_value(state, &callee, positional, named)
        }
        Expr::Attribute { value, attr } => {
            let object = eval_expr(state, frame, value)?;
            get_attr(&object, attr)
        }
        Expr::Subscript { value, index } => {
            let object = eval_expr(state, frame, value)?;
            let index = eval_expr(state, frame, index)?;
            collections::get_item(state, &object, &index)
        }
    }
}

fn eval_all(state: &mut State, frame: &Frame, exprs: &[Expr]) -> Result<Vec<Value>, Exception> {
    exprs.iter().map(|expr| eval_expr(state, frame, expr)).collect()
}

// ========== Calls ==========

/// Call any callable value.
pub fn call_value(
    state: &mut State,
    callee: &Value,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    match callee {
        Value::Function(function) => call_function(state, function, positional, keywords),
        Value::BoundMethod(receiver, function) => {
            let mut args = Vec::with_capacity(positional.len() + 1);
            args.push((**receiver).clone());
            args.extend(positional);
            call_function(state, function, args, keywords)
        }
        Value::Builtin(builtin) => (builtin.func)(state, Args { positional, keywords }),
        Value::BuiltinMethod(receiver, name) => {
            collections::call_method(state, receiver, name, Args { positional, keywords })
        }
        Value::Class(class) => instantiate(state, class, positional, keywords),
        Value::ExceptionType(kind) => {
            if !keywords.is_empty() {
                return Err(Exception::type_error(format!(
                    "{}() takes no keyword arguments",
                    kind
                )));
            }
            let message = match positional.as_slice() {
                [] => String::new(),
                [single] => io::to_str(state, single)?,
                _ => io::repr(state, &Value::tuple(positional))?,
            };
            Ok(Value::Exception(Rc::new(Exception::new(*kind, message))))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

fn call_function(
    state: &mut State,
    function: &Rc<Function>,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    let env = Env::new(function.closure.clone());
    bind_arguments(function, &env, positional, keywords)?;

    if state.depth >= MAX_DEPTH {
        return Err(Exception::new(
            ExceptionKind::RuntimeError,
            "maximum recursion depth exceeded",
        ));
    }

    let mut declared_global = HashSet::new();
    declared_globals(&function.def.body, &mut declared_global);
    let frame = Frame {
        env: env.clone(),
        kind: ScopeKind::Function,
        declared_global,
        echo: false,
        closure: Some(env),
    };

    state.depth += 1;
    let result = exec_block(state, &frame, &function.def.body);
    state.depth -= 1;

    match result? {
        Flow::Return(value) => Ok(value),
        _ => Ok(Value::None),
    }
}

fn bind_arguments(
    function: &Function,
    env: &Env,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<(), Exception> {
    let def = &function.def;
    let params = &def.params;
    if positional.len() > params.len() {
        return Err(Exception::type_error(format!(
            "{}() takes {} positional argument{} but {} were given",
            def.name,
            params.len(),
            if params.len() == 1 { "" } else { "s" },
            positional.len()
        )));
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(positional) {
        *slot = Some(value);
    }
    for (name, value) in keywords {
        let idx = params.iter().position(|p| p.name == name).ok_or_else(|| {
            Exception::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                def.name, name
            ))
        })?;
        if slots[idx].is_some() {
            return Err(Exception::type_error(format!(
                "{}() got multiple values for argument '{}'",
                def.name, name
            )));
        }
        slots[idx] = Some(value);
    }

    for ((param, slot), default) in params.iter().zip(slots).zip(&function.defaults) {
        let value = slot.or_else(|| default.clone()).ok_or_else(|| {
            Exception::type_error(format!(
                "{}() missing required argument: '{}'",
                def.name, param.name
            ))
        })?;
        env.set(&param.name, value);
    }
    Ok(())
}

fn instantiate(
    state: &mut State,
    class: &Rc<Class>,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    let instance = Value::Instance(Rc::new(Instance {
        class: class.clone(),
        attrs: RefCell::new(HashMap::new()),
    }));
    match class.lookup("__init__") {
        Some(Value::Function(init)) => {
            let mut args = Vec::with_capacity(positional.len() + 1);
            args.push(instance.clone());
            args.extend(positional);
            let result = call_function(state, &init, args, keywords)?;
            if !result.is_none() {
                return Err(Exception::type_error("__init__() should return None"));
            }
        }
        Some(other) => {
            call_value(state, &other, positional, keywords)?;
        }
        None if !positional.is_empty() || !keywords.is_empty() => {
            return Err(Exception::type_error(format!("{}() takes no arguments", class.name)));
        }
        None => {}
    }
    Ok(instance)
}

// ========== Attributes ==========

fn no_attribute(object: &Value, attr: &str) -> Exception {
    let owner = match object {
        Value::Instance(instance) => format!("'{}' object", instance.class.name),
        Value::Class(class) => format!("class {}", class.name),
        other => format!("'{}' object", other.type_name()),
    };
    Exception::new(
        ExceptionKind::AttributeError,
        format!("{} has no attribute '{}'", owner, attr),
    )
}

/// Read `object.attr`; functions found on an instance's class are bound.
pub fn get_attr(object: &Value, attr: &str) -> Result<Value, Exception> {
    let found = match object {
        Value::Instance(instance) => {
            let own = instance.attrs.borrow().get(attr).cloned();
            own.or_else(|| {
                instance.class.lookup(attr).map(|value| match value {
                    Value::Function(function) => {
                        Value::BoundMethod(Rc::new(object.clone()), function)
                    }
                    other => other,
                })
            })
        }
        Value::Class(class) if attr == "__name__" => Some(Value::str(class.name.as_str())),
        Value::Class(class) => class.lookup(attr),
        Value::Function(function) if attr == "__name__" => Some(Value::str(function.def.name.as_str())),
        Value::Exception(exc) => match attr {
            "message" => Some(Value::str(exc.message.as_str())),
            "args" if exc.message.is_empty() => Some(Value::tuple(Vec::new())),
            "args" => Some(Value::tuple(vec![Value::str(exc.message.as_str())])),
            _ => None,
        },
        _ => collections::method(object, attr),
    };
    found.ok_or_else(|| no_attribute(object, attr))
}

/// Write `object.attr = value` on instances and classes.
pub fn set_attr(object: &Value, attr: &str, value: Value) -> Result<(), Exception> {
    match object {
        Value::Instance(instance) => {
            instance.attrs.borrow_mut().insert(attr.to_string(), value);
            Ok(())
        }
        Value::Class(class) => {
            class.attrs.borrow_mut().insert(attr.to_string(), value);
            Ok(())
        }
        other => Err(Exception::new(
            ExceptionKind::AttributeError,
            format!(
                "'{}' object attribute '{}' is read-only",
                other.type_name(),
                attr
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(interp: &mut Interpreter, source: &str) -> Execution {
        interp.execute(source, CompilerFlags::empty())
    }

    #[test]
    fn test_expression_echo() {
        let mut interp = Interpreter::new();
        assert_eq!(run(&mut interp, "1 + 1").stdout, "2\n");
        assert_eq!(run(&mut interp, "None").stdout, "");
    }

    #[test]
    fn test_assignment_persists() {
        let mut interp = Interpreter::new();
        assert!(run(&mut interp, "x = 41").succeeded());
        assert_eq!(run(&mut interp, "x + 1").stdout, "42\n");
    }

    #[test]
    fn test_classic_division_unless_flagged() {
        let mut interp = Interpreter::new();
        assert_eq!(run(&mut interp, "7 / 2").stdout, "3\n");
        let exec = interp.execute("7 / 2", CompilerFlags::DIVISION);
        assert_eq!(exec.stdout, "3.5\n");
    }

    #[test]
    fn test_future_import_reports_flags() {
        let mut interp = Interpreter::new();
        let exec = run(&mut interp, "from __future__ import division");
        assert!(exec.flags.contains(CompilerFlags::DIVISION));
    }

    #[test]
    fn test_function_and_closure() {
        let mut interp = Interpreter::new();
        let src = "def outer(n):\n    def inner(m):\n        return n + m\n    return inner\n";
        assert!(interp.run_script(src, CompilerFlags::empty()).succeeded());
        assert_eq!(run(&mut interp, "outer(2)(3)").stdout, "5\n");
    }

    #[test]
    fn test_global_declaration() {
        let mut interp = Interpreter::new();
        let src = "count = 0\ndef bump():\n    global count\n    count += 1\nbump()\nbump()\nprint(count)\n";
        assert_eq!(interp.run_script(src, CompilerFlags::empty()).stdout, "2\n");
    }

    #[test]
    fn test_traceback_on_error() {
        let mut interp = Interpreter::new();
        let exec = run(&mut interp, "undefined_name");
        assert_eq!(exec.stdout, "");
        assert_eq!(
            exec.stderr,
            "Traceback (most recent call last):\n  File \"<input>\", line 1, in <module>\nNameError: name 'undefined_name' is not defined\n"
        );
    }

    #[test]
    fn test_syntax_error_in_script() {
        let mut interp = Interpreter::new();
        let exec = interp.run_script("x = (", CompilerFlags::empty());
        assert!(exec.stderr.contains("SyntaxError"));
    }

    #[test]
    fn test_class_with_method() {
        let mut interp = Interpreter::new();
        let src = "class Counter:\n    def __init__(self, start=0):\n        self.n = start\n    def add(self, k):\n        self.n += k\n        return self.n\nc = Counter(5)\n";
        assert!(interp.run_script(src, CompilerFlags::empty()).succeeded());
        assert_eq!(run(&mut interp, "c.add(2)").stdout, "7\n");
    }

    #[test]
    fn test_reset_forgets_bindings() {
        let mut interp = Interpreter::new();
        run(&mut interp, "x = 1");
        interp.reset();
        assert!(!run(&mut interp, "x").succeeded());
    }

    #[test]
    fn test_echo_inside_top_level_loop() {
        let mut interp = Interpreter::new();
        assert_eq!(run(&mut interp, "for i in range(3): i").stdout, "0\n1\n2\n");
    }

    #[test]
    fn test_underscore_holds_last_result() {
        let mut interp = Interpreter::new();
        run(&mut interp, "6 * 7");
        assert_eq!(run(&mut interp, "_").stdout, "42\n");
    }
}
