//! The interpreter façade (parse / evaluate / apply-changes lifecycle)
//! and the recursive evaluator over the typed AST.

use crate::language::ast::{
    self, BinOp, Body, Expression, Field, ForIn, ForRange, FunctionCall, FunctionDeclaration,
    Literal, LiteralKind, Prefix, Program, RepeatStatement, Statement, UnOp,
    VariableDeclaration, VariableRef, WhileStatement,
};
use crate::language::errors::SyntaxError;
use crate::language::lexer::lex;
use crate::language::span::Range;
use crate::language::token::TokenKind;
use crate::language::tree::{ApplyError, InputEdit, ParseResult, ParseTree, SourceBuffer};
use crate::runtime::environment::Environment;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::origin::Origin;
use crate::runtime::source_change::{find_overlap, SourceChange, SourceEdit};
use crate::runtime::stdlib;
use crate::runtime::value::{
    CallContext, CallResult, Function, Table, UserFunction, Vallist, Value,
};
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

pub type TraceSink = Rc<RefCell<dyn Write>>;

#[derive(Clone, Default)]
pub struct InterpreterConfig {
    pub trace_nodes: bool,
    pub trace_calls: bool,
    pub trace_enter_block: bool,
    /// Defaults to stderr when unset.
    pub trace_sink: Option<TraceSink>,
    /// Called at statement boundaries; returning false aborts evaluation
    /// with `Cancelled`.
    pub tick: Option<Rc<dyn Fn() -> bool>>,
}

impl fmt::Debug for InterpreterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterConfig")
            .field("trace_nodes", &self.trace_nodes)
            .field("trace_calls", &self.trace_calls)
            .field("trace_enter_block", &self.trace_enter_block)
            .field("trace_sink", &self.trace_sink.is_some())
            .field("tick", &self.tick.is_some())
            .finish()
    }
}

/// What the host gets back from `evaluate`.
#[derive(Clone, Debug)]
pub struct EvalResult {
    pub value: Value,
    pub source_change: Option<SourceChange>,
}

#[derive(Debug)]
enum State {
    Empty,
    Parsed,
    Errored(Vec<SyntaxError>),
}

/// An interpreter instance: parse source, tweak the environment, run it,
/// and optionally apply a proposed source change and run again.
pub struct Interpreter {
    buffer: SourceBuffer,
    state: State,
    env: Environment,
    config: InterpreterConfig,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let env = Environment::new();
        stdlib::register(&env);
        Self {
            buffer: SourceBuffer::new(),
            state: State::Empty,
            env,
            config: InterpreterConfig::default(),
        }
    }

    /// Constructs with initial source; parse errors are fatal here.
    pub fn with_source(source: &str) -> RuntimeResult<Self> {
        let mut interpreter = Self::new();
        let result = interpreter.parse(source);
        if !result.is_ok() {
            return Err(RuntimeError::ParseFailed {
                diagnostics: result.errors,
            });
        }
        Ok(interpreter)
    }

    /// Replaces the program. The environment is kept, so hosts can reuse
    /// installed natives across parses.
    pub fn parse(&mut self, source: &str) -> ParseResult {
        let result = self.buffer.parse(source);
        self.state = if result.is_ok() {
            State::Parsed
        } else {
            State::Errored(result.errors.clone())
        };
        result
    }

    pub fn environment(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Valid until the next `parse` or `apply_source_changes` call.
    pub fn source_code(&self) -> &str {
        self.buffer.source()
    }

    /// Applies non-overlapping edits and reparses. All outstanding
    /// `Origin`s and `Range`s are invalidated by this call.
    pub fn apply_source_changes(&mut self, edits: Vec<SourceEdit>) -> RuntimeResult<Vec<Range>> {
        if !matches!(self.state, State::Parsed) {
            return Err(RuntimeError::runtime(
                "apply_source_changes requires successfully parsed source",
                None,
            ));
        }
        if let Some((first, second)) = find_overlap(&edits) {
            return Err(RuntimeError::runtime(
                format!("overlapping source edits at {first} and {second}"),
                Some(first),
            ));
        }
        let edits: Vec<InputEdit> = edits.into_iter().map(Into::into).collect();
        match self.buffer.apply(&edits) {
            Ok(changed) => Ok(changed),
            Err(ApplyError::Overlapping { first, second }) => Err(RuntimeError::runtime(
                format!("overlapping source edits at {first} and {second}"),
                Some(first),
            )),
            Err(ApplyError::Reparse(errors)) => {
                self.state = State::Errored(errors.clone());
                Err(RuntimeError::ParseFailed {
                    diagnostics: errors,
                })
            }
        }
    }

    /// Flattens a change to its canonical edits and applies them.
    pub fn apply_source_change(&mut self, change: &SourceChange) -> RuntimeResult<Vec<Range>> {
        self.apply_source_changes(change.first_alternative())
    }

    /// Runs the parsed program against the current environment.
    pub fn evaluate(&mut self) -> RuntimeResult<EvalResult> {
        let tree = match (&self.state, self.buffer.tree()) {
            (State::Parsed, Some(tree)) => tree.clone(),
            (State::Errored(errors), _) => {
                return Err(RuntimeError::ParseFailed {
                    diagnostics: errors.clone(),
                })
            }
            _ => {
                return Err(RuntimeError::runtime("no source has been parsed", None));
            }
        };
        let mut evaluator = Evaluator::new(tree, self.config.clone());
        let outcome = evaluator.run(&self.env)?;
        Ok(EvalResult {
            value: outcome.value,
            source_change: outcome.source_change,
        })
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut InterpreterConfig {
        &mut self.config
    }

    pub fn set_config(&mut self, config: InterpreterConfig) {
        self.config = config;
    }
}

/// Result record threaded through the recursive walk. `do_break` is
/// consumed by the enclosing loop, `do_return` by the enclosing function
/// call (or the program root).
#[derive(Debug, Default)]
struct EvalOutcome {
    value: Value,
    do_break: bool,
    do_return: Option<Vallist>,
    source_change: Option<SourceChange>,
}

impl EvalOutcome {
    fn absorb(&mut self, change: Option<SourceChange>) {
        self.source_change = SourceChange::combine(self.source_change.take(), change);
    }

    fn combine(&mut self, other: EvalOutcome) {
        self.value = other.value;
        self.do_break = other.do_break;
        self.do_return = other.do_return;
        self.absorb(other.source_change);
    }
}

struct Evaluator {
    config: InterpreterConfig,
    /// Innermost last: the tree owning the code currently executing.
    /// Calling a closure from an earlier parse pushes its tree.
    tree_stack: Vec<Rc<ParseTree>>,
    /// Variadic argument packs, innermost function last.
    varargs: Vec<Vallist>,
}

impl Evaluator {
    fn new(tree: Rc<ParseTree>, config: InterpreterConfig) -> Self {
        Self {
            config,
            tree_stack: vec![tree],
            varargs: vec![Vallist::new()],
        }
    }

    fn run(&mut self, env: &Environment) -> RuntimeResult<EvalOutcome> {
        let tree = self.tree_stack[0].clone();
        let program = Program::new(tree.root())?;
        let mut outcome = self.eval_body(&program.body(), env)?;
        if outcome.do_break {
            return Err(RuntimeError::LoopMisuse { range: None });
        }
        outcome.value = match outcome.do_return.take() {
            Some(values) => values.first(),
            None => Value::nil(),
        };
        Ok(outcome)
    }

    // ---- infrastructure ----

    fn current_tree(&self) -> Rc<ParseTree> {
        self.tree_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.tree_stack[0].clone())
    }

    fn current_varargs(&self) -> Vallist {
        self.varargs.last().cloned().unwrap_or_default()
    }

    fn tick(&self) -> RuntimeResult<()> {
        if let Some(tick) = &self.config.tick {
            if !tick() {
                return Err(RuntimeError::Cancelled);
            }
        }
        Ok(())
    }

    fn trace(&self, message: &str) {
        match &self.config.trace_sink {
            Some(sink) => {
                let _ = writeln!(sink.borrow_mut(), "{message}");
            }
            None => eprintln!("{message}"),
        }
    }

    fn trace_node(&self, action: &str, what: &str, range: Range) {
        if self.config.trace_nodes {
            self.trace(&format!("{action} node: {what} at {range}"));
        }
    }

    fn trace_call(&self, name: &str, args: &Vallist) {
        if self.config.trace_calls {
            let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
            self.trace(&format!("Calling function: {name}({})", rendered.join(", ")));
        }
    }

    fn trace_call_result(&self, name: &str, result: &CallResult) {
        if self.config.trace_calls {
            let rendered: Vec<String> = result.values.iter().map(|v| v.to_string()).collect();
            let change = if result.source_change.is_some() {
                " with source changes"
            } else {
                ""
            };
            self.trace(&format!(
                "Function call to: {name} resulted in ({}){change}",
                rendered.join(", ")
            ));
        }
    }

    fn enter_block(&self, env: &Environment) -> Environment {
        if self.config.trace_enter_block {
            self.trace(&format!("Enter block: {env:?}"));
        }
        env.enter_block()
    }

    // ---- statements ----

    fn eval_body(&mut self, body: &Body<'_>, env: &Environment) -> RuntimeResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();
        for statement in body.statements()? {
            self.tick()?;
            let sub = self.visit_statement(&statement, env)?;
            outcome.combine(sub);
            if outcome.do_break || outcome.do_return.is_some() {
                return Ok(outcome);
            }
        }
        if let Some(ret) = body.return_statement()? {
            self.tick()?;
            let mut change = None;
            let exprs = ret.expressions()?;
            let values = self.eval_explist(&exprs, env, &mut change)?;
            outcome.absorb(change);
            outcome.do_return = Some(values);
        }
        Ok(outcome)
    }

    /// Statements yield nil; only the flags and source changes travel up.
    fn visit_statement(
        &mut self,
        statement: &Statement<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        self.trace_node("Enter", statement_name(statement), statement.range());
        let mut outcome = match statement {
            Statement::VarDecl(decl) => self.visit_variable_declaration(decl, env)?,
            Statement::DoBlock(block) => {
                let block_env = self.enter_block(env);
                self.eval_body(&block.body(), &block_env)?
            }
            Statement::If(if_stmt) => self.visit_if(if_stmt, env)?,
            Statement::While(while_stmt) => self.visit_while(while_stmt, env)?,
            Statement::Repeat(repeat) => self.visit_repeat(repeat, env)?,
            Statement::ForRange(for_stmt) => self.visit_for_range(for_stmt, env)?,
            Statement::ForIn(for_in) => self.visit_for_in(for_in, env)?,
            Statement::GoTo(goto_stmt) => {
                return Err(RuntimeError::runtime(
                    "goto is not supported",
                    Some(goto_stmt.range()),
                ))
            }
            Statement::Label(_) => EvalOutcome::default(),
            Statement::Break(_) => EvalOutcome {
                do_break: true,
                ..EvalOutcome::default()
            },
            Statement::FunctionDecl(decl) => self.visit_function_declaration(decl, env)?,
            Statement::FunctionCall(call) => {
                let result = self.visit_function_call(call, env)?;
                EvalOutcome {
                    source_change: result.source_change,
                    ..EvalOutcome::default()
                }
            }
        };
        outcome.value = Value::nil();
        self.trace_node("Exit", statement_name(statement), statement.range());
        Ok(outcome)
    }

    fn visit_variable_declaration(
        &mut self,
        decl: &VariableDeclaration<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();
        let mut change = None;
        let exprs = decl.expressions()?;
        let values = self.eval_explist(&exprs, env, &mut change)?;

        for (index, target) in decl.targets()?.iter().enumerate() {
            let value = values.get(index);
            match target {
                VariableRef::Name(name) => {
                    if decl.is_local() {
                        env.set_local(name.name(), value);
                    } else {
                        env.set(name.name(), value);
                    }
                }
                VariableRef::Index(index_expr) => {
                    let object = self.visit_expression(&index_expr.object()?, env)?;
                    change = SourceChange::combine(change, object.source_change);
                    let key = self.visit_expression(&index_expr.index()?, env)?;
                    change = SourceChange::combine(change, key.source_change);
                    self.assign_index(&object.value, key.value, value, index_expr.range())?;
                }
                VariableRef::Field(field_expr) => {
                    let object = self.visit_expression(&field_expr.object()?, env)?;
                    change = SourceChange::combine(change, object.source_change);
                    let key = Value::from(field_expr.field()?.name());
                    self.assign_index(&object.value, key, value, field_expr.range())?;
                }
            }
        }

        outcome.source_change = change;
        Ok(outcome)
    }

    fn assign_index(
        &self,
        object: &Value,
        key: Value,
        value: Value,
        range: Range,
    ) -> RuntimeResult<()> {
        let table = object.as_table().ok_or_else(|| {
            RuntimeError::type_error("index", object.type_name(), range)
        })?;
        table.set(key, value).map_err(|err| match err {
            RuntimeError::Runtime { message, .. } => {
                RuntimeError::runtime(message, Some(range))
            }
            other => other,
        })
    }

    fn visit_if(
        &mut self,
        if_stmt: &ast::IfStatement<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();

        let condition = self.visit_expression(&if_stmt.condition()?, env)?;
        outcome.absorb(condition.source_change);
        if condition.value.truthy() {
            let block_env = self.enter_block(env);
            let body = self.eval_body(&if_stmt.body(), &block_env)?;
            outcome.combine(body);
            return Ok(outcome);
        }

        for elseif in if_stmt.elseifs() {
            let condition = self.visit_expression(&elseif.condition()?, env)?;
            outcome.absorb(condition.source_change);
            if condition.value.truthy() {
                let block_env = self.enter_block(env);
                let body = self.eval_body(&elseif.body(), &block_env)?;
                outcome.combine(body);
                return Ok(outcome);
            }
        }

        if let Some(else_branch) = if_stmt.else_branch() {
            let block_env = self.enter_block(env);
            let body = self.eval_body(&else_branch.body(), &block_env)?;
            outcome.combine(body);
        }
        Ok(outcome)
    }

    fn visit_while(
        &mut self,
        while_stmt: &WhileStatement<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();
        loop {
            self.tick()?;
            let condition = self.visit_expression(&while_stmt.condition()?, env)?;
            outcome.absorb(condition.source_change);
            if !condition.value.truthy() {
                break;
            }

            let block_env = self.enter_block(env);
            let body = self.eval_body(&while_stmt.body(), &block_env)?;
            outcome.absorb(body.source_change);
            if body.do_break {
                break;
            }
            if body.do_return.is_some() {
                outcome.do_return = body.do_return;
                break;
            }
        }
        Ok(outcome)
    }

    /// Body first, condition in the body's scope, stop when truthy.
    fn visit_repeat(
        &mut self,
        repeat: &RepeatStatement<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();
        loop {
            self.tick()?;
            let block_env = self.enter_block(env);
            let body = self.eval_body(&repeat.body(), &block_env)?;
            outcome.absorb(body.source_change);
            if body.do_break {
                break;
            }
            if body.do_return.is_some() {
                outcome.do_return = body.do_return;
                break;
            }

            let condition = self.visit_expression(&repeat.condition()?, &block_env)?;
            outcome.absorb(condition.source_change);
            if condition.value.truthy() {
                break;
            }
        }
        Ok(outcome)
    }

    fn visit_for_range(
        &mut self,
        for_stmt: &ForRange<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();
        let header_range = for_stmt.var()?.range();

        let start = self.visit_expression(&for_stmt.start()?, env)?;
        outcome.absorb(start.source_change);
        let start = start.value.coerce_number().ok_or_else(|| {
            RuntimeError::runtime("'for' initial value must be a number", Some(header_range))
        })?;

        let limit = self.visit_expression(&for_stmt.end()?, env)?;
        outcome.absorb(limit.source_change);
        let limit = limit.value.coerce_number().ok_or_else(|| {
            RuntimeError::runtime("'for' limit must be a number", Some(header_range))
        })?;

        let step = match for_stmt.step()? {
            Some(step_expr) => {
                let step = self.visit_expression(&step_expr, env)?;
                outcome.absorb(step.source_change);
                step.value.coerce_number().ok_or_else(|| {
                    RuntimeError::runtime("'for' step must be a number", Some(header_range))
                })?
            }
            None => 1.0,
        };
        if step == 0.0 {
            return Err(RuntimeError::runtime(
                "'for' step is zero",
                Some(header_range),
            ));
        }

        let var_name = for_stmt.var()?.name();
        let mut i = start;
        loop {
            let in_range = if step >= 0.0 { i <= limit } else { i >= limit };
            if !in_range {
                break;
            }
            self.tick()?;
            let block_env = self.enter_block(env);
            block_env.set_local(var_name, Value::number(i));
            let body = self.eval_body(&for_stmt.body(), &block_env)?;
            outcome.absorb(body.source_change);
            if body.do_break {
                break;
            }
            if body.do_return.is_some() {
                outcome.do_return = body.do_return;
                break;
            }
            i += step;
        }
        Ok(outcome)
    }

    /// The expression list yields (iterator, state, control); each step
    /// calls iterator(state, control) until the first result is nil.
    fn visit_for_in(&mut self, for_in: &ForIn<'_>, env: &Environment) -> RuntimeResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();
        let mut change = None;
        let exprs = for_in.expressions()?;
        let list = self.eval_explist(&exprs, env, &mut change)?;
        outcome.absorb(change);

        let iterator = list.get(0);
        let state = list.get(1);
        let mut control = list.get(2);
        let vars = for_in.vars()?;
        let call_range = vars.first().map(|v| v.range()).unwrap_or_default();

        loop {
            self.tick()?;
            let args = Vallist::from(vec![state.clone(), control.clone()]);
            let result = self.call_value(&iterator, args, env, "for iterator", call_range)?;
            outcome.absorb(result.source_change.clone());

            let first = result.values.first();
            if first.is_nil() {
                break;
            }
            control = first;

            let block_env = self.enter_block(env);
            for (index, var) in vars.iter().enumerate() {
                block_env.set_local(var.name(), result.values.get(index));
            }
            let body = self.eval_body(&for_in.body(), &block_env)?;
            outcome.absorb(body.source_change);
            if body.do_break {
                break;
            }
            if body.do_return.is_some() {
                outcome.do_return = body.do_return;
                break;
            }
        }
        Ok(outcome)
    }

    fn visit_function_declaration(
        &mut self,
        decl: &FunctionDeclaration<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let name = decl.name()?;
        let parameters = decl.parameters()?;
        let mut params: Vec<String> =
            parameters.names()?.iter().map(|p| p.name().to_string()).collect();
        if name.method.is_some() {
            params.insert(0, "self".to_string());
        }

        let mut display = name.base.name().to_string();
        for part in &name.path {
            display.push('.');
            display.push_str(part.name());
        }
        if let Some(method) = &name.method {
            display.push(':');
            display.push_str(method.name());
        }

        let function = Value::from(Function::User(Rc::new(UserFunction {
            name: Some(display),
            params,
            variadic: parameters.is_variadic(),
            env: env.clone(),
            tree: self.current_tree(),
            body: decl.body_node_id(),
        })));

        if decl.is_local() {
            env.set_local(name.base.name(), function);
            return Ok(EvalOutcome::default());
        }
        if name.path.is_empty() && name.method.is_none() {
            env.set(name.base.name(), function);
            return Ok(EvalOutcome::default());
        }

        // Walk `a.b.c` to the owning table and set the final key there.
        let mut keys: Vec<&str> = name.path.iter().map(|p| p.name()).collect();
        if let Some(method) = &name.method {
            keys.push(method.name());
        }
        let mut container = env.get(name.base.name());
        for key in &keys[..keys.len() - 1] {
            container = self.index_value(&container, &Value::from(*key), decl.range())?;
        }
        let table = container.as_table().ok_or_else(|| {
            RuntimeError::type_error("index", container.type_name(), decl.range())
        })?;
        table
            .set(Value::from(keys[keys.len() - 1]), function)
            .map_err(|err| match err {
                RuntimeError::Runtime { message, .. } => {
                    RuntimeError::runtime(message, Some(decl.range()))
                }
                other => other,
            })?;
        Ok(EvalOutcome::default())
    }

    // ---- expressions ----

    fn visit_expression(
        &mut self,
        expr: &Expression<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        self.trace_node("Enter", expression_name(expr), expr.range());
        let outcome = match expr {
            Expression::Literal(literal) => EvalOutcome {
                value: self.literal_value(literal)?,
                ..EvalOutcome::default()
            },
            Expression::Identifier(identifier) => EvalOutcome {
                value: env.get(identifier.name()),
                ..EvalOutcome::default()
            },
            Expression::Spread(_) => EvalOutcome {
                value: self.current_varargs().first(),
                ..EvalOutcome::default()
            },
            Expression::Prefix(prefix) => self.visit_prefix(prefix, env)?,
            Expression::FunctionDefinition(definition) => {
                let parameters = definition.parameters()?;
                let params = parameters
                    .names()?
                    .iter()
                    .map(|p| p.name().to_string())
                    .collect();
                EvalOutcome {
                    value: Value::from(Function::User(Rc::new(UserFunction {
                        name: None,
                        params,
                        variadic: parameters.is_variadic(),
                        env: env.clone(),
                        tree: self.current_tree(),
                        body: definition.node().id(),
                    }))),
                    ..EvalOutcome::default()
                }
            }
            Expression::Table(constructor) => self.visit_table_constructor(constructor, env)?,
            Expression::BinaryOp(binary) => self.visit_binary_operation(binary, env)?,
            Expression::UnaryOp(unary) => {
                let operand = self.visit_expression(&unary.operand()?, env)?;
                let range = unary.range();
                let value = match unary.operator()? {
                    UnOp::Neg => operand.value.negate(range)?,
                    UnOp::Not => operand.value.invert(range),
                    UnOp::Len => operand.value.len(range)?,
                };
                EvalOutcome {
                    value,
                    source_change: operand.source_change,
                    ..EvalOutcome::default()
                }
            }
        };
        self.trace_node("Exit", expression_name(expr), expr.range());
        Ok(outcome)
    }

    fn literal_value(&self, literal: &Literal<'_>) -> RuntimeResult<Value> {
        let range = literal.range();
        let value = match literal.kind {
            LiteralKind::Nil => Value::nil(),
            LiteralKind::True => Value::from(true),
            LiteralKind::False => Value::from(false),
            LiteralKind::Number => parse_number_literal(literal.text(), range)?,
            LiteralKind::Str => parse_string_literal(literal.text(), range)?,
        };
        Ok(value.with_origin(Origin::literal(range)))
    }

    fn visit_prefix(
        &mut self,
        prefix: &Prefix<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let outcome = match prefix {
            Prefix::SelfRef(_) => EvalOutcome {
                value: env.get("self"),
                ..EvalOutcome::default()
            },
            Prefix::VariableRef(VariableRef::Name(name)) => EvalOutcome {
                value: env.get(name.name()),
                ..EvalOutcome::default()
            },
            Prefix::VariableRef(VariableRef::Index(index)) => {
                let object = self.visit_expression(&index.object()?, env)?;
                let key = self.visit_expression(&index.index()?, env)?;
                let value = self.index_value(&object.value, &key.value, index.range())?;
                let mut outcome = EvalOutcome {
                    value,
                    source_change: object.source_change,
                    ..EvalOutcome::default()
                };
                outcome.absorb(key.source_change);
                outcome
            }
            Prefix::VariableRef(VariableRef::Field(field)) => {
                let object = self.visit_expression(&field.object()?, env)?;
                let key = Value::from(field.field()?.name());
                let value = self.index_value(&object.value, &key, field.range())?;
                EvalOutcome {
                    value,
                    source_change: object.source_change,
                    ..EvalOutcome::default()
                }
            }
            Prefix::FunctionCall(call) => {
                let result = self.visit_function_call(call, env)?;
                EvalOutcome {
                    value: result.values.first(),
                    source_change: result.source_change,
                    ..EvalOutcome::default()
                }
            }
            Prefix::Parenthesized(paren) => {
                // Parentheses truncate multiple values to one.
                let inner = self.visit_expression(&paren.expression()?, env)?;
                EvalOutcome {
                    value: inner.value,
                    source_change: inner.source_change,
                    ..EvalOutcome::default()
                }
            }
        };
        Ok(outcome)
    }

    fn index_value(&self, object: &Value, key: &Value, range: Range) -> RuntimeResult<Value> {
        let table = object
            .as_table()
            .ok_or_else(|| RuntimeError::type_error("index", object.type_name(), range))?;
        Ok(table.get(key))
    }

    fn visit_table_constructor(
        &mut self,
        constructor: &ast::TableConstructor<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let table = Table::new();
        let mut change = None;
        let fields = constructor.fields()?;
        let last = fields.len().saturating_sub(1);
        let mut next_index = 1usize;

        for (position, field) in fields.iter().enumerate() {
            match field {
                Field::Named(name, value_expr) => {
                    let value = self.visit_expression(value_expr, env)?;
                    change = SourceChange::combine(change, value.source_change);
                    self.table_set(&table, Value::from(name.name()), value.value, constructor.range())?;
                }
                Field::Bracket(key_expr, value_expr) => {
                    let key = self.visit_expression(key_expr, env)?;
                    change = SourceChange::combine(change, key.source_change);
                    let value = self.visit_expression(value_expr, env)?;
                    change = SourceChange::combine(change, value.source_change);
                    self.table_set(&table, key.value, value.value, constructor.range())?;
                }
                Field::Positional(value_expr) => {
                    if position == last {
                        let values = self.eval_multi(value_expr, env, &mut change)?;
                        for value in values {
                            self.table_set(
                                &table,
                                Value::number(next_index as f64),
                                value,
                                constructor.range(),
                            )?;
                            next_index += 1;
                        }
                    } else {
                        let value = self.visit_expression(value_expr, env)?;
                        change = SourceChange::combine(change, value.source_change);
                        self.table_set(
                            &table,
                            Value::number(next_index as f64),
                            value.value,
                            constructor.range(),
                        )?;
                        next_index += 1;
                    }
                }
            }
        }

        Ok(EvalOutcome {
            value: Value::from(table),
            source_change: change,
            ..EvalOutcome::default()
        })
    }

    fn table_set(
        &self,
        table: &Table,
        key: Value,
        value: Value,
        range: Range,
    ) -> RuntimeResult<()> {
        table.set(key, value).map_err(|err| match err {
            RuntimeError::Runtime { message, .. } => RuntimeError::runtime(message, Some(range)),
            other => other,
        })
    }

    fn visit_binary_operation(
        &mut self,
        binary: &ast::BinaryOperation<'_>,
        env: &Environment,
    ) -> RuntimeResult<EvalOutcome> {
        let op = binary.operator()?;
        let range = binary.range();

        // `and`/`or` must not evaluate the unused operand.
        if matches!(op, BinOp::And | BinOp::Or) {
            let lhs = self.visit_expression(&binary.left()?, env)?;
            let mut outcome = EvalOutcome {
                source_change: lhs.source_change,
                ..EvalOutcome::default()
            };
            let short_circuits = match op {
                BinOp::And => !lhs.value.truthy(),
                _ => lhs.value.truthy(),
            };
            let rhs_value = if short_circuits {
                Value::nil()
            } else {
                let rhs = self.visit_expression(&binary.right()?, env)?;
                outcome.absorb(rhs.source_change);
                rhs.value
            };
            outcome.value = match op {
                BinOp::And => lhs.value.logic_and(&rhs_value, range),
                _ => lhs.value.logic_or(&rhs_value, range),
            };
            return Ok(outcome);
        }

        let lhs = self.visit_expression(&binary.left()?, env)?;
        let rhs = self.visit_expression(&binary.right()?, env)?;
        let mut outcome = EvalOutcome {
            source_change: lhs.source_change,
            ..EvalOutcome::default()
        };
        outcome.absorb(rhs.source_change);

        let (lhs, rhs) = (lhs.value, rhs.value);
        outcome.value = match op {
            BinOp::Add => lhs.add(&rhs, range)?,
            BinOp::Sub => lhs.sub(&rhs, range)?,
            BinOp::Mul => lhs.mul(&rhs, range)?,
            BinOp::Div => lhs.div(&rhs, range)?,
            BinOp::Mod => lhs.modulo(&rhs, range)?,
            BinOp::Pow => lhs.pow(&rhs, range)?,
            BinOp::Concat => lhs.concat(&rhs, range)?,
            BinOp::Eq => lhs.equals(&rhs, range),
            BinOp::Neq => lhs.unequals(&rhs, range),
            BinOp::Lt => lhs.less_than(&rhs, range)?,
            BinOp::LtEq => lhs.less_than_or_equal(&rhs, range)?,
            BinOp::Gt => lhs.greater_than(&rhs, range)?,
            BinOp::GtEq => lhs.greater_than_or_equal(&rhs, range)?,
            BinOp::BitAnd => lhs.bit_and(&rhs, range)?,
            BinOp::BitOr => lhs.bit_or(&rhs, range)?,
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        };
        Ok(outcome)
    }

    // ---- calls ----

    fn visit_function_call(
        &mut self,
        call: &FunctionCall<'_>,
        env: &Environment,
    ) -> RuntimeResult<CallResult> {
        let mut change = None;
        let callee_name = call
            .node()
            .named_child(0)
            .map(|n| n.text().to_string())
            .unwrap_or_else(|| "?".to_string());

        // `a:m(args)` evaluates `a` once and passes it as the first
        // argument to `a.m`.
        let (function, mut args) = match call.method() {
            Some(method) => {
                let object = self.visit_prefix(&call.callee()?, env)?;
                change = SourceChange::combine(change, object.source_change);
                let function =
                    self.index_value(&object.value, &Value::from(method.name()), call.range())?;
                (function, Vallist::from(vec![object.value]))
            }
            None => {
                let callee = self.visit_prefix(&call.callee()?, env)?;
                change = SourceChange::combine(change, callee.source_change);
                (callee.value, Vallist::new())
            }
        };

        let arg_exprs = call.arguments()?;
        let list = self.eval_explist(&arg_exprs, env, &mut change)?;
        args.extend(list);

        self.trace_call(&callee_name, &args);
        let result = self.call_value(&function, args, env, &callee_name, call.range())?;
        self.trace_call_result(&callee_name, &result);

        Ok(CallResult::with_change(
            result.values,
            SourceChange::combine(change, result.source_change),
        ))
    }

    fn call_value(
        &mut self,
        function: &Value,
        args: Vallist,
        env: &Environment,
        callee_name: &str,
        call_range: Range,
    ) -> RuntimeResult<CallResult> {
        let function = match function.as_function() {
            Some(function) => function.clone(),
            None => {
                return Err(RuntimeError::CallError {
                    callee: callee_name.to_string(),
                    cause: format!("can't call a value of type {}", function.type_name()),
                    range: Some(call_range),
                })
            }
        };

        match function {
            Function::Native(native) => {
                let mut env_handle = env.clone();
                let context = CallContext {
                    args,
                    env: &mut env_handle,
                    call_location: Some(call_range),
                };
                (native.func)(context).map_err(|err| match err {
                    RuntimeError::Cancelled => RuntimeError::Cancelled,
                    other => RuntimeError::CallError {
                        callee: callee_name.to_string(),
                        cause: other.to_string(),
                        range: Some(call_range),
                    },
                })
            }
            Function::User(user) => {
                let call_env = user.env.enter_block();
                for (index, param) in user.params.iter().enumerate() {
                    call_env.set_local(param, args.get(index));
                }
                let rest = if user.variadic {
                    let mut rest = Vallist::new();
                    for index in user.params.len()..args.size() {
                        rest.push(args.get(index));
                    }
                    rest
                } else {
                    Vallist::new()
                };

                self.varargs.push(rest);
                self.tree_stack.push(user.tree.clone());
                let body = ast::function_body(user.tree.node(user.body));
                let outcome = self.eval_body(&body, &call_env);
                self.tree_stack.pop();
                self.varargs.pop();

                let mut outcome = outcome?;
                if outcome.do_break {
                    return Err(RuntimeError::LoopMisuse {
                        range: Some(call_range),
                    });
                }
                let values = outcome.do_return.take().unwrap_or_default();
                Ok(CallResult::with_change(values, outcome.source_change))
            }
        }
    }

    /// Evaluates an expression list into a value pack. Every expression
    /// but the last is truncated to one value; a trailing call or spread
    /// expands.
    fn eval_explist(
        &mut self,
        exprs: &[Expression<'_>],
        env: &Environment,
        change: &mut Option<SourceChange>,
    ) -> RuntimeResult<Vallist> {
        let mut values = Vallist::new();
        for (index, expr) in exprs.iter().enumerate() {
            if index + 1 == exprs.len() {
                let pack = self.eval_multi(expr, env, change)?;
                values.extend(pack);
            } else {
                let outcome = self.visit_expression(expr, env)?;
                *change = SourceChange::combine(change.take(), outcome.source_change);
                values.push(outcome.value);
            }
        }
        Ok(values)
    }

    fn eval_multi(
        &mut self,
        expr: &Expression<'_>,
        env: &Environment,
        change: &mut Option<SourceChange>,
    ) -> RuntimeResult<Vallist> {
        match expr {
            Expression::Spread(_) => Ok(self.current_varargs()),
            Expression::Prefix(Prefix::FunctionCall(call)) => {
                let result = self.visit_function_call(call, env)?;
                *change = SourceChange::combine(change.take(), result.source_change);
                Ok(result.values)
            }
            other => {
                let outcome = self.visit_expression(other, env)?;
                *change = SourceChange::combine(change.take(), outcome.source_change);
                Ok(Vallist::from(vec![outcome.value]))
            }
        }
    }
}

fn statement_name(statement: &Statement<'_>) -> &'static str {
    match statement {
        Statement::VarDecl(_) => "variable_declaration",
        Statement::DoBlock(_) => "do_statement",
        Statement::If(_) => "if_statement",
        Statement::While(_) => "while_statement",
        Statement::Repeat(_) => "repeat_statement",
        Statement::ForRange(_) => "for_statement",
        Statement::ForIn(_) => "for_in_statement",
        Statement::GoTo(_) => "goto_statement",
        Statement::Break(_) => "break_statement",
        Statement::Label(_) => "label_statement",
        Statement::FunctionDecl(_) => "function_declaration",
        Statement::FunctionCall(_) => "function_call",
    }
}

fn expression_name(expr: &Expression<'_>) -> &'static str {
    match expr {
        Expression::Spread(_) => "spread",
        Expression::Prefix(_) => "prefix",
        Expression::FunctionDefinition(_) => "function_definition",
        Expression::Table(_) => "table_constructor",
        Expression::BinaryOp(_) => "binary_operation",
        Expression::UnaryOp(_) => "unary_operation",
        Expression::Literal(_) => "literal",
        Expression::Identifier(_) => "identifier",
    }
}

/// Literal nodes store only their byte range; the text re-lexes to the
/// value it denotes.
fn parse_number_literal(text: &str, range: Range) -> RuntimeResult<Value> {
    match lex(text).ok().as_deref() {
        Some([token, _eof]) => {
            if let TokenKind::Number(value) = token.kind {
                return Ok(Value::number(value));
            }
            invalid_literal("number", text, range)
        }
        _ => invalid_literal("number", text, range),
    }
}

fn parse_string_literal(text: &str, range: Range) -> RuntimeResult<Value> {
    match lex(text).ok().as_deref() {
        Some([token, _eof]) => {
            if let TokenKind::String(value) = &token.kind {
                return Ok(Value::from(value.clone()));
            }
            invalid_literal("string", text, range)
        }
        _ => invalid_literal("string", text, range),
    }
}

fn invalid_literal(kind: &str, text: &str, range: Range) -> RuntimeResult<Value> {
    Err(RuntimeError::InternalInvariantViolated {
        message: format!("`{text}` is not a {kind} literal"),
        range: Some(range),
    })
}
