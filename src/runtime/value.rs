//! Runtime values. Every `Value` carries its `Origin`; operations build
//! the result's origin from their operands so the interpreter can later
//! reverse a computation into source edits.

use crate::language::span::Range;
use crate::language::token::TokenKind;
use crate::language::tree::{NodeId, ParseTree};
use crate::runtime::environment::Environment;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::origin::{
    binary_num_reverse, concat_reverse, not_reverse, select_reverse, unary_num_reverse,
    BinaryOrigin, Origin, UnaryOrigin,
};
use crate::runtime::source_change::SourceChange;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum ValueData {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Table(Table),
    Function(Function),
}

impl PartialEq for ValueData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueData::Nil, ValueData::Nil) => true,
            (ValueData::Bool(a), ValueData::Bool(b)) => a == b,
            (ValueData::Number(a), ValueData::Number(b)) => a == b,
            (ValueData::String(a), ValueData::String(b)) => a == b,
            (ValueData::Table(a), ValueData::Table(b)) => a.identity_eq(b),
            (ValueData::Function(a), ValueData::Function(b)) => a.identity_eq(b),
            _ => false,
        }
    }
}

#[derive(Clone, Default)]
pub struct Value {
    data: ValueData,
    origin: Origin,
}

impl Default for ValueData {
    fn default() -> Self {
        ValueData::Nil
    }
}

impl Value {
    pub fn nil() -> Self {
        Value::default()
    }

    pub fn number(value: f64) -> Self {
        Value {
            data: ValueData::Number(value),
            origin: Origin::None,
        }
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn remove_origin(self) -> Self {
        self.with_origin(Origin::None)
    }

    pub fn has_origin(&self) -> bool {
        !self.origin.is_none()
    }

    /// Proposes a change making the program produce `target` here.
    pub fn force(&self, target: &Value) -> Option<SourceChange> {
        self.origin.force(target)
    }

    pub fn type_name(&self) -> &'static str {
        match &self.data {
            ValueData::Nil => "nil",
            ValueData::Bool(_) => "boolean",
            ValueData::Number(_) => "number",
            ValueData::String(_) => "string",
            ValueData::Table(_) => "table",
            ValueData::Function(_) => "function",
        }
    }

    /// Everything except `nil` and `false` is truthy.
    pub fn truthy(&self) -> bool {
        !matches!(&self.data, ValueData::Nil | ValueData::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(&self.data, ValueData::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match &self.data {
            ValueData::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            ValueData::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match &self.data {
            ValueData::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.data {
            ValueData::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Numbers, plus strings that spell a number.
    pub fn coerce_number(&self) -> Option<f64> {
        match &self.data {
            ValueData::Number(n) => Some(*n),
            ValueData::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// The text a string or number contributes to concatenation.
    pub fn coerce_display(&self) -> Option<String> {
        match &self.data {
            ValueData::String(s) => Some(s.to_string()),
            ValueData::Number(n) => Some(number_to_string(*n)),
            _ => None,
        }
    }

    /// Renders the value as program text. Fails for functions and
    /// self-recursive tables.
    pub fn to_literal(&self) -> RuntimeResult<String> {
        match &self.data {
            ValueData::Nil => Ok("nil".to_string()),
            ValueData::Bool(b) => Ok(b.to_string()),
            ValueData::Number(n) => Ok(number_to_string(*n)),
            ValueData::String(s) => Ok(escape_string(s)),
            ValueData::Table(t) => {
                let mut visited = Vec::new();
                t.to_literal(&mut visited)
            }
            ValueData::Function(_) => Err(RuntimeError::runtime(
                "can't create a literal for a function",
                None,
            )),
        }
    }

    // ---- operations ----
    //
    // Each operation receives the range of the producing expression and
    // attaches a Binary/Unary origin carrying both operands and the
    // operator's reverse rule.

    pub fn add(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.arith(
            other,
            range,
            "add",
            |a, b| a + b,
            binary_num_reverse(|d, r| d - r, |d, l| d - l, Some(|d| d / 2.0)),
        )
    }

    pub fn sub(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.arith(
            other,
            range,
            "subtract",
            |a, b| a - b,
            binary_num_reverse(|d, r| d + r, |d, l| l - d, None),
        )
    }

    pub fn mul(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.arith(
            other,
            range,
            "multiply",
            |a, b| a * b,
            binary_num_reverse(|d, r| d / r, |d, l| d / l, None),
        )
    }

    pub fn div(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.arith(
            other,
            range,
            "divide",
            |a, b| a / b,
            binary_num_reverse(|d, r| d * r, |d, l| l / d, None),
        )
    }

    pub fn pow(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.arith(
            other,
            range,
            "exponentiate",
            |a, b| a.powf(b),
            binary_num_reverse(|d, r| d.powf(1.0 / r), |d, l| d.ln() / l.ln(), None),
        )
    }

    pub fn modulo(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.arith(other, range, "take modulo of", |a, b| a % b, {
            // No useful algebraic inverse.
            Rc::new(|_: &Value, _: &Value, _: &Value| None)
        })
    }

    fn arith(
        &self,
        other: &Value,
        range: Range,
        op_name: &str,
        apply: fn(f64, f64) -> f64,
        reverse: Rc<crate::runtime::origin::ReverseBinary>,
    ) -> RuntimeResult<Value> {
        let (lhs, rhs) = match (self.coerce_number(), other.coerce_number()) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => return Err(self.binary_type_error(op_name, other, range)),
        };
        let origin = Origin::Binary(BinaryOrigin {
            lhs: Box::new(self.clone()),
            rhs: Box::new(other.clone()),
            location: Some(range),
            reverse: Some(reverse),
        });
        Ok(Value::number(apply(lhs, rhs)).with_origin(origin))
    }

    pub fn bit_and(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        let (lhs, rhs) = self.integer_operands(other, "bitwise and", range)?;
        let origin = self.binary_origin(other, range, None);
        Ok(Value::number((lhs & rhs) as f64).with_origin(origin))
    }

    pub fn bit_or(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        let (lhs, rhs) = self.integer_operands(other, "bitwise or", range)?;
        let origin = self.binary_origin(other, range, None);
        Ok(Value::number((lhs | rhs) as f64).with_origin(origin))
    }

    fn integer_operands(
        &self,
        other: &Value,
        op_name: &str,
        range: Range,
    ) -> RuntimeResult<(i64, i64)> {
        let (lhs, rhs) = match (self.coerce_number(), other.coerce_number()) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => return Err(self.binary_type_error(op_name, other, range)),
        };
        if lhs.fract() != 0.0 {
            return Err(RuntimeError::runtime(
                format!("lhs of {op_name} is not an integer"),
                Some(range),
            ));
        }
        if rhs.fract() != 0.0 {
            return Err(RuntimeError::runtime(
                format!("rhs of {op_name} is not an integer"),
                Some(range),
            ));
        }
        Ok((lhs as i64, rhs as i64))
    }

    pub fn concat(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        let (lhs, rhs) = match (self.coerce_display(), other.coerce_display()) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => return Err(self.binary_type_error("concatenate", other, range)),
        };
        let origin = self.binary_origin(other, range, Some(concat_reverse()));
        Ok(Value::from(format!("{lhs}{rhs}")).with_origin(origin))
    }

    pub fn equals(&self, other: &Value, range: Range) -> Value {
        let origin = self.binary_origin(other, range, None);
        Value::from(self.data == other.data).with_origin(origin)
    }

    pub fn unequals(&self, other: &Value, range: Range) -> Value {
        let origin = self.binary_origin(other, range, None);
        Value::from(self.data != other.data).with_origin(origin)
    }

    pub fn less_than(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.compare(other, range, "compare", |ord| ord == Ordering::Less)
    }

    pub fn less_than_or_equal(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.compare(other, range, "compare", |ord| ord != Ordering::Greater)
    }

    pub fn greater_than(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.compare(other, range, "compare", |ord| ord == Ordering::Greater)
    }

    pub fn greater_than_or_equal(&self, other: &Value, range: Range) -> RuntimeResult<Value> {
        self.compare(other, range, "compare", |ord| ord != Ordering::Less)
    }

    fn compare(
        &self,
        other: &Value,
        range: Range,
        op_name: &str,
        accept: fn(Ordering) -> bool,
    ) -> RuntimeResult<Value> {
        // NaN compares false under every operator.
        let result = match (&self.data, &other.data) {
            (ValueData::Number(a), ValueData::Number(b)) => {
                a.partial_cmp(b).map(accept).unwrap_or(false)
            }
            (ValueData::String(a), ValueData::String(b)) => accept(a.cmp(b)),
            _ => return Err(self.binary_type_error(op_name, other, range)),
        };
        let origin = self.binary_origin(other, range, None);
        Ok(Value::from(result).with_origin(origin))
    }

    /// Returns `self` when falsy, `other` otherwise; the reverse rule
    /// targets whichever operand was selected.
    pub fn logic_and(&self, other: &Value, range: Range) -> Value {
        let origin = self.binary_origin(other, range, Some(select_reverse(false)));
        if self.truthy() {
            other.clone().with_origin(origin)
        } else {
            self.clone().with_origin(origin)
        }
    }

    pub fn logic_or(&self, other: &Value, range: Range) -> Value {
        let origin = self.binary_origin(other, range, Some(select_reverse(true)));
        if self.truthy() {
            self.clone().with_origin(origin)
        } else {
            other.clone().with_origin(origin)
        }
    }

    pub fn len(&self, range: Range) -> RuntimeResult<Value> {
        let length = match &self.data {
            ValueData::String(s) => s.len() as f64,
            ValueData::Table(t) => t.border() as f64,
            _ => {
                return Err(RuntimeError::type_error(
                    "take the length of",
                    self.type_name(),
                    range,
                ))
            }
        };
        let origin = self.unary_origin(range, None);
        Ok(Value::number(length).with_origin(origin))
    }

    pub fn negate(&self, range: Range) -> RuntimeResult<Value> {
        let number = self
            .coerce_number()
            .ok_or_else(|| RuntimeError::type_error("negate", self.type_name(), range))?;
        let origin = self.unary_origin(range, Some(unary_num_reverse(|d| -d)));
        Ok(Value::number(-number).with_origin(origin))
    }

    pub fn invert(&self, range: Range) -> Value {
        let origin = self.unary_origin(range, Some(not_reverse()));
        Value::from(!self.truthy()).with_origin(origin)
    }

    fn binary_origin(
        &self,
        other: &Value,
        range: Range,
        reverse: Option<Rc<crate::runtime::origin::ReverseBinary>>,
    ) -> Origin {
        Origin::Binary(BinaryOrigin {
            lhs: Box::new(self.clone()),
            rhs: Box::new(other.clone()),
            location: Some(range),
            reverse,
        })
    }

    fn unary_origin(
        &self,
        range: Range,
        reverse: Option<Rc<crate::runtime::origin::ReverseUnary>>,
    ) -> Origin {
        Origin::Unary(UnaryOrigin {
            value: Box::new(self.clone()),
            location: Some(range),
            reverse,
        })
    }

    fn binary_type_error(&self, op_name: &str, other: &Value, range: Range) -> RuntimeError {
        RuntimeError::type_error(
            op_name,
            format!("{} and {}", self.type_name(), other.type_name()),
            range,
        )
    }
}

impl PartialEq for Value {
    /// Origin is metadata; equality compares the data only.
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", self.data)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ValueData::Nil => write!(f, "nil"),
            ValueData::Bool(b) => write!(f, "{b}"),
            ValueData::Number(n) => write!(f, "{}", number_to_string(*n)),
            ValueData::String(s) => write!(f, "{s}"),
            ValueData::Table(t) => {
                let mut visited = Vec::new();
                match t.to_literal(&mut visited) {
                    Ok(literal) => write!(f, "{literal}"),
                    Err(_) => write!(f, "table: {:p}", Rc::as_ptr(&t.entries)),
                }
            }
            ValueData::Function(func) => write!(f, "function: {}", func.describe()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value {
            data: ValueData::Bool(value),
            origin: Origin::None,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value {
            data: ValueData::String(Rc::from(value.as_str())),
            origin: Origin::None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value {
            data: ValueData::String(Rc::from(value)),
            origin: Origin::None,
        }
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Value {
            data: ValueData::Table(value),
            origin: Origin::None,
        }
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value {
            data: ValueData::Function(value),
            origin: Origin::None,
        }
    }
}

/// Integral doubles print without a decimal point, everything else uses
/// the shortest round-trip form.
pub fn number_to_string(n: f64) -> String {
    if n.is_finite() && n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn escape_char(c: char, out: &mut String) {
    match c {
        '\u{7}' => out.push_str("\\a"),
        '\u{8}' => out.push_str("\\b"),
        '\t' => out.push_str("\\t"),
        '\n' => out.push_str("\\n"),
        '\u{b}' => out.push_str("\\v"),
        '\u{c}' => out.push_str("\\f"),
        '\r' => out.push_str("\\r"),
        '"' => out.push_str("\\\""),
        '\\' => out.push_str("\\\\"),
        c if (c as u32) < 32 => {
            out.push('\\');
            out.push_str(&format!("{:03}", c as u32));
        }
        c => out.push(c),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        escape_char(c, &mut out);
    }
    out.push('"');
    out
}

pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    TokenKind::keyword(s).is_none()
}

// ---- tables ----

/// Total order over table keys so iteration and printing are
/// deterministic: booleans, then numbers, strings, tables, functions.
#[derive(Clone)]
struct TableKey(Value);

impl TableKey {
    fn new(value: Value) -> Self {
        // 0.0 and -0.0 are the same key.
        let value = match value.data() {
            ValueData::Number(n) if *n == 0.0 => Value::number(0.0),
            _ => value,
        };
        TableKey(value.remove_origin())
    }

    fn rank(&self) -> u8 {
        match self.0.data() {
            ValueData::Nil => 0,
            ValueData::Bool(_) => 1,
            ValueData::Number(_) => 2,
            ValueData::String(_) => 3,
            ValueData::Table(_) => 4,
            ValueData::Function(_) => 5,
        }
    }
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for TableKey {}

impl PartialOrd for TableKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let ranks = self.rank().cmp(&other.rank());
        if ranks != Ordering::Equal {
            return ranks;
        }
        match (self.0.data(), other.0.data()) {
            (ValueData::Bool(a), ValueData::Bool(b)) => a.cmp(b),
            (ValueData::Number(a), ValueData::Number(b)) => a.total_cmp(b),
            (ValueData::String(a), ValueData::String(b)) => a.cmp(b),
            (ValueData::Table(a), ValueData::Table(b)) => {
                (Rc::as_ptr(&a.entries) as usize).cmp(&(Rc::as_ptr(&b.entries) as usize))
            }
            (ValueData::Function(a), ValueData::Function(b)) => a.address().cmp(&b.address()),
            _ => Ordering::Equal,
        }
    }
}

/// A shared mutable map with identity semantics: two `Table` values are
/// equal iff they share the same store.
#[derive(Clone, Debug, Default)]
pub struct Table {
    entries: Rc<RefCell<BTreeMap<TableKey, Value>>>,
}

impl fmt::Debug for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_eq(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    pub fn get(&self, key: &Value) -> Value {
        if key.is_nil() {
            return Value::nil();
        }
        self.entries
            .borrow()
            .get(&TableKey::new(key.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Setting a value of nil removes the key. Nil and NaN keys are
    /// errors, as in Lua.
    pub fn set(&self, key: Value, value: Value) -> RuntimeResult<()> {
        if key.is_nil() {
            return Err(RuntimeError::runtime("table index is nil", None));
        }
        if matches!(key.data(), ValueData::Number(n) if n.is_nan()) {
            return Err(RuntimeError::runtime("table index is NaN", None));
        }
        let key = TableKey::new(key);
        if value.is_nil() {
            self.entries.borrow_mut().remove(&key);
        } else {
            self.entries.borrow_mut().insert(key, value);
        }
        Ok(())
    }

    /// The count of consecutive integer keys starting at 1.
    pub fn border(&self) -> usize {
        let entries = self.entries.borrow();
        let mut n = 0;
        loop {
            let key = TableKey::new(Value::number((n + 1) as f64));
            if entries.contains_key(&key) {
                n += 1;
            } else {
                return n;
            }
        }
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.0.clone(), v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn to_literal(&self, visited: &mut Vec<usize>) -> RuntimeResult<String> {
        let address = Rc::as_ptr(&self.entries) as usize;
        if visited.contains(&address) {
            return Err(RuntimeError::runtime(
                "self recursive table can't be converted to literal",
                None,
            ));
        }
        visited.push(address);

        let mut out = String::from("{");
        let mut sep = " ";
        for (key, value) in self.entries() {
            out.push_str(sep);
            match key.as_str() {
                Some(name) if is_valid_identifier(name) => out.push_str(name),
                _ => {
                    out.push('[');
                    out.push_str(&nested_literal(&key, visited)?);
                    out.push(']');
                }
            }
            out.push_str(" = ");
            out.push_str(&nested_literal(&value, visited)?);
            sep = ", ";
        }
        if !self.is_empty() {
            out.push(' ');
        }
        out.push('}');

        visited.pop();
        Ok(out)
    }
}

fn nested_literal(value: &Value, visited: &mut Vec<usize>) -> RuntimeResult<String> {
    match value.data() {
        ValueData::Table(t) => t.to_literal(visited),
        _ => value.to_literal(),
    }
}

// ---- functions ----

pub type NativeFn = dyn Fn(CallContext<'_>) -> RuntimeResult<CallResult>;

/// A function value: either a host-provided native or a closure over a
/// parse tree body and its captured environment.
#[derive(Clone)]
pub enum Function {
    Native(NativeFunction),
    User(Rc<UserFunction>),
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: Rc<str>,
    pub func: Rc<NativeFn>,
}

pub struct UserFunction {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub variadic: bool,
    pub env: Environment,
    pub tree: Rc<ParseTree>,
    pub body: NodeId,
}

impl Function {
    pub fn native(
        name: impl Into<String>,
        func: impl Fn(CallContext<'_>) -> RuntimeResult<CallResult> + 'static,
    ) -> Self {
        Function::Native(NativeFunction {
            name: Rc::from(name.into().as_str()),
            func: Rc::new(func),
        })
    }

    pub fn identity_eq(&self, other: &Function) -> bool {
        self.address() == other.address()
    }

    fn address(&self) -> usize {
        match self {
            Function::Native(native) => Rc::as_ptr(&native.func) as *const () as usize,
            Function::User(user) => Rc::as_ptr(user) as usize,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Function::Native(native) => format!("builtin: {}", native.name),
            Function::User(user) => user
                .name
                .clone()
                .unwrap_or_else(|| format!("{:p}", Rc::as_ptr(user))),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.describe())
    }
}

/// What a native function receives: the argument pack, the environment,
/// and where the call happened.
pub struct CallContext<'a> {
    pub args: Vallist,
    pub env: &'a mut Environment,
    pub call_location: Option<Range>,
}

/// Result of a call: zero or more values and an optional change proposal.
#[derive(Clone, Debug, Default)]
pub struct CallResult {
    pub values: Vallist,
    pub source_change: Option<SourceChange>,
}

impl CallResult {
    pub fn new(values: Vallist) -> Self {
        Self {
            values,
            source_change: None,
        }
    }

    pub fn with_change(values: Vallist, source_change: Option<SourceChange>) -> Self {
        Self {
            values,
            source_change,
        }
    }
}

impl From<Vec<Value>> for CallResult {
    fn from(values: Vec<Value>) -> Self {
        CallResult::new(Vallist::from(values))
    }
}

/// An ordered pack of values for multiple returns and argument lists.
/// Reads past the end yield nil.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vallist {
    values: Vec<Value>,
}

impl Vallist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or_default()
    }

    pub fn first(&self) -> Value {
        self.get(0)
    }

    pub fn truncate(&mut self, n: usize) {
        self.values.truncate(n);
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn extend(&mut self, other: Vallist) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl From<Vec<Value>> for Vallist {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl IntoIterator for Vallist {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
