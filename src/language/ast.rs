//! Typed, read-only views over the parse tree. Each wrapper checks the
//! node kind at construction and exposes semantic accessors; shape errors
//! deeper in the tree surface as `AstError` when an accessor runs.

use crate::language::span::Range;
use crate::language::tree::{Node, NodeKind};
use std::fmt;

#[derive(Clone, Debug)]
pub struct AstError {
    pub message: String,
    pub range: Range,
}

impl AstError {
    fn new(message: impl Into<String>, range: Range) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

impl fmt::Display for AstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.range)
    }
}

pub type AstResult<T> = Result<T, AstError>;

fn expect_kind(node: Node<'_>, kind: NodeKind) -> AstResult<Node<'_>> {
    if node.kind() == kind {
        Ok(node)
    } else {
        Err(AstError::new(
            format!("expected {:?} node, found {:?}", kind, node.kind()),
            node.range(),
        ))
    }
}

fn missing(node: Node<'_>, what: &str) -> AstError {
    AstError::new(
        format!("{:?} node is missing {what}", node.kind()),
        node.range(),
    )
}

fn is_token(node: Node<'_>, text: &str) -> bool {
    node.kind() == NodeKind::Token && node.text() == text
}

// ---- program and bodies ----

#[derive(Clone, Copy)]
pub struct Program<'t>(Node<'t>);

impl<'t> Program<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        Ok(Self(expect_kind(node, NodeKind::Program)?))
    }

    pub fn body(&self) -> Body<'t> {
        Body::from_nodes(self.0.named_children().collect())
    }
}

/// A sequence of statements with an optional trailing return. The parser
/// guarantees a return can only close a block.
#[derive(Clone)]
pub struct Body<'t> {
    statements: Vec<Node<'t>>,
    ret: Option<Node<'t>>,
}

impl<'t> Body<'t> {
    fn from_nodes(nodes: Vec<Node<'t>>) -> Self {
        let mut statements = Vec::new();
        let mut ret = None;
        for node in nodes {
            if node.kind() == NodeKind::ReturnStatement {
                ret = Some(node);
                break;
            }
            statements.push(node);
        }
        Self { statements, ret }
    }

    pub fn statements(&self) -> AstResult<Vec<Statement<'t>>> {
        self.statements.iter().map(|&n| Statement::new(n)).collect()
    }

    pub fn return_statement(&self) -> AstResult<Option<Return<'t>>> {
        self.ret.map(Return::new).transpose()
    }
}

/// The body statements of any function-shaped node (definition or
/// declaration): everything after its parameter list.
pub fn function_body(node: Node<'_>) -> Body<'_> {
    let nodes = node
        .named_children()
        .skip_while(|n| n.kind() != NodeKind::Parameters)
        .skip(1)
        .collect();
    Body::from_nodes(nodes)
}

// ---- statements ----

#[derive(Clone)]
pub enum Statement<'t> {
    VarDecl(VariableDeclaration<'t>),
    DoBlock(DoBlock<'t>),
    If(IfStatement<'t>),
    While(WhileStatement<'t>),
    Repeat(RepeatStatement<'t>),
    ForRange(ForRange<'t>),
    ForIn(ForIn<'t>),
    GoTo(GoTo<'t>),
    Break(Node<'t>),
    Label(Label<'t>),
    FunctionDecl(FunctionDeclaration<'t>),
    FunctionCall(FunctionCall<'t>),
}

impl<'t> Statement<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        let statement = match node.kind() {
            NodeKind::VariableDeclaration => {
                Statement::VarDecl(VariableDeclaration { node, local: false })
            }
            NodeKind::LocalVariableDeclaration => {
                Statement::VarDecl(VariableDeclaration { node, local: true })
            }
            NodeKind::DoStatement => Statement::DoBlock(DoBlock(node)),
            NodeKind::IfStatement => Statement::If(IfStatement(node)),
            NodeKind::WhileStatement => Statement::While(WhileStatement(node)),
            NodeKind::RepeatStatement => Statement::Repeat(RepeatStatement(node)),
            NodeKind::ForStatement => Statement::ForRange(ForRange(node)),
            NodeKind::ForInStatement => Statement::ForIn(ForIn(node)),
            NodeKind::GotoStatement => Statement::GoTo(GoTo(node)),
            NodeKind::BreakStatement => Statement::Break(node),
            NodeKind::LabelStatement => Statement::Label(Label(node)),
            NodeKind::FunctionDeclaration => {
                Statement::FunctionDecl(FunctionDeclaration { node, local: false })
            }
            NodeKind::LocalFunctionDeclaration => {
                Statement::FunctionDecl(FunctionDeclaration { node, local: true })
            }
            NodeKind::FunctionCall => Statement::FunctionCall(FunctionCall::new(node)?),
            other => {
                return Err(AstError::new(
                    format!("{other:?} is not a statement"),
                    node.range(),
                ))
            }
        };
        Ok(statement)
    }

    pub fn range(&self) -> Range {
        match self {
            Statement::VarDecl(s) => s.node.range(),
            Statement::DoBlock(s) => s.0.range(),
            Statement::If(s) => s.0.range(),
            Statement::While(s) => s.0.range(),
            Statement::Repeat(s) => s.0.range(),
            Statement::ForRange(s) => s.0.range(),
            Statement::ForIn(s) => s.0.range(),
            Statement::GoTo(s) => s.0.range(),
            Statement::Break(n) => n.range(),
            Statement::Label(s) => s.0.range(),
            Statement::FunctionDecl(s) => s.node.range(),
            Statement::FunctionCall(s) => s.node().range(),
        }
    }
}

/// `a, b = 1, 2` or `local a, b = 1, 2`. Targets sit left of the `=`
/// token, expressions right of it.
#[derive(Clone, Copy)]
pub struct VariableDeclaration<'t> {
    node: Node<'t>,
    local: bool,
}

impl<'t> VariableDeclaration<'t> {
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn range(&self) -> Range {
        self.node.range()
    }

    pub fn targets(&self) -> AstResult<Vec<VariableRef<'t>>> {
        let mut targets = Vec::new();
        for child in self.node.children() {
            if is_token(child, "=") {
                break;
            }
            if child.is_named() {
                targets.push(VariableRef::new(child)?);
            }
        }
        Ok(targets)
    }

    pub fn expressions(&self) -> AstResult<Vec<Expression<'t>>> {
        let mut seen_eq = false;
        let mut exprs = Vec::new();
        for child in self.node.children() {
            if is_token(child, "=") {
                seen_eq = true;
                continue;
            }
            if seen_eq && child.is_named() {
                exprs.push(Expression::new(child)?);
            }
        }
        Ok(exprs)
    }
}

#[derive(Clone, Copy)]
pub struct DoBlock<'t>(Node<'t>);

impl<'t> DoBlock<'t> {
    pub fn body(&self) -> Body<'t> {
        Body::from_nodes(self.0.named_children().collect())
    }
}

#[derive(Clone, Copy)]
pub struct IfStatement<'t>(Node<'t>);

impl<'t> IfStatement<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        Ok(Self(expect_kind(node, NodeKind::IfStatement)?))
    }

    pub fn condition(&self) -> AstResult<Expression<'t>> {
        let cond = self
            .0
            .named_children()
            .find(|n| n.kind() == NodeKind::ConditionExpression)
            .ok_or_else(|| missing(self.0, "a condition"))?;
        condition_expression(cond)
    }

    pub fn body(&self) -> Body<'t> {
        let nodes = self
            .0
            .named_children()
            .skip_while(|n| n.kind() == NodeKind::ConditionExpression)
            .take_while(|n| !matches!(n.kind(), NodeKind::ElseIf | NodeKind::Else))
            .collect();
        Body::from_nodes(nodes)
    }

    pub fn elseifs(&self) -> Vec<ElseIfBranch<'t>> {
        self.0
            .named_children()
            .filter(|n| n.kind() == NodeKind::ElseIf)
            .map(ElseIfBranch)
            .collect()
    }

    pub fn else_branch(&self) -> Option<ElseBranch<'t>> {
        self.0
            .named_children()
            .find(|n| n.kind() == NodeKind::Else)
            .map(ElseBranch)
    }
}

#[derive(Clone, Copy)]
pub struct ElseIfBranch<'t>(Node<'t>);

impl<'t> ElseIfBranch<'t> {
    pub fn condition(&self) -> AstResult<Expression<'t>> {
        let cond = self
            .0
            .named_children()
            .find(|n| n.kind() == NodeKind::ConditionExpression)
            .ok_or_else(|| missing(self.0, "a condition"))?;
        condition_expression(cond)
    }

    pub fn body(&self) -> Body<'t> {
        let nodes = self
            .0
            .named_children()
            .skip_while(|n| n.kind() == NodeKind::ConditionExpression)
            .collect();
        Body::from_nodes(nodes)
    }
}

#[derive(Clone, Copy)]
pub struct ElseBranch<'t>(Node<'t>);

impl<'t> ElseBranch<'t> {
    pub fn body(&self) -> Body<'t> {
        Body::from_nodes(self.0.named_children().collect())
    }
}

#[derive(Clone, Copy)]
pub struct WhileStatement<'t>(Node<'t>);

impl<'t> WhileStatement<'t> {
    pub fn condition(&self) -> AstResult<Expression<'t>> {
        let cond = self
            .0
            .named_children()
            .find(|n| n.kind() == NodeKind::ConditionExpression)
            .ok_or_else(|| missing(self.0, "a condition"))?;
        condition_expression(cond)
    }

    pub fn body(&self) -> Body<'t> {
        let nodes = self
            .0
            .named_children()
            .skip_while(|n| n.kind() == NodeKind::ConditionExpression)
            .collect();
        Body::from_nodes(nodes)
    }
}

/// `repeat body until condition`; the condition belongs to the body's
/// scope.
#[derive(Clone, Copy)]
pub struct RepeatStatement<'t>(Node<'t>);

impl<'t> RepeatStatement<'t> {
    pub fn body(&self) -> Body<'t> {
        let nodes = self
            .0
            .named_children()
            .take_while(|n| n.kind() != NodeKind::ConditionExpression)
            .collect();
        Body::from_nodes(nodes)
    }

    pub fn condition(&self) -> AstResult<Expression<'t>> {
        let cond = self
            .0
            .named_children()
            .find(|n| n.kind() == NodeKind::ConditionExpression)
            .ok_or_else(|| missing(self.0, "a condition"))?;
        condition_expression(cond)
    }
}

/// Numeric `for i = start, end [, step] do ... end`.
#[derive(Clone, Copy)]
pub struct ForRange<'t>(Node<'t>);

impl<'t> ForRange<'t> {
    fn header(&self) -> AstResult<Node<'t>> {
        self.0
            .named_children()
            .find(|n| n.kind() == NodeKind::LoopExpression)
            .ok_or_else(|| missing(self.0, "a loop header"))
    }

    pub fn var(&self) -> AstResult<Identifier<'t>> {
        let header = self.header()?;
        let node = header
            .named_child(0)
            .ok_or_else(|| missing(header, "a loop variable"))?;
        Identifier::new(node)
    }

    pub fn start(&self) -> AstResult<Expression<'t>> {
        let header = self.header()?;
        let node = header
            .named_child(1)
            .ok_or_else(|| missing(header, "a start expression"))?;
        Expression::new(node)
    }

    pub fn end(&self) -> AstResult<Expression<'t>> {
        let header = self.header()?;
        let node = header
            .named_child(2)
            .ok_or_else(|| missing(header, "an end expression"))?;
        Expression::new(node)
    }

    pub fn step(&self) -> AstResult<Option<Expression<'t>>> {
        let header = self.header()?;
        header.named_child(3).map(Expression::new).transpose()
    }

    pub fn body(&self) -> Body<'t> {
        let nodes = self
            .0
            .named_children()
            .skip_while(|n| n.kind() == NodeKind::LoopExpression)
            .collect();
        Body::from_nodes(nodes)
    }
}

/// `for a, b in explist do ... end`.
#[derive(Clone, Copy)]
pub struct ForIn<'t>(Node<'t>);

impl<'t> ForIn<'t> {
    pub fn vars(&self) -> AstResult<Vec<Identifier<'t>>> {
        let mut vars = Vec::new();
        for child in self.0.children() {
            if is_token(child, "in") {
                break;
            }
            if child.is_named() {
                vars.push(Identifier::new(child)?);
            }
        }
        Ok(vars)
    }

    pub fn expressions(&self) -> AstResult<Vec<Expression<'t>>> {
        let mut seen_in = false;
        let mut exprs = Vec::new();
        for child in self.0.children() {
            if is_token(child, "in") {
                seen_in = true;
                continue;
            }
            if is_token(child, "do") {
                break;
            }
            if seen_in && child.is_named() {
                exprs.push(Expression::new(child)?);
            }
        }
        Ok(exprs)
    }

    pub fn body(&self) -> Body<'t> {
        let mut seen_do = false;
        let mut nodes = Vec::new();
        for child in self.0.children() {
            if is_token(child, "do") {
                seen_do = true;
                continue;
            }
            if seen_do && child.is_named() {
                nodes.push(child);
            }
        }
        Body::from_nodes(nodes)
    }
}

#[derive(Clone, Copy)]
pub struct GoTo<'t>(Node<'t>);

impl<'t> GoTo<'t> {
    pub fn label(&self) -> AstResult<Identifier<'t>> {
        let node = self
            .0
            .named_child(0)
            .ok_or_else(|| missing(self.0, "a label name"))?;
        Identifier::new(node)
    }

    pub fn range(&self) -> Range {
        self.0.range()
    }
}

#[derive(Clone, Copy)]
pub struct Label<'t>(Node<'t>);

impl<'t> Label<'t> {
    pub fn name(&self) -> AstResult<Identifier<'t>> {
        let node = self
            .0
            .named_child(0)
            .ok_or_else(|| missing(self.0, "a label name"))?;
        Identifier::new(node)
    }
}

#[derive(Clone, Copy)]
pub struct Return<'t>(Node<'t>);

impl<'t> Return<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        Ok(Self(expect_kind(node, NodeKind::ReturnStatement)?))
    }

    pub fn expressions(&self) -> AstResult<Vec<Expression<'t>>> {
        self.0.named_children().map(Expression::new).collect()
    }

    pub fn range(&self) -> Range {
        self.0.range()
    }
}

/// `function name.path:method(params) body end`, optionally local.
#[derive(Clone, Copy)]
pub struct FunctionDeclaration<'t> {
    node: Node<'t>,
    local: bool,
}

impl<'t> FunctionDeclaration<'t> {
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// The tree node holding the parameter list and body, for closures
    /// that re-enter it at call time.
    pub fn body_node_id(&self) -> crate::language::tree::NodeId {
        self.node.id()
    }

    pub fn range(&self) -> Range {
        self.node.range()
    }

    /// The base name, the dotted path after it, and the method name if the
    /// declaration uses `:`.
    pub fn name(&self) -> AstResult<FunctionName<'t>> {
        if self.local {
            let base = self
                .node
                .named_children()
                .find(|n| n.kind() == NodeKind::Identifier)
                .ok_or_else(|| missing(self.node, "a function name"))?;
            return Ok(FunctionName {
                base: Identifier::new(base)?,
                path: Vec::new(),
                method: None,
            });
        }
        let name_node = self
            .node
            .named_children()
            .find(|n| n.kind() == NodeKind::FunctionName)
            .ok_or_else(|| missing(self.node, "a function name"))?;
        let base = name_node
            .named_child(0)
            .ok_or_else(|| missing(name_node, "a base name"))?;
        let mut path = Vec::new();
        let mut method = None;
        let mut after_colon = false;
        for child in name_node.children() {
            if is_token(child, ":") {
                after_colon = true;
                continue;
            }
            if child.kind() == NodeKind::PropertyIdentifier {
                if after_colon {
                    method = Some(Identifier::new(child)?);
                } else {
                    path.push(Identifier::new(child)?);
                }
            }
        }
        Ok(FunctionName {
            base: Identifier::new(base)?,
            path,
            method,
        })
    }

    pub fn parameters(&self) -> AstResult<ParameterList<'t>> {
        let params = self
            .node
            .named_children()
            .find(|n| n.kind() == NodeKind::Parameters)
            .ok_or_else(|| missing(self.node, "parameters"))?;
        ParameterList::new(params)
    }

    pub fn body(&self) -> Body<'t> {
        let nodes = self
            .node
            .named_children()
            .skip_while(|n| n.kind() != NodeKind::Parameters)
            .skip(1)
            .collect();
        Body::from_nodes(nodes)
    }
}

pub struct FunctionName<'t> {
    pub base: Identifier<'t>,
    pub path: Vec<Identifier<'t>>,
    pub method: Option<Identifier<'t>>,
}

#[derive(Clone, Copy)]
pub struct ParameterList<'t>(Node<'t>);

impl<'t> ParameterList<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        Ok(Self(expect_kind(node, NodeKind::Parameters)?))
    }

    pub fn names(&self) -> AstResult<Vec<Identifier<'t>>> {
        self.0
            .named_children()
            .filter(|n| n.kind() == NodeKind::Identifier)
            .map(Identifier::new)
            .collect()
    }

    pub fn is_variadic(&self) -> bool {
        self.0.named_children().any(|n| n.kind() == NodeKind::Spread)
    }
}

// ---- expressions ----

#[derive(Clone)]
pub enum Expression<'t> {
    Spread(Node<'t>),
    Prefix(Prefix<'t>),
    FunctionDefinition(FunctionDefinition<'t>),
    Table(TableConstructor<'t>),
    BinaryOp(BinaryOperation<'t>),
    UnaryOp(UnaryOperation<'t>),
    Literal(Literal<'t>),
    Identifier(Identifier<'t>),
}

impl<'t> Expression<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        let expr = match node.kind() {
            NodeKind::Spread => Expression::Spread(node),
            NodeKind::FunctionDefinition => {
                Expression::FunctionDefinition(FunctionDefinition(node))
            }
            NodeKind::TableConstructor => Expression::Table(TableConstructor(node)),
            NodeKind::BinaryOperation => Expression::BinaryOp(BinaryOperation::new(node)?),
            NodeKind::UnaryOperation => Expression::UnaryOp(UnaryOperation::new(node)?),
            NodeKind::Number
            | NodeKind::StringLiteral
            | NodeKind::True
            | NodeKind::False
            | NodeKind::Nil => Expression::Literal(Literal::new(node)?),
            NodeKind::Identifier => Expression::Identifier(Identifier::new(node)?),
            NodeKind::FunctionCall
            | NodeKind::ParenthesizedExpression
            | NodeKind::IndexExpression
            | NodeKind::FieldExpression => Expression::Prefix(Prefix::new(node)?),
            other => {
                return Err(AstError::new(
                    format!("{other:?} is not an expression"),
                    node.range(),
                ))
            }
        };
        Ok(expr)
    }

    pub fn range(&self) -> Range {
        match self {
            Expression::Spread(n) => n.range(),
            Expression::Prefix(p) => p.range(),
            Expression::FunctionDefinition(f) => f.0.range(),
            Expression::Table(t) => t.0.range(),
            Expression::BinaryOp(b) => b.node.range(),
            Expression::UnaryOp(u) => u.node.range(),
            Expression::Literal(l) => l.node.range(),
            Expression::Identifier(i) => i.node.range(),
        }
    }
}

fn condition_expression(node: Node<'_>) -> AstResult<Expression<'_>> {
    let inner = expect_kind(node, NodeKind::ConditionExpression)?
        .named_child(0)
        .ok_or_else(|| missing(node, "an inner expression"))?;
    Expression::new(inner)
}

/// The head of an access chain.
#[derive(Clone)]
pub enum Prefix<'t> {
    SelfRef(Node<'t>),
    VariableRef(VariableRef<'t>),
    FunctionCall(FunctionCall<'t>),
    Parenthesized(Parenthesized<'t>),
}

impl<'t> Prefix<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        let prefix = match node.kind() {
            NodeKind::Identifier if node.text() == "self" => Prefix::SelfRef(node),
            NodeKind::Identifier | NodeKind::IndexExpression | NodeKind::FieldExpression => {
                Prefix::VariableRef(VariableRef::new(node)?)
            }
            NodeKind::FunctionCall => Prefix::FunctionCall(FunctionCall::new(node)?),
            NodeKind::ParenthesizedExpression => {
                Prefix::Parenthesized(Parenthesized::new(node)?)
            }
            other => {
                return Err(AstError::new(
                    format!("{other:?} is not a prefix"),
                    node.range(),
                ))
            }
        };
        Ok(prefix)
    }

    pub fn range(&self) -> Range {
        match self {
            Prefix::SelfRef(n) => n.range(),
            Prefix::VariableRef(v) => v.range(),
            Prefix::FunctionCall(c) => c.node().range(),
            Prefix::Parenthesized(p) => p.0.range(),
        }
    }
}

/// A readable or assignable place: a name, `t[k]`, or `t.f`.
#[derive(Clone)]
pub enum VariableRef<'t> {
    Name(Identifier<'t>),
    Index(IndexExpression<'t>),
    Field(FieldExpression<'t>),
}

impl<'t> VariableRef<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        let var = match node.kind() {
            NodeKind::Identifier => VariableRef::Name(Identifier::new(node)?),
            NodeKind::IndexExpression => VariableRef::Index(IndexExpression(node)),
            NodeKind::FieldExpression => VariableRef::Field(FieldExpression(node)),
            other => {
                return Err(AstError::new(
                    format!("{other:?} is not assignable"),
                    node.range(),
                ))
            }
        };
        Ok(var)
    }

    pub fn range(&self) -> Range {
        match self {
            VariableRef::Name(i) => i.node.range(),
            VariableRef::Index(i) => i.0.range(),
            VariableRef::Field(f) => f.0.range(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct IndexExpression<'t>(Node<'t>);

impl<'t> IndexExpression<'t> {
    pub fn object(&self) -> AstResult<Expression<'t>> {
        let node = self
            .0
            .named_child(0)
            .ok_or_else(|| missing(self.0, "an object"))?;
        Expression::new(node)
    }

    pub fn index(&self) -> AstResult<Expression<'t>> {
        let node = self
            .0
            .named_child(1)
            .ok_or_else(|| missing(self.0, "an index"))?;
        Expression::new(node)
    }

    pub fn range(&self) -> Range {
        self.0.range()
    }
}

#[derive(Clone, Copy)]
pub struct FieldExpression<'t>(Node<'t>);

impl<'t> FieldExpression<'t> {
    pub fn object(&self) -> AstResult<Expression<'t>> {
        let node = self
            .0
            .named_child(0)
            .ok_or_else(|| missing(self.0, "an object"))?;
        Expression::new(node)
    }

    pub fn field(&self) -> AstResult<Identifier<'t>> {
        let node = self
            .0
            .named_children()
            .find(|n| n.kind() == NodeKind::PropertyIdentifier)
            .ok_or_else(|| missing(self.0, "a field name"))?;
        Identifier::new(node)
    }

    pub fn range(&self) -> Range {
        self.0.range()
    }
}

#[derive(Clone, Copy)]
pub struct Parenthesized<'t>(Node<'t>);

impl<'t> Parenthesized<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        Ok(Self(expect_kind(node, NodeKind::ParenthesizedExpression)?))
    }

    pub fn expression(&self) -> AstResult<Expression<'t>> {
        let node = self
            .0
            .named_child(0)
            .ok_or_else(|| missing(self.0, "an inner expression"))?;
        Expression::new(node)
    }
}

/// `callee(args)` or `obj:method(args)`.
#[derive(Clone, Copy)]
pub struct FunctionCall<'t>(Node<'t>);

impl<'t> FunctionCall<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        Ok(Self(expect_kind(node, NodeKind::FunctionCall)?))
    }

    pub fn node(&self) -> Node<'t> {
        self.0
    }

    pub fn callee(&self) -> AstResult<Prefix<'t>> {
        let node = self
            .0
            .named_child(0)
            .ok_or_else(|| missing(self.0, "a callee"))?;
        Prefix::new(node)
    }

    pub fn method(&self) -> Option<Identifier<'t>> {
        self.0
            .named_children()
            .find(|n| n.kind() == NodeKind::PropertyIdentifier)
            .and_then(|n| Identifier::new(n).ok())
    }

    pub fn arguments(&self) -> AstResult<Vec<Expression<'t>>> {
        let args = self
            .0
            .named_children()
            .find(|n| n.kind() == NodeKind::Arguments)
            .ok_or_else(|| missing(self.0, "arguments"))?;
        args.named_children().map(Expression::new).collect()
    }

    pub fn range(&self) -> Range {
        self.0.range()
    }
}

/// Anonymous `function(params) body end`.
#[derive(Clone, Copy)]
pub struct FunctionDefinition<'t>(Node<'t>);

impl<'t> FunctionDefinition<'t> {
    pub fn node(&self) -> Node<'t> {
        self.0
    }

    pub fn parameters(&self) -> AstResult<ParameterList<'t>> {
        let params = self
            .0
            .named_children()
            .find(|n| n.kind() == NodeKind::Parameters)
            .ok_or_else(|| missing(self.0, "parameters"))?;
        ParameterList::new(params)
    }

    pub fn body(&self) -> Body<'t> {
        let nodes = self
            .0
            .named_children()
            .skip_while(|n| n.kind() != NodeKind::Parameters)
            .skip(1)
            .collect();
        Body::from_nodes(nodes)
    }

    pub fn range(&self) -> Range {
        self.0.range()
    }
}

#[derive(Clone, Copy)]
pub struct TableConstructor<'t>(Node<'t>);

impl<'t> TableConstructor<'t> {
    pub fn fields(&self) -> AstResult<Vec<Field<'t>>> {
        self.0
            .named_children()
            .filter(|n| n.kind() == NodeKind::Field)
            .map(Field::classify)
            .collect()
    }

    pub fn range(&self) -> Range {
        self.0.range()
    }
}

#[derive(Clone)]
pub enum Field<'t> {
    /// `[key] = value`
    Bracket(Expression<'t>, Expression<'t>),
    /// `name = value`
    Named(Identifier<'t>, Expression<'t>),
    /// positional `value`
    Positional(Expression<'t>),
}

impl<'t> Field<'t> {
    fn classify(node: Node<'t>) -> AstResult<Self> {
        let named: Vec<Node<'t>> = node.named_children().collect();
        let first_token_is_bracket = node
            .child(0)
            .map(|c| is_token(c, "["))
            .unwrap_or(false);
        let field = if first_token_is_bracket {
            let key = named
                .first()
                .copied()
                .ok_or_else(|| missing(node, "a key"))?;
            let value = named
                .get(1)
                .copied()
                .ok_or_else(|| missing(node, "a value"))?;
            Field::Bracket(Expression::new(key)?, Expression::new(value)?)
        } else if named.first().map(|n| n.kind()) == Some(NodeKind::PropertyIdentifier) {
            let name = Identifier::new(named[0])?;
            let value = named
                .get(1)
                .copied()
                .ok_or_else(|| missing(node, "a value"))?;
            Field::Named(name, Expression::new(value)?)
        } else {
            let value = named
                .first()
                .copied()
                .ok_or_else(|| missing(node, "a value"))?;
            Field::Positional(Expression::new(value)?)
        };
        Ok(field)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
}

#[derive(Clone, Copy)]
pub struct BinaryOperation<'t> {
    node: Node<'t>,
}

impl<'t> BinaryOperation<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        let node = expect_kind(node, NodeKind::BinaryOperation)?;
        if node.child_count() != 3 {
            return Err(missing(node, "two operands and an operator"));
        }
        Ok(Self { node })
    }

    pub fn left(&self) -> AstResult<Expression<'t>> {
        Expression::new(self.node.child(0).ok_or_else(|| missing(self.node, "a left operand"))?)
    }

    pub fn right(&self) -> AstResult<Expression<'t>> {
        Expression::new(self.node.child(2).ok_or_else(|| missing(self.node, "a right operand"))?)
    }

    pub fn operator(&self) -> AstResult<BinOp> {
        let op = self
            .node
            .child(1)
            .ok_or_else(|| missing(self.node, "an operator"))?;
        let op = match op.text() {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "^" => BinOp::Pow,
            ".." => BinOp::Concat,
            "==" => BinOp::Eq,
            "~=" => BinOp::Neq,
            "<" => BinOp::Lt,
            "<=" => BinOp::LtEq,
            ">" => BinOp::Gt,
            ">=" => BinOp::GtEq,
            "and" => BinOp::And,
            "or" => BinOp::Or,
            "&" => BinOp::BitAnd,
            "|" => BinOp::BitOr,
            other => {
                return Err(AstError::new(
                    format!("unknown binary operator `{other}`"),
                    self.node.range(),
                ))
            }
        };
        Ok(op)
    }

    pub fn range(&self) -> Range {
        self.node.range()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

#[derive(Clone, Copy)]
pub struct UnaryOperation<'t> {
    node: Node<'t>,
}

impl<'t> UnaryOperation<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        let node = expect_kind(node, NodeKind::UnaryOperation)?;
        if node.child_count() != 2 {
            return Err(missing(node, "an operator and an operand"));
        }
        Ok(Self { node })
    }

    pub fn operator(&self) -> AstResult<UnOp> {
        let op = self
            .node
            .child(0)
            .ok_or_else(|| missing(self.node, "an operator"))?;
        let op = match op.text() {
            "-" => UnOp::Neg,
            "not" => UnOp::Not,
            "#" => UnOp::Len,
            other => {
                return Err(AstError::new(
                    format!("unknown unary operator `{other}`"),
                    self.node.range(),
                ))
            }
        };
        Ok(op)
    }

    pub fn operand(&self) -> AstResult<Expression<'t>> {
        Expression::new(self.node.child(1).ok_or_else(|| missing(self.node, "an operand"))?)
    }

    pub fn range(&self) -> Range {
        self.node.range()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    Nil,
    True,
    False,
    Number,
    Str,
}

#[derive(Clone, Copy)]
pub struct Literal<'t> {
    node: Node<'t>,
    pub kind: LiteralKind,
}

impl<'t> Literal<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        let kind = match node.kind() {
            NodeKind::Nil => LiteralKind::Nil,
            NodeKind::True => LiteralKind::True,
            NodeKind::False => LiteralKind::False,
            NodeKind::Number => LiteralKind::Number,
            NodeKind::StringLiteral => LiteralKind::Str,
            other => {
                return Err(AstError::new(
                    format!("{other:?} is not a literal"),
                    node.range(),
                ))
            }
        };
        Ok(Self { node, kind })
    }

    pub fn text(&self) -> &'t str {
        self.node.text()
    }

    pub fn range(&self) -> Range {
        self.node.range()
    }
}

#[derive(Clone, Copy)]
pub struct Identifier<'t> {
    node: Node<'t>,
}

impl<'t> Identifier<'t> {
    pub fn new(node: Node<'t>) -> AstResult<Self> {
        match node.kind() {
            NodeKind::Identifier | NodeKind::PropertyIdentifier => Ok(Self { node }),
            other => Err(AstError::new(
                format!("{other:?} is not an identifier"),
                node.range(),
            )),
        }
    }

    pub fn name(&self) -> &'t str {
        self.node.text()
    }

    pub fn range(&self) -> Range {
        self.node.range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse;
    use crate::language::tree::ParseTree;
    use std::rc::Rc;

    fn tree(source: &str) -> Rc<ParseTree> {
        Rc::new(parse(source).expect("parse"))
    }

    #[test]
    fn program_body_splits_trailing_return() {
        let tree = tree("x = 1 return x");
        let program = Program::new(tree.root()).unwrap();
        let body = program.body();
        assert_eq!(body.statements().unwrap().len(), 1);
        let ret = body.return_statement().unwrap().expect("return");
        assert_eq!(ret.expressions().unwrap().len(), 1);
    }

    #[test]
    fn if_statement_exposes_all_arms() {
        let tree = tree("if a then x = 1 elseif b then x = 2 elseif c then x = 3 else x = 4 end");
        let program = Program::new(tree.root()).unwrap();
        let stmts = program.body().statements().unwrap();
        let Statement::If(if_stmt) = &stmts[0] else {
            panic!("expected if");
        };
        assert!(matches!(if_stmt.condition().unwrap(), Expression::Identifier(_)));
        assert_eq!(if_stmt.body().statements().unwrap().len(), 1);
        assert_eq!(if_stmt.elseifs().len(), 2);
        assert!(if_stmt.else_branch().is_some());
    }

    #[test]
    fn for_range_header_ordering() {
        let tree = tree("for i = 1, 10, 2 do end");
        let program = Program::new(tree.root()).unwrap();
        let stmts = program.body().statements().unwrap();
        let Statement::ForRange(for_stmt) = &stmts[0] else {
            panic!("expected for");
        };
        assert_eq!(for_stmt.var().unwrap().name(), "i");
        assert_eq!(for_stmt.start().unwrap().range().len(), 1);
        let Expression::Literal(end) = for_stmt.end().unwrap() else {
            panic!("expected literal end");
        };
        assert_eq!(end.text(), "10");
        assert!(for_stmt.step().unwrap().is_some());
    }

    #[test]
    fn for_in_splits_vars_and_expressions() {
        let tree = tree("for k, v in next, t do x = k end");
        let program = Program::new(tree.root()).unwrap();
        let stmts = program.body().statements().unwrap();
        let Statement::ForIn(for_in) = &stmts[0] else {
            panic!("expected for-in");
        };
        let vars = for_in.vars().unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name(), "k");
        assert_eq!(for_in.expressions().unwrap().len(), 2);
        assert_eq!(for_in.body().statements().unwrap().len(), 1);
    }

    #[test]
    fn method_call_exposes_method_name() {
        let tree = tree("obj:greet(1)");
        let program = Program::new(tree.root()).unwrap();
        let stmts = program.body().statements().unwrap();
        let Statement::FunctionCall(call) = &stmts[0] else {
            panic!("expected call");
        };
        assert_eq!(call.method().unwrap().name(), "greet");
        assert_eq!(call.arguments().unwrap().len(), 1);
        assert!(matches!(call.callee().unwrap(), Prefix::VariableRef(_)));
    }

    #[test]
    fn table_fields_classify() {
        let tree = tree("t = { 1, a = 2, [3] = 4 }");
        let program = Program::new(tree.root()).unwrap();
        let stmts = program.body().statements().unwrap();
        let Statement::VarDecl(decl) = &stmts[0] else {
            panic!("expected declaration");
        };
        let Expression::Table(table) = &decl.expressions().unwrap()[0] else {
            panic!("expected table");
        };
        let fields = table.fields().unwrap();
        assert!(matches!(fields[0], Field::Positional(_)));
        assert!(matches!(fields[1], Field::Named(_, _)));
        assert!(matches!(fields[2], Field::Bracket(_, _)));
    }

    #[test]
    fn repeat_condition_is_separate_from_body() {
        let tree = tree("repeat x = 1 until x");
        let program = Program::new(tree.root()).unwrap();
        let stmts = program.body().statements().unwrap();
        let Statement::Repeat(repeat) = &stmts[0] else {
            panic!("expected repeat");
        };
        assert_eq!(repeat.body().statements().unwrap().len(), 1);
        assert!(matches!(repeat.condition().unwrap(), Expression::Identifier(_)));
    }

    #[test]
    fn function_declaration_name_parts() {
        let tree = tree("function a.b:c(x) return x end");
        let program = Program::new(tree.root()).unwrap();
        let stmts = program.body().statements().unwrap();
        let Statement::FunctionDecl(decl) = &stmts[0] else {
            panic!("expected function declaration");
        };
        let name = decl.name().unwrap();
        assert_eq!(name.base.name(), "a");
        assert_eq!(name.path.len(), 1);
        assert_eq!(name.method.as_ref().unwrap().name(), "c");
        assert_eq!(decl.parameters().unwrap().names().unwrap().len(), 1);
    }

    #[test]
    fn rejects_wrong_node_kind() {
        let tree = tree("x = 1");
        assert!(Program::new(tree.root()).is_ok());
        let decl = tree.root().named_child(0).unwrap();
        assert!(Program::new(decl).is_err());
    }
}
