use crate::language::{
    errors::SyntaxError,
    span::{location_at, Range},
};
use std::fmt;
use std::rc::Rc;

/// Node types of the parse tree. `Token` marks anonymous nodes (keywords
/// and punctuation) that named-child navigation skips over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Program,
    VariableDeclaration,
    LocalVariableDeclaration,
    DoStatement,
    IfStatement,
    ElseIf,
    Else,
    WhileStatement,
    RepeatStatement,
    ForStatement,
    ForInStatement,
    LoopExpression,
    GotoStatement,
    LabelStatement,
    BreakStatement,
    ReturnStatement,
    FunctionDeclaration,
    LocalFunctionDeclaration,
    FunctionName,
    FunctionDefinition,
    Parameters,
    FunctionCall,
    Arguments,
    ConditionExpression,
    ParenthesizedExpression,
    BinaryOperation,
    UnaryOperation,
    TableConstructor,
    Field,
    IndexExpression,
    FieldExpression,
    Identifier,
    PropertyIdentifier,
    Number,
    StringLiteral,
    True,
    False,
    Nil,
    Spread,
    Token,
}

pub type NodeId = usize;

#[derive(Clone, Debug)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub range: Range,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// An immutable parse tree together with the source text it was built
/// from. Shared by `Rc` so user function values can outlive a reparse.
pub struct ParseTree {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) root: NodeId,
    pub(crate) source: String,
}

impl ParseTree {
    pub fn root(self: &Rc<Self>) -> Node<'_> {
        Node {
            tree: self,
            id: self.root,
        }
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for ParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParseTree({} nodes)", self.nodes.len())
    }
}

/// A lightweight handle to one node of a `ParseTree`.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t ParseTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn range(&self) -> Range {
        self.data().range
    }

    pub fn text(&self) -> &'t str {
        let range = self.range();
        &self.tree.source[range.start.byte..range.end.byte]
    }

    pub fn is_named(&self) -> bool {
        self.kind() != NodeKind::Token
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn child(&self, index: usize) -> Option<Node<'t>> {
        self.data().children.get(index).map(|&id| Node {
            tree: self.tree,
            id,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + '_ {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| Node { tree, id })
    }

    pub fn named_children(&self) -> impl Iterator<Item = Node<'t>> + '_ {
        self.children().filter(|n| n.is_named())
    }

    pub fn named_child(&self, index: usize) -> Option<Node<'t>> {
        self.named_children().nth(index)
    }

    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.data().parent.map(|id| Node {
            tree: self.tree,
            id,
        })
    }

    pub fn next_sibling(&self) -> Option<Node<'t>> {
        let parent = self.data().parent?;
        let siblings = &self.tree.nodes[parent].children;
        let pos = siblings.iter().position(|&id| id == self.id)?;
        siblings.get(pos + 1).map(|&id| Node {
            tree: self.tree,
            id,
        })
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind(), self.range())
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

/// A stateful walker over sibling chains, in the shape of the incremental
/// parser's cursor protocol.
pub struct Cursor<'t> {
    tree: &'t ParseTree,
    current: NodeId,
}

impl<'t> Cursor<'t> {
    pub fn new(node: Node<'t>) -> Self {
        Self {
            tree: node.tree,
            current: node.id,
        }
    }

    pub fn current_node(&self) -> Node<'t> {
        Node {
            tree: self.tree,
            id: self.current,
        }
    }

    pub fn reset(&mut self, node: Node<'t>) {
        self.current = node.id;
    }

    pub fn goto_first_child(&mut self) -> bool {
        match self.tree.nodes[self.current].children.first() {
            Some(&child) => {
                self.current = child;
                true
            }
            None => false,
        }
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        match self.current_node().next_sibling() {
            Some(node) => {
                self.current = node.id;
                true
            }
            None => false,
        }
    }

    /// Advances over up to `n` siblings and returns how many were skipped.
    pub fn skip_n_siblings(&mut self, n: usize) -> usize {
        let mut skipped = 0;
        while skipped < n && self.goto_next_sibling() {
            skipped += 1;
        }
        skipped
    }

    pub fn skip_siblings_while(&mut self, pred: impl Fn(Node<'t>) -> bool) {
        while pred(self.current_node()) {
            if !self.goto_next_sibling() {
                break;
            }
        }
    }
}

/// A textual replacement handed to the buffer's edit protocol.
#[derive(Clone, Debug, PartialEq)]
pub struct InputEdit {
    pub range: Range,
    pub replacement: String,
}

#[derive(Clone, Debug, Default)]
pub struct ParseResult {
    pub errors: Vec<SyntaxError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone, Debug)]
pub enum ApplyError {
    /// Overlapping edits are a programmer error at the call site.
    Overlapping { first: Range, second: Range },
    /// The edited source no longer parses.
    Reparse(Vec<SyntaxError>),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::Overlapping { first, second } => {
                write!(f, "overlapping edits at {first} and {second}")
            }
            ApplyError::Reparse(errors) => {
                write!(f, "edited source no longer parses ({} errors)", errors.len())
            }
        }
    }
}

/// Owns the source text and its parse tree and keeps them consistent
/// across `parse` and `apply` calls.
#[derive(Debug, Default)]
pub struct SourceBuffer {
    source: String,
    tree: Option<Rc<ParseTree>>,
}

impl SourceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces source and tree atomically. On parse errors the buffer
    /// keeps the new source but drops the tree.
    pub fn parse(&mut self, source: impl Into<String>) -> ParseResult {
        let source = source.into();
        match crate::language::parser::parse(&source) {
            Ok(tree) => {
                self.source = tree.source.clone();
                self.tree = Some(Rc::new(tree));
                ParseResult { errors: Vec::new() }
            }
            Err(errors) => {
                self.source = source;
                self.tree = None;
                ParseResult {
                    errors: errors.errors,
                }
            }
        }
    }

    /// Applies non-overlapping edits in descending start-byte order so the
    /// offsets of not-yet-applied edits stay valid, then reparses.
    /// Returns the changed ranges in the new source.
    pub fn apply(&mut self, edits: &[InputEdit]) -> Result<Vec<Range>, ApplyError> {
        let mut ordered: Vec<&InputEdit> = edits.iter().collect();
        ordered.sort_by(|a, b| b.range.start.byte.cmp(&a.range.start.byte));
        for pair in ordered.windows(2) {
            if pair[1].range.overlaps(&pair[0].range) {
                return Err(ApplyError::Overlapping {
                    first: pair[1].range,
                    second: pair[0].range,
                });
            }
        }

        let mut source = self.source.clone();
        for edit in &ordered {
            source.replace_range(edit.range.start.byte..edit.range.end.byte, &edit.replacement);
        }

        // Changed ranges, shifted by the deltas of all edits before them.
        let mut changed = Vec::with_capacity(ordered.len());
        let mut delta: isize = 0;
        for edit in ordered.iter().rev() {
            let start = (edit.range.start.byte as isize + delta) as usize;
            let end = start + edit.replacement.len();
            changed.push(Range::new(
                location_at(&source, start),
                location_at(&source, end),
            ));
            delta += edit.replacement.len() as isize - edit.range.len() as isize;
        }

        let result = self.parse(source);
        if !result.is_ok() {
            return Err(ApplyError::Reparse(result.errors));
        }
        Ok(changed)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> Option<&Rc<ParseTree>> {
        self.tree.as_ref()
    }

    pub fn root(&self) -> Option<Node<'_>> {
        self.tree.as_ref().map(|tree| tree.node(tree.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::Location;

    fn edit(start: usize, end: usize, replacement: &str, source: &str) -> InputEdit {
        InputEdit {
            range: Range::new(location_at(source, start), location_at(source, end)),
            replacement: replacement.to_string(),
        }
    }

    #[test]
    fn parse_builds_a_program_root() {
        let mut buffer = SourceBuffer::new();
        assert!(buffer.parse("x = 1").is_ok());
        let root = buffer.root().expect("tree");
        assert_eq!(root.kind(), NodeKind::Program);
        assert_eq!(root.named_child(0).unwrap().kind(), NodeKind::VariableDeclaration);
    }

    #[test]
    fn apply_edits_in_descending_order() {
        let src = "x = 1 + 2";
        let mut buffer = SourceBuffer::new();
        assert!(buffer.parse(src).is_ok());
        let edits = vec![edit(4, 5, "10", src), edit(8, 9, "20", src)];
        buffer.apply(&edits).expect("apply");
        assert_eq!(buffer.source(), "x = 10 + 20");
    }

    #[test]
    fn apply_matches_direct_reparse() {
        let src = "y = 1 + 2";
        let mut buffer = SourceBuffer::new();
        assert!(buffer.parse(src).is_ok());
        buffer.apply(&[edit(4, 5, "8", src)]).expect("apply");

        let mut direct = SourceBuffer::new();
        assert!(direct.parse("y = 8 + 2").is_ok());
        assert_eq!(buffer.source(), direct.source());

        fn shape(node: Node<'_>) -> Vec<NodeKind> {
            let mut kinds = vec![node.kind()];
            for child in node.children() {
                kinds.extend(shape(child));
            }
            kinds
        }
        assert_eq!(
            shape(buffer.root().unwrap()),
            shape(direct.root().unwrap())
        );
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let src = "x = 123";
        let mut buffer = SourceBuffer::new();
        assert!(buffer.parse(src).is_ok());
        let edits = vec![edit(4, 6, "9", src), edit(5, 7, "8", src)];
        assert!(matches!(
            buffer.apply(&edits),
            Err(ApplyError::Overlapping { .. })
        ));
    }

    #[test]
    fn changed_ranges_point_into_new_source() {
        let src = "x = 1";
        let mut buffer = SourceBuffer::new();
        assert!(buffer.parse(src).is_ok());
        let changed = buffer.apply(&[edit(4, 5, "100", src)]).expect("apply");
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].start, Location::new(0, 4, 4));
        assert_eq!(changed[0].end.byte, 7);
    }

    #[test]
    fn cursor_walks_sibling_chains() {
        let mut buffer = SourceBuffer::new();
        assert!(buffer.parse("do x = 1 y = 2 end").is_ok());
        let root = buffer.root().unwrap();
        let do_stmt = root.named_child(0).unwrap();
        assert_eq!(do_stmt.kind(), NodeKind::DoStatement);

        let mut cursor = Cursor::new(do_stmt);
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.current_node().text(), "do");
        assert!(cursor.goto_next_sibling());
        assert_eq!(cursor.current_node().kind(), NodeKind::VariableDeclaration);
        cursor.skip_siblings_while(|n| n.kind() != NodeKind::Token);
        assert_eq!(cursor.current_node().text(), "end");

        cursor.reset(do_stmt);
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.skip_n_siblings(10), 3);
    }
}
