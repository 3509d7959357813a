use crate::language::{
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Range,
    token::{Token, TokenKind},
    tree::{NodeData, NodeId, NodeKind, ParseTree},
};

/// Parses `source` into a concrete tree. Keywords and punctuation become
/// anonymous token nodes so sibling navigation sees the full node chain.
pub fn parse(source: &str) -> Result<ParseTree, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.range))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(source, tokens).parse()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<NodeData>,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            nodes: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<ParseTree, SyntaxErrors> {
        let mut children = Vec::new();
        while !self.is_eof() {
            if self.check(TokenKind::Semi) {
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => {
                    let is_return = self.nodes[stmt].kind == NodeKind::ReturnStatement;
                    children.push(stmt);
                    if is_return {
                        if self.check(TokenKind::Semi) {
                            self.advance();
                        }
                        if !self.is_eof() {
                            self.errors.push(
                                self.error_here("'return' must be the last statement of a block"),
                            );
                            self.synchronize();
                        }
                    }
                }
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }

        let range = if children.is_empty() {
            Range::default()
        } else {
            self.node_range(children[0]).union(self.node_range(*children.last().unwrap()))
        };
        let root = self.add_node(NodeKind::Program, range, children);

        if !self.errors.is_empty() {
            return Err(SyntaxErrors::new(self.errors));
        }

        let mut nodes = self.nodes;
        for id in 0..nodes.len() {
            for child_idx in 0..nodes[id].children.len() {
                let child = nodes[id].children[child_idx];
                nodes[child].parent = Some(id);
            }
        }

        Ok(ParseTree {
            nodes,
            root,
            source: self.source.to_string(),
        })
    }

    // node building

    fn add_node(&mut self, kind: NodeKind, range: Range, children: Vec<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            kind,
            range,
            parent: None,
            children,
        });
        id
    }

    fn node_range(&self, id: NodeId) -> Range {
        self.nodes[id].range
    }

    fn finish_node(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        let range = children
            .iter()
            .map(|&id| self.node_range(id))
            .reduce(|a, b| a.union(b))
            .unwrap_or_default();
        self.add_node(kind, range, children)
    }

    // token access

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.peek().range)
    }

    /// Consumes the expected token and records it as an anonymous node.
    fn expect_token(&mut self, kind: TokenKind, message: &str) -> Result<NodeId, SyntaxError> {
        if self.check(kind) {
            let token = self.advance();
            Ok(self.add_node(NodeKind::Token, token.range, Vec::new()))
        } else {
            Err(self.error_here(message))
        }
    }

    fn match_token(&mut self, kind: TokenKind) -> Option<NodeId> {
        if self.check(kind) {
            let token = self.advance();
            Some(self.add_node(NodeKind::Token, token.range, Vec::new()))
        } else {
            None
        }
    }

    fn expect_identifier(&mut self, kind: NodeKind, message: &str) -> Result<NodeId, SyntaxError> {
        match self.peek().kind.clone() {
            TokenKind::Identifier(_) => {
                let token = self.advance();
                Ok(self.add_node(kind, token.range, Vec::new()))
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn synchronize(&mut self) {
        if !self.is_eof() {
            self.advance();
        }
        while !self.is_eof() {
            match self.peek().kind {
                TokenKind::Local
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Repeat
                | TokenKind::For
                | TokenKind::Function
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Do
                | TokenKind::End => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // statements

    fn parse_statement(&mut self) -> Result<NodeId, SyntaxError> {
        match self.peek().kind {
            TokenKind::Do => self.parse_do_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Repeat => self.parse_repeat_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Goto => self.parse_goto_statement(),
            TokenKind::ColonColon => self.parse_label_statement(),
            TokenKind::Break => {
                let token = self.advance();
                Ok(self.add_node(NodeKind::BreakStatement, token.range, Vec::new()))
            }
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::Local => self.parse_local_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    /// Statements until one of the terminating keywords; the terminator is
    /// not consumed.
    fn parse_body(&mut self, children: &mut Vec<NodeId>) -> Result<(), SyntaxError> {
        loop {
            match self.peek().kind {
                TokenKind::End
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::Until
                | TokenKind::Eof => return Ok(()),
                TokenKind::Semi => {
                    self.advance();
                }
                _ => {
                    let stmt = self.parse_statement()?;
                    let is_return = self.nodes[stmt].kind == NodeKind::ReturnStatement;
                    children.push(stmt);
                    if is_return {
                        if self.check(TokenKind::Semi) {
                            self.advance();
                        }
                        if !matches!(
                            self.peek().kind,
                            TokenKind::End
                                | TokenKind::Else
                                | TokenKind::ElseIf
                                | TokenKind::Until
                                | TokenKind::Eof
                        ) {
                            return Err(
                                self.error_here("'return' must be the last statement of a block")
                            );
                        }
                    }
                }
            }
        }
    }

    fn parse_do_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::Do, "Expected 'do'")?];
        self.parse_body(&mut children)?;
        children.push(self.expect_token(TokenKind::End, "Expected 'end' to close 'do' block")?);
        Ok(self.finish_node(NodeKind::DoStatement, children))
    }

    fn parse_condition(&mut self) -> Result<NodeId, SyntaxError> {
        let expr = self.parse_expression()?;
        let range = self.node_range(expr);
        Ok(self.add_node(NodeKind::ConditionExpression, range, vec![expr]))
    }

    fn parse_if_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::If, "Expected 'if'")?];
        children.push(self.parse_condition()?);
        children.push(self.expect_token(TokenKind::Then, "Expected 'then' after condition")?);
        self.parse_body(&mut children)?;

        while self.check(TokenKind::ElseIf) {
            let mut arm = vec![self.expect_token(TokenKind::ElseIf, "Expected 'elseif'")?];
            arm.push(self.parse_condition()?);
            arm.push(self.expect_token(TokenKind::Then, "Expected 'then' after condition")?);
            self.parse_body(&mut arm)?;
            children.push(self.finish_node(NodeKind::ElseIf, arm));
        }

        if self.check(TokenKind::Else) {
            let mut arm = vec![self.expect_token(TokenKind::Else, "Expected 'else'")?];
            self.parse_body(&mut arm)?;
            children.push(self.finish_node(NodeKind::Else, arm));
        }

        children.push(self.expect_token(TokenKind::End, "Expected 'end' to close 'if'")?);
        Ok(self.finish_node(NodeKind::IfStatement, children))
    }

    fn parse_while_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::While, "Expected 'while'")?];
        children.push(self.parse_condition()?);
        children.push(self.expect_token(TokenKind::Do, "Expected 'do' after condition")?);
        self.parse_body(&mut children)?;
        children.push(self.expect_token(TokenKind::End, "Expected 'end' to close 'while'")?);
        Ok(self.finish_node(NodeKind::WhileStatement, children))
    }

    fn parse_repeat_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::Repeat, "Expected 'repeat'")?];
        self.parse_body(&mut children)?;
        children.push(self.expect_token(TokenKind::Until, "Expected 'until' to close 'repeat'")?);
        children.push(self.parse_condition()?);
        Ok(self.finish_node(NodeKind::RepeatStatement, children))
    }

    fn parse_for_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let for_token = self.expect_token(TokenKind::For, "Expected 'for'")?;
        let numeric = matches!(self.peek().kind, TokenKind::Identifier(_))
            && self.peek_ahead(1).kind == TokenKind::Eq;
        if numeric {
            let mut header = vec![self.expect_identifier(NodeKind::Identifier, "Expected loop variable")?];
            header.push(self.expect_token(TokenKind::Eq, "Expected '=' in loop header")?);
            header.push(self.parse_expression()?);
            header.push(self.expect_token(TokenKind::Comma, "Expected ',' in loop header")?);
            header.push(self.parse_expression()?);
            if let Some(comma) = self.match_token(TokenKind::Comma) {
                header.push(comma);
                header.push(self.parse_expression()?);
            }
            let loop_expr = self.finish_node(NodeKind::LoopExpression, header);

            let mut children = vec![for_token, loop_expr];
            children.push(self.expect_token(TokenKind::Do, "Expected 'do' after loop header")?);
            self.parse_body(&mut children)?;
            children.push(self.expect_token(TokenKind::End, "Expected 'end' to close 'for'")?);
            Ok(self.finish_node(NodeKind::ForStatement, children))
        } else {
            let mut children = vec![for_token];
            children.push(self.expect_identifier(NodeKind::Identifier, "Expected loop variable")?);
            while let Some(comma) = self.match_token(TokenKind::Comma) {
                children.push(comma);
                children.push(self.expect_identifier(NodeKind::Identifier, "Expected loop variable")?);
            }
            children.push(self.expect_token(TokenKind::In, "Expected 'in' in loop header")?);
            children.push(self.parse_expression()?);
            while let Some(comma) = self.match_token(TokenKind::Comma) {
                children.push(comma);
                children.push(self.parse_expression()?);
            }
            children.push(self.expect_token(TokenKind::Do, "Expected 'do' after loop header")?);
            self.parse_body(&mut children)?;
            children.push(self.expect_token(TokenKind::End, "Expected 'end' to close 'for'")?);
            Ok(self.finish_node(NodeKind::ForInStatement, children))
        }
    }

    fn parse_goto_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::Goto, "Expected 'goto'")?];
        children.push(self.expect_identifier(NodeKind::Identifier, "Expected label name")?);
        Ok(self.finish_node(NodeKind::GotoStatement, children))
    }

    fn parse_label_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::ColonColon, "Expected '::'")?];
        children.push(self.expect_identifier(NodeKind::Identifier, "Expected label name")?);
        children.push(self.expect_token(TokenKind::ColonColon, "Expected '::' to close label")?);
        Ok(self.finish_node(NodeKind::LabelStatement, children))
    }

    fn parse_return_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::Return, "Expected 'return'")?];
        if !matches!(
            self.peek().kind,
            TokenKind::End
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::Until
                | TokenKind::Semi
                | TokenKind::Eof
        ) {
            children.push(self.parse_expression()?);
            while let Some(comma) = self.match_token(TokenKind::Comma) {
                children.push(comma);
                children.push(self.parse_expression()?);
            }
        }
        Ok(self.finish_node(NodeKind::ReturnStatement, children))
    }

    fn parse_function_declaration(&mut self) -> Result<NodeId, SyntaxError> {
        let function = self.expect_token(TokenKind::Function, "Expected 'function'")?;

        let mut name = vec![self.expect_identifier(NodeKind::Identifier, "Expected function name")?];
        while let Some(dot) = self.match_token(TokenKind::Dot) {
            name.push(dot);
            name.push(self.expect_identifier(NodeKind::PropertyIdentifier, "Expected name after '.'")?);
        }
        if let Some(colon) = self.match_token(TokenKind::Colon) {
            name.push(colon);
            name.push(self.expect_identifier(NodeKind::PropertyIdentifier, "Expected method name after ':'")?);
        }
        let name = self.finish_node(NodeKind::FunctionName, name);

        let mut children = vec![function, name];
        children.push(self.parse_parameters()?);
        self.parse_body(&mut children)?;
        children.push(self.expect_token(TokenKind::End, "Expected 'end' to close function")?);
        Ok(self.finish_node(NodeKind::FunctionDeclaration, children))
    }

    fn parse_local_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let local = self.expect_token(TokenKind::Local, "Expected 'local'")?;

        if self.check(TokenKind::Function) {
            let function = self.expect_token(TokenKind::Function, "Expected 'function'")?;
            let name = self.expect_identifier(NodeKind::Identifier, "Expected function name")?;
            let mut children = vec![local, function, name];
            children.push(self.parse_parameters()?);
            self.parse_body(&mut children)?;
            children.push(self.expect_token(TokenKind::End, "Expected 'end' to close function")?);
            return Ok(self.finish_node(NodeKind::LocalFunctionDeclaration, children));
        }

        let mut children = vec![local];
        children.push(self.expect_identifier(NodeKind::Identifier, "Expected variable name")?);
        while let Some(comma) = self.match_token(TokenKind::Comma) {
            children.push(comma);
            children.push(self.expect_identifier(NodeKind::Identifier, "Expected variable name")?);
        }
        if let Some(eq) = self.match_token(TokenKind::Eq) {
            children.push(eq);
            children.push(self.parse_expression()?);
            while let Some(comma) = self.match_token(TokenKind::Comma) {
                children.push(comma);
                children.push(self.parse_expression()?);
            }
        }
        Ok(self.finish_node(NodeKind::LocalVariableDeclaration, children))
    }

    fn parse_expression_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let first = self.parse_prefix()?;

        if self.nodes[first].kind == NodeKind::FunctionCall
            && !self.check(TokenKind::Eq)
            && !self.check(TokenKind::Comma)
        {
            return Ok(first);
        }

        let mut children = vec![first];
        while let Some(comma) = self.match_token(TokenKind::Comma) {
            children.push(comma);
            children.push(self.parse_prefix()?);
        }
        children.push(self.expect_token(TokenKind::Eq, "Expected '=' after variable list")?);
        children.push(self.parse_expression()?);
        while let Some(comma) = self.match_token(TokenKind::Comma) {
            children.push(comma);
            children.push(self.parse_expression()?);
        }
        Ok(self.finish_node(NodeKind::VariableDeclaration, children))
    }

    // expressions

    fn parse_expression(&mut self) -> Result<NodeId, SyntaxError> {
        self.parse_binary(0)
    }

    fn current_binary_op(&self) -> Option<(u8, bool)> {
        // (precedence, right-associative)
        let info = match self.peek().kind {
            TokenKind::Or => (1, false),
            TokenKind::And => (2, false),
            TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq
            | TokenKind::TildeEq
            | TokenKind::EqEq => (3, false),
            TokenKind::Pipe => (4, false),
            TokenKind::Ampersand => (5, false),
            TokenKind::DotDot => (6, true),
            TokenKind::Plus | TokenKind::Minus => (7, false),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (8, false),
            TokenKind::Caret => (10, true),
            _ => return None,
        };
        Some(info)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<NodeId, SyntaxError> {
        let mut left = self.parse_unary()?;

        loop {
            let (prec, right_assoc) = match self.current_binary_op() {
                Some(info) => info,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            let op_token = self.advance();
            let op = self.add_node(NodeKind::Token, op_token.range, Vec::new());
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;
            left = self.finish_node(NodeKind::BinaryOperation, vec![left, op, right]);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<NodeId, SyntaxError> {
        let op = match self.peek().kind {
            TokenKind::Not => Some(TokenKind::Not),
            TokenKind::Minus => Some(TokenKind::Minus),
            TokenKind::Hash => Some(TokenKind::Hash),
            _ => None,
        };
        if let Some(kind) = op {
            let op_node = self.expect_token(kind, "Expected unary operator")?;
            // `^` binds tighter than unary operators, so `-2^2` is `-(2^2)`.
            let operand = self.parse_binary(10)?;
            return Ok(self.finish_node(NodeKind::UnaryOperation, vec![op_node, operand]));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<NodeId, SyntaxError> {
        match self.peek().kind {
            TokenKind::Nil => {
                let token = self.advance();
                Ok(self.add_node(NodeKind::Nil, token.range, Vec::new()))
            }
            TokenKind::True => {
                let token = self.advance();
                Ok(self.add_node(NodeKind::True, token.range, Vec::new()))
            }
            TokenKind::False => {
                let token = self.advance();
                Ok(self.add_node(NodeKind::False, token.range, Vec::new()))
            }
            TokenKind::Number(_) => {
                let token = self.advance();
                Ok(self.add_node(NodeKind::Number, token.range, Vec::new()))
            }
            TokenKind::String(_) => {
                let token = self.advance();
                Ok(self.add_node(NodeKind::StringLiteral, token.range, Vec::new()))
            }
            TokenKind::Ellipsis => {
                let token = self.advance();
                Ok(self.add_node(NodeKind::Spread, token.range, Vec::new()))
            }
            TokenKind::Function => {
                let function = self.expect_token(TokenKind::Function, "Expected 'function'")?;
                let mut children = vec![function];
                children.push(self.parse_parameters()?);
                self.parse_body(&mut children)?;
                children.push(self.expect_token(TokenKind::End, "Expected 'end' to close function")?);
                Ok(self.finish_node(NodeKind::FunctionDefinition, children))
            }
            TokenKind::LBrace => self.parse_table_constructor(),
            TokenKind::Identifier(_) | TokenKind::LParen => self.parse_prefix(),
            _ => Err(self.error_here("Unexpected token in expression")),
        }
    }

    fn parse_parameters(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::LParen, "Expected '(' before parameters")?];
        if !self.check(TokenKind::RParen) {
            loop {
                if self.check(TokenKind::Ellipsis) {
                    let token = self.advance();
                    children.push(self.add_node(NodeKind::Spread, token.range, Vec::new()));
                    break;
                }
                children.push(self.expect_identifier(NodeKind::Identifier, "Expected parameter name")?);
                match self.match_token(TokenKind::Comma) {
                    Some(comma) => children.push(comma),
                    None => break,
                }
            }
        }
        children.push(self.expect_token(TokenKind::RParen, "Expected ')' after parameters")?);
        Ok(self.finish_node(NodeKind::Parameters, children))
    }

    fn parse_table_constructor(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::LBrace, "Expected '{'")?];
        while !self.check(TokenKind::RBrace) {
            let field = self.parse_field()?;
            children.push(field);
            match self.peek().kind {
                TokenKind::Comma | TokenKind::Semi => {
                    let token = self.advance();
                    children.push(self.add_node(NodeKind::Token, token.range, Vec::new()));
                }
                _ => break,
            }
        }
        children.push(self.expect_token(TokenKind::RBrace, "Expected '}' to close table")?);
        Ok(self.finish_node(NodeKind::TableConstructor, children))
    }

    fn parse_field(&mut self) -> Result<NodeId, SyntaxError> {
        if self.check(TokenKind::LBracket) {
            let mut children = vec![self.expect_token(TokenKind::LBracket, "Expected '['")?];
            children.push(self.parse_expression()?);
            children.push(self.expect_token(TokenKind::RBracket, "Expected ']' after key")?);
            children.push(self.expect_token(TokenKind::Eq, "Expected '=' after key")?);
            children.push(self.parse_expression()?);
            return Ok(self.finish_node(NodeKind::Field, children));
        }
        if matches!(self.peek().kind, TokenKind::Identifier(_))
            && self.peek_ahead(1).kind == TokenKind::Eq
        {
            let mut children =
                vec![self.expect_identifier(NodeKind::PropertyIdentifier, "Expected field name")?];
            children.push(self.expect_token(TokenKind::Eq, "Expected '='")?);
            children.push(self.parse_expression()?);
            return Ok(self.finish_node(NodeKind::Field, children));
        }
        let expr = self.parse_expression()?;
        let range = self.node_range(expr);
        Ok(self.add_node(NodeKind::Field, range, vec![expr]))
    }

    /// Prefix chains: identifiers, parenthesised expressions, indexing,
    /// field access, and calls (plain or method).
    fn parse_prefix(&mut self) -> Result<NodeId, SyntaxError> {
        let mut prefix = match self.peek().kind {
            TokenKind::Identifier(_) => {
                self.expect_identifier(NodeKind::Identifier, "Expected identifier")?
            }
            TokenKind::LParen => {
                let mut children = vec![self.expect_token(TokenKind::LParen, "Expected '('")?];
                children.push(self.parse_expression()?);
                children.push(self.expect_token(TokenKind::RParen, "Expected ')'")?);
                self.finish_node(NodeKind::ParenthesizedExpression, children)
            }
            _ => return Err(self.error_here("Expected identifier or '('")),
        };

        loop {
            match self.peek().kind {
                TokenKind::LBracket => {
                    let mut children = vec![prefix];
                    children.push(self.expect_token(TokenKind::LBracket, "Expected '['")?);
                    children.push(self.parse_expression()?);
                    children.push(self.expect_token(TokenKind::RBracket, "Expected ']'")?);
                    prefix = self.finish_node(NodeKind::IndexExpression, children);
                }
                TokenKind::Dot => {
                    let mut children = vec![prefix];
                    children.push(self.expect_token(TokenKind::Dot, "Expected '.'")?);
                    children.push(
                        self.expect_identifier(NodeKind::PropertyIdentifier, "Expected field name after '.'")?,
                    );
                    prefix = self.finish_node(NodeKind::FieldExpression, children);
                }
                TokenKind::Colon => {
                    let mut children = vec![prefix];
                    children.push(self.expect_token(TokenKind::Colon, "Expected ':'")?);
                    children.push(
                        self.expect_identifier(NodeKind::PropertyIdentifier, "Expected method name after ':'")?,
                    );
                    children.push(self.parse_arguments()?);
                    prefix = self.finish_node(NodeKind::FunctionCall, children);
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    prefix = self.finish_node(NodeKind::FunctionCall, vec![prefix, args]);
                }
                _ => break,
            }
        }

        Ok(prefix)
    }

    fn parse_arguments(&mut self) -> Result<NodeId, SyntaxError> {
        let mut children = vec![self.expect_token(TokenKind::LParen, "Expected '(' before arguments")?];
        if !self.check(TokenKind::RParen) {
            loop {
                children.push(self.parse_expression()?);
                match self.match_token(TokenKind::Comma) {
                    Some(comma) => children.push(comma),
                    None => break,
                }
            }
        }
        children.push(self.expect_token(TokenKind::RParen, "Expected ')' after arguments")?);
        Ok(self.finish_node(NodeKind::Arguments, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn tree(source: &str) -> Rc<ParseTree> {
        Rc::new(parse(source).expect("parse"))
    }

    fn root_kinds(source: &str) -> Vec<NodeKind> {
        let tree = tree(source);
        tree.root().named_children().map(|n| n.kind()).collect()
    }

    #[test]
    fn parses_declarations() {
        assert_eq!(
            root_kinds("x = 1 local y = 2"),
            vec![
                NodeKind::VariableDeclaration,
                NodeKind::LocalVariableDeclaration
            ]
        );
    }

    #[test]
    fn parses_control_flow() {
        assert_eq!(
            root_kinds(
                "if a then b = 1 elseif c then b = 2 else b = 3 end \
                 while x do break end \
                 repeat x = 1 until x \
                 for i = 1, 10 do end \
                 for k, v in next, t do end"
            ),
            vec![
                NodeKind::IfStatement,
                NodeKind::WhileStatement,
                NodeKind::RepeatStatement,
                NodeKind::ForStatement,
                NodeKind::ForInStatement,
            ]
        );
    }

    #[test]
    fn binary_precedence_nests_multiplication() {
        let tree = tree("x = 1 + 2 * 3");
        let decl = tree.root().named_child(0).unwrap();
        let bin = decl
            .named_children()
            .find(|n| n.kind() == NodeKind::BinaryOperation)
            .unwrap();
        assert_eq!(bin.named_child(0).unwrap().text(), "1");
        let rhs = bin.named_child(1).unwrap();
        assert_eq!(rhs.kind(), NodeKind::BinaryOperation);
        assert_eq!(rhs.text(), "2 * 3");
    }

    #[test]
    fn concat_is_right_associative() {
        let tree = tree("x = a .. b .. c");
        let decl = tree.root().named_child(0).unwrap();
        let bin = decl
            .named_children()
            .find(|n| n.kind() == NodeKind::BinaryOperation)
            .unwrap();
        assert_eq!(bin.named_child(0).unwrap().text(), "a");
        assert_eq!(bin.named_child(1).unwrap().text(), "b .. c");
    }

    #[test]
    fn unary_minus_keeps_pow_tight() {
        let tree = tree("x = -2 ^ 2");
        let decl = tree.root().named_child(0).unwrap();
        let unary = decl
            .named_children()
            .find(|n| n.kind() == NodeKind::UnaryOperation)
            .unwrap();
        assert_eq!(unary.named_child(0).unwrap().kind(), NodeKind::BinaryOperation);
    }

    #[test]
    fn parses_method_calls() {
        let tree = tree("obj:method(1, 2)");
        let call = tree.root().named_child(0).unwrap();
        assert_eq!(call.kind(), NodeKind::FunctionCall);
        let named: Vec<NodeKind> = call.named_children().map(|n| n.kind()).collect();
        assert_eq!(
            named,
            vec![
                NodeKind::Identifier,
                NodeKind::PropertyIdentifier,
                NodeKind::Arguments
            ]
        );
    }

    #[test]
    fn parses_table_constructors() {
        let tree = tree("t = { 1, a = 2, [3] = 4 }");
        let decl = tree.root().named_child(0).unwrap();
        let table = decl
            .named_children()
            .find(|n| n.kind() == NodeKind::TableConstructor)
            .unwrap();
        assert_eq!(table.named_child_count(), 3);
    }

    #[test]
    fn parses_function_declarations() {
        assert_eq!(
            root_kinds("function f(a, b) return a end local function g(...) end"),
            vec![
                NodeKind::FunctionDeclaration,
                NodeKind::LocalFunctionDeclaration
            ]
        );
    }

    #[test]
    fn multi_assignment_keeps_targets_and_values() {
        let tree = tree("a, b = 1, 2");
        let decl = tree.root().named_child(0).unwrap();
        assert_eq!(decl.kind(), NodeKind::VariableDeclaration);
        assert_eq!(decl.named_child_count(), 4);
    }

    #[test]
    fn reports_missing_end() {
        let errors = parse("if x then y = 1").expect_err("should fail");
        assert!(!errors.errors.is_empty());
    }

    #[test]
    fn reports_bad_expression_statement() {
        let errors = parse("1 + 2").expect_err("should fail");
        assert!(!errors.errors.is_empty());
    }
}
