use crate::language::{
    span::{Location, Range},
    token::{Token, TokenKind},
};

#[derive(Clone, Debug)]
pub struct LexError {
    pub message: String,
    pub range: Range,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    row: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            row: 0,
            column: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                '-' if self.peek() == Some('-') => self.eat_comment(),
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_ascii_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.lex_number(),
                '"' | '\'' => self.lex_string(),
                _ => self.lex_symbol(),
            }
        }
        let end = self.location();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            range: Range::new(end, end),
        });

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn location(&self) -> Location {
        Location::new(self.row, self.column, self.offset)
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.row += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: Location) {
        self.tokens.push(Token {
            kind,
            range: Range::new(start, self.location()),
        });
    }

    fn error(&mut self, start: Location, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            range: Range::new(start, self.location()),
        });
    }

    fn eat_comment(&mut self) {
        let start = self.location();
        self.bump();
        self.bump();
        if self.current == Some('[') && self.peek() == Some('[') {
            self.bump();
            self.bump();
            loop {
                match self.current {
                    Some(']') if self.peek() == Some(']') => {
                        self.bump();
                        self.bump();
                        return;
                    }
                    Some(_) => {
                        self.bump();
                    }
                    None => {
                        self.error(start, "Unterminated block comment");
                        return;
                    }
                }
            }
        }
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.location();
        while let Some(ch) = self.current {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start.byte..self.offset];
        let kind = TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        self.push_token(kind, start);
    }

    fn lex_number(&mut self) {
        let start = self.location();
        let mut seen_dot = false;
        while let Some(ch) = self.current {
            match ch {
                '0'..='9' => {
                    self.bump();
                }
                '.' if !seen_dot && self.peek() != Some('.') => {
                    seen_dot = true;
                    self.bump();
                }
                'e' | 'E' => {
                    self.bump();
                    if matches!(self.current, Some('+') | Some('-')) {
                        self.bump();
                    }
                    while self.current.is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                    }
                    break;
                }
                _ => break,
            }
        }
        let text = &self.src[start.byte..self.offset];
        match text.parse::<f64>() {
            Ok(value) => self.push_token(TokenKind::Number(value), start),
            Err(_) => self.error(start, format!("Malformed number literal `{text}`")),
        }
    }

    fn lex_string(&mut self) {
        let start = self.location();
        let quote = self.current.unwrap_or('"');
        self.bump();
        let mut value = String::new();
        loop {
            match self.current {
                None | Some('\n') => {
                    self.error(start, "Unterminated string literal");
                    return;
                }
                Some(ch) if ch == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.current {
                        Some('a') => value.push('\u{7}'),
                        Some('b') => value.push('\u{8}'),
                        Some('f') => value.push('\u{c}'),
                        Some('n') => value.push('\n'),
                        Some('r') => value.push('\r'),
                        Some('t') => value.push('\t'),
                        Some('v') => value.push('\u{b}'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('\'') => value.push('\''),
                        Some('\n') => value.push('\n'),
                        Some(d) if d.is_ascii_digit() => {
                            let mut code = 0u32;
                            let mut digits = 0;
                            while digits < 3 {
                                match self.current {
                                    Some(c) if c.is_ascii_digit() => {
                                        code = code * 10 + c.to_digit(10).unwrap_or(0);
                                        digits += 1;
                                        self.bump();
                                    }
                                    _ => break,
                                }
                            }
                            match char::from_u32(code) {
                                Some(c) if code < 256 => value.push(c),
                                _ => self.error(start, "Decimal escape out of range"),
                            }
                            continue;
                        }
                        Some(other) => {
                            self.error(start, format!("Unknown escape sequence `\\{other}`"));
                        }
                        None => {
                            self.error(start, "Unterminated string literal");
                            return;
                        }
                    }
                    self.bump();
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.push_token(TokenKind::String(value), start);
    }

    fn lex_symbol(&mut self) {
        let start = self.location();
        let ch = self.current.unwrap_or('\0');
        self.bump();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '#' => TokenKind::Hash,
            '&' => TokenKind::Ampersand,
            '|' => TokenKind::Pipe,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '=' => {
                if self.current == Some('=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '~' => {
                if self.current == Some('=') {
                    self.bump();
                    TokenKind::TildeEq
                } else {
                    self.error(start, "Unexpected character `~`");
                    return;
                }
            }
            '<' => {
                if self.current == Some('=') {
                    self.bump();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.current == Some('=') {
                    self.bump();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            ':' => {
                if self.current == Some(':') {
                    self.bump();
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            '.' => {
                if self.current == Some('.') {
                    self.bump();
                    if self.current == Some('.') {
                        self.bump();
                        TokenKind::Ellipsis
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            other => {
                self.error(start, format!("Unexpected character `{other}`"));
                return;
            }
        };
        self.push_token(kind, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_declaration() {
        assert_eq!(
            kinds("x = 1 + 2"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_symbols() {
        assert_eq!(
            kinds("if a ~= b then return end"),
            vec![
                TokenKind::If,
                TokenKind::Identifier("a".into()),
                TokenKind::TildeEq,
                TokenKind::Identifier("b".into()),
                TokenKind::Then,
                TokenKind::Return,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_escapes() {
        assert_eq!(
            kinds(r#"s = "a\nb\065""#),
            vec![
                TokenKind::Identifier("s".into()),
                TokenKind::Eq,
                TokenKind::String("a\nbA".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("-- line\nx --[[ block ]] = 1"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::Number(1.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_rows_and_columns() {
        let tokens = lex("x\ny = 2").expect("lex");
        assert_eq!(tokens[1].range.start.row, 1);
        assert_eq!(tokens[1].range.start.column, 0);
        assert_eq!(tokens[1].range.start.byte, 2);
    }

    #[test]
    fn reports_unterminated_string() {
        let errors = lex("s = \"oops").expect_err("should fail");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unterminated"));
    }

    #[test]
    fn lexes_number_shapes() {
        assert_eq!(
            kinds("1 2.5 1e3 .5"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dotdot_is_not_a_decimal_point() {
        assert_eq!(
            kinds("1 .. 2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::DotDot,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }
}
