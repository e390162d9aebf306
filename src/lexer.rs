use crate::diagnostics::{Diagnostic, DiagnosticKind, SourcePos};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Fn,
    Return,
    If,
    Else,
    For,
    While,
    Break,
    Continue,
    Import,
    True,
    False,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    Keyword(Keyword),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    DoubleAmpersand,
    DoublePipe,
    Bang,
    Dot,
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Colon,
    Eof,
}

/// Literal payload decoded while scanning.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub value: TokenValue,
    pub pos: SourcePos,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = match self.peeked.take() {
            Some(pair) => Some(pair),
            None => self.chars.next(),
        };
        let (idx, ch) = next?;
        self.current = idx + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some((idx, ch))
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// The character after the peeked one.
    fn peek_second(&mut self) -> Option<char> {
        self.peek()?;
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        match self.peek() {
            Some((_, ch)) if ch == expected => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some((_, ch)) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '/' && self.peek_second() == Some('/') {
                while let Some((_, ch)) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize, pos: SourcePos) -> Token {
        while let Some((_, ch)) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let lexeme = self.source[start..self.current].to_string();
        let (kind, value) = match keyword_for(&lexeme) {
            Some(Keyword::True) => (TokenKind::Keyword(Keyword::True), TokenValue::Bool(true)),
            Some(Keyword::False) => (TokenKind::Keyword(Keyword::False), TokenValue::Bool(false)),
            Some(keyword) => (TokenKind::Keyword(keyword), TokenValue::None),
            None => (TokenKind::Identifier, TokenValue::None),
        };
        Token {
            kind,
            lexeme,
            value,
            pos,
        }
    }

    fn number_literal(&mut self, start: usize, pos: SourcePos) -> Result<Token, Diagnostic> {
        let mut seen_dot = false;
        while let Some((_, ch)) = self.peek() {
            match ch {
                '0'..='9' => {
                    self.bump();
                }
                '.' if !seen_dot => {
                    seen_dot = true;
                    self.bump();
                }
                _ => break,
            }
        }
        if let Some((_, 'e' | 'E')) = self.peek() {
            if matches!(self.peek_second(), Some('0'..='9' | '+' | '-')) {
                return Err(Diagnostic::new(
                    DiagnosticKind::Lexer,
                    format!(
                        "exponent notation is not supported in number literal `{}e...`",
                        &self.source[start..self.current]
                    ),
                )
                .with_pos(pos));
            }
        }
        let lexeme = self.source[start..self.current].to_string();
        let value = if seen_dot {
            lexeme.parse::<f64>().map(TokenValue::Float).map_err(|_| {
                Diagnostic::new(
                    DiagnosticKind::Lexer,
                    format!("invalid float literal `{lexeme}`"),
                )
                .with_pos(pos)
            })?
        } else {
            lexeme.parse::<i64>().map(TokenValue::Int).map_err(|_| {
                Diagnostic::new(
                    DiagnosticKind::Lexer,
                    format!("integer literal `{lexeme}` is out of range"),
                )
                .with_pos(pos)
            })?
        };
        Ok(Token {
            kind: TokenKind::Number,
            lexeme,
            value,
            pos,
        })
    }

    fn string_literal(
        &mut self,
        start: usize,
        quote: char,
        pos: SourcePos,
    ) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                c if c == quote => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: self.source[start..self.current].to_string(),
                        value: TokenValue::Str(value),
                        pos,
                    });
                }
                '\\' => match self.bump() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                _ => value.push(ch),
            }
        }
        Err(Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal").with_pos(pos))
    }

    fn simple_token(&self, start: usize, kind: TokenKind, pos: SourcePos) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.current].to_string(),
            value: TokenValue::None,
            pos,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let pos = self.pos();
            let (start, ch) = match self.bump() {
                Some(pair) => pair,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        value: TokenValue::None,
                        pos,
                    });
                    break;
                }
            };

            let token = match ch {
                c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(start, pos),
                '0'..='9' => self.number_literal(start, pos)?,
                '"' | '\'' => self.string_literal(start, ch, pos)?,
                '(' => self.simple_token(start, TokenKind::LParen, pos),
                ')' => self.simple_token(start, TokenKind::RParen, pos),
                '{' => self.simple_token(start, TokenKind::LBrace, pos),
                '}' => self.simple_token(start, TokenKind::RBrace, pos),
                ',' => self.simple_token(start, TokenKind::Comma, pos),
                '.' => self.simple_token(start, TokenKind::Dot, pos),
                ';' => self.simple_token(start, TokenKind::Semicolon, pos),
                ':' => self.simple_token(start, TokenKind::Colon, pos),
                '+' => self.simple_token(start, TokenKind::Plus, pos),
                '*' => self.simple_token(start, TokenKind::Star, pos),
                '/' => self.simple_token(start, TokenKind::Slash, pos),
                '%' => self.simple_token(start, TokenKind::Percent, pos),
                '-' => {
                    if self.match_next('>') {
                        self.simple_token(start, TokenKind::Arrow, pos)
                    } else {
                        self.simple_token(start, TokenKind::Minus, pos)
                    }
                }
                '=' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::EqualEqual, pos)
                    } else {
                        self.simple_token(start, TokenKind::Assign, pos)
                    }
                }
                '!' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::BangEqual, pos)
                    } else {
                        self.simple_token(start, TokenKind::Bang, pos)
                    }
                }
                '<' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::LessEqual, pos)
                    } else {
                        self.simple_token(start, TokenKind::Less, pos)
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::GreaterEqual, pos)
                    } else {
                        self.simple_token(start, TokenKind::Greater, pos)
                    }
                }
                '&' if self.match_next('&') => {
                    self.simple_token(start, TokenKind::DoubleAmpersand, pos)
                }
                '|' if self.match_next('|') => self.simple_token(start, TokenKind::DoublePipe, pos),
                other => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Lexer,
                        format!("unexpected character {other:?}"),
                    )
                    .with_pos(pos));
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "let" => Kw::Let,
        "fn" => Kw::Fn,
        "return" => Kw::Return,
        "if" => Kw::If,
        "else" => Kw::Else,
        "for" => Kw::For,
        "while" => Kw::While,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "import" => Kw::Import,
        "true" => Kw::True,
        "false" => Kw::False,
        "null" | "none" => Kw::Null,
        _ => return None,
    };
    Some(keyword)
}
