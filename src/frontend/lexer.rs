//! Hand-written scanner over the ~25-token grammar of §6.1. Tracks line
//! numbers for diagnostics; skips `%` line comments and unnested `/* */`
//! block comments anywhere whitespace is permitted.

use crate::error::FrontendError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Atom(String),
    Var(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Arrow,
    Nil,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

fn is_graphic(c: char) -> bool {
    matches!(
        c,
        '#' | '$' | '&' | '*' | '+' | '-' | '<' | '=' | '>' | '?' | '@' | '^' | '~' | '\\'
    )
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            line: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_trivia(&mut self) -> Result<(), FrontendError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('%') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'*') {
                        let start_line = self.line;
                        self.bump();
                        self.bump();
                        self.skip_block_comment(start_line)?;
                    } else {
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self, start_line: u32) -> Result<(), FrontendError> {
        loop {
            match self.bump() {
                None => return Err(FrontendError::UnterminatedComment { line: start_line }),
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, FrontendError> {
        self.skip_trivia()?;
        let line = self.line;
        let c = match self.peek() {
            None => return Ok(Token { kind: TokenKind::Eof, line }),
            Some(c) => c,
        };

        match c {
            '(' => {
                self.bump();
                Ok(Token { kind: TokenKind::LParen, line })
            }
            ')' => {
                self.bump();
                Ok(Token { kind: TokenKind::RParen, line })
            }
            ',' => {
                self.bump();
                Ok(Token { kind: TokenKind::Comma, line })
            }
            '.' => {
                self.bump();
                Ok(Token { kind: TokenKind::Dot, line })
            }
            '[' => {
                self.bump();
                if self.peek() == Some(']') {
                    self.bump();
                    Ok(Token { kind: TokenKind::Nil, line })
                } else {
                    Err(FrontendError::Lex { line, ch: '[' })
                }
            }
            ':' => {
                self.bump();
                if self.peek() == Some('-') {
                    self.bump();
                    Ok(Token { kind: TokenKind::Arrow, line })
                } else {
                    Err(FrontendError::Lex { line, ch: ':' })
                }
            }
            c if c.is_ascii_lowercase() => Ok(self.read_name(line, TokenKind::Atom as fn(String) -> TokenKind)),
            c if c.is_ascii_uppercase() || c == '_' => {
                Ok(self.read_name(line, TokenKind::Var as fn(String) -> TokenKind))
            }
            c if is_graphic(c) => Ok(self.read_graphic(line)),
            other => {
                self.bump();
                Err(FrontendError::Lex { line, ch: other })
            }
        }
    }

    fn read_name(&mut self, line: u32, make: fn(String) -> TokenKind) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token { kind: make(s), line }
    }

    fn read_graphic(&mut self, line: u32) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_graphic(c) {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token { kind: TokenKind::Atom(s), line }
    }
}
