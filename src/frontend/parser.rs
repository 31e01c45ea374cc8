//! Recursive-descent, LL(1) parser directly implementing the EBNF of §6.1.

use crate::error::FrontendError;
use crate::frontend::ast::{Clause, Query, Term};
use crate::frontend::lexer::{Lexer, Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Result<Self, FrontendError> {
        let mut lexer = Lexer::new(src);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self) -> Result<(), FrontendError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn error(&self, expected: &[&'static str]) -> FrontendError {
        FrontendError::Parse {
            line: self.current.line,
            found: format!("{:?}", self.current.kind),
            expected: expected.to_vec(),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &[&'static str]) -> Result<(), FrontendError> {
        if self.current.kind == kind {
            self.advance()
        } else {
            Err(self.error(expected))
        }
    }

    /// `program = { clause }+ ;`
    pub fn parse_program(&mut self) -> Result<Vec<Clause>, FrontendError> {
        let mut clauses = vec![self.parse_clause()?];
        while self.current.kind != TokenKind::Eof {
            clauses.push(self.parse_clause()?);
        }
        Ok(clauses)
    }

    /// `query = structure , { "," , structure } , "." ;`
    pub fn parse_query(&mut self) -> Result<Query, FrontendError> {
        let mut goals = vec![self.parse_structure()?];
        while self.current.kind == TokenKind::Comma {
            self.advance()?;
            goals.push(self.parse_structure()?);
        }
        self.expect(TokenKind::Dot, &["."])?;
        if self.current.kind != TokenKind::Eof {
            return Err(self.error(&["end of query"]));
        }
        Ok(goals)
    }

    /// `clause = structure , [ ":-" , structure , { "," , structure } ] , "." ;`
    fn parse_clause(&mut self) -> Result<Clause, FrontendError> {
        let head = self.parse_structure()?;
        let mut body = Vec::new();
        if self.current.kind == TokenKind::Arrow {
            self.advance()?;
            body.push(self.parse_structure()?);
            while self.current.kind == TokenKind::Comma {
                self.advance()?;
                body.push(self.parse_structure()?);
            }
        }
        self.expect(TokenKind::Dot, &["."])?;
        Ok(Clause { head, body })
    }

    /// `structure = atom , [ "(" , term , { "," , term } , ")" ] ;`
    fn parse_structure(&mut self) -> Result<Term, FrontendError> {
        let name = match &self.current.kind {
            TokenKind::Atom(name) => name.clone(),
            _ => return Err(self.error(&["atom"])),
        };
        self.advance()?;
        if self.current.kind == TokenKind::LParen {
            self.advance()?;
            let mut args = vec![self.parse_term()?];
            while self.current.kind == TokenKind::Comma {
                self.advance()?;
                args.push(self.parse_term()?);
            }
            self.expect(TokenKind::RParen, &[")"])?;
            Ok(Term::Compound(name, args))
        } else {
            Ok(Term::Atom(name))
        }
    }

    /// `term = "[]" | variable | structure ;`
    fn parse_term(&mut self) -> Result<Term, FrontendError> {
        match &self.current.kind {
            TokenKind::Nil => {
                self.advance()?;
                Ok(Term::Atom("[]".to_string()))
            }
            TokenKind::Var(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(Term::Var(name))
            }
            TokenKind::Atom(_) => self.parse_structure(),
            _ => Err(self.error(&["[]", "variable", "atom"])),
        }
    }
}
