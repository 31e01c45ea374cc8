//! The abstract syntax tree produced by the parser (§6.1).

/// A term: a variable, an atom (a 0-arity functor), or a compound (a
/// functor of arity >= 1 applied to argument terms). `[]` parses as the
/// atom `"[]"` — there is no list sugar in this grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(String),
    Atom(String),
    Compound(String, Vec<Term>),
}

impl Term {
    /// The functor name and arity of a non-variable term.
    pub fn functor_arity(&self) -> (&str, u32) {
        match self {
            Term::Atom(name) => (name, 0),
            Term::Compound(name, args) => (name, args.len() as u32),
            Term::Var(_) => panic!("a variable has no functor"),
        }
    }
}

/// `head :- body1, body2, ... .` (a fact is a clause with an empty body).
#[derive(Debug, Clone)]
pub struct Clause {
    pub head: Term,
    pub body: Vec<Term>,
}

/// A full program: one or more clauses.
pub type Program = Vec<Clause>;

/// A query: one or more goals, `,`-separated, terminated by `.`.
pub type Query = Vec<Term>;
