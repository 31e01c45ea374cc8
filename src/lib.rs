//! A compiler and tagged-word abstract machine for a minimal pure-Prolog
//! subset: facts, rules and queries over atoms, variables and compound
//! terms, executed by a ZIP-style bytecode interpreter with backtracking.

pub mod consts;
pub mod error;
pub mod frontend;
pub mod interpreter;
pub mod memory;
pub mod pool;
pub mod program;
pub mod repl;
pub mod word;

pub mod prelude {
    pub use crate::error::FrontendError;
    pub use crate::frontend::compiler::{compile_program, compile_query, QueryVars};
    pub use crate::interpreter::answer::run_query;
    pub use crate::interpreter::Machine;
    pub use crate::program::Program;
}
