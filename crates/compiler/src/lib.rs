//! Ember Compiler: the lexical scanner and the single-pass Pratt
//! compiler that turns source text directly into a [`ember_core::Chunk`]
//! of bytecode, with no intermediate AST.
//!
//! # Modules
//!
//! - `scanner`: hand-written lexer, `Scanner` yields [`scanner::Token`]s
//! - `compiler`: precedence-climbing parser that emits bytecode as it goes

pub mod compiler;
pub mod scanner;

pub use compiler::compile;
pub use scanner::{Scanner, Token, TokenKind};
