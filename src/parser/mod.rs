//! SQL parser: tokenization and AST

pub mod ast;
pub mod grammar;
pub mod tokenizer;

pub use grammar::{parse, parse_all, parse_with_hook, Parser, SelectHook, Stmt};
pub use tokenizer::{tokenize, Token, TokenKind, Tokenizer};
