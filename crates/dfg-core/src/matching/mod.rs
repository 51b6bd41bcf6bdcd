//! Lexical matching: tokenizing statements and selecting lines by pattern.
//!
//! Nothing here understands SQL. A statement is a sequence of space separated
//! tokens where single-quoted substrings stay together, and a line is
//! interesting when it contains a configured include and lacks its exclude.

pub mod pattern;
pub mod tokenizer;

pub use pattern::{Pattern, PatternMatcher, PatternSet};
pub use tokenizer::{tokenize, tokenizer_for, LineTokenizer, StatementTokenizer, Token, Tokenizer};
