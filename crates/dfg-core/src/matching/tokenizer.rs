//! Statement tokenizer.

use dfg_config::TokenizerKind;

use super::pattern::Pattern;

/// One lexical unit of a statement.
pub type Token = String;

const QUOTE: char = '\'';
const SEPARATOR: char = ' ';

/// Split `line` at spaces, keeping single-quoted substrings in one token.
///
/// Quote characters toggle quoting and are dropped. Every unquoted space ends
/// the current token, even an empty one, so `"a  b"` yields `["a", "", "b"]`
/// and the empty line yields `[""]`. An unterminated quote simply keeps
/// the rest of the line in the last token.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            QUOTE => quoted = !quoted,
            SEPARATOR if !quoted => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tokens.push(current);
    tokens
}

/// Turns a matching log line into the tokens an expectation stores.
pub trait Tokenizer: Send {
    fn tokenize(&self, line: &str, pattern: &Pattern) -> Vec<Token>;
}

/// Tokenizes the complete line, log prefix included.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineTokenizer;

impl Tokenizer for LineTokenizer {
    fn tokenize(&self, line: &str, _pattern: &Pattern) -> Vec<Token> {
        tokenize(line)
    }
}

/// Tokenizes from the first occurrence of the pattern's include onward.
///
/// Database logs prefix each statement with a timestamp, a connection id and
/// a command name. Those vary on every run and say nothing about persistence
/// behavior, so they are cut off before tokenizing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementTokenizer;

impl Tokenizer for StatementTokenizer {
    fn tokenize(&self, line: &str, pattern: &Pattern) -> Vec<Token> {
        let statement = line
            .find(pattern.include())
            .map_or(line, |start| &line[start..]);
        tokenize(statement)
    }
}

/// Build the tokenizer a channel is configured with.
pub fn tokenizer_for(kind: TokenizerKind) -> Box<dyn Tokenizer> {
    match kind {
        TokenizerKind::Statement => Box::new(StatementTokenizer),
        TokenizerKind::Line => Box::new(LineTokenizer),
    }
}
