pub mod token;
pub use token::is_keyword;

use logos::Logos;
use crate::span::{Span, Spanned};
use crate::diagnostics::CompileError;
use token::Token;

pub fn lex(source: &str) -> Result<Vec<Spanned<Token>>, CompileError> {
    let mut tokens: Vec<Spanned<Token>> = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(Token::Comment) => continue,
            // Collapse runs of blank lines into one separator
            Ok(Token::Newline) if matches!(tokens.last(), Some(t) if t.node == Token::Newline) => {
                continue;
            }
            Ok(tok) => tokens.push(Spanned::new(tok, Span::new(span.start, span.end))),
            Err(()) => {
                let text = &source[span.start..span.end];
                let msg = if text.starts_with('"') {
                    "unterminated string literal".to_string()
                } else if text.chars().all(|c| c.is_ascii_digit() || c == '&' || c.is_ascii_hexdigit()) {
                    format!("numeric literal '{text}' is out of range")
                } else {
                    format!("unexpected character '{text}'")
                };
                return Err(CompileError::syntax(msg, Span::new(span.start, span.end)));
            }
        }
    }

    tracing::debug!(target: "ilc::lex", tokens = tokens.len(), "lexed");
    Ok(tokens)
}
