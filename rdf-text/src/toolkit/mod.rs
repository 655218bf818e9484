//! Generic lexer/parser scaffolding shared by the N-Triples, N-Quads and
//! Turtle parsers: position-tracking error types, a byte-buffer token
//! scanner, and a token-driven state-machine parser.

mod error;
mod lexer;
mod parser;

pub use self::error::{ParseError, SyntaxError, TextPosition};
pub use self::lexer::{Lexer, TokenOrLineJump, TokenRecognizer, TokenRecognizerError};
pub use self::parser::{Parser, RuleRecognizer, RuleRecognizerError};
