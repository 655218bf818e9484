//! Parsers and serializers for the RDF textual line/Turtle syntaxes:
//! N-Triples, N-Quads and Turtle.
//!
//! Parsing is split into a shared character-level [`lexer`] and, on top of
//! it, a line-oriented recognizer (shared by N-Triples and N-Quads) and a
//! Turtle state-function pushdown parser. The [`toolkit`] module carries the
//! generic lexer/parser scaffolding both are built from.
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_qualifications
)]

mod lexer;
mod line_formats;
mod nquads;
mod ntriples;
pub mod toolkit;
mod turtle;

pub use crate::nquads::{NQuadsParser, NQuadsReader, NQuadsSerializer, WriterNQuadsSerializer};
pub use crate::ntriples::{
    NTriplesParser, NTriplesReader, NTriplesSerializer, WriterNTriplesSerializer,
};
pub use crate::toolkit::{ParseError, SyntaxError, TextPosition};
pub use crate::turtle::{
    TurtleParser, TurtleReader, TurtleSerializer, WriterTurtleSerializer,
};
