//! A streaming parser and serializer for the
//! [RDF/XML](https://www.w3.org/TR/rdf-syntax-grammar/) syntax.
//!
//! The parser ([`RdfXmlParser`]) drives a state machine over an XML token
//! stream produced by `quick-xml`, tracking one evaluation context per
//! element frame (base IRI, in-scope subject, language, `rdf:li` counter).
//! The serializer ([`RdfXmlSerializer`]) groups triples sharing a subject
//! under a single `rdf:Description` (or type-shorthand) element.
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_qualifications
)]

mod error;
mod parser;
mod serializer;
mod utils;

pub use crate::error::{RdfXmlParseError, RdfXmlSyntaxError, TextPosition};
pub use crate::parser::{FromReadRdfXmlReader, RdfXmlParser};
pub use crate::serializer::{RdfXmlSerializer, WriterRdfXmlSerializer};
