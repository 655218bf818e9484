//! A [N-Triples](https://www.w3.org/TR/n-triples/) parser implemented by
//! [`NTriplesParser`] and a serializer implemented by [`NTriplesSerializer`].
use crate::line_formats::NQuadsRecognizer;
use crate::toolkit::{Lexer, Parser, SyntaxError};
use rdf_model::{Triple, TripleRef};
use std::io::{self, Read, Write};

/// A [N-Triples](https://www.w3.org/TR/n-triples/) parser.
///
/// ```
/// use rdf_model::vocab::rdf;
/// use rdf_model::NamedNodeRef;
/// use rdf_text::NTriplesParser;
///
/// let file = b"<http://example.com/foo> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Person> .\n";
/// let schema_person = NamedNodeRef::new("http://schema.org/Person")?;
/// let mut count = 0;
/// for triple in NTriplesParser::new().parse_read(file.as_ref())? {
///     let triple = triple?;
///     if triple.predicate == rdf::TYPE && triple.object == schema_person.into() {
///         count += 1;
///     }
/// }
/// assert_eq!(1, count);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Default, Clone)]
#[must_use]
pub struct NTriplesParser {
    lenient: bool,
}

impl NTriplesParser {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assumes the file is valid to make parsing faster and more lenient,
    /// skipping some validations (e.g. rejecting a relative IRI or a
    /// `rdf:langString` typed literal with no language tag).
    ///
    /// If the file is actually not valid, the parser might emit broken RDF.
    #[inline]
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Reads a whole N-Triples document from `reader` into memory, then
    /// returns an iterator over the triples it contains.
    pub fn parse_read<R: Read>(self, mut reader: R) -> io::Result<NTriplesReader> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(self.parse_slice(data))
    }

    /// Parses an in-memory N-Triples document.
    pub fn parse_slice(self, data: Vec<u8>) -> NTriplesReader {
        NTriplesReader {
            inner: Parser::new(
                Lexer::new(NQuadsRecognizer::lexer(self.lenient), data, Some(b"#")),
                NQuadsRecognizer::new(false, self.lenient),
            ),
        }
    }
}

/// Iterator over the triples of a document parsed by [`NTriplesParser`].
#[must_use]
pub struct NTriplesReader {
    inner: Parser<NQuadsRecognizer>,
}

impl Iterator for NTriplesReader {
    type Item = Result<Triple, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.inner.next()?.map(Into::into))
    }
}

/// A [canonical](https://www.w3.org/TR/n-triples/#canonical-ntriples)
/// [N-Triples](https://www.w3.org/TR/n-triples/) serializer.
///
/// ```
/// use rdf_model::vocab::rdf;
/// use rdf_model::{NamedNodeRef, TripleRef};
/// use rdf_text::NTriplesSerializer;
///
/// let mut serializer = NTriplesSerializer::new().for_writer(Vec::new());
/// serializer.serialize_triple(TripleRef::new(
///     NamedNodeRef::new("http://example.com#me")?,
///     rdf::TYPE,
///     NamedNodeRef::new("http://schema.org/Person")?,
/// ))?;
/// assert_eq!(
///     b"<http://example.com#me> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Person> .\n",
///     serializer.finish().as_slice()
/// );
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Default, Clone)]
#[must_use]
pub struct NTriplesSerializer;

impl NTriplesSerializer {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    pub fn for_writer<W: Write>(self, writer: W) -> WriterNTriplesSerializer<W> {
        WriterNTriplesSerializer { writer }
    }
}

/// Writes a N-Triples document to a [`Write`] implementation.
///
/// Can be built using [`NTriplesSerializer::for_writer`].
#[must_use]
pub struct WriterNTriplesSerializer<W: Write> {
    writer: W,
}

impl<W: Write> WriterNTriplesSerializer<W> {
    /// Writes an extra triple.
    pub fn serialize_triple<'a>(&mut self, t: impl Into<TripleRef<'a>>) -> io::Result<()> {
        writeln!(self.writer, "{} .", t.into())
    }

    /// Ends the write process and returns the underlying [`Write`].
    pub fn finish(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_model::{Literal, NamedNode};

    #[test]
    fn parses_basic_triples() {
        let file = b"<http://example.com/foo> <http://example.com/bar> \"baz\" .\n\
            # a comment\n\
            \n\
            _:s <http://example.com/p> _:o .\n";
        let triples = NTriplesParser::new()
            .parse_read(file.as_ref())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(triples.len(), 2);
        assert_eq!(
            triples[0],
            Triple::new(
                NamedNode::new_unchecked("http://example.com/foo"),
                NamedNode::new_unchecked("http://example.com/bar"),
                Literal::new_simple_literal("baz"),
            )
        );
    }

    #[test]
    fn lenient_parsing_accepts_overlong_lang_tag() {
        let triples = NTriplesParser::new()
            .lenient()
            .parse_read(r#"<foo> <bar> "baz"@toolonglangtagwithmanysubtags ."#.as_bytes())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            triples,
            [Triple::new(
                NamedNode::new_unchecked("foo"),
                NamedNode::new_unchecked("bar"),
                Literal::new_language_tagged_literal_unchecked(
                    "baz",
                    "toolonglangtagwithmanysubtags"
                ),
            )]
        );
    }

    #[test]
    fn strict_mode_rejects_relative_iri() {
        let result = NTriplesParser::new()
            .parse_read(b"<foo> <bar> <baz> .".as_ref())
            .unwrap()
            .collect::<Result<Vec<_>, _>>();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_turtle_directives_as_subject() {
        for file in [
            &b"@prefix ex: <http://example.com/> ."[..],
            &b"@base <http://example.com/> ."[..],
        ] {
            let err = NTriplesParser::new()
                .parse_read(*file)
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap_err();
            assert_eq!(err.message(), "unexpected @prefix/@base as subject");
        }
    }

    #[test]
    fn serializes_a_triple() {
        let mut serializer = NTriplesSerializer::new().for_writer(Vec::new());
        serializer
            .serialize_triple(TripleRef::new(
                NamedNode::new_unchecked("http://example.com#me").as_ref(),
                rdf_model::vocab::rdf::TYPE,
                NamedNode::new_unchecked("http://schema.org/Person").as_ref(),
            ))
            .unwrap();
        assert_eq!(
            serializer.finish(),
            b"<http://example.com#me> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Person> .\n"
        );
    }
}
