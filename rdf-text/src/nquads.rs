//! A [N-Quads](https://www.w3.org/TR/n-quads/) parser implemented by
//! [`NQuadsParser`] and a serializer implemented by [`NQuadsSerializer`].
use crate::line_formats::NQuadsRecognizer;
use crate::toolkit::{Lexer, Parser, SyntaxError};
use rdf_model::{Quad, QuadRef};
use std::io::{self, Read, Write};

/// A [N-Quads](https://www.w3.org/TR/n-quads/) parser.
///
/// ```
/// use rdf_model::vocab::rdf;
/// use rdf_model::NamedNodeRef;
/// use rdf_text::NQuadsParser;
///
/// let file = b"<http://example.com/foo> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Person> <http://example.com/graph> .\n";
/// let schema_person = NamedNodeRef::new("http://schema.org/Person")?;
/// let mut count = 0;
/// for quad in NQuadsParser::new().parse_read(file.as_ref())? {
///     let quad = quad?;
///     if quad.predicate == rdf::TYPE && quad.object == schema_person.into() {
///         count += 1;
///     }
/// }
/// assert_eq!(1, count);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Default, Clone)]
#[must_use]
pub struct NQuadsParser {
    lenient: bool,
}

impl NQuadsParser {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assumes the file is valid to make parsing faster and more lenient,
    /// skipping some validations.
    #[inline]
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Reads a whole N-Quads document from `reader` into memory, then
    /// returns an iterator over the quads it contains.
    pub fn parse_read<R: Read>(self, mut reader: R) -> io::Result<NQuadsReader> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(self.parse_slice(data))
    }

    /// Parses an in-memory N-Quads document.
    pub fn parse_slice(self, data: Vec<u8>) -> NQuadsReader {
        NQuadsReader {
            inner: Parser::new(
                Lexer::new(NQuadsRecognizer::lexer(self.lenient), data, Some(b"#")),
                NQuadsRecognizer::new(true, self.lenient),
            ),
        }
    }
}

/// Iterator over the quads of a document parsed by [`NQuadsParser`].
#[must_use]
pub struct NQuadsReader {
    inner: Parser<NQuadsRecognizer>,
}

impl Iterator for NQuadsReader {
    type Item = Result<Quad, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A [N-Quads](https://www.w3.org/TR/n-quads/) serializer.
///
/// ```
/// use rdf_model::vocab::rdf;
/// use rdf_model::{NamedNodeRef, QuadRef};
/// use rdf_text::NQuadsSerializer;
///
/// let mut serializer = NQuadsSerializer::new().for_writer(Vec::new());
/// serializer.serialize_quad(QuadRef::new(
///     NamedNodeRef::new("http://example.com#me")?,
///     rdf::TYPE,
///     NamedNodeRef::new("http://schema.org/Person")?,
///     NamedNodeRef::new("http://example.com#graph")?,
/// ))?;
/// assert_eq!(
///     b"<http://example.com#me> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Person> <http://example.com#graph> .\n",
///     serializer.finish().as_slice()
/// );
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Default, Clone)]
#[must_use]
pub struct NQuadsSerializer;

impl NQuadsSerializer {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    pub fn for_writer<W: Write>(self, writer: W) -> WriterNQuadsSerializer<W> {
        WriterNQuadsSerializer { writer }
    }
}

/// Writes a N-Quads document to a [`Write`] implementation.
///
/// Can be built using [`NQuadsSerializer::for_writer`].
#[must_use]
pub struct WriterNQuadsSerializer<W: Write> {
    writer: W,
}

impl<W: Write> WriterNQuadsSerializer<W> {
    /// Writes an extra quad.
    pub fn serialize_quad<'a>(&mut self, q: impl Into<QuadRef<'a>>) -> io::Result<()> {
        writeln!(self.writer, "{} .", q.into())
    }

    /// Ends the write process and returns the underlying [`Write`].
    pub fn finish(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_model::{GraphName, Literal, NamedNode};

    #[test]
    fn parses_quads_with_and_without_graph_name() {
        let file = b"<http://example.com/s> <http://example.com/p> \"o\" <http://example.com/g> .\n\
            <http://example.com/s> <http://example.com/p> \"o2\" .\n";
        let quads = NQuadsParser::new()
            .parse_read(file.as_ref())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(quads.len(), 2);
        assert_eq!(
            quads[0].graph_name,
            GraphName::NamedNode(NamedNode::new_unchecked("http://example.com/g"))
        );
        assert_eq!(quads[1].graph_name, GraphName::DefaultGraph);
    }

    #[test]
    fn serializes_default_graph_quad_without_graph_name() {
        let mut serializer = NQuadsSerializer::new().for_writer(Vec::new());
        serializer
            .serialize_quad(QuadRef::new(
                NamedNode::new_unchecked("http://example.com/s").as_ref(),
                NamedNode::new_unchecked("http://example.com/p").as_ref(),
                Literal::new_simple_literal("o").as_ref(),
                rdf_model::GraphNameRef::DefaultGraph,
            ))
            .unwrap();
        assert_eq!(
            serializer.finish(),
            b"<http://example.com/s> <http://example.com/p> \"o\" .\n"
        );
    }
}
