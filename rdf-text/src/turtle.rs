//! A [Turtle](https://www.w3.org/TR/turtle/) parser implemented by
//! [`TurtleParser`], driving [`TurtleRecognizer`] - a state-function pushdown
//! parser over a [`TurtleLexer`](crate::lexer::TurtleLexer) token stream, and
//! a prefix-folding [`TurtleSerializer`].
use crate::lexer::{resolve_prefixed_name, LexerMode, TurtleLexer, TurtleLexerOptions, TurtleToken};
use crate::toolkit::{Lexer, Parser, RuleRecognizer, RuleRecognizerError, SyntaxError, TokenOrLineJump};
use oxiri::{Iri, IriParseError};
use rdf_model::vocab::{rdf, xsd};
use rdf_model::{
    print_quoted_str, BlankNode, Literal, LiteralRef, NamedNode, NamedNodeRef, Subject, Term,
    TermRef, Triple, TripleRef,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Read, Write};

/// A [Turtle](https://www.w3.org/TR/turtle/) parser.
///
/// ```
/// use rdf_model::vocab::rdf;
/// use rdf_model::NamedNodeRef;
/// use rdf_text::TurtleParser;
///
/// let file = r#"@base <http://example.com/> .
/// @prefix schema: <http://schema.org/> .
/// <foo> a schema:Person ;
///     schema:name "Foo" .
/// <bar> a schema:Person ;
///     schema:name "Bar" ."#;
///
/// let schema_person = NamedNodeRef::new("http://schema.org/Person")?;
/// let mut count = 0;
/// for triple in TurtleParser::new().parse_read(file.as_bytes())? {
///     let triple = triple?;
///     if triple.predicate == rdf::TYPE && triple.object == schema_person.into() {
///         count += 1;
///     }
/// }
/// assert_eq!(2, count);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Default, Clone)]
#[must_use]
pub struct TurtleParser {
    lenient: bool,
    base: Option<Iri<String>>,
    prefixes: HashMap<String, Iri<String>>,
}

impl TurtleParser {
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

    #[inline]
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Result<Self, IriParseError> {
        self.base = Some(Iri::parse(base_iri.into())?);
        Ok(self)
    }

    #[inline]
    pub fn with_prefix(
        mut self,
        prefix_name: impl Into<String>,
        prefix_iri: impl Into<String>,
    ) -> Result<Self, IriParseError> {
        self.prefixes
            .insert(prefix_name.into(), Iri::parse(prefix_iri.into())?);
        Ok(self)
    }

    /// Reads a whole Turtle document from `reader` into memory, then returns
    /// an iterator over the triples it contains.
    pub fn parse_read<R: Read>(self, mut reader: R) -> io::Result<TurtleReader> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(self.parse_slice(data))
    }

    /// Parses an in-memory Turtle document.
    pub fn parse_slice(self, data: Vec<u8>) -> TurtleReader {
        TurtleReader {
            inner: Parser::new(
                Lexer::new(TurtleLexer::new(LexerMode::Turtle, self.lenient), data, Some(b"#")),
                TurtleRecognizer::new(self.base, self.prefixes, self.lenient),
            ),
        }
    }
}

/// Iterator over the triples of a document parsed by [`TurtleParser`].
#[must_use]
pub struct TurtleReader {
    inner: Parser<TurtleRecognizer>,
}

impl Iterator for TurtleReader {
    type Item = Result<Triple, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// The Turtle state-function pushdown parser: each popped [`TurtleState`]
/// consumes zero or more tokens and pushes the next states to run, with
/// `cur_subject`/`cur_predicate`/`cur_object` tracking the triple under
/// construction (parallel stacks so nested collections and blank-node
/// property lists can suspend an outer triple while an inner one completes).
pub struct TurtleRecognizer {
    stack: Vec<TurtleState>,
    cur_subject: Vec<Subject>,
    cur_predicate: Vec<NamedNode>,
    cur_object: Vec<Term>,
    prefixes: HashMap<String, Iri<String>>,
    lexer_options: TurtleLexerOptions,
    lenient: bool,
}

#[derive(Debug)]
enum TurtleState {
    TurtleDoc,
    ExpectDot,
    BaseExpectIri,
    PrefixExpectPrefix,
    PrefixExpectIri { name: String },
    Triples,
    TriplesBlankNodePropertyListCurrent,
    SubjectBlankNodePropertyListEnd,
    SubjectBlankNodePropertyListAfter,
    SubjectCollectionBeginning,
    SubjectCollectionPossibleEnd,
    PredicateObjectList,
    PredicateObjectListEnd,
    PredicateObjectListPossibleContinuation,
    ObjectsList,
    ObjectsListEnd,
    Verb,
    Object,
    ObjectBlankNodePropertyListCurrent,
    ObjectBlankNodePropertyListEnd,
    ObjectCollectionBeginning,
    ObjectCollectionPossibleEnd,
    LiteralPossibleSuffix { value: String, emit: bool },
    LiteralExpectDatatype { value: String, emit: bool },
}

impl RuleRecognizer for TurtleRecognizer {
    type TokenRecognizer = TurtleLexer;
    type Output = Triple;

    fn error_recovery_state(mut self) -> Self {
        self.stack.clear();
        self.cur_subject.clear();
        self.cur_predicate.clear();
        self.cur_object.clear();
        self
    }

    fn recognize_next(
        mut self,
        token: TokenOrLineJump<TurtleToken<'_>>,
        results: &mut Vec<Triple>,
        errors: &mut Vec<RuleRecognizerError>,
    ) -> Self {
        let TokenOrLineJump::Token(token) = token else {
            return self;
        };
        let Some(rule) = self.stack.pop() else {
            return self;
        };
        match rule {
            // turtleDoc ::= statement*
            // statement ::= directive | triples '.'
            TurtleState::TurtleDoc => {
                self.stack.push(TurtleState::TurtleDoc);
                match token {
                    TurtleToken::PlainKeyword(k) if k.eq_ignore_ascii_case("base") => {
                        self.stack.push(TurtleState::BaseExpectIri);
                        self
                    }
                    TurtleToken::PlainKeyword(k) if k.eq_ignore_ascii_case("prefix") => {
                        self.stack.push(TurtleState::PrefixExpectPrefix);
                        self
                    }
                    TurtleToken::LangTag("prefix") => {
                        self.stack.push(TurtleState::ExpectDot);
                        self.stack.push(TurtleState::PrefixExpectPrefix);
                        self
                    }
                    TurtleToken::LangTag("base") => {
                        self.stack.push(TurtleState::ExpectDot);
                        self.stack.push(TurtleState::BaseExpectIri);
                        self
                    }
                    _ => {
                        self.stack.push(TurtleState::ExpectDot);
                        self.stack.push(TurtleState::Triples);
                        self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                    }
                }
            }
            TurtleState::ExpectDot => {
                self.cur_subject.pop();
                if token == TurtleToken::Punctuation(".") {
                    self
                } else {
                    errors.push("a dot is expected at the end of statements".into());
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::BaseExpectIri => {
                if let TurtleToken::IriRef(iri) = token {
                    self.lexer_options.base_iri = Iri::parse(iri).ok();
                    self
                } else {
                    self.error(errors, "the BASE keyword should be followed by an IRI")
                }
            }
            TurtleState::PrefixExpectPrefix => match token {
                TurtleToken::PrefixedName { prefix, local, .. } if local.is_empty() => {
                    self.stack.push(TurtleState::PrefixExpectIri {
                        name: prefix.to_owned(),
                    });
                    self
                }
                _ => self.error(
                    errors,
                    "the PREFIX keyword should be followed by a prefix like 'ex:'",
                ),
            },
            TurtleState::PrefixExpectIri { name } => {
                if let TurtleToken::IriRef(iri) = token {
                    if let Ok(iri) = Iri::parse(iri) {
                        self.prefixes.insert(name, iri);
                    }
                    self
                } else {
                    self.error(
                        errors,
                        "the PREFIX declaration should be followed by a prefix and its value as an IRI",
                    )
                }
            }
            // triples ::= subject predicateObjectList | blankNodePropertyList predicateObjectList?
            TurtleState::Triples => match token {
                TurtleToken::Punctuation("[") => {
                    self.cur_subject.push(BlankNode::default().into());
                    self.stack
                        .push(TurtleState::TriplesBlankNodePropertyListCurrent);
                    self
                }
                TurtleToken::IriRef(iri) => {
                    self.cur_subject.push(NamedNode::new_unchecked(iri).into());
                    self.stack.push(TurtleState::PredicateObjectList);
                    self
                }
                TurtleToken::PrefixedName {
                    prefix,
                    local,
                    might_be_invalid_iri,
                } => match resolve_prefixed_name(prefix, &local, might_be_invalid_iri, &self.prefixes) {
                    Ok(t) => {
                        self.cur_subject.push(t.into());
                        self.stack.push(TurtleState::PredicateObjectList);
                        self
                    }
                    Err(e) => self.error(errors, e),
                },
                TurtleToken::BlankNodeLabel(label) => {
                    self.cur_subject
                        .push(BlankNode::new_unchecked(label).into());
                    self.stack.push(TurtleState::PredicateObjectList);
                    self
                }
                TurtleToken::Punctuation("(") => {
                    self.stack.push(TurtleState::PredicateObjectList);
                    self.stack.push(TurtleState::SubjectCollectionBeginning);
                    self
                }
                _ => self.error(errors, "unexpected TOKEN as subject"),
            },
            TurtleState::TriplesBlankNodePropertyListCurrent => {
                if token == TurtleToken::Punctuation("]") {
                    self.stack.push(TurtleState::PredicateObjectList);
                    self
                } else {
                    self.stack
                        .push(TurtleState::SubjectBlankNodePropertyListEnd);
                    self.stack.push(TurtleState::PredicateObjectList);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::SubjectBlankNodePropertyListEnd => {
                if token == TurtleToken::Punctuation("]") {
                    self.stack
                        .push(TurtleState::SubjectBlankNodePropertyListAfter);
                    self
                } else {
                    errors.push("blank node property lists should end with a ']'".into());
                    self.stack
                        .push(TurtleState::SubjectBlankNodePropertyListAfter);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::SubjectBlankNodePropertyListAfter => {
                if token == TurtleToken::Punctuation(".") {
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                } else {
                    self.stack.push(TurtleState::PredicateObjectList);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::SubjectCollectionBeginning => {
                if token == TurtleToken::Punctuation(")") {
                    self.cur_subject.push(NamedNode::from(rdf::NIL).into());
                    self
                } else {
                    let root = BlankNode::default();
                    self.cur_subject.push(root.clone().into());
                    self.cur_subject.push(root.into());
                    self.cur_predicate.push(rdf::FIRST.into());
                    self.stack.push(TurtleState::SubjectCollectionPossibleEnd);
                    self.stack.push(TurtleState::Object);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::SubjectCollectionPossibleEnd => {
                let old = self.cur_subject.pop().unwrap();
                self.cur_object.pop();
                if token == TurtleToken::Punctuation(")") {
                    self.cur_predicate.pop();
                    results.push(Triple::new(old, rdf::REST, NamedNode::from(rdf::NIL)));
                    self
                } else {
                    let new = BlankNode::default();
                    results.push(Triple::new(old, rdf::REST, new.clone()));
                    self.cur_subject.push(new.into());
                    self.stack.push(TurtleState::ObjectCollectionPossibleEnd);
                    self.stack.push(TurtleState::Object);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            // predicateObjectList ::= verb objectList (';' (verb objectList)?)*
            TurtleState::PredicateObjectList => {
                self.stack.push(TurtleState::PredicateObjectListEnd);
                self.stack.push(TurtleState::ObjectsList);
                self.stack.push(TurtleState::Verb);
                self.recognize_next(TokenOrLineJump::Token(token), results, errors)
            }
            TurtleState::PredicateObjectListEnd => {
                self.cur_predicate.pop();
                if token == TurtleToken::Punctuation(";") {
                    self.stack
                        .push(TurtleState::PredicateObjectListPossibleContinuation);
                    self
                } else {
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::PredicateObjectListPossibleContinuation => {
                if token == TurtleToken::Punctuation(";") {
                    self.stack
                        .push(TurtleState::PredicateObjectListPossibleContinuation);
                    self
                } else if matches!(token, TurtleToken::Punctuation("." | "]")) {
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                } else {
                    self.stack.push(TurtleState::PredicateObjectListEnd);
                    self.stack.push(TurtleState::ObjectsList);
                    self.stack.push(TurtleState::Verb);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            // objectList ::= object (',' object)*
            TurtleState::ObjectsList => {
                self.stack.push(TurtleState::ObjectsListEnd);
                self.stack.push(TurtleState::Object);
                self.recognize_next(TokenOrLineJump::Token(token), results, errors)
            }
            TurtleState::ObjectsListEnd => {
                if token == TurtleToken::Punctuation(",") {
                    self.cur_object.pop();
                    self.stack.push(TurtleState::ObjectsListEnd);
                    self.stack.push(TurtleState::Object);
                    self
                } else {
                    self.cur_object.pop();
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            // verb ::= predicate | 'a'
            TurtleState::Verb => match token {
                TurtleToken::PlainKeyword("a") => {
                    self.cur_predicate.push(rdf::TYPE.into());
                    self
                }
                TurtleToken::IriRef(iri) => {
                    self.cur_predicate.push(NamedNode::new_unchecked(iri));
                    self
                }
                TurtleToken::PrefixedName {
                    prefix,
                    local,
                    might_be_invalid_iri,
                } => match resolve_prefixed_name(prefix, &local, might_be_invalid_iri, &self.prefixes) {
                    Ok(t) => {
                        self.cur_predicate.push(t);
                        self
                    }
                    Err(e) => self.error(errors, e),
                },
                _ => self.error(errors, "unexpected TOKEN as predicate"),
            },
            // object ::= iri | BlankNode | collection | blankNodePropertyList | literal
            TurtleState::Object => match token {
                TurtleToken::IriRef(iri) => {
                    self.cur_object.push(NamedNode::new_unchecked(iri).into());
                    self.emit_triple(results);
                    self
                }
                TurtleToken::PrefixedName {
                    prefix,
                    local,
                    might_be_invalid_iri,
                } => match resolve_prefixed_name(prefix, &local, might_be_invalid_iri, &self.prefixes) {
                    Ok(t) => {
                        self.cur_object.push(t.into());
                        self.emit_triple(results);
                        self
                    }
                    Err(e) => self.error(errors, e),
                },
                TurtleToken::BlankNodeLabel(label) => {
                    self.cur_object
                        .push(BlankNode::new_unchecked(label).into());
                    self.emit_triple(results);
                    self
                }
                TurtleToken::Punctuation("[") => {
                    self.stack
                        .push(TurtleState::ObjectBlankNodePropertyListCurrent);
                    self
                }
                TurtleToken::Punctuation("(") => {
                    self.stack.push(TurtleState::ObjectCollectionBeginning);
                    self
                }
                TurtleToken::String(value) | TurtleToken::LongString(value) => {
                    self.stack
                        .push(TurtleState::LiteralPossibleSuffix { value, emit: true });
                    self
                }
                TurtleToken::Integer(v) => {
                    self.cur_object
                        .push(Literal::new_typed_literal(v, xsd::INTEGER).into());
                    self.emit_triple(results);
                    self
                }
                TurtleToken::Decimal(v) => {
                    self.cur_object
                        .push(Literal::new_typed_literal(v, xsd::DECIMAL).into());
                    self.emit_triple(results);
                    self
                }
                TurtleToken::Double(v) => {
                    self.cur_object
                        .push(Literal::new_typed_literal(v, xsd::DOUBLE).into());
                    self.emit_triple(results);
                    self
                }
                TurtleToken::PlainKeyword("true") => {
                    self.cur_object
                        .push(Literal::new_typed_literal("true", xsd::BOOLEAN).into());
                    self.emit_triple(results);
                    self
                }
                TurtleToken::PlainKeyword("false") => {
                    self.cur_object
                        .push(Literal::new_typed_literal("false", xsd::BOOLEAN).into());
                    self.emit_triple(results);
                    self
                }
                _ => self.error(errors, "unexpected TOKEN as object"),
            },
            TurtleState::ObjectBlankNodePropertyListCurrent => {
                if token == TurtleToken::Punctuation("]") {
                    self.cur_object.push(BlankNode::default().into());
                    self.emit_triple(results);
                    self
                } else {
                    self.cur_subject.push(BlankNode::default().into());
                    self.stack
                        .push(TurtleState::ObjectBlankNodePropertyListEnd);
                    self.stack.push(TurtleState::PredicateObjectList);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::ObjectBlankNodePropertyListEnd => {
                if token == TurtleToken::Punctuation("]") {
                    self.cur_object.push(self.cur_subject.pop().unwrap().into());
                    self.emit_triple(results);
                    self
                } else {
                    self.error(errors, "blank node property lists should end with a ']'")
                }
            }
            TurtleState::ObjectCollectionBeginning => {
                if token == TurtleToken::Punctuation(")") {
                    self.cur_object.push(NamedNode::from(rdf::NIL).into());
                    self.emit_triple(results);
                    self
                } else {
                    // The triple pointing at the collection's root cell is
                    // emitted once the whole collection has been read (see
                    // `ObjectCollectionPossibleEnd`'s ')' branch), so the
                    // chain triples precede it in document order.
                    let root = BlankNode::default();
                    self.cur_object.push(root.clone().into());
                    self.cur_subject.push(root.into());
                    self.cur_predicate.push(rdf::FIRST.into());
                    self.stack.push(TurtleState::ObjectCollectionPossibleEnd);
                    self.stack.push(TurtleState::Object);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::ObjectCollectionPossibleEnd => {
                let old = self.cur_subject.pop().unwrap();
                self.cur_object.pop();
                if token == TurtleToken::Punctuation(")") {
                    self.cur_predicate.pop();
                    results.push(Triple::new(old, rdf::REST, NamedNode::from(rdf::NIL)));
                    self.emit_triple(results);
                    self
                } else {
                    let new = BlankNode::default();
                    results.push(Triple::new(old, rdf::REST, new.clone()));
                    self.cur_subject.push(new.into());
                    self.stack.push(TurtleState::ObjectCollectionPossibleEnd);
                    self.stack.push(TurtleState::Object);
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            }
            TurtleState::LiteralPossibleSuffix { value, emit } => match token {
                TurtleToken::LangTag(language) => {
                    self.cur_object.push(
                        Literal::new_language_tagged_literal_unchecked(
                            value,
                            language.to_ascii_lowercase(),
                        )
                        .into(),
                    );
                    if emit {
                        self.emit_triple(results);
                    }
                    self
                }
                TurtleToken::Punctuation("^^") => {
                    self.stack
                        .push(TurtleState::LiteralExpectDatatype { value, emit });
                    self
                }
                _ => {
                    self.cur_object
                        .push(Literal::new_simple_literal(value).into());
                    if emit {
                        self.emit_triple(results);
                    }
                    self.recognize_next(TokenOrLineJump::Token(token), results, errors)
                }
            },
            TurtleState::LiteralExpectDatatype { value, emit } => match token {
                TurtleToken::IriRef(datatype) => {
                    if !self.lenient && datatype == rdf::LANG_STRING.as_str() {
                        errors.push(
                            "the datatype of a literal without a language tag must not be rdf:langString"
                                .into(),
                        );
                    }
                    self.cur_object.push(
                        Literal::new_typed_literal(value, NamedNode::new_unchecked(datatype)).into(),
                    );
                    if emit {
                        self.emit_triple(results);
                    }
                    self
                }
                TurtleToken::PrefixedName {
                    prefix,
                    local,
                    might_be_invalid_iri,
                } => match resolve_prefixed_name(prefix, &local, might_be_invalid_iri, &self.prefixes) {
                    Ok(t) => {
                        if !self.lenient && t == rdf::LANG_STRING {
                            errors.push(
                                "the datatype of a literal without a language tag must not be rdf:langString"
                                    .into(),
                            );
                        }
                        self.cur_object.push(Literal::new_typed_literal(value, t).into());
                        if emit {
                            self.emit_triple(results);
                        }
                        self
                    }
                    Err(e) => self.error(errors, e),
                },
                _ => self.error(errors, "expecting a datatype IRI after ^^, found TOKEN"),
            },
        }
    }

    fn recognize_end(mut self, results: &mut Vec<Triple>, errors: &mut Vec<RuleRecognizerError>) {
        match &*self.stack {
            [] | [TurtleState::TurtleDoc] => {
                debug_assert!(self.cur_subject.is_empty());
                debug_assert!(self.cur_predicate.is_empty());
                debug_assert!(self.cur_object.is_empty());
            }
            [.., TurtleState::LiteralPossibleSuffix { value, emit: true }] => {
                self.cur_object
                    .push(Literal::new_simple_literal(value).into());
                self.emit_triple(results);
                errors.push("triples should be followed by a dot".into());
            }
            _ => errors.push("unexpected end of file".into()),
        }
    }

    fn lexer_options(&self) -> &TurtleLexerOptions {
        &self.lexer_options
    }
}

impl TurtleRecognizer {
    fn new(base: Option<Iri<String>>, prefixes: HashMap<String, Iri<String>>, lenient: bool) -> Self {
        Self {
            stack: vec![TurtleState::TurtleDoc],
            cur_subject: Vec::new(),
            cur_predicate: Vec::new(),
            cur_object: Vec::new(),
            prefixes,
            lexer_options: TurtleLexerOptions { base_iri: base },
            lenient,
        }
    }

    #[must_use]
    fn error(mut self, errors: &mut Vec<RuleRecognizerError>, msg: impl Into<RuleRecognizerError>) -> Self {
        errors.push(msg.into());
        self.stack.clear();
        self.cur_subject.clear();
        self.cur_predicate.clear();
        self.cur_object.clear();
        self
    }

    fn emit_triple(&mut self, results: &mut Vec<Triple>) {
        results.push(Triple::new(
            self.cur_subject.last().unwrap().clone(),
            self.cur_predicate.last().unwrap().clone(),
            self.cur_object.last().unwrap().clone(),
        ));
    }
}

/// A [Turtle](https://www.w3.org/TR/turtle/) serializer performing prefix
/// extraction, subject/predicate folding, and canonical literal rendering.
///
/// ```
/// use rdf_model::vocab::rdf;
/// use rdf_model::{NamedNodeRef, TripleRef};
/// use rdf_text::TurtleSerializer;
///
/// let mut serializer = TurtleSerializer::new()
///     .with_prefix("schema", "http://schema.org/")?
///     .for_writer(Vec::new());
/// serializer.serialize_triple(TripleRef::new(
///     NamedNodeRef::new("http://example.com#me")?,
///     rdf::TYPE,
///     NamedNodeRef::new("http://schema.org/Person")?,
/// ))?;
/// assert_eq!(
///     b"@prefix schema: <http://schema.org/> .\n<http://example.com#me> a schema:Person .\n",
///     serializer.finish()?.as_slice()
/// );
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Default, Clone)]
#[must_use]
pub struct TurtleSerializer {
    prefixes: BTreeMap<String, String>,
    auto_prefixes: bool,
}

impl TurtleSerializer {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `prefix_name` to `prefix_iri`, so any output IRI whose namespace
    /// is `prefix_iri` is abbreviated `prefix_name:local` instead of written
    /// out in full. The binding is only declared in the output (`@prefix ...
    /// .`) the first time it is actually used.
    #[inline]
    pub fn with_prefix(
        mut self,
        prefix_name: impl Into<String>,
        prefix_iri: impl Into<String>,
    ) -> Result<Self, IriParseError> {
        let prefix_iri = Iri::parse(prefix_iri.into())?;
        self.prefixes
            .insert(prefix_iri.into_inner(), prefix_name.into());
        Ok(self)
    }

    /// Assigns a fresh `ns0`, `ns1`, ... prefix to any IRI namespace with no
    /// caller-supplied binding, instead of always falling back to the full
    /// `<iri>` form. Off by default.
    #[inline]
    pub fn with_auto_prefixes(mut self) -> Self {
        self.auto_prefixes = true;
        self
    }

    pub fn for_writer<W: Write>(self, writer: W) -> WriterTurtleSerializer<W> {
        WriterTurtleSerializer {
            writer,
            prefixes: self.prefixes,
            declared: HashSet::new(),
            auto_prefixes: self.auto_prefixes,
            next_auto_id: 0,
            current_subject_predicate: None,
        }
    }

    /// Serializes `triples` as a self-contained Turtle document: statements
    /// are sorted by `(subject, predicate, object)` using each triple's
    /// N-Triples rendering as the comparison key (so exact duplicates sort
    /// adjacent) before being folded, and duplicates are suppressed.
    pub fn serialize_to_vec<'a>(
        self,
        triples: impl IntoIterator<Item = impl Into<TripleRef<'a>>>,
    ) -> io::Result<Vec<u8>> {
        let mut sorted = triples
            .into_iter()
            .map(|t| t.into().into_owned())
            .collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        sorted.dedup();
        let mut writer = self.for_writer(Vec::new());
        for triple in &sorted {
            writer.serialize_triple(triple)?;
        }
        writer.finish()
    }
}

/// Writes a Turtle document to a [`Write`] implementation.
///
/// Can be built using [`TurtleSerializer::for_writer`].
#[must_use]
pub struct WriterTurtleSerializer<W: Write> {
    writer: W,
    prefixes: BTreeMap<String, String>,
    declared: HashSet<String>,
    auto_prefixes: bool,
    next_auto_id: usize,
    current_subject_predicate: Option<(Subject, NamedNode)>,
}

impl<W: Write> WriterTurtleSerializer<W> {
    /// Writes an extra triple.
    pub fn serialize_triple<'a>(&mut self, t: impl Into<TripleRef<'a>>) -> io::Result<()> {
        let t = t.into();
        // Any namespace this triple introduces for the first time must be
        // declared before the triple itself, closing whatever statement is
        // currently open - so prefix discovery runs before any folding
        // decision is made.
        if self.declare_new_prefixes(t)? {
            self.current_subject_predicate = None;
        }
        match self.current_subject_predicate.take() {
            Some((subject, predicate)) if subject.as_ref() == t.subject && predicate.as_ref() == t.predicate =>
            {
                write!(self.writer, " ,\n\t")?;
                self.write_term(t.object.into())?;
                self.current_subject_predicate = Some((subject, predicate));
            }
            Some((subject, _)) if subject.as_ref() == t.subject => {
                write!(self.writer, " ;\n\t")?;
                self.write_predicate(t.predicate)?;
                write!(self.writer, " ")?;
                self.write_term(t.object.into())?;
                self.current_subject_predicate = Some((subject, t.predicate.into_owned()));
            }
            Some(_) => {
                writeln!(self.writer, " .")?;
                self.write_new_statement(t)?;
            }
            None => self.write_new_statement(t)?,
        }
        Ok(())
    }

    fn write_new_statement(&mut self, t: TripleRef<'_>) -> io::Result<()> {
        self.write_term(t.subject.into())?;
        write!(self.writer, " ")?;
        self.write_predicate(t.predicate)?;
        write!(self.writer, " ")?;
        self.write_term(t.object.into())?;
        self.current_subject_predicate = Some((t.subject.into_owned(), t.predicate.into_owned()));
        Ok(())
    }

    /// Ends the write process, closing any remaining open statement, and
    /// returns the underlying [`Write`].
    pub fn finish(mut self) -> io::Result<W> {
        if self.current_subject_predicate.is_some() {
            writeln!(self.writer, " .")?;
        }
        Ok(self.writer)
    }

    fn write_predicate(&mut self, predicate: NamedNodeRef<'_>) -> io::Result<()> {
        if predicate == rdf::TYPE {
            write!(self.writer, "a")
        } else {
            self.write_named_node(predicate)
        }
    }

    fn write_term(&mut self, term: TermRef<'_>) -> io::Result<()> {
        match term {
            TermRef::NamedNode(n) => self.write_named_node(n),
            TermRef::BlankNode(n) => write!(self.writer, "{n}"),
            TermRef::Literal(v) => {
                let value = v.value();
                if literal_has_inline_form(v) {
                    write!(self.writer, "{value}")
                } else if v.is_plain() {
                    write!(self.writer, "{v}")
                } else {
                    let datatype = v.datatype();
                    write!(self.writer, "\"")?;
                    let mut escaped = String::new();
                    print_quoted_str(value, &mut escaped)
                        .map_err(|_| io::Error::new(io::ErrorKind::Other, "invalid literal"))?;
                    write!(self.writer, "{escaped}\"^^")?;
                    self.write_named_node(datatype)
                }
            }
        }
    }

    fn write_named_node(&mut self, n: NamedNodeRef<'_>) -> io::Result<()> {
        if let Some((namespace, local)) = n.split() {
            if let Some(prefix_name) = self.prefixes.get(namespace) {
                if let Some(escaped_local) = escape_local_name(local) {
                    let prefix_name = prefix_name.clone();
                    return write!(self.writer, "{prefix_name}:{escaped_local}");
                }
            }
        }
        write!(self.writer, "{n}")
    }

    /// Returns whether a fresh `@prefix` was written, in which case the
    /// caller must treat the upcoming triple as starting a new statement.
    fn declare_new_prefixes(&mut self, t: TripleRef<'_>) -> io::Result<bool> {
        let mut namespaces = Vec::new();
        self.collect_namespace(t.subject.into(), &mut namespaces);
        self.collect_namespace(t.predicate.into(), &mut namespaces);
        self.collect_namespace(t.object, &mut namespaces);
        let mut wrote_any = false;
        for namespace in namespaces {
            if self.declared.contains(&namespace) {
                continue;
            }
            let prefix_name = match self.prefixes.get(&namespace) {
                Some(name) => name.clone(),
                None if self.auto_prefixes => {
                    let name = format!("ns{}", self.next_auto_id);
                    self.next_auto_id += 1;
                    self.prefixes.insert(namespace.clone(), name.clone());
                    name
                }
                None => continue,
            };
            if !wrote_any && self.current_subject_predicate.is_some() {
                writeln!(self.writer, " .")?;
            }
            writeln!(self.writer, "@prefix {prefix_name}: <{namespace}> .")?;
            self.declared.insert(namespace);
            wrote_any = true;
        }
        Ok(wrote_any)
    }

    fn collect_namespace(&self, term: TermRef<'_>, namespaces: &mut Vec<String>) {
        let named_node = match term {
            TermRef::NamedNode(n) => Some(n),
            TermRef::Literal(v) if !v.is_plain() && !literal_has_inline_form(v) => {
                Some(v.datatype())
            }
            _ => None,
        };
        let Some(named_node) = named_node else {
            return;
        };
        let Some((namespace, _)) = named_node.split() else {
            return;
        };
        if !namespaces.iter().any(|n| n == namespace) {
            namespaces.push(namespace.to_owned());
        }
    }
}

/// Whether `v`'s lexical form can be written bare (no quotes, no datatype
/// suffix) because it is itself a valid Turtle numeric/boolean shortcut.
fn literal_has_inline_form(v: LiteralRef<'_>) -> bool {
    let value = v.value();
    match v.datatype() {
        xsd::BOOLEAN => is_turtle_boolean(value),
        xsd::INTEGER => is_turtle_integer(value),
        xsd::DECIMAL => is_turtle_decimal(value),
        xsd::DOUBLE => is_turtle_double(value),
        _ => false,
    }
}

fn is_turtle_boolean(value: &str) -> bool {
    matches!(value, "true" | "false")
}

fn is_turtle_integer(value: &str) -> bool {
    // [19]  INTEGER  ::=  [+-]? [0-9]+
    let mut value = value.as_bytes();
    if let Some(v) = value.strip_prefix(b"+") {
        value = v;
    } else if let Some(v) = value.strip_prefix(b"-") {
        value = v;
    }
    !value.is_empty() && value.iter().all(u8::is_ascii_digit)
}

fn is_turtle_decimal(value: &str) -> bool {
    // [20]  DECIMAL  ::=  [+-]? [0-9]* '.' [0-9]+
    let mut value = value.as_bytes();
    if let Some(v) = value.strip_prefix(b"+") {
        value = v;
    } else if let Some(v) = value.strip_prefix(b"-") {
        value = v;
    }
    while value.first().map_or(false, u8::is_ascii_digit) {
        value = &value[1..];
    }
    let Some(value) = value.strip_prefix(b".") else {
        return false;
    };
    !value.is_empty() && value.iter().all(u8::is_ascii_digit)
}

fn is_turtle_double(value: &str) -> bool {
    // [21]    DOUBLE    ::=  [+-]? ([0-9]+ '.' [0-9]* EXPONENT | '.' [0-9]+ EXPONENT | [0-9]+ EXPONENT)
    // [154s]  EXPONENT  ::=  [eE] [+-]? [0-9]+
    let mut value = value.as_bytes();
    if let Some(v) = value.strip_prefix(b"+") {
        value = v;
    } else if let Some(v) = value.strip_prefix(b"-") {
        value = v;
    }
    let mut with_before = false;
    while value.first().map_or(false, u8::is_ascii_digit) {
        value = &value[1..];
        with_before = true;
    }
    let mut with_after = false;
    if let Some(v) = value.strip_prefix(b".") {
        value = v;
        while value.first().map_or(false, u8::is_ascii_digit) {
            value = &value[1..];
            with_after = true;
        }
    }
    if let Some(v) = value.strip_prefix(b"e") {
        value = v;
    } else if let Some(v) = value.strip_prefix(b"E") {
        value = v;
    } else {
        return false;
    }
    if let Some(v) = value.strip_prefix(b"+") {
        value = v;
    } else if let Some(v) = value.strip_prefix(b"-") {
        value = v;
    }
    (with_before || with_after) && !value.is_empty() && value.iter().all(u8::is_ascii_digit)
}

/// Escapes `value` for use as a Turtle `PN_LOCAL`, returning `None` when a
/// character cannot be represented even escaped (the caller then falls back
/// to the full `<iri>` form).
fn escape_local_name(value: &str) -> Option<String> {
    // [168s] PN_LOCAL ::= (PN_CHARS_U | ':' | [0-9] | PLX) ((PN_CHARS | '.' | ':' | PLX)* (PN_CHARS | ':' | PLX))?
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    let first = chars.next()?;
    if TurtleLexer::is_possible_pn_chars_u(first) || first == ':' || first.is_ascii_digit() {
        output.push(first);
    } else if can_be_escaped_in_local_name(first) {
        output.push('\\');
        output.push(first);
    } else {
        return None;
    }

    while let Some(c) = chars.next() {
        if TurtleLexer::is_possible_pn_chars(c) || c == ':' || (c == '.' && !chars.as_str().is_empty()) {
            output.push(c);
        } else if can_be_escaped_in_local_name(c) {
            output.push('\\');
            output.push(c);
        } else {
            return None;
        }
    }

    Some(output)
}

fn can_be_escaped_in_local_name(c: char) -> bool {
    matches!(
        c,
        '_' | '~'
            | '.'
            | '-'
            | '!'
            | '$'
            | '&'
            | '\''
            | '('
            | ')'
            | '*'
            | '+'
            | ','
            | ';'
            | '='
            | '/'
            | '?'
            | '#'
            | '@'
            | '%'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_model::NamedNode;

    fn parse(file: &str) -> Vec<Triple> {
        TurtleParser::new()
            .parse_read(file.as_bytes())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn parses_prefixes_and_object_lists() {
        let file = r#"@prefix schema: <http://schema.org/> .
<http://example.com/foo> a schema:Person ;
    schema:name "Foo", "Bar" ."#;
        let triples = parse(file);
        assert_eq!(triples.len(), 3);
        assert_eq!(
            triples[0],
            Triple::new(
                NamedNode::new_unchecked("http://example.com/foo"),
                rdf::TYPE,
                NamedNode::new_unchecked("http://schema.org/Person"),
            )
        );
    }

    #[test]
    fn resolves_relative_iris_against_base() {
        let file = "@base <http://example.com/> .\n<foo> <bar> <baz> .";
        let triples = parse(file);
        assert_eq!(
            triples,
            [Triple::new(
                NamedNode::new_unchecked("http://example.com/foo"),
                NamedNode::new_unchecked("http://example.com/bar"),
                NamedNode::new_unchecked("http://example.com/baz"),
            )]
        );
    }

    #[test]
    fn parses_collection_as_rdf_list_in_document_order() {
        let triples = parse("<http://example.com/s> <http://example.com/p> ( \"a\" \"b\" ) .");
        // two list cells (rdf:first/rdf:rest pairs) followed by the root triple last
        assert_eq!(triples.len(), 5);
        let s = NamedNode::new_unchecked("http://example.com/s");
        let p = NamedNode::new_unchecked("http://example.com/p");
        let Subject::BlankNode(cell1) = triples[0].subject.clone() else {
            panic!("expected the first list cell to be a blank node, got {:?}", triples[0]);
        };
        assert_eq!(triples[0].predicate, rdf::FIRST);
        assert_eq!(triples[0].object, Literal::new_simple_literal("a").into());
        let Term::BlankNode(cell2) = triples[1].object.clone() else {
            panic!("expected rdf:rest to point at the second cell, got {:?}", triples[1]);
        };
        assert_eq!(triples[1], Triple::new(cell1.clone(), rdf::REST, cell2.clone()));
        assert_eq!(
            triples[2],
            Triple::new(cell2.clone(), rdf::FIRST, Literal::new_simple_literal("b"))
        );
        assert_eq!(
            triples[3],
            Triple::new(cell2, rdf::REST, NamedNode::from(rdf::NIL))
        );
        assert_eq!(triples[4], Triple::new(s, p, cell1));
    }

    #[test]
    fn parses_anonymous_blank_node_property_list() {
        let triples = parse("<http://example.com/s> <http://example.com/p> [ <http://example.com/q> \"v\" ] .");
        assert_eq!(triples.len(), 2);
    }

    #[test]
    fn missing_prefix_is_an_error() {
        let result = TurtleParser::new()
            .parse_read("ex:s ex:p ex:o .".as_bytes())
            .unwrap()
            .collect::<Result<Vec<_>, _>>();
        assert!(result.is_err());
    }

    #[test]
    fn serializer_folds_object_and_predicate_lists() {
        let mut serializer = TurtleSerializer::new()
            .with_prefix("schema", "http://schema.org/")
            .unwrap()
            .for_writer(Vec::new());
        let s = NamedNode::new_unchecked("http://example.com/foo");
        serializer
            .serialize_triple(TripleRef::new(
                s.as_ref(),
                rdf::TYPE,
                NamedNode::new_unchecked("http://schema.org/Person").as_ref(),
            ))
            .unwrap();
        serializer
            .serialize_triple(TripleRef::new(
                s.as_ref(),
                NamedNode::new_unchecked("http://schema.org/name").as_ref(),
                Literal::new_simple_literal("Foo").as_ref(),
            ))
            .unwrap();
        serializer
            .serialize_triple(TripleRef::new(
                s.as_ref(),
                NamedNode::new_unchecked("http://schema.org/name").as_ref(),
                Literal::new_simple_literal("Bar").as_ref(),
            ))
            .unwrap();
        let output = String::from_utf8(serializer.finish().unwrap()).unwrap();
        assert_eq!(
            output,
            "@prefix schema: <http://schema.org/> .\n\
             <http://example.com/foo> a schema:Person ;\n\
             \tschema:name \"Foo\" ,\n\
             \t\"Bar\" .\n"
        );
    }

    #[test]
    fn serializer_writes_numeric_shortcuts_bare_and_non_canonical_typed() {
        let mut serializer = TurtleSerializer::new().for_writer(Vec::new());
        let s = NamedNode::new_unchecked("http://example.com/s");
        let p = NamedNode::new_unchecked("http://example.com/p");
        serializer
            .serialize_triple(TripleRef::new(
                s.as_ref(),
                p.as_ref(),
                Literal::new_typed_literal("42", xsd::INTEGER).as_ref(),
            ))
            .unwrap();
        let output = String::from_utf8(serializer.finish().unwrap()).unwrap();
        assert_eq!(output, "<http://example.com/s> <http://example.com/p> 42 .\n");

        let mut serializer = TurtleSerializer::new().for_writer(Vec::new());
        serializer
            .serialize_triple(TripleRef::new(
                s.as_ref(),
                p.as_ref(),
                Literal::new_typed_literal("1.", xsd::DECIMAL).as_ref(),
            ))
            .unwrap();
        let output = String::from_utf8(serializer.finish().unwrap()).unwrap();
        assert_eq!(
            output,
            "<http://example.com/s> <http://example.com/p> \"1.\"^^<http://www.w3.org/2001/XMLSchema#decimal> .\n"
        );
    }

    #[test]
    fn serializer_falls_back_to_full_iri_without_a_matching_prefix() {
        let mut serializer = TurtleSerializer::new().for_writer(Vec::new());
        serializer
            .serialize_triple(TripleRef::new(
                NamedNode::new_unchecked("http://example.com/s").as_ref(),
                NamedNode::new_unchecked("http://example.com/p").as_ref(),
                NamedNode::new_unchecked("urn:isbn:0451450523").as_ref(),
            ))
            .unwrap();
        let output = String::from_utf8(serializer.finish().unwrap()).unwrap();
        assert_eq!(
            output,
            "<http://example.com/s> <http://example.com/p> <urn:isbn:0451450523> .\n"
        );
    }

    #[test]
    fn serializer_round_trips_through_the_parser() {
        let output = TurtleSerializer::new()
            .with_prefix("schema", "http://schema.org/")
            .unwrap()
            .serialize_to_vec([
                Triple::new(
                    NamedNode::new_unchecked("http://example.com/foo"),
                    rdf::TYPE.into_owned(),
                    NamedNode::new_unchecked("http://schema.org/Person"),
                ),
                Triple::new(
                    NamedNode::new_unchecked("http://example.com/foo"),
                    NamedNode::new_unchecked("http://schema.org/name"),
                    Literal::new_simple_literal("Foo"),
                ),
            ])
            .unwrap();
        let reparsed = parse(std::str::from_utf8(&output).unwrap());
        assert_eq!(reparsed.len(), 2);
        assert!(reparsed.iter().any(|t| t.predicate == rdf::TYPE.into_owned()));
    }
}
