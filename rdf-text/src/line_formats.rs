//! Shared state machine for the line-oriented N-Triples and N-Quads grammars.
//!
//! N-Triples is N-Quads with the fourth (graph name) component disallowed;
//! both share one [`RuleRecognizer`] parameterized by `with_graph_name`.
use crate::lexer::{LexerMode, TurtleLexer, TurtleLexerOptions, TurtleToken};
use crate::toolkit::{RuleRecognizer, RuleRecognizerError, TokenOrLineJump};
use rdf_model::vocab::rdf;
use rdf_model::{BlankNode, GraphName, Literal, NamedNode, Quad, Subject, Term};

pub struct NQuadsRecognizer {
    state: NQuadsState,
    with_graph_name: bool,
    lenient: bool,
    lexer_options: TurtleLexerOptions,
}

enum NQuadsState {
    ExpectSubject,
    ExpectPredicate {
        subject: Subject,
    },
    ExpectObject {
        subject: Subject,
        predicate: NamedNode,
    },
    ExpectLiteralAnnotationOrGraphNameOrDot {
        subject: Subject,
        predicate: NamedNode,
        value: String,
    },
    ExpectLiteralDatatype {
        subject: Subject,
        predicate: NamedNode,
        value: String,
    },
    ExpectGraphNameOrDot {
        subject: Subject,
        predicate: NamedNode,
        object: Term,
    },
    ExpectDot {
        subject: Subject,
        predicate: NamedNode,
        object: Term,
        graph_name: GraphName,
    },
    ExpectLineJump,
    RecoverToLineJump,
}

impl RuleRecognizer for NQuadsRecognizer {
    type TokenRecognizer = TurtleLexer;
    type Output = Quad;

    fn error_recovery_state(mut self) -> Self {
        self.state = NQuadsState::RecoverToLineJump;
        self
    }

    fn recognize_next(
        mut self,
        token: TokenOrLineJump<TurtleToken<'_>>,
        results: &mut Vec<Quad>,
        errors: &mut Vec<RuleRecognizerError>,
    ) -> Self {
        match std::mem::replace(&mut self.state, NQuadsState::ExpectSubject) {
            NQuadsState::ExpectSubject => {
                let TokenOrLineJump::Token(inner) = &token else {
                    self.state = NQuadsState::ExpectSubject;
                    return self;
                };
                match inner {
                    TurtleToken::IriRef(s) => {
                        let s = s.clone();
                        self.state = NQuadsState::ExpectPredicate {
                            subject: NamedNode::new_unchecked(s).into(),
                        };
                        self
                    }
                    TurtleToken::BlankNodeLabel(s) => {
                        let s = *s;
                        self.state = NQuadsState::ExpectPredicate {
                            subject: BlankNode::new_unchecked(s).into(),
                        };
                        self
                    }
                    TurtleToken::LangTag("prefix" | "base") => self.error(
                        results,
                        errors,
                        token,
                        "unexpected @prefix/@base as subject",
                    ),
                    _ => self.error(
                        results,
                        errors,
                        token,
                        "the subject of a triple must be an IRI or a blank node",
                    ),
                }
            }
            NQuadsState::ExpectPredicate { subject } => {
                let TokenOrLineJump::Token(inner) = &token else {
                    self.state = NQuadsState::ExpectPredicate { subject };
                    return self.error(
                        results,
                        errors,
                        token,
                        "line jumps are not allowed in the middle of a triple",
                    );
                };
                match inner {
                    TurtleToken::IriRef(p) => {
                        let p = p.clone();
                        self.state = NQuadsState::ExpectObject {
                            subject,
                            predicate: NamedNode::new_unchecked(p),
                        };
                        self
                    }
                    _ => {
                        self.state = NQuadsState::ExpectPredicate { subject };
                        self.error(results, errors, token, "the predicate of a triple must be an IRI")
                    }
                }
            }
            NQuadsState::ExpectObject { subject, predicate } => {
                let TokenOrLineJump::Token(inner) = &token else {
                    self.state = NQuadsState::ExpectObject { subject, predicate };
                    return self.error(
                        results,
                        errors,
                        token,
                        "line jumps are not allowed in the middle of a triple",
                    );
                };
                match inner {
                    TurtleToken::IriRef(o) => {
                        let o = o.clone();
                        self.state = NQuadsState::ExpectGraphNameOrDot {
                            subject,
                            predicate,
                            object: NamedNode::new_unchecked(o).into(),
                        };
                        self
                    }
                    TurtleToken::BlankNodeLabel(o) => {
                        let o = *o;
                        self.state = NQuadsState::ExpectGraphNameOrDot {
                            subject,
                            predicate,
                            object: BlankNode::new_unchecked(o).into(),
                        };
                        self
                    }
                    TurtleToken::String(_) | TurtleToken::LongString(_) => {
                        let value = match token {
                            TokenOrLineJump::Token(TurtleToken::String(v))
                            | TokenOrLineJump::Token(TurtleToken::LongString(v)) => v,
                            _ => unreachable!(),
                        };
                        self.state = NQuadsState::ExpectLiteralAnnotationOrGraphNameOrDot {
                            subject,
                            predicate,
                            value,
                        };
                        self
                    }
                    _ => {
                        self.state = NQuadsState::ExpectObject { subject, predicate };
                        self.error(
                            results,
                            errors,
                            token,
                            "the object of a triple must be an IRI, a blank node or a literal",
                        )
                    }
                }
            }
            NQuadsState::ExpectLiteralAnnotationOrGraphNameOrDot {
                subject,
                predicate,
                value,
            } => match &token {
                TokenOrLineJump::Token(TurtleToken::LangTag(language)) => {
                    let language = language.to_ascii_lowercase();
                    self.state = NQuadsState::ExpectGraphNameOrDot {
                        subject,
                        predicate,
                        object: Literal::new_language_tagged_literal_unchecked(value, language)
                            .into(),
                    };
                    self
                }
                TokenOrLineJump::Token(TurtleToken::Punctuation("^^")) => {
                    self.state = NQuadsState::ExpectLiteralDatatype {
                        subject,
                        predicate,
                        value,
                    };
                    self
                }
                _ => {
                    self.state = NQuadsState::ExpectGraphNameOrDot {
                        subject,
                        predicate,
                        object: Literal::new_simple_literal(value).into(),
                    };
                    self.recognize_next(token, results, errors)
                }
            },
            NQuadsState::ExpectLiteralDatatype {
                subject,
                predicate,
                value,
            } => {
                let TokenOrLineJump::Token(inner) = &token else {
                    self.state = NQuadsState::ExpectLiteralDatatype {
                        subject,
                        predicate,
                        value,
                    };
                    return self.error(
                        results,
                        errors,
                        token,
                        "line jumps are not allowed in the middle of a triple",
                    );
                };
                match inner {
                    TurtleToken::IriRef(d) => {
                        let d = d.clone();
                        if !self.lenient && d == rdf::LANG_STRING.as_str() {
                            errors.push(
                                "a literal datatype without a language tag must not be rdf:langString"
                                    .into(),
                            );
                        }
                        self.state = NQuadsState::ExpectGraphNameOrDot {
                            subject,
                            predicate,
                            object: Literal::new_typed_literal(value, NamedNode::new_unchecked(d))
                                .into(),
                        };
                        self
                    }
                    _ => {
                        self.state = NQuadsState::ExpectLiteralDatatype {
                            subject,
                            predicate,
                            value,
                        };
                        self.error(results, errors, token, "a literal datatype must be an IRI")
                    }
                }
            }
            NQuadsState::ExpectGraphNameOrDot {
                subject,
                predicate,
                object,
            } => match &token {
                TokenOrLineJump::Token(TurtleToken::IriRef(g)) if self.with_graph_name => {
                    let g = g.clone();
                    self.state = NQuadsState::ExpectDot {
                        subject,
                        predicate,
                        object,
                        graph_name: NamedNode::new_unchecked(g).into(),
                    };
                    self
                }
                TokenOrLineJump::Token(TurtleToken::BlankNodeLabel(g)) if self.with_graph_name => {
                    let g = *g;
                    self.state = NQuadsState::ExpectDot {
                        subject,
                        predicate,
                        object,
                        graph_name: BlankNode::new_unchecked(g).into(),
                    };
                    self
                }
                _ => {
                    self.state = NQuadsState::ExpectDot {
                        subject,
                        predicate,
                        object,
                        graph_name: GraphName::DefaultGraph,
                    };
                    self.recognize_next(token, results, errors)
                }
            },
            NQuadsState::ExpectDot {
                subject,
                predicate,
                object,
                graph_name,
            } => {
                let TokenOrLineJump::Token(inner) = &token else {
                    errors.push("triples and quads must be followed by a dot".into());
                    results.push(Quad::new(subject, predicate, object, graph_name));
                    self.state = NQuadsState::ExpectSubject;
                    return self;
                };
                if *inner == TurtleToken::Punctuation(".") {
                    results.push(Quad::new(subject, predicate, object, graph_name));
                    self.state = NQuadsState::ExpectLineJump;
                    self
                } else {
                    errors.push("triples and quads must be followed by a dot".into());
                    results.push(Quad::new(subject, predicate, object, graph_name));
                    self.state = NQuadsState::ExpectLineJump;
                    self.recognize_next(token, results, errors)
                }
            }
            NQuadsState::ExpectLineJump => {
                let TokenOrLineJump::Token(_) = &token else {
                    self.state = NQuadsState::ExpectSubject;
                    return self;
                };
                self.state = NQuadsState::ExpectSubject;
                self.error(
                    results,
                    errors,
                    token,
                    "only a single triple or quad is allowed per line",
                )
            }
            NQuadsState::RecoverToLineJump => {
                self.state = if token == TokenOrLineJump::LineJump {
                    NQuadsState::ExpectSubject
                } else {
                    NQuadsState::RecoverToLineJump
                };
                self
            }
        }
    }

    fn recognize_end(self, results: &mut Vec<Quad>, errors: &mut Vec<RuleRecognizerError>) {
        match self.state {
            NQuadsState::ExpectSubject
            | NQuadsState::ExpectLineJump
            | NQuadsState::RecoverToLineJump => (),
            NQuadsState::ExpectDot {
                subject,
                predicate,
                object,
                graph_name,
            } => {
                errors.push("unexpected end of file: triples must be followed by a dot".into());
                results.push(Quad::new(subject, predicate, object, graph_name));
            }
            NQuadsState::ExpectGraphNameOrDot {
                subject,
                predicate,
                object,
            } => {
                errors.push("unexpected end of file: triples must be followed by a dot".into());
                results.push(Quad::new(subject, predicate, object, GraphName::DefaultGraph));
            }
            NQuadsState::ExpectLiteralAnnotationOrGraphNameOrDot {
                subject,
                predicate,
                value,
            } => {
                errors.push("unexpected end of file: triples must be followed by a dot".into());
                results.push(Quad::new(
                    subject,
                    predicate,
                    Literal::new_simple_literal(value),
                    GraphName::DefaultGraph,
                ));
            }
            _ => errors.push("unexpected end of file in the middle of a triple".into()),
        }
    }

    fn lexer_options(&self) -> &TurtleLexerOptions {
        &self.lexer_options
    }
}

impl NQuadsRecognizer {
    pub fn new(with_graph_name: bool, lenient: bool) -> Self {
        Self {
            state: NQuadsState::ExpectSubject,
            with_graph_name,
            lenient,
            lexer_options: TurtleLexerOptions::default(),
        }
    }

    pub fn lexer(lenient: bool) -> TurtleLexer {
        TurtleLexer::new(LexerMode::NTriples, lenient)
    }

    /// Records `msg` and transitions to error recovery. A token that triggered
    /// the error is dropped (recovery waits for the next line jump); a line
    /// jump is itself re-fed so recovery can end immediately.
    #[must_use]
    fn error(
        self,
        results: &mut Vec<Quad>,
        errors: &mut Vec<RuleRecognizerError>,
        token: TokenOrLineJump<TurtleToken<'_>>,
        msg: impl Into<RuleRecognizerError>,
    ) -> Self {
        errors.push(msg.into());
        let this = self.error_recovery_state();
        match token {
            TokenOrLineJump::Token(_) => this,
            TokenOrLineJump::LineJump => this.recognize_next(token, results, errors),
        }
    }
}
