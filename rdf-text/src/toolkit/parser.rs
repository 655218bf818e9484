//! Generic rule-based parser driving a [`RuleRecognizer`] state machine over
//! the tokens produced by a [`Lexer`].
use crate::toolkit::error::SyntaxError;
use crate::toolkit::lexer::{Lexer, TokenOrLineJump, TokenRecognizer};

pub trait RuleRecognizer: Sized {
    type TokenRecognizer: TokenRecognizer;
    type Output;

    /// The state to fall back to after a syntax error, so parsing can resume
    /// at the next statement instead of aborting.
    fn error_recovery_state(self) -> Self;

    fn recognize_next(
        self,
        token: TokenOrLineJump<<Self::TokenRecognizer as TokenRecognizer>::Token<'_>>,
        results: &mut Vec<Self::Output>,
        errors: &mut Vec<RuleRecognizerError>,
    ) -> Self;

    fn recognize_end(self, results: &mut Vec<Self::Output>, errors: &mut Vec<RuleRecognizerError>);

    fn lexer_options(&self) -> &<Self::TokenRecognizer as TokenRecognizer>::Options;
}

pub struct RuleRecognizerError {
    pub message: String,
}

impl<S: Into<String>> From<S> for RuleRecognizerError {
    fn from(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Drives `RR` over a [`Lexer`], yielding each parsed `RR::Output` value (or
/// the [`SyntaxError`] encountered while scanning for it) in turn.
pub struct Parser<RR: RuleRecognizer> {
    lexer: Lexer<RR::TokenRecognizer>,
    state: Option<RR>,
    results: Vec<RR::Output>,
    errors: Vec<RuleRecognizerError>,
    default_lexer_options: <RR::TokenRecognizer as TokenRecognizer>::Options,
}

impl<RR: RuleRecognizer> Parser<RR> {
    pub fn new(lexer: Lexer<RR::TokenRecognizer>, recognizer: RR) -> Self {
        Self {
            lexer,
            state: Some(recognizer),
            results: Vec::new(),
            errors: Vec::new(),
            default_lexer_options: <RR::TokenRecognizer as TokenRecognizer>::Options::default(),
        }
    }

    fn read_next(&mut self) -> Option<Result<RR::Output, SyntaxError>> {
        loop {
            if let Some(error) = self.errors.pop() {
                return Some(Err(SyntaxError {
                    location: self.lexer.last_token_location(),
                    message: error.message.replace("TOKEN", &self.lexer.last_token_source()),
                }));
            }
            if !self.results.is_empty() {
                // Drain oldest-first: a single token can push more than one
                // result (e.g. a Turtle collection cell plus its enclosing
                // triple), and callers rely on document order between them.
                return Some(Ok(self.results.remove(0)));
            }
            let options = self
                .state
                .as_ref()
                .map_or(&self.default_lexer_options, RuleRecognizer::lexer_options);
            match self.lexer.parse_next(options) {
                Some(Ok(token)) => {
                    self.state = self.state.take().map(|state| {
                        state.recognize_next(token, &mut self.results, &mut self.errors)
                    });
                    continue;
                }
                Some(Err(e)) => {
                    self.state = self.state.take().map(RuleRecognizer::error_recovery_state);
                    return Some(Err(e));
                }
                None => {
                    if self.lexer.is_end() {
                        if let Some(state) = self.state.take() {
                            state.recognize_end(&mut self.results, &mut self.errors);
                            continue;
                        }
                    }
                    return None;
                }
            }
        }
    }
}

impl<RR: RuleRecognizer> Iterator for Parser<RR> {
    type Item = Result<RR::Output, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}
