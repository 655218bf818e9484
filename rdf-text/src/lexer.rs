//! Character-level lexer for the Turtle / N-Triples / N-Quads shared grammar.
//!
//! Produces one [`TurtleToken`] per call, unescaping IRI references and
//! string literals, recognizing numeric shortcuts, and distinguishing
//! prefixed names from the `a` keyword. Runs in one of two [`LexerMode`]s:
//! `NTriples` restricts the grammar to what N-Triples/N-Quads allow
//! (absolute IRIs only, no prefixed names, no numeric shortcuts, no
//! collections); `Turtle` accepts the full shared grammar.
use crate::toolkit::{TokenRecognizer, TokenRecognizerError};
use memchr::{memchr, memchr2};
use oxilangtag::LanguageTag;
use oxiri::Iri;
use rdf_model::NamedNode;
use std::borrow::Cow;
use std::cmp::min;
use std::collections::HashMap;
use std::ops::Range;
use std::str;

#[derive(Debug, PartialEq, Eq)]
pub enum TurtleToken<'a> {
    IriRef(String),
    PrefixedName {
        prefix: &'a str,
        local: Cow<'a, str>,
        might_be_invalid_iri: bool,
    },
    BlankNodeLabel(&'a str),
    String(String),
    LongString(String),
    Integer(&'a str),
    Decimal(&'a str),
    Double(&'a str),
    LangTag(&'a str),
    Punctuation(&'a str),
    /// A bare identifier that is not followed by `:`: either the `a`
    /// keyword or (in the N-Triples recognizer) always an error.
    PlainKeyword(&'a str),
}

#[derive(Eq, PartialEq)]
pub enum LexerMode {
    NTriples,
    Turtle,
}

#[derive(Default)]
pub struct TurtleLexerOptions {
    pub base_iri: Option<Iri<String>>,
}

pub struct TurtleLexer {
    mode: LexerMode,
    /// When `true`, a relative IRI with no base set is passed through
    /// unvalidated rather than rejected as not being a well-formed absolute
    /// IRI. Turtle sets this so `subject`/`object` resolution can see the
    /// raw relative text; N-Triples/N-Quads leave it `false` so relative
    /// IRIs are rejected right at the lexer.
    lenient: bool,
}

impl TokenRecognizer for TurtleLexer {
    type Token<'a> = TurtleToken<'a>;
    type Options = TurtleLexerOptions;

    fn recognize_next_token<'a>(
        &mut self,
        data: &'a [u8],
        is_ending: bool,
        options: &TurtleLexerOptions,
    ) -> Option<(usize, Result<TurtleToken<'a>, TokenRecognizerError>)> {
        match *data.first()? {
            b'<' => self.recognize_iri(data, options),
            b'"' => {
                if *data.get(1)? == b'"' && *data.get(2)? == b'"' {
                    Self::recognize_long_string(data, b'"')
                } else {
                    Self::recognize_string(data, b'"')
                }
            }
            b'\'' if self.mode != LexerMode::NTriples => {
                if *data.get(1)? == b'\'' && *data.get(2)? == b'\'' {
                    Self::recognize_long_string(data, b'\'')
                } else {
                    Self::recognize_string(data, b'\'')
                }
            }
            b'@' => self.recognize_lang_tag(data, is_ending),
            b'^' => {
                if *data.get(1)? == b'^' {
                    Some((2, Ok(TurtleToken::Punctuation("^^"))))
                } else {
                    Some((1, Err((0..1, "disallowed escape character '^'").into())))
                }
            }
            b'(' => Some((1, Ok(TurtleToken::Punctuation("(")))),
            b')' => Some((1, Ok(TurtleToken::Punctuation(")")))),
            b'[' => Some((1, Ok(TurtleToken::Punctuation("[")))),
            b']' => Some((1, Ok(TurtleToken::Punctuation("]")))),
            b'.' => match data.get(1) {
                Some(b'0'..=b'9') => Self::recognize_number(data, is_ending),
                Some(_) => Some((1, Ok(TurtleToken::Punctuation(".")))),
                None => is_ending.then_some((1, Ok(TurtleToken::Punctuation(".")))),
            },
            b',' => Some((1, Ok(TurtleToken::Punctuation(",")))),
            b';' => Some((1, Ok(TurtleToken::Punctuation(";")))),
            b'_' => match data.get(1) {
                Some(b':') => Self::recognize_blank_node_label(data, is_ending),
                Some(c) => Some((
                    1,
                    Err((0, format!("unexpected character '{}'", char::from(*c))).into()),
                )),
                None => None,
            },
            b'0'..=b'9' | b'+' | b'-' => Self::recognize_number(data, is_ending),
            _ => self.recognize_pname_or_keyword(data, is_ending),
        }
    }
}

impl TurtleLexer {
    pub fn new(mode: LexerMode, lenient: bool) -> Self {
        Self { mode, lenient }
    }

    fn recognize_iri(
        &self,
        data: &[u8],
        options: &TurtleLexerOptions,
    ) -> Option<(usize, Result<TurtleToken<'static>, TokenRecognizerError>)> {
        // [18] IRIREF ::= '<' ([^#x00-#x20<>"{}|^`\] | UCHAR)* '>'
        let mut string = Vec::new();
        let mut i = 1;
        loop {
            let end = memchr2(b'>', b'\\', &data[i..])?;
            for &b in &data[i..i + end] {
                if b < 0x21 || matches!(b, b'<' | b'"' | b'{' | b'}' | b'|' | b'^' | b'`') {
                    return Some((
                        i + end + 1,
                        Err((
                            i..i + end + 1,
                            format!("disallowed character '{}'", char::from(b)),
                        )
                            .into()),
                    ));
                }
            }
            string.extend_from_slice(&data[i..i + end]);
            i += end;
            match data[i] {
                b'>' => return Some((i + 1, self.parse_iri(string, 0..i + 1, options))),
                b'\\' => match Self::recognize_escape(&data[i..], i, false) {
                    Some((additional, Ok(c))) => {
                        if matches!(c, '\u{0}'..='\u{20}')
                            || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
                        {
                            return Some((
                                i + additional + 1,
                                Err((i..i + additional + 1, "disallowed character in unicode escape").into()),
                            ));
                        }
                        let mut buf = [0; 4];
                        string.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                        i += additional + 1;
                    }
                    Some((additional, Err(e))) => return Some((i + additional + 1, Err(e))),
                    None => return None,
                },
                _ => unreachable!(),
            }
        }
    }

    fn parse_iri(
        &self,
        iri: Vec<u8>,
        position: Range<usize>,
        options: &TurtleLexerOptions,
    ) -> Result<TurtleToken<'static>, TokenRecognizerError> {
        let iri = string_from_utf8(iri, position.clone())?;
        Ok(TurtleToken::IriRef(
            if let Some(base_iri) = options.base_iri.as_ref() {
                base_iri
                    .resolve(&iri)
                    .map_err(|e| (position, e.to_string()))?
                    .into_inner()
            } else if self.lenient {
                iri
            } else {
                Iri::parse(iri)
                    .map_err(|e| (position, e.to_string()))?
                    .into_inner()
            },
        ))
    }

    fn recognize_pname_or_keyword<'a>(
        &self,
        data: &'a [u8],
        is_ending: bool,
    ) -> Option<(usize, Result<TurtleToken<'a>, TokenRecognizerError>)> {
        // [139s] PNAME_NS ::= PN_PREFIX? ':'
        // [140s] PNAME_LN ::= PNAME_NS PN_LOCAL
        let mut i = 0;
        loop {
            if let Some(r) = Self::recognize_unicode_char(&data[i..], i) {
                match r {
                    Ok((c, consumed)) => {
                        if c == ':' {
                            i += consumed;
                            break;
                        } else if i == 0 {
                            if !Self::is_possible_pn_chars_base(c) {
                                return Some((
                                    consumed,
                                    Err((
                                        0..consumed,
                                        format!("'{c}' is not allowed at the start of a prefix name"),
                                    )
                                        .into()),
                                ));
                            }
                            i += consumed;
                        } else if Self::is_possible_pn_chars(c) || c == '.' {
                            i += consumed;
                        } else {
                            while data[..i].ends_with(b".") {
                                i -= 1;
                            }
                            return Some((i, str_from_utf8(&data[..i], 0..i).map(TurtleToken::PlainKeyword)));
                        }
                    }
                    Err(e) => return Some((e.location.end, Err(e))),
                }
            } else if is_ending {
                while data[..i].ends_with(b".") {
                    i -= 1;
                }
                return Some(if i == 0 {
                    (1, Err((0..1, format!("unexpected byte {}", data[0])).into()))
                } else {
                    (i, str_from_utf8(&data[..i], 0..i).map(TurtleToken::PlainKeyword))
                });
            } else {
                return None;
            }
        }
        let pn_prefix = match str_from_utf8(&data[..i - 1], 0..i - 1) {
            Ok(pn_prefix) => pn_prefix,
            Err(e) => return Some((i, Err(e))),
        };
        if pn_prefix.ends_with('.') {
            return Some((
                i,
                Err((0..i, format!("'{pn_prefix}' is not a valid prefix: prefixes may not end with '.'")).into()),
            ));
        }
        let (consumed, pn_local_result) = self.recognize_optional_pn_local(&data[i..], is_ending)?;
        Some((
            consumed + i,
            pn_local_result.map(|(local, might_be_invalid_iri)| TurtleToken::PrefixedName {
                prefix: pn_prefix,
                local,
                might_be_invalid_iri,
            }),
        ))
    }

    fn recognize_optional_pn_local<'a>(
        &self,
        data: &'a [u8],
        is_ending: bool,
    ) -> Option<(usize, Result<(Cow<'a, str>, bool), TokenRecognizerError>)> {
        // [168s] PN_LOCAL ::= (PN_CHARS_U | ':' | [0-9] | PLX) ((PN_CHARS | '.' | ':' | PLX)* (PN_CHARS | ':' | PLX))?
        let mut i = 0;
        let mut buffer = None;
        let mut position_that_is_already_in_buffer = 0;
        let mut might_be_invalid_iri = false;
        let mut ends_with_unescaped_dot = 0;
        loop {
            if let Some(r) = Self::recognize_unicode_char(&data[i..], i) {
                match r {
                    Ok((c, consumed)) => {
                        if c == '%' {
                            i += 1;
                            let a = char::from(*data.get(i)?);
                            i += 1;
                            let b = char::from(*data.get(i)?);
                            if !a.is_ascii_hexdigit() || !b.is_ascii_hexdigit() {
                                return Some((
                                    i + 1,
                                    Err((
                                        i - 2..=i,
                                        format!("'%' escapes in IRIs must be followed by two hex digits, found '%{a}{b}'"),
                                    )
                                        .into()),
                                ));
                            }
                            i += 1;
                            ends_with_unescaped_dot = 0;
                        } else if c == '\\' {
                            i += 1;
                            let a = char::from(*data.get(i)?);
                            if matches!(
                                a,
                                '_' | '~' | '.' | '-' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';' | '='
                            ) {
                                // ok
                            } else if matches!(a, '/' | '?' | '#' | '@' | '%') {
                                might_be_invalid_iri = true;
                            } else {
                                return Some((
                                    i + 1,
                                    Err((
                                        i..=i,
                                        format!("disallowed escape character '{a}' in prefixed name local part"),
                                    )
                                        .into()),
                                ));
                            }
                            let buffer = buffer.get_or_insert_with(String::new);
                            if i - position_that_is_already_in_buffer > 1 {
                                buffer.push_str(
                                    match str_from_utf8(
                                        &data[position_that_is_already_in_buffer..i - 1],
                                        position_that_is_already_in_buffer..i - 1,
                                    ) {
                                        Ok(data) => data,
                                        Err(e) => return Some((i, Err(e))),
                                    },
                                )
                            }
                            buffer.push(a);
                            i += 1;
                            position_that_is_already_in_buffer = i;
                            ends_with_unescaped_dot = 0;
                        } else if i == 0 {
                            if !(Self::is_possible_pn_chars_u(c) || c == ':' || c.is_ascii_digit()) {
                                return Some((0, Ok((Cow::Borrowed(""), false))));
                            }
                            might_be_invalid_iri |= Self::is_possible_pn_chars_base_but_not_valid_iri(c) || c == ':';
                            i += consumed;
                        } else if Self::is_possible_pn_chars(c) || c == ':' {
                            might_be_invalid_iri |= Self::is_possible_pn_chars_base_but_not_valid_iri(c) || c == ':';
                            i += consumed;
                            ends_with_unescaped_dot = 0;
                        } else if c == '.' {
                            i += consumed;
                            ends_with_unescaped_dot += 1;
                        } else {
                            let buffer = if let Some(mut buffer) = buffer {
                                buffer.push_str(
                                    match str_from_utf8(
                                        &data[position_that_is_already_in_buffer..i],
                                        position_that_is_already_in_buffer..i,
                                    ) {
                                        Ok(data) => data,
                                        Err(e) => return Some((i, Err(e))),
                                    },
                                );
                                for _ in 0..ends_with_unescaped_dot {
                                    buffer.pop();
                                }
                                i -= ends_with_unescaped_dot;
                                Cow::Owned(buffer)
                            } else {
                                let mut data = match str_from_utf8(&data[..i], 0..i) {
                                    Ok(data) => data,
                                    Err(e) => return Some((i, Err(e))),
                                };
                                data = &data[..data.len() - ends_with_unescaped_dot];
                                i -= ends_with_unescaped_dot;
                                Cow::Borrowed(data)
                            };
                            return Some((i, Ok((buffer, might_be_invalid_iri))));
                        }
                    }
                    Err(e) => return Some((e.location.end, Err(e))),
                }
            } else if is_ending {
                let buffer = if let Some(mut buffer) = buffer {
                    while buffer.ends_with('.') {
                        buffer.pop();
                        i -= 1;
                    }
                    Cow::Owned(buffer)
                } else {
                    let mut data = match str_from_utf8(&data[..i], 0..i) {
                        Ok(data) => data,
                        Err(e) => return Some((i, Err(e))),
                    };
                    while let Some(d) = data.strip_suffix('.') {
                        data = d;
                        i -= 1;
                    }
                    Cow::Borrowed(data)
                };
                return Some((i, Ok((buffer, might_be_invalid_iri))));
            } else {
                return None;
            }
        }
    }

    fn recognize_blank_node_label(
        data: &[u8],
        is_ending: bool,
    ) -> Option<(usize, Result<TurtleToken<'_>, TokenRecognizerError>)> {
        // [141s] BLANK_NODE_LABEL ::= '_:' (PN_CHARS_U | [0-9]) ((PN_CHARS | '.')* PN_CHARS)?
        let mut i = 2;
        while let Some(c) = Self::recognize_unicode_char(&data[i..], i) {
            match c {
                Ok((c, consumed)) => {
                    if (i == 2 && (Self::is_possible_pn_chars_u(c) || c.is_ascii_digit()))
                        || (i > 2 && Self::is_possible_pn_chars(c))
                    {
                        // ok
                    } else if i == 2 {
                        return Some((i, Err((0..i, "a blank node label cannot be empty").into())));
                    } else if c == '.' {
                        if data[i - 1] == b'.' {
                            i -= 1;
                            return Some((i, str_from_utf8(&data[2..i], 2..i).map(TurtleToken::BlankNodeLabel)));
                        }
                    } else if data[i - 1] == b'.' {
                        i -= 1;
                        return Some((i, str_from_utf8(&data[2..i], 2..i).map(TurtleToken::BlankNodeLabel)));
                    } else {
                        return Some((i, str_from_utf8(&data[2..i], 2..i).map(TurtleToken::BlankNodeLabel)));
                    }
                    i += consumed;
                }
                Err(e) => return Some((e.location.end, Err(e))),
            }
        }
        is_ending.then(|| {
            if data[i - 1] == b'.' {
                i -= 1;
            }
            (
                i,
                if i > 2 {
                    str_from_utf8(&data[2..i], 2..i).map(TurtleToken::BlankNodeLabel)
                } else {
                    Err((0..i, "a blank node label cannot be empty").into())
                },
            )
        })
    }

    fn recognize_lang_tag<'a>(
        &self,
        data: &'a [u8],
        is_ending: bool,
    ) -> Option<(usize, Result<TurtleToken<'a>, TokenRecognizerError>)> {
        // [144s] LANGTAG ::= '@' [a-zA-Z]+ ('-' [a-zA-Z0-9]+)*
        let mut i = 1;
        let first_block_start = i;
        while data.get(i).is_some_and(u8::is_ascii_alphabetic) {
            i += 1;
        }
        if i == first_block_start {
            return if data.len() > 1 || is_ending {
                Some((i.max(1), Err((1..i.max(2), "bad literal: invalid language tag").into())))
            } else {
                None
            };
        }
        loop {
            if data.get(i) != Some(&b'-') {
                break;
            }
            let subtag_start = i + 1;
            let mut j = subtag_start;
            while data.get(j).is_some_and(u8::is_ascii_alphanumeric) {
                j += 1;
            }
            if j == subtag_start {
                break;
            }
            if j == data.len() && !is_ending {
                return None;
            }
            i = j;
        }
        if i == data.len() && !is_ending {
            return None;
        }
        Some((i, self.parse_lang_tag(&data[1..i], 1..i)))
    }

    fn parse_lang_tag<'a>(
        &self,
        lang_tag: &'a [u8],
        position: Range<usize>,
    ) -> Result<TurtleToken<'a>, TokenRecognizerError> {
        let lang_tag = str_from_utf8(lang_tag, position.clone())?;
        let _ = LanguageTag::parse(lang_tag).map_err(|_| -> TokenRecognizerError {
            (position, "bad literal: invalid language tag").into()
        })?;
        Ok(TurtleToken::LangTag(lang_tag))
    }

    fn recognize_string(
        data: &[u8],
        delimiter: u8,
    ) -> Option<(usize, Result<TurtleToken<'static>, TokenRecognizerError>)> {
        // [22]/[23] STRING_LITERAL_QUOTE / STRING_LITERAL_SINGLE_QUOTE
        let mut string = String::new();
        let mut i = 1;
        loop {
            let mut end = memchr2(delimiter, b'\\', &data[i..])?;
            if let Some(line_jump_end) = memchr2(b'\n', b'\r', &data[i..i + end]) {
                end = line_jump_end;
            }
            match str_from_utf8(&data[i..i + end], i..i + end) {
                Ok(s) => string.push_str(s),
                Err(e) => return Some((end, Err(e))),
            };
            i += end;
            match data[i] {
                c if c == delimiter => return Some((i + 1, Ok(TurtleToken::String(string)))),
                b'\\' => match Self::recognize_escape(&data[i..], i, true) {
                    Some((additional, Ok(c))) => {
                        string.push(c);
                        i += additional + 1;
                    }
                    Some((_, Err(e))) => {
                        let end = memchr(delimiter, &data[i..])?;
                        return Some((i + end + 1, Err(e)));
                    }
                    None => return None,
                },
                b'\n' | b'\r' => {
                    let end = memchr(delimiter, &data[i..])?;
                    return Some((
                        i + end + 1,
                        Err((i..i + 1, "bad literal: no closing quote: newline inside a short string").into()),
                    ));
                }
                _ => unreachable!(),
            }
        }
    }

    fn recognize_long_string(
        data: &[u8],
        delimiter: u8,
    ) -> Option<(usize, Result<TurtleToken<'static>, TokenRecognizerError>)> {
        // [24]/[25] STRING_LITERAL_LONG_SINGLE_QUOTE / STRING_LITERAL_LONG_QUOTE
        let mut string = String::new();
        let mut i = 3;
        loop {
            let end = memchr2(delimiter, b'\\', &data[i..])?;
            match str_from_utf8(&data[i..i + end], i..i + end) {
                Ok(s) => string.push_str(s),
                Err(e) => return Some((end, Err(e))),
            };
            i += end;
            match data[i] {
                c if c == delimiter => {
                    if *data.get(i + 1)? == delimiter && *data.get(i + 2)? == delimiter {
                        return Some((i + 3, Ok(TurtleToken::LongString(string))));
                    }
                    i += 1;
                    string.push(char::from(delimiter));
                }
                b'\\' => match Self::recognize_escape(&data[i..], i, true) {
                    Some((additional, Ok(c))) => {
                        string.push(c);
                        i += additional + 1;
                    }
                    Some((_, Err(e))) => return Some((i, Err(e))),
                    None => return None,
                },
                _ => unreachable!(),
            }
        }
    }

    fn recognize_number(
        data: &[u8],
        is_ending: bool,
    ) -> Option<(usize, Result<TurtleToken<'_>, TokenRecognizerError>)> {
        // [19] INTEGER  [20] DECIMAL  [21] DOUBLE  [154s] EXPONENT
        let mut i = 0;
        if matches!(*data.first()?, b'+' | b'-') {
            i += 1;
        }
        let count_before = Self::recognize_digits(&data[i..], is_ending)?;
        i += count_before;
        let c = if let Some(c) = data.get(i) {
            Some(c)
        } else if is_ending {
            None
        } else {
            return None;
        };
        let count_after = if c == Some(&b'.') {
            i += 1;
            let count_after = Self::recognize_digits(&data[i..], is_ending)?;
            i += count_after;
            Some(count_after)
        } else {
            None
        };
        let c = if let Some(c) = data.get(i) {
            Some(c)
        } else if is_ending {
            None
        } else {
            return None;
        };
        if matches!(c, Some(b'e' | b'E')) {
            i += 1;
            let c = if let Some(c) = data.get(i) {
                Some(c)
            } else if is_ending {
                None
            } else {
                return None;
            };
            if matches!(c, Some(b'+' | b'-')) {
                i += 1;
            }
            let count_exp = Self::recognize_digits(&data[i..], is_ending)?;
            i += count_exp;
            Some((
                i,
                if count_exp == 0 {
                    Err((0..i, "illegal number syntax: missing exponent").into())
                } else if count_before == 0 && count_after.unwrap_or(0) == 0 {
                    Err((0..i, "illegal number syntax: empty number").into())
                } else {
                    str_from_utf8(&data[..i], 0..i).map(TurtleToken::Double)
                },
            ))
        } else if matches!(c, Some(b'a'..=b'z' | b'A'..=b'Z')) {
            Some((
                i + 1,
                Err((
                    0..i + 1,
                    format!("illegal number syntax (number followed by '{}')", char::from(*c.unwrap())),
                )
                    .into()),
            ))
        } else if let Some(count_after) = count_after {
            if count_after == 0 {
                i -= 1;
                Some((
                    i,
                    if count_before == 0 {
                        Err((0..i, "an integer should not be empty").into())
                    } else {
                        str_from_utf8(&data[..i], 0..i).map(TurtleToken::Integer)
                    },
                ))
            } else {
                Some((i, str_from_utf8(&data[..i], 0..i).map(TurtleToken::Decimal)))
            }
        } else if count_before == 0 {
            Some((
                i,
                Err((0..i, "illegal number syntax: ('+' not followed by number)").into()),
            ))
        } else {
            Some((i, str_from_utf8(&data[..i], 0..i).map(TurtleToken::Integer)))
        }
    }

    fn recognize_digits(data: &[u8], is_ending: bool) -> Option<usize> {
        for (i, c) in data.iter().enumerate() {
            if !c.is_ascii_digit() {
                return Some(i);
            }
        }
        is_ending.then_some(data.len())
    }

    fn recognize_escape(
        data: &[u8],
        position: usize,
        with_echar: bool,
    ) -> Option<(usize, Result<char, TokenRecognizerError>)> {
        // [26] UCHAR  [159s] ECHAR
        match *data.get(1)? {
            b'u' => match Self::recognize_hex_char(&data[2..], 4, 'u', position) {
                Ok(c) => Some((5, Ok(c?))),
                Err(e) => Some((5, Err(e))),
            },
            b'U' => match Self::recognize_hex_char(&data[2..], 8, 'U', position) {
                Ok(c) => Some((9, Ok(c?))),
                Err(e) => Some((9, Err(e))),
            },
            b't' if with_echar => Some((1, Ok('\t'))),
            b'b' if with_echar => Some((1, Ok('\x08'))),
            b'n' if with_echar => Some((1, Ok('\n'))),
            b'r' if with_echar => Some((1, Ok('\r'))),
            b'f' if with_echar => Some((1, Ok('\x0C'))),
            b'"' if with_echar => Some((1, Ok('"'))),
            b'\'' if with_echar => Some((1, Ok('\''))),
            b'\\' if with_echar => Some((1, Ok('\\'))),
            c => Some((
                1,
                Err((
                    position..position + 2,
                    format!("disallowed escape character '{}'", char::from(c)),
                )
                    .into()),
            )),
        }
    }

    fn recognize_hex_char(
        data: &[u8],
        len: usize,
        escape_char: char,
        position: usize,
    ) -> Result<Option<char>, TokenRecognizerError> {
        if data.len() < len {
            return Ok(None);
        }
        let mut codepoint = 0;
        for &c in &data[..len] {
            codepoint = codepoint * 16
                + u32::from(match c {
                    b'0'..=b'9' => c - b'0',
                    b'a'..=b'f' => c - b'a' + 10,
                    b'A'..=b'F' => c - b'A' + 10,
                    _ => {
                        return Err((
                            position..position + len + 2,
                            format!("insufficent hex digits in unicode escape \\{escape_char}"),
                        )
                            .into());
                    }
                });
        }
        let c = char::from_u32(codepoint).ok_or_else(|| {
            (
                position..position + len + 2,
                format!("the escape sequence \\{escape_char} encodes {codepoint:X} which is not a valid unicode character"),
            )
                .into()
        })?;
        Ok(Some(c))
    }

    fn recognize_unicode_char(data: &[u8], position: usize) -> Option<Result<(char, usize), TokenRecognizerError>> {
        let mut code_point: u32;
        let bytes_needed: usize;
        let mut lower_boundary = 0x80;
        let mut upper_boundary = 0xBF;
        let byte = *data.first()?;
        match byte {
            0x00..=0x7F => return Some(Ok((char::from(byte), 1))),
            0xC2..=0xDF => {
                bytes_needed = 1;
                code_point = u32::from(byte) & 0x1F;
            }
            0xE0..=0xEF => {
                if byte == 0xE0 {
                    lower_boundary = 0xA0;
                }
                if byte == 0xED {
                    upper_boundary = 0x9F;
                }
                bytes_needed = 2;
                code_point = u32::from(byte) & 0xF;
            }
            0xF0..=0xF4 => {
                if byte == 0xF0 {
                    lower_boundary = 0x90;
                }
                if byte == 0xF4 {
                    upper_boundary = 0x8F;
                }
                bytes_needed = 3;
                code_point = u32::from(byte) & 0x7;
            }
            _ => return Some(Err((position..=position, "invalid UTF-8 character encoding").into())),
        }
        for i in 1..=bytes_needed {
            let byte = *data.get(i)?;
            if byte < lower_boundary || upper_boundary < byte {
                return Some(Err((position..=position + i, "invalid UTF-8 character encoding").into()));
            }
            lower_boundary = 0x80;
            upper_boundary = 0xBF;
            code_point = (code_point << 6) | (u32::from(byte) & 0x3F);
        }
        Some(
            char::from_u32(code_point)
                .map(|c| (c, bytes_needed + 1))
                .ok_or_else(|| {
                    (
                        position..=position + bytes_needed,
                        format!("the codepoint {code_point:X} is not a valid unicode character"),
                    )
                        .into()
                }),
        )
    }

    // [157s] PN_CHARS_BASE
    fn is_possible_pn_chars_base(c: char) -> bool {
        matches!(c,
        'A'..='Z'
        | 'a'..='z'
        | '\u{00C0}'..='\u{00D6}'
        | '\u{00D8}'..='\u{00F6}'
        | '\u{00F8}'..='\u{02FF}'
        | '\u{0370}'..='\u{037D}'
        | '\u{037F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
    }

    // [158s] PN_CHARS_U
    pub(crate) fn is_possible_pn_chars_u(c: char) -> bool {
        Self::is_possible_pn_chars_base(c) || c == '_'
    }

    // [160s] PN_CHARS
    pub(crate) fn is_possible_pn_chars(c: char) -> bool {
        Self::is_possible_pn_chars_u(c)
            || matches!(c, '-' | '0'..='9' | '\u{00B7}' | '\u{0300}'..='\u{036F}' | '\u{203F}'..='\u{2040}')
    }

    fn is_possible_pn_chars_base_but_not_valid_iri(c: char) -> bool {
        matches!(c, '\u{FFF0}'..='\u{FFFD}')
            || u32::from(c) % u32::from('\u{FFFE}') == 0
            || u32::from(c) % u32::from('\u{FFFF}') == 0
    }
}

/// Resolves a Turtle prefixed name against the caller's namespace bindings.
pub fn resolve_prefixed_name(
    prefix: &str,
    local: &str,
    might_be_invalid_iri: bool,
    prefixes: &HashMap<String, Iri<String>>,
) -> Result<NamedNode, String> {
    let Some(start) = prefixes.get(prefix) else {
        return Err(format!("missing namespace for prefix: '{prefix}'"));
    };
    let iri = format!("{start}{local}");
    if might_be_invalid_iri || start.path().is_empty() {
        if let Err(e) = Iri::parse(iri.as_str()) {
            return Err(format!("the prefixed name {prefix}:{local} builds an invalid IRI {iri}: {e}"));
        }
    }
    Ok(NamedNode::new_unchecked(iri))
}

fn str_from_utf8(data: &[u8], range: Range<usize>) -> Result<&str, TokenRecognizerError> {
    str::from_utf8(data).map_err(|e| {
        (
            range.start + e.valid_up_to()..min(range.end, range.start + e.valid_up_to() + 4),
            format!("invalid UTF-8: {e}"),
        )
            .into()
    })
}

fn string_from_utf8(data: Vec<u8>, range: Range<usize>) -> Result<String, TokenRecognizerError> {
    String::from_utf8(data).map_err(|e| {
        (
            range.start + e.utf8_error().valid_up_to()
                ..min(range.end, range.start + e.utf8_error().valid_up_to() + 4),
            format!("invalid UTF-8: {e}"),
        )
            .into()
    })
}
