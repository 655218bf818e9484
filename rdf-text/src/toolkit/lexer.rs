//! Generic token scanner driving a [`TokenRecognizer`] over a fully-buffered
//! input, tracking line/column/offset positions for error reporting.
use crate::toolkit::error::{SyntaxError, TextPosition};
use memchr::{memchr2, memchr2_iter};
use std::borrow::Cow;
use std::ops::{Range, RangeInclusive};
use std::str;

pub trait TokenRecognizer {
    type Token<'a>
    where
        Self: 'a;
    type Options: Default;

    fn recognize_next_token<'a>(
        &mut self,
        data: &'a [u8],
        is_ending: bool,
        options: &Self::Options,
    ) -> Option<(usize, Result<Self::Token<'a>, TokenRecognizerError>)>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum TokenOrLineJump<T> {
    Token(T),
    LineJump,
}

pub struct TokenRecognizerError {
    pub location: Range<usize>,
    pub message: String,
}

impl<S: Into<String>> From<(Range<usize>, S)> for TokenRecognizerError {
    fn from((location, message): (Range<usize>, S)) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl<S: Into<String>> From<(RangeInclusive<usize>, S)> for TokenRecognizerError {
    fn from((location, message): (RangeInclusive<usize>, S)) -> Self {
        (*location.start()..*location.end() + 1, message).into()
    }
}

impl<S: Into<String>> From<(usize, S)> for TokenRecognizerError {
    fn from((location, message): (usize, S)) -> Self {
        (location..=location, message).into()
    }
}

/// Drives a [`TokenRecognizer`] over a buffer that is known in full up front
/// (no incremental chunk growth: the whole document is read into memory
/// before parsing starts).
pub struct Lexer<R: TokenRecognizer> {
    recognizer: R,
    data: Vec<u8>,
    position: Position,
    previous_position: Position,
    line_comment_start: Option<&'static [u8]>,
}

#[derive(Clone, Copy, Default)]
struct Position {
    line_start_buffer_offset: usize,
    buffer_offset: usize,
    global_offset: u64,
    global_line: u64,
}

impl<R: TokenRecognizer> Lexer<R> {
    pub fn new(recognizer: R, data: Vec<u8>, line_comment_start: Option<&'static [u8]>) -> Self {
        Self {
            recognizer,
            data,
            position: Position::default(),
            previous_position: Position::default(),
            line_comment_start,
        }
    }

    /// Reads the next token, or `None` once the whole buffer has been consumed.
    pub fn parse_next(
        &mut self,
        options: &R::Options,
    ) -> Option<Result<TokenOrLineJump<R::Token<'_>>, SyntaxError>> {
        if self.skip_whitespaces_and_comments() {
            self.previous_position = self.position;
            return Some(Ok(TokenOrLineJump::LineJump));
        }
        self.previous_position = self.position;
        let Some((consumed, result)) = self.recognizer.recognize_next_token(
            &self.data[self.position.buffer_offset..],
            true,
            options,
        ) else {
            return if self.position.buffer_offset == self.data.len() {
                None // done
            } else {
                let (new_line_jumps, new_line_start) =
                    Self::find_number_of_line_jumps_and_start_of_last_line(
                        &self.data[self.position.buffer_offset..],
                    );
                if new_line_jumps > 0 {
                    self.position.line_start_buffer_offset =
                        self.position.buffer_offset + new_line_start;
                }
                self.position.global_offset +=
                    u64::try_from(self.data.len() - self.position.buffer_offset).unwrap();
                self.position.buffer_offset = self.data.len();
                self.position.global_line += new_line_jumps;
                Some(Err(SyntaxError {
                    location: self.last_token_location(),
                    message: "unexpected end of file".into(),
                }))
            };
        };
        debug_assert!(
            consumed > 0,
            "the lexer must consume at least one byte each time"
        );
        let (new_line_jumps, new_line_start) =
            Self::find_number_of_line_jumps_and_start_of_last_line(
                &self.data[self.position.buffer_offset..self.position.buffer_offset + consumed],
            );
        if new_line_jumps > 0 {
            self.position.line_start_buffer_offset = self.position.buffer_offset + new_line_start;
        }
        self.position.buffer_offset += consumed;
        self.position.global_offset += u64::try_from(consumed).unwrap();
        self.position.global_line += new_line_jumps;
        Some(result.map(TokenOrLineJump::Token).map_err(|e| SyntaxError {
            location: self.location_from_buffer_offset_range(e.location),
            message: e.message,
        }))
    }

    pub fn location_from_buffer_offset_range(
        &self,
        offset_range: Range<usize>,
    ) -> Range<TextPosition> {
        let start_offset = self.previous_position.buffer_offset + offset_range.start;
        let (start_extra_line_jumps, start_line_start) =
            Self::find_number_of_line_jumps_and_start_of_last_line(
                &self.data[self.previous_position.buffer_offset..start_offset],
            );
        let start_line_start = if start_extra_line_jumps > 0 {
            start_line_start + self.previous_position.buffer_offset
        } else {
            self.previous_position.line_start_buffer_offset
        };
        let end_offset = self.previous_position.buffer_offset + offset_range.end;
        let (end_extra_line_jumps, end_line_start) =
            Self::find_number_of_line_jumps_and_start_of_last_line(
                &self.data[self.previous_position.buffer_offset..end_offset],
            );
        let end_line_start = if end_extra_line_jumps > 0 {
            end_line_start + self.previous_position.buffer_offset
        } else {
            self.previous_position.line_start_buffer_offset
        };
        TextPosition {
            line: self.previous_position.global_line + start_extra_line_jumps,
            column: Self::column_from_bytes(&self.data[start_line_start..start_offset]),
            offset: self.previous_position.global_offset
                + u64::try_from(offset_range.start).unwrap(),
        }..TextPosition {
            line: self.previous_position.global_line + end_extra_line_jumps,
            column: Self::column_from_bytes(&self.data[end_line_start..end_offset]),
            offset: self.previous_position.global_offset + u64::try_from(offset_range.end).unwrap(),
        }
    }

    pub fn last_token_location(&self) -> Range<TextPosition> {
        self.text_position_from_position(&self.previous_position)
            ..self.text_position_from_position(&self.position)
    }

    fn text_position_from_position(&self, position: &Position) -> TextPosition {
        TextPosition {
            line: position.global_line,
            column: Self::column_from_bytes(
                &self.data[position.line_start_buffer_offset..position.buffer_offset],
            ),
            offset: position.global_offset,
        }
    }

    pub fn last_token_source(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(
            &self.data[self.previous_position.buffer_offset..self.position.buffer_offset],
        )
    }

    pub fn is_end(&self) -> bool {
        self.data.len() == self.position.buffer_offset
    }

    fn skip_whitespaces_and_comments(&mut self) -> bool {
        if self.skip_whitespaces() {
            return true;
        }
        let buf = &self.data[self.position.buffer_offset..];
        if let Some(line_comment_start) = self.line_comment_start {
            if buf.starts_with(line_comment_start) {
                let rest = &buf[line_comment_start.len()..];
                let end_position = memchr2(b'\r', b'\n', rest)
                    .map(|end| {
                        let mut end_position = line_comment_start.len() + end;
                        if buf.get(end_position).copied() == Some(b'\r')
                            && buf.get(end_position + 1).copied() == Some(b'\n')
                        {
                            end_position += 1;
                        }
                        end_position
                    })
                    .unwrap_or(buf.len().saturating_sub(1));
                let comment_size = end_position + 1;
                self.position.buffer_offset += comment_size.min(buf.len());
                self.position.line_start_buffer_offset = self.position.buffer_offset;
                self.position.global_offset += u64::try_from(comment_size.min(buf.len())).unwrap();
                self.position.global_line += 1;
                return true;
            }
        }
        false
    }

    fn skip_whitespaces(&mut self) -> bool {
        let mut i = self.position.buffer_offset;
        let mut skipped = false;
        while let Some(c) = self.data.get(i) {
            match c {
                b' ' | b'\t' => {
                    self.position.buffer_offset += 1;
                    self.position.global_offset += 1;
                    skipped = true;
                }
                b'\r' => {
                    let mut increment: u8 = 1;
                    if self.data.get(i + 1) == Some(&b'\n') {
                        increment += 1;
                    }
                    self.position.buffer_offset += usize::from(increment);
                    self.position.line_start_buffer_offset = self.position.buffer_offset;
                    self.position.global_offset += u64::from(increment);
                    self.position.global_line += 1;
                    return true;
                }
                b'\n' => {
                    self.position.buffer_offset += 1;
                    self.position.line_start_buffer_offset = self.position.buffer_offset;
                    self.position.global_offset += 1;
                    self.position.global_line += 1;
                    return true;
                }
                _ => return skipped,
            }
            i += 1;
        }
        skipped
    }

    fn find_number_of_line_jumps_and_start_of_last_line(bytes: &[u8]) -> (u64, usize) {
        let mut num_of_jumps = 0;
        let mut last_jump_pos = 0;
        let mut previous_cr = 0;
        for pos in memchr2_iter(b'\r', b'\n', bytes) {
            if bytes[pos] == b'\r' {
                previous_cr = pos;
                num_of_jumps += 1;
                last_jump_pos = pos + 1;
            } else {
                if previous_cr < pos.wrapping_sub(1) {
                    num_of_jumps += 1;
                }
                last_jump_pos = pos + 1;
            }
        }
        (num_of_jumps, last_jump_pos)
    }

    fn column_from_bytes(bytes: &[u8]) -> u64 {
        match str::from_utf8(bytes) {
            Ok(s) => u64::try_from(s.chars().count()).unwrap(),
            Err(e) => {
                if e.valid_up_to() == 0 {
                    0
                } else {
                    Self::column_from_bytes(&bytes[..e.valid_up_to()])
                }
            }
        }
    }
}
