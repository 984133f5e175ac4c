//! Line splitters
//!
//! Pure byte segmentation: a [`SplitFunc`] inspects a buffer and an
//! at-EOF flag and reports how far to advance and which token, if any,
//! is complete. For a fixed `(data, at_eof)` the result is always the
//! same, no matter how many partial calls came before.

use regex::bytes::Regex;

use stave_operator::{OperatorError, Result};

#[cfg(test)]
#[path = "splitter_test.rs"]
mod tests;

/// Outcome of one split attempt
///
/// `advance == 0` with no token means "need more data" (or, at EOF,
/// "done").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitResult {
    /// Bytes consumed from the front of the buffer
    pub advance: usize,
    /// The completed token, if one was found
    pub token: Option<Vec<u8>>,
}

impl SplitResult {
    fn need_more() -> Self {
        Self::default()
    }

    fn token(advance: usize, token: &[u8]) -> Self {
        Self {
            advance,
            token: Some(token.to_vec()),
        }
    }
}

/// A segmentation function consumed by [`LineScanner`]
pub type SplitFunc = Box<dyn Fn(&[u8], bool) -> SplitResult + Send + Sync>;

/// Text encodings the newline splitter understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    /// Parse an encoding name from configuration
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "" | "utf8" | "utf-8" | "ascii" => Ok(Encoding::Utf8),
            "utf16le" | "utf-16le" => Ok(Encoding::Utf16Le),
            "utf16be" | "utf-16be" => Ok(Encoding::Utf16Be),
            other => Err(OperatorError::config(format!("unknown encoding '{other}'"))),
        }
    }

    fn newline(self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => b"\n",
            Encoding::Utf16Le => &[0x0A, 0x00],
            Encoding::Utf16Be => &[0x00, 0x0A],
        }
    }

    fn carriage_return(self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => b"\r",
            Encoding::Utf16Le => &[0x0D, 0x00],
            Encoding::Utf16Be => &[0x00, 0x0D],
        }
    }

    /// Decode token bytes into a string
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Utf16Le => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Encoding::Utf16Be => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Split on encoded newlines, dropping a terminal CR
///
/// The trailing unterminated remainder is never emitted, even at EOF,
/// so a consumer never observes a half-written line.
pub fn newline_split_func(encoding: Encoding) -> SplitFunc {
    let newline = encoding.newline();
    let carriage_return = encoding.carriage_return();
    Box::new(move |data: &[u8], at_eof: bool| {
        if at_eof && data.is_empty() {
            return SplitResult::need_more();
        }
        match find(data, newline) {
            Some(i) => {
                let mut line = &data[..i];
                if line.ends_with(carriage_return) {
                    line = &line[..line.len() - carriage_return.len()];
                }
                SplitResult::token(i + newline.len(), line)
            }
            None => SplitResult::need_more(),
        }
    })
}

/// Split into tokens that begin at a regex match
///
/// Leading bytes before the first match are emitted as their own
/// synchronization token so no data is lost.
pub fn line_start_split_func(pattern: &str) -> Result<SplitFunc> {
    let re = Regex::new(pattern)
        .map_err(|e| OperatorError::config(format!("compiling line_start_pattern: {e}")))?;
    Ok(Box::new(move |data: &[u8], at_eof: bool| {
        let first = match re.find(data) {
            Some(m) => m,
            None => return SplitResult::need_more(),
        };

        if first.start() != 0 {
            // Emit everything before the first match so it is preserved.
            return SplitResult::token(first.start(), &data[..first.start()]);
        }

        if first.end() == data.len() {
            // The match runs to the end of the buffer.
            if at_eof {
                return SplitResult::token(data.len(), data);
            }
            return SplitResult::need_more();
        }

        let offset = first.end() + 1;
        match re.find(&data[offset.min(data.len())..]) {
            Some(second) => {
                let second_start = second.start() + offset;
                SplitResult::token(second_start, &data[first.start()..second_start])
            }
            None => {
                if at_eof {
                    SplitResult::token(data.len(), &data[first.start()..])
                } else {
                    SplitResult::need_more()
                }
            }
        }
    }))
}

/// Split into tokens that end at a regex match
pub fn line_end_split_func(pattern: &str) -> Result<SplitFunc> {
    let re = Regex::new(pattern)
        .map_err(|e| OperatorError::config(format!("compiling line_end_pattern: {e}")))?;
    Ok(Box::new(move |data: &[u8], at_eof: bool| {
        let m = match re.find(data) {
            Some(m) => m,
            None => return SplitResult::need_more(),
        };

        // A match that ends flush with the buffer may be a prefix of a
        // longer delimiter still arriving.
        if m.end() == data.len() && !at_eof {
            return SplitResult::need_more();
        }

        SplitResult::token(m.end(), &data[..m.end()])
    }))
}

/// Drives a [`SplitFunc`] over an incrementally fed byte buffer
pub struct LineScanner {
    split: SplitFunc,
    buffer: Vec<u8>,
    eof: bool,
    max_token_size: usize,
}

impl LineScanner {
    /// Create a scanner with a token size cap
    ///
    /// When the buffer grows past the cap without producing a token,
    /// the capped prefix is force-emitted so one pathological line
    /// cannot stall the source.
    pub fn new(split: SplitFunc, max_token_size: usize) -> Self {
        Self {
            split,
            buffer: Vec::new(),
            eof: false,
            max_token_size,
        }
    }

    /// Append newly read bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Signal that no more data will arrive
    pub fn finish(&mut self) {
        self.eof = true;
    }

    /// Bytes buffered but not yet emitted as tokens
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered state (after a file truncation)
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.eof = false;
    }

    /// Produce the next token, or `None` until more data arrives
    pub fn next_token(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }

        let result = (self.split)(&self.buffer, self.eof);
        if result.advance > 0 || result.token.is_some() {
            self.buffer.drain(..result.advance);
            return result.token;
        }

        if self.buffer.len() >= self.max_token_size {
            tracing::warn!(
                pending = self.buffer.len(),
                max = self.max_token_size,
                "token exceeds the size cap, splitting it"
            );
            let token: Vec<u8> = self.buffer.drain(..self.max_token_size).collect();
            return Some(token);
        }

        None
    }
}
