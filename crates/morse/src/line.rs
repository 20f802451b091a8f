//! Line decoding: payload -> word groups -> tokens -> plaintext line.
//!
//! A payload separates tokens with one delimiter (a space) and words with
//! `/`. The word separator is treated as a doubled delimiter, which makes the
//! whole format expressible as one rule: a run of exactly one delimiter ends
//! a token, a run of two ends a word, anything longer is absorbed.

use crate::client::TokenDecoder;
use crate::error::{DecodeError, Result};
use crate::table;

/// Separates tokens (letters) inside a word.
pub const LETTER_DELIMITER: char = ' ';

/// Separates words. Equivalent to two letter delimiters.
pub const WORD_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Reading the characters of a token
    InToken,
    /// One delimiter seen since the last token; the token is complete
    AfterOneDelim,
    /// Two or more delimiters seen; the word is complete
    AfterTwoDelim,
}

struct Scanner<'a> {
    payload: &'a str,
    state: ScanState,
    token_start: usize,
    word: Vec<&'a str>,
    words: Vec<Vec<&'a str>>,
}

impl<'a> Scanner<'a> {
    fn new(payload: &'a str) -> Self {
        Self {
            payload,
            // Leading delimiters must not produce empty tokens or words.
            state: ScanState::AfterTwoDelim,
            token_start: 0,
            word: Vec::new(),
            words: Vec::new(),
        }
    }

    fn symbol(&mut self, at: usize) {
        if self.state != ScanState::InToken {
            self.token_start = at;
            self.state = ScanState::InToken;
        }
    }

    fn delimiter(&mut self, at: usize) {
        match self.state {
            ScanState::InToken => {
                let payload = self.payload;
                self.word.push(&payload[self.token_start..at]);
                self.state = ScanState::AfterOneDelim;
            }
            ScanState::AfterOneDelim => {
                self.end_word();
                self.state = ScanState::AfterTwoDelim;
            }
            ScanState::AfterTwoDelim => {}
        }
    }

    fn end_word(&mut self) {
        if !self.word.is_empty() {
            self.words.push(std::mem::take(&mut self.word));
        }
    }

    fn finish(mut self) -> Vec<Vec<&'a str>> {
        let end = self.payload.len();
        self.delimiter(end);
        self.delimiter(end);
        self.words
    }
}

/// Split a payload into word groups of morse tokens.
///
/// Any whitespace counts as a letter delimiter; `/` counts as two.
pub fn tokenize(payload: &str) -> Vec<Vec<&str>> {
    let mut scanner = Scanner::new(payload);
    for (at, c) in payload.char_indices() {
        if c == WORD_SEPARATOR {
            scanner.delimiter(at);
            scanner.delimiter(at);
        } else if c == LETTER_DELIMITER || c.is_whitespace() {
            scanner.delimiter(at);
        } else {
            scanner.symbol(at);
        }
    }
    scanner.finish()
}

/// Encode one word (no whitespace) as space-separated morse tokens.
pub fn encode_word(word: &str) -> Result<String> {
    let tokens = word
        .chars()
        .map(|c| table::encode_char(c).ok_or(DecodeError::Unencodable(c)))
        .collect::<Result<Vec<_>>>()?;
    Ok(tokens.join(" "))
}

/// Encode a plaintext line in the topic's payload format.
pub fn encode_line(text: &str) -> Result<String> {
    let words = text
        .split_whitespace()
        .map(encode_word)
        .collect::<Result<Vec<_>>>()?;
    Ok(words.join("/"))
}

/// Reassembles plaintext lines, resolving each token through a [`TokenDecoder`].
pub struct LineDecoder<D> {
    client: D,
}

impl<D: TokenDecoder> LineDecoder<D> {
    pub fn new(client: D) -> Self {
        Self { client }
    }

    /// Decode a payload into a line of words joined by single spaces.
    ///
    /// Fails on the first token the client cannot resolve.
    pub async fn decode(&self, payload: &str) -> Result<String> {
        let words = tokenize(payload);
        if words.is_empty() {
            return Err(DecodeError::Malformed(
                "payload contains no morse tokens".to_string(),
            ));
        }

        let mut line = String::with_capacity(payload.len() / 3);
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            for token in word {
                line.push_str(&self.client.decode_token(token).await?);
            }
        }
        Ok(line)
    }

    pub async fn decode_bytes(&self, payload: &[u8]) -> Result<String> {
        let payload = std::str::from_utf8(payload)?;
        self.decode(payload).await
    }
}
