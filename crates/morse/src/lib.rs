//! Morse decoding primitives for `headline-extractor`.
//!
//! Records on the headlines topic carry Morse-encoded text: letters are
//! separated by a single space and words by `/`. This crate provides:
//!
//! - The fixed encoding table ([`table`])
//! - The decoder client capability ([`TokenDecoder`]) with a local table
//!   backend, an HTTP backend for the remote translate service, and a
//!   memoizing wrapper
//! - The line decoder that reassembles a plaintext line from a payload
//! - The keyword match filter, which works on encoded text only

pub mod client;
pub mod error;
pub mod filter;
pub mod http;
pub mod line;
pub mod table;

pub use client::{CachedDecoder, LocalDecoder, TokenDecoder};
pub use error::{DecodeError, Result, TransientNetworkError};
pub use filter::MatchFilter;
pub use http::{HttpDecoder, RetryPolicy, TOKEN_QUERY_PARAM};
pub use line::{encode_line, encode_word, tokenize, LineDecoder};
