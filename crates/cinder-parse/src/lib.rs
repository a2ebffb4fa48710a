#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

mod error;
mod lexer;
mod parser;
mod stream;
mod token;

pub use error::{ParseError, ParseResult};
pub use lexer::{tokenize, Lexer};
pub use parser::{parse_str, parse_tokens, MAX_DEPTH};
pub use stream::TokenStream;
pub use token::{Token, TokenKind};
