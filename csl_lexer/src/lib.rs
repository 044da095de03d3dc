//! Lexical analyzer for the CSL language
//!
//! Tokenizes CSL source by greedy longest-match against an ordered set of
//! regular patterns, with a token queue providing arbitrary lookahead.
//! Also home to the token model shared by the rest of the compiler:
//! value types, operators and keyword tables.

pub mod keyword;
pub mod lexer;
pub mod op;
pub mod reader;
pub mod token;
pub mod value;

pub use keyword::*;
pub use lexer::*;
pub use op::*;
pub use reader::*;
pub use token::*;
pub use value::*;
