pub mod error;
pub mod lexer;
pub mod source;
pub mod token;

pub use error::{Anomaly, AnomalyKind, ResultExt, ScriptLocation};
pub use lexer::Lexer;
pub use source::{Bookmark, FileSource, LineSource, SharedSource, StringSource};
pub use token::{Keyword, Token, TokenKind, TokenSubkind};
