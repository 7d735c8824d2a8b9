//! Token sequences the lexer substitutes for bracket sugar.
//!
//! | written      | lexed as                        |
//! |--------------|---------------------------------|
//! | `a[i]`       | `a [] ( i )`                    |
//! | `a +[i]`     | `a +[] ( i )`                   |
//! | `a -[i]`     | `a -[] ( i )`                   |
//! | `\|x\|`      | `( x ) : full_name`             |
//! | `` `e` ``    | `output = e ;`                  |

use crate::token::{Token, TokenKind};

/// Spans the lexer keeps open between an opening and a closing character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    List,
    NameOf,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sugar {
    ListAccess,
    ListInsert,
    ListRemove,
    ListClose,
    NameOfOpen,
    NameOfClose,
    OutputOpen,
    OutputClose,
}

fn binary(text: &str, spelling: &'static str) -> Token {
    match Token::operator(text) {
        Some(token) => token.spelled(spelling),
        // every sugar operator is in the binary table
        None => Token::new(TokenKind::Operator, text).spelled(spelling),
    }
}

fn open_paren(spelling: &'static str) -> Token {
    Token::new(TokenKind::OpenParen, "(").spelled(spelling)
}

fn close_paren(spelling: &'static str) -> Token {
    Token::new(TokenKind::CloseParen, ")").spelled(spelling)
}

pub fn desugar(sugar: Sugar) -> Vec<Token> {
    match sugar {
        Sugar::ListAccess => vec![binary("[]", "["), open_paren("")],
        Sugar::ListInsert => vec![binary("+[]", "+["), open_paren("")],
        Sugar::ListRemove => vec![binary("-[]", "-["), open_paren("")],
        Sugar::ListClose => vec![close_paren("]")],
        Sugar::NameOfOpen => vec![open_paren("|")],
        Sugar::NameOfClose => vec![
            close_paren("|"),
            binary(":", ""),
            Token::new(TokenKind::Identifier, "full_name").spelled(""),
        ],
        Sugar::OutputOpen => vec![
            Token::new(TokenKind::Identifier, "output").spelled("`"),
            binary("=", ""),
        ],
        Sugar::OutputClose => vec![Token::new(TokenKind::Terminal, ";").spelled("`")],
    }
}

impl Sugar {
    /// The span a sugar opens, if any.
    pub fn opens(self) -> Option<Span> {
        match self {
            Sugar::ListAccess | Sugar::ListInsert | Sugar::ListRemove => Some(Span::List),
            Sugar::NameOfOpen => Some(Span::NameOf),
            Sugar::OutputOpen => Some(Span::Output),
            _ => None,
        }
    }
}
