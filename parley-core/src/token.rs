use std::cell::Cell;
use std::fmt::Display;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    If,
    While,
    Else,
    Do,
    Then,
    Static,
    Return,
}

impl Keyword {
    pub fn text(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::While => "while",
            Keyword::Else => "else",
            Keyword::Do => "do",
            Keyword::Then => "then",
            Keyword::Static => "static",
            Keyword::Return => "return",
        }
    }
}

fn keywords(word: &str) -> Option<Keyword> {
    match word {
        "if" => Some(Keyword::If),
        "while" => Some(Keyword::While),
        "else" => Some(Keyword::Else),
        "do" => Some(Keyword::Do),
        "then" => Some(Keyword::Then),
        "static" => Some(Keyword::Static),
        "return" => Some(Keyword::Return),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Terminal,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Operator,
    Keyword(Keyword),
    Identifier,
    Number,
    String,
    Boolean,
    EndOfSource,
}

/// Role of an operator token. `Ambiguous` is settled on first inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubkind {
    Plain,
    Unary,
    Binary,
    Ambiguous,
}

pub const UNARY_OPERATORS: &[&str] = &["-", "!", "::", "not", "var", "list", "character", "player"];

pub const BINARY_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "=", "+=", "-=", "*=", "/=", "%=", "==", "!=", "<", ">", "<=", ">=",
    "&&", "||", ",", ":", "and", "or", "[]", "+[]", "-[]",
];

/// Unary, binary or both. `None` when neither table knows the text.
pub fn classify_operator(text: &str) -> Option<TokenSubkind> {
    let unary = UNARY_OPERATORS.contains(&text);
    let binary = BINARY_OPERATORS.contains(&text);
    match (unary, binary) {
        (true, true) => Some(TokenSubkind::Ambiguous),
        (true, false) => Some(TokenSubkind::Unary),
        (false, true) => Some(TokenSubkind::Binary),
        (false, false) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: Rc<str>,
    pub kind: TokenKind,
    subkind: Cell<TokenSubkind>,
    /// How the token was written, when that differs from `text`.
    /// An empty spelling marks a token the lexer synthesized.
    spelling: Option<&'static str>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<Rc<str>>) -> Self {
        Token {
            text: text.into(),
            kind,
            subkind: Cell::new(TokenSubkind::Plain),
            spelling: None,
        }
    }

    /// Word operators go through here too, so they are classified the same way.
    pub fn operator(text: &str) -> Option<Self> {
        let subkind = classify_operator(text)?;
        Some(Token {
            text: text.into(),
            kind: TokenKind::Operator,
            subkind: Cell::new(subkind),
            spelling: None,
        })
    }

    pub fn word(word: &str) -> Self {
        if let Some(keyword) = keywords(word) {
            return Token::new(TokenKind::Keyword(keyword), word);
        }
        if word == "true" || word == "false" {
            return Token::new(TokenKind::Boolean, word);
        }
        Token::operator(word).unwrap_or_else(|| Token::new(TokenKind::Identifier, word))
    }

    pub fn end_of_source() -> Self {
        Token::new(TokenKind::EndOfSource, "")
    }

    pub fn spelled(mut self, spelling: &'static str) -> Self {
        self.spelling = Some(spelling);
        self
    }

    pub fn subkind(&self) -> TokenSubkind {
        self.subkind.get()
    }

    /// Fixes the role of an ambiguous operator the first time its context is
    /// known. Later calls return the stored role unchanged.
    pub fn settle(&self, unary_context: bool) -> TokenSubkind {
        if self.subkind.get() == TokenSubkind::Ambiguous {
            let role = if unary_context {
                TokenSubkind::Unary
            } else {
                TokenSubkind::Binary
            };
            tracing::trace!(text = %self.text, ?role, "settled ambiguous operator");
            self.subkind.set(role);
        }
        self.subkind.get()
    }

    pub fn is_operator(&self, text: &str) -> bool {
        self.kind == TokenKind::Operator && &*self.text == text
    }

    pub fn is_synthetic(&self) -> bool {
        self.spelling == Some("")
    }

    /// Source form of the token, used when dumping token streams in errors.
    pub fn render(&self) -> String {
        if let Some(spelling) = self.spelling {
            return spelling.to_owned();
        }
        match self.kind {
            TokenKind::String => {
                let mut out = String::with_capacity(self.text.len() + 2);
                out.push('"');
                for ch in self.text.chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        ch => out.push(ch),
                    }
                }
                out.push('"');
                out
            }
            _ => self.text.to_string(),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Space separated source form of a token stream. Synthesized tokens are left
/// out, so dumping and re-lexing is stable.
pub fn dump(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|token| token.kind != TokenKind::EndOfSource)
        .map(Token::render)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minus_is_ambiguous_until_settled() {
        let minus = Token::operator("-").unwrap();
        assert_eq!(minus.subkind(), TokenSubkind::Ambiguous);
        assert_eq!(minus.settle(true), TokenSubkind::Unary);
        // the first decision sticks
        assert_eq!(minus.settle(false), TokenSubkind::Unary);
    }

    #[test]
    fn words() {
        assert_eq!(Token::word("while").kind, TokenKind::Keyword(Keyword::While));
        assert_eq!(Token::word("true").kind, TokenKind::Boolean);
        assert_eq!(Token::word("var").subkind(), TokenSubkind::Unary);
        assert_eq!(Token::word("and").subkind(), TokenSubkind::Binary);
        assert_eq!(Token::word("Alice").kind, TokenKind::Identifier);
    }

    #[test]
    fn unknown_operator_text() {
        assert!(Token::operator("=>").is_none());
        assert_eq!(classify_operator("+[]"), Some(TokenSubkind::Binary));
    }

    #[test]
    fn dump_skips_synthetic_tokens() {
        let tokens = vec![
            Token::new(TokenKind::Identifier, "a"),
            Token::operator("[]").unwrap().spelled("["),
            Token::new(TokenKind::OpenParen, "(").spelled(""),
            Token::new(TokenKind::String, "say \"hi\""),
            Token::new(TokenKind::CloseParen, ")").spelled("]"),
        ];
        assert_eq!(dump(&tokens), r#"a [ "say \"hi\"" ]"#);
    }
}
