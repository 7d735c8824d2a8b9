pub mod desugar;

use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{Anomaly, AnomalyKind, ScriptLocation};
use crate::source::{Bookmark, LineSource};
use crate::token::{classify_operator, Token, TokenKind};
use desugar::{desugar, Span, Sugar};

const OPERATOR_CHARS: &str = "+-*/%=<>!&|:,^~?.";

/// Lazy, restartable tokenizer over a [`LineSource`].
///
/// Every token handed out is kept, so positions are token indices and
/// [`Lexer::goto_position`] can jump back to any of them without re-reading
/// text.
pub struct Lexer {
    name: Rc<str>,
    source: Box<dyn LineSource>,
    line: Vec<char>,
    column: usize,
    line_number: usize,
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    pending: VecDeque<Token>,
    pending_line: usize,
    spans: Vec<Span>,
    current_line: usize,
    at_end: bool,
}

impl Lexer {
    pub fn new(name: impl Into<Rc<str>>, source: Box<dyn LineSource>) -> Self {
        Self {
            name: name.into(),
            source,
            line: Vec::new(),
            column: 0,
            line_number: 0,
            tokens: Vec::new(),
            cursor: 0,
            pending: VecDeque::new(),
            pending_line: 0,
            spans: Vec::new(),
            current_line: 0,
            at_end: false,
        }
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn next_token(&mut self) -> Result<Token, Anomaly> {
        if let Some((token, line)) = self.tokens.get(self.cursor) {
            self.cursor += 1;
            self.current_line = *line;
            self.at_end = false;
            return Ok(token.clone());
        }

        if self.pending.is_empty() {
            let produced = self.lex().map_err(|err| {
                err.located(ScriptLocation {
                    source: self.name.clone(),
                    line: self.line_number,
                })
            })?;
            if produced.is_empty() {
                self.at_end = true;
                self.current_line = self.line_number;
                return Ok(Token::end_of_source());
            }
            self.pending.extend(produced);
        }

        match self.pending.pop_front() {
            Some(token) => {
                tracing::trace!(token = %token, line = self.pending_line, "lexed");
                self.tokens.push((token.clone(), self.pending_line));
                self.cursor += 1;
                self.current_line = self.pending_line;
                self.at_end = false;
                Ok(token)
            }
            None => Err(Anomaly::panic("lexer queue drained while non-empty")),
        }
    }

    /// Undoes exactly one [`Lexer::next_token`].
    pub fn push_back(&mut self) -> Result<(), Anomaly> {
        if self.at_end {
            self.at_end = false;
            return Ok(());
        }
        if self.cursor == 0 {
            return Err(Anomaly::panic("push_back before the first token"));
        }
        self.cursor -= 1;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn goto_position(&mut self, position: usize) -> Result<(), Anomaly> {
        if position > self.tokens.len() {
            return Err(Anomaly::panic(format!(
                "position {position} is past the {} tokens read from {}",
                self.tokens.len(),
                self.name
            )));
        }
        self.cursor = position;
        self.at_end = false;
        self.current_line = match position.checked_sub(1) {
            Some(previous) => self.tokens[previous].1,
            None => self.tokens.first().map(|(_, line)| *line).unwrap_or(0),
        };
        Ok(())
    }

    /// Line of the token most recently returned.
    pub fn line_number(&self) -> usize {
        self.current_line
    }

    pub fn bookmark(&self) -> Bookmark {
        Bookmark::new(self.name.clone(), self.cursor, self.current_line)
    }

    pub fn location(&self) -> ScriptLocation {
        ScriptLocation {
            source: self.name.clone(),
            line: self.current_line,
        }
    }

    /// Drops everything not yet consumed, including the rest of the current
    /// raw line. Used by incremental hosts to recover after an error.
    pub fn skip_to_end(&mut self) {
        self.cursor = self.tokens.len();
        self.pending.clear();
        self.spans.clear();
        self.column = self.line.len();
        self.at_end = false;
    }

    fn fill(&mut self) -> Result<bool, Anomaly> {
        while self.column >= self.line.len() {
            let next = self.source.read_line()?;
            if next.is_empty() {
                return Ok(false);
            }
            self.line = next.chars().collect();
            self.column = 0;
            self.line_number += 1;
        }
        Ok(true)
    }

    fn peek(&mut self) -> Result<Option<char>, Anomaly> {
        if self.fill()? {
            Ok(Some(self.line[self.column]))
        } else {
            Ok(None)
        }
    }

    /// Looks ahead within the current line only.
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.line.get(self.column + offset).copied()
    }

    fn bump(&mut self) -> Result<Option<char>, Anomaly> {
        let ch = self.peek()?;
        if ch.is_some() {
            self.column += 1;
        }
        Ok(ch)
    }

    fn skip_whitespace(&mut self) -> Result<(), Anomaly> {
        while let Some(ch) = self.peek()? {
            if !ch.is_whitespace() {
                break;
            }
            self.column += 1;
        }
        Ok(())
    }

    fn skip_trivia(&mut self) -> Result<(), Anomaly> {
        loop {
            self.skip_whitespace()?;
            let Some(ch) = self.peek()? else {
                return Ok(());
            };
            match (ch, self.peek_at(1)) {
                ('/', Some('/')) => self.column = self.line.len(),
                ('/', Some('*')) => self.skip_comment('*', '/')?,
                ('(', Some('*')) => self.skip_comment('*', ')')?,
                ('{', Some('*')) => self.skip_comment('*', '}')?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self, first: char, second: char) -> Result<(), Anomaly> {
        self.column += 2;
        loop {
            match self.bump()? {
                None => {
                    return Err(Anomaly::new(
                        AnomalyKind::EndOfFile,
                        format!("comment not closed with '{first}{second}'"),
                    ))
                }
                Some(ch) if ch == first && self.peek_at(0) == Some(second) => {
                    self.column += 1;
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn sugar(&mut self, sugar: Sugar) -> Vec<Token> {
        if let Some(span) = sugar.opens() {
            self.spans.push(span);
        }
        desugar(sugar)
    }

    fn close_span(&mut self, span: Span, sugar: Sugar, text: char) -> Result<Vec<Token>, Anomaly> {
        match self.spans.last() {
            Some(open) if *open == span => {
                self.spans.pop();
                Ok(desugar(sugar))
            }
            _ => Err(Anomaly::new(
                AnomalyKind::Punctuation,
                format!("'{text}' does not close anything"),
            )),
        }
    }

    /// Reads the tokens for the next significant character. Empty at the end
    /// of the source.
    fn lex(&mut self) -> Result<Vec<Token>, Anomaly> {
        self.skip_trivia()?;
        self.pending_line = self.line_number;

        let Some(ch) = self.peek()? else {
            return match self.spans.last() {
                Some(span) => Err(Anomaly::new(
                    AnomalyKind::Punctuation,
                    format!("{span:?} span still open at end of source"),
                )),
                None => Ok(Vec::new()),
            };
        };

        let single = |kind: TokenKind, text: &str| -> Result<Vec<Token>, Anomaly> {
            Ok(vec![Token::new(kind, text)])
        };
        match (ch, self.peek_at(1)) {
            (';', _) => {
                self.column += 1;
                if self.spans.iter().any(|span| *span != Span::Output) {
                    return Err(Anomaly::new(
                        AnomalyKind::Punctuation,
                        "';' inside an unterminated '[' or '|'",
                    ));
                }
                single(TokenKind::Terminal, ";")
            }
            ('{', _) => {
                self.column += 1;
                single(TokenKind::OpenBrace, "{")
            }
            ('}', _) => {
                self.column += 1;
                single(TokenKind::CloseBrace, "}")
            }
            ('(', _) => {
                self.column += 1;
                single(TokenKind::OpenParen, "(")
            }
            (')', _) => {
                self.column += 1;
                single(TokenKind::CloseParen, ")")
            }
            ('[', _) => {
                self.column += 1;
                Ok(self.sugar(Sugar::ListAccess))
            }
            ('+', Some('[')) => {
                self.column += 2;
                Ok(self.sugar(Sugar::ListInsert))
            }
            ('-', Some('[')) => {
                self.column += 2;
                Ok(self.sugar(Sugar::ListRemove))
            }
            (']', _) => {
                self.column += 1;
                self.close_span(Span::List, Sugar::ListClose, ']')
            }
            ('|', next) if next != Some('|') => {
                self.column += 1;
                if self.spans.last() == Some(&Span::NameOf) {
                    self.close_span(Span::NameOf, Sugar::NameOfClose, '|')
                } else {
                    Ok(self.sugar(Sugar::NameOfOpen))
                }
            }
            ('`', _) => {
                self.column += 1;
                if self.spans.last() == Some(&Span::Output) {
                    self.close_span(Span::Output, Sugar::OutputClose, '`')
                } else {
                    Ok(self.sugar(Sugar::OutputOpen))
                }
            }
            ('"' | '\'', _) => Ok(vec![self.read_string()?]),
            (':', Some(':')) => {
                self.column += 2;
                self.skip_whitespace()?;
                match self.peek()? {
                    Some(ch) if is_name_start(ch) => self.read_compound("::".to_owned()),
                    _ => Ok(vec![unary_root()]),
                }
            }
            (ch, _) if ch.is_ascii_digit() => Ok(vec![self.read_number()]),
            (ch, _) if is_name_start(ch) => self.read_compound(String::new()),
            _ => Ok(vec![self.read_operator()?]),
        }
    }

    fn read_segment(&mut self) -> String {
        let mut segment = String::new();
        while let Some(ch) = self.peek_at(0) {
            if !is_name_char(ch) {
                break;
            }
            segment.push(ch);
            self.column += 1;
        }
        segment
    }

    /// Reads `A::B::C`, one segment at a time, looking across whitespace for
    /// the separator.
    fn read_compound(&mut self, mut text: String) -> Result<Vec<Token>, Anomaly> {
        text.push_str(&self.read_segment());
        let mut compound = !text.is_empty() && text.starts_with("::");
        let mut trailing = Vec::new();
        loop {
            self.skip_whitespace()?;
            if self.peek()? != Some(':') || self.peek_at(1) != Some(':') {
                break;
            }
            self.column += 2;
            self.skip_whitespace()?;
            match self.peek()? {
                Some(ch) if is_name_start(ch) => {
                    text.push_str("::");
                    text.push_str(&self.read_segment());
                    compound = true;
                }
                _ => {
                    trailing.push(unary_root());
                    break;
                }
            }
        }
        let token = if compound {
            Token::new(TokenKind::Identifier, text)
        } else {
            Token::word(&text)
        };
        let mut tokens = vec![token];
        tokens.extend(trailing);
        Ok(tokens)
    }

    fn read_number(&mut self) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek_at(0).filter(char::is_ascii_digit) {
            text.push(ch);
            self.column += 1;
        }
        if self.peek_at(0) == Some('.') && self.peek_at(1).is_some_and(|ch| ch.is_ascii_digit()) {
            text.push('.');
            self.column += 1;
            while let Some(ch) = self.peek_at(0).filter(char::is_ascii_digit) {
                text.push(ch);
                self.column += 1;
            }
        }
        Token::new(TokenKind::Number, text)
    }

    fn read_quoted(&mut self, text: &mut String) -> Result<(), Anomaly> {
        let Some(quote) = self.bump()? else {
            return Err(Anomaly::panic("read_quoted called at end of source"));
        };
        loop {
            match self.bump()? {
                None => {
                    return Err(Anomaly::new(
                        AnomalyKind::EndOfFile,
                        "string literal not terminated",
                    ))
                }
                Some('\\') => match self.bump()? {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(ch) => text.push(ch),
                    None => {
                        return Err(Anomaly::new(
                            AnomalyKind::EndOfFile,
                            "escape at end of source",
                        ))
                    }
                },
                Some(ch) if ch == quote => return Ok(()),
                Some(ch) => text.push(ch),
            }
        }
    }

    /// Adjacent literals are joined into one token.
    fn read_string(&mut self) -> Result<Token, Anomaly> {
        let mut text = String::new();
        loop {
            self.read_quoted(&mut text)?;
            self.skip_whitespace()?;
            if !matches!(self.peek()?, Some('"' | '\'')) {
                break;
            }
        }
        Ok(Token::new(TokenKind::String, text))
    }

    /// Greedy longest match against the operator tables.
    fn read_operator(&mut self) -> Result<Token, Anomaly> {
        for len in (1..=2).rev() {
            let candidate: String = self.line[self.column..].iter().take(len).collect();
            if candidate.chars().count() != len {
                continue;
            }
            if classify_operator(&candidate).is_some() {
                if let Some(token) = Token::operator(&candidate) {
                    self.column += len;
                    return Ok(token);
                }
            }
        }
        let ch = self.line[self.column];
        self.column += 1;
        if OPERATOR_CHARS.contains(ch) {
            Err(Anomaly::new(
                AnomalyKind::UnknownOperator,
                format!("unknown operator '{ch}'"),
            ))
        } else {
            Err(Anomaly::new(
                AnomalyKind::UnknownToken,
                format!("unexpected character '{ch}'"),
            ))
        }
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn unary_root() -> Token {
    Token::operator("::").unwrap_or_else(|| Token::new(TokenKind::Operator, "::"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StringSource;
    use crate::token::{dump, Keyword, TokenSubkind};
    use pretty_assertions::assert_eq;

    fn lexer(input: &str) -> Lexer {
        Lexer::new("test", Box::new(StringSource::new(input)))
    }

    fn lex_all(input: &str) -> Result<Vec<Token>, Anomaly> {
        let mut lexer = lexer(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            if token.kind == TokenKind::EndOfSource {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        lex_all(input)
            .unwrap()
            .into_iter()
            .map(|token| (token.kind, token.text.to_string()))
            .collect()
    }

    fn error_kind(input: &str) -> Option<AnomalyKind> {
        lex_all(input).err().and_then(|err| err.kind())
    }

    #[test]
    fn statement() {
        let expected = vec![
            (TokenKind::Operator, "var".to_owned()),
            (TokenKind::Identifier, "x".to_owned()),
            (TokenKind::Operator, "=".to_owned()),
            (TokenKind::Number, "3".to_owned()),
            (TokenKind::Operator, "+".to_owned()),
            (TokenKind::Number, "4.25".to_owned()),
            (TokenKind::Operator, "*".to_owned()),
            (TokenKind::Number, "2".to_owned()),
            (TokenKind::Terminal, ";".to_owned()),
        ];
        assert_eq!(kinds("var x = 3 + 4.25 * 2;"), expected);
    }

    #[test]
    fn control_flow_keywords() {
        let tokens = kinds("if (a >= 2) do print \"a\"; else { b += 1; }");
        let kinds: Vec<TokenKind> = tokens.into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::CloseParen,
                TokenKind::Keyword(Keyword::Do),
                TokenKind::Identifier,
                TokenKind::String,
                TokenKind::Terminal,
                TokenKind::Keyword(Keyword::Else),
                TokenKind::OpenBrace,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::Terminal,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn all_comment_styles_are_skipped() {
        let input = "// line\n a /* block\n still */ b (* bracket *) c {* other\n style *} d;";
        let texts: Vec<String> = kinds(input).into_iter().map(|(_, text)| text).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d", ";"]);
    }

    #[test]
    fn list_access_desugars() {
        assert_eq!(dump(&lex_all("L[0] = x;").unwrap()), "L [ 0 ] = x ;");
        let texts: Vec<String> = kinds("L[0]").into_iter().map(|(_, text)| text).collect();
        assert_eq!(texts, vec!["L", "[]", "(", "0", ")"]);
        let texts: Vec<String> = kinds("L +[1] = 2; L -[0];")
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        assert_eq!(
            texts,
            vec!["L", "+[]", "(", "1", ")", "=", "2", ";", "L", "-[]", "(", "0", ")", ";"]
        );
    }

    #[test]
    fn name_of_desugars() {
        let texts: Vec<String> = kinds("|Alice|").into_iter().map(|(_, text)| text).collect();
        assert_eq!(texts, vec!["(", "Alice", ")", ":", "full_name"]);
    }

    #[test]
    fn back_quote_desugars_to_output_assignment() {
        let texts: Vec<String> = kinds("`\"Hi!\"`").into_iter().map(|(_, text)| text).collect();
        assert_eq!(texts, vec!["output", "=", "Hi!", ";"]);
    }

    #[test]
    fn strings() {
        assert_eq!(
            kinds(r#""a\"b\\c\n" 'd'   "e""#),
            vec![(TokenKind::String, "a\"b\\c\nde".to_owned())]
        );
        assert_eq!(
            kinds("\"two\nlines\""),
            vec![(TokenKind::String, "two\nlines".to_owned())]
        );
    }

    #[test]
    fn compound_identifiers() {
        assert_eq!(
            kinds("Alice :: Greeting::output;"),
            vec![
                (TokenKind::Identifier, "Alice::Greeting::output".to_owned()),
                (TokenKind::Terminal, ";".to_owned()),
            ]
        );
        assert_eq!(
            kinds("::Chapter::intro"),
            vec![(TokenKind::Identifier, "::Chapter::intro".to_owned())]
        );
        let tokens = lex_all(":: (name)").unwrap();
        assert!(tokens[0].is_operator("::"));
        assert_eq!(tokens[0].subkind(), TokenSubkind::Unary);
    }

    #[test]
    fn greedy_operators() {
        let texts: Vec<String> = kinds("a==-b != c && d || e <= f")
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        assert_eq!(
            texts,
            vec!["a", "==", "-", "b", "!=", "c", "&&", "d", "||", "e", "<=", "f"]
        );
        let minus = &lex_all("-").unwrap()[0];
        assert_eq!(minus.subkind(), TokenSubkind::Ambiguous);
    }

    #[test]
    fn errors() {
        assert_eq!(error_kind("\"open"), Some(AnomalyKind::EndOfFile));
        assert_eq!(error_kind("/* open"), Some(AnomalyKind::EndOfFile));
        assert_eq!(error_kind("a[0;"), Some(AnomalyKind::Punctuation));
        assert_eq!(error_kind("|a;"), Some(AnomalyKind::Punctuation));
        assert_eq!(error_kind("a]"), Some(AnomalyKind::Punctuation));
        assert_eq!(error_kind("a[0"), Some(AnomalyKind::Punctuation));
        assert_eq!(error_kind("a ^ b"), Some(AnomalyKind::UnknownOperator));
        assert_eq!(error_kind("a @ b"), Some(AnomalyKind::UnknownToken));
    }

    #[test]
    fn errors_carry_the_line() {
        let error = lex_all("a;\nb;\n\"open").unwrap_err();
        assert_eq!(error.location().map(|location| location.line), Some(3));
    }

    #[test]
    fn push_back_returns_the_same_token() {
        let mut lexer = lexer("a + b;");
        let first = lexer.next_token().unwrap();
        let second = lexer.next_token().unwrap();
        lexer.push_back().unwrap();
        assert_eq!(lexer.next_token().unwrap(), second);
        assert_ne!(first, second);

        // also at the end of the source
        while lexer.next_token().unwrap().kind != TokenKind::EndOfSource {}
        lexer.push_back().unwrap();
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EndOfSource);
    }

    #[test]
    fn positions_are_token_indices() {
        let mut lexer = lexer("a;\nb;\nc;");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let mark = lexer.position();
        assert_eq!(mark, 2);
        assert_eq!(&*lexer.next_token().unwrap().text, "b");
        assert_eq!(lexer.line_number(), 2);
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        assert_eq!(lexer.line_number(), 3);

        lexer.goto_position(mark).unwrap();
        assert_eq!(&*lexer.next_token().unwrap().text, "b");
        assert_eq!(lexer.line_number(), 2);
        assert!(lexer.goto_position(100).unwrap_err().is_panic());
    }

    #[test]
    fn dump_is_idempotent() {
        let inputs = [
            "var x = 3 + 4 * 2;",
            "L +[0] = \"x\", L[-1] = 'y' \"z\";",
            "`\"Hi \" + |Alice|`",
            "if (a) do print ::Root::b; else -x;",
        ];
        for input in inputs {
            let once = dump(&lex_all(input).unwrap());
            let twice = dump(&lex_all(&once).unwrap());
            assert_eq!(once, twice, "{input}");
        }
    }
}
