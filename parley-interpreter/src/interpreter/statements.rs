use parley_core::{
    Anomaly, AnomalyKind, Bookmark, Keyword, ResultExt, ScriptLocation, Token, TokenKind,
};

use super::Interpreter;
use crate::expression::Expression;
use crate::object::ObjectRef;
use crate::scope::BlockIndex;

/// Why a run of statements stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminator {
    EndOfSource,
    /// A `}` that no statement in the run opened.
    CloseBrace,
}

fn grammar(message: impl Into<String>) -> Anomaly {
    Anomaly::new(AnomalyKind::Grammar, message)
}

fn ends_expression(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Terminal
            | TokenKind::OpenBrace
            | TokenKind::CloseBrace
            | TokenKind::Keyword(_)
            | TokenKind::EndOfSource
    )
}

impl Interpreter {
    /// Runs statements until the source ends or a `}` closes the enclosing
    /// body. With `execute` unset the statements are only consumed.
    pub(super) fn parse_statements(&mut self, execute: bool) -> Result<Terminator, Anomaly> {
        loop {
            if let Some(terminator) = self.parse_statement(execute)? {
                return Ok(terminator);
            }
        }
    }

    fn parse_statement(&mut self, execute: bool) -> Result<Option<Terminator>, Anomaly> {
        let execute = execute && !self.frame.returning;
        let token = self.next_token()?;
        let location = self.lexer()?.location();
        let result = match token.kind {
            TokenKind::EndOfSource => return Ok(Some(Terminator::EndOfSource)),
            TokenKind::CloseBrace => return Ok(Some(Terminator::CloseBrace)),
            TokenKind::Terminal => Ok(()),
            TokenKind::OpenBrace => self.parse_braced(execute),
            TokenKind::Keyword(keyword) => self.parse_keyword(keyword, execute),
            TokenKind::Identifier if self.peek_kind()? == TokenKind::OpenBrace => {
                self.declare_block(&token, execute)
            }
            _ => {
                self.lexer()?.push_back()?;
                self.parse_expression_statement(execute)
            }
        };
        result.at(|| location).map(|()| None)
    }

    fn next_token(&mut self) -> Result<Token, Anomaly> {
        self.lexer()?.next_token()
    }

    fn peek_kind(&mut self) -> Result<TokenKind, Anomaly> {
        let lexer = self.lexer()?;
        let kind = lexer.next_token()?.kind;
        lexer.push_back()?;
        Ok(kind)
    }

    /// The rest of a body whose `{` has been read.
    fn parse_braced(&mut self, execute: bool) -> Result<(), Anomaly> {
        match self.parse_statements(execute)? {
            Terminator::CloseBrace => Ok(()),
            Terminator::EndOfSource => Err(Anomaly::new(
                AnomalyKind::Punctuation,
                "'{' is never closed",
            )),
        }
    }

    /// Exactly one statement, as required after `do`, `then`, `else` or `static`.
    fn parse_single(&mut self, execute: bool, after: &str) -> Result<(), Anomaly> {
        match self.parse_statement(execute)? {
            None => Ok(()),
            Some(_) => Err(grammar(format!("expected a statement after '{after}'"))),
        }
    }

    fn parse_keyword(&mut self, keyword: Keyword, execute: bool) -> Result<(), Anomaly> {
        match keyword {
            Keyword::Static if self.frame.ignore_statics => self.parse_single(false, "static"),
            Keyword::Static => {
                let previous = std::mem::replace(&mut self.frame.static_declaration, true);
                let result = self.parse_single(execute, "static");
                self.frame.static_declaration = previous;
                result
            }
            Keyword::If | Keyword::While => self.parse_conditional(keyword, execute),
            Keyword::Return => self.parse_return(execute),
            Keyword::Else => Err(grammar("'else' without 'if' or 'while'")),
            Keyword::Do | Keyword::Then => Err(grammar(format!(
                "'{}' without a condition",
                keyword.text()
            ))),
        }
    }

    /// Tokens up to the next statement boundary, which is returned too.
    fn read_expression(&mut self) -> Result<(Expression, Token), Anomaly> {
        let mut expression = Expression::new();
        loop {
            let token = self.next_token()?;
            if ends_expression(&token) {
                return Ok((expression, token));
            }
            expression.push(token);
        }
    }

    fn evaluate(
        &mut self,
        expression: &Expression,
        location: &ScriptLocation,
    ) -> Result<ObjectRef, Anomaly> {
        expression.evaluate(self).at(|| location.clone())
    }

    fn parse_expression_statement(&mut self, execute: bool) -> Result<(), Anomaly> {
        let location = self.lexer()?.location();
        let (expression, end) = self.read_expression()?;
        if end.kind != TokenKind::Terminal {
            return Err(grammar(format!(
                "expected ';' after '{expression}', found '{}'",
                end.render()
            )));
        }
        if execute {
            self.evaluate(&expression, &location)?;
        }
        Ok(())
    }

    fn parse_return(&mut self, execute: bool) -> Result<(), Anomaly> {
        let location = self.lexer()?.location();
        let (expression, end) = self.read_expression()?;
        if end.kind != TokenKind::Terminal {
            return Err(grammar("expected ';' after 'return'"));
        }
        if !execute {
            return Ok(());
        }
        let Some(instance) = self.frame.instance.clone() else {
            return Err(grammar("'return' outside a block"));
        };
        if !expression.is_empty() {
            let value = self.evaluate(&expression, &location)?.to_variable()?;
            if let Some(output) = instance.lookup_local("output")? {
                output.store(value)?;
            }
        }
        self.frame.returning = true;
        Ok(())
    }

    /// `if`/`while`, its body and an optional `else`.
    fn parse_conditional(&mut self, keyword: Keyword, execute: bool) -> Result<(), Anomaly> {
        let location = self.lexer()?.location();
        let (condition, introducer) = self.read_expression()?;
        let single = match introducer.kind {
            TokenKind::Keyword(Keyword::Do | Keyword::Then) => true,
            TokenKind::OpenBrace => false,
            _ => {
                return Err(grammar(format!(
                    "expected 'do' or '{{' after the condition of '{}'",
                    keyword.text()
                )))
            }
        };
        if condition.is_empty() {
            return Err(grammar(format!("'{}' without a condition", keyword.text())));
        }

        let ran = if keyword == Keyword::While {
            let body = self.lexer()?.position();
            let mut ran = false;
            while execute && !self.frame.returning && self.holds(&condition, &location)? {
                ran = true;
                self.lexer()?.goto_position(body)?;
                self.parse_body(single, true)?;
            }
            self.lexer()?.goto_position(body)?;
            self.parse_body(single, false)?;
            ran
        } else {
            let holds = execute && self.holds(&condition, &location)?;
            self.parse_body(single, holds)?;
            holds
        };

        if self.peek_kind()? == TokenKind::Keyword(Keyword::Else) {
            self.next_token()?;
            self.parse_else(execute && !ran)?;
        }
        Ok(())
    }

    fn holds(&mut self, condition: &Expression, location: &ScriptLocation) -> Result<bool, Anomaly> {
        let value = self.evaluate(condition, location)?;
        value.to_variable()?.to_bool(&self.config).at(|| location.clone())
    }

    fn parse_body(&mut self, single: bool, execute: bool) -> Result<(), Anomaly> {
        if single {
            self.parse_single(execute, "do")
        } else {
            self.parse_braced(execute)
        }
    }

    fn parse_else(&mut self, execute: bool) -> Result<(), Anomaly> {
        match self.peek_kind()? {
            TokenKind::Keyword(Keyword::Do | Keyword::Then) => {
                self.next_token()?;
                self.parse_single(execute, "else")
            }
            _ => self.parse_single(execute, "else"),
        }
    }

    /// `Name { ... }`: registers the block and skips its body, which only
    /// runs when the block is invoked.
    fn declare_block(&mut self, name: &Token, execute: bool) -> Result<(), Anomaly> {
        self.next_token()?;
        let bookmark = self.lexer()?.bookmark();
        if execute {
            self.register_block(&name.text, bookmark)?;
        }
        self.parse_braced(false)
    }

    fn register_block(&mut self, name: &str, bookmark: Bookmark) -> Result<(), Anomaly> {
        let (owner, leaf) = match name.rsplit_once("::") {
            Some((owner, leaf)) => (self.scope_named(owner)?, leaf),
            None => (
                self.frame
                    .static_scope
                    .clone()
                    .unwrap_or_else(|| self.root.clone()),
                name,
            ),
        };
        if let Some(existing) = owner.lookup_local(leaf)? {
            // a body declaring a block runs again on every call
            if existing.is_block() && existing.with_block(|block| block.bookmark == bookmark)? {
                return Ok(());
            }
            return Err(Anomaly::new(
                AnomalyKind::AlreadyRegistered,
                format!(
                    "'{leaf}' is already declared as {} '{}'",
                    existing.type_name(),
                    existing.full_name()
                ),
            ));
        }
        let block = ObjectRef::block(leaf, bookmark, BlockIndex(self.blocks.len()))?;
        owner.register(block.clone())?;
        tracing::debug!(block = %block.full_name(), "declared block");
        self.blocks.push(block);
        Ok(())
    }
}
