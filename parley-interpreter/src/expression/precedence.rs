use parley_core::{Anomaly, Token, TokenKind, TokenSubkind};

use super::operators::BinaryOperator;
use super::Bounds;
use crate::variable::Arithmetic;

/// Binding strength, weakest first. The weakest operator of a range is the
/// one evaluated last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    Comma,
    Assignment,
    Or,
    And,
    Comparison,
    Unary,
    Additive,
    Multiplicative,
    Call,
    Member,
}

impl Precedence {
    pub fn of_binary(operator: BinaryOperator) -> Self {
        match operator {
            BinaryOperator::Comma => Precedence::Comma,
            BinaryOperator::Assign | BinaryOperator::CompoundAssign(_) => Precedence::Assignment,
            BinaryOperator::Or => Precedence::Or,
            BinaryOperator::And => Precedence::And,
            BinaryOperator::Arithmetic(arithmetic) => match arithmetic {
                Arithmetic::Add | Arithmetic::Sub => Precedence::Additive,
                Arithmetic::Mul | Arithmetic::Div | Arithmetic::Rem => Precedence::Multiplicative,
                _ => Precedence::Comparison,
            },
            BinaryOperator::Member
            | BinaryOperator::ListAccess
            | BinaryOperator::ListInsert
            | BinaryOperator::ListRemove => Precedence::Member,
        }
    }

    /// On a tie a later operator replaces an earlier one (`<=`), unless the
    /// rung keeps the first one found (`<`).
    pub fn last_wins(self) -> bool {
        !matches!(
            self,
            Precedence::Assignment | Precedence::Unary | Precedence::Call
        )
    }
}

fn closes_operand(token: &Token) -> bool {
    !matches!(token.kind, TokenKind::Operator | TokenKind::OpenParen)
}

/// Finds the operator that splits `bounds` into its outermost operands.
///
/// Ambiguous operators are settled on the way: unary at the start of the
/// range or after an operator, a callable or `(`; binary otherwise.
/// `is_callable` is asked about identifiers that are in a position to be
/// called.
pub fn lowest_precedence(
    tokens: &[Token],
    bounds: Bounds,
    is_callable: &mut dyn FnMut(usize) -> Result<bool, Anomaly>,
) -> Result<Option<usize>, Anomaly> {
    let mut best: Option<(usize, Precedence)> = None;
    let mut depth = 0usize;
    let mut unary_context = true;

    let mut consider = |position: usize, precedence: Precedence| {
        let replace = match best {
            None => true,
            Some((_, current)) => {
                precedence < current || (precedence == current && precedence.last_wins())
            }
        };
        if replace {
            best = Some((position, precedence));
        }
    };

    for position in bounds.lower..bounds.upper {
        let token = &tokens[position];
        match token.kind {
            TokenKind::OpenParen => {
                depth += 1;
                unary_context = true;
                continue;
            }
            TokenKind::CloseParen => {
                depth = depth.saturating_sub(1);
                unary_context = false;
                continue;
            }
            _ => {}
        }
        if depth > 0 {
            unary_context = token.kind == TokenKind::Operator;
            continue;
        }

        match token.kind {
            TokenKind::Operator => {
                match token.settle(unary_context) {
                    TokenSubkind::Unary if position == bounds.lower => {
                        consider(position, Precedence::Unary)
                    }
                    TokenSubkind::Binary => {
                        if let Some(operator) = BinaryOperator::from_text(&token.text) {
                            consider(position, Precedence::of_binary(operator));
                        }
                    }
                    _ => {}
                }
                unary_context = true;
            }
            TokenKind::Identifier => {
                let next = tokens.get(position + 1).filter(|_| position + 1 < bounds.upper);
                let in_call_position = match next {
                    None => false,
                    Some(next) => {
                        next.kind != TokenKind::CloseParen
                            && !(next.kind == TokenKind::Operator
                                && next.subkind() == TokenSubkind::Binary)
                    }
                };
                if in_call_position && is_callable(position)? {
                    consider(position, Precedence::Call);
                    unary_context = true;
                } else {
                    unary_context = false;
                }
            }
            _ => unary_context = !closes_operand(token),
        }
    }

    Ok(best.map(|(position, _)| position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{Lexer, StringSource};

    fn lex(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new("test", Box::new(StringSource::new(input)));
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::EndOfSource {
                return tokens;
            }
            tokens.push(token);
        }
    }

    /// Text of the splitting token, treating `callables` as callable names.
    fn split(input: &str, callables: &[&str]) -> Option<String> {
        let tokens = lex(input);
        let bounds = Bounds::new(0, tokens.len());
        let names: Vec<String> = tokens.iter().map(|token| token.text.to_string()).collect();
        let mut is_callable = |position: usize| Ok(callables.contains(&names[position].as_str()));
        lowest_precedence(&tokens, bounds, &mut is_callable)
            .unwrap()
            .map(|position| format!("{}@{position}", tokens[position].text))
    }

    #[test]
    fn arithmetic() {
        assert_eq!(split("3 + 4 * 2", &[]).as_deref(), Some("+@1"));
        assert_eq!(split("3 * 4 + 2", &[]).as_deref(), Some("+@3"));
        // left grouping
        assert_eq!(split("8 - 4 - 2", &[]).as_deref(), Some("-@3"));
    }

    #[test]
    fn assignment_groups_right_and_comma_is_weakest() {
        assert_eq!(split("a = b = c", &[]).as_deref(), Some("=@1"));
        assert_eq!(split("a = 1, b = 2", &[]).as_deref(), Some(",@3"));
        assert_eq!(split("var x = 3 + 4", &[]).as_deref(), Some("=@2"));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(split("-a + b", &[]).as_deref(), Some("-@0"));
        assert_eq!(split("a + -b", &[]).as_deref(), Some("+@1"));
        assert_eq!(split("not a == b", &[]).as_deref(), Some("==@2"));
        let tokens = lex("a - -b");
        let bounds = Bounds::new(0, tokens.len());
        lowest_precedence(&tokens, bounds, &mut |_| Ok(false)).unwrap();
        assert_eq!(tokens[1].subkind(), TokenSubkind::Binary);
        assert_eq!(tokens[2].subkind(), TokenSubkind::Unary);
    }

    #[test]
    fn parentheses_are_skipped() {
        assert_eq!(split("(a + b) * c", &[]).as_deref(), Some("*@5"));
        assert_eq!(split("a b", &[]), None);
    }

    #[test]
    fn callables() {
        assert_eq!(split("print x", &["print"]).as_deref(), Some("print@0"));
        assert_eq!(split("print L[0]", &["print"]).as_deref(), Some("print@0"));
        assert_eq!(split("print -x", &["print"]).as_deref(), Some("print@0"));
        assert_eq!(split("a print b", &["print"]).as_deref(), Some("print@1"));
        // a callable that cannot take an argument is a plain value
        assert_eq!(split("f + 1", &["f"]).as_deref(), Some("+@1"));
        assert_eq!(split("x = f", &["f"]).as_deref(), Some("=@1"));
    }

    #[test]
    fn member_access_binds_tightest() {
        assert_eq!(split("Alice:mood + 1", &[]).as_deref(), Some("+@3"));
        assert_eq!(split("L[0]", &[]).as_deref(), Some("[]@1"));
    }
}
