use crate::context::Declaration;
use crate::variable::Arithmetic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
    Declare(Declaration),
    /// `:: name`, a lookup starting at the root scope.
    Root,
}

impl UnaryOperator {
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "-" => Some(UnaryOperator::Negate),
            "!" | "not" => Some(UnaryOperator::Not),
            "::" => Some(UnaryOperator::Root),
            _ => Declaration::from_keyword(text).map(UnaryOperator::Declare),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Arithmetic(Arithmetic),
    Assign,
    CompoundAssign(Arithmetic),
    And,
    Or,
    /// The list builder.
    Comma,
    /// `scope : name`
    Member,
    ListAccess,
    ListInsert,
    ListRemove,
}

impl BinaryOperator {
    pub fn from_text(text: &str) -> Option<Self> {
        let operator = match text {
            "+" => BinaryOperator::Arithmetic(Arithmetic::Add),
            "-" => BinaryOperator::Arithmetic(Arithmetic::Sub),
            "*" => BinaryOperator::Arithmetic(Arithmetic::Mul),
            "/" => BinaryOperator::Arithmetic(Arithmetic::Div),
            "%" => BinaryOperator::Arithmetic(Arithmetic::Rem),
            "==" => BinaryOperator::Arithmetic(Arithmetic::Eq),
            "!=" => BinaryOperator::Arithmetic(Arithmetic::Ne),
            "<" => BinaryOperator::Arithmetic(Arithmetic::Lt),
            ">" => BinaryOperator::Arithmetic(Arithmetic::Gt),
            "<=" => BinaryOperator::Arithmetic(Arithmetic::Le),
            ">=" => BinaryOperator::Arithmetic(Arithmetic::Ge),
            "=" => BinaryOperator::Assign,
            "+=" => BinaryOperator::CompoundAssign(Arithmetic::Add),
            "-=" => BinaryOperator::CompoundAssign(Arithmetic::Sub),
            "*=" => BinaryOperator::CompoundAssign(Arithmetic::Mul),
            "/=" => BinaryOperator::CompoundAssign(Arithmetic::Div),
            "%=" => BinaryOperator::CompoundAssign(Arithmetic::Rem),
            "&&" | "and" => BinaryOperator::And,
            "||" | "or" => BinaryOperator::Or,
            "," => BinaryOperator::Comma,
            ":" => BinaryOperator::Member,
            "[]" => BinaryOperator::ListAccess,
            "+[]" => BinaryOperator::ListInsert,
            "-[]" => BinaryOperator::ListRemove,
            _ => return None,
        };
        Some(operator)
    }
}
