mod operators;
mod precedence;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use parley_core::token::dump;
use parley_core::{Anomaly, AnomalyKind, Token, TokenKind, TokenSubkind};

use crate::context::{Context, Declaration};
use crate::object::ObjectRef;
use crate::stack::ensure_sufficient_stack;
use crate::variable::{VarType, Variable};
pub use operators::{BinaryOperator, UnaryOperator};
pub use precedence::Precedence;

/// A half-open range of token positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bounds {
    pub lower: usize,
    pub upper: usize,
}

impl Bounds {
    pub fn new(lower: usize, upper: usize) -> Self {
        Bounds { lower, upper }
    }

    pub fn len(&self) -> usize {
        self.upper.saturating_sub(self.lower)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
enum Resolved {
    Object(ObjectRef),
    /// Nothing is bound to the name yet.
    Placeholder,
}

/// Caches shared by every view of the same token buffer.
#[derive(Debug, Default)]
struct ExpressionState {
    splits: RefCell<HashMap<Bounds, usize>>,
    identifiers: RefCell<HashMap<usize, Resolved>>,
}

/// A view into a shared token buffer that evaluates to an object.
#[derive(Debug, Clone)]
pub struct Expression {
    tokens: Rc<Vec<Token>>,
    bounds: Bounds,
    state: Rc<ExpressionState>,
    checked: Cell<bool>,
}

impl Default for Expression {
    fn default() -> Self {
        Expression::new()
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&dump(self.tokens()))
    }
}

fn grammar(message: impl Into<String>) -> Anomaly {
    Anomaly::new(AnomalyKind::Grammar, message)
}

impl Expression {
    pub fn new() -> Self {
        Expression::from_tokens(Vec::new())
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let bounds = Bounds::new(0, tokens.len());
        Expression {
            tokens: Rc::new(tokens),
            bounds,
            state: Rc::default(),
            checked: Cell::new(false),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens[self.bounds.lower..self.bounds.upper]
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// A sub-range, relative to this view, sharing the buffer and caches.
    pub fn slice(&self, lower: usize, upper: usize) -> Expression {
        let upper = (self.bounds.lower + upper).min(self.bounds.upper);
        let lower = (self.bounds.lower + lower).min(upper);
        Expression {
            tokens: self.tokens.clone(),
            bounds: Bounds::new(lower, upper),
            state: self.state.clone(),
            checked: Cell::new(false),
        }
    }

    /// Appends a token. A buffer shared with other views is copied first.
    pub fn push(&mut self, token: Token) {
        if self.bounds.lower != 0 || self.bounds.upper != self.tokens.len() {
            self.tokens = Rc::new(self.tokens().to_vec());
        }
        Rc::make_mut(&mut self.tokens).push(token);
        self.bounds = Bounds::new(0, self.tokens.len());
        self.state = Rc::default();
        self.checked.set(false);
    }

    pub fn evaluate(&self, ctx: &mut dyn Context) -> Result<ObjectRef, Anomaly> {
        if self.is_empty() {
            return Err(Anomaly::panic("evaluating an empty expression"));
        }
        self.check()?;
        self.state.identifiers.borrow_mut().clear();
        tracing::trace!(expression = %self, "evaluate");
        self.eval(ctx, self.bounds)
    }

    /// Shape rules that hold for every sub-range: balanced parentheses, no
    /// binary operator without a left operand and no dangling operator.
    fn check(&self) -> Result<(), Anomaly> {
        if self.checked.get() {
            return Ok(());
        }
        let tokens = self.tokens();
        let mut depth = 0usize;
        for (position, token) in tokens.iter().enumerate() {
            let previous = position.checked_sub(1).map(|previous| &tokens[previous]);
            match token.kind {
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        Anomaly::new(AnomalyKind::Punctuation, "')' without matching '('")
                    })?;
                    if previous.is_some_and(|previous| previous.kind == TokenKind::Operator) {
                        return Err(grammar(format!(
                            "operator '{}' before ')'",
                            previous.map(Token::render).unwrap_or_default()
                        )));
                    }
                }
                TokenKind::Operator => {
                    let opens = previous.map_or(true, |previous| previous.kind == TokenKind::OpenParen);
                    if opens && token.subkind() == TokenSubkind::Binary {
                        return Err(grammar(format!(
                            "operator '{}' has no left operand",
                            token.render()
                        )));
                    }
                    if position + 1 == tokens.len() {
                        return Err(grammar(format!(
                            "expression ends with operator '{}'",
                            token.render()
                        )));
                    }
                }
                TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::Boolean => {}
                _ => {
                    return Err(grammar(format!(
                        "unexpected '{}' in expression",
                        token.render()
                    )))
                }
            }
        }
        if depth != 0 {
            return Err(Anomaly::new(AnomalyKind::Punctuation, "'(' is never closed"));
        }
        self.checked.set(true);
        Ok(())
    }

    fn eval(&self, ctx: &mut dyn Context, bounds: Bounds) -> Result<ObjectRef, Anomaly> {
        ctx.enter()?;
        let result = ensure_sufficient_stack(|| self.eval_range(ctx, bounds));
        ctx.leave();
        result
    }

    fn eval_range(&self, ctx: &mut dyn Context, bounds: Bounds) -> Result<ObjectRef, Anomaly> {
        let (bounds, stripped) = self.strip_parens(bounds);
        if bounds.is_empty() {
            if stripped {
                return Ok(ObjectRef::constant_list());
            }
            return Err(Anomaly::panic("evaluating an empty sub-expression"));
        }
        if bounds.len() == 1 {
            return self.single(ctx, bounds.lower);
        }

        let split = self.split(ctx, bounds)?;
        let token = &self.tokens[split];
        if token.kind == TokenKind::Identifier {
            return self.call(ctx, bounds, split);
        }
        let left = Bounds::new(bounds.lower, split);
        let right = Bounds::new(split + 1, bounds.upper);
        match token.subkind() {
            TokenSubkind::Unary => self.unary(ctx, token, right),
            TokenSubkind::Binary => self.binary(ctx, token, left, right),
            subkind => Err(Anomaly::panic(format!(
                "split at '{}' with role {subkind:?}",
                token.text
            ))),
        }
    }

    fn matching_paren(&self, open: usize, upper: usize) -> Option<usize> {
        let mut depth = 0usize;
        for position in open..upper {
            match self.tokens[position].kind {
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(position);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn strip_parens(&self, mut bounds: Bounds) -> (Bounds, bool) {
        let mut stripped = false;
        while bounds.len() >= 2
            && self.tokens[bounds.lower].kind == TokenKind::OpenParen
            && self.matching_paren(bounds.lower, bounds.upper) == Some(bounds.upper - 1)
        {
            bounds = Bounds::new(bounds.lower + 1, bounds.upper - 1);
            stripped = true;
        }
        (bounds, stripped)
    }

    fn resolve(&self, ctx: &mut dyn Context, position: usize) -> Result<Resolved, Anomaly> {
        if let Some(resolved) = self.state.identifiers.borrow().get(&position) {
            return Ok(resolved.clone());
        }
        let resolved = match ctx.resolve(&self.tokens[position].text)? {
            Some(object) => Resolved::Object(object),
            None => Resolved::Placeholder,
        };
        self.state
            .identifiers
            .borrow_mut()
            .insert(position, resolved.clone());
        Ok(resolved)
    }

    fn split(&self, ctx: &mut dyn Context, bounds: Bounds) -> Result<usize, Anomaly> {
        if let Some(split) = self.state.splits.borrow().get(&bounds).copied() {
            return Ok(split);
        }
        let mut is_callable = |position: usize| -> Result<bool, Anomaly> {
            Ok(match self.resolve(ctx, position)? {
                Resolved::Object(object) => object.is_callable(),
                Resolved::Placeholder => false,
            })
        };
        let split = precedence::lowest_precedence(&self.tokens, bounds, &mut is_callable)?
            .ok_or_else(|| {
                Anomaly::new(
                    AnomalyKind::NoOperatorFound,
                    format!(
                        "no operator in '{}'",
                        dump(&self.tokens[bounds.lower..bounds.upper])
                    ),
                )
            })?;
        self.state.splits.borrow_mut().insert(bounds, split);
        Ok(split)
    }

    fn single(&self, ctx: &mut dyn Context, position: usize) -> Result<ObjectRef, Anomaly> {
        let token = &self.tokens[position];
        let value = match token.kind {
            TokenKind::Identifier => {
                return match self.resolve(ctx, position)? {
                    Resolved::Object(object) => Ok(object),
                    Resolved::Placeholder => Err(Anomaly::new(
                        AnomalyKind::IdentifierNotFound,
                        format!("'{}' is not declared", token.text),
                    )),
                }
            }
            TokenKind::Number => BigDecimal::from_str(&token.text)
                .map(Variable::number)
                .map_err(|err| {
                    Anomaly::new(
                        AnomalyKind::NoConversion,
                        format!("bad number '{}': {err}", token.text),
                    )
                })?,
            TokenKind::String => Variable::string(&*token.text),
            TokenKind::Boolean => Variable::boolean(&*token.text == "true"),
            TokenKind::Operator => {
                return Err(grammar(format!("operator '{}' without operand", token.text)))
            }
            _ => return Err(grammar(format!("unexpected '{}'", token.render()))),
        };
        Ok(ObjectRef::constant(value))
    }

    /// `left callee right`: the callee gets `right`, then `left` runs for
    /// its side effects.
    fn call(&self, ctx: &mut dyn Context, bounds: Bounds, split: usize) -> Result<ObjectRef, Anomaly> {
        let Resolved::Object(callee) = self.resolve(ctx, split)? else {
            return Err(Anomaly::panic(format!(
                "'{}' was called without being bound",
                self.tokens[split].text
            )));
        };
        let argument = self.eval(ctx, Bounds::new(split + 1, bounds.upper))?;
        tracing::trace!(callee = %callee.name(), "call");
        let result = ctx.call(&callee, argument)?;
        if split > bounds.lower {
            self.eval(ctx, Bounds::new(bounds.lower, split))?;
        }
        Ok(result)
    }

    fn value(&self, ctx: &mut dyn Context, bounds: Bounds) -> Result<Variable, Anomaly> {
        self.eval(ctx, bounds)?.to_variable()
    }

    fn identifier(&self, bounds: Bounds) -> Option<&Token> {
        let token = &self.tokens[bounds.lower];
        (bounds.len() == 1 && token.kind == TokenKind::Identifier).then_some(token)
    }

    fn unary(&self, ctx: &mut dyn Context, token: &Token, operand: Bounds) -> Result<ObjectRef, Anomaly> {
        let operator = UnaryOperator::from_text(&token.text).ok_or_else(|| {
            Anomaly::new(
                AnomalyKind::UndefinedOperator,
                format!("'{}' has no unary form", token.text),
            )
        })?;
        if operand.is_empty() {
            return Err(grammar(format!("'{}' has no operand", token.text)));
        }
        match operator {
            UnaryOperator::Negate => {
                let negated = self.value(ctx, operand)?.negate(ctx.config())?;
                Ok(ObjectRef::constant(negated))
            }
            UnaryOperator::Not => {
                let inverted = self.value(ctx, operand)?.not(ctx.config())?;
                Ok(ObjectRef::constant(inverted))
            }
            UnaryOperator::Declare(declaration) => self.declare(ctx, declaration, token, operand),
            UnaryOperator::Root => {
                let name = match self.identifier(operand) {
                    Some(identifier) => identifier.text.to_string(),
                    None => {
                        let config = ctx.config().clone();
                        self.eval(ctx, operand)?.text(&config)?
                    }
                };
                ctx.root().lookup(&name)?.ok_or_else(|| {
                    Anomaly::new(
                        AnomalyKind::IdentifierNotFound,
                        format!("'::{name}' is not declared"),
                    )
                })
            }
        }
    }

    fn declare(
        &self,
        ctx: &mut dyn Context,
        declaration: Declaration,
        token: &Token,
        operand: Bounds,
    ) -> Result<ObjectRef, Anomaly> {
        let Some(identifier) = self.identifier(operand) else {
            return Err(grammar(format!("'{}' must be followed by a new name", token.text)));
        };
        match self.resolve(ctx, operand.lower)? {
            Resolved::Object(existing) => Err(Anomaly::new(
                AnomalyKind::AlreadyRegistered,
                format!(
                    "'{}' is already declared as {} '{}'",
                    identifier.text,
                    existing.type_name(),
                    existing.full_name()
                ),
            )),
            Resolved::Placeholder => {
                let object = ctx.declare(&identifier.text, declaration)?;
                self.state
                    .identifiers
                    .borrow_mut()
                    .insert(operand.lower, Resolved::Object(object.clone()));
                Ok(object)
            }
        }
    }

    fn binary(
        &self,
        ctx: &mut dyn Context,
        token: &Token,
        left: Bounds,
        right: Bounds,
    ) -> Result<ObjectRef, Anomaly> {
        let operator = BinaryOperator::from_text(&token.text).ok_or_else(|| {
            Anomaly::new(
                AnomalyKind::UndefinedOperator,
                format!("'{}' has no binary form", token.text),
            )
        })?;
        if left.is_empty() {
            return Err(grammar(format!("'{}' has no left operand", token.text)));
        }
        if right.is_empty() {
            return Err(grammar(format!("'{}' has no right operand", token.text)));
        }

        match operator {
            BinaryOperator::And | BinaryOperator::Or => {
                let decisive = operator == BinaryOperator::Or;
                let first = self.value(ctx, left)?.to_bool(ctx.config())?;
                if first == decisive {
                    return Ok(ObjectRef::constant(Variable::boolean(first)));
                }
                let second = self.value(ctx, right)?.to_bool(ctx.config())?;
                Ok(ObjectRef::constant(Variable::boolean(second)))
            }
            BinaryOperator::Arithmetic(arithmetic) => {
                let mut first = self.value(ctx, left)?;
                let mut second = self.value(ctx, right)?;
                let result = first.operate(arithmetic, &mut second, ctx.config())?;
                Ok(ObjectRef::constant(result))
            }
            BinaryOperator::Assign => {
                let target = self.eval(ctx, left)?;
                let value = self.eval(ctx, right)?;
                assign(ctx, target, &value)
            }
            BinaryOperator::CompoundAssign(arithmetic) => {
                let target = self.eval(ctx, left)?;
                let mut second = self.value(ctx, right)?;
                let result = target
                    .to_variable()?
                    .operate(arithmetic, &mut second, ctx.config())?;
                assign(ctx, target, &ObjectRef::constant(result))
            }
            BinaryOperator::Comma => {
                let first = self.eval(ctx, left)?;
                let second = self.eval(ctx, right)?;
                let list = if first.is_list() && first.is_constant() && first.is_temporary() {
                    first
                } else {
                    let list = ObjectRef::constant_list();
                    append(&list, first)?;
                    list
                };
                append(&list, second)?;
                Ok(list)
            }
            BinaryOperator::Member => self.member(ctx, left, right),
            BinaryOperator::ListAccess => {
                let target = self.eval(ctx, left)?;
                let index = self.index(ctx, right)?;
                if target.is_list() {
                    return target.list_get(index, ctx.config().strict_lists);
                }
                if target.is_variable() {
                    let text = target.text(ctx.config())?;
                    return character_at(&text, index);
                }
                Err(Anomaly::new(
                    AnomalyKind::UnsupportedOperation,
                    format!("{} '{}' cannot be indexed", target.type_name(), target.name()),
                ))
            }
            BinaryOperator::ListInsert => {
                let target = self.eval(ctx, left)?;
                let index = self.index(ctx, right)?;
                target.list_insert(index, ctx.config().strict_lists)
            }
            BinaryOperator::ListRemove => {
                let target = self.eval(ctx, left)?;
                let mut key = self.value(ctx, right)?;
                if key.preferred() == VarType::String {
                    let removed = target.list_remove(&key, ctx.config())?;
                    return removed.ok_or_else(|| {
                        Anomaly::new(
                            AnomalyKind::ListIndexOutOfRange,
                            format!("'{}' holds no \"{}\"", target.name(), key.to_text(ctx.config())),
                        )
                    });
                }
                let index = whole_index(&mut key, ctx)?;
                target.list_remove_at(index)
            }
        }
    }

    fn index(&self, ctx: &mut dyn Context, bounds: Bounds) -> Result<i64, Anomaly> {
        let mut value = self.value(ctx, bounds)?;
        whole_index(&mut value, ctx)
    }

    fn member(&self, ctx: &mut dyn Context, left: Bounds, right: Bounds) -> Result<ObjectRef, Anomaly> {
        let Some(member) = self.identifier(right) else {
            return Err(grammar("':' must be followed by a name"));
        };
        let owner = self.eval(ctx, left)?;
        if owner.is_scope() {
            if let Some(found) = owner.lookup(&member.text)? {
                return Ok(found);
            }
        }
        match &*member.text {
            "name" => Ok(ObjectRef::constant(Variable::string(&*owner.name()))),
            "full_name" => Ok(ObjectRef::constant(Variable::string(owner.full_name()))),
            _ if !owner.is_scope() => owner.as_scope(),
            name => Err(Anomaly::new(
                AnomalyKind::IdentifierNotFound,
                format!("'{}' has no member '{name}'", owner.full_name()),
            )),
        }
    }
}

fn whole_index(value: &mut Variable, ctx: &mut dyn Context) -> Result<i64, Anomaly> {
    let number = value.to_number(ctx.config())?;
    number
        .to_i64()
        .filter(|index| BigDecimal::from(*index) == number)
        .ok_or_else(|| {
            Anomaly::new(
                AnomalyKind::NoConversion,
                format!("{number} is not a list index"),
            )
        })
}

fn character_at(text: &str, index: i64) -> Result<ObjectRef, Anomaly> {
    let chars: Vec<char> = text.chars().collect();
    let position = if index < 0 {
        chars.len() as i64 + index
    } else {
        index
    };
    usize::try_from(position)
        .ok()
        .and_then(|position| chars.get(position))
        .map(|ch| ObjectRef::constant(Variable::string(ch.to_string())))
        .ok_or_else(|| {
            Anomaly::new(
                AnomalyKind::ListIndexOutOfRange,
                format!("index {index} is outside \"{text}\""),
            )
        })
}

/// Adds `item` to a list under construction. Temporaries are adopted,
/// anything else is copied.
fn append(list: &ObjectRef, item: ObjectRef) -> Result<(), Anomaly> {
    if item.is_list() {
        for value in item.to_list_items()? {
            list.list_push(value)?;
        }
        return Ok(());
    }
    if item.is_variable() && item.is_temporary() {
        return list.list_push_without_copy(item);
    }
    list.list_push(item.to_variable()?)?;
    Ok(())
}

fn assign(ctx: &mut dyn Context, target: ObjectRef, value: &ObjectRef) -> Result<ObjectRef, Anomaly> {
    if target.is_constant() {
        return Err(Anomaly::new(
            AnomalyKind::ConstAssignment,
            format!("cannot assign to constant {}", describe(&target)),
        ));
    }
    if target.is_list() {
        target.list_assign(value.to_list_items()?)?;
        return Ok(target);
    }
    if !target.is_variable() {
        return Err(Anomaly::new(
            AnomalyKind::UnsupportedOperation,
            format!("cannot assign to {}", describe(&target)),
        ));
    }
    let mut stored = value.to_variable()?;
    if let Some(binding) = target.binding() {
        ctx.store_config(binding, &mut stored)?;
        stored = ctx.config().read(binding);
    }
    target.store(stored)?;
    Ok(target)
}

fn describe(object: &ObjectRef) -> String {
    let name = object.full_name();
    if name.is_empty() {
        format!("{} value", object.type_name())
    } else {
        format!("{} '{name}'", object.type_name())
    }
}
