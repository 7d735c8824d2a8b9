use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use parley_core::{Anomaly, AnomalyKind, Bookmark};

use crate::config::{ConfigBinding, InterpreterConfig};
use crate::context::Context;
use crate::list::List;
use crate::scope::{Block, BlockIndex, Scope, ScopeRole};
use crate::variable::Variable;

pub type WeakObject = Weak<RefCell<ScopeObject>>;

#[allow(clippy::type_complexity)]
pub type NativeFn = fn(&mut dyn Context, ObjectRef) -> Result<ObjectRef, Anomaly>;

#[derive(Clone, Copy)]
pub struct Operator {
    pub func: NativeFn,
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("ptr", &(self.func as usize))
            .finish()
    }
}

#[derive(Debug)]
pub enum ObjectKind {
    Scope(Scope),
    Variable(Variable),
    List(List),
    Block(Block),
    Operator(Operator),
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Scope(scope) => match scope.role {
                ScopeRole::Character => "character",
                ScopeRole::Player => "player",
                _ => "scope",
            },
            ObjectKind::Variable(_) => "variable",
            ObjectKind::List(_) => "list",
            ObjectKind::Block(_) => "block",
            ObjectKind::Operator(_) => "operator",
        }
    }

    /// Blocks are scopes too.
    pub fn scope(&self) -> Option<&Scope> {
        match self {
            ObjectKind::Scope(scope) => Some(scope),
            ObjectKind::Block(block) => Some(&block.scope),
            _ => None,
        }
    }

    pub fn scope_mut(&mut self) -> Option<&mut Scope> {
        match self {
            ObjectKind::Scope(scope) => Some(scope),
            ObjectKind::Block(block) => Some(&mut block.scope),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ScopeObject {
    pub(crate) name: Rc<str>,
    pub(crate) constant: bool,
    pub(crate) parent: Option<WeakObject>,
    /// Set for the configuration variables of the root scope.
    pub(crate) binding: Option<ConfigBinding>,
    pub(crate) kind: ObjectKind,
}

/// Shared handle to a node of the object graph.
///
/// Parents own their members through these handles. Back references
/// (parents, imports) are weak.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ScopeObject>>);

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "{}({:?})", object.kind.type_name(), object.name),
            Err(_) => f.write_str("<in use>"),
        }
    }
}

impl ObjectRef {
    pub(crate) fn new(name: &str, kind: ObjectKind) -> Self {
        ObjectRef(Rc::new(RefCell::new(ScopeObject {
            name: name.into(),
            constant: false,
            parent: None,
            binding: None,
            kind,
        })))
    }

    pub fn scope(name: &str, role: ScopeRole) -> Self {
        ObjectRef::new(name, ObjectKind::Scope(Scope::new(role)))
    }

    pub fn variable(name: &str, value: Variable) -> Self {
        ObjectRef::new(name, ObjectKind::Variable(value))
    }

    /// An unnamed, read-only value such as a literal or an operator result.
    pub fn constant(value: Variable) -> Self {
        let object = ObjectRef::variable("", value);
        object.set_constant(true);
        object
    }

    pub fn list(name: &str) -> Self {
        ObjectRef::new(name, ObjectKind::List(List::default()))
    }

    pub fn constant_list() -> Self {
        let object = ObjectRef::list("");
        object.set_constant(true);
        object
    }

    pub fn operator(name: &str, func: NativeFn) -> Self {
        let object = ObjectRef::new(name, ObjectKind::Operator(Operator { func }));
        object.set_constant(true);
        object
    }

    /// A block with its `input`, `output` and `next_block` members.
    pub fn block(name: &str, bookmark: Bookmark, index: BlockIndex) -> Result<Self, Anomaly> {
        let block = ObjectRef::new(name, ObjectKind::Block(Block::new(bookmark, index)));
        block.register(ObjectRef::list("input"))?;
        block.register(ObjectRef::variable("output", Variable::string("")))?;
        block.register(ObjectRef::list("next_block"))?;
        Ok(block)
    }

    pub fn bound(binding: ConfigBinding, value: Variable) -> Self {
        let object = ObjectRef::variable(binding.name(), value);
        object.0.borrow_mut().binding = Some(binding);
        object
    }

    pub(crate) fn borrow(&self) -> Ref<'_, ScopeObject> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, ScopeObject> {
        self.0.borrow_mut()
    }

    pub fn downgrade(&self) -> WeakObject {
        Rc::downgrade(&self.0)
    }

    pub fn upgrade(weak: &WeakObject) -> Option<Self> {
        weak.upgrade().map(ObjectRef)
    }

    pub fn name(&self) -> Rc<str> {
        self.0.borrow().name.clone()
    }

    pub fn parent(&self) -> Option<ObjectRef> {
        self.0.borrow().parent.as_ref().and_then(ObjectRef::upgrade)
    }

    /// Names from the outermost named scope down to this object, joined
    /// with `::`.
    pub fn full_name(&self) -> String {
        let mut names = vec![self.name()];
        let mut current = self.parent();
        while let Some(object) = current {
            if matches!(object.role(), Some(ScopeRole::Root | ScopeRole::File)) {
                break;
            }
            names.push(object.name());
            current = object.parent();
        }
        names
            .iter()
            .rev()
            .filter(|name| !name.is_empty())
            .map(|name| &**name)
            .collect::<Vec<_>>()
            .join("::")
    }

    pub fn is_constant(&self) -> bool {
        self.0.borrow().constant
    }

    pub fn set_constant(&self, constant: bool) {
        self.0.borrow_mut().constant = constant;
    }

    /// Unnamed and unowned: produced by evaluation, safe to adopt without copying.
    pub fn is_temporary(&self) -> bool {
        let object = self.0.borrow();
        object.name.is_empty() && object.parent.is_none()
    }

    pub fn binding(&self) -> Option<ConfigBinding> {
        self.0.borrow().binding
    }

    pub fn type_name(&self) -> &'static str {
        self.0.borrow().kind.type_name()
    }

    pub fn role(&self) -> Option<ScopeRole> {
        self.0.borrow().kind.scope().map(|scope| scope.role)
    }

    pub fn is_scope(&self) -> bool {
        self.0.borrow().kind.scope().is_some()
    }

    pub fn is_block(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Block(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::List(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Variable(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.0.borrow().kind,
            ObjectKind::Operator(_) | ObjectKind::Block(_)
        )
    }

    pub fn native(&self) -> Option<NativeFn> {
        match &self.0.borrow().kind {
            ObjectKind::Operator(operator) => Some(operator.func),
            _ => None,
        }
    }

    pub fn as_scope(&self) -> Result<ObjectRef, Anomaly> {
        if self.is_scope() {
            Ok(self.clone())
        } else {
            Err(Anomaly::new(
                AnomalyKind::NotAScope,
                format!("{} '{}' is not a scope", self.type_name(), self.name()),
            ))
        }
    }

    pub fn as_block(&self) -> Result<ObjectRef, Anomaly> {
        if self.is_block() {
            Ok(self.clone())
        } else {
            Err(Anomaly::new(
                AnomalyKind::NoConversion,
                format!("{} '{}' is not a block", self.type_name(), self.name()),
            ))
        }
    }

    pub fn with_block<R>(&self, f: impl FnOnce(&mut Block) -> R) -> Result<R, Anomaly> {
        match &mut self.0.borrow_mut().kind {
            ObjectKind::Block(block) => Ok(f(block)),
            _ => Err(Anomaly::panic(format!("'{}' is not a block", self.name()))),
        }
    }

    /// Value of the object. A one element list stands for its element and
    /// a scope for its name.
    pub fn to_variable(&self) -> Result<Variable, Anomaly> {
        let single = {
            let object = self.0.borrow();
            match &object.kind {
                ObjectKind::Variable(value) => return Ok(value.clone()),
                ObjectKind::Scope(_) | ObjectKind::Block(_) => {
                    return Ok(Variable::string(&*object.name))
                }
                ObjectKind::Operator(_) => {
                    return Err(Anomaly::new(
                        AnomalyKind::NoConversion,
                        format!("operator '{}' has no value", object.name),
                    ))
                }
                ObjectKind::List(list) if list.len() == 1 => list.items()[0].clone(),
                ObjectKind::List(list) => {
                    return Err(Anomaly::new(
                        AnomalyKind::NoConversion,
                        format!("list of {} items is not a single value", list.len()),
                    ))
                }
            }
        };
        single.to_variable()
    }

    /// Copies of the values this object stands for as a list.
    pub fn to_list_items(&self) -> Result<Vec<Variable>, Anomaly> {
        let items = {
            let object = self.0.borrow();
            match &object.kind {
                ObjectKind::List(list) => list.items().to_vec(),
                ObjectKind::Operator(_) => {
                    return Err(Anomaly::new(
                        AnomalyKind::NoConversion,
                        format!("operator '{}' is not a list", object.name),
                    ))
                }
                _ => Vec::new(),
            }
        };
        if items.is_empty() && !self.is_list() {
            return Ok(vec![self.to_variable()?]);
        }
        items.iter().map(ObjectRef::to_variable).collect()
    }

    /// Text form of the value. Conversions of stored variables are cached.
    pub fn text(&self, config: &InterpreterConfig) -> Result<String, Anomaly> {
        if let Some(text) = self.with_variable(|value| value.to_text(config)) {
            return Ok(text);
        }
        Ok(self.to_variable()?.to_text(config))
    }

    pub fn with_variable<R>(&self, f: impl FnOnce(&mut Variable) -> R) -> Option<R> {
        match &mut self.0.borrow_mut().kind {
            ObjectKind::Variable(value) => Some(f(value)),
            _ => None,
        }
    }

    /// Replaces the stored value of a variable.
    pub fn store(&self, value: Variable) -> Result<(), Anomaly> {
        self.with_variable(|stored| *stored = value)
            .ok_or_else(|| {
                Anomaly::new(
                    AnomalyKind::UnsupportedOperation,
                    format!("cannot store a value in {} '{}'", self.type_name(), self.name()),
                )
            })
    }

    /// An unnamed, writable copy of the value.
    pub fn copy(&self) -> Result<ObjectRef, Anomaly> {
        if self.is_list() {
            let copy = ObjectRef::list("");
            for value in self.to_list_items()? {
                copy.list_push(value)?;
            }
            return Ok(copy);
        }
        Ok(ObjectRef::variable("", self.to_variable()?))
    }
}
