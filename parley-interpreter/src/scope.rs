use std::collections::HashMap;
use std::rc::Rc;

use parley_core::{Anomaly, AnomalyKind, Bookmark};

use crate::object::{ObjectRef, WeakObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeRole {
    Plain,
    Root,
    File,
    Instance,
    Character,
    Player,
}

#[derive(Debug)]
pub struct Scope {
    pub role: ScopeRole,
    members: HashMap<Rc<str>, ObjectRef>,
    imports: Vec<WeakObject>,
}

impl Scope {
    pub fn new(role: ScopeRole) -> Self {
        Scope {
            role,
            members: HashMap::new(),
            imports: Vec::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<ObjectRef> {
        self.members.get(name).cloned()
    }

    pub fn member_names(&self) -> impl Iterator<Item = &Rc<str>> {
        self.members.keys()
    }
}

/// Declaration order of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIndex(pub usize);

#[derive(Debug)]
pub struct Block {
    pub scope: Scope,
    /// First token of the body.
    pub bookmark: Bookmark,
    pub said: bool,
    pub index: BlockIndex,
}

impl Block {
    pub fn new(bookmark: Bookmark, index: BlockIndex) -> Self {
        Block {
            scope: Scope::new(ScopeRole::Plain),
            bookmark,
            said: false,
            index,
        }
    }
}

fn not_a_scope(object: &ObjectRef) -> Anomaly {
    Anomaly::new(
        AnomalyKind::NotAScope,
        format!("{} '{}' is not a scope", object.type_name(), object.name()),
    )
}

impl ObjectRef {
    fn with_scope<R>(&self, f: impl FnOnce(&Scope) -> R) -> Result<R, Anomaly> {
        let result = self.borrow().kind.scope().map(f);
        result.ok_or_else(|| not_a_scope(self))
    }

    fn with_scope_mut<R>(&self, f: impl FnOnce(&mut Scope) -> R) -> Result<R, Anomaly> {
        let result = self.borrow_mut().kind.scope_mut().map(f);
        result.ok_or_else(|| not_a_scope(self))
    }

    /// Makes `child` a member of this scope under its own name.
    pub fn register(&self, child: ObjectRef) -> Result<ObjectRef, Anomaly> {
        if *self == child {
            return Err(Anomaly::new(
                AnomalyKind::AlreadyRegistered,
                format!("'{}' cannot contain itself", self.name()),
            ));
        }
        let name = child.name();
        if child.parent().is_some() {
            return Err(Anomaly::new(
                AnomalyKind::AlreadyRegistered,
                format!("'{name}' already belongs to '{}'", child.full_name()),
            ));
        }
        let inserted = self.with_scope_mut(|scope| {
            if scope.members.contains_key(&name) {
                return false;
            }
            scope.members.insert(name.clone(), child.clone());
            true
        })?;
        if !inserted {
            return Err(Anomaly::new(
                AnomalyKind::AlreadyRegistered,
                format!("'{name}' is already registered in '{}'", self.name()),
            ));
        }
        child.borrow_mut().parent = Some(self.downgrade());
        Ok(child)
    }

    pub fn unregister(&self, name: &str) -> Result<Option<ObjectRef>, Anomaly> {
        let removed = self.with_scope_mut(|scope| scope.members.remove(name))?;
        if let Some(child) = &removed {
            child.borrow_mut().parent = None;
        }
        Ok(removed)
    }

    /// Own members first, then the own members of each import.
    pub fn lookup_local(&self, name: &str) -> Result<Option<ObjectRef>, Anomaly> {
        let (found, imports) =
            self.with_scope(|scope| (scope.member(name), scope.imports.clone()))?;
        if found.is_some() {
            return Ok(found);
        }
        for import in imports.iter().filter_map(ObjectRef::upgrade) {
            let object = import.borrow();
            if let Some(found) = object.kind.scope().and_then(|scope| scope.member(name)) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Resolves `A::B::C` by descending one segment at a time.
    pub fn lookup(&self, compound: &str) -> Result<Option<ObjectRef>, Anomaly> {
        let mut segments = compound.trim_start_matches("::").split("::");
        let first = segments.next().unwrap_or_default();
        let Some(mut current) = self.lookup_local(first)? else {
            return Ok(None);
        };
        for segment in segments {
            match current.lookup_local(segment)? {
                Some(found) => current = found,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn import(&self, other: &ObjectRef) -> Result<(), Anomaly> {
        self.add_import(other, false)
    }

    /// Imports ahead of everything imported so far.
    pub fn import_front(&self, other: &ObjectRef) -> Result<(), Anomaly> {
        self.add_import(other, true)
    }

    fn add_import(&self, other: &ObjectRef, front: bool) -> Result<(), Anomaly> {
        if self == other {
            return Err(Anomaly::new(
                AnomalyKind::AlreadyRegistered,
                format!("'{}' cannot import itself", self.name()),
            ));
        }
        if !other.is_scope() {
            return Err(not_a_scope(other));
        }
        let weak = other.downgrade();
        self.with_scope_mut(|scope| {
            if front {
                scope.imports.insert(0, weak);
            } else {
                scope.imports.push(weak);
            }
        })
    }

    /// Removes the first import of `other`. False when it was not imported.
    pub fn unimport(&self, other: &ObjectRef) -> Result<bool, Anomaly> {
        let weak = other.downgrade();
        self.with_scope_mut(|scope| {
            match scope.imports.iter().position(|import| import.ptr_eq(&weak)) {
                Some(index) => {
                    scope.imports.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// The scopes imported so far that are still alive, in search order.
    pub fn imported(&self) -> Result<Vec<ObjectRef>, Anomaly> {
        self.with_scope(|scope| scope.imports.iter().filter_map(ObjectRef::upgrade).collect())
    }

    pub fn imports(&self, other: &ObjectRef) -> bool {
        let weak = other.downgrade();
        self.with_scope(|scope| scope.imports.iter().any(|import| import.ptr_eq(&weak)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    fn variable(name: &str, value: i64) -> ObjectRef {
        ObjectRef::variable(name, Variable::integer(value))
    }

    #[test]
    fn register_and_lookup() {
        let root = ObjectRef::scope("", ScopeRole::Root);
        let x = root.register(variable("x", 1)).unwrap();
        assert_eq!(root.lookup_local("x").unwrap(), Some(x.clone()));
        assert_eq!(x.parent(), Some(root.clone()));
        assert_eq!(root.lookup_local("y").unwrap(), None);

        let duplicate = root.register(variable("x", 2)).unwrap_err();
        assert_eq!(duplicate.kind(), Some(AnomalyKind::AlreadyRegistered));
    }

    #[test]
    fn registered_objects_cannot_move() {
        let first = ObjectRef::scope("first", ScopeRole::Plain);
        let second = ObjectRef::scope("second", ScopeRole::Plain);
        let x = first.register(variable("x", 1)).unwrap();
        let error = second.register(x.clone()).unwrap_err();
        assert_eq!(error.kind(), Some(AnomalyKind::AlreadyRegistered));

        first.unregister("x").unwrap();
        assert!(x.parent().is_none());
        second.register(x).unwrap();
    }

    #[test]
    fn only_scopes_hold_members() {
        let x = variable("x", 1);
        let error = x.register(variable("y", 2)).unwrap_err();
        assert_eq!(error.kind(), Some(AnomalyKind::NotAScope));
        assert_eq!(
            x.lookup_local("y").unwrap_err().kind(),
            Some(AnomalyKind::NotAScope)
        );
    }

    #[test]
    fn compound_lookup_descends() {
        let root = ObjectRef::scope("", ScopeRole::Root);
        let alice = root
            .register(ObjectRef::scope("Alice", ScopeRole::Character))
            .unwrap();
        let mood = alice.register(variable("mood", 3)).unwrap();
        assert_eq!(root.lookup("Alice::mood").unwrap(), Some(mood.clone()));
        assert_eq!(root.lookup("::Alice::mood").unwrap(), Some(mood));
        assert_eq!(root.lookup("Alice::age").unwrap(), None);
        let error = root.lookup("Alice::mood::deeper").unwrap_err();
        assert_eq!(error.kind(), Some(AnomalyKind::NotAScope));
    }

    #[test]
    fn resolution_order_and_single_level_imports() {
        // A is a child of B, B imports C, C imports D
        let b = ObjectRef::scope("B", ScopeRole::Plain);
        let a = b.register(ObjectRef::scope("A", ScopeRole::Plain)).unwrap();
        let c = ObjectRef::scope("C", ScopeRole::Plain);
        let d = ObjectRef::scope("D", ScopeRole::Plain);
        b.import(&c).unwrap();
        c.import(&d).unwrap();

        let in_b = b.register(variable("shared", 1)).unwrap();
        c.register(variable("shared", 2)).unwrap();
        let only_c = c.register(variable("only_c", 3)).unwrap();
        d.register(variable("only_d", 4)).unwrap();
        a.register(variable("only_a", 5)).unwrap();

        assert_eq!(b.lookup_local("shared").unwrap(), Some(in_b));
        assert_eq!(b.lookup_local("only_c").unwrap(), Some(only_c));
        assert_eq!(b.lookup_local("only_d").unwrap(), None);
        assert_eq!(b.lookup_local("only_a").unwrap(), None);
    }

    #[test]
    fn imports_are_ordered_and_removable() {
        let block = ObjectRef::scope("block", ScopeRole::Plain);
        let first = ObjectRef::scope("first", ScopeRole::Instance);
        let second = ObjectRef::scope("second", ScopeRole::Instance);
        first.register(variable("n", 1)).unwrap();
        let newer = second.register(variable("n", 2)).unwrap();
        block.import(&first).unwrap();
        block.import_front(&second).unwrap();
        assert_eq!(block.lookup_local("n").unwrap(), Some(newer));

        assert!(block.unimport(&second).unwrap());
        assert!(!block.unimport(&second).unwrap());
        assert!(block.imports(&first));
        assert!(!block.imports(&second));
        assert_eq!(
            block.import(&block).unwrap_err().kind(),
            Some(AnomalyKind::AlreadyRegistered)
        );
    }
}
