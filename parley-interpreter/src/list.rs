use parley_core::{Anomaly, AnomalyKind};

use crate::config::InterpreterConfig;
use crate::object::{ObjectKind, ObjectRef, WeakObject};
use crate::variable::{Arithmetic, Variable};

/// Elements are variables owned by the list.
#[derive(Debug, Default)]
pub struct List {
    items: Vec<ObjectRef>,
}

fn out_of_range(index: i64, len: usize) -> Anomaly {
    Anomaly::new(
        AnomalyKind::ListIndexOutOfRange,
        format!("index {index} is out of range for a list of {len} items"),
    )
}

fn item(value: Variable, owner: &WeakObject) -> ObjectRef {
    let item = ObjectRef::variable("", value);
    item.borrow_mut().parent = Some(owner.clone());
    item
}

impl List {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ObjectRef] {
        &self.items
    }

    /// Position addressed by `index`. Negative indices count from the end.
    /// With `extra` set the position one past the last element is valid too.
    fn position(&self, index: i64, strict: bool, extra: bool) -> Result<usize, Anomaly> {
        let len = self.items.len() as i64 + i64::from(extra);
        let position = if index < 0 { len + index } else { index };
        if position < 0 || (strict && position >= len) {
            return Err(out_of_range(index, self.items.len()));
        }
        Ok(position as usize)
    }

    pub fn resize(&mut self, len: usize, owner: &WeakObject) {
        if len <= self.items.len() {
            for removed in self.items.drain(len..) {
                removed.borrow_mut().parent = None;
            }
            return;
        }
        while self.items.len() < len {
            self.items.push(item(Variable::default(), owner));
        }
    }

    pub fn get(&mut self, index: i64, strict: bool, owner: &WeakObject) -> Result<ObjectRef, Anomaly> {
        let position = self.position(index, strict, false)?;
        if position >= self.items.len() {
            self.resize(position + 1, owner);
        }
        Ok(self.items[position].clone())
    }

    pub fn set(
        &mut self,
        index: i64,
        value: Variable,
        strict: bool,
        owner: &WeakObject,
    ) -> Result<(), Anomaly> {
        self.get(index, strict, owner)?.store(value)
    }

    /// Inserts a default element so that it ends up at `index` and returns it.
    /// `-1` appends.
    pub fn insert(&mut self, index: i64, strict: bool, owner: &WeakObject) -> Result<ObjectRef, Anomaly> {
        let position = self.position(index, strict, true)?;
        if position > self.items.len() {
            self.resize(position, owner);
        }
        let inserted = item(Variable::default(), owner);
        self.items.insert(position, inserted.clone());
        Ok(inserted)
    }

    /// Removes the element at `index` and hands it back detached.
    pub fn remove_at(&mut self, index: i64) -> Result<ObjectRef, Anomaly> {
        let position = self.position(index, true, false)?;
        let removed = self.items.remove(position);
        removed.borrow_mut().parent = None;
        Ok(removed)
    }

    pub fn push(&mut self, value: Variable, owner: &WeakObject) -> ObjectRef {
        let pushed = item(value, owner);
        self.items.push(pushed.clone());
        pushed
    }

    pub fn pop(&mut self) -> Option<ObjectRef> {
        let popped = self.items.pop()?;
        popped.borrow_mut().parent = None;
        Some(popped)
    }
}

impl ObjectRef {
    fn with_list<R>(&self, f: impl FnOnce(&mut List, &WeakObject) -> R) -> Result<R, Anomaly> {
        let owner = self.downgrade();
        let result = match &mut self.borrow_mut().kind {
            ObjectKind::List(list) => Some(f(list, &owner)),
            _ => None,
        };
        result.ok_or_else(|| {
            Anomaly::new(
                AnomalyKind::UnsupportedOperation,
                format!("{} '{}' is not a list", self.type_name(), self.name()),
            )
        })
    }

    pub fn list_len(&self) -> Result<usize, Anomaly> {
        self.with_list(|list, _| list.len())
    }

    pub fn list_items(&self) -> Result<Vec<ObjectRef>, Anomaly> {
        self.with_list(|list, _| list.items().to_vec())
    }

    pub fn list_get(&self, index: i64, strict: bool) -> Result<ObjectRef, Anomaly> {
        self.with_list(|list, owner| list.get(index, strict, owner))?
    }

    pub fn list_set(&self, index: i64, value: Variable, strict: bool) -> Result<(), Anomaly> {
        self.with_list(|list, owner| list.set(index, value, strict, owner))?
    }

    pub fn list_insert(&self, index: i64, strict: bool) -> Result<ObjectRef, Anomaly> {
        self.with_list(|list, owner| list.insert(index, strict, owner))?
    }

    pub fn list_remove_at(&self, index: i64) -> Result<ObjectRef, Anomaly> {
        self.with_list(|list, _| list.remove_at(index))?
    }

    /// Removes the first element equal to `value`.
    pub fn list_remove(
        &self,
        value: &Variable,
        config: &InterpreterConfig,
    ) -> Result<Option<ObjectRef>, Anomaly> {
        let mut position = None;
        for (index, item) in self.list_items()?.iter().enumerate() {
            let mut probe = value.clone();
            let mut candidate = item.to_variable()?;
            let equal = probe.operate(Arithmetic::Eq, &mut candidate, config)?;
            if equal == Variable::boolean(true) {
                position = Some(index as i64);
                break;
            }
        }
        match position {
            Some(index) => self.list_remove_at(index).map(Some),
            None => Ok(None),
        }
    }

    /// Appends a copy of `value`.
    pub fn list_push(&self, value: Variable) -> Result<ObjectRef, Anomaly> {
        self.with_list(|list, owner| list.push(value, owner))
    }

    /// Adopts `item` itself instead of a copy. Only temporaries can be adopted.
    pub fn list_push_without_copy(&self, item: ObjectRef) -> Result<(), Anomaly> {
        if !item.is_temporary() || !item.is_variable() {
            return Err(Anomaly::panic(format!(
                "{item:?} cannot be adopted by a list"
            )));
        }
        item.set_constant(false);
        item.borrow_mut().parent = Some(self.downgrade());
        self.with_list(|list, _| list.items.push(item))
    }

    pub fn list_pop(&self) -> Result<Option<ObjectRef>, Anomaly> {
        self.with_list(|list, _| list.pop())
    }

    pub fn list_resize(&self, len: usize) -> Result<(), Anomaly> {
        self.with_list(|list, owner| list.resize(len, owner))
    }

    /// Replaces the elements with copies of `values`.
    pub fn list_assign(&self, values: Vec<Variable>) -> Result<(), Anomaly> {
        self.with_list(|list, owner| {
            list.resize(0, owner);
            for value in values {
                list.push(value, owner);
            }
        })
    }
}
