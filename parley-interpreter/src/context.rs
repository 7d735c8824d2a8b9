use parley_core::Anomaly;

use crate::config::{ConfigBinding, InterpreterConfig};
use crate::object::ObjectRef;
use crate::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Declaration {
    Var,
    List,
    Character,
    Player,
}

impl Declaration {
    pub fn from_keyword(text: &str) -> Option<Self> {
        match text {
            "var" => Some(Declaration::Var),
            "list" => Some(Declaration::List),
            "character" => Some(Declaration::Character),
            "player" => Some(Declaration::Player),
            _ => None,
        }
    }
}

/// What an expression needs from the interpreter running it.
pub trait Context {
    fn config(&self) -> &InterpreterConfig;

    /// Looks `name` up through the active scopes. `None` when nothing is bound.
    fn resolve(&mut self, name: &str) -> Result<Option<ObjectRef>, Anomaly>;

    fn root(&self) -> ObjectRef;

    /// Creates and registers a fresh object for `name`.
    fn declare(&mut self, name: &str, declaration: Declaration) -> Result<ObjectRef, Anomaly>;

    /// Runs a block or native operator with `argument` as its input.
    fn call(&mut self, callee: &ObjectRef, argument: ObjectRef) -> Result<ObjectRef, Anomaly>;

    /// Writes a configuration variable through to the configuration.
    fn store_config(&mut self, binding: ConfigBinding, value: &mut Variable) -> Result<(), Anomaly>;

    fn log_message(&mut self, text: &str, user_output: bool) -> Result<(), Anomaly>;

    /// Counts one level of nesting. Fails once the configured depth is reached.
    fn enter(&mut self) -> Result<(), Anomaly>;

    fn leave(&mut self);
}
