pub mod builtins;
pub mod config;
pub mod context;
pub mod expression;
pub mod interface;
pub mod interpreter;
pub mod list;
pub mod object;
pub mod scope;
pub mod stack;
pub mod variable;

pub use config::{ConfigBinding, InterpreterConfig, Rounding};
pub use context::{Context, Declaration};
pub use expression::Expression;
pub use interface::{BlockRef, Interface};
pub use interpreter::Interpreter;
pub use object::ObjectRef;
pub use scope::ScopeRole;
pub use variable::{VarType, Variable};
