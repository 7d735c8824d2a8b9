mod invocation;
mod statements;

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use parley_core::{Anomaly, AnomalyKind, Bookmark, FileSource, Lexer, LineSource};

use crate::builtins::register_builtins;
use crate::config::{ConfigBinding, InterpreterConfig};
use crate::context::{Context, Declaration};
use crate::interface::Interface;
use crate::object::ObjectRef;
use crate::scope::{BlockIndex, ScopeRole};
use crate::variable::Variable;
use statements::Terminator;

struct LoadedSource {
    lexer: Lexer,
    /// Holds the top-level variables of the source.
    scope: ObjectRef,
}

/// Scopes and flags of the body currently being executed.
#[derive(Debug, Default)]
struct Frame {
    instance: Option<ObjectRef>,
    static_scope: Option<ObjectRef>,
    /// Set when the block has been said before, so `static` statements are skipped.
    ignore_statics: bool,
    /// Set while a `static` statement runs.
    static_declaration: bool,
    returning: bool,
}

/// Runs dialogue scripts against a tree of scopes rooted at a global scope.
pub struct Interpreter {
    config: InterpreterConfig,
    root: ObjectRef,
    end_block: ObjectRef,
    interface: Option<Box<dyn Interface>>,
    sources: HashMap<Rc<str>, LoadedSource>,
    current: Option<Rc<str>>,
    /// Every block in declaration order.
    blocks: Vec<ObjectRef>,
    frame: Frame,
    depth: usize,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Result<Self, Anomaly> {
        config.validate()?;
        let root = ObjectRef::scope("", ScopeRole::Root);
        register_builtins(&root)?;
        for binding in ConfigBinding::ALL {
            root.register(ObjectRef::bound(binding, config.read(binding)))?;
        }
        let end_block = root.register(ObjectRef::block(
            "end",
            Bookmark::void(),
            BlockIndex(usize::MAX),
        )?)?;
        Ok(Interpreter {
            config,
            root,
            end_block,
            interface: None,
            sources: HashMap::new(),
            current: None,
            blocks: Vec::new(),
            frame: Frame::default(),
            depth: 0,
        })
    }

    pub fn attach(&mut self, interface: Box<dyn Interface>) {
        self.interface = Some(interface);
    }

    pub fn detach(&mut self) -> Option<Box<dyn Interface>> {
        self.interface.take()
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Replaces the configuration and refreshes the script-visible copies.
    pub fn set_config(&mut self, config: InterpreterConfig) -> Result<(), Anomaly> {
        let result = config.validate().and_then(|()| {
            for binding in ConfigBinding::ALL {
                if let Some(variable) = self.root.lookup_local(binding.name())? {
                    variable.store(config.read(binding))?;
                }
            }
            Ok(())
        });
        if result.is_ok() {
            self.config = config;
        }
        self.report(result)
    }

    /// Parses and runs the top level of a new source.
    pub fn load_source(&mut self, name: &str, source: Box<dyn LineSource>) -> Result<(), Anomaly> {
        let result = self.add_source(name, source);
        self.report(result)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), Anomaly> {
        let path = path.as_ref();
        let result = FileSource::open(path)
            .and_then(|source| self.add_source(&path.display().to_string(), Box::new(source)));
        self.report(result)
    }

    /// Continues the top level of a source whose text has grown since it
    /// was last read.
    pub fn resume_source(&mut self, name: &str) -> Result<(), Anomaly> {
        let known = self.sources.get_key_value(name).map(|(name, _)| name.clone());
        let result = match known {
            Some(name) => self.run_source(name),
            None => Err(Anomaly::new(
                AnomalyKind::SourceNotFound,
                format!("'{name}' was never loaded"),
            )),
        };
        self.report(result)
    }

    /// Says the first declared block and follows the dialogue from there.
    pub fn run(&mut self) -> Result<(), Anomaly> {
        let result = match self.blocks.first().cloned() {
            Some(first) => self.say(first),
            None => Err(Anomaly::new(
                AnomalyKind::NoBlocksInSource,
                "no block has been declared",
            )),
        };
        self.report(result)
    }

    /// Says the block called `name` and follows the dialogue from there.
    pub fn start_at(&mut self, name: &str) -> Result<(), Anomaly> {
        let result = self.find_global_block(name).and_then(|block| self.say(block));
        self.report(result)
    }

    /// Runs a block as a function and returns its `output`.
    pub fn call_block(&mut self, name: &str, arguments: &[Variable]) -> Result<Variable, Anomaly> {
        let result = self.find_global_block(name).and_then(|block| {
            let input = ObjectRef::constant_list();
            for argument in arguments {
                input.list_push(argument.clone())?;
            }
            self.invoke(&block, input)?.to_variable()
        });
        self.report(result)
    }

    pub fn has_blocks(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Looks a name up from the global scope.
    pub fn global(&self, name: &str) -> Result<Option<ObjectRef>, Anomaly> {
        self.root.lookup(name)
    }

    fn report<T>(&mut self, result: Result<T, Anomaly>) -> Result<T, Anomaly> {
        if let Err(error) = &result {
            tracing::debug!(%error, "script error");
            if let Some(interface) = self.interface.as_mut() {
                interface.handle_error(error);
            }
        }
        result
    }

    fn add_source(&mut self, name: &str, source: Box<dyn LineSource>) -> Result<(), Anomaly> {
        let name: Rc<str> = Rc::from(name);
        if self.sources.contains_key(&name) {
            return Err(Anomaly::new(
                AnomalyKind::AlreadyRegistered,
                format!("source '{name}' is already loaded"),
            ));
        }
        let scope = ObjectRef::scope(&name, ScopeRole::File);
        // the file scope searches the root without being one of its members
        scope.borrow_mut().parent = Some(self.root.downgrade());
        tracing::debug!(source = %name, "loading source");
        self.sources.insert(
            name.clone(),
            LoadedSource {
                lexer: Lexer::new(name.clone(), source),
                scope,
            },
        );
        self.run_source(name)
    }

    fn run_source(&mut self, name: Rc<str>) -> Result<(), Anomaly> {
        let previous_source = self.current.replace(name);
        let previous_frame = std::mem::take(&mut self.frame);
        let result = self.parse_statements(true).and_then(|terminator| match terminator {
            Terminator::EndOfSource => Ok(()),
            Terminator::CloseBrace => {
                let location = self.lexer()?.location();
                Err(Anomaly::new(AnomalyKind::Punctuation, "'}' without matching '{'")
                    .located(location))
            }
        });
        if result.is_err() {
            if let Ok(lexer) = self.lexer() {
                lexer.skip_to_end();
            }
        }
        self.frame = previous_frame;
        self.current = previous_source;
        result
    }

    fn lexer(&mut self) -> Result<&mut Lexer, Anomaly> {
        let name = self
            .current
            .as_ref()
            .ok_or_else(|| Anomaly::panic("no source is being read"))?;
        self.sources
            .get_mut(name)
            .map(|source| &mut source.lexer)
            .ok_or_else(|| Anomaly::panic(format!("source '{name}' is not loaded")))
    }

    fn file_scope(&self) -> Option<ObjectRef> {
        let name = self.current.as_ref()?;
        self.sources.get(name).map(|source| source.scope.clone())
    }

    fn interface_mut(&mut self) -> Result<&mut Box<dyn Interface>, Anomaly> {
        self.interface.as_mut().ok_or_else(|| {
            Anomaly::new(
                AnomalyKind::NoInterfaceAttached,
                "the script needs a host interface",
            )
        })
    }

    /// Instance scope chain, then the static scope chain, then the scope of
    /// the source being read. A leading `::` starts at the root instead.
    fn resolve_name(&self, name: &str) -> Result<Option<ObjectRef>, Anomaly> {
        if name.starts_with("::") {
            return self.root.lookup(name);
        }
        let starts = [
            self.frame.instance.clone(),
            self.frame.static_scope.clone(),
            self.file_scope(),
        ];
        for start in starts.into_iter().flatten() {
            let mut current = Some(start);
            while let Some(scope) = current {
                if let Some(found) = scope.lookup(name)? {
                    return Ok(Some(found));
                }
                current = scope.parent();
            }
        }
        Ok(None)
    }

    /// The scope called `name`, where an empty name means the root.
    fn scope_named(&self, name: &str) -> Result<ObjectRef, Anomaly> {
        if name.is_empty() {
            return Ok(self.root.clone());
        }
        self.resolve_name(name)?
            .ok_or_else(|| {
                Anomaly::new(
                    AnomalyKind::IdentifierNotFound,
                    format!("'{name}' is not declared"),
                )
            })?
            .as_scope()
    }

    fn declaration_scope(&self, declaration: Declaration) -> ObjectRef {
        let fallback = || self.file_scope().unwrap_or_else(|| self.root.clone());
        match declaration {
            Declaration::Character | Declaration::Player => self.root.clone(),
            _ if self.frame.static_declaration => {
                self.frame.static_scope.clone().unwrap_or_else(fallback)
            }
            _ => self.frame.instance.clone().unwrap_or_else(fallback),
        }
    }
}

impl Context for Interpreter {
    fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    fn resolve(&mut self, name: &str) -> Result<Option<ObjectRef>, Anomaly> {
        self.resolve_name(name)
    }

    fn root(&self) -> ObjectRef {
        self.root.clone()
    }

    fn declare(&mut self, name: &str, declaration: Declaration) -> Result<ObjectRef, Anomaly> {
        let (owner, leaf) = match name.rsplit_once("::") {
            Some((owner, leaf)) => (self.scope_named(owner)?, leaf),
            None => (self.declaration_scope(declaration), name),
        };
        let object = match declaration {
            Declaration::Var => ObjectRef::variable(leaf, Variable::default()),
            Declaration::List => ObjectRef::list(leaf),
            Declaration::Character => ObjectRef::scope(leaf, ScopeRole::Character),
            Declaration::Player => ObjectRef::scope(leaf, ScopeRole::Player),
        };
        tracing::trace!(name, ?declaration, owner = %owner.full_name(), "declare");
        owner.register(object)
    }

    fn call(&mut self, callee: &ObjectRef, argument: ObjectRef) -> Result<ObjectRef, Anomaly> {
        if let Some(func) = callee.native() {
            return func(self, argument);
        }
        if callee.is_block() {
            return self.invoke(callee, argument);
        }
        Err(Anomaly::panic(format!("{callee:?} is not callable")))
    }

    fn store_config(&mut self, binding: ConfigBinding, value: &mut Variable) -> Result<(), Anomaly> {
        self.config.write(binding, value)
    }

    fn log_message(&mut self, text: &str, user_output: bool) -> Result<(), Anomaly> {
        self.interface_mut()?.log_message(text, user_output);
        Ok(())
    }

    fn enter(&mut self) -> Result<(), Anomaly> {
        if self.depth >= self.config.max_depth {
            return Err(Anomaly::new(
                AnomalyKind::ResourceExhausted,
                format!("nesting deeper than {} levels", self.config.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
