use parley_core::{Anomaly, AnomalyKind, Bookmark};

use super::statements::Terminator;
use super::{Frame, Interpreter};
use crate::context::Context;
use crate::interface::BlockRef;
use crate::object::ObjectRef;
use crate::scope::ScopeRole;
use crate::stack::ensure_sufficient_stack;
use crate::variable::Variable;

fn member(scope: &ObjectRef, name: &str) -> Result<ObjectRef, Anomaly> {
    scope.lookup_local(name)?.ok_or_else(|| {
        Anomaly::panic(format!("block '{}' lost its '{name}'", scope.full_name()))
    })
}

impl Interpreter {
    /// Runs `block` with `argument` as its `input` and returns its `output`.
    #[tracing::instrument(level = "debug", skip_all, fields(block = %block.full_name()))]
    pub(super) fn invoke(&mut self, block: &ObjectRef, argument: ObjectRef) -> Result<ObjectRef, Anomaly> {
        self.enter()?;
        let result = ensure_sufficient_stack(|| self.invoke_body(block, &argument));
        self.leave();
        result
    }

    fn invoke_body(&mut self, block: &ObjectRef, argument: &ObjectRef) -> Result<ObjectRef, Anomaly> {
        // a block counts as said as soon as its body starts, so recursive
        // calls skip its statics too
        let (bookmark, said) = block.with_block(|block| {
            (block.bookmark.clone(), std::mem::replace(&mut block.said, true))
        })?;
        let output = member(block, "output")?;
        if bookmark.is_void() {
            return Ok(ObjectRef::constant(output.to_variable()?));
        }

        let instance = ObjectRef::scope("", ScopeRole::Instance);
        instance
            .register(ObjectRef::list("input"))?
            .list_assign(argument.to_list_items()?)?;
        let instance_output = instance.register(ObjectRef::variable("output", Variable::string("")))?;

        // a recursive call must not see the instances of the calls still
        // running this block
        let shadowed: Vec<ObjectRef> = block
            .imported()?
            .into_iter()
            .filter(|scope| scope.role() == Some(ScopeRole::Instance))
            .collect();
        for scope in &shadowed {
            block.unimport(scope)?;
        }
        block.import_front(&instance)?;

        let frame = std::mem::replace(
            &mut self.frame,
            Frame {
                instance: Some(instance.clone()),
                static_scope: Some(block.clone()),
                ignore_statics: said,
                ..Frame::default()
            },
        );
        let previous_source = self.current.replace(bookmark.source.clone());
        let result = self.run_body(&bookmark);
        self.current = previous_source;
        self.frame = frame;

        block.unimport(&instance)?;
        for scope in shadowed.iter().rev() {
            block.import_front(scope)?;
        }
        result?;

        let value = instance_output.to_variable()?;
        output.store(value.clone())?;
        Ok(ObjectRef::constant(value))
    }

    fn run_body(&mut self, bookmark: &Bookmark) -> Result<(), Anomaly> {
        let lexer = self.lexer()?;
        let resume = lexer.position();
        lexer.goto_position(bookmark.position)?;
        let result = self.parse_statements(true);
        self.lexer()?.goto_position(resume)?;
        match result? {
            Terminator::CloseBrace => Ok(()),
            Terminator::EndOfSource => Err(Anomaly::new(
                AnomalyKind::Punctuation,
                "block body is never closed",
            )),
        }
    }

    /// Says `first` and every block the dialogue moves on to, until a block
    /// has no successor or `end` is reached.
    pub(super) fn say(&mut self, first: ObjectRef) -> Result<(), Anomaly> {
        let mut current = first;
        while current != self.end_block {
            self.invoke(&current, ObjectRef::constant_list())?;
            let said = self.block_ref(&current)?;
            tracing::debug!(block = %said.full_name, text = %said.text, "say");
            self.interface_mut()?.say_block(&said);
            match self.next_block(&current)? {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(())
    }

    pub(super) fn block_ref(&self, block: &ObjectRef) -> Result<BlockRef, Anomaly> {
        let owner = block.parent();
        let role = owner.as_ref().and_then(ObjectRef::role);
        let speaker = match role {
            Some(ScopeRole::Character | ScopeRole::Player) => owner.map(|owner| owner.name().to_string()),
            _ => None,
        };
        Ok(BlockRef {
            name: block.name().to_string(),
            full_name: block.full_name(),
            speaker,
            by_player: role == Some(ScopeRole::Player),
            text: member(block, "output")?.text(&self.config)?,
        })
    }

    /// Reads and clears the block's `next_block` list. More than one
    /// candidate is a choice for the host. An empty list moves on in
    /// declaration order.
    fn next_block(&mut self, block: &ObjectRef) -> Result<Option<ObjectRef>, Anomaly> {
        let list = member(block, "next_block")?;
        let names = list.to_list_items()?;
        list.list_resize(0)?;

        let mut candidates: Vec<ObjectRef> = Vec::new();
        for mut name in names {
            let name = name.to_text(&self.config);
            let target = self.find_block(block, &name)?;
            if !candidates.contains(&target) {
                candidates.push(target);
            }
        }

        match candidates.len() {
            0 => {
                let index = block.with_block(|block| block.index)?;
                Ok(index
                    .0
                    .checked_add(1)
                    .and_then(|next| self.blocks.get(next))
                    .cloned())
            }
            1 => Ok(candidates.pop()),
            _ => {
                let choices = candidates
                    .iter()
                    .map(|candidate| self.block_ref(candidate))
                    .collect::<Result<Vec<_>, _>>()?;
                let choice = self.interface_mut()?.present_choice(&choices);
                tracing::debug!(choice, of = choices.len(), "host chose");
                candidates.get(choice).cloned().map(Some).ok_or_else(|| {
                    Anomaly::new(
                        AnomalyKind::ListIndexOutOfRange,
                        format!("choice {choice} of {} candidates", choices.len()),
                    )
                })
            }
        }
    }

    /// A block named relative to the scope that owns `from`, then from the root.
    fn find_block(&self, from: &ObjectRef, name: &str) -> Result<ObjectRef, Anomaly> {
        let nearby = match from.parent() {
            Some(owner) => owner.lookup(name)?,
            None => None,
        };
        let found = match nearby {
            Some(found) => Some(found),
            None => self.root.lookup(name)?,
        };
        found
            .ok_or_else(|| {
                Anomaly::new(
                    AnomalyKind::IdentifierNotFound,
                    format!("no block named '{name}'"),
                )
            })?
            .as_block()
    }

    pub(super) fn find_global_block(&self, name: &str) -> Result<ObjectRef, Anomaly> {
        self.root
            .lookup(name)?
            .ok_or_else(|| {
                Anomaly::new(
                    AnomalyKind::IdentifierNotFound,
                    format!("no block named '{name}'"),
                )
            })?
            .as_block()
    }
}
