use parley_core::{Anomaly, AnomalyKind};

use crate::config::InterpreterConfig;
use crate::context::Context;
use crate::object::{NativeFn, ObjectRef};
use crate::variable::Variable;

/// Text shown for a value. Lists show their elements separated by commas.
pub fn render(object: &ObjectRef, config: &InterpreterConfig) -> Result<String, Anomaly> {
    if object.is_list() {
        let texts = object
            .list_items()?
            .iter()
            .map(|item| item.text(config))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(texts.join(", "));
    }
    object.text(config)
}

fn builtin_print(ctx: &mut dyn Context, argument: ObjectRef) -> Result<ObjectRef, Anomaly> {
    let text = render(&argument, ctx.config())?;
    ctx.log_message(&text, true)?;
    Ok(ObjectRef::constant(Variable::string(text)))
}

fn builtin_log(ctx: &mut dyn Context, argument: ObjectRef) -> Result<ObjectRef, Anomaly> {
    let text = render(&argument, ctx.config())?;
    ctx.log_message(&text, false)?;
    Ok(ObjectRef::constant(Variable::string(text)))
}

fn builtin_size(ctx: &mut dyn Context, argument: ObjectRef) -> Result<ObjectRef, Anomaly> {
    let size = if argument.is_list() {
        argument.list_len()?
    } else if argument.is_variable() {
        argument.text(ctx.config())?.chars().count()
    } else {
        return Err(Anomaly::new(
            AnomalyKind::UnsupportedOperation,
            format!("{} '{}' has no size", argument.type_name(), argument.name()),
        ));
    };
    Ok(ObjectRef::constant(Variable::integer(size as i64)))
}

fn builtin_type_of(_ctx: &mut dyn Context, argument: ObjectRef) -> Result<ObjectRef, Anomaly> {
    let name = argument
        .with_variable(|value| value.preferred().name())
        .unwrap_or_else(|| argument.type_name());
    Ok(ObjectRef::constant(Variable::string(name)))
}

pub(crate) const BUILTINS: [(&str, NativeFn); 4] = [
    ("print", builtin_print),
    ("log", builtin_log),
    ("size", builtin_size),
    ("type_of", builtin_type_of),
];

pub(crate) fn register_builtins(root: &ObjectRef) -> Result<(), Anomaly> {
    for (name, func) in BUILTINS {
        root.register(ObjectRef::operator(name, func))?;
    }
    Ok(())
}
