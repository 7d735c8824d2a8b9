use std::path::Path;

use parley_interpreter::{Interpreter, InterpreterConfig};

use crate::console::Console;

/// Loads a script and plays its dialogue. Script errors have already been
/// shown by the console when this returns `Err` with an empty message.
pub fn execute(path: &Path, config: InterpreterConfig, start: Option<&str>) -> Result<(), String> {
    let mut interpreter = Interpreter::new(config).map_err(|err| err.to_string())?;
    interpreter.attach(Box::new(Console::stdio()));

    let played = interpreter.load_file(path).and_then(|()| match start {
        Some(block) => interpreter.start_at(block),
        None if interpreter.has_blocks() => interpreter.run(),
        None => Ok(()),
    });
    played.map_err(|_| String::new())
}
