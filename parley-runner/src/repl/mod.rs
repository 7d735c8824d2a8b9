mod evaluator;
mod printer;
mod reader;

use parley_interpreter::InterpreterConfig;
use rustyline::DefaultEditor;

use crate::console::Console;
use evaluator::{Evaluator, ScriptEvaluator};
use printer::{Printer, ValuePrinter};
use reader::{ReadOutput, Reader};

struct Repl<E: Evaluator, P: Printer> {
    reader: Reader,
    evaluator: E,
    printer: P,
}

impl<O, E: Evaluator<Object = O>, P: Printer<Object = O>> Repl<E, P> {
    fn run(mut self) {
        loop {
            match self.reader.read() {
                ReadOutput::Exit => break,
                ReadOutput::Clear => continue,
                ReadOutput::Value(entry) => {
                    let result = self.evaluator.evaluate(entry);
                    self.printer.print(result)
                }
            }
        }
    }
}

pub fn start(config: InterpreterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rl = DefaultEditor::new()?;
    Repl {
        reader: Reader::new(rl),
        evaluator: ScriptEvaluator::new(config, Box::new(Console::stdio()))?,
        printer: ValuePrinter {},
    }
    .run();
    Ok(())
}
