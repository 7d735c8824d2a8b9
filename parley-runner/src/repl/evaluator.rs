use parley_core::{Anomaly, SharedSource};
use parley_interpreter::{Interface, Interpreter, InterpreterConfig};

use super::reader::Entry;

const SOURCE_NAME: &str = "<repl>";

pub trait Evaluator {
    type Object;

    fn evaluate(&mut self, entry: Entry) -> Self::Object;
}

/// Feeds every entry into one growing source, so declarations made on
/// earlier lines stay visible.
pub struct ScriptEvaluator {
    interpreter: Interpreter,
    source: SharedSource,
}

impl ScriptEvaluator {
    pub fn new(config: InterpreterConfig, interface: Box<dyn Interface>) -> Result<Self, Anomaly> {
        let mut interpreter = Interpreter::new(config)?;
        interpreter.attach(interface);
        let source = SharedSource::new();
        interpreter.load_source(SOURCE_NAME, Box::new(source.clone()))?;
        Ok(Self {
            interpreter,
            source,
        })
    }
}

impl Evaluator for ScriptEvaluator {
    type Object = Result<Option<String>, Anomaly>;

    fn evaluate(&mut self, entry: Entry) -> Self::Object {
        match entry {
            Entry::Script(text) => {
                for line in text.lines() {
                    self.source.push_line(line);
                }
                self.interpreter.resume_source(SOURCE_NAME).map(|()| None)
            }
            Entry::Run => self.interpreter.run().map(|()| None),
            Entry::Start(block) => self.interpreter.start_at(&block).map(|()| None),
            Entry::Call(block) => {
                let mut output = self.interpreter.call_block(&block, &[])?;
                Ok(Some(output.to_text(self.interpreter.config())))
            }
        }
    }
}
