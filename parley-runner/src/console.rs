use std::io::{BufRead, Write};

use parley_core::Anomaly;
use parley_interpreter::{BlockRef, Interface};

/// Host interface for a terminal: dialogue and `print` go to `output`,
/// choices are answered from `input` and errors go to stderr.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Console::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Lists `choices` and reads answers until one names a choice. Closed
    /// input picks the first.
    fn prompt(&mut self, choices: &[BlockRef]) -> std::io::Result<usize> {
        for (number, choice) in choices.iter().enumerate() {
            writeln!(self.output, "  {}) {}", number + 1, render(choice))?;
        }
        loop {
            write!(self.output, "? ")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(0);
            }
            match line.trim().parse::<usize>() {
                Ok(number) if (1..=choices.len()).contains(&number) => return Ok(number - 1),
                _ => writeln!(self.output, "pick a number from 1 to {}", choices.len())?,
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.output, "{line}") {
            tracing::warn!(%err, "console output failed");
        }
    }
}

fn render(block: &BlockRef) -> String {
    match &block.speaker {
        Some(speaker) => format!("{speaker}: {}", block.text),
        None => block.text.clone(),
    }
}

impl<R: BufRead, W: Write> Interface for Console<R, W> {
    fn present_choice(&mut self, choices: &[BlockRef]) -> usize {
        self.prompt(choices).unwrap_or_else(|err| {
            tracing::warn!(%err, "choice prompt failed");
            0
        })
    }

    fn log_message(&mut self, text: &str, user_output: bool) {
        if user_output {
            self.write_line(text);
        } else {
            tracing::info!(target: "script", "{text}");
        }
    }

    fn say_block(&mut self, block: &BlockRef) {
        if !block.text.is_empty() {
            self.write_line(&render(block));
        }
    }

    fn handle_error(&mut self, error: &Anomaly) {
        eprintln!("error: {error}");
    }
}
