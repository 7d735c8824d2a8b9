use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const PROMPT: &str = ">> ";
const CONTINUE_PROMPT: &str = ".. ";

pub enum Entry {
    Script(String),
    Run,
    Start(String),
    Call(String),
}

pub enum ReadOutput {
    Exit,
    Clear,
    Value(Entry),
}

pub struct Reader {
    rl: DefaultEditor,
    pending: String,
}

impl Reader {
    pub fn new(rl: DefaultEditor) -> Self {
        Self {
            rl,
            pending: String::new(),
        }
    }

    /// Reads lines until the braces opened so far are closed again.
    pub fn read(&mut self) -> ReadOutput {
        loop {
            let prompt = if self.pending.is_empty() { PROMPT } else { CONTINUE_PROMPT };
            let line = match self.rl.readline(prompt) {
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    self.pending.clear();
                    return ReadOutput::Clear;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    return ReadOutput::Exit;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    return ReadOutput::Exit;
                }
                Ok(line) => line,
            };
            if let Err(err) = self.rl.add_history_entry(line.as_str()) {
                tracing::debug!(%err, "history not updated");
            }

            if self.pending.is_empty() && line.trim_start().starts_with(':') {
                return command(line.trim());
            }
            self.pending.push_str(&line);
            self.pending.push('\n');
            if brace_depth(&self.pending) > 0 {
                continue;
            }
            let chunk = std::mem::take(&mut self.pending);
            return match finish(&chunk) {
                Some(script) => ReadOutput::Value(Entry::Script(script)),
                None => ReadOutput::Clear,
            };
        }
    }
}

fn command(line: &str) -> ReadOutput {
    let (name, argument) = match line.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (line, ""),
    };
    match (name, argument) {
        (":quit" | ":q", _) => ReadOutput::Exit,
        (":run", "") => ReadOutput::Value(Entry::Run),
        (":start", block) if !block.is_empty() => ReadOutput::Value(Entry::Start(block.to_owned())),
        (":call", block) if !block.is_empty() => ReadOutput::Value(Entry::Call(block.to_owned())),
        _ => {
            println!("commands: :run, :start BLOCK, :call BLOCK, :quit");
            ReadOutput::Clear
        }
    }
}

/// Open braces minus closed ones, ignoring string literals.
fn brace_depth(text: &str) -> i64 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Adds the `;` a one-line statement usually lacks. `None` for blank input.
fn finish(chunk: &str) -> Option<String> {
    let trimmed = chunk.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.ends_with([';', '}', '`']) {
        Some(chunk.to_owned())
    } else {
        Some(format!("{trimmed};\n"))
    }
}
