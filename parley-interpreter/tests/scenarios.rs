use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use parley_core::{Anomaly, AnomalyKind, SharedSource, StringSource};
use parley_interpreter::{BlockRef, Interface, Interpreter, InterpreterConfig, Variable};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Print(String),
    Log(String),
    Said(Option<String>, String),
    Choice(Vec<String>),
    Error(Option<AnomalyKind>),
}

/// Records every callback and answers choices from a queue.
#[derive(Clone, Default)]
struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
    answers: Rc<RefCell<VecDeque<usize>>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn printed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Print(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl Interface for Recorder {
    fn present_choice(&mut self, choices: &[BlockRef]) -> usize {
        let names = choices.iter().map(|choice| choice.full_name.clone()).collect();
        self.events.borrow_mut().push(Event::Choice(names));
        self.answers.borrow_mut().pop_front().unwrap_or(0)
    }

    fn log_message(&mut self, text: &str, user_output: bool) {
        let event = if user_output {
            Event::Print(text.to_owned())
        } else {
            Event::Log(text.to_owned())
        };
        self.events.borrow_mut().push(event);
    }

    fn say_block(&mut self, block: &BlockRef) {
        self.events
            .borrow_mut()
            .push(Event::Said(block.speaker.clone(), block.text.clone()));
    }

    fn handle_error(&mut self, error: &Anomaly) {
        self.events.borrow_mut().push(Event::Error(error.kind()));
    }
}

fn interpreter_with(config: InterpreterConfig) -> (Interpreter, Recorder) {
    let recorder = Recorder::default();
    let mut interpreter = Interpreter::new(config).unwrap();
    interpreter.attach(Box::new(recorder.clone()));
    (interpreter, recorder)
}

fn interpreter() -> (Interpreter, Recorder) {
    interpreter_with(InterpreterConfig::default())
}

fn load(interpreter: &mut Interpreter, script: &str) -> Result<(), Anomaly> {
    interpreter.load_source("story", Box::new(StringSource::new(script)))
}

fn said(speaker: Option<&str>, text: &str) -> Event {
    Event::Said(speaker.map(str::to_owned), text.to_owned())
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let (mut interpreter, recorder) = interpreter();
    load(&mut interpreter, "var x = 3 + 4 * 2; print x;").unwrap();
    assert_eq!(recorder.events(), vec![Event::Print("11".into())]);
}

#[test]
fn else_runs_when_the_condition_fails() {
    let (mut interpreter, recorder) = interpreter();
    load(&mut interpreter, "if (1 > 2) do print \"a\"; else print \"b\";").unwrap();
    assert_eq!(recorder.printed(), vec!["b"]);
}

#[test]
fn dialogue_advances_in_declaration_order() {
    let (mut interpreter, recorder) = interpreter();
    let script = "Greeting {\n    `\"Hi!\"`\n}\nFarewell {\n    `\"Bye!\"`\n}\n";
    load(&mut interpreter, script).unwrap();
    interpreter.run().unwrap();
    assert_eq!(
        recorder.events(),
        vec![said(None, "Hi!"), said(None, "Bye!")]
    );
}

#[test]
fn list_insert_access_and_remove() {
    let (mut interpreter, recorder) = interpreter();
    let script = "list L = (), L +[0] = \"x\", L +[1] = \"y\"; print L[0];\n\
                  L -[0]; print L[0]; print size L;";
    load(&mut interpreter, script).unwrap();
    assert_eq!(recorder.printed(), vec!["x", "y", "1"]);
}

#[test]
fn recursive_calls_get_fresh_instances() {
    let (mut interpreter, recorder) = interpreter();
    let script = "Count {\n\
                      static var calls = 0;\n\
                      calls += 1;\n\
                      var n = input;\n\
                      if n > 0 do Count (n - 1);\n\
                      print n;\n\
                  }";
    load(&mut interpreter, script).unwrap();
    interpreter.call_block("Count", &[Variable::integer(3)]).unwrap();
    assert_eq!(recorder.printed(), vec!["0", "1", "2", "3"]);

    let calls = interpreter.global("Count::calls").unwrap().unwrap();
    assert_eq!(calls.text(interpreter.config()).unwrap(), "4");

    // statics are not declared again on later calls
    interpreter.call_block("Count", &[Variable::integer(0)]).unwrap();
    assert_eq!(calls.text(interpreter.config()).unwrap(), "5");
}

#[test]
fn callers_instance_is_invisible_to_the_callee() {
    let (mut interpreter, recorder) = interpreter();
    let script = "Probe {\n\
                      if input > 0 do { var secret = 1; Probe 0; }\n\
                      else print secret;\n\
                  }";
    load(&mut interpreter, script).unwrap();
    let error = interpreter
        .call_block("Probe", &[Variable::integer(1)])
        .unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::IdentifierNotFound));
    assert_eq!(error.location().map(|location| location.line), Some(3));
    assert_eq!(
        recorder.events(),
        vec![Event::Error(Some(AnomalyKind::IdentifierNotFound))]
    );
}

#[test]
fn host_picks_between_candidates() {
    let (mut interpreter, recorder) = interpreter();
    recorder.answers.borrow_mut().push_back(1);
    let script = "player Hero;\n\
                  Start { `\"Hello\"`; next_block = (\"Hero::Left\", \"Hero::Right\"); }\n\
                  Hero::Left { `\"left\"` }\n\
                  Hero::Right { `\"right\"`; next_block = \"end\"; }\n\
                  After { `\"never\"` }";
    load(&mut interpreter, script).unwrap();
    interpreter.run().unwrap();
    assert_eq!(
        recorder.events(),
        vec![
            said(None, "Hello"),
            Event::Choice(vec!["Hero::Left".into(), "Hero::Right".into()]),
            said(Some("Hero"), "right"),
        ]
    );
}

#[test]
fn start_at_a_named_block() {
    let (mut interpreter, recorder) = interpreter();
    let script = "character Alice;\n\
                  Alice::Intro { `\"one\"` }\n\
                  Alice::Outro { `\"two\"` }";
    load(&mut interpreter, script).unwrap();
    interpreter.start_at("Alice::Outro").unwrap();
    assert_eq!(recorder.events(), vec![said(Some("Alice"), "two")]);
}

#[test]
fn return_sets_output_and_stops_the_body() {
    let (mut interpreter, recorder) = interpreter();
    let script = "Twice { return input * 2; print \"unreachable\"; }\n\
                  Loop { var i = 0; while true { i += 1; if i == 3 do return i; } }";
    load(&mut interpreter, script).unwrap();
    let doubled = interpreter.call_block("Twice", &[Variable::integer(21)]).unwrap();
    let looped = interpreter.call_block("Loop", &[]).unwrap();
    let config = interpreter.config().clone();
    assert_eq!(doubled.clone().to_text(&config), "42");
    assert_eq!(looped.clone().to_text(&config), "3");
    assert!(recorder.printed().is_empty());
}

#[test]
fn nested_block_declarations_survive_repeated_calls() {
    let (mut interpreter, recorder) = interpreter();
    let script = "Outer { Inner { print \"inner\"; } Inner (); }";
    load(&mut interpreter, script).unwrap();
    interpreter.call_block("Outer", &[]).unwrap();
    interpreter.call_block("Outer", &[]).unwrap();
    interpreter.call_block("Outer::Inner", &[]).unwrap();
    assert_eq!(recorder.printed(), vec!["inner", "inner", "inner"]);
}

#[test]
fn configuration_variables() {
    let (mut interpreter, recorder) = interpreter();
    load(&mut interpreter, "precision = 3; print 2 / 3; print precision;").unwrap();
    assert_eq!(recorder.printed(), vec!["0.667", "3"]);
    assert_eq!(interpreter.config().precision, 3);

    let error = load_more(&mut interpreter, "precision = 5000;").unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::PrecisionOutOfRange));
    assert_eq!(interpreter.config().precision, 3);

    let config = InterpreterConfig {
        strict_lists: true,
        ..interpreter.config().clone()
    };
    interpreter.set_config(config).unwrap();
    let error = load_more(&mut interpreter, "list S = 1; S[3] = 2;").unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::ListIndexOutOfRange));
    load_more(&mut interpreter, "print strict_lists;").unwrap();
    assert_eq!(recorder.printed().last().map(String::as_str), Some("true"));
}

fn load_more(interpreter: &mut Interpreter, script: &str) -> Result<(), Anomaly> {
    thread_local!(static COUNTER: RefCell<usize> = RefCell::new(0));
    let name = COUNTER.with(|counter| {
        *counter.borrow_mut() += 1;
        format!("more-{}", counter.borrow())
    });
    interpreter.load_source(&name, Box::new(StringSource::new(script)))
}

#[test]
fn builtins() {
    let (mut interpreter, recorder) = interpreter();
    let script = "list L = (1, 2, 3);\n\
                  print size L; print size \"hello\";\n\
                  print type_of 1; print type_of (1 > 2); print type_of \"s\"; print type_of L;\n\
                  log \"diagnostic\"; print L;";
    load(&mut interpreter, script).unwrap();
    assert_eq!(
        recorder.events(),
        vec![
            Event::Print("3".into()),
            Event::Print("5".into()),
            Event::Print("number".into()),
            Event::Print("bool".into()),
            Event::Print("string".into()),
            Event::Print("list".into()),
            Event::Log("diagnostic".into()),
            Event::Print("1, 2, 3".into()),
        ]
    );
}

#[test]
fn names_of_objects() {
    let (mut interpreter, recorder) = interpreter();
    let script = "character Bob; Bob::Greeting { } print |Bob::Greeting|; print Bob:name;";
    load(&mut interpreter, script).unwrap();
    assert_eq!(recorder.printed(), vec!["Bob::Greeting", "Bob"]);
}

#[test]
fn sources_keep_their_own_top_level() {
    let (mut interpreter, recorder) = interpreter();
    interpreter
        .load_source("a", Box::new(StringSource::new("var only_a = 1; Shared { print only_a; }")))
        .unwrap();
    let error = interpreter
        .load_source("b", Box::new(StringSource::new("print only_a;")))
        .unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::IdentifierNotFound));
    assert_eq!(error.location().map(|location| &*location.source), Some("b"));

    // a block reads from the source it was declared in
    interpreter
        .load_source("c", Box::new(StringSource::new("Shared ();")))
        .unwrap();
    assert_eq!(recorder.printed(), vec!["1"]);
}

#[test]
fn incremental_sources() {
    let (mut interpreter, recorder) = interpreter();
    let source = SharedSource::new();
    interpreter.load_source("repl", Box::new(source.clone())).unwrap();

    source.push_line("var x = 41;");
    interpreter.resume_source("repl").unwrap();
    source.push_line("print (x + 1);");
    interpreter.resume_source("repl").unwrap();
    source.push_line("print missing;");
    assert!(interpreter.resume_source("repl").is_err());
    source.push_line("print x;");
    interpreter.resume_source("repl").unwrap();

    assert_eq!(recorder.printed(), vec!["42", "41"]);
    assert_eq!(
        interpreter.resume_source("nowhere").unwrap_err().kind(),
        Some(AnomalyKind::SourceNotFound)
    );
}

#[test]
fn runaway_recursion_is_reported() {
    let config = InterpreterConfig {
        max_depth: 200,
        ..InterpreterConfig::default()
    };
    let (mut interpreter, _recorder) = interpreter_with(config);
    load(&mut interpreter, "Forever { Forever 1; }").unwrap();
    let error = interpreter.call_block("Forever", &[]).unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::ResourceExhausted));
    // the interpreter is usable afterwards
    load_more(&mut interpreter, "print 1;").unwrap();
}

#[test]
fn host_facing_failures() {
    let (mut interpreter, _recorder) = interpreter();
    assert_eq!(
        interpreter.run().unwrap_err().kind(),
        Some(AnomalyKind::NoBlocksInSource)
    );
    assert_eq!(
        interpreter.start_at("Missing").unwrap_err().kind(),
        Some(AnomalyKind::IdentifierNotFound)
    );

    let mut silent = Interpreter::new(InterpreterConfig::default()).unwrap();
    let error = silent
        .load_source("story", Box::new(StringSource::new("print 1;")))
        .unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::NoInterfaceAttached));

    let invalid = InterpreterConfig {
        precision: 0,
        ..InterpreterConfig::default()
    };
    assert!(Interpreter::new(invalid).is_err());
}

#[test]
fn oversized_number_base_is_refused() {
    let (mut interpreter, recorder) = interpreter();
    let error = load(&mut interpreter, "number_base = 4294967298;").unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::PrecisionOutOfRange));
    assert_eq!(interpreter.config().number_base, 10);

    load_more(&mut interpreter, "print number_base; print 255;").unwrap();
    assert_eq!(recorder.printed(), vec!["10", "255"]);
}

#[test]
fn division_follows_precision_past_a_hundred_digits() {
    let (mut interpreter, recorder) = interpreter();
    let script = "precision = 300; output_digits = 300;\n\
                  print (1 / 3); print (2 / 3 * 3 - 2);";
    load(&mut interpreter, script).unwrap();
    let third = format!("0.{}", "3".repeat(300));
    assert_eq!(recorder.printed(), vec![third, "0".to_owned()]);
}

#[test]
fn callables_take_only_the_nearest_operand() {
    let (mut interpreter, recorder) = interpreter();
    let script = "var a = 10; var b = 3;\n\
                  print a + b; print (a + b); print (a * b);";
    load(&mut interpreter, script).unwrap();
    assert_eq!(recorder.printed(), vec!["10", "13", "30"]);

    // the call's text result meets `%` in a string context
    let error = load_more(&mut interpreter, "print 10 % 3;").unwrap_err();
    assert_eq!(error.kind(), Some(AnomalyKind::UndefinedOperator));
    assert_eq!(recorder.printed().last().map(String::as_str), Some("10"));
}

#[test]
fn writing_past_the_end_grows_the_list() {
    let (mut interpreter, recorder) = interpreter();
    let script = "list L = (\"a\", \"b\"); L[4] = \"e\";\n\
                  print size L; print L[2]; print L[3]; print L[4];";
    load(&mut interpreter, script).unwrap();
    assert_eq!(recorder.printed(), vec!["5", "0", "0", "e"]);
}

#[test]
fn a_block_is_said_once_its_body_starts() {
    let (mut interpreter, recorder) = interpreter();
    let script = "Once {\n\
                      static print \"setup\";\n\
                      print input;\n\
                      if input > 0 do Once (input - 1);\n\
                  }";
    load(&mut interpreter, script).unwrap();
    interpreter.call_block("Once", &[Variable::integer(2)]).unwrap();
    // the nested calls already count as repeats
    assert_eq!(recorder.printed(), vec!["setup", "2", "1", "0"]);
}
