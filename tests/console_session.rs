use snek::editor::ExternalEditor;
use snek::error::{EditorError, Error};
use snek::history::HistoryLog;
use snek::multiline::{classify, code_finished_will_parse, Completeness};
use snek::session::{FedLine, PushOutcome, Session};
use snek::types::CompilerFlags;

/// Editor that saves without changes.
struct Unchanged;

impl ExternalEditor for Unchanged {
    fn edit(&mut self, initial: &str) -> Result<String, EditorError> {
        Ok(initial.to_string())
    }
}

/// Editor that records what it was shown and answers with fixed text.
struct Scripted {
    shown: Vec<String>,
    reply: String,
}

impl Scripted {
    fn new(reply: &str) -> Self {
        Scripted {
            shown: Vec::new(),
            reply: reply.to_string(),
        }
    }
}

impl ExternalEditor for Scripted {
    fn edit(&mut self, initial: &str) -> Result<String, EditorError> {
        self.shown.push(initial.to_string());
        Ok(self.reply.clone())
    }
}

fn printed(session: &mut Session, line: &str) -> String {
    match session.push(line) {
        Ok(PushOutcome::Executed(execution)) => execution.stdout,
        other => panic!("expected {:?} to run, got {:?}", line, other),
    }
}

// ========== Completeness ==========

#[test]
fn buffer_classification_sequence() {
    assert_eq!(code_finished_will_parse("1 + 1"), (true, true));
    assert_eq!(code_finished_will_parse("def foo(x):"), (false, true));
    assert_eq!(code_finished_will_parse("def foo(x)"), (true, false));
    assert_eq!(code_finished_will_parse("def foo(x):\nreturn 1"), (true, false));
    assert_eq!(code_finished_will_parse("def foo(x):\n    return 1"), (false, true));
    assert_eq!(code_finished_will_parse("def foo(x):\n    return 1\n"), (true, true));
}

#[test]
fn classification_is_stable_after_clear_and_repush() {
    let lines = ["if x:", "    y = 1", "else:", "    y = 2"];
    let mut session = Session::new();
    session.push("x = 0").unwrap();
    let mut first = Vec::new();
    for line in lines {
        first.push(session.push(line).unwrap());
    }
    session.interrupt();
    let mut second = Vec::new();
    for line in lines {
        second.push(session.push(line).unwrap());
    }
    assert_eq!(first, second);
    assert_eq!(classify(&lines.join("\n")), Completeness::NeedsMore);
}

#[test]
fn inline_suite_is_finished() {
    let mut session = Session::new();
    assert!(matches!(session.push("class Foo: pass").unwrap(), PushOutcome::Executed(_)));
    assert!(matches!(session.push("def asdf(): return 7").unwrap(), PushOutcome::Executed(_)));
    assert_eq!(printed(&mut session, "asdf()"), "7\n");
}

#[test]
fn indentation_hints_follow_the_block() {
    let mut session = Session::new();
    assert_eq!(session.push("for i in range(2):").unwrap(), PushOutcome::NeedsMore { indent: 4 });
    assert_eq!(session.push("    if i:").unwrap(), PushOutcome::NeedsMore { indent: 8 });
    assert_eq!(session.push("        pass").unwrap(), PushOutcome::NeedsMore { indent: 4 });
    assert!(matches!(session.push("").unwrap(), PushOutcome::Executed(_)));
}

#[test]
fn hopeless_unit_is_rejected_without_running() {
    let mut session = Session::new();
    match session.push("x = = 1") {
        Err(Error::SyntaxRejected(err)) => assert!(!err.is_incomplete()),
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(session.buffer().is_empty());
    assert!(printed(&mut session, "1").starts_with('1'));
}

// ========== Compiler flags ==========

#[test]
fn future_division_in_session() {
    let mut session = Session::new();
    session.push("from __future__ import division").unwrap();
    assert_eq!(printed(&mut session, "1 / 2"), "0.5\n");
}

#[test]
fn classic_division_without_directive() {
    let mut session = Session::new();
    assert_eq!(printed(&mut session, "1 / 2"), "0\n");
}

#[test]
fn flags_persist_and_never_shrink() {
    let mut session = Session::new();
    session.push("from __future__ import division, print_function").unwrap();
    let flags = session.flags();
    assert!(flags.contains(CompilerFlags::DIVISION | CompilerFlags::PRINT_FUNCTION));
    session.push("y = 1").unwrap();
    let _ = session.push("from __future__ import braces");
    assert_eq!(session.flags(), flags);
    assert_eq!(printed(&mut session, "3 / 2"), "1.5\n");
}

#[test]
fn script_directive_carries_into_console() {
    let mut session = Session::new();
    let mut out = session
        .run_script("from __future__ import division\nprint(1/2)\n")
        .stdout;
    out.push_str(&printed(&mut session, "1 / 2"));
    assert_eq!(out, "0.5\n0.5\n");
}

#[test]
fn initial_flags_apply_from_the_start() {
    let mut session = Session::new().with_flags(CompilerFlags::DIVISION);
    assert_eq!(printed(&mut session, "1 / 4"), "0.25\n");
}

// ========== History ==========

#[test]
fn last_word_recall_walks_back() {
    let mut log = HistoryLog::default();
    for entry in ["1", "2 3", "4 5 6"] {
        log.append(entry);
    }
    let mut session = Session::new().with_history(log);
    session.set_current_line("abcde");
    session.get_last_word();
    assert_eq!(session.current_line(), "abcde6");
    session.get_last_word();
    assert_eq!(session.current_line(), "abcde3");
}

#[test]
fn executed_units_enter_history() {
    let mut session = Session::new();
    session.push("def f():").unwrap();
    session.push("    return 1").unwrap();
    session.push("").unwrap();
    session.push("f()").unwrap();
    assert_eq!(session.history().entries(), ["def f():\n    return 1", "f()"]);
}

#[test]
fn history_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history");
    let mut session = Session::new();
    session.push("x = 'a\\\\b'").unwrap();
    session.push("if x:").unwrap();
    session.push("    x").unwrap();
    session.push("").unwrap();
    session.history().save(&path).unwrap();

    let loaded = HistoryLog::load(&path, 100).unwrap();
    assert_eq!(loaded.entries(), session.history().entries());
}

// ========== External editor ==========

#[test]
fn session_round_trip_with_non_ascii_text() {
    let mut session = Session::new();
    session.push("s = \"åß∂ƒ\"").unwrap();
    session.push("s").unwrap();
    let before = session.transcript();
    assert!(before.ends_with("'åß∂ƒ'"));

    assert!(session.send_session_to_external_editor(&mut Unchanged).unwrap());
    assert_eq!(session.transcript(), before);
}

#[test]
fn session_file_comments_out_output() {
    let mut session = Session::new();
    session.push("1 + 1").unwrap();
    let mut editor = Scripted::new("### nothing\n");
    assert!(!session.send_session_to_external_editor(&mut editor).unwrap());

    let shown = &editor.shown[0];
    assert!(shown.starts_with("### "));
    assert!(shown.contains("\n1 + 1\n### 2\n"));
    assert_eq!(session.transcript(), ">>> 1 + 1\n2");
}

#[test]
fn replay_drops_old_bindings() {
    let mut session = Session::new();
    session.push("secret = 1").unwrap();
    let mut editor = Scripted::new("visible = 2\n");
    assert!(session.send_session_to_external_editor(&mut editor).unwrap());
    assert!(session.push("secret").unwrap() != PushOutcome::NeedsMore { indent: 0 });
    assert!(session.transcript().contains("NameError: name 'secret' is not defined"));
    assert_eq!(printed(&mut session, "visible"), "2\n");
}

#[test]
fn replay_does_not_grow_history() {
    let mut session = Session::new();
    session.push("a = 1").unwrap();
    session.send_session_to_external_editor(&mut Unchanged).unwrap();
    assert_eq!(session.history().len(), 1);
}

#[test]
fn edited_block_is_fed_back_and_closed() {
    let mut session = Session::new();
    session.push("def double(x):").unwrap();
    session.set_current_line("    return x");
    let mut editor = Scripted::new("def double(x):\n    return x * 2\n\n\n");

    let outcomes = session.send_current_block_to_external_editor(&mut editor).unwrap();
    assert_eq!(editor.shown, ["def double(x):\n    return x"]);
    assert_eq!(outcomes.len(), 3);
    assert!(session.buffer().is_empty());
    assert_eq!(printed(&mut session, "double(21)"), "42\n");
}

#[test]
fn edited_single_line_runs_once() {
    let mut session = Session::new();
    session.set_current_line("40 + 1");
    let mut editor = Scripted::new("40 + 2");
    let outcomes = session.send_current_block_to_external_editor(&mut editor).unwrap();
    match outcomes.as_slice() {
        [FedLine::Pushed(PushOutcome::Executed(execution))] => assert_eq!(execution.stdout, "42\n"),
        other => panic!("unexpected outcomes {:?}", other),
    }
}

#[test]
fn bad_edited_line_does_not_swallow_the_rest() {
    let mut session = Session::new();
    let mut editor = Scripted::new("def f(x)\ny = 5\n");
    let outcomes = session.send_current_block_to_external_editor(&mut editor).unwrap();
    assert!(matches!(outcomes[0], FedLine::Rejected { .. }));
    assert_eq!(printed(&mut session, "y"), "5\n");
}
