//! The console session: accumulates lines into units, decides when a unit
//! is ready, runs it, and keeps the transcript, history and compiler flags.

use tracing::{debug, info, warn};

use crate::buffer::LineBuffer;
use crate::editor::ExternalEditor;
use crate::error::{Error, Result, SyntaxError};
use crate::eval::{Evaluator, Execution, Interpreter};
use crate::history::{HistoryLog, RecallCursor};
use crate::indent::predicted_indent;
use crate::multiline::{classify, Completeness};
use crate::parser::Mode;
use crate::probe::compile;
use crate::types::CompilerFlags;

/// Primary prompt.
pub const PS1: &str = ">>> ";
/// Continuation prompt.
pub const PS2: &str = "... ";

/// Default indentation width.
pub const DEFAULT_TAB_LENGTH: usize = 4;

const SESSION_HEADER: &str = "### current snek session - make changes and save to reevaluate session.\n\
                              ### lines beginning with ### will be ignored";

/// Result of pushing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The unit was complete and has been run.
    Executed(Execution),
    /// More lines are needed; `indent` is the suggested indentation of the
    /// next one.
    NeedsMore { indent: usize },
}

/// What became of one line fed back from the external editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FedLine {
    Pushed(PushOutcome),
    /// The unit ending at this line was discarded. `rendered` is the error
    /// as the console prints it.
    Rejected { error: SyntaxError, rendered: String },
}

/// One transcript entry. Output is kept apart from typed code so that
/// output looking like a prompt is never replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TranscriptLine {
    Input { prompt: &'static str, code: String },
    Output(String),
}

impl TranscriptLine {
    fn display(&self) -> String {
        match self {
            TranscriptLine::Input { prompt, code } => format!("{}{}", prompt, code),
            TranscriptLine::Output(text) => text.clone(),
        }
    }
}

/// One interactive console.
pub struct Session<E: Evaluator = Interpreter> {
    evaluator: E,
    buffer: LineBuffer,
    history: HistoryLog,
    recall: RecallCursor,
    flags: CompilerFlags,
    initial_flags: CompilerFlags,
    transcript: Vec<TranscriptLine>,
    tab_length: usize,
}

impl Default for Session<Interpreter> {
    fn default() -> Self {
        Self::new()
    }
}

impl Session<Interpreter> {
    pub fn new() -> Self {
        Session::with_evaluator(Interpreter::new())
    }
}

impl<E: Evaluator> Session<E> {
    pub fn with_evaluator(evaluator: E) -> Self {
        Session {
            evaluator,
            buffer: LineBuffer::new(),
            history: HistoryLog::default(),
            recall: RecallCursor::Idle,
            flags: CompilerFlags::empty(),
            initial_flags: CompilerFlags::empty(),
            transcript: Vec::new(),
            tab_length: DEFAULT_TAB_LENGTH,
        }
    }

    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = history;
        self
    }

    pub fn with_tab_length(mut self, tab_length: usize) -> Self {
        self.tab_length = tab_length;
        self
    }

    /// Flags every unit starts with, and the flags a replayed session
    /// returns to.
    pub fn with_flags(mut self, flags: CompilerFlags) -> Self {
        self.flags = flags;
        self.initial_flags = flags;
        self
    }

    pub fn flags(&self) -> CompilerFlags {
        self.flags
    }

    pub fn tab_length(&self) -> usize {
        self.tab_length
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryLog {
        &mut self.history
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Committed lines of the unit being entered.
    pub fn buffer(&self) -> &[String] {
        self.buffer.lines()
    }

    /// Prompt for the next line.
    pub fn prompt(&self) -> &'static str {
        if self.buffer.is_empty() {
            PS1
        } else {
            PS2
        }
    }

    /// Names visible at top level.
    pub fn names(&self) -> Vec<String> {
        self.evaluator.names()
    }

    /// Commit `line` to the buffer and act on the result.
    pub fn push(&mut self, line: &str) -> Result<PushOutcome> {
        match self.feed_line(line, true) {
            FedLine::Pushed(outcome) => Ok(outcome),
            FedLine::Rejected { error, .. } => Err(Error::SyntaxRejected(error)),
        }
    }

    fn feed_line(&mut self, line: &str, record_history: bool) -> FedLine {
        let prompt = self.prompt();
        self.transcript.push(TranscriptLine::Input {
            prompt,
            code: line.to_string(),
        });
        self.buffer.push_line(line);
        self.buffer.set_current_line("");
        self.recall.reset();

        let source = self.buffer.joined();
        match classify(&source) {
            Completeness::NeedsMore => {
                let indent = predicted_indent(line, self.tab_length);
                debug!(lines = self.buffer.len(), indent, "unit needs more input");
                FedLine::Pushed(PushOutcome::NeedsMore { indent })
            }
            Completeness::Finished => {
                self.buffer.clear();
                let execution = self.evaluator.execute(&source, self.flags);
                if execution.flags != self.flags {
                    info!(flags = ?execution.flags, "compiler flags changed");
                }
                self.flags |= execution.flags;
                if record_history && is_worth_recording(&source) {
                    self.history.append(&source);
                }
                self.record_output(&execution.stdout);
                self.record_output(&execution.stderr);
                FedLine::Pushed(PushOutcome::Executed(execution))
            }
            Completeness::Rejected => {
                self.buffer.clear();
                let error = match compile(&source, Mode::Single) {
                    Err(error) => error,
                    Ok(_) => SyntaxError::invalid("invalid syntax", 1, 0),
                };
                warn!(%error, "unit rejected");
                let rendered = error.render(&source);
                self.record_output(&rendered);
                FedLine::Rejected { error, rendered }
            }
        }
    }

    /// Drop the unit being entered (Ctrl-C). Its lines leave the
    /// transcript too, so a replayed session never sees half a unit.
    pub fn interrupt(&mut self) {
        let pending = self.buffer.len();
        debug!(lines = pending, "unit discarded");
        self.transcript.truncate(self.transcript.len().saturating_sub(pending));
        self.buffer.clear();
        self.set_current_line("");
    }

    fn record_output(&mut self, text: &str) {
        self.transcript
            .extend(text.lines().map(|line| TranscriptLine::Output(line.to_string())));
    }

    /// Run a whole script in the session's namespace, adopting any flags it
    /// declares.
    pub fn run_script(&mut self, source: &str) -> Execution {
        let execution = self.evaluator.run_script(source, self.flags);
        self.flags |= execution.flags;
        execution
    }

    pub fn current_line(&self) -> &str {
        self.buffer.current_line()
    }

    pub fn set_current_line(&mut self, text: &str) {
        self.buffer.set_current_line(text);
        self.recall.reset();
    }

    /// Committed lines followed by the current line.
    pub fn current_block(&self) -> String {
        self.buffer.current_block()
    }

    /// Append the last word of an earlier history entry to the current line.
    /// Repeated calls replace that word with one from further back.
    pub fn get_last_word(&mut self) {
        if let Some(line) = self.recall.recall(&self.history, self.buffer.current_line()) {
            self.buffer.set_current_line(&line);
        }
    }

    /// Display lines joined with newlines.
    pub fn transcript(&self) -> String {
        self.transcript
            .iter()
            .map(TranscriptLine::display)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Let the user rewrite the unit being entered, then feed the result
    /// back in line by line, as if pasted. A rejected unit does not stop the
    /// lines after it.
    pub fn send_current_block_to_external_editor(
        &mut self,
        editor: &mut impl ExternalEditor,
    ) -> Result<Vec<FedLine>> {
        let text = editor.edit(&self.current_block())?;
        let mut lines: Vec<&str> = text.split('\n').collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        debug!(lines = lines.len(), "re-feeding edited block");

        let pending = self.buffer.len();
        self.transcript.truncate(self.transcript.len().saturating_sub(pending));
        self.buffer.clear();
        self.set_current_line("");

        let mut outcomes = Vec::with_capacity(lines.len());
        for line in lines {
            outcomes.push(self.feed_line(line, true));
        }
        for _ in 0..2 {
            if self.buffer.is_empty() {
                break;
            }
            outcomes.push(self.feed_line("", true));
        }
        Ok(outcomes)
    }

    /// Let the user rewrite the whole session, then replay it from scratch.
    ///
    /// Returns `false` when the edited file had no code in it, in which case
    /// nothing changes.
    pub fn send_session_to_external_editor(
        &mut self,
        editor: &mut impl ExternalEditor,
    ) -> Result<bool> {
        let text = editor.edit(&self.session_for_editor())?;

        let mut lines: Vec<&str> = text.split('\n').collect();
        if lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        let current_line = match lines.last().and_then(|line| line.strip_prefix("### ")) {
            Some(rest) => {
                lines.pop();
                rest.to_string()
            }
            None => String::new(),
        };
        let code: Vec<&str> = lines.into_iter().filter(|line| !line.starts_with("###")).collect();
        if code.iter().all(|line| line.trim().is_empty()) {
            info!("edited session was blank, not reevaluating");
            return Ok(false);
        }

        info!(lines = code.len(), "reevaluating session");
        self.evaluator.reset();
        self.flags = self.initial_flags;
        self.transcript.clear();
        self.buffer.clear();
        // Rejected units are already in the transcript.
        for line in code {
            self.feed_line(line, false);
        }
        for _ in 0..2 {
            if self.buffer.is_empty() {
                break;
            }
            self.feed_line("", false);
        }
        self.set_current_line(&current_line);
        Ok(true)
    }

    /// The transcript as an editable file: code lines without prompts,
    /// output lines commented out, current line last.
    fn session_for_editor(&self) -> String {
        let mut out = String::from(SESSION_HEADER);
        for line in &self.transcript {
            out.push('\n');
            match line {
                TranscriptLine::Input { code, .. } => out.push_str(code),
                TranscriptLine::Output(text) => {
                    out.push_str("### ");
                    out.push_str(text);
                }
            }
        }
        out.push_str("\n### ");
        out.push_str(self.buffer.current_line());
        out.push('\n');
        out
    }
}

/// Blank and comment-only units stay out of history.
fn is_worth_recording(unit: &str) -> bool {
    unit.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}

/// Keys and commands of the interactive console.
pub fn help_text() -> String {
    format!(
        "snek {version}\n\
         \n\
         <Enter>         run the unit, or continue it with a new line\n\
         <Alt-.>         insert the last word of an earlier entry\n\
         <Ctrl-C>        discard the unit being entered\n\
         <Ctrl-D>        exit\n\
         :edit           edit the current unit in an external editor\n\
         :edit-session   edit and replay the whole session\n\
         :help           show this text",
        version = crate::config::VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;

    struct Identity;

    impl ExternalEditor for Identity {
        fn edit(&mut self, initial: &str) -> std::result::Result<String, EditorError> {
            Ok(initial.to_string())
        }
    }

    struct Replace(&'static str);

    impl ExternalEditor for Replace {
        fn edit(&mut self, _initial: &str) -> std::result::Result<String, EditorError> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    impl ExternalEditor for Broken {
        fn edit(&mut self, _initial: &str) -> std::result::Result<String, EditorError> {
            Err(EditorError::NotConfigured)
        }
    }

    fn stdout_of(outcome: PushOutcome) -> String {
        match outcome {
            PushOutcome::Executed(execution) => execution.stdout,
            other => panic!("expected execution, got {:?}", other),
        }
    }

    #[test]
    fn test_push_simple_expression() {
        let mut session = Session::new();
        assert_eq!(stdout_of(session.push("1 + 1").unwrap()), "2\n");
        assert!(session.buffer().is_empty());
        assert_eq!(session.history().entries(), ["1 + 1"]);
    }

    #[test]
    fn test_push_block_needs_more() {
        let mut session = Session::new();
        assert_eq!(
            session.push("def foo(x):").unwrap(),
            PushOutcome::NeedsMore { indent: 4 }
        );
        assert_eq!(session.prompt(), PS2);
        assert_eq!(
            session.push("    return x * 2").unwrap(),
            PushOutcome::NeedsMore { indent: 0 }
        );
        assert!(matches!(session.push("").unwrap(), PushOutcome::Executed(_)));
        assert_eq!(stdout_of(session.push("foo(21)").unwrap()), "42\n");
    }

    #[test]
    fn test_rejected_unit_clears_buffer() {
        let mut session = Session::new();
        session.push("def foo(x):").unwrap();
        let err = session.push("return 1").unwrap_err();
        assert!(matches!(err, Error::SyntaxRejected(_)));
        assert!(session.buffer().is_empty());
        assert!(session.transcript().contains("SyntaxError"));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_future_division_persists() {
        let mut session = Session::new();
        session.push("from __future__ import division").unwrap();
        assert!(session.flags().contains(CompilerFlags::DIVISION));
        assert_eq!(stdout_of(session.push("1 / 2").unwrap()), "0.5\n");
        session.push("x = 3").unwrap();
        assert_eq!(stdout_of(session.push("x / 2").unwrap()), "1.5\n");
    }

    #[test]
    fn test_floor_division_without_directive() {
        let mut session = Session::new();
        assert_eq!(stdout_of(session.push("1 / 2").unwrap()), "0\n");
    }

    #[test]
    fn test_script_flags_carry_into_session() {
        let mut session = Session::new();
        let execution = session.run_script("from __future__ import division\nprint(1/2)\n");
        assert_eq!(execution.stdout, "0.5\n");
        assert_eq!(stdout_of(session.push("1 / 2").unwrap()), "0.5\n");
    }

    #[test]
    fn test_get_last_word() {
        let mut session = Session::new();
        for entry in ["1", "2 3", "4 5 6"] {
            session.history_mut().append(entry);
        }
        session.set_current_line("abcde");
        session.get_last_word();
        assert_eq!(session.current_line(), "abcde6");
        session.get_last_word();
        assert_eq!(session.current_line(), "abcde3");
        session.get_last_word();
        assert_eq!(session.current_line(), "abcde1");
        session.get_last_word();
        assert_eq!(session.current_line(), "abcde1");
    }

    #[test]
    fn test_edit_resets_recall() {
        let mut session = Session::new();
        session.history_mut().append("a b");
        session.set_current_line("x ");
        session.get_last_word();
        session.set_current_line("y ");
        session.get_last_word();
        assert_eq!(session.current_line(), "y b");
    }

    #[test]
    fn test_comment_units_not_recorded() {
        let mut session = Session::new();
        session.push("# just a note").unwrap();
        session.push("").unwrap();
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_current_block_round_trip() {
        let mut session = Session::new();
        session.push("def foo(x):").unwrap();
        session.set_current_line("    return x + 1");
        let outcomes = session.send_current_block_to_external_editor(&mut Identity).unwrap();
        assert!(matches!(
            outcomes.last(),
            Some(FedLine::Pushed(PushOutcome::Executed(_)))
        ));
        assert!(session.buffer().is_empty());
        assert_eq!(session.current_line(), "");
        assert_eq!(stdout_of(session.push("foo(1)").unwrap()), "2\n");
        assert_eq!(
            session.transcript(),
            ">>> def foo(x):\n...     return x + 1\n... \n>>> foo(1)\n2"
        );
    }

    #[test]
    fn test_edited_block_continues_past_rejected_line() {
        let mut session = Session::new();
        session.set_current_line("def f(x):");
        let outcomes = session
            .send_current_block_to_external_editor(&mut Replace("def f(x)\ny = 5\ny\n"))
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        match &outcomes[0] {
            FedLine::Rejected { error, rendered } => {
                assert!(!error.is_incomplete());
                assert!(rendered.ends_with("SyntaxError: invalid syntax\n"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        match &outcomes[2] {
            FedLine::Pushed(PushOutcome::Executed(execution)) => assert_eq!(execution.stdout, "5\n"),
            other => panic!("expected execution, got {:?}", other),
        }
        assert_eq!(session.history().entries(), ["y = 5", "y"]);
    }

    #[test]
    fn test_prompt_like_output_is_not_replayed() {
        let mut session = Session::new();
        session.push("print('>>> 40 + 2')").unwrap();
        let before = session.transcript();
        assert_eq!(before, ">>> print('>>> 40 + 2')\n>>> 40 + 2");

        assert!(session.send_session_to_external_editor(&mut Identity).unwrap());
        assert_eq!(session.transcript(), before);
    }

    #[test]
    fn test_session_round_trip_reproduces_transcript() {
        let mut session = Session::new();
        session.push("x = 1").unwrap();
        session.push("x").unwrap();
        session.push("\"åß∂ƒ\"").unwrap();
        session.set_current_line("x +");
        let before = session.transcript();

        assert!(session.send_session_to_external_editor(&mut Identity).unwrap());
        assert_eq!(session.transcript(), before);
        assert_eq!(session.current_line(), "x +");
        assert!(before.contains("'åß∂ƒ'"));
    }

    #[test]
    fn test_session_replay_uses_edited_code() {
        let mut session = Session::new();
        session.push("from __future__ import division").unwrap();
        session.push("y = 10").unwrap();

        let edited = "### header\nx = 7\nx\n### 7\n### x * 2\n";
        assert!(session.send_session_to_external_editor(&mut Replace(edited)).unwrap());
        assert_eq!(session.transcript(), ">>> x = 7\n>>> x\n7");
        assert_eq!(session.current_line(), "x * 2");
        assert!(session.flags().is_empty());
        assert!(session.names().iter().all(|name| name != "y"));
    }

    #[test]
    fn test_blank_session_edit_changes_nothing() {
        let mut session = Session::new();
        session.push("x = 1").unwrap();
        assert!(!session.send_session_to_external_editor(&mut Replace("### all gone\n\n")).unwrap());
        assert_eq!(session.transcript(), ">>> x = 1");
    }

    #[test]
    fn test_editor_failure_leaves_session_unchanged() {
        let mut session = Session::new();
        session.push("if True:").unwrap();
        session.set_current_line("    pass");
        let transcript = session.transcript();

        assert!(matches!(
            session.send_current_block_to_external_editor(&mut Broken),
            Err(Error::Editor(EditorError::NotConfigured))
        ));
        assert!(session.send_session_to_external_editor(&mut Broken).is_err());
        assert_eq!(session.transcript(), transcript);
        assert_eq!(session.buffer(), ["if True:"]);
        assert_eq!(session.current_line(), "    pass");
    }

    #[test]
    fn test_interrupt_discards_unit() {
        let mut session = Session::new();
        session.push("while True:").unwrap();
        session.interrupt();
        assert!(session.buffer().is_empty());
        assert_eq!(session.prompt(), PS1);
        assert_eq!(stdout_of(session.push("3").unwrap()), "3\n");
        assert_eq!(session.transcript(), ">>> 3\n3");
    }

    #[test]
    fn test_help_text_lists_commands() {
        let help = help_text();
        assert!(help.contains(":edit-session"));
        assert!(help.contains("Alt-."));
    }
}
