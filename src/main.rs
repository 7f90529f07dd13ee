use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Editor, EventHandler, KeyEvent};
use tracing::{debug, warn};

use snek::config::{self, Config};
use snek::editor::CommandEditor;
use snek::error::Error;
use snek::eval::Execution;
use snek::highlight::{LastWordHandler, SnekHelper};
use snek::history::HistoryLog;
use snek::session::{help_text, FedLine, PushOutcome, Session};

#[derive(Parser)]
#[command(name = "snek", version)]
#[command(about = "Interactive console for a small Python-like language", long_about = None)]
struct Cli {
    /// Script to run before the session starts
    script: Option<PathBuf>,

    /// Stay interactive after running the script
    #[arg(short, long)]
    interactive: bool,

    /// Config file [default: ~/.config/snek/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "snek=debug" } else { "warn" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path.map(Path::to_path_buf).or_else(config::config_path) {
        Some(path) => Ok(Config::load(&path)?),
        None => Ok(Config::default()),
    }
}

fn load_history(config: &Config) -> HistoryLog {
    let Some(path) = config.history_path() else {
        return HistoryLog::new(config.hist_length);
    };
    HistoryLog::load(&path, config.hist_length).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "could not read history");
        HistoryLog::new(config.hist_length)
    })
}

fn save_history(session: &Session, config: &Config) {
    if let Some(path) = config.history_path() {
        if let Err(e) = session.history().save(&path) {
            warn!(path = %path.display(), error = %e, "could not save history");
        }
    }
}

/// Print what a unit wrote.
fn show(execution: &Execution) {
    print!("{}", execution.stdout);
    eprint!("{}", execution.stderr);
    io::stdout().flush().ok();
}

/// Push a line and print the result. Returns the indentation for the next
/// line.
fn push_and_show(session: &mut Session, line: &str) -> usize {
    let mut lines = session.buffer().to_vec();
    lines.push(line.to_string());
    let source = lines.join("\n");

    match session.push(line) {
        Ok(PushOutcome::Executed(execution)) => {
            show(&execution);
            0
        }
        Ok(PushOutcome::NeedsMore { indent }) => indent,
        Err(Error::SyntaxRejected(err)) => {
            eprint!("{}", err.render(&source));
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            0
        }
    }
}

fn show_outcomes(outcomes: &[FedLine]) -> usize {
    let mut indent = 0;
    for outcome in outcomes {
        match outcome {
            FedLine::Pushed(PushOutcome::Executed(execution)) => {
                show(execution);
                indent = 0;
            }
            FedLine::Pushed(PushOutcome::NeedsMore { indent: next }) => indent = *next,
            FedLine::Rejected { rendered, .. } => {
                eprint!("{}", rendered);
                indent = 0;
            }
        }
    }
    indent
}

/// Run the interactive console with rustyline (when stdin is a TTY).
fn run_interactive(session: &mut Session, config: &Config, mut editor: Option<CommandEditor>) {
    let mut rl = match Editor::with_config(rustyline::Config::builder().auto_add_history(true).build()) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to initialize line editor: {}", e);
            run_simple(session);
            return;
        }
    };
    rl.set_helper(Some(SnekHelper::new(config.color)));

    let last_word = LastWordHandler::new();
    rl.bind_sequence(
        KeyEvent::alt('.'),
        EventHandler::Conditional(Box::new(last_word.clone())),
    );
    for line in session.history().entries().iter().flat_map(|entry| entry.lines()) {
        let _ = rl.add_history_entry(line);
    }

    println!("snek {}", config::VERSION);
    println!("Type :help for help, Ctrl-D to exit");

    let mut prefill = String::new();
    loop {
        if let Some(helper) = rl.helper_mut() {
            helper.update_names(session.names());
        }
        last_word.refresh(session.history());

        let line = match rl.readline_with_initial(session.prompt(), (prefill.as_str(), "")) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C: drop the unit, keep the session
                println!("KeyboardInterrupt");
                session.interrupt();
                prefill.clear();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("Read error: {}", err);
                break;
            }
        };

        let indent = match line.trim() {
            ":help" => {
                println!("{}", help_text());
                0
            }
            ":edit" | ":edit-session" => {
                let Some(editor) = editor.as_mut() else {
                    eprintln!("No editor configured; set `editor` in the config file or $EDITOR");
                    prefill.clear();
                    continue;
                };
                session.set_current_line("");
                if line.trim() == ":edit" {
                    match session.send_current_block_to_external_editor(editor) {
                        Ok(outcomes) => show_outcomes(&outcomes),
                        Err(e) => {
                            eprintln!("{}", e);
                            0
                        }
                    }
                } else {
                    match session.send_session_to_external_editor(editor) {
                        Ok(true) => {
                            println!("{}", session.transcript());
                            prefill = session.current_line().to_string();
                            continue;
                        }
                        Ok(false) => {
                            println!("Session not reevaluated because the saved file was blank");
                            0
                        }
                        Err(e) => {
                            eprintln!("{}", e);
                            0
                        }
                    }
                }
            }
            _ => push_and_show(session, &line),
        };
        prefill = " ".repeat(indent);
    }
}

/// Run without line editing (when stdin is not a TTY).
fn run_simple(session: &mut Session) {
    for line in io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                push_and_show(session, &line);
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
    // close any block left open at end of input
    for _ in 0..2 {
        if session.buffer().is_empty() {
            break;
        }
        push_and_show(session, "");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "starting");

    let mut session = Session::new()
        .with_history(load_history(&config))
        .with_tab_length(config.tab_length);

    if let Some(script) = &cli.script {
        let source = fs::read_to_string(script)
            .with_context(|| format!("failed to read {}", script.display()))?;
        let execution = session.run_script(&source);
        show(&execution);
        if !cli.interactive {
            if !execution.succeeded() {
                std::process::exit(1);
            }
            return Ok(());
        }
    }

    let editor = config
        .editor
        .clone()
        .map(CommandEditor::new)
        .or_else(CommandEditor::from_env);

    if io::stdin().is_terminal() {
        run_interactive(&mut session, &config, editor);
    } else {
        run_simple(&mut session);
    }

    save_history(&session, &config);
    Ok(())
}
