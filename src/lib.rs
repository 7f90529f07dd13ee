//! snek: an interactive console for a small Python-like language.
//!
//! The interesting parts are the completeness detector in [`multiline`], the
//! indent predictor in [`indent`] and the [`session::Session`] that ties the
//! line buffer, history, compiler flags and editor round trips together.

pub mod ast;
pub mod buffer;
pub mod builtins;
pub mod config;
pub mod editor;
pub mod error;
pub mod eval;
pub mod highlight;
pub mod history;
pub mod indent;
pub mod loops;
pub mod multiline;
pub mod parser;
pub mod probe;
pub mod session;
pub mod tokenizer;
pub mod types;
