use crate::ast::{Expr, Stmt};
use crate::builtins::collections;
use crate::error::Exception;
use crate::eval::{self, Flow, Frame};
use crate::types::State;

// ========== Loop executors ==========

/// Execute a `while test: body else: orelse` loop.
///
/// The `else` suite runs only when the test turns false, not after `break`.
/// A `return` inside the body propagates out of the loop.
pub fn execute_while(
    state: &mut State,
    frame: &Frame,
    test: &Expr,
    body: &[Stmt],
    orelse: &[Stmt],
) -> Result<Flow, Exception> {
    while eval::eval_expr(state, frame, test)?.truthy() {
        match eval::exec_block(state, frame, body)? {
            Flow::Break => return Ok(Flow::Normal),
            Flow::Return(value) => return Ok(Flow::Return(value)),
            Flow::Continue | Flow::Normal => {}
        }
    }
    eval::exec_block(state, frame, orelse)
}

/// Execute a `for target in iter: body else: orelse` loop.
///
/// Iterates over a snapshot of the sequence taken when the loop starts, so
/// mutating a list inside its own loop does not change the iteration count.
pub fn execute_for(
    state: &mut State,
    frame: &Frame,
    target: &Expr,
    iter: &Expr,
    body: &[Stmt],
    orelse: &[Stmt],
) -> Result<Flow, Exception> {
    let sequence = eval::eval_expr(state, frame, iter)?;
    for item in collections::iterate(&sequence)? {
        eval::assign_target(state, frame, target, item)?;
        match eval::exec_block(state, frame, body)? {
            Flow::Break => return Ok(Flow::Normal),
            Flow::Return(value) => return Ok(Flow::Return(value)),
            Flow::Continue | Flow::Normal => {}
        }
    }
    eval::exec_block(state, frame, orelse)
}
