//! Terminal input raced against Ctrl-C.
//!
//! A single task owns the SIGINT handler for the whole session and forwards
//! every press into a channel, so the REPL decides what an interrupt means:
//! abandon the reply while one is streaming, leave when idle at the prompt.

use std::io;

use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Interrupt,
    Eof,
}

/// Install the Ctrl-C handler and return the channel it feeds.
pub fn forward_interrupts() -> UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Next line from `lines`, unless an interrupt arrives first.
pub async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupts: &mut UnboundedReceiver<()>,
) -> io::Result<Input>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        biased;
        Some(()) = interrupts.recv() => Ok(Input::Interrupt),
        line = lines.next_line() => Ok(match line? {
            Some(line) => Input::Line(line),
            None => Input::Eof,
        }),
    }
}

/// Forget presses that arrived while nothing was listening for them.
pub fn discard_pending(interrupts: &mut UnboundedReceiver<()>) {
    while interrupts.try_recv().is_ok() {}
}
