use super::event::{RuntimeEvent, TurnUpdate};
use crate::api::TokenSource;
use crate::state::{ChatSession, RequestTicket};
use anyhow::{bail, Result};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How a driven turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
}

/// Streams the response for `ticket` on a background task.
///
/// Once the ticket is cancelled the task stops reading and sends nothing
/// further; no partial state is flushed.
pub fn spawn_turn(
    source: Arc<dyn TokenSource>,
    ticket: &RequestTicket,
    tx: mpsc::UnboundedSender<RuntimeEvent>,
) -> JoinHandle<()> {
    let request_id = ticket.id;
    let prompt = ticket.prompt.clone();
    let cancel = ticket.cancel.clone();

    tokio::spawn(async move {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = source.open_stream(&prompt) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(error) => {
                let _ = tx.send(RuntimeEvent::Failed {
                    request_id,
                    error: format!("{error:#}"),
                });
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                item = stream.next() => {
                    let event = match item {
                        Some(Ok(bytes)) => RuntimeEvent::Chunk { request_id, bytes },
                        Some(Err(error)) => RuntimeEvent::Failed {
                            request_id,
                            error: format!("{error:#}"),
                        },
                        None => RuntimeEvent::Finished { request_id },
                    };
                    let terminal = !matches!(event, RuntimeEvent::Chunk { .. });
                    if tx.send(event).is_err() || terminal {
                        return;
                    }
                }
            }
        }
    })
}

/// Applies one streaming event to the session.
pub fn handle_event(session: &mut ChatSession, event: RuntimeEvent) -> TurnUpdate {
    match event {
        RuntimeEvent::Chunk { request_id, bytes } => match session.apply_chunk(request_id, &bytes) {
            Some(progress) => TurnUpdate::Tokens(progress.tokens),
            None => TurnUpdate::Ignored,
        },
        RuntimeEvent::Finished { request_id } => {
            if session.finish(request_id) {
                TurnUpdate::Finished
            } else {
                TurnUpdate::Ignored
            }
        }
        RuntimeEvent::Failed { request_id, error } => {
            if session.finish(request_id) {
                TurnUpdate::Failed(error)
            } else {
                TurnUpdate::Ignored
            }
        }
    }
}

/// Submits `input`, streams the reply into `session` and reports each token.
///
/// Cancelling the returned ticket's token (from a signal handler, say) ends
/// the turn with [`TurnOutcome::Cancelled`]. `on_submit` runs right after the
/// user turn is appended and receives the ticket before streaming starts.
pub async fn drive_turn(
    session: &mut ChatSession,
    source: Arc<dyn TokenSource>,
    input: &str,
    on_submit: impl FnOnce(&RequestTicket),
    mut on_token: impl FnMut(&str),
) -> Result<TurnOutcome> {
    let ticket = session.submit(input);
    on_submit(&ticket);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = spawn_turn(source, &ticket, tx);

    let outcome = loop {
        let event = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => None,
            event = rx.recv() => event,
        };

        // Cancelled, or the task exited without a terminal event.
        let Some(event) = event else {
            session.abort();
            break TurnOutcome::Cancelled;
        };

        match handle_event(session, event) {
            TurnUpdate::Tokens(tokens) => tokens.iter().for_each(|token| on_token(token)),
            TurnUpdate::Finished => break TurnOutcome::Completed,
            TurnUpdate::Failed(error) => {
                task.abort();
                bail!("completion stream failed: {error}");
            }
            TurnUpdate::Ignored => {}
        }
    };

    task.abort();
    Ok(outcome)
}
