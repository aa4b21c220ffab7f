//! Running one session operation through the event bridge.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use bear_core::bridge::{spawn_turn, BridgeMessage};
use bear_core::model::{Effect, ModelMsg, TurnModel, WINDOW_LINES};
use bear_core::{AgentError, SpecWriter};

/// A session shared between the prompt loop and the turn thread.
pub type SharedSession<S> = Arc<Mutex<S>>;

pub fn lock<S>(session: &SharedSession<S>) -> MutexGuard<'_, S> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

/// Run `op` against the session on a worker thread, echoing stream messages
/// to stderr until the turn ends or the user presses Ctrl-C.
pub async fn run_turn<S, T, F>(
    session: &SharedSession<S>,
    capacity: usize,
    label: &str,
    op: F,
) -> Result<T, AgentError>
where
    S: SpecWriter + 'static,
    T: Send + 'static,
    F: FnOnce(&mut S) -> Result<T, AgentError> + Send + 'static,
{
    let cancel = lock(session).cancel_token();
    let shared = Arc::clone(session);
    let mut stream = spawn_turn(capacity, move |sink| {
        let sink = sink.clone();
        let mut session = lock(&shared);
        session.set_stream_callback(Some(Box::new(move |message| {
            sink.emit(message);
        })));
        let result = op(&mut *session);
        session.set_stream_callback(None);
        result
    })
    .with_cancel(cancel);

    eprintln!("… {}", label);
    let mut model = TurnModel::new();
    loop {
        let msg = tokio::select! {
            next = stream.next() => match next {
                Some(message) => ModelMsg::Bridge(message),
                None => ModelMsg::Closed,
            },
            _ = tokio::signal::ctrl_c() => ModelMsg::Interrupt,
        };

        if let ModelMsg::Bridge(BridgeMessage::Event(ref message)) = msg {
            let mut err = std::io::stderr().lock();
            for line in message.display_lines(WINDOW_LINES) {
                let _ = writeln!(err, "  {}", line);
            }
        }
        let interrupted = matches!(msg, ModelMsg::Interrupt);

        match model.update(msg) {
            Effect::WaitForNext | Effect::None => continue,
            Effect::Quit => {
                if interrupted {
                    stream.abort();
                    wait_for_turn_thread(session).await;
                }
                break;
            }
        }
    }

    log::debug!(
        "{} ended in {:?} after {} events",
        label,
        model.state(),
        model.events()
    );
    debug_assert!(model.state().is_terminal());
    model.take_outcome().unwrap_or(Err(AgentError::Cancelled))
}

/// The turn thread holds the session lock until its agent process is gone.
async fn wait_for_turn_thread<S: Send + 'static>(session: &SharedSession<S>) {
    let shared = Arc::clone(session);
    let _ = tokio::task::spawn_blocking(move || drop(lock(&shared))).await;
}
