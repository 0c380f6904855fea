//! Drives one exchange, printing tokens as they accumulate.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use banter_protocol::Role;
use banter_session::{
    AppendOutcome, RegistryTransport, SessionController, SessionError, SessionStore,
};

/// Send `prompt` (or reload the last one) and echo the assistant response
/// to stdout as it streams in. Ctrl-C cancels via `stop()`.
pub async fn run(
    controller: &Arc<SessionController<RegistryTransport>>,
    prompt: Option<String>,
) -> anyhow::Result<()> {
    let exchange = {
        let controller = Arc::clone(controller);
        tokio::spawn(async move {
            match prompt {
                Some(prompt) => controller.append(&prompt).await,
                None => controller.reload().await,
            }
        })
    };
    tokio::pin!(exchange);

    let store = controller.store();
    // Id of the assistant message this exchange is filling, once observed.
    let mut response_id: Option<String> = None;
    let mut printed = 0;

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.stop();
            }
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if response_id.is_none() {
                    response_id = store.snapshot().pending_response_id;
                }
                if let Some(id) = response_id.as_deref() {
                    printed += print_new_content(&store, id, printed);
                }
            }
            joined = &mut exchange => {
                break joined?;
            }
        }
    };

    // Flush whatever the poll loop did not catch. When the exchange ended
    // before the pending id was ever observed, the whole response is still
    // unprinted; it is the trailing assistant message.
    match (&response_id, &result) {
        (Some(id), _) => {
            print_new_content(&store, id, printed);
        }
        (None, Ok(AppendOutcome::Completed | AppendOutcome::Stopped)) => {
            let snapshot = store.snapshot();
            if let Some(message) = snapshot.messages.iter().rev().find(|m| m.role == Role::Assistant)
            {
                print!("{}", message.content);
            }
        }
        _ => {}
    }
    println!();

    match result {
        Ok(AppendOutcome::Cancelled) => println!("[cancelled]"),
        Ok(AppendOutcome::Noop) => println!("[nothing to reload]"),
        Ok(_) => {}
        // Expected failures are notifications, not crashes.
        Err(SessionError::Generation(message)) => println!("[error] {message}"),
        Err(SessionError::Busy) => println!("[error] a response is already in flight"),
    }

    Ok(())
}

/// Print whatever the identified assistant message has gained since the
/// last call; returns how many bytes were written.
fn print_new_content(store: &SessionStore, response_id: &str, printed: usize) -> usize {
    let snapshot = store.snapshot();
    let Some(message) = snapshot.messages.iter().find(|m| m.id == response_id) else {
        return 0;
    };

    let Some(new) = message.content.get(printed..) else {
        return 0;
    };
    if !new.is_empty() {
        print!("{new}");
        std::io::stdout().flush().ok();
    }
    new.len()
}
