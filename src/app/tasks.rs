//! Background task plumbing.

use super::AppEvent;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Wraps a future to catch panics and convert them to errors.
///
/// Spawned tasks that panic would otherwise vanish silently; this turns the
/// panic payload into `Err(message)` so the UI can report it.
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            format!("Unknown panic: {:?}", (*panic).type_id())
        }
    })
}

/// Sends an event, logging instead of failing when the loop is gone.
pub(super) async fn send(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
    if let Err(e) = tx.send(event).await {
        tracing::warn!(error = %e, "Channel send failed (receiver dropped)");
    }
}

/// Spawns `work` and delivers the event it produces.
///
/// A panic inside `work` is reported as [`AppEvent::TaskPanicked`]. Work
/// that yields `None` sends nothing.
pub(super) fn spawn_task<F>(task: &'static str, tx: mpsc::Sender<AppEvent>, work: F)
where
    F: Future<Output = Option<AppEvent>> + Send + 'static,
{
    tokio::spawn(async move {
        match catch_task_panic(work).await {
            Ok(Some(event)) => send(&tx, event).await,
            Ok(None) => {}
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                send(&tx, AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                })
                .await;
            }
        }
    });
}
