//! Background task spawning shared by the input handlers.
//!
//! Every backend call runs in its own task and reports back through the
//! `AppEvent` channel, so the UI loop never waits on the network.

use crate::app::{App, AppEvent};
use crate::model::{BookmarkId, NewBookmark};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Wraps a future to catch panics and convert them to errors.
///
/// If the future panics, the panic payload is extracted as a string.
/// This prevents a panicking background task from silently dying and
/// lets the UI report it through `AppEvent::TaskPanicked`.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Send an event, logging if the UI has already gone away.
async fn send_event(tx: &mpsc::Sender<AppEvent>, event: AppEvent, name: &'static str) {
    if let Err(e) = tx.send(event).await {
        tracing::warn!(error = %e, event = name, "Channel send failed (receiver dropped)");
    }
}

/// Run `work` in a panic-catching task; a panic becomes `TaskPanicked`.
fn spawn_reporting<F>(task: &'static str, tx: mpsc::Sender<AppEvent>, work: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic_msg) = catch_task_panic(work).await {
            tracing::error!(task, error = %panic_msg, "Background task panicked");
            send_event(
                &tx,
                AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                },
                "TaskPanicked",
            )
            .await;
        }
    })
}

/// Create a bookmark on the backend.
pub(super) fn spawn_save(app: &App, new: NewBookmark, event_tx: &mpsc::Sender<AppEvent>) {
    let backend = app.backend.clone();
    let tx = event_tx.clone();
    tracing::debug!(url = %new.url, "Spawning save task");

    spawn_reporting("save_bookmark", event_tx.clone(), async move {
        let event = match backend.insert(&new).await {
            Ok(created) => AppEvent::BookmarkSaved(created),
            Err(e) => AppEvent::BookmarkSaveFailed {
                error: e.to_string(),
            },
        };
        send_event(&tx, event, "BookmarkSaved").await;
    });
}

/// Delete a bookmark on the backend. The caller has already removed it
/// optimistically.
pub(super) fn spawn_delete(app: &App, id: BookmarkId, event_tx: &mpsc::Sender<AppEvent>) {
    let backend = app.backend.clone();
    let owner = app.owner().clone();
    let tx = event_tx.clone();
    tracing::debug!(id = %id, "Spawning delete task");

    spawn_reporting("delete_bookmark", event_tx.clone(), async move {
        let event = match backend.delete_bookmark(&owner, &id).await {
            Ok(()) => AppEvent::BookmarkDeleted { id },
            Err(e) => {
                tracing::error!(error = %e, id = %id, "Failed to delete bookmark");
                AppEvent::BookmarkDeleteFailed {
                    id,
                    error: e.to_string(),
                }
            }
        };
        send_event(&tx, event, "BookmarkDeleted").await;
    });
}

/// Reload the full list, superseding any reload already in flight.
pub(super) fn spawn_reload(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(handle) = app.reload_handle.take() {
        handle.abort();
        tracing::debug!("Aborted previous reload task");
    }

    let generation = app.start_reload();
    let backend = app.backend.clone();
    let owner = app.owner().clone();
    let tx = event_tx.clone();
    app.set_status("Reloading...");

    app.reload_handle = Some(spawn_reporting("reload", event_tx.clone(), async move {
        let result = backend
            .list_by_owner(&owner)
            .await
            .map_err(|e| e.to_string());
        send_event(
            &tx,
            AppEvent::BookmarksReloaded { generation, result },
            "BookmarksReloaded",
        )
        .await;
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_ok() {
        let result = catch_task_panic(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_catch_task_panic_captures_message() {
        let result: Result<(), String> = catch_task_panic(async {
            panic!("something broke");
        })
        .await;
        assert_eq!(result, Err("something broke".to_string()));
    }

    #[tokio::test]
    async fn test_catch_task_panic_formatted_message() {
        let id = 7;
        let result: Result<(), String> = catch_task_panic(async move {
            panic!("bookmark {} broke", id);
        })
        .await;
        assert_eq!(result, Err("bookmark 7 broke".to_string()));
    }

    #[tokio::test]
    async fn test_panicking_task_reports_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_reporting("test_task", tx.clone(), async {
            panic!("kaboom");
        });
        handle.await.unwrap();

        match rx.recv().await {
            Some(AppEvent::TaskPanicked { task, error }) => {
                assert_eq!(task, "test_task");
                assert_eq!(error, "kaboom");
            }
            _ => panic!("Expected TaskPanicked event"),
        }
    }
}
