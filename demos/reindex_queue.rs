//! # Demo: reindex_queue
//!
//! A full-text reindex queue feeding the manager: one task per space, each
//! indexing its object ids one at a time with a checkpoint in between.
//! At most two spaces are indexed at once; the most active spaces go first.
//!
//! ## Flow
//! ```text
//! spaces ──► add_task(SpaceReindex) ──► Manager (cap = 2)
//!                                          │
//! activity bump ──► refresh_priority() ────┤  sorter: rank_by(activity desc)
//!                                          ▼
//!                           pause / resume at each checkpoint
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example reindex_queue --features logging
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use taskrank::{
    LogWriter, Manager, ManagerConfig, Subscribe, Task, TaskError, TaskRef, TaskState, rank_by,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Reindexes every object of one space.
struct SpaceReindex {
    state: TaskState,
    object_ids: Vec<String>,
}

impl SpaceReindex {
    fn arc(space: &str, objects: usize) -> Arc<Self> {
        Arc::new(Self {
            state: TaskState::new(space),
            object_ids: (0..objects).map(|i| format!("{space}/obj-{i}")).collect(),
        })
    }
}

#[async_trait]
impl Task for SpaceReindex {
    fn state(&self) -> &TaskState {
        &self.state
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        for id in &self.object_ids {
            self.state.wait_if_paused(&ctx).await?;
            tokio::time::sleep(Duration::from_millis(40)).await;
            tracing::debug!(object = %id, "indexed");
        }
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let activity: Arc<Mutex<HashMap<String, u32>>> = Arc::new(Mutex::new(HashMap::from([
        ("space-a".to_string(), 3),
        ("space-b".to_string(), 7),
        ("space-c".to_string(), 1),
        ("space-d".to_string(), 5),
    ])));

    let scores = activity.clone();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let manager = Manager::builder(ManagerConfig {
        name: "reindex".into(),
        ..ManagerConfig::with_max_concurrent(2)
    })
    .with_shared_sorter(rank_by(move |space: &str| {
        Reverse(scores.lock().get(space).copied().unwrap_or(0))
    }))
    .with_subscribers(subs)
    .build();

    let spaces: Vec<TaskRef> = [("space-a", 6), ("space-b", 4), ("space-c", 5), ("space-d", 3)]
        .into_iter()
        .map(|(space, objects)| -> TaskRef { SpaceReindex::arc(space, objects) })
        .collect();
    for space in &spaces {
        manager.add_task(space.clone());
    }

    let ctx = CancellationToken::new();
    let runner = manager.clone();
    let run = tokio::spawn(async move { runner.run(ctx).await });
    manager.wait_started().await;

    // The user opens space-c: it becomes the most active one.
    tokio::time::sleep(Duration::from_millis(100)).await;
    activity.lock().insert("space-c".to_string(), 42);
    manager.refresh_priority();

    manager.wait_and_close().await;
    run.await?;

    for space in &spaces {
        if let Some(res) = space.state().result() {
            println!(
                "{:<8} ok={} worked={:?} paused={:?}",
                space.id(),
                res.is_ok(),
                res.work_time,
                res.paused_time()
            );
        }
    }
    Ok(())
}
