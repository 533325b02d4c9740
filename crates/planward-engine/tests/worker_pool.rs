//! Worker pool end-to-end
//!
//! Runs the real cascade worker against the in-memory store and
//! queue: mutations enqueue jobs, the pool converges the schedule in
//! the background, and shutdown drains whatever is still queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use planward_engine::{
    Engine, EngineConfig, MemoryQueue, MemoryStore, NewProject, NewTask, Scheduler, Store,
    TaskPatch,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn project(scheduler: &Scheduler) -> planward_core::Project {
    scheduler
        .create_project(NewProject {
            name: "p".into(),
            description: None,
            deadline: None,
            owner_id: "owner".into(),
        })
        .await
        .unwrap()
}

async fn task(
    scheduler: &Scheduler,
    project_id: Uuid,
    title: &str,
    duration: i64,
    start: NaiveDate,
) -> planward_core::Task {
    scheduler
        .create_task(NewTask {
            project_id,
            title: title.into(),
            description: None,
            duration_days: Some(duration),
            start_date: Some(start),
        })
        .await
        .unwrap()
}

/// Poll until the task's start date reaches `expected` or two
/// seconds pass.
async fn wait_for_start(scheduler: &Scheduler, id: Uuid, expected: NaiveDate) {
    for _ in 0..100 {
        if scheduler.get_task(id).await.unwrap().start_date == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "task {id} never reached {expected}, still at {}",
        scheduler.get_task(id).await.unwrap().start_date
    );
}

/// One job at a time keeps the interleaving deterministic for
/// assertions; convergence under the default bound is eventual, not
/// stepwise.
fn serial_config() -> EngineConfig {
    EngineConfig {
        max_worker_jobs: 1,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn background_worker_converges_a_chain() {
    let engine = Engine::in_memory(serial_config());
    let p = project(engine.scheduler()).await;
    let a = task(engine.scheduler(), p.id, "A", 3, date(2025, 12, 19)).await;
    let b = task(engine.scheduler(), p.id, "B", 2, date(2025, 12, 19)).await;
    let c = task(engine.scheduler(), p.id, "C", 1, date(2025, 12, 19)).await;

    engine
        .scheduler()
        .create_dependency(a.id, b.id)
        .await
        .unwrap();
    engine
        .scheduler()
        .create_dependency(b.id, c.id)
        .await
        .unwrap();

    wait_for_start(engine.scheduler(), b.id, date(2025, 12, 22)).await;
    wait_for_start(engine.scheduler(), c.id, date(2025, 12, 24)).await;

    engine.shutdown().await;
}

#[tokio::test]
async fn rapid_edits_settle_on_the_last_mutation() {
    let engine = Engine::in_memory(serial_config());
    let p = project(engine.scheduler()).await;
    let a = task(engine.scheduler(), p.id, "A", 3, date(2025, 12, 19)).await;
    let b = task(engine.scheduler(), p.id, "B", 2, date(2025, 12, 19)).await;
    engine
        .scheduler()
        .create_dependency(a.id, b.id)
        .await
        .unwrap();

    // Growing durations: whichever jobs the worker interleaves, the
    // last mutation's cascade always runs (its token stays current)
    // and settles B at the same place.
    for duration in [4, 7, 10] {
        engine
            .scheduler()
            .update_task(
                a.id,
                TaskPatch {
                    duration_days: Some(duration),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
    }

    // A runs Dec 19-28 after the last edit, so B settles on Dec 29
    wait_for_start(engine.scheduler(), b.id, date(2025, 12, 29)).await;
    engine.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_queued_jobs() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let engine = Engine::start(EngineConfig::default(), store.clone(), queue.clone());

    let p = project(engine.scheduler()).await;
    let a = task(engine.scheduler(), p.id, "A", 5, date(2026, 1, 21)).await;
    let b = task(engine.scheduler(), p.id, "B", 3, date(2026, 1, 10)).await;
    engine
        .scheduler()
        .create_dependency(a.id, b.id)
        .await
        .unwrap();

    // No polling: graceful shutdown must deliver the queued cascade
    engine.shutdown().await;

    let b_after = store.get_task(b.id).await.unwrap().unwrap();
    assert_eq!(b_after.start_date, date(2026, 1, 26));
}
