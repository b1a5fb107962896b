mod common;

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use taskrank::{
    Event, EventKind, Manager, ManagerConfig, Subscribe, Task, TaskError, TaskRef, rank_by,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::*;

const MS: Duration = Duration::from_millis(1);

#[tokio::test(start_paused = true)]
async fn s1_cap_two_never_runs_three_at_once() {
    let m = Manager::new(2);
    let tasks: Vec<_> = ["t1", "t2", "t3"].iter().map(|id| IterTask::new(id, 5)).collect();
    for t in &tasks {
        m.add_task(task_ref(t));
    }
    m.update_priority(ids(&["t1", "t2", "t3"]));

    let sampler = spawn_sampler(tasks.iter().map(task_ref).collect());
    let begin = Instant::now();
    let run = spawn_run(&m, CancellationToken::new());
    m.wait_and_close().await;
    run.await.unwrap();

    assert!(begin.elapsed() >= 80 * MS, "elapsed {:?}", begin.elapsed());
    assert_eq!(sampler.await.unwrap(), 2);
    for t in &tasks {
        let res = t.result();
        assert!(res.is_ok(), "{:?}", res.error);
        assert_eq!(t.progress(), 5);
    }
}

#[tokio::test(start_paused = true)]
async fn s2_priority_swap_preempts_running_task() {
    let m = Manager::new(1);
    let t1 = IterTask::new("t1", 10);
    let t2 = IterTask::new("t2", 5);
    m.add_task(task_ref(&t1));
    m.add_task(task_ref(&t2));
    m.update_priority(ids(&["t1", "t2"]));

    let run = spawn_run(&m, CancellationToken::new());
    tokio::time::sleep(30 * MS).await;
    assert_eq!(t2.progress(), 0);
    m.update_priority(ids(&["t2", "t1"]));

    m.wait_and_close().await;
    run.await.unwrap();

    let (r1, r2) = (t1.result(), t2.result());
    assert!(r1.is_ok() && r2.is_ok());
    assert!(r2.finish_time < r1.finish_time);
    assert!(r1.work_time < r1.elapsed(), "t1 was paused while t2 ran");
    assert!(r2.work_time <= r2.elapsed());
}

#[tokio::test(start_paused = true)]
async fn s3_added_task_evicts_the_lowest_priority_runner() {
    let m = Manager::new(2);
    let mut rx = m.subscribe();
    let t1 = IterTask::new("t1", 10);
    let t2 = IterTask::new("t2", 10);
    let t3 = IterTask::new("t3", 5);
    m.add_task(task_ref(&t1));
    m.add_task(task_ref(&t2));
    m.update_priority(ids(&["t1", "t2"]));

    let run = spawn_run(&m, CancellationToken::new());
    tokio::time::sleep(20 * MS).await;
    m.add_task(task_ref(&t3));
    m.update_priority(ids(&["t3", "t1", "t2"]));

    m.wait_and_close().await;
    run.await.unwrap();

    for t in [&t1, &t2, &t3] {
        assert!(t.result().is_ok());
    }

    let events = drain(&mut rx);
    let resumed_t3 = position(&events, EventKind::TaskResumed, "t3").expect("t3 resumed");
    let before = &events[resumed_t3 - 1];
    assert_eq!(before.kind, EventKind::TaskPaused);
    assert!(before.is_for("t2"));
    assert!(position(&events, EventKind::TaskPaused, "t1").is_none());
    assert!(
        events
            .iter()
            .filter_map(|e| e.running)
            .all(|n| n <= 2)
    );
}

#[tokio::test(start_paused = true)]
async fn s4_cancelling_the_context_fails_every_task() {
    let m = Manager::new(2);
    let tasks: Vec<_> = ["t1", "t2", "t3"].iter().map(|id| IterTask::new(id, 100)).collect();
    for t in &tasks {
        m.add_task(task_ref(t));
    }
    m.update_priority(ids(&["t1", "t2", "t3"]));

    let ctx = CancellationToken::new();
    let run = spawn_run(&m, ctx.clone());
    tokio::spawn(async move {
        tokio::time::sleep(50 * MS).await;
        ctx.cancel();
    });

    m.wait_and_close().await;
    run.await.unwrap();

    for t in &tasks {
        assert_eq!(t.result().error, Some(TaskError::Canceled));
        assert!(t.progress() < 100);
    }
    assert_eq!(tasks[2].progress(), 0);
}

#[tokio::test(start_paused = true)]
async fn s5_reordering_with_cap_one() {
    let m = Manager::new(1);
    let t1 = IterTask::new("t1", 10);
    let t2 = IterTask::new("t2", 5);
    let t3 = IterTask::new("t3", 3);
    for t in [&t1, &t2, &t3] {
        m.add_task(task_ref(t));
    }
    m.update_priority(ids(&["t1", "t2", "t3"]));

    let run = spawn_run(&m, CancellationToken::new());
    tokio::time::sleep(30 * MS).await;
    m.update_priority(ids(&["t3", "t1", "t2"]));
    m.wait_and_close().await;
    run.await.unwrap();

    let (f1, f2, f3) = (
        t1.result().finish_time,
        t2.result().finish_time,
        t3.result().finish_time,
    );
    assert!(f3 < f1 && f1 < f2);
}

#[tokio::test(start_paused = true)]
async fn s6_priority_set_before_run() {
    let m = Manager::new(1);
    let t1 = IterTask::new("t1", 3);
    let t2 = IterTask::new("t2", 3);
    m.add_task(task_ref(&t1));
    m.add_task(task_ref(&t2));
    m.update_priority(ids(&["t2", "t1"]));
    assert_eq!(m.outstanding(), 2);

    let run = spawn_run(&m, CancellationToken::new());
    m.wait_and_close().await;
    run.await.unwrap();

    assert!(t2.result().finish_time < t1.result().finish_time);
    assert_eq!(m.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn cap_one_runs_strictly_in_priority_order() {
    let m = Manager::new(1);
    let tasks: Vec<_> = ["a", "b", "c"].iter().map(|id| IterTask::new(id, 2)).collect();
    for t in &tasks {
        m.add_task(task_ref(t));
    }
    m.update_priority(ids(&["a", "b", "c"]));

    let sampler = spawn_sampler(tasks.iter().map(task_ref).collect());
    let run = spawn_run(&m, CancellationToken::new());
    m.wait_and_close().await;
    run.await.unwrap();

    assert_eq!(sampler.await.unwrap(), 1);
    let finish: Vec<_> = tasks.iter().map(|t| t.result().finish_time).collect();
    assert!(finish[0] < finish[1] && finish[1] < finish[2]);
    // Each task waited for the previous ones.
    assert!(tasks[2].result().paused_time() >= 40 * MS);
}

#[tokio::test(start_paused = true)]
async fn zero_cap_is_clamped_to_one() {
    let m = Manager::new(0);
    let tasks: Vec<_> = ["a", "b"].iter().map(|id| IterTask::new(id, 2)).collect();
    for t in &tasks {
        m.add_task(task_ref(t));
    }
    m.update_priority(ids(&["a", "b"]));

    let sampler = spawn_sampler(tasks.iter().map(task_ref).collect());
    let run = spawn_run(&m, CancellationToken::new());
    m.wait_and_close().await;
    run.await.unwrap();

    assert_eq!(sampler.await.unwrap(), 1);
    assert!(tasks.iter().all(|t| t.result().is_ok()));
}

#[tokio::test(start_paused = true)]
async fn unlisted_task_is_never_resumed() {
    let m = Manager::new(2);
    let mut rx = m.subscribe();
    let a = IterTask::new("a", 2);
    let b = IterTask::new("b", 2);
    let c = IterTask::new("c", 2);
    for t in [&a, &b, &c] {
        m.add_task(task_ref(t));
    }
    m.update_priority(ids(&["a", "b", "ghost", "a"]));

    let ctx = CancellationToken::new();
    let run = spawn_run(&m, ctx.clone());
    let never = CancellationToken::new();
    a.state().wait_result(&never).await.unwrap();
    b.state().wait_result(&never).await.unwrap();
    tokio::time::sleep(100 * MS).await;

    assert_eq!(c.progress(), 0);
    assert!(c.state().is_paused());
    assert_eq!(m.outstanding(), 1);

    ctx.cancel();
    m.wait_and_close().await;
    run.await.unwrap();

    let rc = c.result();
    assert_eq!(rc.error, Some(TaskError::Canceled));
    assert_eq!(rc.work_time, Duration::ZERO);

    let events = drain(&mut rx);
    assert!(position(&events, EventKind::TaskResumed, "c").is_none());
    assert!(events.iter().any(|e| e.kind == EventKind::PriorityMismatch));
}

#[tokio::test(start_paused = true)]
async fn duplicate_live_id_is_rejected() {
    let m = Manager::new(1);
    let mut rx = m.subscribe();
    let first = IterTask::new("t1", 3);
    m.add_task(task_ref(&first));
    m.update_priority(ids(&["t1"]));

    let run = spawn_run(&m, CancellationToken::new());
    m.wait_started().await;

    let dup = IterTask::new("t1", 3);
    m.add_task(task_ref(&dup));
    let res = dup.state().wait_result(&CancellationToken::new()).await.unwrap();
    assert_eq!(
        res.error,
        Some(TaskError::DuplicateId {
            id: "t1".to_string()
        })
    );

    m.wait_and_close().await;
    run.await.unwrap();

    assert!(first.result().is_ok());
    assert_eq!(first.progress(), 3);
    assert_eq!(dup.progress(), 0);
    let events = drain(&mut rx);
    let rejected = events
        .iter()
        .find(|e| e.kind == EventKind::TaskRejected)
        .expect("rejection event");
    assert_eq!(rejected.reason.as_deref(), Some("task_duplicate_id"));
}

#[tokio::test(start_paused = true)]
async fn duplicate_before_run_is_rejected_immediately() {
    let m = Manager::new(1);
    let first = IterTask::new("t1", 1);
    let dup = IterTask::new("t1", 1);
    m.add_task(task_ref(&first));
    m.add_task(task_ref(&first));
    m.add_task(task_ref(&dup));

    assert_eq!(m.outstanding(), 1, "same instance counted once");
    assert!(matches!(
        dup.state().result().and_then(|r| r.error),
        Some(TaskError::DuplicateId { .. })
    ));
    assert!(!first.state().is_done());

    m.update_priority(ids(&["t1"]));
    let run = spawn_run(&m, CancellationToken::new());
    m.wait_and_close().await;
    run.await.unwrap();
    assert!(first.result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn finished_id_can_be_reused() {
    let m = Manager::new(1);
    let first = IterTask::new("t1", 1);
    m.add_task(task_ref(&first));
    m.update_priority(ids(&["t1"]));

    let run = spawn_run(&m, CancellationToken::new());
    first.state().wait_result(&CancellationToken::new()).await.unwrap();

    let second = IterTask::new("t1", 2);
    m.add_task(task_ref(&second));
    m.wait_and_close().await;
    run.await.unwrap();

    assert!(first.result().is_ok());
    assert!(second.result().is_ok());
    assert_eq!(second.progress(), 2);
}

#[tokio::test(start_paused = true)]
async fn finished_instance_is_not_run_again() {
    let m = Manager::new(1);
    let t = IterTask::new("t1", 2);
    m.add_task(task_ref(&t));
    m.update_priority(ids(&["t1"]));

    let run = spawn_run(&m, CancellationToken::new());
    t.state().wait_result(&CancellationToken::new()).await.unwrap();
    m.add_task(task_ref(&t));

    m.wait_and_close().await;
    run.await.unwrap();

    assert_eq!(t.progress(), 2);
    assert!(t.result().is_ok());
    assert_eq!(m.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_instance_is_never_dispatched() {
    let m = Manager::new(1);
    let first = IterTask::new("t1", 2);
    let dup = IterTask::new("t1", 1);
    m.add_task(task_ref(&first));
    m.add_task(task_ref(&dup));
    m.add_task(task_ref(&dup));
    assert_eq!(m.outstanding(), 1, "rejected instance is not counted");
    m.update_priority(ids(&["t1"]));

    let run = spawn_run(&m, CancellationToken::new());
    first.state().wait_result(&CancellationToken::new()).await.unwrap();
    // The id is free again, but this instance already completed.
    m.add_task(task_ref(&dup));

    tokio::time::timeout(Duration::from_secs(5), m.wait_and_close())
        .await
        .expect("manager drains");
    run.await.unwrap();

    assert_eq!(dup.progress(), 0);
    assert!(matches!(
        dup.result().error,
        Some(TaskError::DuplicateId { .. })
    ));
    assert_eq!(first.progress(), 2);
}

#[tokio::test(start_paused = true)]
async fn panicking_task_is_recorded_and_frees_its_slot() {
    let m = Manager::new(1);
    let boom = PanicTask::new("boom");
    let next = IterTask::new("next", 2);
    m.add_task(boom.clone());
    m.add_task(task_ref(&next));
    m.update_priority(ids(&["boom", "next"]));

    let run = spawn_run(&m, CancellationToken::new());
    m.wait_and_close().await;
    run.await.unwrap();

    let res = boom.state().result().unwrap();
    assert_eq!(
        res.error,
        Some(TaskError::Panicked {
            info: "index corrupted".to_string()
        })
    );
    assert!(next.result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn sorter_ranks_tasks_and_refresh_reorders() {
    let activity: Arc<Mutex<HashMap<String, u32>>> = Arc::new(Mutex::new(HashMap::from([
        ("s1".to_string(), 1),
        ("s2".to_string(), 2),
    ])));
    let scores = activity.clone();
    let m = Manager::builder(ManagerConfig::with_max_concurrent(1))
        .with_shared_sorter(rank_by(move |id: &str| {
            Reverse(scores.lock().get(id).copied().unwrap_or(0))
        }))
        .build();
    let mut rx = m.subscribe();

    let s1 = IterTask::new("s1", 3);
    let s2 = IterTask::new("s2", 5);
    m.add_task(task_ref(&s1));
    m.add_task(task_ref(&s2));

    let run = spawn_run(&m, CancellationToken::new());
    tokio::time::sleep(20 * MS).await;
    assert_eq!(s1.progress(), 0, "s2 ranks first");

    activity.lock().insert("s1".to_string(), 10);
    m.refresh_priority();

    m.wait_and_close().await;
    run.await.unwrap();

    assert!(s1.result().finish_time < s2.result().finish_time);
    let events = drain(&mut rx);
    let refreshes = events
        .iter()
        .filter(|e| e.kind == EventKind::PriorityUpdated && e.reason.as_deref() == Some("refresh"))
        .count();
    assert!(refreshes >= 2, "run start and explicit refresh");
}

#[tokio::test(start_paused = true)]
async fn sorter_picks_up_tasks_added_while_running() {
    let m = Manager::builder(ManagerConfig::default())
        .with_sorter(|ids: &[String]| ids.to_vec())
        .build();
    let run = spawn_run(&m, CancellationToken::new());
    m.wait_started().await;

    let late = IterTask::new("late", 2);
    m.add_task(task_ref(&late));
    m.wait_and_close().await;
    run.await.unwrap();

    assert!(late.result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn refresh_without_sorter_keeps_the_list() {
    let m = Manager::new(1);
    let t = IterTask::new("t", 2);
    m.add_task(task_ref(&t));
    m.update_priority(ids(&["t"]));
    m.refresh_priority();

    let run = spawn_run(&m, CancellationToken::new());
    m.refresh_priority();
    m.wait_and_close().await;
    run.await.unwrap();
    assert!(t.result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn close_before_run_without_tasks_returns_at_once() {
    let m = Manager::new(1);
    m.wait_and_close().await;
    assert!(m.is_closed());

    // run after close is a no-op
    m.run(CancellationToken::new()).await;
}

#[tokio::test(start_paused = true)]
async fn close_before_run_waits_for_the_drain() {
    let m = Manager::new(1);
    let t = IterTask::new("t", 2);
    m.add_task(task_ref(&t));
    m.update_priority(ids(&["t"]));

    let closer = {
        let m = m.clone();
        tokio::spawn(async move { m.wait_and_close().await })
    };
    tokio::time::sleep(50 * MS).await;
    assert!(!m.is_closed());

    let run = spawn_run(&m, CancellationToken::new());
    closer.await.unwrap();
    run.await.unwrap();
    assert!(m.is_closed());
    assert!(t.result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn second_run_is_a_noop() {
    let m = Manager::new(1);
    let t = IterTask::new("t", 3);
    m.add_task(task_ref(&t));
    m.update_priority(ids(&["t"]));

    let run = spawn_run(&m, CancellationToken::new());
    m.wait_started().await;
    m.run(CancellationToken::new()).await;

    m.wait_and_close().await;
    run.await.unwrap();
    assert_eq!(t.progress(), 3);
}

#[tokio::test]
#[should_panic(expected = "closed manager")]
async fn add_after_close_panics() {
    let m = Manager::new(1);
    m.wait_and_close().await;
    let t: TaskRef = IterTask::new("late", 1);
    m.add_task(t);
}

#[tokio::test]
#[should_panic(expected = "closed manager")]
async fn update_priority_after_close_panics() {
    let m = Manager::new(1);
    m.wait_and_close().await;
    m.update_priority(ids(&["t"]));
}

#[tokio::test]
#[should_panic(expected = "wait_and_close called twice")]
async fn double_close_panics() {
    let m = Manager::new(1);
    m.wait_and_close().await;
    m.wait_and_close().await;
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.seen.lock().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_the_whole_lifecycle() {
    let rec = Arc::new(Recorder::default());
    let m = Manager::builder(ManagerConfig::with_max_concurrent(1))
        .with_subscribers(vec![rec.clone() as Arc<dyn Subscribe>])
        .build();
    let t = IterTask::new("t", 1);
    m.add_task(task_ref(&t));
    m.update_priority(ids(&["t"]));

    let run = spawn_run(&m, CancellationToken::new());
    m.wait_and_close().await;
    run.await.unwrap();

    let seen = rec.seen.lock().clone();
    assert_eq!(seen.first(), Some(&EventKind::TaskAdded));
    assert_eq!(seen.last(), Some(&EventKind::ManagerClosed));
    for kind in [
        EventKind::ManagerStarted,
        EventKind::PriorityUpdated,
        EventKind::TaskResumed,
        EventKind::TaskFinished,
    ] {
        assert!(seen.contains(&kind), "missing {kind:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_racing_run_on_empty_manager_terminates() {
    for _ in 0..200 {
        let rec = Arc::new(Recorder::default());
        let m = Manager::builder(ManagerConfig::default())
            .with_subscribers(vec![rec.clone() as Arc<dyn Subscribe>])
            .build();

        let run = spawn_run(&m, CancellationToken::new());
        let closer = {
            let m = m.clone();
            tokio::spawn(async move { m.wait_and_close().await })
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            closer.await.unwrap();
            run.await.unwrap();
        })
        .await
        .expect("run and wait_and_close both return");

        assert!(m.is_closed());
        // Empty when the close won before `run` started.
        let seen = rec.seen.lock().clone();
        assert!(seen.is_empty() || seen.last() == Some(&EventKind::ManagerClosed), "{seen:?}");
    }
}
