//! ParseWorker loop behaviour against a scripted work source.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docket_jobs::{
    DocumentParser, Error, FetchOutcome, NoOpParser, ParseOutcome, ParseReport, ParseWorker,
    QueueStatus, Result, WorkItem, WorkSource, WorkerConfig, WorkerEvent,
};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Replays scripted fetch results, then reports an empty queue.
#[derive(Default)]
struct ScriptedSource {
    fetches: Mutex<VecDeque<Result<FetchOutcome>>>,
    reports: Mutex<Vec<ParseReport>>,
    fail_reports: bool,
}

impl ScriptedSource {
    fn with(fetches: Vec<Result<FetchOutcome>>) -> Self {
        Self {
            fetches: Mutex::new(fetches.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl WorkSource for ScriptedSource {
    async fn fetch_next(&self) -> Result<FetchOutcome> {
        self.fetches
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(FetchOutcome::Empty))
    }

    async fn report_result(&self, report: &ParseReport) -> Result<()> {
        if self.fail_reports {
            return Err(Error::Request("connection reset".into()));
        }
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}

struct FailingParser;

#[async_trait]
impl DocumentParser for FailingParser {
    fn name(&self) -> &str {
        "failing"
    }

    async fn parse(&self, _item: &WorkItem) -> ParseOutcome {
        ParseOutcome::Failed("not a PDF".into())
    }
}

struct StuckParser;

#[async_trait]
impl DocumentParser for StuckParser {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn parse(&self, _item: &WorkItem) -> ParseOutcome {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        ParseOutcome::Parsed(serde_json::Value::Null)
    }
}

fn work(name: &str) -> FetchOutcome {
    FetchOutcome::Work(WorkItem {
        file_id: Uuid::now_v7(),
        hash: "ab".repeat(32),
        name: name.into(),
        content: b"%PDF-1.4".to_vec(),
    })
}

fn file_id(outcome: &Result<FetchOutcome>) -> Uuid {
    match outcome {
        Ok(FetchOutcome::Work(item)) => item.file_id,
        _ => panic!("expected work"),
    }
}

fn config() -> WorkerConfig {
    WorkerConfig::default()
        .with_worker_id("w-test")
        .with_poll_interval(1_000)
        .with_parse_timeout(5)
}

async fn next_matching(
    events: &mut broadcast::Receiver<WorkerEvent>,
    pred: impl Fn(&WorkerEvent) -> bool,
) -> WorkerEvent {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for worker event")
}

#[tokio::test(start_paused = true)]
async fn test_reports_each_claimed_file_as_parsed() {
    let fetches = vec![Ok(work("a.pdf")), Ok(work("b.pdf"))];
    let ids: Vec<Uuid> = fetches.iter().map(file_id).collect();
    let source = Arc::new(ScriptedSource::with(fetches));

    let worker = ParseWorker::new(source.clone(), Arc::new(NoOpParser), config());
    let mut events = worker.events();
    let handle = worker.start();

    assert_eq!(events.recv().await.unwrap(), WorkerEvent::WorkerStarted);
    for id in &ids {
        let event = next_matching(&mut events, |e| matches!(e, WorkerEvent::JobReported { .. })).await;
        assert_eq!(
            event,
            WorkerEvent::JobReported {
                file_id: *id,
                status: QueueStatus::Parsed
            }
        );
    }

    handle.shutdown().await.unwrap();
    handle.join().await.unwrap();

    let reports = source.reports.lock().await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].file_id, ids[0]);
    assert_eq!(reports[1].file_id, ids[1]);
    assert!(reports.iter().all(|r| r.status == QueueStatus::Parsed));
}

#[tokio::test(start_paused = true)]
async fn test_backlog_drains_without_waiting_poll_interval() {
    let fetches = vec![Ok(work("a.pdf")), Ok(work("b.pdf")), Ok(work("c.pdf"))];
    let source = Arc::new(ScriptedSource::with(fetches));
    let worker = ParseWorker::new(
        source.clone(),
        Arc::new(NoOpParser),
        config().with_poll_interval(3_600_000),
    );
    let mut events = worker.events();
    let started = tokio::time::Instant::now();
    let handle = worker.start();

    for _ in 0..3 {
        next_matching(&mut events, |e| matches!(e, WorkerEvent::JobReported { .. })).await;
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    handle.shutdown().await.unwrap();
    handle.join().await.unwrap();
    assert_eq!(source.reports.lock().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_parser_failure_reports_failed_with_message() {
    let source = Arc::new(ScriptedSource::with(vec![Ok(work("broken.pdf"))]));
    let worker = ParseWorker::new(source.clone(), Arc::new(FailingParser), config());
    let mut events = worker.events();
    let handle = worker.start();

    next_matching(&mut events, |e| matches!(e, WorkerEvent::JobReported { .. })).await;
    handle.shutdown().await.unwrap();
    handle.join().await.unwrap();

    let reports = source.reports.lock().await;
    assert_eq!(reports[0].status, QueueStatus::Failed);
    assert_eq!(
        reports[0].result.as_ref().unwrap()["error"],
        "not a PDF"
    );
}

#[tokio::test(start_paused = true)]
async fn test_parse_timeout_reports_failed() {
    let source = Arc::new(ScriptedSource::with(vec![Ok(work("slow.pdf"))]));
    let worker = ParseWorker::new(source.clone(), Arc::new(StuckParser), config());
    let mut events = worker.events();
    let handle = worker.start();

    let event = next_matching(&mut events, |e| matches!(e, WorkerEvent::JobReported { .. })).await;
    assert!(matches!(
        event,
        WorkerEvent::JobReported {
            status: QueueStatus::Failed,
            ..
        }
    ));
    handle.shutdown().await.unwrap();
    handle.join().await.unwrap();

    let reports = source.reports.lock().await;
    let error = reports[0].result.as_ref().unwrap()["error"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(error.contains("timeout of 5s"));
}

#[tokio::test(start_paused = true)]
async fn test_report_failure_is_logged_and_loop_continues() {
    let source = Arc::new(ScriptedSource {
        fetches: Mutex::new(vec![Ok(work("a.pdf")), Ok(work("b.pdf"))].into()),
        reports: Mutex::new(Vec::new()),
        fail_reports: true,
    });
    let worker = ParseWorker::new(source.clone(), Arc::new(NoOpParser), config());
    let mut events = worker.events();
    let handle = worker.start();

    next_matching(&mut events, |e| matches!(e, WorkerEvent::ReportFailed { .. })).await;
    // The second file is still fetched after the failed report.
    next_matching(&mut events, |e| matches!(e, WorkerEvent::ReportFailed { .. })).await;

    handle.shutdown().await.unwrap();
    handle.join().await.unwrap();
    assert!(source.reports.lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_does_not_stop_worker() {
    let fetches = vec![Err(Error::Request("connection refused".into())), Ok(work("a.pdf"))];
    let source = Arc::new(ScriptedSource::with(fetches));
    let worker = ParseWorker::new(source.clone(), Arc::new(NoOpParser), config());
    let mut events = worker.events();
    let handle = worker.start();

    let failed = next_matching(&mut events, |e| matches!(e, WorkerEvent::FetchFailed { .. })).await;
    assert!(matches!(failed, WorkerEvent::FetchFailed { error } if error.contains("connection refused")));
    next_matching(&mut events, |e| matches!(e, WorkerEvent::JobReported { .. })).await;

    handle.shutdown().await.unwrap();
    handle.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_idle_sleep() {
    let source = Arc::new(ScriptedSource::default());
    let worker = ParseWorker::new(
        source,
        Arc::new(NoOpParser),
        config().with_poll_interval(3_600_000),
    );
    let mut events = worker.events();
    let handle = worker.start();

    assert_eq!(events.recv().await.unwrap(), WorkerEvent::WorkerStarted);
    handle.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("worker did not stop promptly")
        .unwrap();
    assert_eq!(
        next_matching(&mut events, |e| matches!(e, WorkerEvent::WorkerStopped)).await,
        WorkerEvent::WorkerStopped
    );
}

#[tokio::test]
async fn test_disabled_worker_exits_immediately() {
    let worker = ParseWorker::new(
        Arc::new(ScriptedSource::default()),
        Arc::new(NoOpParser),
        config().with_enabled(false),
    );
    let handle = worker.start();
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("disabled worker kept running")
        .unwrap();
}
