//! Execution engine tests: lifecycle, cleanup guarantees, timeouts,
//! cancellation, fault containment and ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mtb_core::benchmark::{BenchContext, Benchmark, BenchmarkError, Descriptor, Verdict};
use mtb_core::engine::{EngineConfig, ExecutionEngine, RunId};
use mtb_core::probe::{ClusterProbe, InMemoryCluster, ProbeError, ProbeOp};
use mtb_core::result::{ErrorCause, Status, Summary};
use mtb_core::shutdown::ShutdownCoordinator;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Scripted benchmark double
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    PreRun,
    Setup,
    Run,
    Verify,
    Cleanup,
}

type Journal = Arc<Mutex<Vec<Hook>>>;

struct Scripted {
    journal: Journal,
    fail_at: Option<Hook>,
    setup_error: Option<ProbeError>,
    verdict: Verdict,
    run_delay: Duration,
    panic_in_run: bool,
    cleanup_delay: Duration,
    panic_in_cleanup: bool,
    gauge: Option<Gauge>,
}

impl Scripted {
    fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_at: None,
            setup_error: None,
            verdict: Verdict::Pass,
            run_delay: Duration::ZERO,
            panic_in_run: false,
            cleanup_delay: Duration::ZERO,
            panic_in_cleanup: false,
            gauge: None,
        }
    }

    fn failing_at(mut self, hook: Hook) -> Self {
        self.fail_at = Some(hook);
        self
    }

    fn setup_error(mut self, err: ProbeError) -> Self {
        self.setup_error = Some(err);
        self
    }

    fn verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = verdict;
        self
    }

    fn run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    fn panicking(mut self) -> Self {
        self.panic_in_run = true;
        self
    }

    fn cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    fn panicking_in_cleanup(mut self) -> Self {
        self.panic_in_cleanup = true;
        self
    }

    fn gauge(mut self, gauge: &Gauge) -> Self {
        self.gauge = Some(gauge.clone());
        self
    }

    fn step(&self, hook: Hook) -> Result<(), BenchmarkError> {
        self.journal.lock().push(hook);
        if self.fail_at == Some(hook) {
            return Err(BenchmarkError::Logic(format!("{:?} failed", hook)));
        }
        Ok(())
    }
}

#[async_trait]
impl Benchmark for Scripted {
    async fn pre_run(&self, _ctx: &BenchContext) -> Result<(), BenchmarkError> {
        self.step(Hook::PreRun)
    }

    async fn setup(&self, _ctx: &BenchContext) -> Result<(), BenchmarkError> {
        self.step(Hook::Setup)?;
        match &self.setup_error {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    async fn run(&self, _ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        self.step(Hook::Run)?;
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if !self.run_delay.is_zero() {
            tokio::time::sleep(self.run_delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.exit();
        }
        if self.panic_in_run {
            panic!("scripted panic");
        }
        Ok(self.verdict.clone())
    }

    async fn verify(&self, _ctx: &BenchContext, verdict: Verdict) -> Result<Verdict, BenchmarkError> {
        self.step(Hook::Verify)?;
        Ok(verdict)
    }

    async fn cleanup(&self, _ctx: &BenchContext) -> Result<(), BenchmarkError> {
        self.journal.lock().push(Hook::Cleanup);
        if !self.cleanup_delay.is_zero() {
            tokio::time::sleep(self.cleanup_delay).await;
        }
        if self.panic_in_cleanup {
            panic!("scripted cleanup panic");
        }
        Ok(())
    }
}

/// Tracks how many benchmarks are inside `run` at once.
#[derive(Clone, Default)]
struct Gauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn descriptor(id: &str, behavior: Scripted) -> Arc<Descriptor> {
    Arc::new(
        Descriptor::builder(id, format!("Scripted {}", id))
            .category("TST", "Test")
            .profile_level(1)
            .remediation("Apply the fix")
            .build(behavior),
    )
}

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn cleanups(journal: &Journal) -> usize {
    journal.lock().iter().filter(|h| **h == Hook::Cleanup).count()
}

fn engine_on(cluster: &Arc<InMemoryCluster>, config: EngineConfig) -> ExecutionEngine {
    let probe: Arc<dyn ClusterProbe> = cluster.clone();
    ExecutionEngine::new(probe, config)
}

fn config() -> EngineConfig {
    EngineConfig {
        run_id: Some(RunId::from_seed(7)),
        ..EngineConfig::default()
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn all_hooks_run_in_order_on_pass() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let j = journal();
    let selection = vec![descriptor("T-1", Scripted::new(&j))];

    let report = engine_on(&cluster, config()).run(&selection).await;

    assert_eq!(report.results[0].status, Status::Pass);
    assert_eq!(
        *j.lock(),
        vec![Hook::PreRun, Hook::Setup, Hook::Run, Hook::Verify, Hook::Cleanup]
    );
}

#[tokio::test]
async fn cleanup_runs_exactly_once_whichever_stage_fails() {
    for (hook, expected) in [
        (Hook::PreRun, Status::Skip),
        (Hook::Setup, Status::Error),
        (Hook::Run, Status::Error),
        (Hook::Verify, Status::Error),
    ] {
        let cluster = Arc::new(InMemoryCluster::secure());
        let j = journal();
        let selection = vec![descriptor("T-1", Scripted::new(&j).failing_at(hook))];

        let report = engine_on(&cluster, config()).run(&selection).await;
        let result = &report.results[0];

        assert_eq!(result.status, expected, "failure at {:?}", hook);
        assert_eq!(cleanups(&j), 1, "failure at {:?}", hook);
        assert!(matches!(result.cause, Some(ErrorCause::Logic { .. })));
        assert!(result.remediation.is_none());
        assert!(cluster.namespaces().is_empty(), "namespace leaked after {:?}", hook);
    }
}

#[tokio::test]
async fn unauthorized_setup_is_error_and_cleaned_up() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let j = journal();
    let behavior = Scripted::new(&j).setup_error(ProbeError::unauthorized("forbidden"));
    let selection = vec![descriptor("T-1", behavior)];

    let report = engine_on(&cluster, config()).run(&selection).await;
    let result = &report.results[0];

    assert_eq!(result.status, Status::Error);
    match &result.cause {
        Some(ErrorCause::Probe { error }) => assert!(error.is_unauthorized()),
        other => panic!("unexpected cause {:?}", other),
    }
    assert!(!j.lock().contains(&Hook::Run));
    assert_eq!(cleanups(&j), 1);
}

#[tokio::test]
async fn violation_is_fail_with_remediation() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let j = journal();
    let behavior = Scripted::new(&j).verdict(Verdict::fail("tenant escaped"));
    let selection = vec![descriptor("T-1", behavior)];

    let report = engine_on(&cluster, config()).run(&selection).await;
    let result = &report.results[0];

    assert_eq!(result.status, Status::Fail);
    assert_eq!(result.finding.as_deref(), Some("tenant escaped"));
    assert_eq!(result.remediation.as_deref(), Some("Apply the fix"));
    assert!(result.cause.is_none());
    assert!(!report.is_success());
}

#[tokio::test]
async fn provisioning_failure_is_error() {
    let cluster = Arc::new(InMemoryCluster::secure());
    cluster.fail_on(
        ProbeOp::CreateNamespace,
        None,
        ProbeError::already_exists("namespace exists"),
    );
    let j = journal();
    let selection = vec![descriptor("T-1", Scripted::new(&j))];

    let report = engine_on(&cluster, config()).run(&selection).await;

    assert_eq!(report.results[0].status, Status::Error);
    assert!(!j.lock().contains(&Hook::Setup));
    assert_eq!(cleanups(&j), 1);
}

#[tokio::test]
async fn namespace_delete_failure_is_only_a_warning() {
    let cluster = Arc::new(InMemoryCluster::secure());
    cluster.fail_on(ProbeOp::DeleteNamespace, None, ProbeError::unknown("etcd unavailable"));
    let j = journal();
    let selection = vec![descriptor("T-1", Scripted::new(&j))];

    let report = engine_on(&cluster, config()).run(&selection).await;
    let result = &report.results[0];

    assert_eq!(result.status, Status::Pass);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("failed to delete namespace"));
}

// =============================================================================
// Timeout Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn hung_probe_call_times_out_without_affecting_siblings() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let cfg = config();
    let run_id = RunId::from_seed(7);
    cluster.delay_on(
        ProbeOp::CreateNamespace,
        Some(&run_id.namespace_for("T-2")),
        Duration::from_secs(120),
    );

    let (j1, j2, j3) = (journal(), journal(), journal());
    let selection = vec![
        descriptor("T-1", Scripted::new(&j1)),
        descriptor("T-2", Scripted::new(&j2)),
        descriptor("T-3", Scripted::new(&j3)),
    ];

    let report = engine_on(&cluster, cfg).run(&selection).await;

    let statuses: Vec<Status> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![Status::Pass, Status::Error, Status::Pass]);
    assert_eq!(
        report.results[1].cause,
        Some(ErrorCause::Timeout { after: Duration::from_secs(60) })
    );
    assert_eq!(
        report.summary,
        Summary { passed: 2, failed: 0, errored: 1, skipped: 0, total: 3 }
    );
    assert_eq!(cleanups(&j2), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_run_hook_times_out() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let j = journal();
    let cfg = EngineConfig {
        benchmark_timeout: Duration::from_secs(5),
        ..config()
    };
    let selection = vec![descriptor("T-1", Scripted::new(&j).run_delay(Duration::from_secs(30)))];

    let report = engine_on(&cluster, cfg).run(&selection).await;
    let result = &report.results[0];

    assert_eq!(result.status, Status::Error);
    assert!(result.cause.as_ref().is_some_and(ErrorCause::is_timeout));
    assert!(!j.lock().contains(&Hook::Verify));
    assert_eq!(cleanups(&j), 1);
    assert!(cluster.namespaces().is_empty());
}

#[tokio::test(start_paused = true)]
async fn applied_create_with_lost_response_is_still_removed() {
    let cluster = Arc::new(InMemoryCluster::secure());
    cluster.stall_response_on(None, Duration::from_secs(120));
    let j = journal();
    let selection = vec![descriptor("T-1", Scripted::new(&j))];

    let report = engine_on(&cluster, config()).run(&selection).await;
    let result = &report.results[0];

    assert_eq!(result.status, Status::Error);
    assert_eq!(result.cause, Some(ErrorCause::Timeout { after: Duration::from_secs(60) }));
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert_eq!(cleanups(&j), 1);
    assert!(cluster.namespaces().is_empty(), "leftover: {:?}", cluster.namespaces());
}

// =============================================================================
// Cleanup Grace Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn hanging_cleanup_is_cut_off_at_grace() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let j = journal();
    let behavior = Scripted::new(&j)
        .verdict(Verdict::fail("tenant escaped"))
        .cleanup_delay(Duration::from_secs(600));
    let cfg = EngineConfig {
        cleanup_grace: Duration::from_secs(5),
        ..config()
    };
    let selection = vec![descriptor("T-1", behavior)];

    let started = tokio::time::Instant::now();
    let report = engine_on(&cluster, cfg).run(&selection).await;
    let result = &report.results[0];

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(result.status, Status::Fail);
    assert_eq!(result.finding.as_deref(), Some("tenant escaped"));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("did not finish"), "{:?}", result.warnings);
    assert_eq!(cleanups(&j), 1);
}

#[tokio::test]
async fn panicking_cleanup_hook_keeps_status_and_removes_namespaces() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let j = journal();
    let selection = vec![descriptor("T-1", Scripted::new(&j).panicking_in_cleanup())];

    let report = engine_on(&cluster, config()).run(&selection).await;
    let result = &report.results[0];

    assert_eq!(result.status, Status::Pass);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("cleanup hook panicked: scripted cleanup panic"));
    assert_eq!(cleanups(&j), 1);
    assert!(cluster.namespaces().is_empty());
}

// =============================================================================
// Concurrency and Ordering Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn results_follow_selection_order_under_parallelism() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let gauge = Gauge::default();
    let ids = ["T-1", "T-2", "T-3", "T-4", "T-5", "T-6"];
    let selection: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            // Earlier benchmarks take longer, so completion order is reversed.
            let delay = Duration::from_secs((ids.len() - i) as u64);
            descriptor(id, Scripted::new(&journal()).run_delay(delay).gauge(&gauge))
        })
        .collect();
    let cfg = EngineConfig { concurrency: 3, ..config() };

    let report = engine_on(&cluster, cfg).run(&selection).await;

    let order: Vec<&str> = report.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, ids);
    assert!(gauge.peak() <= 3, "peak {} exceeds limit", gauge.peak());
    assert!(gauge.peak() > 1, "benchmarks never overlapped");
    assert_eq!(report.summary.passed, ids.len());
}

#[tokio::test(start_paused = true)]
async fn sequential_by_default() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let gauge = Gauge::default();
    let selection: Vec<_> = ["T-1", "T-2", "T-3"]
        .iter()
        .map(|id| {
            descriptor(id, Scripted::new(&journal()).run_delay(Duration::from_secs(1)).gauge(&gauge))
        })
        .collect();

    engine_on(&cluster, config()).run(&selection).await;

    assert_eq!(gauge.peak(), 1);
}

#[tokio::test]
async fn empty_selection_gives_empty_report() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let report = engine_on(&cluster, config()).run(&[]).await;

    assert!(report.results.is_empty());
    assert_eq!(report.summary.total, 0);
    assert!(report.is_success());
    assert!(!report.cancelled);
}

// =============================================================================
// Cancellation and Fault Containment Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cancellation_errors_in_flight_and_skips_the_rest() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let (j1, j2, j3) = (journal(), journal(), journal());
    let selection = vec![
        descriptor("T-1", Scripted::new(&j1).run_delay(Duration::from_secs(600))),
        descriptor("T-2", Scripted::new(&j2)),
        descriptor("T-3", Scripted::new(&j3)),
    ];
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let report = engine_on(&cluster, config())
        .run_with_cancel(&selection, cancel)
        .await;

    assert!(report.cancelled);
    assert_eq!(report.results[0].status, Status::Error);
    assert_eq!(report.results[0].cause, Some(ErrorCause::Cancelled));
    assert_eq!(cleanups(&j1), 1);
    for (result, j) in report.results[1..].iter().zip([&j2, &j3]) {
        assert_eq!(result.status, Status::Skip);
        assert_eq!(result.cause, Some(ErrorCause::Cancelled));
        assert!(j.lock().is_empty(), "{} should never have started", result.id);
    }
    assert!(cluster.namespaces().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_setup_removes_the_namespace() {
    let cluster = Arc::new(InMemoryCluster::secure());
    cluster.stall_response_on(None, Duration::from_secs(120));
    let j = journal();
    let selection = vec![descriptor("T-1", Scripted::new(&j))];
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let report = engine_on(&cluster, config())
        .run_with_cancel(&selection, cancel)
        .await;

    assert!(report.cancelled);
    assert_eq!(report.results[0].status, Status::Error);
    assert_eq!(report.results[0].cause, Some(ErrorCause::Cancelled));
    assert_eq!(*j.lock(), vec![Hook::PreRun, Hook::Cleanup]);
    assert!(cluster.namespaces().is_empty(), "leftover: {:?}", cluster.namespaces());
}

#[tokio::test]
async fn draining_before_the_run_skips_everything() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let coordinator = ShutdownCoordinator::new();
    let engine = engine_on(&cluster, config()).with_shutdown(coordinator.clone());
    let journals = [journal(), journal(), journal()];
    let selection: Vec<_> = ["T-1", "T-2", "T-3"]
        .iter()
        .zip(&journals)
        .map(|(id, j)| descriptor(id, Scripted::new(j)))
        .collect();

    coordinator.begin_drain();
    let report = engine.run(&selection).await;

    for (result, j) in report.results.iter().zip(&journals) {
        assert_eq!(result.status, Status::Skip);
        assert_eq!(result.cause, Some(ErrorCause::Cancelled));
        assert!(j.lock().is_empty(), "{} should never have started", result.id);
    }
    assert_eq!(report.summary.skipped, 3);
    assert!(cluster.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn draining_mid_run_turns_away_queued_benchmarks() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let coordinator = ShutdownCoordinator::new();
    let engine = engine_on(&cluster, config()).with_shutdown(coordinator.clone());
    let (j1, j2, j3) = (journal(), journal(), journal());
    let selection = vec![
        descriptor("T-1", Scripted::new(&j1).run_delay(Duration::from_secs(10))),
        descriptor("T-2", Scripted::new(&j2)),
        descriptor("T-3", Scripted::new(&j3)),
    ];
    let drainer = coordinator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        drainer.begin_drain();
    });

    let report = engine.run(&selection).await;

    assert_eq!(report.results[0].status, Status::Pass);
    for (result, j) in report.results[1..].iter().zip([&j2, &j3]) {
        assert_eq!(result.status, Status::Skip);
        assert_eq!(result.cause, Some(ErrorCause::Cancelled));
        assert!(j.lock().is_empty(), "{} should never have started", result.id);
    }
    assert!(!report.cancelled);
    assert_eq!(coordinator.in_flight_count(), 0);
    assert!(cluster.namespaces().is_empty());
}

#[tokio::test]
async fn panicking_benchmark_is_contained() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let (j1, j2) = (journal(), journal());
    let selection = vec![
        descriptor("T-1", Scripted::new(&j1).panicking()),
        descriptor("T-2", Scripted::new(&j2)),
    ];

    let report = engine_on(&cluster, config()).run(&selection).await;

    assert_eq!(report.results[0].status, Status::Error);
    match &report.results[0].cause {
        Some(ErrorCause::Panicked { detail }) => assert!(detail.contains("scripted panic")),
        other => panic!("unexpected cause {:?}", other),
    }
    assert_eq!(cleanups(&j1), 1);
    assert_eq!(report.results[1].status, Status::Pass);
}

#[tokio::test]
async fn every_namespace_is_removed_after_the_run() {
    let cluster = Arc::new(InMemoryCluster::secure());
    let selection: Vec<_> = ["T-1", "T-2", "T-3"]
        .iter()
        .map(|id| descriptor(id, Scripted::new(&journal())))
        .collect();

    let report = engine_on(&cluster, config()).run(&selection).await;

    let created = cluster
        .calls()
        .iter()
        .filter(|c| c.op == ProbeOp::CreateNamespace)
        .count();
    assert_eq!(created, 3);
    assert!(cluster.namespaces().is_empty());

    let mut namespaces: Vec<&str> = report.results.iter().map(|r| r.namespace.as_str()).collect();
    namespaces.sort();
    namespaces.dedup();
    assert_eq!(namespaces.len(), 3);
}
