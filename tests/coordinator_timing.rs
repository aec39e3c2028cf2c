//! 扫描协调器时序测试
//!
//! 使用暂停的 tokio 时钟驱动防抖、节流、导航重试与启动补扫

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tokio::task::{spawn_local, LocalSet};
use tokio::time::{sleep, Instant};
use url::Url;

use tweet_translator::config::{EngineConfig, TriggerConfig};
use tweet_translator::discovery::ScanReport;
use tweet_translator::triggers::{
    Coordinator, IntersectionEntry, MutationRoot, NavigationKind, ScanTarget, TriggerHandle,
};
use tweet_translator::translation::Settings;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{page, render_tweet, selector, TestEngine, TimelineBuilder, HOME};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Scan { full: bool },
    Sweep,
    LocationChanged(String),
}

/// 记录每次调用及其发生时间的扫描对象
struct RecordingTarget {
    start: Instant,
    location: RefCell<Url>,
    detail_view: bool,
    roots: Vec<MutationRoot>,
    calls: RefCell<Vec<(u64, Call)>>,
}

impl RecordingTarget {
    fn new(url: &str) -> Self {
        Self {
            start: Instant::now(),
            location: RefCell::new(Url::parse(url).unwrap()),
            detail_view: false,
            roots: vec![MutationRoot::Body],
            calls: RefCell::new(Vec::new()),
        }
    }

    fn record(&self, call: Call) {
        let at = Instant::now().duration_since(self.start).as_millis() as u64;
        self.calls.borrow_mut().push((at, call));
    }

    fn calls(&self) -> Vec<(u64, Call)> {
        self.calls.borrow().clone()
    }

    /// 启动时的清理与全量扫描之后的调用
    fn calls_after_startup(&self) -> Vec<(u64, Call)> {
        self.calls().into_iter().skip(2).collect()
    }

    fn scan_times(&self, full: bool) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter(|(_, call)| *call == Call::Scan { full })
            .map(|(at, _)| at)
            .collect()
    }
}

impl ScanTarget for RecordingTarget {
    fn scan(&self, full_scan: bool) -> ScanReport {
        self.record(Call::Scan { full: full_scan });
        ScanReport::default()
    }

    fn sweep(&self) {
        self.record(Call::Sweep);
    }

    fn current_location(&self) -> Url {
        self.location.borrow().clone()
    }

    fn location_changed(&self, url: &Url) {
        *self.location.borrow_mut() = url.clone();
        self.record(Call::LocationChanged(url.to_string()));
    }

    fn is_detail_view(&self) -> bool {
        self.detail_view
    }

    fn mutation_roots(&self, _target: &Handle) -> Vec<MutationRoot> {
        self.roots.clone()
    }
}

/// 周期任务推到测试时间窗之外
fn quiet_config() -> TriggerConfig {
    TriggerConfig {
        periodic_scan_ms: 600_000,
        sweep_interval_ms: 600_000,
        ..TriggerConfig::default()
    }
}

fn node() -> Handle {
    let page = page("<html><body></body></html>", HOME);
    page.create_element("div", &[])
}

/// 计时器以毫秒为粒度，允许少量偏差
fn assert_times(actual: &[u64], expected: &[u64]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!(*a >= *e && *a <= *e + 5, "{:?} vs {:?}", actual, expected);
    }
}

async fn with_coordinator<F, Fut>(target: Rc<RecordingTarget>, config: TriggerConfig, body: F)
where
    F: FnOnce(TriggerHandle) -> Fut,
    Fut: std::future::Future<Output = TriggerHandle>,
{
    LocalSet::new()
        .run_until(async move {
            let (coordinator, handle) = Coordinator::new(target, config);
            let task = spawn_local(coordinator.run());
            tokio::task::yield_now().await;

            let handle = body(handle).await;
            handle.shutdown();
            task.await.unwrap();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_startup_sweeps_then_scans() {
    let target = Rc::new(RecordingTarget::new(HOME));
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        sleep(Duration::from_millis(10_000)).await;
        handle
    })
    .await;

    let calls = target.calls();
    assert_eq!(calls[0], (0, Call::Sweep));
    assert_eq!(calls[1], (0, Call::Scan { full: true }));
    assert_eq!(calls.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scroll_burst_scans_once_after_quiet_period() {
    let target = Rc::new(RecordingTarget::new(HOME));
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        for _ in 0..5 {
            handle.scroll();
            sleep(Duration::from_millis(100)).await;
        }
        sleep(Duration::from_millis(1_000)).await;
        handle
    })
    .await;

    // 最后一次滚动在 400ms，安静 300ms 后扫描
    assert_times(&target.scan_times(false), &[700]);
}

#[tokio::test(start_paused = true)]
async fn test_mutations_coalesce_per_window() {
    let target = Rc::new(RecordingTarget::new(HOME));
    let changed = node();
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.mutation(&changed);
        sleep(Duration::from_millis(200)).await;
        handle.mutation(&changed);
        sleep(Duration::from_millis(400)).await;
        handle.mutation(&changed);
        sleep(Duration::from_millis(600)).await;
        // 1200ms：上一个窗口已结束，开新窗口
        handle.mutation(&changed);
        sleep(Duration::from_millis(2_000)).await;
        handle
    })
    .await;

    assert_times(&target.scan_times(false), &[1_000, 2_200]);
}

#[tokio::test(start_paused = true)]
async fn test_container_window_is_independent_of_body() {
    let mut target = RecordingTarget::new(HOME);
    target.roots = vec![MutationRoot::Body, MutationRoot::Container(1)];
    let target = Rc::new(target);
    let changed = node();

    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.mutation(&changed);
        sleep(Duration::from_millis(2_000)).await;
        handle
    })
    .await;

    assert_times(&target.scan_times(false), &[800, 1_000]);
}

#[tokio::test(start_paused = true)]
async fn test_ignored_mutation_schedules_nothing() {
    let mut target = RecordingTarget::new(HOME);
    target.roots = Vec::new();
    let target = Rc::new(target);
    let changed = node();

    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.mutation(&changed);
        sleep(Duration::from_millis(2_000)).await;
        handle
    })
    .await;

    assert!(target.calls_after_startup().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_intersection_scans_immediately() {
    let target = Rc::new(RecordingTarget::new(HOME));
    let region = node();

    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.intersection(vec![IntersectionEntry {
            target: region.clone(),
            is_intersecting: false,
        }]);
        sleep(Duration::from_millis(100)).await;
        handle.intersection(vec![IntersectionEntry {
            target: region.clone(),
            is_intersecting: true,
        }]);
        sleep(Duration::from_millis(100)).await;
        handle
    })
    .await;

    assert_times(&target.scan_times(false), &[100]);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_retries_with_growing_delays() {
    let target = Rc::new(RecordingTarget::new(HOME));
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.navigated(
            Url::parse("https://x.com/jack/status/20").unwrap(),
            NavigationKind::PushState,
        );
        sleep(Duration::from_millis(60_000)).await;
        handle
    })
    .await;

    let after = target.calls_after_startup();
    assert_eq!(
        after[0],
        (0, Call::LocationChanged("https://x.com/jack/status/20".to_string()))
    );
    assert_eq!(after[1], (0, Call::Sweep));

    // 第 1 次 800ms，之后第 n 次结束后等待 n*500ms，最多 10 次
    let expected: Vec<u64> = (1..=10u64).map(|n| 800 + 250 * n * (n - 1)).collect();
    let retries: Vec<u64> = target.scan_times(true).into_iter().skip(1).collect();
    assert_times(&retries, &expected);
}

#[tokio::test(start_paused = true)]
async fn test_newer_navigation_supersedes_pending_retries() {
    let target = Rc::new(RecordingTarget::new(HOME));
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.navigated(
            Url::parse("https://x.com/jack/status/20").unwrap(),
            NavigationKind::PushState,
        );
        sleep(Duration::from_millis(1_000)).await;
        handle.navigated(
            Url::parse("https://x.com/explore").unwrap(),
            NavigationKind::PopState,
        );
        sleep(Duration::from_millis(60_000)).await;
        handle
    })
    .await;

    let retries: Vec<u64> = target.scan_times(true).into_iter().skip(1).collect();
    assert_eq!(retries.len(), 11);
    assert_times(&retries[..2], &[800, 1_800]);
}

#[tokio::test(start_paused = true)]
async fn test_same_location_is_not_navigation() {
    let target = Rc::new(RecordingTarget::new(HOME));
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.navigated(Url::parse(HOME).unwrap(), NavigationKind::ReplaceState);
        sleep(Duration::from_millis(5_000)).await;
        handle
    })
    .await;

    assert!(target.calls_after_startup().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_location_poll_detects_silent_change() {
    let target = Rc::new(RecordingTarget::new(HOME));
    let polled = target.clone();
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        sleep(Duration::from_millis(50)).await;
        *polled.location.borrow_mut() = Url::parse("https://x.com/notifications").unwrap();
        sleep(Duration::from_millis(2_000)).await;
        handle
    })
    .await;

    // 轮询在 300ms 发现变化，800ms 后第一次重试
    let retries: Vec<u64> = target.scan_times(true).into_iter().skip(1).collect();
    assert_times(&retries[..1], &[1_100]);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_focus_and_load_rescan() {
    let target = Rc::new(RecordingTarget::new(HOME));
    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        handle.visibility(false);
        sleep(Duration::from_millis(100)).await;
        handle.visibility(true);
        sleep(Duration::from_millis(100)).await;
        handle.focus();
        sleep(Duration::from_millis(100)).await;
        handle.page_loaded();
        sleep(Duration::from_millis(100)).await;
        handle
    })
    .await;

    let after = target.calls_after_startup();
    assert_eq!(
        after.into_iter().map(|(_, call)| call).collect::<Vec<_>>(),
        vec![
            Call::Sweep,
            Call::Scan { full: true },
            Call::Sweep,
            Call::Scan { full: true },
            Call::Sweep,
            Call::Scan { full: true },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_detail_view_startup_rescans() {
    let mut target = RecordingTarget::new("https://x.com/jack/status/20");
    target.detail_view = true;
    let target = Rc::new(target);

    with_coordinator(target.clone(), quiet_config(), |handle| async move {
        sleep(Duration::from_millis(10_000)).await;
        handle
    })
    .await;

    assert_times(&target.scan_times(true), &[0, 800, 1_500, 3_000, 6_000]);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_scan_and_sweep() {
    let target = Rc::new(RecordingTarget::new(HOME));
    with_coordinator(target.clone(), TriggerConfig::default(), |handle| async move {
        sleep(Duration::from_millis(31_000)).await;
        handle
    })
    .await;

    assert_times(&target.scan_times(true), &[0, 15_000, 30_000]);
    let sweeps: Vec<u64> = target
        .calls()
        .into_iter()
        .filter(|(_, call)| *call == Call::Sweep)
        .map(|(at, _)| at)
        .collect();
    assert_times(&sweeps, &[0, 10_000, 20_000, 30_000]);
}

#[tokio::test(start_paused = true)]
async fn test_coordinator_stops_when_handles_drop() {
    let target = Rc::new(RecordingTarget::new(HOME));
    LocalSet::new()
        .run_until(async move {
            let (coordinator, handle) = Coordinator::new(target, quiet_config());
            let task = spawn_local(coordinator.run());
            let spare = handle.clone();
            drop(handle);
            drop(spare);
            task.await.unwrap();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_the_channel() {
    let target = Rc::new(RecordingTarget::new(HOME));
    LocalSet::new()
        .run_until(async move {
            let (coordinator, handle) = Coordinator::new(target.clone(), quiet_config());
            let task = spawn_local(coordinator.run());
            assert!(handle.shutdown());
            task.await.unwrap();

            assert!(!handle.scroll());
            let scans = target.scan_times(false);
            assert!(scans.is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_engine_picks_up_rerendered_rows() {
    let html = TimelineBuilder::new()
        .tweet(1, "Hello world")
        .tweet(2, "Rust makes systems programming approachable")
        .build();
    let env = TestEngine::new(page(&html, HOME), EngineConfig::default(), Settings::default());

    LocalSet::new()
        .run_until(async {
            let handle = env.engine.start();
            tokio::task::yield_now().await;
            assert_eq!(env.buttons().len(), 2);

            let list = env
                .page
                .select_first(&selector(r#"div[aria-label="Timeline"]"#))
                .unwrap();
            render_tweet(&env.page, &list, 3, "A freshly rendered row arrives");
            handle.mutation(&list);

            sleep(Duration::from_millis(500)).await;
            assert_eq!(env.buttons().len(), 2);

            sleep(Duration::from_millis(600)).await;
            assert_eq!(env.buttons().len(), 3);

            handle.shutdown();
        })
        .await;
}
