//! 扫描触发协调
//!
//! 所有触发源都汇入同一个循环：信号通道、定时器队列和若干周期任务。
//! 循环在单线程上运行，扫描之间不会交错。

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};
use url::Url;

use super::navigation::NavigationWatcher;
use super::signals::{IntersectionEntry, MutationRoot, NavigationKind, Signal, TriggerHandle};
use crate::config::TriggerConfig;
use crate::discovery::ScanReport;

/// 协调器驱动的扫描对象
pub trait ScanTarget {
    /// 执行一次扫描，`full_scan` 为 true 时包含详情页策略
    fn scan(&self, full_scan: bool) -> ScanReport;

    /// 重复按钮、过期错误与孤立记录的清理
    fn sweep(&self);

    fn current_location(&self) -> Url;

    /// 地址变化后、首次重试扫描前调用
    fn location_changed(&self, _url: &Url) {}

    fn is_detail_view(&self) -> bool {
        false
    }

    /// 变更节点所属的观察根，空表示忽略此变更
    fn mutation_roots(&self, _target: &Handle) -> Vec<MutationRoot> {
        vec![MutationRoot::Body]
    }

    /// 交叉事件的目标是否是当前观察的区域
    fn is_observed_region(&self, _target: &Handle) -> bool {
        true
    }

    fn refresh_observed_regions(&self) {}

    fn refresh_mutation_roots(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    ScrollSettled { token: u64 },
    MutationWindow(MutationRoot),
    NavigationRetry { generation: u64, attempt: u32 },
    DetailStartup,
}

/// 按到期时间排序的一次性定时器
#[derive(Debug, Default)]
struct TimerQueue {
    entries: BTreeMap<(Instant, u64), Timer>,
    seq: u64,
}

impl TimerQueue {
    fn schedule(&mut self, at: Instant, timer: Timer) {
        self.seq += 1;
        self.entries.insert((at, self.seq), timer);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    fn pop_due(&mut self, now: Instant) -> Vec<Timer> {
        let mut due = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

pub struct Coordinator<T: ScanTarget> {
    target: Rc<T>,
    config: TriggerConfig,
    signals: UnboundedReceiver<Signal>,
    timers: TimerQueue,
    open_windows: HashSet<MutationRoot>,
    scroll_token: u64,
    navigation: NavigationWatcher,
}

impl<T: ScanTarget> Coordinator<T> {
    pub fn new(target: Rc<T>, config: TriggerConfig) -> (Self, TriggerHandle) {
        let (handle, signals) = TriggerHandle::channel();
        let navigation = NavigationWatcher::new(target.current_location());
        let coordinator = Self {
            target,
            config,
            signals,
            timers: TimerQueue::default(),
            open_windows: HashSet::new(),
            scroll_token: 0,
            navigation,
        };
        (coordinator, handle)
    }

    /// 运行到收到 `Shutdown` 或所有句柄被丢弃
    pub async fn run(mut self) {
        self.startup();

        let mut periodic = ticker(self.config.periodic_scan());
        let mut sweeps = ticker(self.config.sweep_interval());
        let mut location_poll = ticker(self.config.location_poll());
        let mut region_refresh = ticker(self.config.region_refresh());
        let mut container_refresh = ticker(self.config.container_refresh());

        loop {
            let next_deadline = self.timers.next_deadline();
            tokio::select! {
                signal = self.signals.recv() => match signal {
                    Some(Signal::Shutdown) | None => break,
                    Some(signal) => self.handle_signal(signal),
                },
                _ = sleep_until_opt(next_deadline) => {
                    for timer in self.timers.pop_due(Instant::now()) {
                        self.fire(timer);
                    }
                }
                _ = periodic.tick() => {
                    debug!("定时全量扫描");
                    self.target.scan(true);
                }
                _ = sweeps.tick() => self.target.sweep(),
                _ = location_poll.tick() => {
                    let url = self.target.current_location();
                    self.on_location(&url, NavigationKind::Poll);
                }
                _ = region_refresh.tick() => self.target.refresh_observed_regions(),
                _ = container_refresh.tick() => self.target.refresh_mutation_roots(),
            }
        }

        info!("扫描协调器已停止");
    }

    fn startup(&mut self) {
        info!("扫描协调器启动: {}", self.navigation.current());
        self.target.sweep();
        self.target.scan(true);

        if self.target.is_detail_view() {
            let now = Instant::now();
            for delay in &self.config.detail_startup_delays_ms {
                self.timers.schedule(
                    now + std::time::Duration::from_millis(*delay),
                    Timer::DetailStartup,
                );
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Scroll => {
                self.scroll_token += 1;
                self.timers.schedule(
                    Instant::now() + self.config.scroll_debounce(),
                    Timer::ScrollSettled {
                        token: self.scroll_token,
                    },
                );
            }
            Signal::Intersection(entries) => self.on_intersection(&entries),
            Signal::Mutation(node) => self.on_mutation(&node),
            Signal::Navigated { url, via } => self.on_location(&url, via),
            Signal::VisibilityChanged { visible: false } => {}
            Signal::VisibilityChanged { visible: true }
            | Signal::FocusGained
            | Signal::PageLoaded => {
                self.target.sweep();
                self.target.scan(true);
            }
            Signal::Shutdown => {}
        }
    }

    fn on_intersection(&mut self, entries: &[IntersectionEntry]) {
        let visible = entries
            .iter()
            .any(|entry| entry.is_intersecting && self.target.is_observed_region(&entry.target));
        if visible {
            self.target.scan(false);
        }
    }

    /// 每个观察根一个节流窗口：窗口内的变更合并为窗口结束时的一次扫描
    fn on_mutation(&mut self, node: &Handle) {
        for root in self.target.mutation_roots(node) {
            if !self.open_windows.insert(root) {
                continue;
            }
            let window = match root {
                MutationRoot::Body => self.config.body_mutation_throttle(),
                MutationRoot::Container(_) => self.config.container_mutation_throttle(),
            };
            self.timers
                .schedule(Instant::now() + window, Timer::MutationWindow(root));
        }
    }

    fn on_location(&mut self, url: &Url, via: NavigationKind) {
        let Some(generation) = self.navigation.observe(url, via) else {
            return;
        };

        self.target.location_changed(url);
        self.target.sweep();
        self.timers.schedule(
            Instant::now() + self.config.navigation_delay(1),
            Timer::NavigationRetry {
                generation,
                attempt: 1,
            },
        );
    }

    fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::ScrollSettled { token } => {
                if token == self.scroll_token {
                    self.target.scan(false);
                }
            }
            Timer::MutationWindow(root) => {
                self.open_windows.remove(&root);
                self.target.scan(false);
            }
            Timer::NavigationRetry {
                generation,
                attempt,
            } => {
                // 更新的导航已接管
                if generation != self.navigation.generation() {
                    return;
                }
                debug!("导航后第 {} 次扫描", attempt);
                self.target.scan(true);
                if attempt < self.config.navigation_max_attempts {
                    let next = attempt + 1;
                    self.timers.schedule(
                        Instant::now() + self.config.navigation_delay(next),
                        Timer::NavigationRetry {
                            generation,
                            attempt: next,
                        },
                    );
                }
            }
            Timer::DetailStartup => {
                self.target.scan(true);
            }
        }
    }
}
