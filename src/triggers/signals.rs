//! 触发信号
//!
//! 宿主把滚动、视口交叉、DOM 变更、导航、可见性等事件转成 `Signal` 发给协调器。

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc;
use url::Url;

/// 导航来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    PushState,
    ReplaceState,
    PopState,
    /// 定时轮询发现的地址变化
    Poll,
}

#[derive(Debug, Clone)]
pub struct IntersectionEntry {
    pub target: Handle,
    pub is_intersecting: bool,
}

#[derive(Debug, Clone)]
pub enum Signal {
    Scroll,
    Intersection(Vec<IntersectionEntry>),
    /// 子树变更，携带变更发生的节点
    Mutation(Handle),
    Navigated { url: Url, via: NavigationKind },
    VisibilityChanged { visible: bool },
    FocusGained,
    PageLoaded,
    Shutdown,
}

/// 变更节流所按的观察根
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationRoot {
    Body,
    /// 主要内容容器，值为节点地址
    Container(usize),
}

/// 向协调器发送信号的句柄
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::UnboundedSender<Signal>,
}

impl TriggerHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 协调器已退出时返回 false
    pub fn send(&self, signal: Signal) -> bool {
        self.tx.send(signal).is_ok()
    }

    pub fn scroll(&self) -> bool {
        self.send(Signal::Scroll)
    }

    pub fn mutation(&self, target: &Handle) -> bool {
        self.send(Signal::Mutation(target.clone()))
    }

    pub fn intersection(&self, entries: Vec<IntersectionEntry>) -> bool {
        self.send(Signal::Intersection(entries))
    }

    pub fn navigated(&self, url: Url, via: NavigationKind) -> bool {
        self.send(Signal::Navigated { url, via })
    }

    pub fn visibility(&self, visible: bool) -> bool {
        self.send(Signal::VisibilityChanged { visible })
    }

    pub fn focus(&self) -> bool {
        self.send(Signal::FocusGained)
    }

    pub fn page_loaded(&self) -> bool {
        self.send(Signal::PageLoaded)
    }

    pub fn shutdown(&self) -> bool {
        self.send(Signal::Shutdown)
    }
}
