//! 导航检测
//!
//! 轮询当前地址和宿主报告的历史记录事件都汇入同一个 `observe`，
//! 只有地址真的变化时才开启新一代重试序列。

use tracing::info;
use url::Url;

use super::signals::NavigationKind;

#[derive(Debug)]
pub struct NavigationWatcher {
    current: Url,
    generation: u64,
}

impl NavigationWatcher {
    pub fn new(initial: Url) -> Self {
        Self {
            current: initial,
            generation: 0,
        }
    }

    pub fn current(&self) -> &Url {
        &self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 地址变化时返回新的代数
    pub fn observe(&mut self, url: &Url, via: NavigationKind) -> Option<u64> {
        if *url == self.current {
            return None;
        }

        info!("URL变化 ({:?}): {} => {}", via, self.current, url);
        self.current = url.clone();
        self.generation += 1;
        Some(self.generation)
    }
}
