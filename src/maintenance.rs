//! 维护清理
//!
//! 扫描是尽力而为的，这里定期修正已渲染状态的偏差。所有清理只读写本地文档，
//! 不访问远端服务，也不会失败。

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, info};

use crate::affordance::{container_of, state::now_ms, ButtonState};
use crate::config::constants::{BUTTON_CLASS, BUTTON_ERROR_CLASS, ITEM_ID_ATTR, PROCESSED_ATTR, RESULT_CLASS};
use crate::config::MaintenanceConfig;
use crate::page::Page;
use crate::parsers::html::{detach, get_node_attr, set_node_attr, Selector};
use crate::registry::SharedRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub duplicates_removed: usize,
    pub errors_reset: usize,
    pub orphans_pruned: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub buttons_removed: usize,
    pub results_removed: usize,
    pub markers_cleared: usize,
}

pub struct Sweeper {
    page: Rc<Page>,
    registry: SharedRegistry,
    config: MaintenanceConfig,
    container: Selector,
    buttons: Selector,
    error_buttons: Selector,
    results: Selector,
    processed: Selector,
}

impl Sweeper {
    pub fn new(
        page: Rc<Page>,
        registry: SharedRegistry,
        config: MaintenanceConfig,
        container: Selector,
    ) -> Self {
        let parse = |source: String| Selector::parse(&source).expect("static selector");
        Self {
            page,
            registry,
            config,
            container,
            buttons: parse(format!(".{}", BUTTON_CLASS)),
            error_buttons: parse(format!(".{}", BUTTON_ERROR_CLASS)),
            results: parse(format!(".{}", RESULT_CLASS)),
            processed: parse(format!("[{}]", PROCESSED_ATTR)),
        }
    }

    /// 运行全部周期清理
    pub fn sweep(&self) -> SweepReport {
        SweepReport {
            duplicates_removed: self.sweep_duplicates(),
            errors_reset: self.sweep_stale_errors(),
            orphans_pruned: self.sweep_orphans(),
        }
    }

    /// 按钮数超过阈值时，每个条目只保留第一个按钮
    pub fn sweep_duplicates(&self) -> usize {
        let buttons = self.page.select_all(&self.buttons);
        if buttons.len() <= self.config.duplicate_threshold {
            return 0;
        }
        debug!("检测到 {} 个按钮，清理重复按钮", buttons.len());

        let mut containers = HashSet::new();
        let mut ids = HashSet::new();
        let mut removed = 0;

        for button in &buttons {
            let container = container_of(&self.container, button);
            let fresh_container = containers.insert(Rc::as_ptr(&container));
            let fresh_id = match get_node_attr(button, ITEM_ID_ATTR) {
                Some(id) => ids.insert(id),
                None => true,
            };

            if !(fresh_container && fresh_id) {
                detach(button, self.page.document());
                removed += 1;
            }
        }

        if removed > 0 {
            info!("清理完成，移除 {} 个重复按钮", removed);
        }
        removed
    }

    pub fn sweep_stale_errors(&self) -> usize {
        self.sweep_stale_errors_at(now_ms())
    }

    /// 错误状态超过阈值的按钮强制恢复为空闲
    pub fn sweep_stale_errors_at(&self, now_ms: i64) -> usize {
        let max_age = self.config.stale_error_age_ms as i64;
        let mut reset = 0;

        for button in self.page.select_all(&self.error_buttons) {
            if let ButtonState::Error { since_ms, .. } = ButtonState::read(&button) {
                if since_ms > 0 && now_ms - since_ms > max_age {
                    ButtonState::Idle.apply(&button);
                    reset += 1;
                }
            }
        }

        if reset > 0 {
            info!("已恢复 {} 个过期的错误按钮", reset);
        }
        reset
    }

    /// 移除节点已不在文档中的登记条目
    pub fn sweep_orphans(&self) -> usize {
        let pruned = self
            .registry
            .borrow_mut()
            .prune_detached(self.page.document());
        if !pruned.is_empty() {
            debug!("移除 {} 个失效条目", pruned.len());
        }
        pruned.len()
    }

    /// 移除所有按钮、结果块和处理标记，并清空登记表
    pub fn full_reset(&self) -> ResetReport {
        let document = self.page.document();
        let mut report = ResetReport::default();

        for button in self.page.select_all(&self.buttons) {
            detach(&button, document);
            report.buttons_removed += 1;
        }
        for block in self.page.select_all(&self.results) {
            detach(&block, document);
            report.results_removed += 1;
        }
        for marked in self.page.select_all(&self.processed) {
            set_node_attr(&marked, PROCESSED_ATTR, None);
            report.markers_cleared += 1;
        }
        self.registry.borrow_mut().clear();

        info!(
            "已重置: 移除 {} 个按钮、{} 个结果块，清除 {} 个标记",
            report.buttons_removed, report.results_removed, report.markers_cleared
        );
        report
    }
}
