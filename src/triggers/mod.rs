//! 扫描触发器
//!
//! - `signals`: 宿主事件到协调器的通道
//! - `navigation`: 地址变化检测
//! - `coordinator`: 防抖、节流、重试与周期任务

pub mod coordinator;
pub mod navigation;
pub mod signals;

pub use coordinator::{Coordinator, ScanTarget};
pub use navigation::NavigationWatcher;
pub use signals::{IntersectionEntry, MutationRoot, NavigationKind, Signal, TriggerHandle};
