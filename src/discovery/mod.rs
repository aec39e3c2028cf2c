//! # 内容发现
//!
//! - `strategies`: 按优先级排列的结构选择器
//! - `scanner`: 幂等扫描，为符合条件的条目挂上翻译按钮

pub mod scanner;
pub mod strategies;

pub use scanner::{Rejection, ScanReport, Scanner};
pub use strategies::StrategySet;
