//! # Tweet Translator
//!
//! 为信息流页面上的每条内容挂上“翻译”按钮，点击后调用翻译服务并在原处显示译文。
//! 页面在不断重渲染，引擎要反复回答“现在屏幕上哪些条目需要按钮”，并且不能重复、不能泄漏、
//! 也不能和自己竞争。
//!
//! ## 模块组织
//!
//! - `page` - 文档树与当前地址
//! - `parsers` - HTML 解析、结构选择器与序列化
//! - `registry` - 条目登记表
//! - `discovery` - 幂等扫描
//! - `triggers` - 滚动、变更、导航等触发源的防抖与节流
//! - `affordance` - 按钮生命周期与结果渲染
//! - `translation` - 翻译服务与请求管线
//! - `maintenance` - 重复按钮、过期错误和孤立记录的清理
//! - `messaging` - 与后台之间的消息
//! - `selection` - 非信息流页面的划词翻译
//! - `core` - 引擎装配
//! - `config` / `env` - 配置文件与环境变量

pub mod affordance;
pub mod config;
pub mod core;
pub mod discovery;
pub mod env;
pub mod maintenance;
pub mod messaging;
pub mod notify;
pub mod page;
pub mod parsers;
pub mod registry;
pub mod selection;
pub mod translation;
pub mod triggers;

pub use core::{Collaborators, Diagnostics, Engine, EngineError};
pub use page::Page;
pub use triggers::{Signal, TriggerHandle};
