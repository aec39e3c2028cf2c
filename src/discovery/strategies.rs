//! 结构选择器策略
//!
//! 主扫描按顺序应用窄而具体的选择器；详情页补扫只针对主推文。

use crate::config::DiscoveryConfig;
use crate::parsers::html::{Selector, SelectorError};

#[derive(Debug, Clone)]
pub struct StrategySet {
    pub primary: Vec<Selector>,
    pub detail: Vec<Selector>,
    pub container: Selector,
}

impl StrategySet {
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            primary: parse_all(&config.primary_selectors)?,
            detail: parse_all(&config.detail_selectors)?,
            container: Selector::parse(&config.container_selector)?,
        })
    }
}

fn parse_all(sources: &[String]) -> Result<Vec<Selector>, SelectorError> {
    sources.iter().map(|source| Selector::parse(source)).collect()
}
