//! 结构选择器
//!
//! 只支持后代组合符连接的复合选择器，每个复合选择器由可选标签名、
//! `.class`、`#id`、`[attr]` 与 `[attr="value"]` 组成。
//! 匹配从右向左进行，后代链上使用最近祖先贪心匹配即可得到正确结果。

use std::fmt;
use std::str::FromStr;

use markup5ever_rcdom::Handle;
use thiserror::Error;

use super::dom::{descendants, get_node_attr, get_node_name, get_parent_node, has_class};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("选择器为空")]
    Empty,

    #[error("选择器 `{selector}` 在位置 {position} 处无效: {reason}")]
    Invalid {
        selector: String,
        position: usize,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatch {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, node: &Handle) -> bool {
        let Some(name) = get_node_name(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if !name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        self.classes.iter().all(|c| has_class(node, c))
            && self.attrs.iter().all(|attr| match attr {
                AttrMatch::Exists(name) => get_node_attr(node, name).is_some(),
                AttrMatch::Equals(name, value) => {
                    get_node_attr(node, name).as_deref() == Some(value.as_str())
                }
            })
    }
}

/// 已解析的结构选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        source.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 节点本身是否匹配
    pub fn matches(&self, node: &Handle) -> bool {
        let Some((last, rest)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(node) {
            return false;
        }

        let mut current = get_parent_node(node);
        for compound in rest.iter().rev() {
            loop {
                let Some(candidate) = current.take() else {
                    return false;
                };
                current = get_parent_node(&candidate);
                if compound.matches(&candidate) {
                    break;
                }
            }
        }
        true
    }

    /// 文档顺序下所有匹配的节点（包含 root 本身）
    pub fn select_all(&self, root: &Handle) -> Vec<Handle> {
        descendants(root)
            .into_iter()
            .filter(|node| self.matches(node))
            .collect()
    }

    pub fn select_first(&self, root: &Handle) -> Option<Handle> {
        descendants(root).into_iter().find(|node| self.matches(node))
    }

    /// 离节点最近的匹配祖先（包含节点本身）
    pub fn closest(&self, node: &Handle) -> Option<Handle> {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            current = get_parent_node(&candidate);
        }
        None
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            source,
            chars: source.char_indices().peekable(),
        };
        let mut parts = Vec::new();

        loop {
            parser.skip_whitespace();
            if parser.chars.peek().is_none() {
                break;
            }
            parts.push(parser.compound()?);
        }

        if parts.is_empty() {
            return Err(SelectorError::Empty);
        }

        Ok(Self {
            source: source.trim().to_string(),
            parts,
        })
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn error(&mut self, reason: &'static str) -> SelectorError {
        let position = self
            .chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.source.len());
        SelectorError::Invalid {
            selector: self.source.to_string(),
            position,
            reason,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.chars.peek().map(|(_, c)| *c) {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut universal = false;

        match self.chars.peek().map(|(_, c)| *c) {
            Some('*') => {
                self.chars.next();
                universal = true;
            }
            Some(c) if c.is_alphabetic() => compound.tag = Some(self.ident().to_lowercase()),
            _ => {}
        }

        loop {
            match self.chars.peek().map(|(_, c)| *c) {
                Some('.') => {
                    self.chars.next();
                    let class = self.ident();
                    if class.is_empty() {
                        return Err(self.error("类名为空"));
                    }
                    compound.classes.push(class);
                }
                Some('#') => {
                    self.chars.next();
                    let id = self.ident();
                    if id.is_empty() {
                        return Err(self.error("id 为空"));
                    }
                    compound.attrs.push(AttrMatch::Equals("id".to_string(), id));
                }
                Some('[') => {
                    self.chars.next();
                    let attr = self.attribute()?;
                    compound.attrs.push(attr);
                }
                Some(c) if c.is_whitespace() => break,
                None => break,
                Some(_) => return Err(self.error("无法识别的字符")),
            }
        }

        if compound == Compound::default() && !universal {
            return Err(self.error("复合选择器为空"));
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrMatch, SelectorError> {
        self.skip_whitespace();
        let name = self.ident();
        if name.is_empty() {
            return Err(self.error("属性名为空"));
        }
        self.skip_whitespace();

        match self.chars.next().map(|(_, c)| c) {
            Some(']') => Ok(AttrMatch::Exists(name)),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.chars.peek().map(|(_, c)| *c) {
                    Some(quote @ ('"' | '\'')) => {
                        self.chars.next();
                        let mut value = String::new();
                        loop {
                            match self.chars.next() {
                                Some((_, c)) if c == quote => break,
                                Some((_, c)) => value.push(c),
                                None => return Err(self.error("引号未闭合")),
                            }
                        }
                        value
                    }
                    _ => self.ident(),
                };
                self.skip_whitespace();
                match self.chars.next() {
                    Some((_, ']')) => Ok(AttrMatch::Equals(name, value)),
                    _ => Err(self.error("缺少 `]`")),
                }
            }
            _ => Err(self.error("属性选择器格式错误")),
        }
    }
}
