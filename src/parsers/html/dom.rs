use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::tree_builder::create_element as build_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.to_string(),
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap_or_default()
}

/// 读取 `<head>` 中声明的字符集
///
/// 支持 `<meta charset="...">` 和 `<meta http-equiv="content-type" content="...; charset=...">`
pub fn get_charset(document: &Handle) -> Option<String> {
    let html = get_child_node_by_name(document, "html")?;
    let head = get_child_node_by_name(&html, "head")?;

    for meta in descendants(&head)
        .iter()
        .filter(|node| get_node_name(node) == Some("meta"))
    {
        if let Some(charset) = get_node_attr(meta, "charset") {
            return Some(charset.trim().to_string());
        }

        let is_content_type = get_node_attr(meta, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type");
        if is_content_type {
            if let Some(content) = get_node_attr(meta, "content") {
                return content
                    .split(';')
                    .map(str::trim)
                    .find_map(|part| {
                        part.get(..8)
                            .filter(|key| key.eq_ignore_ascii_case("charset="))
                            .map(|_| part[8..].trim_matches('"').to_string())
                    });
            }
        }
    }

    None
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<&str>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let existing = attrs_mut
            .iter()
            .position(|attr| &*attr.name.local == attr_name);

        match (existing, attr_value) {
            (Some(i), Some(value)) => {
                attrs_mut[i].value.clear();
                attrs_mut[i].value.push_slice(value);
            }
            (Some(i), None) => {
                attrs_mut.remove(i);
            }
            (None, Some(value)) => attrs_mut.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                value: format_tendril!("{}", value),
            }),
            (None, None) => {}
        }
    }
}

pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_node_attr(node, "class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

pub fn add_class(node: &Handle, class_name: &str) {
    if has_class(node, class_name) {
        return;
    }
    let classes = match get_node_attr(node, "class") {
        Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class_name),
        _ => class_name.to_string(),
    };
    set_node_attr(node, "class", Some(&classes));
}

pub fn remove_class(node: &Handle, class_name: &str) {
    if let Some(existing) = get_node_attr(node, "class") {
        let remaining: Vec<&str> = existing
            .split_whitespace()
            .filter(|c| *c != class_name)
            .collect();
        set_node_attr(node, "class", Some(&remaining.join(" ")));
    }
}

/// 获取父节点（不会破坏节点上保存的父指针）
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 从节点自身开始向上遍历祖先
pub fn ancestors(node: &Handle) -> Vec<Handle> {
    let mut chain = vec![node.clone()];
    let mut current = get_parent_node(node);
    while let Some(parent) = current {
        current = get_parent_node(&parent);
        chain.push(parent);
    }
    chain
}

/// 节点是否仍挂在文档树上
pub fn is_attached(node: &Handle, document: &Handle) -> bool {
    ancestors(node)
        .last()
        .map(|root| Rc::ptr_eq(root, document))
        .unwrap_or(false)
}

/// 先序遍历，包含根节点本身
pub fn descendants(root: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        for child in node.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
        out.push(node);
    }
    out
}

/// 判断 `node` 是否位于 `ancestor` 之下（含自身）
pub fn contains(ancestor: &Handle, node: &Handle) -> bool {
    ancestors(node).iter().any(|n| Rc::ptr_eq(n, ancestor))
}

/// 创建元素节点
pub fn create_element(dom: &RcDom, tag: &str, attrs: &[(&str, &str)]) -> Handle {
    let attributes = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    build_element(dom, QualName::new(None, ns!(html), LocalName::from(tag)), attributes)
}

/// 创建文本节点
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 追加子节点并维护父指针
pub fn append_child(parent: &Handle, child: &Handle) {
    if let Some(previous) = get_parent_node(child) {
        unlink_from(&previous, child);
    }
    parent.children.borrow_mut().push(child.clone());
    child.parent.set(Some(Rc::downgrade(parent)));
}

/// 用单个文本节点替换全部子节点
pub fn set_text(node: &Handle, text: &str) {
    for child in node.children.borrow_mut().drain(..) {
        child.parent.set(None);
    }
    append_child(node, &create_text(text));
}

/// 拼接所有文本后代，`skip` 返回 true 的元素整棵子树被跳过
pub fn text_content<F>(node: &Handle, skip: F) -> String
where
    F: Fn(&Handle) -> bool,
{
    let mut out = String::new();
    collect_text(node, &skip, &mut out);
    out
}

fn collect_text<F>(node: &Handle, skip: &F, out: &mut String)
where
    F: Fn(&Handle) -> bool,
{
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        NodeData::Element { .. } if skip(node) => {}
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, skip, out);
            }
        }
    }
}

/// 节点移除的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    /// 通过父指针移除
    FromParent,
    /// 父指针缺失或失效，在整棵文档树中找到持有者后移除
    FromDocumentSearch,
    /// 节点已不在任何位置
    AlreadyDetached,
}

/// 从树中移除节点，父节点已被页面移走时也不会 panic
pub fn detach(node: &Handle, document: &Handle) -> Detach {
    if let Some(parent) = get_parent_node(node) {
        if unlink_from(&parent, node) {
            node.parent.set(None);
            return Detach::FromParent;
        }
    }

    let holder = descendants(document).into_iter().find(|candidate| {
        candidate
            .children
            .borrow()
            .iter()
            .any(|child| Rc::ptr_eq(child, node))
    });

    node.parent.set(None);
    match holder {
        Some(holder) => {
            unlink_from(&holder, node);
            Detach::FromDocumentSearch
        }
        None => Detach::AlreadyDetached,
    }
}

fn unlink_from(parent: &Handle, node: &Handle) -> bool {
    let mut children = parent.children.borrow_mut();
    match children.iter().position(|child| Rc::ptr_eq(child, node)) {
        Some(index) => {
            children.remove(index);
            true
        }
        None => false,
    }
}
