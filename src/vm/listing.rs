//! 扁平渲染清单：从活动节点树派生的影子行，供渲染层懒加载展示
//!
//! 只带结构、路径与轻量预览，不复制大值

use serde::Serialize;
use serde_json::Value;

use crate::model::node_tree::{occupant_of, AnchorRef, NodeKind, NodeRef};

/// 清单里的一行（与渲染层解耦的数据快照）
#[derive(Debug, Clone, Serialize)]
pub struct ListingRow {
    /// 节点在父级中的键名或序号的字符串形式
    pub name: String,
    /// RFC 9535 风格路径（用于展示与定位）
    pub path: String,
    pub kind: NodeKind,
    /// 子元素数量（对象行数 / 数组长度）
    pub children: usize,
    /// 轻量预览（字符串截断、数字/布尔/空的简短描述）
    pub preview: String,
    /// 缩进深度
    pub depth: usize,
    pub expanded: bool,
    /// 祖先全部展开时才可见
    pub visible: bool,
    /// 挂在该节点上的标注条数
    pub annotations: usize,
}

const PREVIEW_CHARS: usize = 32;

fn preview_of(node: &NodeRef) -> String {
    let nb = node.borrow();
    match nb.kind() {
        NodeKind::Object => format!("{{..}} ({} keys)", nb.children_len()),
        NodeKind::Array => format!("[..] ({} items)", nb.children_len()),
        NodeKind::String => {
            let text = nb.display_text();
            let trimmed = text.trim();
            if trimmed.chars().count() > PREVIEW_CHARS {
                let truncated: String = trimmed.chars().take(PREVIEW_CHARS).collect();
                format!("\"{}...\"", truncated)
            } else {
                format!("\"{}\"", trimmed)
            }
        }
        _ => match nb.value() {
            Value::String(s) => s,
            other => other.to_string(),
        },
    }
}

/// 字段含特殊字符时退到bracket写法
fn field_path(base: &str, key: &str) -> String {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{}.{}", base, key)
    } else {
        format!("{}['{}']", base, key.replace('\'', "\\'"))
    }
}

/// 从根锚点构建全树扁平清单
pub fn build_listing(root: &AnchorRef) -> Vec<ListingRow> {
    let mut out = Vec::with_capacity(64);
    walk(&mut out, root, "$", "$", 0, true);
    out
}

fn walk(out: &mut Vec<ListingRow>, anchor: &AnchorRef, path: &str, name: &str, depth: usize, visible: bool) {
    let Some(node) = occupant_of(anchor) else {
        return;
    };

    let (kind, children, expanded, annotations) = {
        let nb = node.borrow();
        (nb.kind(), nb.children_len(), nb.is_expanded(), nb.annotations().len())
    };
    out.push(ListingRow {
        name: name.to_string(),
        path: path.to_string(),
        kind,
        children,
        preview: preview_of(&node),
        depth,
        expanded,
        visible,
        annotations,
    });

    let children_visible = visible && expanded;
    match kind {
        NodeKind::Object => {
            let rows: Vec<(String, AnchorRef)> = {
                let nb = node.borrow();
                nb.rows()
                    .map(|rows| rows.iter().map(|r| (r.key.clone(), r.anchor.clone())).collect())
                    .unwrap_or_default()
            };
            for (key, child) in rows {
                let child_path = field_path(path, &key);
                walk(out, &child, &child_path, &key, depth + 1, children_visible);
            }
        }
        NodeKind::Array => {
            let items: Vec<AnchorRef> = {
                let nb = node.borrow();
                nb.items().map(|items| items.to_vec()).unwrap_or_default()
            };
            for (idx, child) in items.iter().enumerate() {
                let child_path = format!("{}[{}]", path, idx);
                walk(out, child, &child_path, &format!("[{}]", idx), depth + 1, children_visible);
            }
        }
        _ => {}
    }
}
