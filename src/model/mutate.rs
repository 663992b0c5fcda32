//! 结构变更：增删子节点与经由锚点的类型替换

use serde_json::{json, Value};

use crate::model::node_tree::{
    append_array_item, append_object_row, bind_leaf, gen, occupant_of, AnchorRef, NodeKind, NodeRef,
    Payload,
};

/// 对象新增行的缺省键名
pub const DEFAULT_KEY: &str = "new";

/// 追加子节点：按值克隆当前末位子项，空容器以null起步；
/// 对象同时克隆末行键名。非容器节点无操作
pub fn add_child(container: &NodeRef) {
    let kind = container.borrow().kind();
    match kind {
        NodeKind::Array => {
            let seed = {
                let nb = container.borrow();
                nb.items()
                    .and_then(|items| items.last())
                    .and_then(occupant_of)
                    .map(|n| n.borrow().value())
                    .unwrap_or(Value::Null)
            };
            append_array_item(container, &seed);
        }
        NodeKind::Object => {
            let (key, seed) = {
                let nb = container.borrow();
                match nb.rows().and_then(|rows| rows.last()) {
                    Some(row) => (
                        row.key.clone(),
                        occupant_of(&row.anchor)
                            .map(|n| n.borrow().value())
                            .unwrap_or(Value::Null),
                    ),
                    None => (DEFAULT_KEY.to_string(), Value::Null),
                }
            };
            append_object_row(container, &key, &seed);
        }
        _ => {
            tracing::warn!("忽略对非容器节点的追加操作: {:?}", kind);
        }
    }
}

/// 删除末位子节点；空容器无操作。该设计不支持任意位置删除
pub fn delete_last(container: &NodeRef) {
    let mut nb = container.borrow_mut();
    match &mut nb.payload {
        Payload::Array(items) => {
            items.pop();
        }
        Payload::Object(rows) => {
            rows.pop();
        }
        _ => {
            tracing::warn!("忽略对非容器节点的删除操作");
        }
    }
}

/// 环形菜单的类型替换：丢弃当前节点，按目标变体的种子值重建，
/// 经锚点重新装入，祖先与焦点引用保持有效
pub fn retype(anchor: &AnchorRef, kind: NodeKind) {
    let Some(node) = occupant_of(anchor) else {
        return;
    };
    let current = node.borrow().value();
    drop(node);

    match kind {
        NodeKind::Null => gen(&Value::Null, anchor),
        NodeKind::Array => gen(&json!([current]), anchor),
        NodeKind::String => {
            let text = serde_json::to_string(&current).unwrap_or_default();
            gen(&Value::String(text), anchor);
        }
        NodeKind::Object => gen(&json!({}), anchor),
        NodeKind::Boolean => gen(&Value::Bool(false), anchor),
        // 数值强制转换可能产生NaN暂态，必须保留文本形态
        NodeKind::Number => bind_leaf(Payload::Number(coerce_number_text(&current)), anchor),
        NodeKind::Unknown => {
            tracing::warn!("类型替换不提供未知变体");
        }
    }
}

/// 取值到数字文本的强制转换：null→0，布尔→0/1，数字原样，
/// 可解析字符串取其数值，其余落入NaN暂态
fn coerce_number_text(value: &Value) -> String {
    match value {
        Value::Null => "0".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let t = s.trim();
            if t.parse::<f64>().map(|f| f.is_finite()).unwrap_or(false) {
                t.to_string()
            } else {
                "NaN".to_string()
            }
        }
        Value::Array(_) | Value::Object(_) => "NaN".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node_tree::build_tree;
    use serde_json::json;

    fn root(tree: &AnchorRef) -> NodeRef {
        occupant_of(tree).expect("根锚点应该有节点")
    }

    #[test]
    fn test_array_add_clones_last_value() {
        let tree = build_tree(&json!([1, 2]));
        let node = root(&tree);
        add_child(&node);
        assert_eq!(node.borrow().value(), json!([1, 2, 2]), "追加应该克隆末位取值");
    }

    #[test]
    fn test_array_add_on_empty_seeds_null() {
        let tree = build_tree(&json!([]));
        let node = root(&tree);
        add_child(&node);
        assert_eq!(node.borrow().value(), json!([null]), "空数组追加以null起步");
    }

    #[test]
    fn test_object_add_clones_key_and_value() {
        let tree = build_tree(&json!({"tag": "a"}));
        let node = root(&tree);
        add_child(&node);
        let rows_len = node.borrow().children_len();
        assert_eq!(rows_len, 2, "计数器应该随追加更新");
        {
            let nb = node.borrow();
            let rows = nb.rows().expect("对象");
            assert_eq!(rows[1].key, "tag", "新行应该克隆末行键名");
        }
        // 重复键名物化时后者覆盖前者
        assert_eq!(node.borrow().value(), json!({"tag": "a"}));
    }

    #[test]
    fn test_object_add_on_empty_uses_default_key() {
        let tree = build_tree(&json!({}));
        let node = root(&tree);
        add_child(&node);
        assert_eq!(node.borrow().value(), json!({"new": null}), "空对象的新行键名为new");
    }

    #[test]
    fn test_delete_removes_only_last() {
        let tree = build_tree(&json!([1, 2, 3]));
        let node = root(&tree);
        delete_last(&node);
        assert_eq!(node.borrow().value(), json!([1, 2]));
        delete_last(&node);
        delete_last(&node);
        delete_last(&node);
        assert_eq!(node.borrow().value(), json!([]), "空容器删除是无操作");
    }

    #[test]
    fn test_delete_then_add_changes_content() {
        // 删除后追加恢复长度但不恢复内容：追加克隆的是删除后的末位
        let tree = build_tree(&json!([1, 9]));
        let node = root(&tree);
        delete_last(&node);
        add_child(&node);
        assert_eq!(node.borrow().value(), json!([1, 1]));
    }

    #[test]
    fn test_retype_seeds_per_variant() {
        let cases = [
            (NodeKind::Null, json!(null)),
            (NodeKind::Array, json!([7])),
            (NodeKind::String, json!("7")),
            (NodeKind::Object, json!({})),
            (NodeKind::Boolean, json!(false)),
            (NodeKind::Number, json!(7)),
        ];
        for (kind, expected) in cases {
            let tree = build_tree(&json!(7));
            retype(&tree, kind);
            let node = root(&tree);
            assert_eq!(node.borrow().kind(), kind);
            assert_eq!(node.borrow().value(), expected, "种子值应该符合变体规则");
        }
    }

    #[test]
    fn test_retype_string_uses_json_text() {
        let tree = build_tree(&json!({"a": 1}));
        retype(&tree, NodeKind::String);
        assert_eq!(root(&tree).borrow().value(), json!("{\"a\":1}"), "字符串种子是当前值的JSON文本");
    }

    #[test]
    fn test_retype_number_coercion() {
        let tree = build_tree(&json!("3.5"));
        retype(&tree, NodeKind::Number);
        assert_eq!(root(&tree).borrow().value(), json!(3.5));

        let tree2 = build_tree(&json!("不是数字"));
        retype(&tree2, NodeKind::Number);
        let node = root(&tree2);
        assert_eq!(node.borrow().kind(), NodeKind::Number);
        assert_eq!(node.borrow().value(), json!(null), "无法转换时落入NaN暂态");

        let tree3 = build_tree(&json!(true));
        retype(&tree3, NodeKind::Number);
        assert_eq!(root(&tree3).borrow().value(), json!(1));
    }

    #[test]
    fn test_retype_keeps_ancestor_reference_valid() {
        let tree = build_tree(&json!({"slot": 1}));
        let node = root(&tree);
        let slot_anchor = {
            let nb = node.borrow();
            nb.rows().expect("对象")[0].anchor.clone()
        };

        retype(&slot_anchor, NodeKind::Array);

        // 父节点持有的锚点没有换，换的只是锚点内的占位节点
        assert_eq!(node.borrow().value(), json!({"slot": [1]}), "祖先经锚点看到新变体");
        let fresh = occupant_of(&slot_anchor).expect("锚点应该有新节点");
        assert_eq!(fresh.borrow().kind(), NodeKind::Array);
    }
}
