//! 节点树：以锚点间接层组织的多态JSON节点
//!
//! 所有权沿 父节点 → 锚点 → 子节点 单向流动；子节点通过弱引用回溯父级，
//! 绝不延长父级生命周期。祖先只持有锚点，类型替换只换锚点内的占位节点

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde_json::{Map, Number, Value};

pub type NodeRef = Rc<RefCell<JsonNode>>;
pub type AnchorRef = Rc<RefCell<NodeAnchor>>;

/// 节点类型（七种变体，与JSON值的运行时类型一一对应）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
    Unknown,
}

/// 标注类别：结构错误与模式错误是两类独立状态，清除一类不影响另一类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnnotationClass {
    /// 树自洽性问题（如重复键名）
    State,
    /// 取值违反绑定的模式
    Schema,
}

/// 挂在节点上的非致命标注，触发条件消失后自动清除
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub class: AnnotationClass,
    pub message: String,
}

/// 锚点：节点在父级中的占位。类型替换时只更换占位节点本身，
/// 持有锚点的祖先与焦点引用全部保持有效
#[derive(Debug)]
pub struct NodeAnchor {
    occupant: Option<NodeRef>,
    parent: Weak<RefCell<JsonNode>>,
}

impl NodeAnchor {
    /// 无父级的锚点（树根）
    pub fn detached() -> AnchorRef {
        Rc::new(RefCell::new(Self {
            occupant: None,
            parent: Weak::new(),
        }))
    }

    fn child_of(parent: &NodeRef) -> AnchorRef {
        Rc::new(RefCell::new(Self {
            occupant: None,
            parent: Rc::downgrade(parent),
        }))
    }

    /// 当前占位节点；仅在构建中途短暂为空
    pub fn occupant(&self) -> Option<NodeRef> {
        self.occupant.clone()
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade()
    }
}

/// 取锚点当前占位节点的便捷入口
pub fn occupant_of(anchor: &AnchorRef) -> Option<NodeRef> {
    anchor.borrow().occupant()
}

/// 对象行：可编辑的键名文本 + 子节点锚点。键名唯一性只检查、不强制
#[derive(Debug)]
pub struct ObjectRow {
    pub key: String,
    pub anchor: AnchorRef,
}

/// 变体数据载荷
#[derive(Debug)]
pub enum Payload {
    Null,
    Boolean(bool),
    /// 文本内容，取值时做数值解析；解析失败是合法暂态而非错误
    Number(String),
    Text(String),
    /// 未识别类型的原始文本回显
    Unknown(String),
    Array(Vec<AnchorRef>),
    Object(Vec<ObjectRow>),
}

pub struct JsonNode {
    pub(crate) payload: Payload,
    anchor: Weak<RefCell<NodeAnchor>>,
    expanded: bool,
    annotations: Vec<Annotation>,
}

impl std::fmt::Debug for JsonNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonNode")
            .field("kind", &self.kind())
            .field("expanded", &self.expanded)
            .finish()
    }
}

impl JsonNode {
    fn fresh(payload: Payload) -> NodeRef {
        Rc::new(RefCell::new(Self {
            payload,
            anchor: Weak::new(),
            expanded: true,
            annotations: Vec::new(),
        }))
    }

    pub fn kind(&self) -> NodeKind {
        match self.payload {
            Payload::Null => NodeKind::Null,
            Payload::Boolean(_) => NodeKind::Boolean,
            Payload::Number(_) => NodeKind::Number,
            Payload::Text(_) => NodeKind::String,
            Payload::Unknown(_) => NodeKind::Unknown,
            Payload::Array(_) => NodeKind::Array,
            Payload::Object(_) => NodeKind::Object,
        }
    }

    /// 自身所在锚点
    pub fn anchor_ref(&self) -> Option<AnchorRef> {
        self.anchor.upgrade()
    }

    /// 父节点（经由锚点回溯，弱引用）
    pub fn parent(&self) -> Option<NodeRef> {
        self.anchor.upgrade().and_then(|a| a.borrow().parent())
    }

    /// 物化当前JSON等价值（容器递归）
    pub fn value(&self) -> Value {
        match &self.payload {
            Payload::Null => Value::Null,
            Payload::Boolean(b) => Value::Bool(*b),
            Payload::Number(text) => number_value(text),
            Payload::Text(text) => Value::String(text.clone()),
            Payload::Unknown(raw) => Value::String(raw.clone()),
            Payload::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|a| occupant_of(a).map(|n| n.borrow().value()).unwrap_or(Value::Null))
                    .collect(),
            ),
            Payload::Object(rows) => {
                let mut map = Map::new();
                for row in rows {
                    let v = occupant_of(&row.anchor)
                        .map(|n| n.borrow().value())
                        .unwrap_or(Value::Null);
                    // 重复键名以后出现者为准
                    map.insert(row.key.clone(), v);
                }
                Value::Object(map)
            }
        }
    }

    /// 叶子节点的展示文本，路径匹配把词元与它比较
    pub fn display_text(&self) -> String {
        match &self.payload {
            Payload::Null => "null".to_string(),
            Payload::Boolean(b) => b.to_string(),
            Payload::Number(text) => text.trim().to_string(),
            Payload::Text(text) => text.clone(),
            Payload::Unknown(raw) => raw.clone(),
            Payload::Array(_) | Payload::Object(_) => String::new(),
        }
    }

    /// 子节点数量（对象行数 / 数组长度），即对外可见的计数器
    pub fn children_len(&self) -> usize {
        match &self.payload {
            Payload::Array(items) => items.len(),
            Payload::Object(rows) => rows.len(),
            _ => 0,
        }
    }

    pub fn items(&self) -> Option<&[AnchorRef]> {
        match &self.payload {
            Payload::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<&[ObjectRow]> {
        match &self.payload {
            Payload::Object(rows) => Some(rows),
            _ => None,
        }
    }

    /// 编辑叶子文本内容（数字/字符串/未知类型），换行统一为 \n
    pub fn set_text(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n");
        match &mut self.payload {
            Payload::Number(t) | Payload::Text(t) | Payload::Unknown(t) => *t = normalized,
            _ => {
                tracing::warn!("忽略对非文本节点的文本写入: {:?}", self.kind());
            }
        }
    }

    /// 布尔节点的勾选状态
    pub fn set_checked(&mut self, checked: bool) {
        match &mut self.payload {
            Payload::Boolean(b) => *b = checked,
            _ => {
                tracing::warn!("忽略对非布尔节点的勾选写入: {:?}", self.kind());
            }
        }
    }

    /// 修改对象行的键名；唯一性由校验循环检查，这里不拒绝重复
    pub fn set_row_key(&mut self, index: usize, key: &str) {
        if let Payload::Object(rows) = &mut self.payload {
            if let Some(row) = rows.get_mut(index) {
                row.key = key.replace("\r\n", "\n").replace('\n', "");
            }
        }
    }

    /// 展开显示（叶子无操作；不影响取值）
    pub fn show(&mut self) {
        if matches!(self.payload, Payload::Array(_) | Payload::Object(_)) {
            self.expanded = true;
        }
    }

    /// 折叠显示（叶子无操作；不影响取值）
    pub fn hide(&mut self) {
        if matches!(self.payload, Payload::Array(_) | Payload::Object(_)) {
            self.expanded = false;
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotate(&mut self, class: AnnotationClass, message: &str) {
        self.annotations.push(Annotation {
            class,
            message: message.to_string(),
        });
    }

    pub fn clear_annotations(&mut self, class: AnnotationClass) {
        self.annotations.retain(|a| a.class != class);
    }

    /// 本地结构检查：对象的直接子行做重复键名标注，每个重复行记一条；
    /// 其余变体无操作。容器递归下探
    pub fn validate(&self) {
        match &self.payload {
            Payload::Object(rows) => {
                let mut counts: HashMap<&str, usize> = HashMap::new();
                for row in rows {
                    *counts.entry(row.key.as_str()).or_insert(0) += 1;
                }
                for row in rows {
                    let duplicated = counts.get(row.key.as_str()).copied().unwrap_or(0) > 1;
                    if let Some(child) = occupant_of(&row.anchor) {
                        if duplicated {
                            child
                                .borrow_mut()
                                .annotate(AnnotationClass::State, super::validate::MSG_DUPLICATE_KEY);
                        }
                        child.borrow().validate();
                    }
                }
            }
            Payload::Array(items) => {
                for item in items {
                    if let Some(child) = occupant_of(item) {
                        child.borrow().validate();
                    }
                }
            }
            _ => {}
        }
    }
}

/// 数字文本的取值规则：整数形态保留整数，有限浮点保留浮点，
/// 解析失败（NaN暂态）物化为 null
fn number_value(text: &str) -> Value {
    let t = text.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Value::Number(Number::from(i));
    }
    if let Ok(u) = t.parse::<u64>() {
        return Value::Number(Number::from(u));
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// 数组默认折叠阈值：元素超过该数量时初始为折叠态
const ARRAY_COLLAPSE_OVER: usize = 5;
/// 对象默认折叠阈值
const OBJECT_COLLAPSE_OVER: usize = 10;

/// 按运行时类型分派构建节点并绑定到锚点。封闭的穷尽分派：
/// 同一位置任一时刻只有一个变体，类型变更总是经由锚点销毁重建
pub fn gen(data: &Value, anchor: &AnchorRef) {
    let node = match data {
        Value::Null => JsonNode::fresh(Payload::Null),
        Value::Array(items) => {
            let node = JsonNode::fresh(Payload::Array(Vec::with_capacity(items.len())));
            for item in items {
                append_array_item(&node, item);
            }
            if items.len() > ARRAY_COLLAPSE_OVER {
                node.borrow_mut().hide();
            }
            node
        }
        Value::Bool(b) => JsonNode::fresh(Payload::Boolean(*b)),
        Value::Number(n) => match n.as_f64() {
            // 有限数字之外的形态走未知类型回显
            Some(f) if f.is_finite() => JsonNode::fresh(Payload::Number(n.to_string())),
            _ => JsonNode::fresh(Payload::Unknown(n.to_string())),
        },
        Value::String(s) => JsonNode::fresh(Payload::Text(s.clone())),
        Value::Object(map) => {
            let node = JsonNode::fresh(Payload::Object(Vec::with_capacity(map.len())));
            for (k, v) in map {
                append_object_row(&node, k, v);
            }
            if map.len() > OBJECT_COLLAPSE_OVER {
                node.borrow_mut().hide();
            }
            node
        }
    };

    bind(node, anchor);
}

/// 把现成节点装入锚点（类型替换复用同一入口）
pub(crate) fn bind(node: NodeRef, anchor: &AnchorRef) {
    node.borrow_mut().anchor = Rc::downgrade(anchor);
    anchor.borrow_mut().occupant = Some(node);
}

/// 直接构造叶子节点并装入锚点（数值强制转换需要承载NaN文本时使用）
pub(crate) fn bind_leaf(payload: Payload, anchor: &AnchorRef) {
    bind(JsonNode::fresh(payload), anchor);
}

/// 向数组节点追加一个按值构建的子节点
pub(crate) fn append_array_item(node: &NodeRef, value: &Value) {
    let child = NodeAnchor::child_of(node);
    gen(value, &child);
    if let Payload::Array(items) = &mut node.borrow_mut().payload {
        items.push(child);
    }
}

/// 向对象节点追加一行
pub(crate) fn append_object_row(node: &NodeRef, key: &str, value: &Value) {
    let child = NodeAnchor::child_of(node);
    gen(value, &child);
    if let Payload::Object(rows) = &mut node.borrow_mut().payload {
        rows.push(ObjectRow {
            key: key.to_string(),
            anchor: child,
        });
    }
}

/// 从根JSON值构建整棵树，返回根锚点
pub fn build_tree(data: &Value) -> AnchorRef {
    let root = NodeAnchor::detached();
    gen(data, &root);
    root
}

/// 先序遍历整棵子树
pub fn for_each_node(anchor: &AnchorRef, f: &mut impl FnMut(&NodeRef)) {
    let Some(node) = occupant_of(anchor) else {
        return;
    };
    f(&node);
    let children: Vec<AnchorRef> = {
        let nb = node.borrow();
        match &nb.payload {
            Payload::Array(items) => items.to_vec(),
            Payload::Object(rows) => rows.iter().map(|r| r.anchor.clone()).collect(),
            _ => Vec::new(),
        }
    };
    for child in &children {
        for_each_node(child, f);
    }
}
