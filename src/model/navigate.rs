//! 焦点导航：四向意图驱动的树上状态机
//!
//! 焦点持有锚点而不是具体节点，类型替换后焦点自动跟随新占位节点。
//! 对象行在键标签与取值之间交错推进，决定整棵树的Tab序手感

use std::rc::Rc;

use crate::model::node_tree::{occupant_of, AnchorRef, Payload};

/// 当前聚焦位置
#[derive(Clone)]
pub enum Focus {
    /// 聚焦某个锚点的占位节点（取值侧）
    Element(AnchorRef),
    /// 聚焦对象某一行的键标签（对象锚点 + 行号）
    Label(AnchorRef, usize),
}

impl PartialEq for Focus {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Focus::Element(a), Focus::Element(b)) => Rc::ptr_eq(a, b),
            (Focus::Label(a, i), Focus::Label(b, j)) => Rc::ptr_eq(a, b) && i == j,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Focus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Focus::Element(a) => {
                let kind = occupant_of(a).map(|n| n.borrow().kind());
                write!(f, "Element({:?})", kind)
            }
            Focus::Label(_, i) => write!(f, "Label(row {})", i),
        }
    }
}

pub struct FocusNavigator {
    current: Option<Focus>,
}

impl Default for FocusNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusNavigator {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<&Focus> {
        self.current.as_ref()
    }

    pub fn focus(&mut self, focus: Focus) {
        self.current = Some(focus);
    }

    pub fn focus_root(&mut self, root: &AnchorRef) {
        self.current = Some(Focus::Element(root.clone()));
    }

    /// 同辈次序前进；边界处回逃到父级继续同一意图，根处无操作
    pub fn nav_next(&mut self) {
        self.apply(next_focus);
    }

    /// 同辈次序后退
    pub fn nav_prev(&mut self) {
        self.apply(prev_focus);
    }

    /// 下探：容器进入首个子项（对象先到键标签），标签进入本行取值
    pub fn nav_in(&mut self) {
        self.apply(in_focus);
    }

    /// 上浮到父级
    pub fn nav_out(&mut self) {
        self.apply(out_focus);
    }

    fn apply(&mut self, step: fn(&Focus) -> Option<Focus>) {
        if let Some(current) = &self.current {
            if let Some(next) = step(current) {
                self.current = Some(next);
            }
        }
    }
}

fn next_focus(focus: &Focus) -> Option<Focus> {
    match focus {
        // 键标签的下一站是本行取值
        Focus::Label(object, row) => {
            let node = occupant_of(object)?;
            let nb = node.borrow();
            let rows = nb.rows()?;
            rows.get(*row).map(|r| Focus::Element(r.anchor.clone()))
        }
        Focus::Element(anchor) => sibling_next(anchor),
    }
}

fn prev_focus(focus: &Focus) -> Option<Focus> {
    match focus {
        Focus::Label(object, row) => {
            if *row > 0 {
                // 前一行的取值
                let node = occupant_of(object)?;
                let nb = node.borrow();
                let rows = nb.rows()?;
                rows.get(*row - 1).map(|r| Focus::Element(r.anchor.clone()))
            } else {
                // 首行标签的边界回逃：把容器当作父级中的取值继续后退
                sibling_prev(object)
            }
        }
        Focus::Element(anchor) => sibling_prev(anchor),
    }
}

fn in_focus(focus: &Focus) -> Option<Focus> {
    match focus {
        Focus::Label(object, row) => {
            let node = occupant_of(object)?;
            let nb = node.borrow();
            let rows = nb.rows()?;
            rows.get(*row).map(|r| Focus::Element(r.anchor.clone()))
        }
        Focus::Element(anchor) => {
            let node = occupant_of(anchor)?;
            let nb = node.borrow();
            match &nb.payload {
                Payload::Object(rows) if !rows.is_empty() => Some(Focus::Label(anchor.clone(), 0)),
                Payload::Array(items) => items.first().map(|a| Focus::Element(a.clone())),
                _ => None,
            }
        }
    }
}

fn out_focus(focus: &Focus) -> Option<Focus> {
    match focus {
        Focus::Label(object, _) => Some(Focus::Element(object.clone())),
        Focus::Element(anchor) => {
            let parent = anchor.borrow().parent()?;
            let parent_anchor = parent.borrow().anchor_ref()?;
            Some(Focus::Element(parent_anchor))
        }
    }
}

/// 锚点在父级中的下一个同辈；数组推进到下一元素，
/// 对象从取值推进到下一行键标签；末位时携同一意图回逃父级
fn sibling_next(anchor: &AnchorRef) -> Option<Focus> {
    let parent = anchor.borrow().parent()?;
    let step = {
        let pb = parent.borrow();
        match &pb.payload {
            Payload::Array(items) => {
                let idx = anchor_index(items, anchor)?;
                items.get(idx + 1).map(|a| Focus::Element(a.clone()))
            }
            Payload::Object(rows) => {
                let idx = rows.iter().position(|r| Rc::ptr_eq(&r.anchor, anchor))?;
                if idx + 1 < rows.len() {
                    pb.anchor_ref().map(|pa| Focus::Label(pa, idx + 1))
                } else {
                    None
                }
            }
            _ => None,
        }
    };
    match step {
        Some(next) => Some(next),
        None => {
            let parent_anchor = parent.borrow().anchor_ref()?;
            sibling_next(&parent_anchor)
        }
    }
}

/// 取值侧的后退：对象行取值退回本行键标签（交错），
/// 数组元素退到前一元素，首位时携同一意图回逃父级
fn sibling_prev(anchor: &AnchorRef) -> Option<Focus> {
    let parent = anchor.borrow().parent()?;
    let step = {
        let pb = parent.borrow();
        match &pb.payload {
            Payload::Object(rows) => {
                let idx = rows.iter().position(|r| Rc::ptr_eq(&r.anchor, anchor))?;
                pb.anchor_ref().map(|pa| Focus::Label(pa, idx))
            }
            Payload::Array(items) => {
                let idx = anchor_index(items, anchor)?;
                if idx > 0 {
                    items.get(idx - 1).map(|a| Focus::Element(a.clone()))
                } else {
                    None
                }
            }
            _ => None,
        }
    };
    match step {
        Some(prev) => Some(prev),
        None => {
            let parent_anchor = parent.borrow().anchor_ref()?;
            sibling_prev(&parent_anchor)
        }
    }
}

fn anchor_index(items: &[AnchorRef], anchor: &AnchorRef) -> Option<usize> {
    items.iter().position(|a| Rc::ptr_eq(a, anchor))
}
