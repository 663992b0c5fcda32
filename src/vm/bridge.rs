//! VM桥接层：把节点树、路径搜索、焦点导航与校验循环装配成编辑会话
//!
//! 渲染层只通过类型化命令驱动会话，经扁平清单与标注读取状态

use serde_json::Value;

use crate::model::history::{KvStore, MemoryKv, SearchHistory};
use crate::model::navigate::{Focus, FocusNavigator};
use crate::model::node_tree::{build_tree, occupant_of, AnchorRef, Annotation, NodeRef};
use crate::model::path_match::PathMatcher;
use crate::model::validate::{
    collect_annotations, CycleOutcome, NullEvaluator, NullFetcher, RefFetcher, SchemaEvaluator,
    ValidationEngine,
};
use crate::utils::blob::blob_to_json;
use crate::vm::input::{map_key, Command, Key};
use crate::vm::listing::{build_listing, ListingRow};

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_SEARCH_OPEN: &str = "路径搜索已打开";
pub const STATUS_SEARCH_EMPTY: &str = "查询为空，未执行搜索";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";

/// 编辑会话：核心四件套加搜索浮层状态的装配体
pub struct EditorSession<E: SchemaEvaluator, F: RefFetcher, S: KvStore> {
    root: AnchorRef,
    navigator: FocusNavigator,
    matcher: PathMatcher,
    history: SearchHistory<S>,
    engine: ValidationEngine<E, F>,
    search_open: bool,
    search_input: String,
    status: String,
}

impl EditorSession<NullEvaluator, NullFetcher, MemoryKv> {
    /// 不接模式校验与持久化的会话（测试与离线宿主）
    pub fn offline(doc: &Value) -> Self {
        Self::from_value(doc, NullEvaluator, NullFetcher, MemoryKv::new())
    }
}

impl<E: SchemaEvaluator, F: RefFetcher, S: KvStore> EditorSession<E, F, S> {
    pub fn from_value(doc: &Value, evaluator: E, fetcher: F, store: S) -> Self {
        let root = build_tree(doc);
        // 最外层总是展开着开场
        if let Some(node) = occupant_of(&root) {
            node.borrow_mut().show();
        }
        let mut navigator = FocusNavigator::new();
        navigator.focus_root(&root);

        tracing::info!("编辑会话已创建");
        Self {
            root,
            navigator,
            matcher: PathMatcher::new(),
            history: SearchHistory::new(store),
            engine: ValidationEngine::new(evaluator, fetcher),
            search_open: false,
            search_input: String::new(),
            status: STATUS_READY.to_string(),
        }
    }

    /// 从传输载荷开始会话；坏载荷降级为空文档，绝不拒绝开场
    pub fn from_blob(blob: &str, evaluator: E, fetcher: F, store: S) -> Self {
        Self::from_value(&blob_to_json(blob), evaluator, fetcher, store)
    }

    pub fn root(&self) -> &AnchorRef {
        &self.root
    }

    /// 物化当前文档（模式求值器看到的就是这个值）
    pub fn document(&self) -> Value {
        occupant_of(&self.root)
            .map(|n| n.borrow().value())
            .unwrap_or(Value::Null)
    }

    pub fn listing(&self) -> Vec<ListingRow> {
        build_listing(&self.root)
    }

    pub fn focus(&self) -> Option<&Focus> {
        self.navigator.current()
    }

    pub fn focus_mut(&mut self) -> &mut FocusNavigator {
        &mut self.navigator
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn search_is_open(&self) -> bool {
        self.search_open
    }

    pub fn search_text(&self) -> &str {
        &self.search_input
    }

    /// 宿主把输入框文本镜像进来（逐键或失焦时）
    pub fn set_search_text(&mut self, text: &str) {
        self.search_input = text.to_string();
    }

    /// 按键入口：折算规则由搜索浮层是否打开决定
    pub fn handle_key(&mut self, key: Key, ctrl: bool) {
        if let Some(cmd) = map_key(key, ctrl, self.search_open) {
            self.handle(cmd);
        }
    }

    /// 命令入口（单线程同步执行，一次只跑一个逻辑操作）
    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::OpenSearch => {
                self.search_open = true;
                self.status = STATUS_SEARCH_OPEN.to_string();
            }
            Command::Submit => {
                if self.search_open {
                    self.submit_search();
                }
            }
            Command::Dismiss => {
                self.search_open = false;
                self.status = STATUS_READY.to_string();
            }
            Command::HistoryUp => {
                if self.search_open {
                    let current = self.search_input.clone();
                    if let Some(text) = self.history.up(&current) {
                        self.search_input = text;
                    }
                }
            }
            Command::HistoryDown => {
                if self.search_open {
                    if let Some(text) = self.history.down() {
                        self.search_input = text;
                    }
                }
            }
            Command::NavPrev => self.tree_nav(FocusNavigator::nav_prev),
            Command::NavNext => self.tree_nav(FocusNavigator::nav_next),
            Command::NavIn => self.tree_nav(FocusNavigator::nav_in),
            Command::NavOut => self.tree_nav(FocusNavigator::nav_out),
        }
    }

    fn tree_nav(&mut self, step: fn(&mut FocusNavigator)) {
        // 搜索浮层打开时方向键属于输入框，不动树焦点
        if !self.search_open {
            step(&mut self.navigator);
        }
    }

    /// 提交搜索：记入历史、解析查询、把输入框改写为展开路径并聚焦命中节点
    fn submit_search(&mut self) {
        let query = self.search_input.trim().to_string();
        if query.is_empty() {
            self.status = STATUS_SEARCH_EMPTY.to_string();
            return;
        }
        self.history.push(&query);

        let resolution = self.matcher.resolve_query(&query, &self.root, true);
        tracing::info!("搜索提交: {} → {}", query, resolution.expanded);
        self.search_input = resolution.expanded.clone();
        match resolution.target {
            Some(target) => {
                self.navigator.focus(Focus::Element(target));
                self.status = format!("已定位: {}", resolution.expanded);
            }
            None => {
                self.status = format!("{}路径未命中: {}", STATUS_ERROR_PREFIX, query);
            }
        }
    }

    /// 跑一轮校验（宿主按 VALIDATION_DELAY 的节奏反复调用）
    pub fn run_validation_cycle(&mut self) -> CycleOutcome {
        self.engine.run_cycle(&self.root)
    }

    /// 当前全部标注（节点 + 标注内容）
    pub fn annotations(&self) -> Vec<(NodeRef, Annotation)> {
        collect_annotations(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node_tree::NodeKind;
    use serde_json::json;

    #[test]
    fn test_empty_blob_end_to_end() {
        let mut session = EditorSession::from_blob("", NullEvaluator, NullFetcher, MemoryKv::new());

        let doc = session.document();
        assert_eq!(doc, json!({}), "空载荷应该开出空文档");

        let listing = session.listing();
        assert_eq!(listing.len(), 1, "只有根一行");
        assert_eq!(listing[0].children, 0, "空文档没有子节点");

        session.run_validation_cycle();
        assert!(session.annotations().is_empty(), "空文档不应该有任何标注");
    }

    #[test]
    fn test_malformed_blob_degrades_to_empty() {
        let session =
            EditorSession::from_blob("@@@坏载荷@@@", NullEvaluator, NullFetcher, MemoryKv::new());
        assert_eq!(session.document(), json!({}), "坏载荷降级为空文档而不是失败");
    }

    #[test]
    fn test_search_flow_via_keyboard() {
        let doc = json!({"metadata": {"title": "论文"}});
        let mut session = EditorSession::offline(&doc);

        session.handle_key(Key::Space, true);
        assert!(session.search_is_open());
        assert_eq!(session.status(), STATUS_SEARCH_OPEN);

        session.set_search_text("met.tit");
        session.handle_key(Key::Enter, false);

        assert_eq!(session.search_text(), "metadata.title", "提交后输入框改写为展开路径");
        let focused = session.focus().expect("应该有焦点");
        match focused {
            Focus::Element(anchor) => {
                let node = occupant_of(anchor).expect("锚点应该有节点");
                assert_eq!(node.borrow().value(), json!("论文"), "焦点应该落在命中节点");
            }
            other => panic!("焦点类型不对: {:?}", other),
        }

        session.handle_key(Key::Escape, false);
        assert!(!session.search_is_open());
    }

    #[test]
    fn test_history_navigation_with_stash() {
        let mut session = EditorSession::offline(&json!({"alpha": 1, "beta": 2}));
        session.handle(Command::OpenSearch);

        session.set_search_text("alpha");
        session.handle(Command::Submit);
        session.set_search_text("beta");
        session.handle(Command::Submit);

        // 活动行写了一半，向上翻历史
        session.set_search_text("gam");
        session.handle(Command::HistoryUp);
        assert_eq!(session.search_text(), "beta");
        session.handle(Command::HistoryUp);
        assert_eq!(session.search_text(), "alpha");
        session.handle(Command::HistoryDown);
        assert_eq!(session.search_text(), "beta");
        session.handle(Command::HistoryDown);
        assert_eq!(session.search_text(), "gam", "翻回活动行应该恢复未保存的文本");
    }

    #[test]
    fn test_arrow_keys_belong_to_search_when_open() {
        let mut session = EditorSession::offline(&json!({"a": {"b": 1}}));
        let before = session.focus().cloned();

        session.handle(Command::OpenSearch);
        session.handle(Command::NavIn);
        assert_eq!(session.focus(), before.as_ref(), "搜索打开时导航命令不应该动树焦点");

        session.handle(Command::Dismiss);
        session.handle(Command::NavIn);
        assert_ne!(session.focus(), before.as_ref(), "浮层收掉后导航恢复");
    }

    #[test]
    fn test_submit_reveals_collapsed_containers() {
        // 超过5个元素的数组开场是折叠的
        let doc = json!({"rows": [1, 2, 3, 4, 5, 6]});
        let mut session = EditorSession::offline(&doc);
        let collapsed = session
            .listing()
            .iter()
            .find(|r| r.kind == NodeKind::Array)
            .map(|r| r.expanded);
        assert_eq!(collapsed, Some(false));

        session.handle(Command::OpenSearch);
        session.set_search_text("rows");
        session.handle(Command::Submit);

        let expanded = session
            .listing()
            .iter()
            .find(|r| r.kind == NodeKind::Array)
            .map(|r| r.expanded);
        assert_eq!(expanded, Some(true), "搜索命中应该沿途展开折叠容器");
    }

    #[test]
    fn test_validation_cycle_through_session() {
        let mut session = EditorSession::offline(&json!({"a": 1}));
        assert_eq!(session.run_validation_cycle(), CycleOutcome::SchemaPassed);
        assert_eq!(session.run_validation_cycle(), CycleOutcome::Unchanged, "取值未变时第二轮短路");
    }
}
