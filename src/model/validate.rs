//! 增量校验：结构检查与模式校验交织的自重整轮询循环
//!
//! 模式求值本身是外部能力，核心只负责调度、快照比对与错误回映

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;

use crate::model::node_tree::{
    for_each_node, occupant_of, AnchorRef, AnnotationClass, NodeRef,
};
use crate::model::path_match::PathMatcher;

/// 重复键名的结构标注文案
pub const MSG_DUPLICATE_KEY: &str = "重复的键名";

/// 周期完成后的重整延迟（宿主据此安排下一轮）
pub const VALIDATION_DELAY: Duration = Duration::from_secs(1);

/// 模式求值失败的定位信息（结构路径形如 /a/0/b）
#[derive(Debug, Clone)]
pub struct EvalFailure {
    pub data_path: String,
    pub message: String,
}

/// 外部模式求值器的单轮报告
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub valid: bool,
    /// 求值中发现的未解析外部引用
    pub missing: Vec<String>,
    pub failure: Option<EvalFailure>,
}

impl EvalReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            missing: Vec::new(),
            failure: None,
        }
    }
}

/// 模式求值器：外部协作者，核心只依赖这一接口
pub trait SchemaEvaluator {
    fn evaluate(&self, value: &Value) -> EvalReport;
    /// 登记一份外部引用的子模式，随后的求值应该能看到它
    fn register_schema(&mut self, uri: &str, schema: Value);
}

/// 外部引用获取：一次拿一份子模式文档
pub trait RefFetcher {
    fn fetch(&self, uri: &str) -> anyhow::Result<Value>;
}

/// 始终通过的求值器（宿主未接入模式校验时的缺省实现）
pub struct NullEvaluator;

impl SchemaEvaluator for NullEvaluator {
    fn evaluate(&self, _value: &Value) -> EvalReport {
        EvalReport::ok()
    }

    fn register_schema(&mut self, uri: &str, _schema: Value) {
        tracing::warn!("空求值器忽略子模式登记: {}", uri);
    }
}

/// 不提供外部引用获取的缺省实现
pub struct NullFetcher;

impl RefFetcher for NullFetcher {
    fn fetch(&self, uri: &str) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("未接入外部引用获取: {}", uri))
    }
}

/// 单轮校验的收束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 上一轮仍在进行，本轮整体跳过
    Skipped,
    /// 结构检查已做，取值快照未变，模式检查短路
    Unchanged,
    /// 模式检查通过
    SchemaPassed,
    /// 模式检查未通过（或外部引用收束失败）
    SchemaFailed,
}

pub struct ValidationEngine<E: SchemaEvaluator, F: RefFetcher> {
    evaluator: E,
    fetcher: F,
    matcher: PathMatcher,
    cached_snapshot: Option<String>,
    in_flight: bool,
    fetched_refs: HashSet<String>,
}

impl<E: SchemaEvaluator, F: RefFetcher> ValidationEngine<E, F> {
    pub fn new(evaluator: E, fetcher: F) -> Self {
        Self {
            evaluator,
            fetcher,
            matcher: PathMatcher::new(),
            cached_snapshot: None,
            in_flight: false,
            fetched_refs: HashSet::new(),
        }
    }

    /// 跑一个完整周期：结构检查总是执行；取值快照变化时才做模式检查。
    /// 单飞保护：周期重入直接跳过，不同快照绝不交错
    pub fn run_cycle(&mut self, root: &AnchorRef) -> CycleOutcome {
        if self.in_flight {
            tracing::warn!("上一轮校验仍在进行，跳过本轮");
            return CycleOutcome::Skipped;
        }
        self.in_flight = true;
        let outcome = self.cycle_inner(root);
        self.in_flight = false;
        outcome
    }

    fn cycle_inner(&mut self, root: &AnchorRef) -> CycleOutcome {
        clear_class(root, AnnotationClass::State);
        let Some(node) = occupant_of(root) else {
            return CycleOutcome::Unchanged;
        };

        // 结构检查每轮都做：取值不变时重复键名状态仍可能变化
        node.borrow().validate();

        let value = node.borrow().value();
        let snapshot = serde_json::to_string(&value).unwrap_or_default();
        if self.cached_snapshot.as_deref() == Some(snapshot.as_str()) {
            return CycleOutcome::Unchanged;
        }
        self.cached_snapshot = Some(snapshot);

        // 本周期内的重试一律复用这份快照，不观察中途的修改
        self.schema_pass(root, &value)
    }

    fn schema_pass(&mut self, root: &AnchorRef, value: &Value) -> CycleOutcome {
        loop {
            let report = self.evaluator.evaluate(value);

            if let Some(uri) = report.missing.first().cloned() {
                if !self.fetched_refs.insert(uri.clone()) {
                    // 登记过仍然缺失：不再原地打转，按失败收束
                    tracing::error!("外部引用登记后仍缺失: {}", uri);
                    return self.fail_on_ref(root, &uri);
                }
                match self.fetcher.fetch(&uri) {
                    Ok(schema) => {
                        tracing::info!("外部引用已获取并登记: {}", uri);
                        self.evaluator.register_schema(&uri, schema);
                        continue;
                    }
                    Err(e) => {
                        tracing::error!("外部引用获取失败: {}: {}", uri, e);
                        return self.fail_on_ref(root, &uri);
                    }
                }
            }

            clear_class(root, AnnotationClass::Schema);
            if report.valid {
                return CycleOutcome::SchemaPassed;
            }

            let (path, message) = match report.failure {
                Some(failure) => (failure.data_path, failure.message),
                None => (String::new(), "取值违反绑定的模式".to_string()),
            };
            if let Some(target) = self.locate(root, &path) {
                target.borrow_mut().annotate(AnnotationClass::Schema, &message);
            }
            return CycleOutcome::SchemaFailed;
        }
    }

    /// 引用收束失败：失败即报错（fail-closed），标注落在根上
    fn fail_on_ref(&mut self, root: &AnchorRef, uri: &str) -> CycleOutcome {
        clear_class(root, AnnotationClass::Schema);
        if let Some(node) = occupant_of(root) {
            node.borrow_mut().annotate(
                AnnotationClass::Schema,
                &format!("无法解析外部引用: {}", uri),
            );
        }
        CycleOutcome::SchemaFailed
    }

    /// 把结构路径折算成点分词元并经匹配器回映到节点；
    /// 路径为空或完全无法解析时落回根节点
    fn locate(&self, root: &AnchorRef, data_path: &str) -> Option<NodeRef> {
        let query = data_path.replace('/', ".");
        let query = query.trim_matches('.');

        let resolved = if query.is_empty() {
            None
        } else {
            self.matcher
                .resolve_query(query, root, true)
                .target
                .and_then(|a| occupant_of(&a))
        };
        resolved.or_else(|| occupant_of(root))
    }

    /// 取值快照失效，下一轮强制重新做模式检查
    pub fn invalidate_snapshot(&mut self) {
        self.cached_snapshot = None;
    }

    #[cfg(test)]
    fn force_in_flight(&mut self) {
        self.in_flight = true;
    }
}

/// 清掉整棵树上某一类标注（两类标注互不影响）
pub fn clear_class(root: &AnchorRef, class: AnnotationClass) {
    for_each_node(root, &mut |node| {
        node.borrow_mut().clear_annotations(class);
    });
}

/// 收集整棵树上的标注（节点 + 标注），宿主据此渲染
pub fn collect_annotations(root: &AnchorRef) -> Vec<(NodeRef, crate::model::node_tree::Annotation)> {
    let mut out = Vec::new();
    for_each_node(root, &mut |node| {
        for a in node.borrow().annotations() {
            out.push((node.clone(), a.clone()));
        }
    });
    out
}
