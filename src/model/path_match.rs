//! 模糊路径匹配：把点分路径解析为（词元、展开、目标、置信度）链
//!
//! 同一匹配原语同时服务交互式搜索与模式错误到节点的回映

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;

use crate::model::node_tree::{occupant_of, AnchorRef, NodeKind, NodeRef, Payload};

/// 一段路径词元的解析结果
#[derive(Clone, Serialize)]
pub struct MatchStep {
    pub token: String,
    /// 词元展开后的完整标签（对象键名原样大小写 / 1起始序号 / 叶子文本）
    pub expanded: Option<String>,
    /// 命中的子树锚点
    #[serde(skip)]
    pub target: Option<AnchorRef>,
    /// 置信度，1.0为完全一致，沿链相乘，弱环节拉低整体
    pub score: f64,
}

impl std::fmt::Debug for MatchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchStep")
            .field("token", &self.token)
            .field("expanded", &self.expanded)
            .field("matched", &self.target.is_some())
            .field("score", &self.score)
            .finish()
    }
}

impl MatchStep {
    fn missed(token: &str) -> Self {
        Self {
            token: token.to_string(),
            expanded: None,
            target: None,
            score: 0.0,
        }
    }
}

/// 路径查询的整体解析结果
#[derive(Debug, Clone)]
pub struct QueryResolution {
    /// 各段展开标签以 '.' 重新拼接后的完整路径
    pub expanded: String,
    /// 链上最深的已解析目标；尾段失败时回退到最后命中的节点
    pub target: Option<AnchorRef>,
}

pub struct PathMatcher {
    matcher: SkimMatcherV2,
}

impl Default for PathMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMatcher {
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    /// 词元对候选文本的归一化打分：1.0为完全一致，趋向0为差匹配，
    /// 自匹配得分作为满分基准
    fn score(&self, candidate: &str, token: &str) -> f64 {
        let candidate = candidate.to_lowercase();
        let token = token.to_lowercase();
        if candidate == token {
            return 1.0;
        }
        let Some(ceiling) = self.matcher.fuzzy_match(&candidate, &candidate) else {
            return 0.0;
        };
        if ceiling <= 0 {
            return 0.0;
        }
        match self.matcher.fuzzy_match(&candidate, &token) {
            Some(s) if s > 0 => (s as f64 / ceiling as f64).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// 把词元序列从给定锚点向下解析。空词元序列是成功的空操作；
    /// 词元超出可用结构时返回 expanded/target 为空、score为0 的一步，
    /// 不报错，由调用方决定是否提前停止
    pub fn match_path(&self, anchor: &AnchorRef, tokens: &[&str]) -> Vec<MatchStep> {
        let Some(node) = occupant_of(anchor) else {
            return tokens.first().map(|t| vec![MatchStep::missed(t)]).unwrap_or_default();
        };
        self.match_node(&node, tokens)
    }

    fn match_node(&self, node: &NodeRef, tokens: &[&str]) -> Vec<MatchStep> {
        let Some(head) = tokens.first() else {
            return Vec::new();
        };
        let kind = node.borrow().kind();
        match kind {
            NodeKind::Object => self.match_object(node, head, &tokens[1..]),
            NodeKind::Array => self.match_array(node, head, &tokens[1..]),
            _ => self.match_leaf(node, head),
        }
    }

    /// 对象：词元对全部键名做大小写不敏感模糊匹配，严格更优者胜出，
    /// 并列时保留先遇到的行
    fn match_object(&self, node: &NodeRef, head: &str, rest: &[&str]) -> Vec<MatchStep> {
        let token = head.trim();
        let mut best: Option<(String, AnchorRef, f64)> = None;
        {
            let nb = node.borrow();
            if let Payload::Object(rows) = &nb.payload {
                for row in rows {
                    let s = self.score(&row.key, token);
                    if s > best.as_ref().map(|(_, _, b)| *b).unwrap_or(0.0) {
                        best = Some((row.key.clone(), row.anchor.clone(), s));
                    }
                }
            }
        }

        let Some((key, target, score)) = best else {
            return vec![MatchStep::missed(head)];
        };

        let mut step = MatchStep {
            token: head.to_string(),
            expanded: Some(key),
            target: Some(target.clone()),
            score,
        };
        let sub = self.match_path(&target, rest);
        if let Some(first) = sub.first() {
            step.score *= first.score;
        }
        let mut result = vec![step];
        result.extend(sub);
        result
    }

    /// 数组：字面词元 `*` 在全部元素里取递归得分最高者；
    /// 数字词元按1起始序号直取，得分随数组规模增长
    fn match_array(&self, node: &NodeRef, head: &str, rest: &[&str]) -> Vec<MatchStep> {
        let token = head.trim();
        let items: Vec<AnchorRef> = {
            let nb = node.borrow();
            match &nb.payload {
                Payload::Array(items) => items.to_vec(),
                _ => Vec::new(),
            }
        };

        if token == "*" {
            let mut best_idx: Option<usize> = None;
            let mut best_sub: Vec<MatchStep> = Vec::new();
            let mut best_score = 0.0f64;
            for (i, item) in items.iter().enumerate() {
                let sub = self.match_path(item, rest);
                let score = sub.first().map(|s| s.score).unwrap_or(0.0);
                if score > best_score {
                    best_score = score;
                    best_idx = Some(i);
                    best_sub = sub;
                }
            }
            let mut result = vec![MatchStep {
                token: head.to_string(),
                expanded: best_idx.map(|i| (i + 1).to_string()),
                target: best_idx.map(|i| items[i].clone()),
                score: best_score,
            }];
            result.extend(best_sub);
            return result;
        }

        let index = token
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1 && *n <= items.len())
            .map(|n| n - 1);
        let Some(idx) = index else {
            return vec![MatchStep::missed(head)];
        };

        let target = items[idx].clone();
        let mut step = MatchStep {
            token: head.to_string(),
            expanded: Some((idx + 1).to_string()),
            target: Some(target.clone()),
            // 序号越具体歧义越小：随规模缓慢趋近1的熵式打分
            score: 1.0 - 1.0 / (1.0 + (1.0 + items.len() as f64).ln()),
        };
        let sub = self.match_path(&target, rest);
        if let Some(first) = sub.first() {
            step.score *= first.score;
        }
        let mut result = vec![step];
        result.extend(sub);
        result
    }

    /// 叶子：词元与展示文本比较（与键名匹配同一原语）；
    /// 剩余词元超出结构，静默丢弃
    fn match_leaf(&self, node: &NodeRef, head: &str) -> Vec<MatchStep> {
        let (text, anchor) = {
            let nb = node.borrow();
            (nb.display_text().to_lowercase(), nb.anchor_ref())
        };
        let score = self.score(&text, head.trim());
        vec![MatchStep {
            token: head.to_string(),
            expanded: Some(text),
            target: anchor,
            score,
        }]
    }

    /// 把点分查询串解析为展开路径与最深目标；reveal 时沿途展开折叠容器
    pub fn resolve_query(&self, query: &str, anchor: &AnchorRef, reveal: bool) -> QueryResolution {
        let tokens: Vec<&str> = query.split('.').collect();
        let steps = self.match_path(anchor, &tokens);

        let mut expanded = String::new();
        let mut target: Option<AnchorRef> = None;
        for step in &steps {
            if let Some(label) = &step.expanded {
                if !expanded.is_empty() {
                    expanded.push('.');
                }
                expanded.push_str(label);
            }
            if let Some(hit) = &step.target {
                if reveal {
                    if let Some(node) = occupant_of(hit) {
                        node.borrow_mut().show();
                    }
                }
                target = Some(hit.clone());
            }
        }
        QueryResolution { expanded, target }
    }
}
