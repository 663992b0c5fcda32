//! JSON记录编辑器核心库
//!
//! 提供JSON节点树构建、模糊路径匹配、焦点导航、结构变更与增量校验
//! 遵循MVVM架构模式，渲染层、模式求值与传输解码作为外部协作者接入

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::history::{FileKv, KvStore, MemoryKv, SearchHistory, HISTORY_CAP};
pub use model::mutate::{add_child, delete_last, retype};
pub use model::navigate::{Focus, FocusNavigator};
pub use model::node_tree::{
    build_tree, gen, occupant_of, AnchorRef, Annotation, AnnotationClass, JsonNode, NodeAnchor,
    NodeKind, NodeRef,
};
pub use model::path_match::{MatchStep, PathMatcher, QueryResolution};
pub use model::validate::{
    collect_annotations, CycleOutcome, EvalFailure, EvalReport, NullEvaluator, NullFetcher,
    RefFetcher, SchemaEvaluator, ValidationEngine, VALIDATION_DELAY,
};
pub use utils::blob::{blob_to_json, try_blob_to_json, BlobError};
pub use vm::bridge::EditorSession;
pub use vm::input::{map_key, Command, Key};
pub use vm::listing::{build_listing, ListingRow};
