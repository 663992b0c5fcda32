//! 程序入口：初始化日志，加载文档，演示树清单、路径搜索与校验循环
//!
//! 这是最薄的演示宿主：真实渲染层、模式求值器与引用获取按接口另行接入

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::fmt::SubscriberBuilder;

use jilu_bianji::{
    CycleOutcome, EditorSession, FileKv, NullEvaluator, NullFetcher,
};

struct Args {
    file: PathBuf,
    /// 文件内容按传输载荷（base64）处理
    blob: bool,
    query: Option<String>,
    history_file: PathBuf,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut file = None;
    let mut blob = false;
    let mut query = None;
    let mut history_file = PathBuf::from("jilu_bianji_history.json");

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--blob" => blob = true,
            "--query" => query = args.next(),
            "--history" => {
                if let Some(p) = args.next() {
                    history_file = PathBuf::from(p);
                }
            }
            other => file = Some(PathBuf::from(other)),
        }
    }

    let file = file.context("用法: jilu_bianji <文档文件> [--blob] [--query 路径] [--history 文件]")?;
    Ok(Args {
        file,
        blob,
        query,
        history_file,
    })
}

fn main() -> anyhow::Result<()> {
    // 初始化日志输出
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let args = parse_args()?;
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("读取文档失败: {}", args.file.display()))?;

    let store = FileKv::open(&args.history_file);
    let mut session = if args.blob {
        EditorSession::from_blob(&content, NullEvaluator, NullFetcher, store)
    } else {
        let doc = serde_json::from_str(&content)
            .with_context(|| format!("JSON解析失败: {}", args.file.display()))?;
        EditorSession::from_value(&doc, NullEvaluator, NullFetcher, store)
    };
    tracing::info!("文档加载完成: {}", args.file.display());

    // 可选的路径查询：展开缩写并定位节点
    if let Some(query) = &args.query {
        session.handle(jilu_bianji::Command::OpenSearch);
        session.set_search_text(query);
        session.handle(jilu_bianji::Command::Submit);
        println!("查询: {} → {}", query, session.search_text());
        println!("状态: {}", session.status());
        session.handle(jilu_bianji::Command::Dismiss);
    }

    // 两轮校验演示快照短路
    let first = session.run_validation_cycle();
    let second = session.run_validation_cycle();
    tracing::info!("校验: 第一轮 {:?}，第二轮 {:?}", first, second);
    debug_assert_eq!(second, CycleOutcome::Unchanged);

    for (node, annotation) in session.annotations() {
        println!("标注[{:?}] {:?}: {}", annotation.class, node.borrow().kind(), annotation.message);
    }

    // 扁平清单（可见行）
    for row in session.listing().iter().filter(|r| r.visible) {
        println!(
            "{}{} {:?} {} {}",
            "  ".repeat(row.depth),
            row.name,
            row.kind,
            row.preview,
            if row.children > 0 {
                format!("({})", row.children)
            } else {
                String::new()
            }
        );
    }

    Ok(())
}
