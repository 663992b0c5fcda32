//! IO helper: safe file read/write for JSON

use std::{fs::File, io::BufReader, path::Path};

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON解析失败: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 从文件读取JSON数据
pub fn read_json_file(p: &Path) -> Result<Value, FsError> {
    let f = File::open(p)?;
    let rdr = BufReader::new(f);
    let v: Value = serde_json::from_reader(rdr)?;
    Ok(v)
}

/// 将JSON数据保存到文件（格式化输出）
pub fn write_json_file(p: &Path, value: &Value) -> Result<(), FsError> {
    let f = File::create(p)?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let path = dir.path().join("doc.json");
        let doc = json!({"名称": "测试", "items": [1, 2, 3]});

        write_json_file(&path, &doc).expect("写入失败");
        assert_eq!(read_json_file(&path).expect("读取失败"), doc);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_json_file(Path::new("/不存在/的/路径.json"));
        assert!(matches!(err, Err(FsError::Io(_))));
    }
}
