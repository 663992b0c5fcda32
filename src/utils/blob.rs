//! 传输载荷解码：base64 → UTF-8 → JSON
//!
//! 空白载荷解码为空对象；格式错误降级为空文档而不是可见失败

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Base64解码失败: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("UTF-8解码失败: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("JSON解析失败: {0}")]
    Parse(#[from] serde_json::Error),
}

fn empty_document() -> Value {
    Value::Object(Map::new())
}

/// 严格解码：空白内容得到空对象，格式错误返回Err
pub fn try_blob_to_json(blob: &str) -> Result<Value, BlobError> {
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return Ok(empty_document());
    }
    let bytes = STANDARD.decode(trimmed)?;
    let text = String::from_utf8(bytes)?;
    let body = text.trim();
    if body.is_empty() {
        return Ok(empty_document());
    }
    Ok(serde_json::from_str(body)?)
}

/// 宽容解码：任何格式错误都降级为空文档
pub fn blob_to_json(blob: &str) -> Value {
    match try_blob_to_json(blob) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("载荷解码失败，降级为空文档: {}", e);
            empty_document()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(text: &str) -> String {
        STANDARD.encode(text.as_bytes())
    }

    #[test]
    fn test_empty_blob_decodes_to_empty_object() {
        assert_eq!(blob_to_json(""), json!({}));
        assert_eq!(blob_to_json("   \n\t"), json!({}), "纯空白载荷等同于空载荷");
    }

    #[test]
    fn test_blank_payload_inside_blob() {
        let blob = encode("   \n  ");
        assert_eq!(blob_to_json(&blob), json!({}), "解码后只剩空白也应该得到空对象");
    }

    #[test]
    fn test_valid_blob_roundtrip() {
        let doc = json!({"标题": "测试", "n": 3});
        let blob = encode(&doc.to_string());
        assert_eq!(blob_to_json(&blob), doc);
    }

    #[test]
    fn test_malformed_base64_degrades() {
        assert!(try_blob_to_json("@@不是base64@@").is_err());
        assert_eq!(blob_to_json("@@不是base64@@"), json!({}), "坏载荷降级为空文档");
    }

    #[test]
    fn test_malformed_json_degrades() {
        let blob = encode("{broken json");
        assert!(matches!(try_blob_to_json(&blob), Err(BlobError::Parse(_))));
        assert_eq!(blob_to_json(&blob), json!({}));
    }

    #[test]
    fn test_invalid_utf8_degrades() {
        let blob = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(try_blob_to_json(&blob), Err(BlobError::Utf8(_))));
        assert_eq!(blob_to_json(&blob), json!({}));
    }
}
