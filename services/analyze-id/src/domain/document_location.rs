//! ドキュメント参照の解析
//!
//! InvocationEventの`documentLocation`文字列を型付きの参照に変換する。
//! - `s3://<bucket>/<key>`（`?versionId=<id>`は任意）
//! - `data:<mime>;base64,<payload>`（インライン画像）

use base64::{Engine as _, engine::general_purpose};
use thiserror::Error;

/// Textract同期APIが受け付けるインライン画像の上限サイズ（10 MiB）
pub const MAX_INLINE_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// 上限サイズをBase64エンコードした長さ
const MAX_INLINE_ENCODED_BYTES: usize = 4 * MAX_INLINE_DOCUMENT_BYTES.div_ceil(3);

const S3_SCHEME: &str = "s3://";
const DATA_SCHEME: &str = "data:";
const VERSION_QUERY: &str = "?versionId=";
const BASE64_SUFFIX: &str = ";base64";

/// ドキュメント参照の解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentLocationError {
    #[error("document location is empty")]
    Empty,
    #[error("unsupported document location scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid S3 URI: {0}")]
    InvalidS3Uri(String),
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("inline document too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}

/// 解析対象画像への参照
#[derive(Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    /// S3オブジェクト
    S3Object {
        bucket: String,
        key: String,
        version: Option<String>,
    },
    /// イベントに埋め込まれた画像バイト列
    InlineBytes { mime_type: String, bytes: Vec<u8> },
}

impl DocumentLocation {
    /// 参照文字列を解析する
    ///
    /// 前後の空白は無視する。スキームの大文字小文字は区別しない。
    pub fn parse(raw: &str) -> Result<Self, DocumentLocationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DocumentLocationError::Empty);
        }

        if let Some(rest) = strip_scheme(trimmed, S3_SCHEME) {
            return Self::parse_s3(trimmed, rest);
        }

        if let Some(rest) = strip_scheme(trimmed, DATA_SCHEME) {
            return Self::parse_data(rest);
        }

        let scheme = trimmed
            .split_once(':')
            .map(|(scheme, _)| scheme.to_string())
            .unwrap_or_else(|| trimmed.chars().take(16).collect());
        Err(DocumentLocationError::UnsupportedScheme(scheme))
    }

    fn parse_s3(uri: &str, rest: &str) -> Result<Self, DocumentLocationError> {
        let (path, version) = match rest.rsplit_once(VERSION_QUERY) {
            Some((path, version)) if !version.is_empty() => (path, Some(version.to_string())),
            Some(_) => {
                return Err(DocumentLocationError::InvalidS3Uri(format!(
                    "{}: empty versionId",
                    uri
                )));
            }
            None => (rest, None),
        };

        let (bucket, key) = path
            .split_once('/')
            .ok_or_else(|| DocumentLocationError::InvalidS3Uri(format!("{}: missing key", uri)))?;

        if bucket.is_empty() || bucket.chars().any(char::is_whitespace) {
            return Err(DocumentLocationError::InvalidS3Uri(format!(
                "{}: invalid bucket name",
                uri
            )));
        }
        if key.is_empty() {
            return Err(DocumentLocationError::InvalidS3Uri(format!(
                "{}: missing key",
                uri
            )));
        }

        Ok(Self::S3Object {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version,
        })
    }

    fn parse_data(rest: &str) -> Result<Self, DocumentLocationError> {
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            DocumentLocationError::InvalidDataUri("missing ',' separator".to_string())
        })?;

        let mime_type = header.strip_suffix(BASE64_SUFFIX).ok_or_else(|| {
            DocumentLocationError::InvalidDataUri("only base64 payloads are supported".to_string())
        })?;
        let mime_type = if mime_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime_type.to_ascii_lowercase()
        };

        // デコード前にエンコード長で上限を判定する
        let payload = payload.trim();
        if payload.len() > MAX_INLINE_ENCODED_BYTES {
            return Err(DocumentLocationError::TooLarge {
                size: payload.len() / 4 * 3,
                max: MAX_INLINE_DOCUMENT_BYTES,
            });
        }

        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| DocumentLocationError::InvalidDataUri(e.to_string()))?;

        if bytes.is_empty() {
            return Err(DocumentLocationError::InvalidDataUri(
                "empty payload".to_string(),
            ));
        }
        if bytes.len() > MAX_INLINE_DOCUMENT_BYTES {
            return Err(DocumentLocationError::TooLarge {
                size: bytes.len(),
                max: MAX_INLINE_DOCUMENT_BYTES,
            });
        }

        Ok(Self::InlineBytes { mime_type, bytes })
    }

    /// ログ出力用の短い説明（画像バイト列は含めない）
    pub fn describe(&self) -> String {
        match self {
            Self::S3Object {
                bucket,
                key,
                version: Some(version),
            } => format!("s3://{}/{}?versionId={}", bucket, key, version),
            Self::S3Object { bucket, key, .. } => format!("s3://{}/{}", bucket, key),
            Self::InlineBytes { mime_type, bytes } => {
                format!("inline {} ({} bytes)", mime_type, bytes.len())
            }
        }
    }
}

impl std::fmt::Debug for DocumentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentLocation({})", self.describe())
    }
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let prefix = value.get(..scheme.len())?;
    if prefix.eq_ignore_ascii_case(scheme) {
        Some(&value[scheme.len()..])
    } else {
        None
    }
}
