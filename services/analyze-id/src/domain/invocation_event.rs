/// Lambda呼び出しイベント
///
/// 型なしのJSONペイロードを境界で検証し、AnalysisRequestに変換する。
/// イベント自体は読み取り専用として扱う。
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{AnalysisRequest, DocumentLocation, DocumentLocationError, FieldGroup, FieldGroupError};

/// 呼び出しイベントの検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEventError {
    /// JSONの構造が不正
    #[error("malformed event: {0}")]
    Malformed(String),
    /// documentLocationが不正
    #[error("invalid documentLocation: {0}")]
    Location(#[from] DocumentLocationError),
    /// backDocumentLocationが不正
    #[error("invalid backDocumentLocation: {0}")]
    BackLocation(DocumentLocationError),
    /// fieldGroupsが不正
    #[error("invalid fieldGroups: {0}")]
    FieldGroups(#[from] FieldGroupError),
}

/// 呼び出しイベント
///
/// ```json
/// {
///   "documentLocation": "s3://bucket/passport.png",
///   "backDocumentLocation": "s3://bucket/passport-back.png",
///   "documentTypeHint": "PASSPORT",
///   "fieldGroups": ["PERSONAL_INFO", "DOCUMENT_INFO"]
/// }
/// ```
///
/// 未知のメンバーは無視する。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    /// 画像への参照（必須・空文字不可）
    #[serde(default)]
    pub document_location: String,
    /// 裏面画像への参照
    #[serde(default)]
    pub back_document_location: Option<String>,
    /// 想定される書類種別
    #[serde(default)]
    pub document_type_hint: Option<String>,
    /// 要求するフィールドグループ
    #[serde(default)]
    pub field_groups: Option<Vec<String>>,
}

impl InvocationEvent {
    /// 参照のみを指定したイベントを作成
    pub fn new(document_location: impl Into<String>) -> Self {
        Self {
            document_location: document_location.into(),
            back_document_location: None,
            document_type_hint: None,
            field_groups: None,
        }
    }

    /// 書類種別ヒントを設定
    pub fn with_document_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.document_type_hint = Some(hint.into());
        self
    }

    /// 裏面画像を設定
    pub fn with_back_document_location(mut self, location: impl Into<String>) -> Self {
        self.back_document_location = Some(location.into());
        self
    }

    /// フィールドグループを設定
    pub fn with_field_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// 型なしJSONからイベントを構築する
    pub fn from_value(value: &Value) -> Result<Self, InvalidEventError> {
        if !value.is_object() {
            return Err(InvalidEventError::Malformed(
                "event must be a JSON object".to_string(),
            ));
        }
        Self::deserialize(value).map_err(|e| InvalidEventError::Malformed(e.to_string()))
    }

    /// AnalysisRequestを構築する
    ///
    /// `fieldGroups`が指定されていない場合は`default_groups`を使用する。
    /// 空白のみの`backDocumentLocation`は未指定として扱う。
    pub fn to_request(&self, default_groups: &[FieldGroup]) -> Result<AnalysisRequest, InvalidEventError> {
        let front = DocumentLocation::parse(&self.document_location)?;

        let back = match self.back_document_location.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                Some(DocumentLocation::parse(raw).map_err(InvalidEventError::BackLocation)?)
            }
            _ => None,
        };

        let field_groups = match &self.field_groups {
            Some(names) => FieldGroup::parse_all(names.iter().map(String::as_str))?,
            None => default_groups.to_vec(),
        };

        Ok(AnalysisRequest::new(
            front,
            back,
            field_groups,
            self.document_type_hint.clone(),
        ))
    }
}
