/// 抽出結果
///
/// ハンドラーの出力。AnalysisResponseの生フィールドを正規化名に平坦化する。
/// 同じレスポンスからは常に同じ結果を生成する（順序付きマップを使用し、
/// 時刻やリクエストIDは含めない）。
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::domain::{AnalysisRequest, AnalysisResponse, CanonicalField, IdentityDocumentRecord};

/// エラー種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// 呼び出し元の入力不正（再試行不可）
    InvalidInputError,
    /// 外部サービスの一時的な障害（呼び出し側で再試行可）
    UpstreamUnavailableError,
    /// 外部サービスによる恒久的な拒否（再試行不可）
    UpstreamRejectedError,
    /// 書類が検出されなかった（エラーではなく空の結果）
    NoDocumentDetected,
}

impl ErrorKind {
    /// 呼び出し側での再試行対象か
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::UpstreamUnavailableError)
    }
}

/// エラー記述子
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ExtractionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
        }
    }

    pub fn no_document_detected() -> Self {
        Self::new(
            ErrorKind::NoDocumentDetected,
            "no identity document detected in the image",
        )
    }
}

/// 1つの書類を平坦化したフィールド
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFields {
    pub document_index: u32,
    pub fields: BTreeMap<String, String>,
    pub confidence: BTreeMap<String, f32>,
    pub low_confidence_fields: Vec<String>,
    pub filtered_fields: Vec<String>,
    pub unrecognized_fields: Vec<String>,
}

impl DocumentFields {
    /// レコードを正規化名に平坦化する
    ///
    /// - 空の値は除外
    /// - 未知のフィールドは除外し、生の名前を`unrecognized_fields`に記録
    /// - 要求されていないグループの値は除外し`filtered_fields`に記録
    /// - 信頼度が`min_confidence`未満の値は除外し`low_confidence_fields`に記録
    /// - 同じ正規化名に複数の値がある場合は信頼度の高い方を採用
    ///
    /// 値のある項目は必ず`fields`か除外理由のリストのどちらかに現れる。
    pub fn from_record(
        record: &IdentityDocumentRecord,
        request: &AnalysisRequest,
        min_confidence: f32,
    ) -> Self {
        let mut fields = BTreeMap::new();
        let mut confidence: BTreeMap<String, f32> = BTreeMap::new();
        let mut low_confidence = BTreeSet::new();
        let mut filtered = BTreeSet::new();
        let mut unrecognized = BTreeSet::new();

        for (raw_name, field_value) in &record.fields {
            let value = field_value.canonical_value();
            if value.is_empty() {
                continue;
            }

            let Some(canonical) = CanonicalField::from_raw(raw_name) else {
                debug!(
                    document_index = record.document_index,
                    field = %raw_name,
                    "未知のフィールドを除外"
                );
                unrecognized.insert(raw_name.clone());
                continue;
            };

            let name = canonical.name();
            if !request.wants(canonical.group()) {
                filtered.insert(name.to_string());
                continue;
            }

            if field_value.confidence < min_confidence {
                low_confidence.insert(name.to_string());
                continue;
            }

            let replace = confidence
                .get(name)
                .is_none_or(|existing| field_value.confidence > *existing);
            if replace {
                fields.insert(name.to_string(), value.to_string());
                confidence.insert(name.to_string(), field_value.confidence);
            }
        }

        // 別名で十分な信頼度の値が得られた項目は低信頼度扱いしない
        let low_confidence_fields = low_confidence
            .into_iter()
            .filter(|name| !fields.contains_key(name))
            .collect();

        Self {
            document_index: record.document_index,
            fields,
            confidence,
            low_confidence_fields,
            filtered_fields: filtered.into_iter().collect(),
            unrecognized_fields: unrecognized.into_iter().collect(),
        }
    }

    /// 書類種別（正規化名`documentType`）
    pub fn document_type(&self) -> Option<&str> {
        self.fields
            .get(CanonicalField::DocumentType.name())
            .map(String::as_str)
    }
}

/// ハンドラーの出力
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// 1件以上の書類を抽出できた場合にtrue
    pub success: bool,
    /// 検出された書類数
    pub document_count: usize,
    /// 主書類の正規化フィールド
    pub fields: BTreeMap<String, String>,
    /// 主書類の各フィールドの信頼度
    pub confidence: BTreeMap<String, f32>,
    /// 全書類（レスポンス順）
    pub documents: Vec<DocumentFields>,
    /// 主書類で信頼度不足により除外されたフィールド
    pub low_confidence_fields: Vec<String>,
    /// 主書類で要求外のグループとして除外されたフィールド
    pub filtered_fields: Vec<String>,
    /// 主書類で正規化名に対応しなかった生フィールド名
    pub unrecognized_fields: Vec<String>,
    /// エラー記述子（成功時はnull）
    pub error: Option<ExtractionError>,
}

impl ExtractionResult {
    /// AnalysisResponseから抽出結果を作成
    ///
    /// レコードが0件の場合は`NoDocumentDetected`の失敗結果。
    /// レコードがあれば、フィールドが全て除外されても成功とする
    /// （除外理由は`filtered_fields`などに残る）。
    /// 書類種別ヒントがあれば、それに一致する最初の書類を主書類とする。
    /// 一致しなければ先頭の書類。
    pub fn from_response(
        response: &AnalysisResponse,
        request: &AnalysisRequest,
        min_confidence: f32,
    ) -> Self {
        if response.is_empty() {
            return Self::failure(ExtractionError::no_document_detected());
        }

        let documents: Vec<DocumentFields> = response
            .records()
            .iter()
            .map(|record| DocumentFields::from_record(record, request, min_confidence))
            .collect();

        let primary_position = request
            .document_type_hint()
            .and_then(|hint| {
                documents.iter().position(|document| {
                    document
                        .document_type()
                        .is_some_and(|document_type| document_type.eq_ignore_ascii_case(hint))
                })
            })
            .unwrap_or(0);
        let primary = &documents[primary_position];

        Self {
            success: true,
            document_count: documents.len(),
            fields: primary.fields.clone(),
            confidence: primary.confidence.clone(),
            low_confidence_fields: primary.low_confidence_fields.clone(),
            filtered_fields: primary.filtered_fields.clone(),
            unrecognized_fields: primary.unrecognized_fields.clone(),
            documents,
            error: None,
        }
    }

    /// 失敗結果を作成
    pub fn failure(error: ExtractionError) -> Self {
        Self {
            success: false,
            document_count: 0,
            fields: BTreeMap::new(),
            confidence: BTreeMap::new(),
            documents: Vec::new(),
            low_confidence_fields: Vec::new(),
            filtered_fields: Vec::new(),
            unrecognized_fields: Vec::new(),
            error: Some(error),
        }
    }

    /// エラー種別（成功時はNone）
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }

    /// 呼び出し側で再試行すべき失敗か
    pub fn is_retryable(&self) -> bool {
        self.error.as_ref().is_some_and(|error| error.retryable)
    }
}
