//! 身分証明書解析モジュール
//!
//! Textract AnalyzeID APIの呼び出しを提供する。
//! - AnalysisRequestをAnalyzeIDリクエストに変換
//! - レスポンスをAnalysisResponseに変換
//! - SDKエラーを一時的障害/恒久的拒否に分類
//!
//! このモジュール内では再試行しない。SDKクライアントも再試行無効で構築する。

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_textract::Client as TextractClient;
use aws_sdk_textract::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_textract::primitives::Blob;
use aws_sdk_textract::types::{Document, IdentityDocument, S3Object};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{AnalysisRequest, AnalysisResponse, DocumentLocation, FieldValue, IdentityDocumentRecord};

/// 一時的な障害を示すTextractのエラーコード
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "InternalServerError",
    "LimitExceededException",
    "ServiceUnavailableException",
    "RequestTimeout",
    "RequestTimeoutException",
];

/// 解析操作のエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    /// 一時的な障害（呼び出し側で再試行可）
    #[error("Textract AnalyzeID一時エラー: {0}")]
    Unavailable(String),
    /// 恒久的な拒否（非対応形式、S3オブジェクト不正など）
    #[error("Textract AnalyzeID拒否: {0}")]
    Rejected(String),
}

impl AnalyzerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalyzerError::Unavailable(_))
    }
}

/// 身分証明書解析トレイト（テスト用の抽象化）
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// 身分証明書を解析する
    ///
    /// # 引数
    /// * `request` - 解析対象ページと要求フィールドグループ
    ///
    /// # 戻り値
    /// * `Ok(AnalysisResponse)` - 検出された書類（0件もあり得る）
    /// * `Err(AnalyzerError)` - 外部サービスのエラー
    async fn analyze_id(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalyzerError>;
}

/// 実際のTextract SDKを使用した解析実装
///
/// Lambdaのコールドスタート時に1回だけ構築し、以降の呼び出しで共有する。
pub struct TextractDocumentAnalyzer {
    client: TextractClient,
}

impl TextractDocumentAnalyzer {
    /// 新しいTextractDocumentAnalyzerを作成
    pub fn new(client: TextractClient) -> Self {
        Self { client }
    }

    /// AWS設定からクライアントを作成（SDKの自動再試行は無効）
    pub async fn from_config() -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        let client = TextractClient::new(&config);
        Self::new(client)
    }
}

#[async_trait]
impl DocumentAnalyzer for TextractDocumentAnalyzer {
    async fn analyze_id(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalyzerError> {
        let mut call = self.client.analyze_id();
        for page in request.pages() {
            call = call.document_pages(to_textract_document(page));
        }

        match call.send().await {
            Ok(output) => {
                let response = to_analysis_response(output.identity_documents());
                info!(
                    page_count = request.pages().len(),
                    document_count = response.len(),
                    "AnalyzeID成功"
                );
                Ok(response)
            }
            Err(err) => {
                let message = DisplayErrorContext(&err).to_string();
                let error = match &err {
                    SdkError::ServiceError(context) => classify_service_error(
                        err.code(),
                        Some(context.raw().status().as_u16()),
                        message,
                    ),
                    SdkError::ConstructionFailure(_) => AnalyzerError::Rejected(message),
                    // タイムアウト・接続失敗・レスポンス解析失敗
                    _ => AnalyzerError::Unavailable(message),
                };

                warn!(
                    error_code = err.code().unwrap_or("none"),
                    retryable = error.is_retryable(),
                    error = %error,
                    "AnalyzeIDエラー"
                );
                Err(error)
            }
        }
    }
}

/// サービスエラーを分類する
///
/// 一時的なエラーコード、HTTP 429、5xxは`Unavailable`、それ以外は`Rejected`。
pub fn classify_service_error(code: Option<&str>, status: Option<u16>, message: String) -> AnalyzerError {
    let transient_code = code.is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code));
    let transient_status = status.is_some_and(|status| status == 429 || status >= 500);

    if transient_code || transient_status {
        AnalyzerError::Unavailable(message)
    } else {
        AnalyzerError::Rejected(message)
    }
}

/// DocumentLocationをTextractのDocumentに変換する
fn to_textract_document(location: &DocumentLocation) -> Document {
    match location {
        DocumentLocation::S3Object {
            bucket,
            key,
            version,
        } => Document::builder()
            .s3_object(
                S3Object::builder()
                    .bucket(bucket)
                    .name(key)
                    .set_version(version.clone())
                    .build(),
            )
            .build(),
        DocumentLocation::InlineBytes { bytes, .. } => {
            Document::builder().bytes(Blob::new(bytes.clone())).build()
        }
    }
}

/// AnalyzeIDのIdentityDocumentsをAnalysisResponseに変換する
///
/// DocumentIndexが無い書類には、明示された番号と重ならない最小の番号
/// （1始まり）をレスポンス順に割り当てる。
fn to_analysis_response(documents: &[IdentityDocument]) -> AnalysisResponse {
    let explicit: BTreeSet<u32> = documents.iter().filter_map(explicit_index).collect();

    let mut next_index = 1;
    let mut records = Vec::with_capacity(documents.len());
    for document in documents {
        let document_index = match explicit_index(document) {
            Some(index) => index,
            None => {
                while explicit.contains(&next_index) {
                    next_index += 1;
                }
                let index = next_index;
                next_index += 1;
                index
            }
        };
        records.push(to_record(document_index, document));
    }
    AnalysisResponse::new(records)
}

fn explicit_index(document: &IdentityDocument) -> Option<u32> {
    document
        .document_index()
        .and_then(|index| u32::try_from(index).ok())
        .filter(|index| *index > 0)
}

fn to_record(document_index: u32, document: &IdentityDocument) -> IdentityDocumentRecord {
    let mut fields = BTreeMap::new();
    for field in document.identity_document_fields() {
        let Some(name) = field.r#type().map(|detection| detection.text()) else {
            continue;
        };
        let Some(detection) = field.value_detection() else {
            continue;
        };

        let normalized_value = detection
            .normalized_value()
            .and_then(|normalized| normalized.value())
            .map(str::to_string);

        fields.insert(
            name.to_string(),
            FieldValue::new(
                detection.text(),
                normalized_value,
                detection.confidence().unwrap_or(0.0),
            ),
        );
    }

    IdentityDocumentRecord::new(document_index, fields)
}
