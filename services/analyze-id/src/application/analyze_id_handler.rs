/// 身分証明書抽出ハンドラー
///
/// 1回の呼び出しにつき1回、同期的に抽出を行う。
/// イベント検証 → AnalysisRequest構築 → 外部解析（タイムアウト付き）→ 結果の正規化
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{ErrorKind, ExtractionError, ExtractionResult, InvalidEventError, InvocationEvent};
use crate::infrastructure::{AnalyzerConfig, AnalyzerError, DocumentAnalyzer};

/// ハンドラーのエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzeIdError {
    /// 呼び出し元の入力不正
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// 外部サービスの一時的障害・タイムアウト
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// 外部サービスによる恒久的な拒否
    #[error("upstream rejected: {0}")]
    UpstreamRejected(String),
}

impl AnalyzeIdError {
    /// 対応するエラー種別
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzeIdError::InvalidInput(_) => ErrorKind::InvalidInputError,
            AnalyzeIdError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailableError,
            AnalyzeIdError::UpstreamRejected(_) => ErrorKind::UpstreamRejectedError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<InvalidEventError> for AnalyzeIdError {
    fn from(err: InvalidEventError) -> Self {
        AnalyzeIdError::InvalidInput(err.to_string())
    }
}

impl From<AnalyzerError> for AnalyzeIdError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::Unavailable(message) => AnalyzeIdError::UpstreamUnavailable(message),
            AnalyzerError::Rejected(message) => AnalyzeIdError::UpstreamRejected(message),
        }
    }
}

impl From<AnalyzeIdError> for ExtractionError {
    fn from(err: AnalyzeIdError) -> Self {
        ExtractionError::new(err.kind(), err.to_string())
    }
}

/// 身分証明書抽出ハンドラー
///
/// 外部解析クライアントは呼び出し間で共有するが、リクエストごとに変更しない。
pub struct AnalyzeIdHandler<A>
where
    A: DocumentAnalyzer,
{
    /// 外部解析クライアント
    analyzer: A,
    /// 設定
    config: AnalyzerConfig,
}

impl<A> AnalyzeIdHandler<A>
where
    A: DocumentAnalyzer,
{
    /// 新しいAnalyzeIdHandlerを作成
    pub fn new(analyzer: A, config: AnalyzerConfig) -> Self {
        Self { analyzer, config }
    }

    /// 型付きイベントを処理する
    ///
    /// # 処理フロー
    /// 1. イベントからAnalysisRequestを構築（不正なら`InvalidInput`）
    /// 2. 外部解析をタイムアウト付きで呼び出し（タイムアウトは`UpstreamUnavailable`）
    /// 3. レスポンスをExtractionResultに正規化（0件なら`NoDocumentDetected`）
    ///
    /// 内部では再試行しない。
    pub async fn analyze(&self, event: &InvocationEvent) -> Result<ExtractionResult, AnalyzeIdError> {
        let request = event.to_request(self.config.default_field_groups())?;

        let documents: Vec<String> = request.pages().iter().map(|page| page.describe()).collect();
        let field_groups: Vec<&str> = request.field_groups().iter().map(|group| group.as_str()).collect();
        info!(
            documents = ?documents,
            field_groups = ?field_groups,
            document_type_hint = request.document_type_hint().unwrap_or(""),
            "AnalyzeID呼び出し開始"
        );

        let timeout = self.config.timeout();
        let response = match tokio::time::timeout(timeout, self.analyzer.analyze_id(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AnalyzeIdError::UpstreamUnavailable(format!(
                    "AnalyzeID call timed out after {}ms",
                    timeout.as_millis()
                )));
            }
        };

        let result = ExtractionResult::from_response(&response, &request, self.config.min_confidence());
        info!(
            success = result.success,
            document_count = result.document_count,
            field_count = result.fields.len(),
            low_confidence_count = result.low_confidence_fields.len(),
            "抽出完了"
        );
        Ok(result)
    }

    /// 型なしのイベントペイロードを処理する
    ///
    /// 全てのエラーをExtractionResultに畳み込む。パニックや構造化されていない
    /// エラーは返さない。
    pub async fn handle(&self, payload: &Value) -> ExtractionResult {
        let outcome = match InvocationEvent::from_value(payload) {
            Ok(event) => self.analyze(&event).await,
            Err(err) => Err(AnalyzeIdError::from(err)),
        };

        match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    kind = ?err.kind(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "抽出失敗"
                );
                ExtractionResult::failure(err.into())
            }
        }
    }

    /// Lambdaランタイムへの応答を決める
    ///
    /// 通常は`handle`と同じく全てのエラーを結果に畳み込む。
    /// `raise_retryable`が有効な場合のみ、再試行可能な失敗を`Err`で返し、
    /// プラットフォームの再試行に委ねる。
    pub async fn respond(&self, payload: &Value) -> Result<ExtractionResult, AnalyzeIdError> {
        let result = self.handle(payload).await;

        if self.config.raise_retryable() && result.is_retryable() {
            let message = result
                .error
                .map(|error| error.message)
                .unwrap_or_default();
            return Err(AnalyzeIdError::UpstreamUnavailable(message));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AnalysisResponse, DocumentLocation, DocumentLocationError, FieldGroup, FieldValue,
        IdentityDocumentRecord,
    };
    use crate::infrastructure::document_analyzer::tests::MockDocumentAnalyzer;
    use crate::infrastructure::logging::init_test_logging;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    // ==================== テストヘルパー ====================

    fn record(index: u32, fields: &[(&str, &str, f32)]) -> IdentityDocumentRecord {
        let fields: BTreeMap<String, FieldValue> = fields
            .iter()
            .map(|(name, value, confidence)| {
                (name.to_string(), FieldValue::new(*value, None, *confidence))
            })
            .collect();
        IdentityDocumentRecord::new(index, fields)
    }

    fn passport_response() -> AnalysisResponse {
        AnalysisResponse::new(vec![record(
            1,
            &[
                ("DOCUMENT_TYPE", "PASSPORT", 99.2),
                ("FIRST_NAME", "JANE", 98.7),
                ("LAST_NAME", "DOE", 98.1),
                ("DATE_OF_BIRTH", "1990-01-02", 97.0),
                ("DOCUMENT_NUMBER", "X1234567", 96.4),
                ("EXPIRATION_DATE", "2030-05-01", 95.9),
            ],
        )])
    }

    fn create_test_handler(
        analyzer: MockDocumentAnalyzer,
    ) -> (AnalyzeIdHandler<MockDocumentAnalyzer>, MockDocumentAnalyzer) {
        init_test_logging();
        let handler = AnalyzeIdHandler::new(analyzer.clone(), AnalyzerConfig::default());
        (handler, analyzer)
    }

    // ==================== 正常系 ====================

    #[tokio::test]
    async fn test_passport_scenario() {
        let (handler, analyzer) = create_test_handler(MockDocumentAnalyzer::new(passport_response()));

        let result = handler
            .handle(&json!({"documentLocation": "s3://bucket/passport.png"}))
            .await;

        assert!(result.success);
        assert_eq!(result.fields.get("documentType").map(String::as_str), Some("PASSPORT"));
        assert_eq!(result.fields.get("firstName").map(String::as_str), Some("JANE"));
        assert_eq!(result.fields.get("expirationDate").map(String::as_str), Some("2030-05-01"));
        assert!(result.error.is_none());
        assert_eq!(analyzer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_request_built_from_event() {
        let (handler, analyzer) = create_test_handler(MockDocumentAnalyzer::new(passport_response()));

        let event = InvocationEvent::new("s3://bucket/front.png")
            .with_back_document_location("s3://bucket/back.png")
            .with_field_groups(["DOCUMENT_INFO"]);
        handler.analyze(&event).await.unwrap();

        let requests = analyzer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].pages()[0],
            DocumentLocation::S3Object {
                bucket: "bucket".to_string(),
                key: "front.png".to_string(),
                version: None,
            }
        );
        assert_eq!(requests[0].pages().len(), 2);
        assert_eq!(requests[0].field_groups(), &[FieldGroup::DocumentInfo]);
    }

    #[tokio::test]
    async fn test_config_default_groups_and_min_confidence() {
        let analyzer = MockDocumentAnalyzer::new(passport_response());
        let config = AnalyzerConfig::default()
            .with_default_field_groups(vec![FieldGroup::PersonalInfo])
            .with_min_confidence(98.5);
        let handler = AnalyzeIdHandler::new(analyzer, config);

        let result = handler
            .analyze(&InvocationEvent::new("s3://bucket/passport.png"))
            .await
            .unwrap();

        let keys: Vec<&str> = result.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["firstName"]);
        assert_eq!(
            result.low_confidence_fields,
            vec!["dateOfBirth".to_string(), "lastName".to_string()]
        );
    }

    /// 同じイベントと決定的なスタブからは同じ結果になる
    #[tokio::test]
    async fn test_idempotent() {
        let (handler, analyzer) = create_test_handler(MockDocumentAnalyzer::new(passport_response()));
        let payload = json!({"documentLocation": "s3://bucket/passport.png", "documentTypeHint": "PASSPORT"});

        let first = handler.handle(&payload).await;
        let second = handler.handle(&payload).await;

        assert_eq!(first, second);
        assert_eq!(analyzer.call_count(), 2);
    }

    /// 1件以上のレコードがある場合に限りsuccess=true
    #[tokio::test]
    async fn test_success_iff_records_present() {
        for record_count in 0..3u32 {
            let records = (1..=record_count)
                .map(|index| record(index, &[("ID_TYPE", "PASSPORT", 99.0)]))
                .collect();
            let analyzer = MockDocumentAnalyzer::new(AnalysisResponse::new(records));
            let (handler, _) = create_test_handler(analyzer);

            let result = handler
                .handle(&json!({"documentLocation": "s3://bucket/id.png"}))
                .await;

            assert_eq!(result.success, record_count >= 1, "record_count = {}", record_count);
            assert_eq!(result.document_count, record_count as usize);
        }
    }

    // ==================== NoDocumentDetected ====================

    #[tokio::test]
    async fn test_zero_records() {
        let (handler, analyzer) = create_test_handler(MockDocumentAnalyzer::new(AnalysisResponse::default()));

        let result = handler
            .analyze(&InvocationEvent::new("s3://bucket/blank.png"))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::NoDocumentDetected));
        assert!(!result.is_retryable());
        assert_eq!(analyzer.call_count(), 1);
    }

    // ==================== 入力不正 ====================

    #[tokio::test]
    async fn test_empty_location_is_invalid_input() {
        let (handler, analyzer) = create_test_handler(MockDocumentAnalyzer::new(passport_response()));

        for payload in [
            json!({"documentLocation": ""}),
            json!({"documentLocation": "   "}),
            json!({}),
        ] {
            let result = handler.handle(&payload).await;

            assert!(!result.success);
            assert_eq!(result.error_kind(), Some(ErrorKind::InvalidInputError));
        }

        // 外部サービスは呼ばれない
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_invalid_input() {
        let (handler, analyzer) = create_test_handler(MockDocumentAnalyzer::new(passport_response()));

        for payload in [json!(null), json!([1, 2]), json!({"documentLocation": 7})] {
            let result = handler.handle(&payload).await;
            assert_eq!(result.error_kind(), Some(ErrorKind::InvalidInputError));
        }
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_returns_invalid_input_error() {
        let (handler, _) = create_test_handler(MockDocumentAnalyzer::new(passport_response()));

        let result = handler.analyze(&InvocationEvent::new("https://example.com/id.png")).await;

        assert_eq!(
            result,
            Err(AnalyzeIdError::from(InvalidEventError::Location(
                DocumentLocationError::UnsupportedScheme("https".to_string())
            )))
        );
    }

    // ==================== 外部サービスエラー ====================

    #[tokio::test]
    async fn test_upstream_unavailable() {
        let (handler, _) = create_test_handler(MockDocumentAnalyzer::failing(AnalyzerError::Unavailable(
            "ThrottlingException".to_string(),
        )));

        let result = handler
            .handle(&json!({"documentLocation": "s3://bucket/passport.png"}))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::UpstreamUnavailableError));
        assert!(result.is_retryable());
    }

    #[tokio::test]
    async fn test_upstream_rejected() {
        let (handler, analyzer) = create_test_handler(MockDocumentAnalyzer::failing(AnalyzerError::Rejected(
            "UnsupportedDocumentException".to_string(),
        )));

        let result = handler
            .handle(&json!({"documentLocation": "s3://bucket/passport.gif"}))
            .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::UpstreamRejectedError));
        assert!(!result.is_retryable());
        // 内部では再試行しない
        assert_eq!(analyzer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_unavailable() {
        let analyzer = MockDocumentAnalyzer::new(passport_response()).with_delay(Duration::from_millis(500));
        let config = AnalyzerConfig::default().with_timeout(Duration::from_millis(20));
        let handler = AnalyzeIdHandler::new(analyzer.clone(), config);

        let result = handler
            .handle(&json!({"documentLocation": "s3://bucket/passport.png"}))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::UpstreamUnavailableError));
        let error = result.error.unwrap();
        assert!(error.retryable);
        assert!(error.message.contains("timed out after 20ms"));
        assert_eq!(analyzer.call_count(), 1);
    }

    // ==================== respond ====================

    fn unavailable_handler(raise_retryable: bool) -> AnalyzeIdHandler<MockDocumentAnalyzer> {
        init_test_logging();
        let analyzer = MockDocumentAnalyzer::failing(AnalyzerError::Unavailable(
            "ThrottlingException".to_string(),
        ));
        let config = AnalyzerConfig::default().with_raise_retryable(raise_retryable);
        AnalyzeIdHandler::new(analyzer, config)
    }

    #[tokio::test]
    async fn test_respond_raises_retryable_failure_when_enabled() {
        let handler = unavailable_handler(true);

        let result = handler
            .respond(&json!({"documentLocation": "s3://bucket/passport.png"}))
            .await;

        match result {
            Err(AnalyzeIdError::UpstreamUnavailable(message)) => {
                assert!(message.contains("ThrottlingException"));
            }
            other => panic!("Expected UpstreamUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_folds_retryable_failure_by_default() {
        let handler = unavailable_handler(false);

        let result = handler
            .respond(&json!({"documentLocation": "s3://bucket/passport.png"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::UpstreamUnavailableError));
    }

    #[tokio::test]
    async fn test_respond_folds_permanent_failure_when_enabled() {
        init_test_logging();
        let analyzer = MockDocumentAnalyzer::failing(AnalyzerError::Rejected(
            "UnsupportedDocumentException".to_string(),
        ));
        let handler = AnalyzeIdHandler::new(analyzer, AnalyzerConfig::default().with_raise_retryable(true));

        let rejected = handler
            .respond(&json!({"documentLocation": "s3://bucket/passport.gif"}))
            .await
            .unwrap();
        let invalid = handler.respond(&json!({"documentLocation": ""})).await.unwrap();

        assert_eq!(rejected.error_kind(), Some(ErrorKind::UpstreamRejectedError));
        assert_eq!(invalid.error_kind(), Some(ErrorKind::InvalidInputError));
    }

    #[tokio::test]
    async fn test_respond_success_when_enabled() {
        init_test_logging();
        let analyzer = MockDocumentAnalyzer::new(passport_response());
        let handler = AnalyzeIdHandler::new(analyzer, AnalyzerConfig::default().with_raise_retryable(true));

        let result = handler
            .respond(&json!({"documentLocation": "s3://bucket/passport.png"}))
            .await
            .unwrap();

        assert!(result.success);
    }

    // ==================== エラー型テスト ====================

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            AnalyzeIdError::InvalidInput(String::new()).kind(),
            ErrorKind::InvalidInputError
        );
        assert_eq!(
            AnalyzeIdError::from(AnalyzerError::Unavailable("x".to_string())),
            AnalyzeIdError::UpstreamUnavailable("x".to_string())
        );
        assert_eq!(
            AnalyzeIdError::from(AnalyzerError::Rejected("y".to_string())),
            AnalyzeIdError::UpstreamRejected("y".to_string())
        );
    }

    #[test]
    fn test_error_to_extraction_error() {
        let error: ExtractionError = AnalyzeIdError::UpstreamRejected("bad document".to_string()).into();

        assert_eq!(error.kind, ErrorKind::UpstreamRejectedError);
        assert_eq!(error.message, "upstream rejected: bad document");
        assert!(!error.retryable);
    }
}
