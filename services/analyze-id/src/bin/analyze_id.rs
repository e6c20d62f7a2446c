/// 身分証明書抽出Lambda関数
///
/// Textract AnalyzeIDで身分証明書（パスポート、運転免許証、各種許可証など）を
/// 解析し、正規化したフィールドを返す。
///
/// Textractクライアントはコールドスタート時に1回だけ構築し、
/// 以降の呼び出しでは参照を共有する。
use analyze_id::application::AnalyzeIdHandler;
use analyze_id::domain::ExtractionResult;
use analyze_id::infrastructure::{AnalyzerConfig, DocumentAnalyzer, TextractDocumentAnalyzer, init_logging};
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::{Instrument, error, info, info_span};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    // 設定を環境変数から読み込み（不正な値ならコールドスタート失敗）
    let config = match AnalyzerConfig::from_env() {
        Ok(config) => {
            info!(
                timeout_ms = config.timeout().as_millis() as u64,
                field_groups = ?config.default_field_groups(),
                min_confidence = config.min_confidence(),
                raise_retryable = config.raise_retryable(),
                "AnalyzeID設定を読み込み"
            );
            config
        }
        Err(err) => {
            error!(error = %err, "AnalyzeID設定読み込み失敗");
            return Err(err.into());
        }
    };

    let analyzer = TextractDocumentAnalyzer::from_config().await;
    let handler = AnalyzeIdHandler::new(analyzer, config);
    let handler = &handler;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        function_handler(handler, event).await
    }))
    .await
}

/// Lambda関数のメインハンドラー
///
/// リクエストIDをspanに記録し、AnalyzeIdHandlerに処理を委ねる。
/// `Err`はANALYZE_ID_RAISE_RETRYABLEが有効で再試行可能な失敗の場合のみ。
async fn function_handler<A>(
    handler: &AnalyzeIdHandler<A>,
    event: LambdaEvent<Value>,
) -> Result<ExtractionResult, Error>
where
    A: DocumentAnalyzer,
{
    let span = info_span!("analyze_id", request_id = %event.context.request_id);

    async move {
        handler.respond(&event.payload).await.map_err(|err| {
            error!(error = %err, "再試行可能な失敗をランタイムに返却");
            Error::from(err)
        })
    }
    .instrument(span)
    .await
}
