/// AnalyzeID Lambda設定
///
/// 環境変数からタイムアウト、既定のフィールドグループ、最小信頼度、
/// 再試行可能エラーの扱いを読み込む。
use std::time::Duration;

use thiserror::Error;

use crate::domain::FieldGroup;

/// AnalyzeID呼び出しタイムアウトの既定値（ミリ秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const TIMEOUT_MS_VAR: &str = "ANALYZE_ID_TIMEOUT_MS";
pub const FIELD_GROUPS_VAR: &str = "ANALYZE_ID_FIELD_GROUPS";
pub const MIN_CONFIDENCE_VAR: &str = "ANALYZE_ID_MIN_CONFIDENCE";
pub const RAISE_RETRYABLE_VAR: &str = "ANALYZE_ID_RAISE_RETRYABLE";

/// 設定のエラー型
#[derive(Debug, Error)]
pub enum AnalyzerConfigError {
    #[error("環境変数の値が不正です: {name}={value} ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

impl AnalyzerConfigError {
    fn invalid(name: &str, value: &str, reason: impl std::fmt::Display) -> Self {
        AnalyzerConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// AnalyzeID Lambda設定
///
/// 以下の環境変数から読み込む（未設定・空文字の場合は既定値）:
/// - ANALYZE_ID_TIMEOUT_MS: AnalyzeID呼び出しのタイムアウト（既定: 10000）
/// - ANALYZE_ID_FIELD_GROUPS: 既定のフィールドグループ（カンマ区切り、既定: 全グループ）
/// - ANALYZE_ID_MIN_CONFIDENCE: 採用する最小信頼度 [0, 100]（既定: 0）
/// - ANALYZE_ID_RAISE_RETRYABLE: 再試行可能な失敗をランタイムにエラーとして返すか（既定: false）
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    timeout: Duration,
    default_field_groups: Vec<FieldGroup>,
    min_confidence: f32,
    raise_retryable: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            default_field_groups: FieldGroup::ALL.to_vec(),
            min_confidence: 0.0,
            raise_retryable: false,
        }
    }
}

impl AnalyzerConfig {
    /// 環境変数から設定を読み込む
    ///
    /// # エラー
    /// 値を解析できない場合はエラーを返す
    pub fn from_env() -> Result<Self, AnalyzerConfigError> {
        let mut config = Self::default();

        if let Some(raw) = read_var(TIMEOUT_MS_VAR) {
            config.timeout = parse_timeout(&raw)?;
        }

        if let Some(raw) = read_var(FIELD_GROUPS_VAR) {
            config.default_field_groups = FieldGroup::parse_list(&raw)
                .map_err(|e| AnalyzerConfigError::invalid(FIELD_GROUPS_VAR, &raw, e))?;
        }

        if let Some(raw) = read_var(MIN_CONFIDENCE_VAR) {
            config.min_confidence = parse_min_confidence(&raw)?;
        }

        if let Some(raw) = read_var(RAISE_RETRYABLE_VAR) {
            config.raise_retryable = parse_bool(RAISE_RETRYABLE_VAR, &raw)?;
        }

        Ok(config)
    }

    /// タイムアウトを設定
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 既定のフィールドグループを設定
    pub fn with_default_field_groups(mut self, groups: Vec<FieldGroup>) -> Self {
        self.default_field_groups = groups;
        self
    }

    /// 最小信頼度を設定
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// 再試行可能エラーの送出を設定
    pub fn with_raise_retryable(mut self, raise_retryable: bool) -> Self {
        self.raise_retryable = raise_retryable;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn default_field_groups(&self) -> &[FieldGroup] {
        &self.default_field_groups
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn raise_retryable(&self) -> bool {
        self.raise_retryable
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_timeout(raw: &str) -> Result<Duration, AnalyzerConfigError> {
    let millis: u64 = raw
        .parse()
        .map_err(|e| AnalyzerConfigError::invalid(TIMEOUT_MS_VAR, raw, e))?;
    if millis == 0 {
        return Err(AnalyzerConfigError::invalid(TIMEOUT_MS_VAR, raw, "must be greater than 0"));
    }
    Ok(Duration::from_millis(millis))
}

fn parse_min_confidence(raw: &str) -> Result<f32, AnalyzerConfigError> {
    let value: f32 = raw
        .parse()
        .map_err(|e| AnalyzerConfigError::invalid(MIN_CONFIDENCE_VAR, raw, e))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(AnalyzerConfigError::invalid(MIN_CONFIDENCE_VAR, raw, "must be within [0, 100]"));
    }
    Ok(value)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, AnalyzerConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AnalyzerConfigError::invalid(name, raw, "expected true or false")),
    }
}
