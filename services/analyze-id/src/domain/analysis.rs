/// 外部解析サービスとのリクエスト/レスポンス型
///
/// AnalysisRequestは1回の呼び出し内でハンドラーが所有し、
/// AnalysisResponseは受信後に変更しない。
use std::collections::BTreeMap;

use crate::domain::{DocumentLocation, FieldGroup};

/// AnalyzeIDが1リクエストで受け付ける最大ページ数（表面・裏面）
pub const MAX_DOCUMENT_PAGES: usize = 2;

/// 外部解析サービスへのリクエスト
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// 解析対象ページ（表面が先頭）
    pages: Vec<DocumentLocation>,
    /// 要求するフィールドグループ（重複なし・空でない）
    field_groups: Vec<FieldGroup>,
    /// 想定される書類種別（大文字に正規化済み）
    document_type_hint: Option<String>,
}

impl AnalysisRequest {
    /// 新しいAnalysisRequestを作成
    ///
    /// `field_groups`が空の場合は全グループを要求する。
    pub fn new(
        front: DocumentLocation,
        back: Option<DocumentLocation>,
        field_groups: Vec<FieldGroup>,
        document_type_hint: Option<String>,
    ) -> Self {
        let mut pages = Vec::with_capacity(MAX_DOCUMENT_PAGES);
        pages.push(front);
        pages.extend(back);

        let mut groups: Vec<FieldGroup> = Vec::with_capacity(field_groups.len());
        for group in field_groups {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        if groups.is_empty() {
            groups = FieldGroup::ALL.to_vec();
        }

        let document_type_hint = document_type_hint
            .map(|hint| hint.trim().to_ascii_uppercase())
            .filter(|hint| !hint.is_empty());

        Self {
            pages,
            field_groups: groups,
            document_type_hint,
        }
    }

    pub fn pages(&self) -> &[DocumentLocation] {
        &self.pages
    }

    pub fn field_groups(&self) -> &[FieldGroup] {
        &self.field_groups
    }

    pub fn document_type_hint(&self) -> Option<&str> {
        self.document_type_hint.as_deref()
    }

    /// 指定グループが要求されているか
    pub fn wants(&self, group: FieldGroup) -> bool {
        self.field_groups.contains(&group)
    }
}

/// 検出されたフィールド値
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    /// 検出テキスト
    pub value: String,
    /// 正規化値（日付など）
    pub normalized_value: Option<String>,
    /// 信頼度 [0, 100]
    pub confidence: f32,
}

impl FieldValue {
    /// 新しいFieldValueを作成（信頼度は[0, 100]に丸める）
    pub fn new(value: impl Into<String>, normalized_value: Option<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 100.0)
        };
        Self {
            value: value.into(),
            normalized_value,
            confidence,
        }
    }

    /// 抽出結果に使う値
    ///
    /// 空でない正規化値があればそれを、なければ検出テキストを返す（前後空白除去）。
    pub fn canonical_value(&self) -> &str {
        self.normalized_value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.value.trim())
    }
}

/// 1つの身分証明書の検出結果
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityDocumentRecord {
    /// レスポンス内の書類番号（1始まり）
    pub document_index: u32,
    /// 生フィールド名 -> 値
    pub fields: BTreeMap<String, FieldValue>,
}

impl IdentityDocumentRecord {
    pub fn new(document_index: u32, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            document_index,
            fields,
        }
    }
}

/// 外部解析サービスのレスポンス
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisResponse {
    records: Vec<IdentityDocumentRecord>,
}

impl AnalysisResponse {
    /// 新しいAnalysisResponseを作成（書類番号の昇順に並べる）
    pub fn new(mut records: Vec<IdentityDocumentRecord>) -> Self {
        records.sort_by_key(|record| record.document_index);
        Self { records }
    }

    pub fn records(&self) -> &[IdentityDocumentRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
