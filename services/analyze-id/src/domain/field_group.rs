/// フィールドグループと正規化フィールド名
///
/// TextractのAnalyzeIDが返す生のフィールド名（例: `FIRST_NAME`）を、
/// 抽出結果で使用する正規化名（例: `firstName`）とグループに対応付ける。
use thiserror::Error;

/// フィールドグループ指定のエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldGroupError {
    #[error("unknown field group: {0}")]
    Unknown(String),
    #[error("field group list is empty")]
    Empty,
}

/// 抽出対象フィールドのカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldGroup {
    /// 氏名・生年月日などの個人情報
    PersonalInfo,
    /// 住所
    Address,
    /// 書類種別・番号・有効期限などの書類情報
    DocumentInfo,
}

impl FieldGroup {
    /// 全グループ（既定値）
    pub const ALL: [FieldGroup; 3] = [
        FieldGroup::PersonalInfo,
        FieldGroup::Address,
        FieldGroup::DocumentInfo,
    ];

    /// グループ名を返す
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldGroup::PersonalInfo => "PERSONAL_INFO",
            FieldGroup::Address => "ADDRESS",
            FieldGroup::DocumentInfo => "DOCUMENT_INFO",
        }
    }

    /// グループ名を解析する
    ///
    /// 大文字小文字を区別せず、`-`は`_`として扱う（`personal-info`も可）。
    pub fn parse(raw: &str) -> Result<Self, FieldGroupError> {
        let normalized = raw.trim().to_ascii_uppercase().replace('-', "_");
        FieldGroup::ALL
            .into_iter()
            .find(|group| group.as_str() == normalized)
            .ok_or_else(|| FieldGroupError::Unknown(raw.trim().to_string()))
    }

    /// グループ名のリストを解析する（重複は除去し、出現順を保持）
    pub fn parse_all<'a, I>(names: I) -> Result<Vec<Self>, FieldGroupError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut groups = Vec::new();
        for name in names {
            if name.trim().is_empty() {
                continue;
            }
            let group = Self::parse(name)?;
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        if groups.is_empty() {
            return Err(FieldGroupError::Empty);
        }
        Ok(groups)
    }

    /// カンマ区切りのグループ名を解析する
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, FieldGroupError> {
        Self::parse_all(raw.split(','))
    }
}

/// 正規化フィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    FirstName,
    MiddleName,
    LastName,
    Suffix,
    DateOfBirth,
    PlaceOfBirth,
    Veteran,
    Address,
    City,
    State,
    ZipCode,
    County,
    DocumentType,
    DocumentNumber,
    ExpirationDate,
    DateOfIssue,
    IssuingState,
    LicenseClass,
    Restrictions,
    Endorsements,
    MrzCode,
}

impl CanonicalField {
    /// Textractの生フィールド名から正規化フィールドを求める
    ///
    /// 前後の空白を除去し、大文字小文字を区別しない。
    /// 未知のフィールド名は`None`。
    pub fn from_raw(raw: &str) -> Option<Self> {
        let field = match raw.trim().to_ascii_uppercase().as_str() {
            "FIRST_NAME" => CanonicalField::FirstName,
            "MIDDLE_NAME" => CanonicalField::MiddleName,
            "LAST_NAME" => CanonicalField::LastName,
            "SUFFIX" => CanonicalField::Suffix,
            "DATE_OF_BIRTH" => CanonicalField::DateOfBirth,
            "PLACE_OF_BIRTH" => CanonicalField::PlaceOfBirth,
            "VETERAN" => CanonicalField::Veteran,
            "ADDRESS" => CanonicalField::Address,
            "CITY_IN_ADDRESS" => CanonicalField::City,
            "STATE_IN_ADDRESS" => CanonicalField::State,
            "ZIP_CODE_IN_ADDRESS" => CanonicalField::ZipCode,
            "COUNTY" => CanonicalField::County,
            // 実際のAnalyzeIDはID_TYPEで書類種別を返す
            "DOCUMENT_TYPE" | "ID_TYPE" => CanonicalField::DocumentType,
            "DOCUMENT_NUMBER" => CanonicalField::DocumentNumber,
            "EXPIRATION_DATE" => CanonicalField::ExpirationDate,
            "DATE_OF_ISSUE" => CanonicalField::DateOfIssue,
            "STATE_NAME" => CanonicalField::IssuingState,
            "CLASS" => CanonicalField::LicenseClass,
            "RESTRICTIONS" => CanonicalField::Restrictions,
            "ENDORSEMENTS" => CanonicalField::Endorsements,
            "MRZ_CODE" => CanonicalField::MrzCode,
            _ => return None,
        };
        Some(field)
    }

    /// 抽出結果で使用するキー名
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::FirstName => "firstName",
            CanonicalField::MiddleName => "middleName",
            CanonicalField::LastName => "lastName",
            CanonicalField::Suffix => "suffix",
            CanonicalField::DateOfBirth => "dateOfBirth",
            CanonicalField::PlaceOfBirth => "placeOfBirth",
            CanonicalField::Veteran => "veteran",
            CanonicalField::Address => "address",
            CanonicalField::City => "city",
            CanonicalField::State => "state",
            CanonicalField::ZipCode => "zipCode",
            CanonicalField::County => "county",
            CanonicalField::DocumentType => "documentType",
            CanonicalField::DocumentNumber => "documentNumber",
            CanonicalField::ExpirationDate => "expirationDate",
            CanonicalField::DateOfIssue => "dateOfIssue",
            CanonicalField::IssuingState => "issuingState",
            CanonicalField::LicenseClass => "licenseClass",
            CanonicalField::Restrictions => "restrictions",
            CanonicalField::Endorsements => "endorsements",
            CanonicalField::MrzCode => "mrzCode",
        }
    }

    /// 所属するフィールドグループ
    pub fn group(&self) -> FieldGroup {
        match self {
            CanonicalField::FirstName
            | CanonicalField::MiddleName
            | CanonicalField::LastName
            | CanonicalField::Suffix
            | CanonicalField::DateOfBirth
            | CanonicalField::PlaceOfBirth
            | CanonicalField::Veteran => FieldGroup::PersonalInfo,
            CanonicalField::Address
            | CanonicalField::City
            | CanonicalField::State
            | CanonicalField::ZipCode
            | CanonicalField::County => FieldGroup::Address,
            CanonicalField::DocumentType
            | CanonicalField::DocumentNumber
            | CanonicalField::ExpirationDate
            | CanonicalField::DateOfIssue
            | CanonicalField::IssuingState
            | CanonicalField::LicenseClass
            | CanonicalField::Restrictions
            | CanonicalField::Endorsements
            | CanonicalField::MrzCode => FieldGroup::DocumentInfo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== FieldGroup テスト ====================

    #[test]
    fn test_field_group_parse() {
        assert_eq!(FieldGroup::parse("PERSONAL_INFO"), Ok(FieldGroup::PersonalInfo));
        assert_eq!(FieldGroup::parse(" address "), Ok(FieldGroup::Address));
        assert_eq!(FieldGroup::parse("document-info"), Ok(FieldGroup::DocumentInfo));
        assert_eq!(
            FieldGroup::parse("BIOMETRICS"),
            Err(FieldGroupError::Unknown("BIOMETRICS".to_string()))
        );
    }

    #[test]
    fn test_field_group_parse_list_dedups_in_order() {
        let groups = FieldGroup::parse_list("DOCUMENT_INFO, personal_info,,DOCUMENT_INFO").unwrap();

        assert_eq!(groups, vec![FieldGroup::DocumentInfo, FieldGroup::PersonalInfo]);
    }

    #[test]
    fn test_field_group_parse_list_empty() {
        assert_eq!(FieldGroup::parse_list(""), Err(FieldGroupError::Empty));
        assert_eq!(FieldGroup::parse_list(" , ,"), Err(FieldGroupError::Empty));
    }

    // ==================== CanonicalField テスト ====================

    #[test]
    fn test_from_raw_known_fields() {
        assert_eq!(CanonicalField::from_raw("FIRST_NAME"), Some(CanonicalField::FirstName));
        assert_eq!(CanonicalField::from_raw("zip_code_in_address"), Some(CanonicalField::ZipCode));
        assert_eq!(CanonicalField::from_raw(" STATE_NAME "), Some(CanonicalField::IssuingState));
    }

    #[test]
    fn test_document_type_aliases() {
        assert_eq!(CanonicalField::from_raw("DOCUMENT_TYPE"), Some(CanonicalField::DocumentType));
        assert_eq!(CanonicalField::from_raw("ID_TYPE"), Some(CanonicalField::DocumentType));
        assert_eq!(CanonicalField::DocumentType.name(), "documentType");
    }

    #[test]
    fn test_from_raw_unknown_field() {
        assert_eq!(CanonicalField::from_raw("FAVORITE_COLOR"), None);
        assert_eq!(CanonicalField::from_raw(""), None);
    }

    #[test]
    fn test_groups() {
        assert_eq!(CanonicalField::DateOfBirth.group(), FieldGroup::PersonalInfo);
        assert_eq!(CanonicalField::City.group(), FieldGroup::Address);
        assert_eq!(CanonicalField::ExpirationDate.group(), FieldGroup::DocumentInfo);
        assert_eq!(CanonicalField::MrzCode.group(), FieldGroup::DocumentInfo);
    }
}
