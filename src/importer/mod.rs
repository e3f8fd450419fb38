// ==========================================
// 同行评审系统 - 导入层
// ==========================================
// 职责: 不可信 CSV → 校验 → 暂存 → 操作员确认 → 写入系统记录
// ==========================================

// 模块声明
pub mod dedup_checker;
pub mod error;
pub mod file_parser;
pub mod record_parser;
pub mod schema_validator;
pub mod staged_importer_impl;
pub mod staged_importer_trait;
pub mod staging_store;

// 重导出核心类型
pub use dedup_checker::NaturalKeyDedupChecker;
pub use error::{ImportError, ImportResult, SchemaDefinitionError, ValidationError};
pub use file_parser::CsvParser;
pub use record_parser::RowRecordParser;
pub use schema_validator::HeaderValidator;
pub use staged_importer_impl::StagedImporterImpl;
pub use staging_store::StagingStore;

// 重导出 Trait 接口
pub use staged_importer_trait::{
    DedupChecker, FileParser, RecordParser, SchemaValidator, StagedImporter,
};

use crate::domain::profile::ImportProfile;
use crate::domain::record::{RecordSet, ValidationResult};

/// 用默认组件校验一份 CSV（不保存、不暂存、不查询已存在记录）
pub fn validate_csv(bytes: &[u8], profile: &ImportProfile) -> ValidationResult {
    parse_with_defaults(bytes, profile).into()
}

fn parse_with_defaults(
    bytes: &[u8],
    profile: &ImportProfile,
) -> Result<RecordSet, ValidationError> {
    let table = CsvParser.parse(bytes)?;
    HeaderValidator.validate_header(&table.header, profile.schema())?;
    let records = RowRecordParser.parse_records(&table, profile.schema())?;

    let keys = NaturalKeyDedupChecker.find_in_batch_duplicates(&records, profile.natural_key());
    if !keys.is_empty() {
        return Err(ValidationError::DuplicateKeyInBatch { keys });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_csv_users() {
        let profile = ImportProfile::users();
        let csv = "title,initials,name,surname,cell,email,user_id\n\
                   Dr,A,Ann,Lee,0821234567,ann@example.org,u1\n\
                   Mr,B,Bob,Ngu,0827654321,bob@example.org,u2\n";

        match validate_csv(csv.as_bytes(), &profile) {
            ValidationResult::Valid(records) => {
                assert_eq!(records.natural_keys("user_id"), vec!["u1", "u2"]);
            }
            ValidationResult::Invalid(e) => panic!("意外校验失败: {}", e),
        }
    }

    #[test]
    fn test_validate_csv_rejects_repeated_key() {
        let profile = ImportProfile::team_assignments();
        let csv = "user_id,round_name,team_name\nu1,R1,T1\nu2,R1,T1\nu1,R1,T2\n";

        assert_eq!(
            validate_csv(csv.as_bytes(), &profile),
            ValidationResult::Invalid(ValidationError::DuplicateKeyInBatch {
                keys: vec!["u1".to_string()]
            })
        );
    }

    #[test]
    fn test_validate_csv_missing_column() {
        let profile = ImportProfile::team_assignments();
        let result = validate_csv(b"user_id,team_name\nu1,T1\n", &profile);
        assert_eq!(
            result,
            ValidationResult::Invalid(ValidationError::Schema {
                field: "round_name".to_string()
            })
        );
    }
}
