// ==========================================
// 同行评审系统 - 记录解析器实现
// ==========================================
// 步骤 3: 数据行 → 记录集
// 规则:
// - 列数必须与表头相同（不补齐、不截断）
// - 必填字段不允许为空串，可选字段允许
// - 遇到第一个错误即停止，行号从第一条数据行起 1 开始
// ==========================================

use crate::domain::record::{FieldSchema, ParsedRecord, RawTable, RecordSet};
use crate::importer::error::ValidationError;
use crate::importer::staged_importer_trait::RecordParser;
use std::collections::HashSet;
use std::sync::Arc;

pub struct RowRecordParser;

impl RecordParser for RowRecordParser {
    fn parse_records(
        &self,
        table: &RawTable,
        schema: &FieldSchema,
    ) -> Result<RecordSet, ValidationError> {
        // 键集合按表头一次性固定；重名列会让按字段取值产生歧义
        let mut seen = HashSet::with_capacity(table.header.len());
        for field in &table.header {
            if !seen.insert(field.as_str()) {
                return Err(ValidationError::DuplicateHeader {
                    field: field.clone(),
                });
            }
        }

        let header: Arc<[String]> = table.header.clone().into();
        let required_mask: Vec<bool> = header.iter().map(|f| schema.is_required(f)).collect();

        let mut records = Vec::with_capacity(table.rows.len());
        for (idx, row) in table.rows.iter().enumerate() {
            let line = idx + 1;

            if row.len() != header.len() {
                return Err(ValidationError::RowShape {
                    line,
                    expected: header.len(),
                    actual: row.len(),
                });
            }

            if let Some(pos) = row
                .iter()
                .zip(&required_mask)
                .position(|(value, required)| *required && value.is_empty())
            {
                return Err(ValidationError::MissingValue {
                    field: header[pos].clone(),
                    line,
                });
            }

            records.push(ParsedRecord::new(header.clone(), row.clone(), line));
        }

        RecordSet::new(header, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            header: header.iter().map(|v| v.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    fn schema(required: &[&str], optional: &[&str]) -> FieldSchema {
        FieldSchema::new(required.to_vec(), optional.to_vec()).unwrap()
    }

    #[test]
    fn test_scenario_a_single_record() {
        let set = RowRecordParser
            .parse_records(&table(&["a", "b", "c"], &[&["1", "2", "3"]]), &schema(&["a", "b"], &[]))
            .unwrap();

        assert_eq!(set.len(), 1);
        let record = &set.records()[0];
        assert_eq!(record.get("a"), Some("1"));
        assert_eq!(record.get("b"), Some("2"));
        assert_eq!(record.get("c"), Some("3"));
        assert_eq!(record.fields().len(), 3);
    }

    #[test]
    fn test_scenario_c_longer_row() {
        let err = RowRecordParser
            .parse_records(&table(&["a", "b"], &[&["1", "2", "3"]]), &schema(&["a"], &[]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::RowShape {
                line: 1,
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_shorter_row_reports_its_line() {
        let err = RowRecordParser
            .parse_records(
                &table(&["a", "b"], &[&["1", "2"], &["3", "4"], &["5"]]),
                &schema(&["a"], &[]),
            )
            .unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.kind(), "ROW_SHAPE");
    }

    #[test]
    fn test_scenario_d_missing_required_value() {
        let err = RowRecordParser
            .parse_records(&table(&["a", "b"], &[&["1", ""]]), &schema(&["a", "b"], &[]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingValue {
                field: "b".to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn test_missing_value_names_first_empty_column() {
        let err = RowRecordParser
            .parse_records(
                &table(&["c", "a", "b"], &[&["x", "1", "2"], &["y", "", ""]]),
                &schema(&["a", "b"], &["c"]),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingValue {
                field: "a".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn test_optional_and_unknown_fields_may_be_empty() {
        let set = RowRecordParser
            .parse_records(
                &table(&["a", "opt", "extra"], &[&["1", "", ""]]),
                &schema(&["a"], &["opt"]),
            )
            .unwrap();
        assert_eq!(set.records()[0].get("opt"), Some(""));
        assert_eq!(set.records()[0].get("extra"), Some(""));
    }

    #[test]
    fn test_preserves_row_order_and_lines() {
        let rows: Vec<Vec<String>> = (0..25).map(|i| vec![format!("u{}", i)]).collect();
        let raw = RawTable {
            header: vec!["user_id".to_string()],
            rows,
        };
        let set = RowRecordParser
            .parse_records(&raw, &schema(&["user_id"], &[]))
            .unwrap();

        assert_eq!(set.len(), 25);
        for (idx, record) in set.iter().enumerate() {
            assert_eq!(record.get("user_id"), Some(format!("u{}", idx).as_str()));
            assert_eq!(record.line(), idx + 1);
        }
    }

    #[test]
    fn test_header_only_is_empty_dataset() {
        let err = RowRecordParser
            .parse_records(&table(&["a"], &[]), &schema(&["a"], &[]))
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyDataset);
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = RowRecordParser
            .parse_records(&table(&["a", "b", "a"], &[&["1", "2", "3"]]), &schema(&["a"], &[]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateHeader {
                field: "a".to_string()
            }
        );
    }

    #[test]
    fn test_fail_fast_stops_at_first_error() {
        // 第 1 行列数错误，第 2 行缺值：只报告第 1 行
        let err = RowRecordParser
            .parse_records(
                &table(&["a", "b"], &[&["1"], &["", "2"]]),
                &schema(&["a", "b"], &[]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ROW_SHAPE");
        assert_eq!(err.line(), Some(1));
    }
}
