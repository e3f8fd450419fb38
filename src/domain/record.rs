// ==========================================
// 同行评审系统 - 导入记录模型
// ==========================================
// 职责: 字段模式 / 原始表 / 解析记录 / 记录集 / 校验结果
// 红线: 记录集一经解析不可变；键集合按表头一次性固定
// ==========================================

use crate::importer::error::{SchemaDefinitionError, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

// ==========================================
// FieldSchema - 字段模式
// ==========================================
// 必填字段有序，可选字段无序语义；二者合计不允许重复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub(crate) required: Vec<String>,
    pub(crate) optional: Vec<String>,
}

impl FieldSchema {
    /// 创建字段模式
    ///
    /// # 返回
    /// - Err(DuplicateField): 任一字段名出现两次（含必填/可选交叉）
    pub fn new<R, O, S>(required: R, optional: O) -> Result<Self, SchemaDefinitionError>
    where
        R: IntoIterator<Item = S>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required: Vec<String> = required.into_iter().map(Into::into).collect();
        let optional: Vec<String> = optional.into_iter().map(Into::into).collect();

        let mut seen = HashSet::new();
        for field in required.iter().chain(optional.iter()) {
            if !seen.insert(field.as_str()) {
                return Err(SchemaDefinitionError::DuplicateField(field.clone()));
            }
        }

        Ok(Self { required, optional })
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.iter().any(|f| f == field)
    }
}

// ==========================================
// RawTable - 原始表
// ==========================================
// 单元格已做分隔符后前导空白裁剪，此外不做任何加工
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

// ==========================================
// ParsedRecord - 解析记录
// ==========================================
// 字段列表与同一记录集共享，值与字段按位置一一对应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    fields: Arc<[String]>,
    values: Vec<String>,
    line: usize,
}

impl ParsedRecord {
    pub(crate) fn new(fields: Arc<[String]>, values: Vec<String>, line: usize) -> Self {
        debug_assert_eq!(fields.len(), values.len());
        Self {
            fields,
            values,
            line,
        }
    }

    /// 按字段名取值（重复表头已在解析阶段拒绝，这里取第一个即唯一）
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .position(|f| f == field)
            .map(|idx| self.values[idx].as_str())
    }

    /// 数据行号（1 起，不含表头）
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

// ==========================================
// RecordSet - 记录集
// ==========================================
// 不变式: 非空；顺序 = 数据行顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordSetRepr", into = "RecordSetRepr")]
pub struct RecordSet {
    header: Arc<[String]>,
    records: Vec<ParsedRecord>,
}

impl RecordSet {
    /// 由解析器构造；空记录集直接判定为 EmptyDataset
    pub(crate) fn new(
        header: Arc<[String]>,
        records: Vec<ParsedRecord>,
    ) -> Result<Self, ValidationError> {
        if records.is_empty() {
            return Err(ValidationError::EmptyDataset);
        }
        Ok(Self { header, records })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn records(&self) -> &[ParsedRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsedRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按行序取自然键值（缺失字段记为空串）
    pub fn natural_keys<'a>(&'a self, key_field: &str) -> Vec<&'a str> {
        self.records
            .iter()
            .map(|r| r.get(key_field).unwrap_or(""))
            .collect()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a ParsedRecord;
    type IntoIter = std::slice::Iter<'a, ParsedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// 暂存表中的持久化形态: {"header": [...], "rows": [[...], ...]}
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordSetRepr {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl From<RecordSet> for RecordSetRepr {
    fn from(set: RecordSet) -> Self {
        Self {
            header: set.header.to_vec(),
            rows: set.records.into_iter().map(|r| r.values).collect(),
        }
    }
}

impl TryFrom<RecordSetRepr> for RecordSet {
    type Error = ValidationError;

    fn try_from(repr: RecordSetRepr) -> Result<Self, Self::Error> {
        let header: Arc<[String]> = repr.header.into();
        let mut records = Vec::with_capacity(repr.rows.len());
        for (idx, values) in repr.rows.into_iter().enumerate() {
            let line = idx + 1;
            if values.len() != header.len() {
                return Err(ValidationError::RowShape {
                    line,
                    expected: header.len(),
                    actual: values.len(),
                });
            }
            records.push(ParsedRecord::new(header.clone(), values, line));
        }
        RecordSet::new(header, records)
    }
}

// ==========================================
// ValidationResult - 校验结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid(RecordSet),
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn into_result(self) -> Result<RecordSet, ValidationError> {
        match self {
            ValidationResult::Valid(records) => Ok(records),
            ValidationResult::Invalid(err) => Err(err),
        }
    }
}

impl From<Result<RecordSet, ValidationError>> for ValidationResult {
    fn from(result: Result<RecordSet, ValidationError>) -> Self {
        match result {
            Ok(records) => ValidationResult::Valid(records),
            Err(err) => ValidationResult::Invalid(err),
        }
    }
}
