// ==========================================
// 同行评审系统 - 表头校验器实现
// ==========================================
// 步骤 2: 必填字段 ⊆ 表头
// 比较为精确字符串匹配，不做裁剪与大小写折叠
// ==========================================

use crate::domain::record::FieldSchema;
use crate::importer::error::ValidationError;
use crate::importer::staged_importer_trait::SchemaValidator;

pub struct HeaderValidator;

impl SchemaValidator for HeaderValidator {
    fn validate_header(
        &self,
        header: &[String],
        schema: &FieldSchema,
    ) -> Result<(), ValidationError> {
        match schema
            .required()
            .iter()
            .find(|field| !header.contains(field))
        {
            Some(field) => Err(ValidationError::Schema {
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }
}
