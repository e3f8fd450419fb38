// ==========================================
// 同行评审系统 - 导入配置档
// ==========================================
// 职责: 绑定字段模式与自然键（用户 / 分组两类批量导入）
// ==========================================

use crate::domain::record::FieldSchema;
use crate::importer::error::SchemaDefinitionError;

/// 用户导入配置档名称
pub const USERS_PROFILE: &str = "users";
/// 分组导入配置档名称
pub const TEAM_ASSIGNMENTS_PROFILE: &str = "team_assignments";

const USER_FIELDS: &[&str] = &[
    "title", "initials", "name", "surname", "cell", "email", "user_id",
];
const TEAM_ASSIGNMENT_FIELDS: &[&str] = &["user_id", "round_name", "team_name"];

// ==========================================
// ImportProfile - 导入配置档
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProfile {
    name: String,
    schema: FieldSchema,
    natural_key: String,
}

impl ImportProfile {
    /// 创建配置档
    ///
    /// # 约束
    /// - 自然键必须是必填字段（否则空值无法参与去重）
    pub fn new(
        name: impl Into<String>,
        schema: FieldSchema,
        natural_key: impl Into<String>,
    ) -> Result<Self, SchemaDefinitionError> {
        let natural_key = natural_key.into();
        if !schema.is_required(&natural_key) {
            return Err(SchemaDefinitionError::NaturalKeyNotRequired(natural_key));
        }
        Ok(Self {
            name: name.into(),
            schema,
            natural_key,
        })
    }

    /// 用户批量导入: 7 个必填字段，自然键 user_id
    pub fn users() -> Self {
        Self::builtin(USERS_PROFILE, USER_FIELDS, "user_id")
    }

    /// 分组批量导入: user_id / round_name / team_name，自然键 user_id
    pub fn team_assignments() -> Self {
        Self::builtin(TEAM_ASSIGNMENTS_PROFILE, TEAM_ASSIGNMENT_FIELDS, "user_id")
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            USERS_PROFILE => Some(Self::users()),
            TEAM_ASSIGNMENTS_PROFILE => Some(Self::team_assignments()),
            _ => None,
        }
    }

    // 内置字段表无重复且包含自然键，由单元测试守护
    fn builtin(name: &str, required: &[&str], natural_key: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: FieldSchema {
                required: required.iter().map(|f| f.to_string()).collect(),
                optional: Vec::new(),
            },
            natural_key: natural_key.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn natural_key(&self) -> &str {
        &self.natural_key
    }
}
