// ==========================================
// 同行评审系统 - CSV 导入 API
// ==========================================
// 职责: 向上层（页面 / 命令行）暴露提交与决策两个边界操作
// 说明: 传输、鉴权与渲染由调用方负责
// ==========================================

use crate::api::error::{ApiError, ApiResult, ErrorPayload};
use crate::domain::staging::{StagedImportSummary, StagingId, SubmitOutcome};
use crate::domain::types::ImportDecision;
use crate::importer::StagedImporter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// 提交响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// 校验是否通过
    pub valid: bool,
    /// 暂存标识（校验通过时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_id: Option<String>,
    /// 表头（列顺序）
    pub header: Vec<String>,
    /// 预览记录（按行序）
    pub records: Vec<BTreeMap<String, String>>,
    /// 已存在的自然键（确认时将被整批拒绝）
    pub existing_keys: Vec<String>,
    /// 校验错误（校验未通过时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// 决策响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub staging_id: String,
    pub status: String,
    pub applied: usize,
    pub message: String,
}

/// CSV 导入 API
pub struct ImportApi {
    importer: Arc<dyn StagedImporter>,
}

impl ImportApi {
    pub fn new(importer: Arc<dyn StagedImporter>) -> Self {
        Self { importer }
    }

    /// 提交 CSV
    ///
    /// # 返回
    /// - Ok(SubmitResponse): 校验结果（失败原因在响应内）
    /// - Err(ApiError): 未知配置档、存储故障等
    pub async fn submit_csv(&self, profile: &str, bytes: &[u8]) -> ApiResult<SubmitResponse> {
        let profile = profile.trim();
        if profile.is_empty() {
            return Err(ApiError::InvalidInput("导入配置档不能为空".to_string()));
        }

        let response = match self.importer.submit(profile, bytes).await? {
            SubmitOutcome::Staged {
                staging_id,
                records,
                existing_keys,
            } => SubmitResponse {
                valid: true,
                staging_id: Some(staging_id.to_string()),
                header: records.header().to_vec(),
                records: records.iter().map(|r| r.to_map()).collect(),
                existing_keys,
                error: None,
            },
            SubmitOutcome::Rejected(err) => SubmitResponse {
                valid: false,
                staging_id: None,
                header: Vec::new(),
                records: Vec::new(),
                existing_keys: Vec::new(),
                error: Some(ApiError::from(err).to_payload()),
            },
        };
        Ok(response)
    }

    /// 确认 / 取消暂存导入
    pub async fn confirm_csv(&self, staging_id: &str, confirm: bool) -> ApiResult<DecisionResponse> {
        let decision = if confirm {
            ImportDecision::Confirm
        } else {
            ImportDecision::Cancel
        };
        self.decide(staging_id, decision).await
    }

    /// 以文本形式决策（confirm / cancel / 1 / 0）
    pub async fn decide_csv(&self, staging_id: &str, decision: &str) -> ApiResult<DecisionResponse> {
        let decision = ImportDecision::parse(decision)
            .ok_or_else(|| ApiError::InvalidInput(format!("无效的决策: {}", decision)))?;
        self.decide(staging_id, decision).await
    }

    /// 最近的暂存导入
    pub async fn list_recent_imports(&self) -> ApiResult<Vec<StagedImportSummary>> {
        Ok(self.importer.list_recent().await?)
    }

    /// 过期超时的暂存导入，返回过期条数
    pub async fn expire_stale_imports(&self) -> ApiResult<usize> {
        Ok(self.importer.expire_stale().await?)
    }

    async fn decide(&self, staging_id: &str, decision: ImportDecision) -> ApiResult<DecisionResponse> {
        let staging_id = staging_id.trim();
        if staging_id.is_empty() {
            return Err(ApiError::InvalidInput("暂存标识不能为空".to_string()));
        }

        let id = StagingId::from(staging_id);
        let outcome = self.importer.decide(&id, decision).await?;

        let message = match decision {
            ImportDecision::Confirm => format!("已写入 {} 条记录", outcome.applied),
            ImportDecision::Cancel => "导入已取消".to_string(),
        };
        info!(staging_id = %id, status = %outcome.status, applied = outcome.applied, "决策完成");

        Ok(DecisionResponse {
            staging_id: outcome.staging_id.to_string(),
            status: outcome.status.to_string(),
            applied: outcome.applied,
            message,
        })
    }
}
