// ==========================================
// 同行评审系统 - 自然键去重检查器实现
// ==========================================
// 职责: 检测同批次内重复自然键 / 与已有记录冲突的自然键
// 策略: 任一冲突 → 整批拒绝（由调用方执行），本组件只分类、不写入
// ==========================================

use crate::domain::record::RecordSet;
use crate::domain::staging::DedupReport;
use crate::importer::staged_importer_trait::DedupChecker;
use crate::repository::error::RepositoryResult;
use crate::repository::record_repo::RecordRepository;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashSet;

pub struct NaturalKeyDedupChecker;

#[async_trait]
impl DedupChecker for NaturalKeyDedupChecker {
    /// 检测同批次内重复自然键
    ///
    /// # 返回
    /// - 重复的键（每个键一次，按第二次出现的行序）
    fn find_in_batch_duplicates(&self, records: &RecordSet, key_field: &str) -> Vec<String> {
        let mut first_occurrence = HashSet::new();
        let mut reported = HashSet::new();
        let mut duplicates = Vec::new();

        for key in records.natural_keys(key_field) {
            if !first_occurrence.insert(key) && reported.insert(key) {
                duplicates.push(key.to_string());
            }
        }

        duplicates
    }

    /// 按自然键是否已存在对记录分类
    ///
    /// # 说明
    /// - 每条记录一次 exists 查询，查询并发发出，结果按行序归类
    /// - 任一查询失败即返回错误，不给出部分分类
    async fn partition(
        &self,
        records: &RecordSet,
        key_field: &str,
        lookup: &dyn RecordRepository,
    ) -> RepositoryResult<DedupReport> {
        let keys = records.natural_keys(key_field);
        let existence = try_join_all(keys.iter().map(|key| lookup.exists(key))).await?;

        let mut report = DedupReport {
            key_field: key_field.to_string(),
            ..Default::default()
        };
        for (record, exists) in records.iter().zip(existence) {
            if exists {
                report.conflicting_records.push(record.clone());
            } else {
                report.new_records.push(record.clone());
            }
        }

        Ok(report)
    }
}
