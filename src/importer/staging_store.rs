// ==========================================
// 同行评审系统 - 暂存存储
// ==========================================
// 职责: 每个暂存标识持有一份已校验记录集，直到终态转换
// 红线:
// - 状态只允许 PENDING_CONFIRMATION → {COMMITTED, CANCELLED, EXPIRED}
// - 转换以 UPDATE ... WHERE status = 'PENDING_CONFIRMATION' 做比较并交换
// - 上传文件只在转换成功的那一次删除
// ==========================================

use crate::domain::record::RecordSet;
use crate::domain::staging::{
    ArtifactLocation, ClaimToken, StagedImport, StagedImportSummary, StagingId,
};
use crate::domain::types::{StagingStatus, TerminalStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::artifact_store::ArtifactStorage;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

pub struct StagingStore {
    conn: Arc<Mutex<Connection>>,
    artifacts: Arc<dyn ArtifactStorage>,
}

impl StagingStore {
    /// 创建暂存存储（暂存表不存在时自动创建）
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        artifacts: Arc<dyn ArtifactStorage>,
    ) -> ImportResult<Self> {
        let store = Self { conn, artifacts };
        store.ensure_table()?;
        Ok(store)
    }

    fn get_conn(&self) -> ImportResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> ImportResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS staged_import (
              staging_id TEXT PRIMARY KEY,
              profile TEXT NOT NULL,
              artifact_location TEXT NOT NULL,
              records_json TEXT NOT NULL,
              record_count INTEGER NOT NULL,
              status TEXT NOT NULL CHECK(status IN ('PENDING_CONFIRMATION', 'COMMITTED', 'CANCELLED', 'EXPIRED')),
              claim_token TEXT,
              created_at TEXT NOT NULL,
              finalized_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_staged_import_status ON staged_import(status);
            CREATE INDEX IF NOT EXISTS idx_staged_import_created_at ON staged_import(created_at DESC);
            "#,
        )?;
        Ok(())
    }

    /// 暂存一份已校验记录集，状态为 PENDING_CONFIRMATION
    pub fn stage(
        &self,
        profile: &str,
        artifact_location: &ArtifactLocation,
        records: &RecordSet,
    ) -> ImportResult<StagingId> {
        let id = StagingId::generate();
        let records_json = serde_json::to_string(records)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO staged_import (
              staging_id, profile, artifact_location, records_json, record_count,
              status, claim_token, created_at, finalized_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, NULL)
            "#,
            params![
                id.as_str(),
                profile,
                artifact_location.as_str(),
                records_json,
                records.len() as i64,
                StagingStatus::PendingConfirmation.as_str(),
                format_ts(Utc::now()),
            ],
        )?;

        info!(staging_id = %id, profile = %profile, rows = records.len(), "导入已暂存");
        Ok(id)
    }

    /// 按标识读取暂存导入
    pub fn get(&self, id: &StagingId) -> ImportResult<StagedImport> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT staging_id, profile, artifact_location, records_json, status,
                       claim_token, created_at, finalized_at
                FROM staged_import
                WHERE staging_id = ?1
                "#,
                params![id.as_str()],
                StagedRow::from_row,
            )
            .optional()?;
        drop(conn);

        match row {
            Some(row) => row.into_staged(),
            None => Err(ImportError::NotFound {
                id: id.to_string(),
            }),
        }
    }

    /// 占用待确认导入，供确认流程独占
    ///
    /// # 返回
    /// - Err(DecisionInProgress): 已被其他确认流程占用
    /// - Err(InvalidTransition / NotFound): 已终态或不存在
    ///
    /// 进程在确认中途退出时占用不会自动释放，需人工清理 claim_token
    pub fn try_claim(&self, id: &StagingId) -> ImportResult<ClaimToken> {
        let token = ClaimToken::generate();
        let rows = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                UPDATE staged_import
                SET claim_token = ?1
                WHERE staging_id = ?2
                  AND status = 'PENDING_CONFIRMATION'
                  AND claim_token IS NULL
                "#,
                params![token.as_str(), id.as_str()],
            )?
        };

        if rows == 1 {
            debug!(staging_id = %id, "暂存导入已占用");
            Ok(token)
        } else {
            Err(self.rejection_for(id)?)
        }
    }

    /// 释放占用，暂存导入回到可决策状态
    pub fn release_claim(&self, id: &StagingId, token: &ClaimToken) -> ImportResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE staged_import SET claim_token = NULL WHERE staging_id = ?1 AND claim_token = ?2",
            params![id.as_str(), token.as_str()],
        )?;
        debug!(staging_id = %id, released = rows, "暂存导入占用已释放");
        Ok(())
    }

    /// 终态转换（要求未被占用），成功后删除上传文件
    pub fn finalize(&self, id: &StagingId, outcome: TerminalStatus) -> ImportResult<()> {
        self.transition(id, outcome, None)
    }

    /// 由占用者完成终态转换
    pub fn finalize_claimed(
        &self,
        id: &StagingId,
        token: &ClaimToken,
        outcome: TerminalStatus,
    ) -> ImportResult<()> {
        self.transition(id, outcome, Some(token))
    }

    /// 过期创建时间早于 now - ttl 且未被占用的待确认导入
    ///
    /// # 返回
    /// - 本次实际过期的条数（与并发决策竞争失败的不计）
    pub fn expire_stale(&self, ttl: Duration, now: DateTime<Utc>) -> ImportResult<usize> {
        // 超出可表示的时间范围时不存在更早的导入
        let Some(cutoff) = now.checked_sub_signed(ttl) else {
            debug!("暂存超时超出时间范围，无可过期的导入");
            return Ok(0);
        };
        let cutoff = format_ts(cutoff);
        let candidates: Vec<String> = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT staging_id FROM staged_import
                WHERE status = 'PENDING_CONFIRMATION'
                  AND claim_token IS NULL
                  AND created_at < ?1
                ORDER BY created_at
                "#,
            )?;
            let ids = stmt
                .query_map(params![cutoff], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            ids
        };

        let mut expired = 0;
        for id in candidates {
            match self.finalize(&StagingId::from(id), TerminalStatus::Expired) {
                Ok(()) => expired += 1,
                Err(ImportError::InvalidTransition { .. })
                | Err(ImportError::DecisionInProgress { .. })
                | Err(ImportError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if expired > 0 {
            info!(expired = expired, "超时暂存导入已过期");
        }
        Ok(expired)
    }

    /// 最近的暂存导入（按创建时间倒序）
    pub fn list_recent(&self, limit: usize) -> ImportResult<Vec<StagedImportSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT staging_id, profile, status, record_count, created_at, finalized_at
            FROM staged_import
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, profile, status, count, created_at, finalized_at)| -> ImportResult<_> {
                    Ok(StagedImportSummary {
                        id: StagingId::from(id),
                        profile,
                        status: parse_status(&status)?,
                        record_count: count.max(0) as usize,
                        created_at: parse_ts(&created_at)?,
                        finalized_at: finalized_at.as_deref().map(parse_ts).transpose()?,
                    })
                },
            )
            .collect()
    }

    fn transition(
        &self,
        id: &StagingId,
        outcome: TerminalStatus,
        claim: Option<&ClaimToken>,
    ) -> ImportResult<()> {
        let status = StagingStatus::from(outcome);
        let now = format_ts(Utc::now());

        let location = {
            let conn = self.get_conn()?;
            let rows = match claim {
                None => conn.execute(
                    r#"
                    UPDATE staged_import
                    SET status = ?1, finalized_at = ?2
                    WHERE staging_id = ?3
                      AND status = 'PENDING_CONFIRMATION'
                      AND claim_token IS NULL
                    "#,
                    params![status.as_str(), now, id.as_str()],
                )?,
                Some(token) => conn.execute(
                    r#"
                    UPDATE staged_import
                    SET status = ?1, finalized_at = ?2, claim_token = NULL
                    WHERE staging_id = ?3
                      AND status = 'PENDING_CONFIRMATION'
                      AND claim_token = ?4
                    "#,
                    params![status.as_str(), now, id.as_str(), token.as_str()],
                )?,
            };

            if rows != 1 {
                drop(conn);
                return Err(self.rejection_for(id)?);
            }

            conn.query_row(
                "SELECT artifact_location FROM staged_import WHERE staging_id = ?1",
                params![id.as_str()],
                |row| row.get::<_, String>(0),
            )?
        };

        info!(staging_id = %id, status = %status, "暂存导入已终结");

        // 状态已落定，删除失败不回滚，只记录
        let location = ArtifactLocation::new(location);
        if let Err(e) = self.artifacts.delete(&location) {
            error!(staging_id = %id, location = %location, error = %e, "上传文件删除失败");
        }
        Ok(())
    }

    // 比较并交换失败后，给出具体原因
    fn rejection_for(&self, id: &StagingId) -> ImportResult<ImportError> {
        let conn = self.get_conn()?;
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT status, claim_token FROM staged_import WHERE staging_id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match row {
            None => ImportError::NotFound {
                id: id.to_string(),
            },
            Some((status, claim)) => {
                let status = parse_status(&status)?;
                if status.is_terminal() {
                    ImportError::InvalidTransition {
                        id: id.to_string(),
                        status,
                    }
                } else if claim.is_some() {
                    ImportError::DecisionInProgress { id: id.to_string() }
                } else {
                    ImportError::Database(format!("暂存导入状态未变化: {}", id))
                }
            }
        })
    }
}

// ==========================================
// 行映射
// ==========================================
struct StagedRow {
    staging_id: String,
    profile: String,
    artifact_location: String,
    records_json: String,
    status: String,
    claim_token: Option<String>,
    created_at: String,
    finalized_at: Option<String>,
}

impl StagedRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            staging_id: row.get(0)?,
            profile: row.get(1)?,
            artifact_location: row.get(2)?,
            records_json: row.get(3)?,
            status: row.get(4)?,
            claim_token: row.get(5)?,
            created_at: row.get(6)?,
            finalized_at: row.get(7)?,
        })
    }

    fn into_staged(self) -> ImportResult<StagedImport> {
        let records: RecordSet = serde_json::from_str(&self.records_json)?;
        Ok(StagedImport {
            id: StagingId::from(self.staging_id),
            profile: self.profile,
            artifact_location: ArtifactLocation::new(self.artifact_location),
            records,
            status: parse_status(&self.status)?,
            created_at: parse_ts(&self.created_at)?,
            finalized_at: self.finalized_at.as_deref().map(parse_ts).transpose()?,
            claimed: self.claim_token.is_some(),
        })
    }
}

// 固定宽度 RFC3339，字符串比较即时间比较
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> ImportResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ImportError::Database(format!("时间格式无效 {}: {}", value, e)))
}

fn parse_status(value: &str) -> ImportResult<StagingStatus> {
    StagingStatus::parse(value)
        .ok_or_else(|| ImportError::Database(format!("未知暂存状态: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{FieldSchema, RawTable};
    use crate::importer::record_parser::RowRecordParser;
    use crate::importer::staged_importer_trait::RecordParser;
    use crate::repository::error::RepositoryResult;
    use std::collections::HashSet;

    #[derive(Default)]
    struct CountingStorage {
        live: Mutex<HashSet<String>>,
        deletes: Mutex<Vec<String>>,
    }

    impl ArtifactStorage for CountingStorage {
        fn save(&self, _bytes: &[u8]) -> RepositoryResult<ArtifactLocation> {
            let location = format!("mem://{}", uuid::Uuid::new_v4());
            self.live.lock().unwrap().insert(location.clone());
            Ok(ArtifactLocation::new(location))
        }

        fn read(&self, _location: &ArtifactLocation) -> RepositoryResult<Vec<u8>> {
            Ok(Vec::new())
        }

        fn delete(&self, location: &ArtifactLocation) -> RepositoryResult<()> {
            self.live.lock().unwrap().remove(location.as_str());
            self.deletes.lock().unwrap().push(location.to_string());
            Ok(())
        }

        fn exists(&self, location: &ArtifactLocation) -> bool {
            self.live.lock().unwrap().contains(location.as_str())
        }
    }

    fn setup() -> (StagingStore, Arc<CountingStorage>) {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let storage = Arc::new(CountingStorage::default());
        let store = StagingStore::new(conn, storage.clone()).unwrap();
        (store, storage)
    }

    fn sample_records() -> RecordSet {
        let raw = RawTable {
            header: vec!["user_id".to_string()],
            rows: vec![vec!["u1".to_string()], vec!["u2".to_string()]],
        };
        let schema = FieldSchema::new(vec!["user_id"], Vec::<&str>::new()).unwrap();
        RowRecordParser.parse_records(&raw, &schema).unwrap()
    }

    fn stage_one(store: &StagingStore, storage: &CountingStorage) -> (StagingId, ArtifactLocation) {
        let location = storage.save(b"user_id\nu1\nu2\n").unwrap();
        let id = store.stage("users", &location, &sample_records()).unwrap();
        (id, location)
    }

    #[test]
    fn test_stage_and_get() {
        let (store, storage) = setup();
        let (id, location) = stage_one(&store, &storage);

        let staged = store.get(&id).unwrap();
        assert_eq!(staged.status, StagingStatus::PendingConfirmation);
        assert_eq!(staged.artifact_location, location);
        assert_eq!(staged.records, sample_records());
        assert_eq!(staged.profile, "users");
        assert!(!staged.claimed);
        assert!(staged.finalized_at.is_none());
    }

    #[test]
    fn test_get_unknown_id() {
        let (store, _) = setup();
        let err = store.get(&StagingId::from("missing")).unwrap_err();
        assert!(matches!(err, ImportError::NotFound { .. }));
    }

    #[test]
    fn test_cancel_twice_deletes_once() {
        let (store, storage) = setup();
        let (id, location) = stage_one(&store, &storage);

        store.finalize(&id, TerminalStatus::Cancelled).unwrap();
        assert!(!storage.exists(&location));
        assert_eq!(storage.deletes.lock().unwrap().len(), 1);

        let err = store.finalize(&id, TerminalStatus::Cancelled).unwrap_err();
        assert!(matches!(
            err,
            ImportError::InvalidTransition {
                status: StagingStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(storage.deletes.lock().unwrap().len(), 1);

        let staged = store.get(&id).unwrap();
        assert_eq!(staged.status, StagingStatus::Cancelled);
        assert!(staged.finalized_at.is_some());
    }

    #[test]
    fn test_finalize_unknown_id_has_no_side_effect() {
        let (store, storage) = setup();
        let err = store
            .finalize(&StagingId::from("missing"), TerminalStatus::Expired)
            .unwrap_err();
        assert!(matches!(err, ImportError::NotFound { .. }));
        assert!(storage.deletes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_claim_blocks_other_decisions() {
        let (store, storage) = setup();
        let (id, location) = stage_one(&store, &storage);

        let token = store.try_claim(&id).unwrap();
        assert!(store.get(&id).unwrap().claimed);

        assert!(matches!(
            store.try_claim(&id).unwrap_err(),
            ImportError::DecisionInProgress { .. }
        ));
        assert!(matches!(
            store.finalize(&id, TerminalStatus::Cancelled).unwrap_err(),
            ImportError::DecisionInProgress { .. }
        ));
        assert!(storage.exists(&location));

        store
            .finalize_claimed(&id, &token, TerminalStatus::Committed)
            .unwrap();
        let staged = store.get(&id).unwrap();
        assert_eq!(staged.status, StagingStatus::Committed);
        assert!(!staged.claimed);
        assert!(!storage.exists(&location));
    }

    #[test]
    fn test_release_claim_returns_to_pending() {
        let (store, storage) = setup();
        let (id, _) = stage_one(&store, &storage);

        let token = store.try_claim(&id).unwrap();
        store.release_claim(&id, &token).unwrap();

        let staged = store.get(&id).unwrap();
        assert_eq!(staged.status, StagingStatus::PendingConfirmation);
        assert!(!staged.claimed);

        // 释放后的旧令牌不能再完成提交
        assert!(store
            .finalize_claimed(&id, &token, TerminalStatus::Committed)
            .is_err());
        store.finalize(&id, TerminalStatus::Cancelled).unwrap();
    }

    #[test]
    fn test_claim_terminal_import_is_invalid_transition() {
        let (store, storage) = setup();
        let (id, _) = stage_one(&store, &storage);
        store.finalize(&id, TerminalStatus::Expired).unwrap();

        assert!(matches!(
            store.try_claim(&id).unwrap_err(),
            ImportError::InvalidTransition {
                status: StagingStatus::Expired,
                ..
            }
        ));
    }

    #[test]
    fn test_expire_stale_skips_claimed_and_recent() {
        let (store, storage) = setup();
        let (old, old_location) = stage_one(&store, &storage);
        let (claimed, _) = stage_one(&store, &storage);
        let _token = store.try_claim(&claimed).unwrap();

        // 以 1 小时后为“现在”，TTL 10 分钟：两条都超时，但被占用的一条不动
        let now = Utc::now() + Duration::hours(1);
        let expired = store.expire_stale(Duration::minutes(10), now).unwrap();
        assert_eq!(expired, 1);
        assert_eq!(store.get(&old).unwrap().status, StagingStatus::Expired);
        assert!(!storage.exists(&old_location));
        assert_eq!(
            store.get(&claimed).unwrap().status,
            StagingStatus::PendingConfirmation
        );

        // 以当前时间为准，没有超时的
        let (_fresh, _) = stage_one(&store, &storage);
        assert_eq!(store.expire_stale(Duration::minutes(10), Utc::now()).unwrap(), 0);
    }

    #[test]
    fn test_expire_stale_with_huge_ttl_expires_nothing() {
        let (store, storage) = setup();
        let (id, location) = stage_one(&store, &storage);

        // now - ttl 超出 chrono 可表示范围
        let ttl = Duration::try_seconds(10_000_000_000_000).unwrap();
        assert_eq!(store.expire_stale(ttl, Utc::now()).unwrap(), 0);
        assert_eq!(
            store.get(&id).unwrap().status,
            StagingStatus::PendingConfirmation
        );
        assert!(storage.exists(&location));
    }

    #[test]
    fn test_list_recent_with_oversized_limit() {
        let (store, storage) = setup();
        stage_one(&store, &storage);
        stage_one(&store, &storage);

        assert_eq!(store.list_recent(usize::MAX).unwrap().len(), 2);
        assert_eq!(store.list_recent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_list_recent_newest_first() {
        let (store, storage) = setup();
        let (first, _) = stage_one(&store, &storage);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let (second, _) = stage_one(&store, &storage);
        store.finalize(&first, TerminalStatus::Cancelled).unwrap();

        let recent = store.list_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[0].record_count, 2);
        assert_eq!(recent[1].status, StagingStatus::Cancelled);

        assert_eq!(store.list_recent(1).unwrap().len(), 1);
    }
}
