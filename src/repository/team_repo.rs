// ==========================================
// 同行评审系统 - 分组仓储
// ==========================================
// 职责: 管理 team_detail 表（用户 → 轮次内分组）
// 约束:
// - 每个用户最多一条分组记录（自然键 user_id）
// - 用户与轮次必须已存在，否则写入失败
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::record::ParsedRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{required_value, RecordRepository};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 新建分组的初始状态（未分配评审）
pub const TEAM_STATUS_NOT_ASSIGNED: &str = "NA";

/// 分组实体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAssignmentEntity {
    pub user_id: String,
    pub round_name: String,
    pub team_name: String,
    pub status: String,
}

pub struct TeamAssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TeamAssignmentRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保轮次存在，返回其主键
    pub fn ensure_round(&self, round_name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO round_detail (name) VALUES (?1)",
            params![round_name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM round_detail WHERE name = ?1",
            params![round_name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// 轮次内的全部分组（按分组名、用户排序）
    pub fn list_by_round(&self, round_name: &str) -> RepositoryResult<Vec<TeamAssignmentEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT u.user_id, r.name, t.team_name, t.status
            FROM team_detail t
            JOIN app_user u ON u.id = t.user_pk
            JOIN round_detail r ON r.id = t.round_pk
            WHERE r.name = ?1
            ORDER BY t.team_name, u.user_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![round_name], |row| {
                Ok(TeamAssignmentEntity {
                    user_id: row.get(0)?,
                    round_name: row.get(1)?,
                    team_name: row.get(2)?,
                    status: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl RecordRepository for TeamAssignmentRepository {
    /// 用户是否已在任一轮次的分组中
    async fn exists(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                r#"
                SELECT 1
                FROM team_detail t
                JOIN app_user u ON u.id = t.user_pk
                WHERE u.user_id = ?1
                LIMIT 1
                "#,
                params![key],
                |_row| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn create(&self, record: &ParsedRecord) -> RepositoryResult<()> {
        let user_id = required_value(record, "user_id")?;
        let round_name = required_value(record, "round_name")?;
        let team_name = required_value(record, "team_name")?;

        let conn = self.get_conn()?;

        let user_pk: i64 = conn
            .query_row(
                "SELECT id FROM app_user WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "app_user".to_string(),
                id: user_id.to_string(),
            })?;

        let round_pk: i64 = conn
            .query_row(
                "SELECT id FROM round_detail WHERE name = ?1",
                params![round_name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "round_detail".to_string(),
                id: round_name.to_string(),
            })?;

        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        conn.execute(
            r#"
            INSERT INTO team_detail (user_pk, round_pk, team_name, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![user_pk, round_pk, team_name, TEAM_STATUS_NOT_ASSIGNED, now],
        )?;

        debug!(user_id = %user_id, round = %round_name, team = %team_name, "分组已创建");
        Ok(())
    }
}
