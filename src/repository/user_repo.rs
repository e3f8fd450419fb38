// ==========================================
// 同行评审系统 - 用户仓储
// ==========================================
// 职责: 管理 app_user 表（自然键 user_id）
// 说明: 表结构由 db::init_schema 统一创建
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::record::ParsedRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{required_value, RecordRepository};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 新导入用户的初始状态（未激活）
pub const USER_STATUS_UNCONFIRMED: &str = "U";

/// 用户实体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    pub user_id: String,
    pub title: String,
    pub initials: String,
    pub name: String,
    pub surname: String,
    pub cell: String,
    pub email: String,
    pub status: String,
    pub created_at: String,
}

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
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

    /// 按 user_id 查询
    pub fn find_by_user_id(&self, user_id: &str) -> RepositoryResult<Option<UserEntity>> {
        let conn = self.get_conn()?;
        let user = conn
            .query_row(
                r#"
                SELECT user_id, title, initials, name, surname, cell, email, status, created_at
                FROM app_user
                WHERE user_id = ?1
                "#,
                params![user_id],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM app_user", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl RecordRepository for UserRepository {
    async fn exists(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM app_user WHERE user_id = ?1 LIMIT 1",
                params![key],
                |_row| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn create(&self, record: &ParsedRecord) -> RepositoryResult<()> {
        let user_id = required_value(record, "user_id")?;
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO app_user (
              user_id, title, initials, name, surname, cell, email, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                user_id,
                required_value(record, "title")?,
                required_value(record, "initials")?,
                required_value(record, "name")?,
                required_value(record, "surname")?,
                required_value(record, "cell")?,
                required_value(record, "email")?,
                USER_STATUS_UNCONFIRMED,
                now,
            ],
        )?;

        debug!(user_id = %user_id, line = record.line(), "用户已创建");
        Ok(())
    }
}

fn map_user(row: &Row) -> rusqlite::Result<UserEntity> {
    Ok(UserEntity {
        user_id: row.get(0)?,
        title: row.get(1)?,
        initials: row.get(2)?,
        name: row.get(3)?,
        surname: row.get(4)?,
        cell: row.get(5)?,
        email: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::profile::ImportProfile;
    use crate::importer::validate_csv;

    fn setup() -> UserRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        UserRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn user_records(csv: &str) -> Vec<ParsedRecord> {
        validate_csv(csv.as_bytes(), &ImportProfile::users())
            .into_result()
            .unwrap()
            .records()
            .to_vec()
    }

    const CSV: &str = "title,initials,name,surname,cell,email,user_id\n\
                       Dr,A,Ann,Lee,0821234567,ann@example.org,u1\n";

    #[tokio::test]
    async fn test_create_and_exists() {
        let repo = setup();
        let records = user_records(CSV);

        assert!(!repo.exists("u1").await.unwrap());
        repo.create(&records[0]).await.unwrap();
        assert!(repo.exists("u1").await.unwrap());

        let user = repo.find_by_user_id("u1").unwrap().unwrap();
        assert_eq!(user.surname, "Lee");
        assert_eq!(user.status, USER_STATUS_UNCONFIRMED);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_is_unique_violation() {
        let repo = setup();
        let records = user_records(CSV);

        repo.create(&records[0]).await.unwrap();
        let err = repo.create(&records[0]).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }
}
