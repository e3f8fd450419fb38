// ==========================================
// 同行评审系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 默认上传大小上限（5 MiB）
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// 默认最近导入列表条数
pub const DEFAULT_RECENT_IMPORT_LIMIT: usize = 50;

/// 上传目录环境变量
pub const ARTIFACT_DIR_ENV: &str = "PEER_REVIEW_IMPORT_ARTIFACT_DIR";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    // 解析失败回落默认值，并记录原始值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

/// 默认上传目录（环境变量 → 用户数据目录 → 当前目录）
pub fn default_artifact_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ARTIFACT_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join("peer-review-import").join("artifacts"))
        .unwrap_or_else(|| PathBuf::from(".").join("artifacts"))
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_staging_ttl_secs(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(config_keys::STAGING_TTL_SECS, 0u64)
    }

    async fn get_recent_import_limit(&self) -> ConfigResult<usize> {
        let limit =
            self.get_parsed_or_default(config_keys::RECENT_IMPORT_LIMIT, DEFAULT_RECENT_IMPORT_LIMIT)?;
        Ok(if limit == 0 {
            DEFAULT_RECENT_IMPORT_LIMIT
        } else {
            limit
        })
    }

    async fn get_max_upload_bytes(&self) -> ConfigResult<usize> {
        let limit =
            self.get_parsed_or_default(config_keys::MAX_UPLOAD_BYTES, DEFAULT_MAX_UPLOAD_BYTES)?;
        if limit == 0 {
            warn!(
                config_key = config_keys::MAX_UPLOAD_BYTES,
                "上传上限不能为 0，使用默认值"
            );
            return Ok(DEFAULT_MAX_UPLOAD_BYTES);
        }
        Ok(limit)
    }

    async fn get_artifact_dir(&self) -> ConfigResult<PathBuf> {
        match self.get_config_value(config_keys::ARTIFACT_DIR)? {
            Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir.trim())),
            _ => Ok(default_artifact_dir()),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 暂存
    pub const STAGING_TTL_SECS: &str = "staging_ttl_secs";
    pub const RECENT_IMPORT_LIMIT: &str = "recent_import_limit";

    // 上传
    pub const MAX_UPLOAD_BYTES: &str = "max_upload_bytes";
    pub const ARTIFACT_DIR: &str = "artifact_dir";
}
