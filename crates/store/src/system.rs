use async_trait::async_trait;
use chrono::{DateTime, Utc};
use soba_core::store::error::StoreError;
use soba_core::store::port::{SystemStore, User, UserRole};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// 中心数据库文件名
const APP_DB: &str = "app.db";

/// 首次启动时种子管理员的初始密码，登录后强制修改
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// # Summary
/// SystemStore 的 SQLite 实现，管理用户账号。
///
/// # Invariants
/// - 密码只以 bcrypt 哈希落库。
pub struct SqliteSystemStore {
    pool: SqlitePool,
}

impl SqliteSystemStore {
    pub async fn new() -> Result<Self, StoreError> {
        Self::open(&crate::config::get_root_dir()).await
    }

    /// # Summary
    /// 在指定目录下打开并初始化存储。
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::InitError(e.to_string()))?;
        let db_path = dir.join(APP_DB);

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                force_password_change INTEGER NOT NULL,
                created_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    /// # Summary
    /// 确保存在管理员账号，首次启动时播种。
    ///
    /// # Logic
    /// 1. 查询 id = "admin" 的用户。
    /// 2. 不存在时以默认密码创建，并标记强制改密。
    ///
    /// # Returns
    /// 新建时返回 true，已存在返回 false。
    pub async fn ensure_default_admin(&self) -> Result<bool, StoreError> {
        if self.get_user("admin").await?.is_some() {
            return Ok(false);
        }

        let hash = bcrypt::hash(DEFAULT_ADMIN_PASSWORD, bcrypt::DEFAULT_COST)
            .map_err(|e| StoreError::InitError(e.to_string()))?;
        let admin = User {
            id: "admin".to_string(),
            name: "System Administrator".to_string(),
            password_hash: hash,
            role: UserRole::Admin,
            force_password_change: true,
            created_at: Utc::now(),
        };
        self.save_user(&admin).await?;
        info!("Seeded default admin user (password change required on first login)");
        Ok(true)
    }
}

#[async_trait]
impl SystemStore for SqliteSystemStore {
    /// # Summary
    /// 根据 ID 获取用户信息。
    ///
    /// # Logic
    /// 查询 `users` 表。
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, (String, String, String, String, bool, DateTime<Utc>)>(
            "SELECT id, name, password_hash, role, force_password_change, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(|r| {
            Ok(User {
                id: r.0,
                name: r.1,
                password_hash: r.2,
                role: UserRole::from_str(&r.3).map_err(StoreError::Database)?,
                force_password_change: r.4,
                created_at: r.5,
            })
        })
        .transpose()
    }

    /// # Summary
    /// 保存或更新用户信息。
    ///
    /// # Logic
    /// 在 `users` 表上执行 `INSERT OR REPLACE`。
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO users (id, name, password_hash, role, force_password_change, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.force_password_change)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
