// ==========================================
// 表格数据导入引擎 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束冲突按 SQLite 消息归类，并带出出错的列名
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 存储错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("实体表初始化失败 (table={table}): {message}")]
    SchemaError { table: String, message: String },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 记录内容错误 =====
    #[error("唯一约束违反 (field={field}): {message}")]
    UniqueConstraintViolation { field: String, message: String },

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    #[error("内部错误: {0}")]
    InternalError(String),
}

/// 从 "UNIQUE constraint failed: participants.email" 中取出列名
fn constraint_column(msg: &str) -> String {
    msg.rsplit(": ")
        .next()
        .and_then(|cols| cols.split(',').next())
        .map(|col| col.trim().rsplit('.').next().unwrap_or(col).to_string())
        .unwrap_or_default()
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.starts_with("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation {
                        field: constraint_column(&msg),
                        message: msg,
                    }
                } else if msg.starts_with("NOT NULL") {
                    RepositoryError::ValidationError(format!(
                        "{} 为必填字段",
                        constraint_column(&msg)
                    ))
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::InternalError(format!("JSON 序列化失败: {}", err))
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
