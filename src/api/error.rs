// ==========================================
// 表格数据导入引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，将导入/仓储错误转换为带原因的错误消息
// 分类: status_code() 给出传输层可用的 400 / 404 / 500
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 传输层状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_)
            | ApiError::BusinessRuleViolation(_)
            | ApiError::ValidationError(_)
            | ApiError::ImportError(_) => 400,
            ApiError::NotFound(_) => 404,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::SchemaError { table, message } => {
                ApiError::DatabaseError(format!("实体表{}初始化失败: {}", table, message))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation { field, .. } => {
                ApiError::BusinessRuleViolation(format!("字段{}的值已存在", field))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::ParseError(_) => ApiError::ImportError(err.to_string()),
            ImportError::UnknownEntity(_)
            | ImportError::EmptyBatch
            | ImportError::InvalidMapping(_) => ApiError::InvalidInput(err.to_string()),
            ImportError::Repository(e) => e.into(),
            ImportError::Duplicate(_) | ImportError::Persistence(_) => {
                ApiError::DatabaseError(err.to_string())
            }
            ImportError::Serialization(_) | ImportError::InternalError(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
