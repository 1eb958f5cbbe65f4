// ==========================================
// 表格数据导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 传播: 解析期/请求形态错误立即中止；逐条落库错误写入结果，不上抛
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件解析失败: {0}")]
    ParseError(String),

    // ===== 请求形态错误 =====
    #[error("未知的实体类型: {0}")]
    UnknownEntity(String),

    #[error("没有可导入的数据")]
    EmptyBatch,

    #[error("显式映射格式错误: {0}")]
    InvalidMapping(String),

    // ===== 逐条落库错误（写入 ImportOutcome，不上抛） =====
    #[error("Duplicate entry (field={0})")]
    Duplicate(String),

    #[error("记录保存失败: {0}")]
    Persistence(String),

    // ===== 数据库错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 序列化错误 =====
    #[error("序列化失败: {0}")]
    Serialization(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ImportError {
    /// 是否属于调用方错误（400 类）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImportError::ParseError(_)
                | ImportError::UnknownEntity(_)
                | ImportError::EmptyBatch
                | ImportError::InvalidMapping(_)
        )
    }

    /// 单条记录保存失败 → 逐条错误
    ///
    /// 唯一约束冲突归为 Duplicate（携带冲突字段），其余归为 Persistence
    pub fn from_save_failure(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation { field, .. } => ImportError::Duplicate(field),
            other => ImportError::Persistence(other.to_string()),
        }
    }

    /// 逐条落库失败的原因文本
    ///
    /// 唯一约束冲突统一为 "Duplicate entry"，其余保留底层消息
    pub fn failure_reason(&self) -> String {
        match self {
            ImportError::Duplicate(_) => "Duplicate entry".to_string(),
            ImportError::Persistence(msg) => msg.clone(),
            ImportError::Repository(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::ParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Serialization(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ImportError::ParseError("bad".into()).is_client_error());
        assert!(ImportError::UnknownEntity("x".into()).is_client_error());
        assert!(ImportError::EmptyBatch.is_client_error());
        assert!(!ImportError::InternalError("x".into()).is_client_error());
        assert!(!ImportError::Repository(RepositoryError::LockError("x".into())).is_client_error());
    }

    #[test]
    fn test_unique_violation_reason_is_duplicate_entry() {
        let err = ImportError::from_save_failure(RepositoryError::UniqueConstraintViolation {
            field: "email".into(),
            message: "UNIQUE constraint failed: participants.email".into(),
        });
        assert!(matches!(err, ImportError::Duplicate(ref field) if field == "email"));
        assert_eq!(err.failure_reason(), "Duplicate entry");

        let err = ImportError::from_save_failure(RepositoryError::ValidationError(
            "firstName 为必填字段".into(),
        ));
        assert!(matches!(err, ImportError::Persistence(_)));
        assert_eq!(err.failure_reason(), "数据验证失败: firstName 为必填字段");
    }
}
