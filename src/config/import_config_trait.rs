// ==========================================
// 表格数据导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取错误
pub type ConfigError = Box<dyn Error + Send + Sync>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 列对齐 =====

    /// 近似匹配的最大编辑距离
    ///
    /// # 默认值
    /// - 3
    async fn get_fuzzy_match_threshold(&self) -> Result<usize, ConfigError>;

    /// 预览展示行数上限
    ///
    /// # 默认值
    /// - 100
    async fn get_preview_row_limit(&self) -> Result<usize, ConfigError>;

    // ===== AI 抽取 =====

    /// 送入模型的文本最大字符数（超出部分截断）
    ///
    /// # 默认值
    /// - 30000
    async fn get_ai_max_input_chars(&self) -> Result<usize, ConfigError>;

    /// 模型名称
    ///
    /// # 默认值
    /// - gemini-1.5-flash
    async fn get_ai_model(&self) -> Result<String, ConfigError>;

    /// 单次调用超时（秒）
    ///
    /// # 默认值
    /// - 30
    async fn get_ai_timeout_secs(&self) -> Result<u64, ConfigError>;

    /// 模型凭据
    ///
    /// # 返回
    /// - 环境变量 GOOGLE_API_KEY 优先，其次 config_kv 的 ai_api_key
    /// - None: 未配置（AI 抽取不可用）
    async fn get_ai_api_key(&self) -> Result<Option<String>, ConfigError>;
}
