// ==========================================
// 表格数据导入引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 实体注册表在启动时一次性构建，之后只读
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ImportApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::importer::{AiExtractor, RecordImporterImpl};
use crate::repository::{EntityRegistry, ProvenanceRepository, ProvenanceRepositoryImpl};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "TABULAR_IMPORT_DB_PATH";

/// 应用状态
///
/// 包含API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入API
    pub import_api: Arc<ImportApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 为内存库）
    ///
    /// # 说明
    /// 1. 打开共享连接并建立基础表
    /// 2. 注册内置实体（建立实体表）
    /// 3. 组装导入器与 API
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;

        match read_schema_version(&conn) {
            Ok(Some(v)) if v > CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    db_version = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "数据库 schema 版本高于当前程序，部分功能可能异常"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "读取 schema_version 失败"),
        }

        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let registry = EntityRegistry::with_builtin_entities(conn.clone())
            .map_err(|e| format!("无法注册实体: {}", e))?;
        let provenance_repo: Arc<dyn ProvenanceRepository> =
            Arc::new(ProvenanceRepositoryImpl::new(conn.clone()));

        // ==========================================
        // 初始化配置与导入器
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let ai_extractor = AiExtractor::from_config(config_manager.as_ref()).await;
        tracing::info!(ai_configured = ai_extractor.is_configured(), "AI 抽取配置完成");

        let importer = Arc::new(RecordImporterImpl::new(
            registry,
            provenance_repo.clone(),
            config_manager.clone(),
        ));

        let import_api = Arc::new(ImportApi::new(importer, provenance_repo, ai_extractor));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            import_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 TABULAR_IMPORT_DB_PATH，其次为用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./tabular_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("tabular-import");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("tabular_import.db");
        }
    }

    path.to_string_lossy().to_string()
}
