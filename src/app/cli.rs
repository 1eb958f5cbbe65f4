// ==========================================
// 表格数据导入引擎 - 命令行传输层
// ==========================================
// 职责: 读取文件/参数 → 调用 ImportApi → 输出 JSON
// ==========================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::app::state::AppState;
use crate::domain::import::FileInfo;

#[derive(Parser)]
#[command(
    name = "tabular-import",
    version,
    about = "Preview and import CSV / spreadsheet data into typed entities"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Database file (default: $TABULAR_IMPORT_DB_PATH or the user data dir).
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse and align a file without saving anything.
    Preview(PreviewArgs),

    /// Save records previously returned by `preview`.
    Confirm(ConfirmArgs),

    /// Preview and confirm a CSV file in one step.
    Import(ImportArgs),

    /// Export every stored record of an entity.
    Export(ExportArgs),

    /// Extract records from free text with the configured AI model.
    Extract(ExtractArgs),

    /// Show recent import provenance records.
    History(HistoryArgs),

    /// List registered entity types.
    Entities,
}

#[derive(Parser)]
pub struct PreviewArgs {
    /// Target entity type (participant, module, program).
    pub entity: String,

    /// Input file.
    pub file: PathBuf,

    /// Media type; inferred from the file extension when omitted.
    #[arg(long = "media-type")]
    pub media_type: Option<String>,

    /// Explicit mapping as JSON: {"Source Column": "targetField"}.
    #[arg(long)]
    pub mapping: Option<String>,

    /// Field transforms as JSON: {"email": ["trim", "lowercase"]}.
    #[arg(long)]
    pub transforms: Option<String>,
}

#[derive(Parser)]
pub struct ConfirmArgs {
    /// Target entity type.
    pub entity: String,

    /// JSON file holding a record array or a full preview result.
    pub records: PathBuf,

    /// Original file name recorded in provenance.
    #[arg(long = "original-name")]
    pub original_name: Option<String>,

    /// File type recorded in provenance.
    #[arg(long = "file-type")]
    pub file_type: Option<String>,

    /// Original file size in bytes.
    #[arg(long, default_value_t = 0)]
    pub size: u64,

    /// Uploader recorded in provenance.
    #[arg(long = "uploaded-by")]
    pub uploaded_by: Option<String>,
}

#[derive(Parser)]
pub struct ImportArgs {
    /// Target entity type.
    pub entity: String,

    /// CSV file.
    pub file: PathBuf,

    /// Explicit mapping as JSON.
    #[arg(long)]
    pub mapping: Option<String>,
}

#[derive(Parser)]
pub struct ExportArgs {
    /// Entity type to export.
    pub entity: String,

    /// Output format: json or csv.
    #[arg(long)]
    pub format: Option<String>,

    /// Write to a file instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ExtractArgs {
    /// Text file to extract from.
    pub file: PathBuf,

    /// Target field names (comma separated).
    #[arg(long, value_delimiter = ',', required_unless_present = "entity")]
    pub fields: Vec<String>,

    /// Use the schema fields of this entity as targets.
    #[arg(long)]
    pub entity: Option<String>,
}

#[derive(Parser)]
pub struct HistoryArgs {
    /// Maximum number of entries.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// 按扩展名推断媒体类型（未知一律按 CSV）
pub fn infer_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "xlsb" => "application/vnd.ms-excel.sheet.binary.macroEnabled.12",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        _ => "text/csv",
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("读取文件失败: {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// confirm 输入: 记录数组，或整个预览结果（取 fullData）
fn extract_records_json(raw: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(raw).context("记录文件不是合法 JSON")?;
    let records = match value {
        serde_json::Value::Object(mut map) => map
            .remove("fullData")
            .context("JSON 对象中缺少 fullData")?,
        other => other,
    };
    Ok(records.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 执行命令
pub async fn run(cli: Cli) -> Result<()> {
    let db_path = cli
        .db_path
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(crate::app::get_default_db_path);

    let state = AppState::new(db_path)
        .await
        .map_err(anyhow::Error::msg)?;
    let api = state.import_api.clone();

    match cli.command {
        Command::Preview(args) => {
            let bytes = read_bytes(&args.file)?;
            let media_type = args
                .media_type
                .unwrap_or_else(|| infer_media_type(&args.file).to_string());
            let result = api
                .preview(
                    &args.entity,
                    &bytes,
                    &media_type,
                    args.mapping.as_deref(),
                    args.transforms.as_deref(),
                )
                .await?;
            print_json(&result)
        }
        Command::Confirm(args) => {
            let raw = std::fs::read_to_string(&args.records)
                .with_context(|| format!("读取文件失败: {}", args.records.display()))?;
            let records_json = extract_records_json(&raw)?;
            let file_info = FileInfo {
                original_name: args
                    .original_name
                    .unwrap_or_else(|| file_name(&args.records)),
                size: args.size,
                file_type: args.file_type.unwrap_or_else(|| "json".to_string()),
                uploaded_by: args.uploaded_by,
            };
            let outcome = api.confirm_json(&args.entity, &records_json, file_info).await?;
            print_json(&outcome)
        }
        Command::Import(args) => {
            let bytes = read_bytes(&args.file)?;
            let outcome = api
                .import_direct(&args.entity, &bytes, args.mapping.as_deref())
                .await?;
            print_json(&outcome)
        }
        Command::Export(args) => {
            let output = api.export(&args.entity, args.format.as_deref()).await?;
            match args.output {
                Some(path) => std::fs::write(&path, output)
                    .with_context(|| format!("写入文件失败: {}", path.display())),
                None => {
                    print!("{}", output);
                    Ok(())
                }
            }
        }
        Command::Extract(args) => {
            let text = std::fs::read_to_string(&args.file)
                .with_context(|| format!("读取文件失败: {}", args.file.display()))?;
            let mut fields = args.fields;
            if let Some(entity) = &args.entity {
                let schema = api
                    .entity_fields(entity)
                    .with_context(|| format!("未知的实体类型: {}", entity))?;
                fields.extend(schema);
            }
            let response = api.extract(&text, &fields).await?;
            print_json(&response)
        }
        Command::History(args) => {
            let history = api.history(args.limit).await?;
            print_json(&history)
        }
        Command::Entities => print_json(&api.entity_types()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_media_type() {
        assert_eq!(infer_media_type(Path::new("people.csv")), "text/csv");
        assert_eq!(infer_media_type(Path::new("people")), "text/csv");
        assert!(infer_media_type(Path::new("People.XLSX")).contains("spreadsheetml"));
        assert_eq!(
            infer_media_type(Path::new("data.ods")),
            "application/vnd.oasis.opendocument.spreadsheet"
        );
    }

    #[test]
    fn test_extract_records_json_accepts_preview() {
        let preview = r#"{"entityType":"module","totalRows":1,"preview":[],"fullData":[{"title":"A"}]}"#;
        assert_eq!(extract_records_json(preview).unwrap(), r#"[{"title":"A"}]"#);
        assert_eq!(extract_records_json(r#"[{"title":"B"}]"#).unwrap(), r#"[{"title":"B"}]"#);
        assert!(extract_records_json(r#"{"title":"B"}"#).is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "tabular-import",
            "--db",
            "x.db",
            "preview",
            "participant",
            "people.csv",
            "--mapping",
            r#"{"Mail":"email"}"#,
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Preview(ref a) if a.entity == "participant"));

        let cli = Cli::try_parse_from(["tabular-import", "extract", "notes.txt", "--fields", "firstName,email"])
            .unwrap();
        match cli.command {
            Command::Extract(args) => assert_eq!(args.fields, vec!["firstName", "email"]),
            _ => panic!("Expected Extract"),
        }
    }
}
