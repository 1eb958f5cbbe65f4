// ==========================================
// 表格数据导入引擎 - 命令行主入口
// ==========================================

use clap::Parser;
use tabular_import::app::cli::{run, Cli, LogFormatArg};
use tabular_import::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日志系统
    match cli.log_format {
        LogFormatArg::Pretty => logging::init(),
        LogFormatArg::Json => logging::init_json(),
    }

    tracing::debug!(version = tabular_import::VERSION, "启动");

    if let Err(error) = run(cli).await {
        tracing::error!(error = %error, "命令执行失败");
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
