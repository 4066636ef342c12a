use clap::Parser;
use get_cloudify::cli::Cli;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    // 执行命令，失败时以错误对应的退出码结束
    if let Err(err) = cli.execute().await {
        tracing::error!("{}", err);
        tracing::debug!("Exiting with {} ({})", err.exit_code(), err.status());
        std::process::exit(err.exit_code());
    }
}
