use anyhow::Context;
use eth_tx_lifecycle::config::Config;
use eth_tx_lifecycle::log_info;
use eth_tx_lifecycle::startup::Application;
use eth_tx_lifecycle::utils::logger::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志（全局只需调用一次）
    init_logger();

    log_info!("Starting application initialization...");

    // 1. 加载配置
    let config = Config::load().context("Failed to load application configuration")?;

    // 2. 构建应用实例（provider / signer / store）
    let application = Application::build(config)
        .await
        .context("Application building failed (provider/signer initialization)")?;

    log_info!("Application build complete. Starting session.");

    // 3. 运行会话直到收到退出信号
    application
        .run()
        .await
        .context("Application core service failed during runtime")?;

    Ok(())
}
