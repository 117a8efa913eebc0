use anyhow::Context;
use clap::Parser;
use label_kiosk::core::config::DestinationConfig;
use label_kiosk::core::{BackgroundTasks, TaskKind};
use label_kiosk::scanning::{LineReader, LineSource, open_serial, run_line_reader};
use label_kiosk::{
    Config, Heartbeat, Kiosk, LabelRenderer, LabelTemplate, PrintDispatcher, PrintQueue,
    PrintWorker, ScanAssembler, init_logger_with_file, print_banner,
};
use std::path::PathBuf;

/// Barcode scanner to label printer kiosk
#[derive(Debug, Parser)]
#[command(name = "label-kiosk", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "KIOSK_CONFIG", default_value = "kiosk.toml")]
    config: PathBuf,

    /// Write labels into DIR instead of sending them to a printer
    #[arg(long, value_name = "DIR")]
    dry_run: Option<PathBuf>,

    /// Validate configuration and template, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 配置, 日志)
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(dir) = cli.dry_run {
        config.printer.destination = DestinationConfig::Directory { path: dir };
    }

    init_logger_with_file(
        &config.logging.level,
        config.logging.json,
        config.logging.dir.as_deref(),
    )?;

    if cli.check {
        ScanAssembler::from_config(&config.barcode, config.scanner.reset_timeout())?;
        LabelTemplate::load(&config.label.template)?;
        println!("Configuration OK: {}", cli.config.display());
        return Ok(());
    }

    print_banner();
    tracing::info!("Label kiosk starting...");
    tracing::debug!(?config, "Effective configuration");

    // 2. 打印与扫码组件
    let dispatcher = PrintDispatcher::from_config(&config.printer)?;
    let port = open_serial(
        &config.scanner.port,
        config.scanner.baud_rate,
        config.scanner.timeout(),
    )?;

    let (print_queue, batch_rx) = PrintQueue::channel();
    // Opened after the scanner so a missing scanner never arms the watchdog
    let heartbeat = Heartbeat::open(config.watchdog.path.as_deref());
    let mut kiosk = Kiosk::new(&config, LabelRenderer::for_this_host(), heartbeat, print_queue)?;

    // 3. 后台任务
    let mut tasks = BackgroundTasks::new();
    let shutdown = tasks.shutdown_token();

    let (line_tx, source) = LineSource::channel();
    let reader = LineReader::new(port, config.scanner.port.clone());
    let reader_token = shutdown.clone();
    tasks.spawn_blocking("scanner_reader", move || {
        run_line_reader(reader, line_tx, reader_token)
    });
    tasks.spawn(
        "print_worker",
        TaskKind::Worker,
        PrintWorker::new(dispatcher).run(batch_rx, shutdown.clone()),
    );
    tasks.log_summary();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    // 4. 控制循环
    let result = kiosk.run(source, shutdown).await;
    tasks.shutdown().await;

    if let Err(e) = result {
        tracing::error!("Kiosk stopped: {}", e);
        return Err(e.into());
    }

    tracing::info!("Label kiosk stopped");
    Ok(())
}

/// Graceful shutdown handler
///
/// Listens for SIGTERM and Ctrl+C signals
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
