//! Label Kiosk - 扫码打印一体机控制程序
//!
//! # 架构概述
//!
//! Reads decoded barcodes from a serial scanner, joins an optional prefix
//! scan with the following body scan, renders the label template once per
//! configured title and hands the labels to the printer. A hardware
//! watchdog is fed on every loop tick.
//!
//! # 模块结构
//!
//! ```text
//! label-kiosk/src/
//! ├── core/          # 配置、错误、控制循环、后台任务
//! ├── scanning/      # 串口读取、防抖、前缀/主体组装
//! ├── printing/      # 模板、渲染、打印提交
//! ├── watchdog.rs    # 看门狗心跳
//! └── utils/         # 日志
//! ```

pub mod core;
pub mod printing;
pub mod scanning;
pub mod utils;
pub mod watchdog;

// Re-export 公共类型
pub use core::{Config, ConfigError, Kiosk, ScanOutcome};
pub use printing::{LabelRenderer, LabelTemplate, PrintDispatcher, PrintQueue, PrintWorker};
pub use scanning::{CompositeCode, ScanAssembler, ScanEvent, Symbology};
pub use watchdog::Heartbeat;

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    __          __         __   __ __ _            __
   / /   ____ _/ /_  ___  / /  / //_/(_)___  _____/ /__
  / /   / __ `/ __ \/ _ \/ /  / ,<  / / __ \/ ___/ //_/
 / /___/ /_/ / /_/ /  __/ /  / /| |/ / /_/ (__  ) ,<
/_____/\__,_/_.___/\___/_/  /_/ |_/_/\____/____/_/|_|
    "#
    );
}
