//! 核心模块：配置、错误、控制循环、后台任务

pub mod config;
pub mod error;
pub mod kiosk;
pub mod tasks;

pub use config::{Config, ConfigError};
pub use error::{ClassifyError, DeviceError, DispatchError, RenderError, WatchdogError};
pub use kiosk::{Kiosk, ScanOutcome};
pub use tasks::{BackgroundTasks, TaskKind};
