//! Label printing
//!
//! - Template substitution (`$name` placeholders)
//! - One label per configured title
//! - Submission to the spooler on a worker task

pub mod dispatcher;
pub mod renderer;
pub mod template;
pub mod types;
pub mod worker;

pub use dispatcher::PrintDispatcher;
pub use renderer::LabelRenderer;
pub use template::{LabelTemplate, TemplateCache};
pub use types::*;
pub use worker::{PrintQueue, PrintWorker};
