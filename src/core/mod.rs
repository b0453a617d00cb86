// Public modules
pub mod app;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod gh;
pub mod history;
pub mod invoker;
pub mod logging;
pub mod obscure;
pub mod output;
pub mod permissions;
pub mod session;
pub mod settings;
pub mod store;
pub mod workflow;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use app::App;
pub use error::{Error, ErrorCode, Result};
pub use output::{BatchReport, DispatchResult};
