pub mod admission;
pub mod config;
pub mod deploy;
pub mod handlers;
pub mod invoke;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use admission::{AdmissionError, ApiKey, KeyStore, UsagePlan};
pub use config::{GatewayConfig, ModelSize};
pub use deploy::{DeployError, DeployResult};
pub use invoke::{FunctionInvoker, InvokeError};
pub use state::AppState;
