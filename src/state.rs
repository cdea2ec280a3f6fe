//! Shared application state
//!
//! One `AppState` is built per `serve` invocation from the validated
//! configuration and shared across every request via `Arc`. The quota counter
//! and throttle bucket live here: shared mutable admission state is an explicit,
//! injectable object on the request path, not implicit platform state.

use std::sync::Arc;

use crate::admission::{KeyStore, UsagePlan};
use crate::config::GatewayConfig;
use crate::invoke::{FunctionInvoker, HttpFunctionInvoker};

pub struct AppState {
    pub config: GatewayConfig,
    pub key_store: KeyStore,
    pub plan: UsagePlan,
    pub invoker: Arc<dyn FunctionInvoker>,
}

impl AppState {
    /// Build state with the production HTTP invoker.
    pub fn new(config: GatewayConfig) -> Self {
        let invoker = Arc::new(HttpFunctionInvoker::from_config(&config.function));
        Self::with_invoker(config, invoker)
    }

    /// Build state with a caller-supplied invoker (tests inject fakes here).
    pub fn with_invoker(config: GatewayConfig, invoker: Arc<dyn FunctionInvoker>) -> Self {
        let key_store = KeyStore::from_config(&config);
        let plan = UsagePlan::from_config(config.active_plan.clone(), &config.plan);
        Self {
            config,
            key_store,
            plan,
            invoker,
        }
    }
}
