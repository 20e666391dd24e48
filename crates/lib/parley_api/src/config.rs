//! API server configuration.

/// Default listen address, matching the port the web client expects.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Default origin of the web client dev server.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:4200";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// Browser origin allowed to call the API; `*` allows any origin.
    pub cors_origin: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            cors_origin: DEFAULT_CORS_ORIGIN.into(),
        }
    }
}
