//! Runtime configuration, loaded from environment variables with fallback
//! defaults.

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub idle_socket_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            idle_socket_timeout_secs: std::env::var("IDLE_SOCKET_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        }
    }
}
