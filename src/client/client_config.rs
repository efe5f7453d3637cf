use std::time::Duration;

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// How the client tries to fill gaps after a stream ended with missing sequence numbers
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecoveryStrategy {
    /// reconnect and request the full stream again, collecting duplicates along the way
    Restream,
    /// reconnect and request each missing sequence number individually, waiting at most
    ///  `response_timeout` for each response
    ResendMissing { response_timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,

    /// number of reconnects after the initial connection before the session gives up
    pub max_reconnect_attempts: u32,
    pub reconnect_interval: Duration,

    /// upper bound for the number of bytes read from the transport in one go
    pub read_buffer_size: usize,
    pub recovery_strategy: RecoveryStrategy,
    /// upper bound for resend requests per reconnect with [RecoveryStrategy::ResendMissing]
    pub max_resend_requests: usize,
}

impl ClientConfig {
    pub fn new(server_host: impl Into<String>, server_port: u16) -> ClientConfig {
        ClientConfig {
            server_host: server_host.into(),
            server_port,
            max_reconnect_attempts: 5,
            reconnect_interval: Duration::from_millis(1000),
            read_buffer_size: 4096,
            recovery_strategy: RecoveryStrategy::Restream,
            max_resend_requests: 1000,
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new(DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_interval, Duration::from_secs(1));
        assert_eq!(config.recovery_strategy, RecoveryStrategy::Restream);
        assert_eq!(config.max_resend_requests, 1000);
    }
}
