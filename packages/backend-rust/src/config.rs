use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use flashcard_algo::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Rejection-sampling budget per selection, at least 1.
    pub selection_max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let selection_max_attempts = std::env::var("SELECTION_MAX_ATTEMPTS")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .max(1);

        Self {
            host,
            port,
            log_level,
            selection_max_attempts,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            log_level: "info".to_string(),
            selection_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}
