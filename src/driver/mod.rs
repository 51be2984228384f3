pub mod mcp;
#[cfg(test)]
pub mod mock;
pub mod traits;

use crate::utils::config::{Config, ServerConfig};
use std::time::Duration;
use traits::AutomationSession;

pub use traits::{RawToolResult, ToolContent, TransportError};

/// Build an unconnected session for the configured automation server
pub fn open_session(config: &Config) -> Box<dyn AutomationSession> {
    let timeout = Duration::from_millis(config.invoke_timeout_ms);
    match &config.server {
        ServerConfig::Stdio { command, args } => {
            Box::new(mcp::StdioSession::new(command, args, timeout))
        }
        ServerConfig::Http { url } => Box::new(mcp::HttpSession::new(url, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_session_follows_config() {
        let mut config = Config::default();
        let session = open_session(&config);
        assert!(session.endpoint().starts_with("npx @playwright/mcp"));
        assert!(!session.is_connected());

        config.server = ServerConfig::Http {
            url: "http://localhost:8931/mcp".to_string(),
        };
        assert_eq!(open_session(&config).endpoint(), "http://localhost:8931/mcp");
    }
}
