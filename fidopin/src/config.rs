//! Session configuration
//!
//! # Example
//!
//! ```
//! use fidopin::{PinProtocol, SessionConfig};
//! use std::time::Duration;
//!
//! let config = SessionConfig::builder()
//!     .protocol(PinProtocol::V2)
//!     .timeout(Duration::from_secs(10))
//!     .build();
//! assert_eq!(config.protocol, Some(PinProtocol::V2));
//! ```

use crate::client_pin::PinProtocol;

use std::time::Duration;

/// Default bound on a single authenticator command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Settings for one PIN-change session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Preferred PIN/UV auth protocol; negotiated from getInfo when unset
    pub protocol: Option<PinProtocol>,

    /// Per-command timeout, enforced by the transport
    pub timeout: Duration,

    /// 1-based device index; skips the selection prompt when set
    pub device: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol: None,
            timeout: DEFAULT_TIMEOUT,
            device: None,
        }
    }
}

impl SessionConfig {
    /// Create a new builder for constructing configuration
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }
}

/// Builder for [`SessionConfig`]
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Prefer a PIN/UV auth protocol when the device advertises it
    pub fn protocol(mut self, protocol: PinProtocol) -> Self {
        self.config.protocol = Some(protocol);
        self
    }

    /// Set the per-command timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Select a device by 1-based index instead of prompting
    pub fn device(mut self, index: usize) -> Self {
        self.config.device = Some(index);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
