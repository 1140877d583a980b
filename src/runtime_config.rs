//! Environment-variable runtime configuration.
//!
//! `RESTMOUNT_STACK_SIZE` sets the stack size for connection-serving
//! coroutines, in decimal (`65536`) or hexadecimal (`0x10000`) bytes.
//! Default: `0x10000` (64 KB) — the whole dispatch path (routing, argument
//! coercion, method invocation) runs on these stacks. Total memory scales
//! with `stack_size × concurrent_connections`, so tune it to method
//! complexity. Applied by [`crate::server::HttpServer::start`].

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables at startup.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = match env::var("RESTMOUNT_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(DEFAULT_STACK_SIZE)
                } else {
                    val.parse().unwrap_or(DEFAULT_STACK_SIZE)
                }
            }
            Err(_) => DEFAULT_STACK_SIZE,
        };
        RuntimeConfig { stack_size }
    }
}
