pub mod args;
pub mod commands;
pub mod plain;

/// Exit codes for different error conditions
pub mod exit_codes {
    /// Successful execution
    pub const SUCCESS: u8 = 0;
    /// Network/connection error (e.g., host unreachable, reconnects exhausted)
    pub const NETWORK_ERROR: u8 = 1;
    /// Bad command-line arguments
    pub const USAGE_ERROR: u8 = 2;
}
