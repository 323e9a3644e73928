//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

pub fn default_realname() -> String {
    "plugbot".to_string()
}

// =============================================================================
// Timing Defaults
// =============================================================================

pub fn default_registration_timeout() -> u64 {
    30
}

pub fn default_ping_interval() -> u64 {
    90
}

pub fn default_ping_timeout() -> u64 {
    120
}

pub fn default_callback_timeout_ms() -> u64 {
    2000
}

pub fn default_max_consecutive_failures() -> u32 {
    5
}

// =============================================================================
// Reconnect Defaults
// =============================================================================

pub fn default_reconnect_delay() -> u64 {
    5
}

pub fn default_reconnect_max_delay() -> u64 {
    300
}

// =============================================================================
// Plugin Defaults
// =============================================================================

pub fn default_greeting() -> String {
    "Welcome, {nick}!".to_string()
}

pub fn default_filter_reason() -> String {
    "Watch your language".to_string()
}
