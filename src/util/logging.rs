//! # Frame Logging Utilities
//!
//! Hex dumps of raw telegrams and rate limiting for repetitive warnings.
//!
//! Components that touch the wire receive a [`FrameTrace`] at construction
//! instead of consulting a process-wide debug switch, so one transport can be
//! traced while another stays quiet.
//!
//! ```rust
//! use metering_rs::util::logging::{FrameTrace, LogThrottle};
//!
//! let trace = FrameTrace::new("mbus", true);
//! trace.frame("TX short", &[0x10, 0x5B, 0xFD, 0x58, 0x16]);
//!
//! let mut throttle = LogThrottle::new(1000, 5);
//! if throttle.allow() {
//!     log::warn!("SML message discarded");
//! }
//! ```

use std::time::Instant;

/// Upper bound on bytes rendered per dump
const MAX_LOG_BYTES: usize = 64;

/// Log frame data in hex format at debug level.
pub fn log_frame_hex(target: &str, prefix: &str, data: &[u8]) {
    let shown = &data[..data.len().min(MAX_LOG_BYTES)];
    let hex_str = crate::util::hex::format_hex_compact(shown);
    let suffix = if data.len() > MAX_LOG_BYTES {
        format!(" ... ({} bytes total)", data.len())
    } else {
        String::new()
    };

    log::debug!(target: target, "{prefix}: {hex_str}{suffix}");
}

/// Per-component switch for wire-level hex dumps.
#[derive(Debug, Clone)]
pub struct FrameTrace {
    target: &'static str,
    enabled: bool,
}

impl FrameTrace {
    pub fn new(target: &'static str, enabled: bool) -> Self {
        Self { target, enabled }
    }

    pub fn disabled(target: &'static str) -> Self {
        Self::new(target, false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Dump a complete frame.
    pub fn frame(&self, prefix: &str, data: &[u8]) {
        if self.enabled {
            log_frame_hex(self.target, prefix, data);
        }
    }

    /// Note a single unexpected byte.
    pub fn byte(&self, prefix: &str, byte: u8) {
        if self.enabled {
            log::debug!(target: self.target, "{prefix}: 0x{byte:02X}");
        }
    }
}

/// Throttling structure for rate-limiting log messages
///
/// A meter pushing a corrupted telegram every second would otherwise flood
/// the log with identical warnings.
#[derive(Debug)]
pub struct LogThrottle {
    window_ms: u64,
    cap: u32,
    count: u32,
    suppressed: u32,
    t0: Instant,
}

impl LogThrottle {
    /// Allow at most `cap` messages per `window_ms`.
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            suppressed: 0,
            t0: Instant::now(),
        }
    }

    /// Returns `true` if the message should be logged.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.t0).as_millis() as u64 > self.window_ms {
            self.t0 = now;
            self.count = 0;
        }

        self.count += 1;
        let allowed = self.count <= self.cap;
        if !allowed {
            self.suppressed += 1;
        }
        allowed
    }

    /// Messages swallowed since creation.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    pub fn reset(&mut self) {
        self.t0 = Instant::now();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_throttle_basic() {
        let mut throttle = LogThrottle::new(60_000, 3);

        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(throttle.allow());

        assert!(!throttle.allow());
        assert!(!throttle.allow());
        assert_eq!(throttle.suppressed(), 2);
    }

    #[test]
    fn test_log_throttle_reset() {
        let mut throttle = LogThrottle::new(60_000, 1);
        assert!(throttle.allow());
        assert!(!throttle.allow());

        throttle.reset();
        assert!(throttle.allow());
    }

    #[test]
    fn test_frame_trace_switch() {
        let trace = FrameTrace::disabled("test");
        assert!(!trace.is_enabled());
        // Disabled traces must be no-ops, enabled ones must not panic on long input.
        trace.frame("RX", &[0u8; 200]);
        FrameTrace::new("test", true).frame("RX", &[0u8; 200]);
    }
}
