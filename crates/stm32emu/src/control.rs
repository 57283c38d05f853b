//! Emulator control service.
//!
//! Devices never stop the CPU themselves. They post a request through
//! [`SystemControl`] and the run loop acts on it once the current MMIO
//! callback has returned.

use tracing::info;

/// Operations a device may invoke on the emulator that hosts it.
pub trait SystemControl {
    /// Ask the emulator to shut the whole machine down.
    fn request_shutdown(&mut self, source: &'static str);
}

/// Pending shutdown bookkeeping shared by the bus and the run loop
#[derive(Debug, Default)]
pub struct EmulatorControl {
    shutdown_requests: usize,
    last_source: Option<&'static str>,
}

impl EmulatorControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any shutdown request is pending
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requests > 0
    }

    /// Number of shutdown requests since construction or the last [`clear`](Self::clear)
    pub fn shutdown_requests(&self) -> usize {
        self.shutdown_requests
    }

    /// Name of the device that issued the most recent request
    pub fn last_source(&self) -> Option<&'static str> {
        self.last_source
    }

    /// Drop any pending request. Called on system reset.
    pub fn clear(&mut self) {
        self.shutdown_requests = 0;
        self.last_source = None;
    }
}

impl SystemControl for EmulatorControl {
    fn request_shutdown(&mut self, source: &'static str) {
        if self.shutdown_requests == 0 {
            info!("Shutdown requested by {}", source);
        }
        self.shutdown_requests += 1;
        self.last_source = Some(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_without_pending_request() {
        let ctl = EmulatorControl::new();
        assert!(!ctl.shutdown_requested());
        assert_eq!(ctl.shutdown_requests(), 0);
        assert_eq!(ctl.last_source(), None);
    }

    #[test]
    fn counts_requests_until_cleared() {
        let mut ctl = EmulatorControl::new();
        ctl.request_shutdown("a");
        ctl.request_shutdown("b");
        assert!(ctl.shutdown_requested());
        assert_eq!(ctl.shutdown_requests(), 2);
        assert_eq!(ctl.last_source(), Some("b"));

        ctl.clear();
        assert!(!ctl.shutdown_requested());
        assert_eq!(ctl.last_source(), None);
    }
}
