use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable stop request observed by the scan loop at every tick boundary.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the scan loop to stop. Safe to call from a signal handler thread.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::StopSignal;

    #[test]
    fn clones_share_the_flag() {
        let signal = StopSignal::new();
        let handler = signal.clone();
        assert!(!signal.is_stopped());
        std::thread::spawn(move || handler.stop())
            .join()
            .expect("join");
        assert!(signal.is_stopped());
    }
}
