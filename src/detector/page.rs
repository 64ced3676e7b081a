//! The hosting page as seen by a detector

use crate::protocol::Sender;

/// Page-side facilities a detector depends on
pub trait PageContext: Send {
    /// Liveness of the hosting context; false once the page is torn down
    fn is_valid(&self) -> bool;

    /// Identity attached to every outbound request
    fn sender(&self) -> Sender;

    /// Number of session history entries up to the current one
    fn history_length(&self) -> usize;

    /// Whether a forward history entry exists
    fn can_go_forward(&self) -> bool;

    /// Start delivering pointer events to the detector
    fn add_listeners(&mut self);

    /// Stop delivering pointer events to the detector
    fn remove_listeners(&mut self);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Page whose liveness and history can be changed from a test
    #[derive(Debug, Clone)]
    pub struct TestPage {
        pub sender: Sender,
        pub valid: Arc<AtomicBool>,
        pub history_length: Arc<AtomicUsize>,
        pub forward: Arc<AtomicBool>,
        pub listening: Arc<AtomicBool>,
    }

    impl TestPage {
        pub fn new(url: &str) -> Self {
            Self {
                sender: Sender::new(1, 1, url),
                valid: Arc::new(AtomicBool::new(true)),
                history_length: Arc::new(AtomicUsize::new(2)),
                forward: Arc::new(AtomicBool::new(true)),
                listening: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn invalidate(&self) {
            self.valid.store(false, Ordering::SeqCst);
        }

        pub fn is_listening(&self) -> bool {
            self.listening.load(Ordering::SeqCst)
        }
    }

    impl PageContext for TestPage {
        fn is_valid(&self) -> bool {
            self.valid.load(Ordering::SeqCst)
        }

        fn sender(&self) -> Sender {
            self.sender.clone()
        }

        fn history_length(&self) -> usize {
            self.history_length.load(Ordering::SeqCst)
        }

        fn can_go_forward(&self) -> bool {
            self.forward.load(Ordering::SeqCst)
        }

        fn add_listeners(&mut self) {
            self.listening.store(true, Ordering::SeqCst);
        }

        fn remove_listeners(&mut self) {
            self.listening.store(false, Ordering::SeqCst);
        }
    }
}
