//! Process-wide external bus handle.
//!
//! Deployments that want one bus per process install it here once; the
//! first configuration wins and re-installation is a logged no-op. The
//! preferred wiring remains an explicitly passed `Arc<ExternalBus>`;
//! this handle exists for hosts that cannot thread one through.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::warn;

// Layer 3: Internal module imports
use super::service::ExternalBus;

static PROCESS_BUS: Mutex<Option<Arc<ExternalBus>>> = Mutex::new(None);

/// Install the process-wide bus.
///
/// The first call wins; later calls keep the existing instance, log a
/// warning, and return it unchanged. Silent reconfiguration is
/// prohibited by design.
pub fn install(bus: ExternalBus) -> Arc<ExternalBus> {
    let mut guard = PROCESS_BUS.lock();
    match guard.as_ref() {
        Some(existing) => {
            warn!("external bus already installed, keeping the first configuration");
            Arc::clone(existing)
        }
        None => {
            let bus = Arc::new(bus);
            *guard = Some(Arc::clone(&bus));
            bus
        }
    }
}

/// The installed bus, if any.
pub fn installed() -> Option<Arc<ExternalBus>> {
    PROCESS_BUS.lock().as_ref().map(Arc::clone)
}

/// Drop the installed bus. For tests.
///
/// Producers shut down when the last `Arc` to the bus is released.
pub fn reset() {
    *PROCESS_BUS.lock() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::InMemoryMessageProducer;

    // One test exercises the whole lifecycle; the handle is process
    // state and parallel tests would race each other.
    #[test]
    fn test_install_reset_lifecycle() {
        reset();
        assert!(installed().is_none());

        let first = install(
            ExternalBus::builder()
                .with_producer(Arc::new(InMemoryMessageProducer::new()))
                .build(),
        );
        assert!(installed().is_some());

        // Re-install keeps the first configuration
        let second = install(ExternalBus::builder().build());
        assert!(Arc::ptr_eq(&first, &second));

        reset();
        assert!(installed().is_none());
    }
}
