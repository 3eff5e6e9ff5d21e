use std::sync::atomic::{AtomicBool, Ordering};

/// Global readiness flag, set once configuration is loaded and the gateway
/// listeners have been built.
static GATEWAY_READY: AtomicBool = AtomicBool::new(false);

/// Mark the gateway as ready to accept registrations and MIX requests.
pub fn mark_ready(listeners: usize) {
    GATEWAY_READY.store(true, Ordering::SeqCst);
    log::info!("Gateway ready with {listeners} listener(s)");
}

/// Check if the gateway is ready to handle traffic.
pub fn is_ready() -> bool {
    GATEWAY_READY.load(Ordering::SeqCst)
}

/// Reset readiness status (useful for testing)
#[allow(dead_code)]
pub fn reset() {
    GATEWAY_READY.store(false, Ordering::SeqCst);
    log::debug!("Readiness status reset");
}
