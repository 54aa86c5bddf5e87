//! Tracing bootstrap for binaries and tests that want engine logs.

use tracing_subscriber::EnvFilter;

/// Install an env-filtered fmt subscriber as the global default.
///
/// Does nothing when a dispatcher is already set, so embedding
/// applications keep their own subscriber and repeated calls from test
/// setup are harmless.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
