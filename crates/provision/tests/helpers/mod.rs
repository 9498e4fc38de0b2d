pub mod fake_identity;

use tenantseed::retry::RetryPolicy;
use tenantseed::reconciler::ReconcilerConfig;

/// Reconciler settings with no backoff so retry tests run instantly
pub fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        create_retry: RetryPolicy::immediate(3),
        ..Default::default()
    }
}
