//! Global subscriber installation runs in its own test binary so it cannot
//! race other tests that capture logs.

use tracing::Level;
use trackor_qr::logging::{init, OutputFormat, TracingConfig};

#[test]
fn test_init_is_idempotent() {
    let first = TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Compact);
    assert!(init(first).is_ok());
    assert!(init(TracingConfig::default()).is_ok());
    tracing::info!("subscriber installed");
}
