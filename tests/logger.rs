// Runs in its own test binary: init_logger installs the global tracing
// dispatcher, which must not leak into the unit test process where
// #[traced_test] manages the dispatcher itself.

use kube_netcheck::logger::init_logger;

#[test]
fn test_init_logger_is_idempotent() {
    init_logger();
    init_logger();
}

#[test]
fn test_logging_after_init_does_not_panic() {
    init_logger();
    tracing::info!("logger smoke check");
}
