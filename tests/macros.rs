//! Common test macros.

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per test binary.
///
/// # Usage
/// ```
/// init_tracing!();
/// ```
#[macro_export]
macro_rules! init_tracing {
    () => {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    };
}

/// Check the rejection count recorded for one category and step.
///
/// # Usage
/// ```
/// assert_rejected!(stats, IgnoreRow, "unique(id)", 2);
/// ```
#[macro_export]
macro_rules! assert_rejected {
    ($stats:expr, $category:ident, $step:expr, $expected:expr) => {
        rowflow::testing::assert_rejections(
            &$stats,
            rowflow::RejectionCategory::$category,
            $step,
            $expected,
        )
    };
}
