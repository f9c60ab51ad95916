/// In debug builds, panics just like `debug_assert!`.
/// In release builds, logs an error via `tracing::error!` instead of
/// aborting a process that is driving hardware to a known state.
#[macro_export]
macro_rules! safe_assert {
    ($cond:expr $(,)?) => {
        #[cfg(debug_assertions)]
        {
            debug_assert!($cond);
        }
        #[cfg(not(debug_assertions))]
        {
            if !$cond {
                tracing::error!("ASSERT FAILED: {}", stringify!($cond));
            }
        }
    };
}
