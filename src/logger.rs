//! Logger bootstrap.
//!
//! The crate logs through the `log` facade only; this helper wires up
//! `env_logger` for binaries and tests that want output on a terminal.
//! Hosts with their own logging setup can skip it entirely.

pub fn init() {
    env_logger::init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init() {
        // A second init from another test would panic, so use try_init here.
        let _ = env_logger::builder().is_test(true).try_init();

        log::warn!("Test warning message");
        log::info!("Test info message");
        log::debug!("Test debug message");
        log::trace!("Test trace message");
    }
}
