//! Shared helpers for `glcx-interop` integration tests.

use std::rc::Rc;

use glcx_interop::driver::SoftDriver;
use glcx_interop::{InteropConfig, InteropContext, RegistrationPolicy};

/// Route `tracing` output through the test harness so diagnostics show up for failing tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn soft_context() -> Rc<InteropContext<SoftDriver>> {
    soft_context_with(RegistrationPolicy::Propagate)
}

pub fn soft_context_with(policy: RegistrationPolicy) -> Rc<InteropContext<SoftDriver>> {
    init_tracing();
    InteropContext::new(
        SoftDriver::new(),
        InteropConfig::default().with_registration_policy(policy),
    )
}

/// `rows` rows of `row_bytes` payload bytes, each followed by `pad` bytes of `0xEE`.
#[allow(dead_code)]
pub fn pitched_rows(rows: usize, row_bytes: usize, pad: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(rows * (row_bytes + pad));
    for row in 0..rows {
        out.extend((0..row_bytes).map(|i| (row * 31 + i) as u8));
        out.extend(std::iter::repeat(0xEE).take(pad));
    }
    out
}

/// The payload of [`pitched_rows`] with padding removed.
#[allow(dead_code)]
pub fn packed_rows(rows: usize, row_bytes: usize) -> Vec<u8> {
    pitched_rows(rows, row_bytes, 0)
}
