#![allow(dead_code)]

pub use batchdag_test_utils::{init_tracing, with_timeout};
