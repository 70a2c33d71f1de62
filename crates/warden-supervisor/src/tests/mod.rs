//! Test suites for the lifecycle supervisor.

pub(crate) mod support;
