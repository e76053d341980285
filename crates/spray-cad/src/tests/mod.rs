//! Test suites for the CAD helpers.

mod conversion_behaviour;
pub(crate) mod support;
