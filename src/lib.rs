//! Cortex chat library exports for testing

pub mod core;
pub mod cortex;
pub mod tui;

#[cfg(test)]
pub mod test_support;
