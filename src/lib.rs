//! uinav library exports for testing

pub mod assets;
pub mod core;
pub mod driver;
pub mod transition;

#[cfg(test)]
pub mod test_support;
