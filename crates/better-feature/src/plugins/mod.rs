// Built-in plugins, each behind a Cargo feature (both on by default).

#[cfg(feature = "plugin-tester")]
pub mod tester;

#[cfg(feature = "plugin-membership")]
pub mod membership;
