//! Compiler drivers. The subprocess variant shells out to the configured
//! executable; the in-process variant (behind the `api` feature) drives a
//! SPIR-V code generator loaded into the process.

#[cfg(feature = "api")]
pub mod api;
pub mod exe;
