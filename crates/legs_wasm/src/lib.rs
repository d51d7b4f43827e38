//! WASM bindings for `legs_core`.
//!
//! User equations are compiled into an autodiff-backed field, and a runner is
//! advanced from JavaScript in batches so the host page can stay responsive.

mod runner;
mod system;

pub use runner::WasmLegsRunner;
