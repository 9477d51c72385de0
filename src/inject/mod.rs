//! Content-script injection
//!
//! Matches navigated URLs against manifest rules and injects CSS/JS.

mod injector;
mod manifest;

pub use injector::{InjectionReport, ScriptInjector};
pub use manifest::{compile_glob, Manifest, ScriptInjectionRule};
