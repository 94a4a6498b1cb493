//! Common helpers for the integration tests
#![allow(dead_code)]

use std::sync::Once;

use dbml_parse::{compile, CompileError, CompileResult, Compiler, CompilerConfig};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Set `RUST_LOG=debug`
/// to see pass timings and cache activity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn compile_source(source: &str) -> CompileResult {
    init_tracing();
    compile(source)
}

pub fn compiler_for(source: &str) -> Compiler {
    init_tracing();
    let mut compiler = Compiler::new(CompilerConfig::default());
    compiler.set_source(source);
    compiler
}

pub fn messages(diagnostics: &[CompileError]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.diagnostic.as_str()).collect()
}
