//! DBML compiler front-end.
//!
//! Source text flows through the lexer, the parser (a full-fidelity arena
//! syntax tree), the analyzer (validation and name binding over scoped
//! symbol tables) and the interpreter, which produces the plain `Database`
//! model. `Compiler` memoises all of it for editor services.

pub mod analyzer;
pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use compiler::{
    compile, compile_with, parse_with_format, CompileResult, Compiler, CompletionItem,
    CompletionKind, DialectImporter, Hover, ImporterRegistry, InputFormat,
};
pub use config::CompilerConfig;
pub use error::{CompileError, CompileErrorCode, DbmlError, DbmlResult, Report, WireError};
pub use interpreter::Database;
