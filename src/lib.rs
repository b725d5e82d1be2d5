//! An embeddable interpreter for a JavaScript-like language.
//!
//! Source text is lexed and parsed into an AST, which the [`Interpreter`]
//! walks directly. Generators and async functions suspend by keeping their
//! evaluation state on an explicit stack, so no host thread blocks.

pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;
mod stack;
pub mod types;

pub use interpreter::{EngineError, Interpreter, InterpreterOptions};
pub use parser::{ParseError, parse};
pub use types::JsValue;
