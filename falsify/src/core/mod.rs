//! Core data types.
//!
//! 1. Expression tree nodes for STL requirements (see [`expr`]).
//! 2. Discrete-time signals produced by the robustness engine (see [`signals`]).
//! 3. Input/output traces collected from the system under test (see [`trace`]).

pub mod expr;
pub mod signals;
pub mod trace;

pub use expr::*;
pub use signals::Signal;
pub use trace::IoTrace;
