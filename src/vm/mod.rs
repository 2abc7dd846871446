//! The virtual machine: a light stack-based interpreter for
//! compiled chunks, plus the runtime error type it raises.

pub mod trace;
pub mod vm;
