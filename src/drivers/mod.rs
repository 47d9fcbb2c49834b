//! Built-in drivers.
//!
//! This crate ships exactly one: [`c::CDriver`], a minimal worked example
//! of the [`crate::driver::Driver`] trait. It is deliberately thin — its
//! compiler invocation is fixed to a bare `cc -c`/`cc -o` command line, not
//! a configurable toolchain (flags beyond `cflags`/`ldflags` passthrough
//! are out of scope, per spec.md).

pub mod c;
