//! Module supporting type-level programming
//!
//! The clock resources in this crate are typestate machines: each resource
//! struct carries a zero-sized state type, and operations that change the
//! hardware state consume the handle and return it in the next state. The
//! state traits are sealed so downstream crates cannot invent states the
//! driver does not know how to leave.

/// Supertrait for typestate traits that must not be implemented outside
/// this crate.
pub trait Sealed {}
