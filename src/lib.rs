//! # Goal
//! The main goal of this library is to keep reference counted values alive
//! while raw pointers derived from them are in use, for example while they are
//! handed to foreign code.
//!
//! The optimizer is allowed to end a value's life right after its last syntactic
//! use, which can be before the last use of a raw pointer into it. Getting that
//! wrong doesn't fail to build, it's a use after free somewhere later.
//!
//! # Features
//! - Scoped extension, through [`with_extended_lifetime`] and [`with_extended_lifetime_of`].
//!      - Responsible for: Is this one known value alive until the operation is done?
//! - Accumulated extension, through [`LifetimeGuard`].
//!      - Responsible for: Are all of the values collected so far alive until discharge?
//! - Misuse detection, through [`misuse`].
//!      - Responsible for: Was the guard discharged? If not, fail loudly.
//!
//! Both extensions end with the same keep-alive, an opaque use of the value that
//! the optimizer can't see through or remove.
//!
//! # Crate features
//! - `panic-on-misuse`: the default misuse path panics instead of aborting the process.

//? Important decisions:
//? - Discharge consumes the guard, so discharging twice or adding after discharge doesn't compile.
//?   Dropping without discharge can't be prevented statically and is checked at runtime.
//? - Guards are single threaded, they aren't Send nor Sync.
//? - Keep-alive isn't exposed, using it correctly requires knowing what the optimizer considers live.

mod guard;
mod keep_alive;
mod scope;

pub mod interop;
pub mod misuse;

pub use guard::{LifetimeGuard, StableDeref};
pub use misuse::DischargeViolation;
pub use scope::{with_extended_lifetime, with_extended_lifetime_of};
