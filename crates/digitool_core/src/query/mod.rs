//! Query evaluation and update application.
//!
//! Both are pure functions over in-memory documents. Parsing validates the
//! whole query or update up front, so a malformed request never mutates
//! anything.

mod filter;
mod update;

pub use filter::{Clause, CmpOp, Condition, Filter};
pub use update::Update;
