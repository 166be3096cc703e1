//! Wire and domain types shared by the client engine, storage, and tools.

pub mod domain;
pub mod error;
pub mod protocol;
