//! Wire and domain types shared by the reel controller and its front-ends.

pub mod domain;
pub mod error;
pub mod protocol;
