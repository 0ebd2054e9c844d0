//! Request handlers.

pub mod health;
pub mod identity;
pub mod media;
pub mod posts;
pub mod proxy;
pub mod search;
