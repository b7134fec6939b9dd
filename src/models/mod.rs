//! Data models for the dispatch backend.
//!
//! Wire names follow the vehicle and rider clients (snake_case JSON).

mod account;
mod chair;
mod notification;
mod ride;

pub use account::*;
pub use chair::*;
pub use notification::*;
pub use ride::*;
