//! Request routing.

pub mod dispatch;
