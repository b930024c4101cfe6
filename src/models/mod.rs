//! Data models for back-office API entities

mod client;
mod company;
mod user;

pub use client::*;
pub use company::*;
pub use user::*;
