//! CleanPay laundry room integration module
//!
//! - `client`: API client (login, room status, machine details)
//! - `coordinator`: Latest snapshot + refresh for one entry
//! - `sync`: Background refresh schedule
//! - `manager`: Config entry lifecycle

pub mod client;
pub mod coordinator;
pub mod manager;
pub mod sync;

#[cfg(test)]
pub mod testing;

pub use client::CleanPayClient;
pub use manager::EntryManager;
