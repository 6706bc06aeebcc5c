//! FinTS 3.0 PIN/TAN implementation of `BankSource`

mod client;
mod codec;
mod message;
mod mt940;
mod response;
mod segments;

pub use client::{FinTsClient, FinTsConfig};
