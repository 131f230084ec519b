//! Tipping-portal access: authenticated session, tip-sheet fetches, and
//! form submission with read-back verification.

pub mod client;

pub use client::PortalClient;
