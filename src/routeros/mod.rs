//! Minimal client for the RouterOS management API (plain TCP, port 8728).

mod client;
mod codec;

pub(crate) use client::{ApiConnection, Row};
