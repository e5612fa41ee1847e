#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for `FerroProxy`
//!
//! These tests run a real proxy on loopback ports against hand-written
//! upstream servers.

mod firewall_test;
mod forward_test;
mod plugin_test;
mod tunnel_test;
