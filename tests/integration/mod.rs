//! Integration tests for the broadside protocol and relay
//!
//! These tests run complete matches between two orchestrators and drive
//! real sockets through the relay.


// Recovery after lost messages
pub mod resync;

// Relay server over TCP
pub mod relay_server;
