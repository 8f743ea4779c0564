//! Unit tests for connection-related types.
//!
//! Full session behaviour is covered by `session_integration.rs` over an
//! in-memory transport. This file tests the public types and error handling.

use cobalt_stomp::{AckMode, ConnError, ConnectionState, ProtocolError, SessionPhase};
use std::io;

// =============================================================================
// AckMode Tests
// =============================================================================

#[test]
fn ack_mode_wire_values() {
    assert_eq!(AckMode::Auto.as_str(), "auto");
    assert_eq!(AckMode::Client.as_str(), "client");
    assert_eq!(AckMode::ClientIndividual.as_str(), "client-individual");
}

#[test]
fn ack_mode_default_is_auto() {
    assert_eq!(AckMode::default(), AckMode::Auto);
}

#[test]
fn ack_mode_parse() {
    assert_eq!("client".parse::<AckMode>(), Ok(AckMode::Client));
    assert_eq!(
        "client-individual".parse::<AckMode>(),
        Ok(AckMode::ClientIndividual)
    );
    assert!("sometimes".parse::<AckMode>().is_err());
}

#[test]
fn ack_mode_display_matches_wire() {
    assert_eq!(format!("{}", AckMode::ClientIndividual), "client-individual");
}

// =============================================================================
// ConnError Tests
// =============================================================================

#[test]
fn conn_error_io_display() {
    let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
    let conn_err = ConnError::Io(io_err);
    let display = format!("{}", conn_err);
    assert!(display.contains("io error"));
    assert!(display.contains("connection refused"));
}

#[test]
fn conn_error_protocol_from() {
    let conn_err: ConnError = ProtocolError::EmptyFrame.into();
    let display = format!("{}", conn_err);
    assert!(display.contains("protocol error"));
    assert!(display.contains("empty frame"));
}

#[test]
fn conn_error_io_from() {
    let io_err = io::Error::new(io::ErrorKind::TimedOut, "timeout");
    let conn_err: ConnError = io_err.into();
    match conn_err {
        ConnError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
        _ => panic!("expected Io variant"),
    }
}

#[test]
fn conn_error_missing_header_names_header() {
    let display = format!("{}", ConnError::MissingHeader("message-id"));
    assert!(display.contains("message-id"));
}

#[test]
fn conn_error_is_error_trait() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
    assert_error::<ConnError>();
}

// =============================================================================
// ConnectionState Tests
// =============================================================================

#[test]
fn connection_state_default_is_disconnected() {
    let state = ConnectionState::default();
    assert_eq!(state.phase, SessionPhase::Disconnected);
    assert!(!state.connected);
    assert!(!state.disconnecting);
    assert_eq!(state.reconnect_attempts, 0);
    assert!(state.heartbeat_interval.is_none());
    assert!(state.disconnected_at.is_none());
    assert!(!state.reconnect_pending);
}
