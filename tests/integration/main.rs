//! Integration tests for the collector
//!
//! These tests use wiremock to stand in for feed publishers and run full
//! collection cycles against SQLite storage.

mod collect_tests;
mod reload_tests;
mod support;
