//! Test modules for the queue system
//!
//! Unit tests for single components live next to them; these suites drive
//! several components together over real sockets and in-memory pipes.
