//! Test suites for the sec-lsm-manager daemon.

mod bootstrap_behaviour;
mod session_behaviour;
mod support;
