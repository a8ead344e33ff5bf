//! Integration test driver for the `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. All tests run on the host with no real hardware
//! or sockets required.

mod dispatcher_tests;
mod mock_hw;
mod relay_safety_tests;
mod security_tests;
