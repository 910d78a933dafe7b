//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the host adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod flow_service_tests;
mod mock_hw;
mod restore_tests;
