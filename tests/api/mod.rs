//! HTTP endpoint tests.

mod browse_tests;
mod control_plane_tests;
