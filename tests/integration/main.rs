//! Integration tests for the Kindling boot sequence.

mod boot_test;
mod helpers;
mod installer_test;
