//! Integration test crate for credence; see `tests/`.
