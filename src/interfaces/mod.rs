//! Driving adapters that turn outside input into domain values.

pub mod csv;
