// Copyright 2026 Offerloop Contributors
// SPDX-License-Identifier: Apache-2.0

//! Offerloop library — card-linked offer discovery and enrollment engine.
//!
//! This library crate exposes the core modules for integration testing.

#![allow(dead_code, clippy::new_without_default)]

pub mod browser;
pub mod config;
pub mod confirm;
pub mod enroll;
pub mod extract;
pub mod finder;
pub mod fingerprint;
pub mod nav;
pub mod poll;
pub mod run;
pub mod session;
pub mod sink;
pub mod testing;
