// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Entry Point
//!
//! This test suite uses proptest to verify properties that must hold for
//! every resolvable environment and every stack composed from it.

mod property;
