// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-based tests module

mod stage_properties;
