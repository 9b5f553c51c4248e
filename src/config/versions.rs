// Copyright (c) 2025 - Cowboy AI, Inc.
//! Engine versions shared by every stage

/// MariaDB engine version
pub const DATABASE_ENGINE_VERSION: &str = "10.6.8";

/// Redis engine version
pub const CACHE_ENGINE_VERSION: &str = "7.0";

/// OpenSearch engine version
pub const SEARCH_ENGINE_VERSION: &str = "2.3";

/// Application container image
pub const APPLICATION_IMAGE: &str = "dockware/play:latest";
