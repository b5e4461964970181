//! Test utilities for proxy module testing
//!
//! This module provides utilities to make testing proxy components easier,
//! including a scripted upstream client, test configurations, and helper
//! functions.
