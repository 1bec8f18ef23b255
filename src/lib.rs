//! Onboarding engine: wizard progress, milestones, and achievements.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
