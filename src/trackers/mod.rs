// src/trackers/mod.rs

// Tracker directory: fetch, parse, tier and cache public announce lists
pub mod cache;
pub mod directory;
pub mod fetcher;
pub mod magnet;
pub mod parse;

pub use cache::{TrackerCache, TrackerSlice, TrackerSource};
pub use directory::{TierSelector, TrackerDirectory, TrackerStats};
pub use fetcher::{HttpFetcher, TrackerFetcher};
pub use parse::{Scheme, Tier, TrackerRecord};
