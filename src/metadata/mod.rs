//! Title metadata: episode lists and display details.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and shared data types.
//! - [`providers`] -- Concrete provider implementations.
//! - [`resolver`] -- TTL cache, request coalescing and concurrency bound.

pub mod provider;
pub mod providers;
pub mod resolver;

pub use provider::{BasicContentDetails, MetaDetails, MetadataProvider, VideoInfo};
pub use resolver::{MetadataResolver, ResolvedMetadata, ResolverSettings};
