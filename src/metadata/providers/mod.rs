//! Concrete metadata provider implementations.
//!
//! Each submodule wraps a single external API and implements the
//! [`MetadataProvider`](super::MetadataProvider) trait.

pub mod cinemeta;

pub use cinemeta::CinemetaProvider;
