// src/config/mod.rs
//! Runtime configuration: one TOML document (`config/digest.toml`) with
//! fetch, source, classifier, enhancer and cache sections. Every field has a default so a
//! missing file still yields a working setup.

pub mod digest;
pub mod enhancer;

pub use digest::{CacheSettings, ClassifierSettings, DigestConfig, FetchSettings, SourceSettings};
pub use enhancer::EnhancerSettings;
