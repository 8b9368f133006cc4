//! # Repository Module
//!
//! Database access behind a small API.
//!
//! The terminal keeps every store in memory and persists each one as a
//! single document, so there is one repository: [`cache::CacheRepository`].

pub mod cache;
