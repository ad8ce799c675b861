//! mapperlab: a statement executor pipeline wrapped by an ordered interceptor
//! chain, with a per-session result cache and shared per-namespace caches.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod executor;
pub mod infra;
pub mod mapping;
pub mod plugin;
pub mod session;
