//! Runtime adapters for fpvtune (policy files, corpus manifests, input limits).

pub mod config;
pub mod corpus;
pub mod util;
