//! Merge engine for cfgweave.
//!
//! Combines any number of configuration fragments into one tree. Collisions
//! are resolved by directives embedded in key names (`|important`, `|flat`,
//! `|list`, and named flags for conditional inclusion). The traversal uses an
//! explicit work stack, so fragment depth is not limited by the call stack.
//!
//! # Quick Start
//!
//! ```rust
//! use cfgweave_merge::{ConfigNode, MergeEngine, MergeFlags};
//! use serde_json::json;
//!
//! let mut engine = MergeEngine::new();
//! engine.set_flag("debug", false);
//!
//! engine.add(&ConfigNode::from(json!({"port": 80, "log|debug": "trace"})), MergeFlags::NONE);
//! engine.add(&ConfigNode::from(json!({"port": 8080, "hosts|list": ["a"]})), MergeFlags::NONE);
//! engine.add(
//!     &ConfigNode::from(json!({"port|important": 9090, "hosts|list": ["b"]})),
//!     MergeFlags::NONE,
//! );
//!
//! let merged = engine.save().to_json().unwrap();
//! assert_eq!(merged, json!({"port": 9090, "hosts": ["a", "b"]}));
//! ```

pub mod config;
pub mod directive;
pub mod engine;
pub mod error;
mod frame;

pub use cfgweave_types::{ConfigNode, Container, MergeFlags, NamedFlags, Scalar};
pub use config::{EngineConfig, UnknownDirectivePolicy};
pub use directive::{Directive, Evaluation, KeyDirectives, Step};
pub use engine::MergeEngine;
pub use error::{MergeError, MergeResult};
