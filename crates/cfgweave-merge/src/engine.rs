//! The merge engine: accumulates configuration fragments into one tree.
//!
//! Each [`MergeEngine::add`] call walks the fragment with an explicit LIFO
//! work stack. Siblings are therefore processed in reverse declaration
//! order, which decides the winner when several keys of one container share
//! a base name and none of them is `important`: the last declared key wins.
//!
//! Target containers are detached from the tree while their children are
//! merged (see [`crate::frame`]), so the cost of an item does not depend on
//! its depth.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use cfgweave_types::{ConfigNode, Container, MergeFlags, NamedFlags};

use crate::config::{unreachable_reason, EngineConfig, UnknownDirectivePolicy};
use crate::directive::{is_numeric_key, Evaluation, KeyDirectives, DISABLED};
use crate::error::MergeResult;
use crate::frame::FrameStack;

/// Merges configuration fragments into a single owned tree.
///
/// The merged tree starts as an empty container. Fragments are merged in the
/// order they are added; by default a value already present is kept, and
/// key directives decide otherwise (see [`crate::directive`]).
#[derive(Clone, Debug)]
pub struct MergeEngine {
    flags: NamedFlags,
    content: ConfigNode,
    config: EngineConfig,
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeEngine {
    /// Create an engine with the default configuration.
    ///
    /// The `disabled` flag is registered as `false`, so any key carrying a
    /// `|disabled` directive is dropped.
    pub fn new() -> Self {
        let mut flags = NamedFlags::new();
        flags.set(DISABLED, false);
        Self {
            flags,
            content: ConfigNode::container(),
            config: EngineConfig::default(),
        }
    }

    /// Create an engine from a validated configuration.
    pub fn with_config(config: EngineConfig) -> MergeResult<Self> {
        config.validate()?;
        let mut engine = Self::new();
        engine.flags.extend(config.flags.iter());
        engine.config = config;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register or update a named flag.
    ///
    /// Only merges performed after this call see the new value.
    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        let name = name.into();
        if let Some(reason) = unreachable_reason(&name) {
            warn!(flag = %name, reason, "flag can never match a key directive");
        }
        debug!(flag = %name, value, "flag set");
        self.flags.set(name, value);
    }

    /// Current value of a named flag.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name)
    }

    pub fn flags(&self) -> &NamedFlags {
        &self.flags
    }

    /// The merged tree so far.
    pub fn save(&self) -> &ConfigNode {
        &self.content
    }

    /// Consume the engine, returning the merged tree.
    pub fn into_content(self) -> ConfigNode {
        self.content
    }

    /// Deserialize the merged tree into a typed value.
    pub fn extract<T: DeserializeOwned>(&self) -> MergeResult<T> {
        Ok(self.content.deserialize_into()?)
    }

    /// Merge several fragments in order with the same load flags.
    pub fn add_all<'f, I>(&mut self, fragments: I, load_flags: MergeFlags)
    where
        I: IntoIterator<Item = &'f ConfigNode>,
    {
        for fragment in fragments {
            self.add(fragment, load_flags);
        }
    }

    /// Merge one fragment into the tree.
    ///
    /// `load_flags` apply to the fragment's top level and are inherited by
    /// every key below it. Merging never fails.
    pub fn add(&mut self, fragment: &ConfigNode, load_flags: MergeFlags) {
        let pass = MergePass::new(&self.flags, self.config.unknown_directives);
        let stats = pass.run(&mut self.content, fragment, load_flags);
        debug!(
            items = stats.items,
            dropped = stats.dropped,
            max_depth = stats.max_depth,
            flags = ?load_flags,
            "fragment merged"
        );
    }
}

/// One unit of traversal: a source node and where it lands.
#[derive(Debug)]
struct WorkItem<'f> {
    /// Slash-joined key relative to the nearest non-flattened ancestor.
    /// `None` unless the item was produced by flattening.
    flat_path: Option<String>,
    source: &'f ConfigNode,
    flags: MergeFlags,
    /// Depth of the frame holding the target slot.
    frame: usize,
    /// Key of the target slot in that frame.
    key: String,
    /// Whether numeric keys of `source` are re-indexed.
    list_mode: bool,
}

#[derive(Debug, Default)]
struct MergeStats {
    items: usize,
    dropped: usize,
    max_depth: usize,
}

/// State of a single `add` call.
struct MergePass<'e, 'f> {
    flags: &'e NamedFlags,
    policy: UnknownDirectivePolicy,
    stack: Vec<WorkItem<'f>>,
    stats: MergeStats,
}

impl<'e, 'f> MergePass<'e, 'f> {
    fn new(flags: &'e NamedFlags, policy: UnknownDirectivePolicy) -> Self {
        Self {
            flags,
            policy,
            stack: Vec::new(),
            stats: MergeStats::default(),
        }
    }

    fn run(
        mut self,
        content: &mut ConfigNode,
        fragment: &'f ConfigNode,
        load_flags: MergeFlags,
    ) -> MergeStats {
        self.stats.items += 1;
        let children = match fragment {
            ConfigNode::Scalar(_) => {
                if content.is_null() || load_flags.overwrites() {
                    *content = fragment.clone();
                }
                return self.stats;
            }
            ConfigNode::Container(children) => children,
        };

        let root = match content.as_container_mut() {
            Some(existing) if !load_flags.overwrites() => std::mem::take(existing),
            _ => Container::new(),
        };
        let mut frames = FrameStack::new(root);
        self.expand(&mut frames, 0, children, None, load_flags, false);

        while let Some(item) = self.stack.pop() {
            self.stats.items += 1;
            trace!(
                key = item.key.as_str(),
                depth = item.frame,
                flags = ?item.flags,
                list = item.list_mode,
                "merging item"
            );
            match item.source {
                ConfigNode::Scalar(_) => Self::merge_scalar(&mut frames, &item),
                ConfigNode::Container(children) => {
                    self.merge_container(&mut frames, &item, children)
                }
            }
        }

        *content = ConfigNode::Container(frames.finish());
        self.stats
    }

    fn merge_scalar(frames: &mut FrameStack, item: &WorkItem<'f>) {
        let target = frames
            .container_at(item.frame)
            .entry(item.key.clone())
            .or_insert_with(ConfigNode::null);
        if target.is_null() || item.flags.overwrites() {
            *target = item.source.clone();
        }
    }

    fn merge_container(
        &mut self,
        frames: &mut FrameStack,
        item: &WorkItem<'f>,
        children: &'f Container,
    ) {
        match item.flat_path.as_deref() {
            // A flattened container is never installed itself: its children
            // go straight into the container enclosing its slot.
            Some(prefix) => {
                if item.flags.overwrites() {
                    remove_flattened(frames.container_at(item.frame), prefix);
                }
                self.expand(
                    frames,
                    item.frame,
                    children,
                    Some(prefix),
                    item.flags,
                    item.list_mode,
                );
            }
            None => {
                let depth = frames.open(item.frame, item.key.clone(), item.flags.overwrites());
                self.stats.max_depth = self.stats.max_depth.max(depth);
                self.expand(frames, depth, children, None, item.flags, item.list_mode);
            }
        }
    }

    /// Evaluate the children of one source container and queue the ones
    /// that survive, reserving their slots in the frame at `depth`.
    fn expand(
        &mut self,
        frames: &mut FrameStack,
        depth: usize,
        children: &'f Container,
        prefix: Option<&str>,
        inherited: MergeFlags,
        list_mode: bool,
    ) {
        let container = frames.container_at(depth);
        let mut next_flat_index = match prefix {
            Some(prefix) if list_mode => flat_entry_count(container, prefix),
            _ => 0,
        };

        for (key, child) in children {
            let directives = KeyDirectives::parse(key);
            let step = match directives.evaluate(self.flags, inherited, self.policy) {
                Evaluation::Merge(step) => step,
                Evaluation::Drop { token } => {
                    debug!(key = %key, token, "key dropped by directive");
                    self.stats.dropped += 1;
                    continue;
                }
            };

            let mut base = Cow::Borrowed(directives.base());
            if list_mode && is_numeric_key(&base) {
                let index = match prefix {
                    Some(prefix) => {
                        let index = next_free_flat_index(container, prefix, next_flat_index);
                        next_flat_index = index + 1;
                        index
                    }
                    None => next_free_index(container),
                };
                base = Cow::Owned(index.to_string());
            }

            let (slot_key, flat_path) = if step.flags.flattens() {
                let flat_key = join_flat(prefix, &base);
                (flat_key.clone(), Some(flat_key))
            } else {
                (base.into_owned(), None)
            };

            // Reserve the slot so that list indices advance and the merged
            // container keeps declaration order.
            if flat_path.is_none() || child.is_scalar() {
                container
                    .entry(slot_key.clone())
                    .or_insert_with(ConfigNode::null);
            }

            self.stack.push(WorkItem {
                flat_path,
                source: child,
                flags: step.flags,
                frame: depth,
                key: slot_key,
                list_mode: step.list_mode,
            });
        }
    }
}

/// Slash-joined key of `base` under a flattened prefix, without a leading
/// slash.
fn join_flat(prefix: Option<&str>, base: &str) -> String {
    format!("{}/{}", prefix.unwrap_or_default(), base)
        .trim_start_matches('/')
        .to_string()
}

/// Drop `flat_key` and every key flattened below it.
fn remove_flattened(container: &mut Container, flat_key: &str) {
    let nested = format!("{flat_key}/");
    container.retain(|key, _| key.as_str() != flat_key && !key.starts_with(&nested));
}

/// Smallest integer index, starting at the entry count, not already used as
/// a key.
fn next_free_index(container: &Container) -> usize {
    let mut index = container.len();
    while container.contains_key(index.to_string().as_str()) {
        index += 1;
    }
    index
}

/// Smallest index from `from` upward whose flattened key under `prefix` is
/// unused, either as a key or as the prefix of a nested key.
fn next_free_flat_index(container: &Container, prefix: &str, from: usize) -> usize {
    let mut index = from;
    loop {
        let entry = join_flat(Some(prefix), &index.to_string());
        let nested = format!("{entry}/");
        let taken = container
            .keys()
            .any(|key| *key == entry || key.starts_with(&nested));
        if !taken {
            return index;
        }
        index += 1;
    }
}

/// Number of distinct entries already installed under a flattened prefix,
/// e.g. `ports/0` and `ports/1/host` count as two entries under `ports`.
fn flat_entry_count(container: &Container, prefix: &str) -> usize {
    container
        .keys()
        .filter_map(|key| key.strip_prefix(prefix)?.strip_prefix('/'))
        .map(|rest| rest.split('/').next().unwrap_or(rest))
        .collect::<HashSet<_>>()
        .len()
}
