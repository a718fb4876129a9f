//! Detached target containers for one merge pass.
//!
//! While a container is being merged it is taken out of its parent and owned
//! by a frame. The parent keeps its slot (and so its key order) until the
//! frame is closed and the container is put back. Frames form a stack that
//! mirrors the traversal, so a work item reaches its target container in
//! constant time and no two items ever alias the tree.

use cfgweave_types::{ConfigNode, Container};

#[derive(Debug)]
struct Frame {
    /// Slot of this container in the parent frame. Empty for the root.
    key: String,
    container: Container,
}

/// Stack of open containers. The root frame is always present.
#[derive(Debug)]
pub(crate) struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub(crate) fn new(root: Container) -> Self {
        Self {
            frames: vec![Frame {
                key: String::new(),
                container: root,
            }],
        }
    }

    /// Depth of the innermost open frame. The root is depth 0.
    pub(crate) fn depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    /// Close every frame deeper than `depth`, returning each container to
    /// its slot in the parent.
    pub(crate) fn unwind_to(&mut self, depth: usize) {
        while self.frames.len() > depth + 1 {
            let Some(frame) = self.frames.pop() else {
                return;
            };
            let Some(parent) = self.frames.last_mut() else {
                return;
            };
            *parent
                .container
                .entry(frame.key)
                .or_insert_with(ConfigNode::null) = ConfigNode::Container(frame.container);
        }
    }

    /// The container of the frame at `depth`, closing any deeper frames.
    pub(crate) fn container_at(&mut self, depth: usize) -> &mut Container {
        debug_assert!(depth < self.frames.len(), "frame {depth} is not open");
        self.unwind_to(depth);
        let index = self.depth();
        &mut self.frames[index].container
    }

    /// Open a frame for slot `key` of the frame at `depth` and return the
    /// new frame's depth.
    ///
    /// A container already in the slot is merged into unless `reset` is set.
    /// Anything else in the slot is replaced by an empty container.
    pub(crate) fn open(&mut self, depth: usize, key: String, reset: bool) -> usize {
        let slot = self
            .container_at(depth)
            .entry(key.clone())
            .or_insert_with(ConfigNode::null);
        let container = match slot.as_container_mut() {
            Some(existing) if !reset => std::mem::take(existing),
            _ => Container::new(),
        };
        self.frames.push(Frame { key, container });
        self.depth()
    }

    /// Close all frames and return the root container.
    pub(crate) fn finish(mut self) -> Container {
        self.unwind_to(0);
        self.frames
            .pop()
            .map(|frame| frame.container)
            .unwrap_or_default()
    }
}
