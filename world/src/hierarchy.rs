//! Presentation object hierarchy owned by the world.

use blocks_core::ObjectId;

#[derive(Clone, Debug)]
struct ObjectNode {
    name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    enabled: bool,
}

/// Arena of named objects arranged as a forest.
///
/// Objects are never removed; disabling an object hides it together with
/// every descendant.
#[derive(Clone, Debug, Default)]
pub struct ObjectTree {
    nodes: Vec<ObjectNode>,
}

impl ObjectTree {
    pub(crate) fn insert(
        &mut self,
        name: impl Into<String>,
        parent: Option<ObjectId>,
        enabled: bool,
    ) -> ObjectId {
        let id = ObjectId::new(self.nodes.len() as u32);
        self.nodes.push(ObjectNode {
            name: name.into(),
            parent,
            children: Vec::new(),
            enabled,
        });
        if let Some(parent) = parent.and_then(|parent| self.node_mut(parent)) {
            parent.children.push(id);
        }
        id
    }

    /// Sets the enabled flag of `root` and all its descendants.
    ///
    /// Walks the subtree with an explicit stack and returns how many objects
    /// actually changed, or `None` when `root` is unknown. Repeating the same
    /// call changes nothing.
    pub(crate) fn set_subtree_enabled(&mut self, root: ObjectId, enabled: bool) -> Option<usize> {
        let _ = self.node(root)?;

        let mut changed = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node_mut(id) else {
                continue;
            };
            if node.enabled != enabled {
                node.enabled = enabled;
                changed += 1;
            }
            stack.extend(node.children.iter().rev().copied());
        }
        Some(changed)
    }

    /// Number of objects in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Reports whether the arena holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` is currently enabled.
    #[must_use]
    pub fn is_enabled(&self, id: ObjectId) -> Option<bool> {
        self.node(id).map(|node| node.enabled)
    }

    /// Name given to `id` by the level.
    #[must_use]
    pub fn name(&self, id: ObjectId) -> Option<&str> {
        self.node(id).map(|node| node.name.as_str())
    }

    /// Parent of `id`, if it has one.
    #[must_use]
    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Direct children of `id`.
    #[must_use]
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Looks up an object by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(|index| ObjectId::new(index as u32))
    }

    fn node(&self, id: ObjectId) -> Option<&ObjectNode> {
        self.nodes.get(id.get() as usize)
    }

    fn node_mut(&mut self, id: ObjectId) -> Option<&mut ObjectNode> {
        self.nodes.get_mut(id.get() as usize)
    }
}
