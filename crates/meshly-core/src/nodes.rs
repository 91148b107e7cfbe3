// ── Node directory ──
//
// Concurrent map from node address to display name, fed by the
// embedding application from its node database. The traceroute
// renderer is the main consumer.

use dashmap::DashMap;

use meshly_api::NodeId;

/// Display names for nodes seen on the mesh.
///
/// Thread-safe; readers never block writers. Nodes without an entry
/// render as their `!%08x` user id.
#[derive(Debug, Default)]
pub struct NodeDirectory {
    names: DashMap<NodeId, String>,
}

impl NodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the display name for `node`.
    pub fn upsert(&self, node: NodeId, name: impl Into<String>) {
        self.names.insert(node, name.into());
    }

    /// Forget `node`. Returns the previous name if there was one.
    pub fn remove(&self, node: NodeId) -> Option<String> {
        self.names.remove(&node).map(|(_, name)| name)
    }

    /// The display name for `node`, or its user-id placeholder when
    /// unknown.
    pub fn display_name(&self, node: NodeId) -> String {
        self.names
            .get(&node)
            .map_or_else(|| node.to_string(), |entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_node_uses_stored_name() {
        let dir = NodeDirectory::new();
        dir.upsert(NodeId(0x10), "Base Camp");
        assert_eq!(dir.display_name(NodeId(0x10)), "Base Camp");
    }

    #[test]
    fn unknown_node_falls_back_to_user_id() {
        let dir = NodeDirectory::new();
        assert_eq!(dir.display_name(NodeId(0xdead_beef)), "!deadbeef");
    }

    #[test]
    fn remove_restores_placeholder() {
        let dir = NodeDirectory::new();
        dir.upsert(NodeId(7), "Rover");
        assert_eq!(dir.remove(NodeId(7)).as_deref(), Some("Rover"));
        assert_eq!(dir.display_name(NodeId(7)), "!00000007");
    }
}
