use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::geometry::{Position, Size};
use super::model::{BoardDocument, BoardMeta, Edge, EdgeId, Group, GroupId, Node, NodeData, NodeId, NodeKind, NodeStyle, PortRef};
use super::ports::PortPolicy;
use super::registry;
use crate::error::{BoardError, BoardResult};

/// Partial update for a node's data payload. `None` leaves a field alone.
#[derive(Clone, Debug, Default)]
pub struct NodePatch {
    pub label: Option<String>,
    pub is_active: Option<bool>,
    pub is_locked: Option<bool>,
    // Some(None) clears the override
    pub custom_color: Option<Option<String>>,
    pub extra: Map<String, Value>,
    pub style: Option<NodeStyle>,
}

impl NodePatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self { label: Some(label.into()), ..Default::default() }
    }
}

/// Canonical nodes, edges and groups. Insertion order is kept so z-order,
/// snapshots and exports are deterministic.
#[derive(Clone, Debug, Default)]
pub struct GraphStore {
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) edges: IndexMap<EdgeId, Edge>,
    pub(crate) groups: IndexMap<GroupId, Group>,
    revision: u64,
}

impl GraphStore {
    // Instantiate a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a loaded document, dropping anything that would
    /// break the store invariants (duplicate ids, dangling edges, stale
    /// group members).
    pub fn from_document(doc: BoardDocument) -> Self {
        let mut store = GraphStore::new();
        for node in doc.nodes {
            if store.nodes.contains_key(&node.id) {
                warn!("dropping duplicate node id {}", node.id);
                continue;
            }
            store.nodes.insert(node.id, node);
        }
        for edge in doc.edges {
            if !store.nodes.contains_key(&edge.source) || !store.nodes.contains_key(&edge.target) {
                warn!("dropping edge {} with a missing endpoint", edge.id);
                continue;
            }
            if store.edges.contains_key(&edge.id) {
                warn!("dropping duplicate edge id {}", edge.id);
                continue;
            }
            // handle migration can fold distinct legacy edges into the same connection
            let source = PortRef::new(edge.source, edge.source_handle.clone());
            let target = PortRef::new(edge.target, edge.target_handle.clone());
            if store.edges.values().any(|e| e.connects(&source, &target)) {
                warn!("dropping edge {} duplicating an existing connection", edge.id);
                continue;
            }
            store.edges.insert(edge.id, edge);
        }
        // a node belongs to the first group that lists it
        let mut claimed: HashSet<NodeId> = HashSet::new();
        for mut group in doc.groups {
            if store.groups.contains_key(&group.id) {
                warn!("dropping duplicate group id {}", group.id);
                continue;
            }
            let listed = group.members.len();
            group.members.retain(|id| store.nodes.contains_key(id) && claimed.insert(*id));
            if group.members.len() != listed {
                warn!("group {} lost {} stale or shared members", group.id, listed - group.members.len());
            }
            if group.members.is_empty() {
                warn!("dropping empty group {}", group.id);
                continue;
            }
            store.groups.insert(group.id, group);
        }
        // membership tags must agree with the group records
        let tagged: Vec<(NodeId, GroupId)> = store
            .groups
            .values()
            .flat_map(|g| g.members.iter().map(move |m| (*m, g.id)))
            .collect();
        for node in store.nodes.values_mut() {
            if let Some(gid) = node.data.group_id
                && !tagged.contains(&(node.id, gid))
            {
                node.data.group_id = None;
            }
        }
        for (nid, gid) in tagged {
            if let Some(node) = store.nodes.get_mut(&nid) {
                node.data.group_id = Some(gid);
            }
        }
        store
    }

    /// Monotonic counter bumped by every document mutation.
    pub fn revision(&self) -> u64 { self.revision }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> { self.nodes.values() }
    pub fn edges(&self) -> impl Iterator<Item = &Edge> { self.edges.values() }
    pub fn groups(&self) -> impl Iterator<Item = &Group> { self.groups.values() }
    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(&id) }
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> { self.edges.get(&id) }
    pub fn group(&self, id: GroupId) -> Option<&Group> { self.groups.get(&id) }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }
    pub fn group_count(&self) -> usize { self.groups.len() }

    fn next_z_index(&self) -> i32 {
        self.nodes.values().map(|n| n.z_index + 1).max().unwrap_or(0)
    }

    /// Append a node and return its new id. Without an explicit size the
    /// kind's registry default is used.
    pub fn add_node(&mut self, kind: NodeKind, position: Position, size: Option<Size>, data: NodeData) -> NodeId {
        let id = Uuid::now_v7();
        let spec = registry::spec_for(&kind);
        let mut node = Node::new(id, kind, position);
        node.size = Some(size.unwrap_or(Size::new(spec.default_width, spec.default_height)));
        node.z_index = self.next_z_index();
        node.data = data;
        self.nodes.insert(id, node);
        self.touch();
        id
    }

    // Insert a fully formed node (duplicate/drop paths); the id must be fresh
    pub(crate) fn insert_node(&mut self, mut node: Node) -> NodeId {
        if self.nodes.contains_key(&node.id) {
            node.id = Uuid::now_v7();
        }
        node.z_index = self.next_z_index();
        let id = node.id;
        self.nodes.insert(id, node);
        self.touch();
        id
    }

    pub fn update_node_data(&mut self, id: NodeId, patch: &NodePatch) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            debug!("update ignored for missing node {}", id);
            return false;
        };
        let before = (node.data.clone(), node.style);
        if let Some(label) = &patch.label { node.data.label = label.clone(); }
        if let Some(active) = patch.is_active { node.data.is_active = active; }
        if let Some(locked) = patch.is_locked { node.data.is_locked = locked; }
        if let Some(color) = &patch.custom_color { node.data.custom_color = color.clone(); }
        for (k, v) in &patch.extra {
            node.data.extra.insert(k.clone(), v.clone());
        }
        if let Some(style) = patch.style { node.style = Some(style); }
        let changed = before != (node.data.clone(), node.style);
        if changed {
            self.touch();
            if patch.style.is_some() { self.refresh_group_of(id); }
        }
        true
    }

    pub fn move_node(&mut self, id: NodeId, position: Position) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else { return false };
        if node.position != position {
            node.position = position;
            self.touch();
            self.refresh_group_of(id);
        }
        true
    }

    pub fn resize_node(&mut self, id: NodeId, size: Size) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else { return false };
        if node.size != Some(size) || node.measured.is_some() {
            node.size = Some(size);
            // the old measurement no longer describes this node
            node.measured = None;
            self.touch();
            self.refresh_group_of(id);
        }
        true
    }

    /// Record what the renderer measured. The measurement itself is
    /// transient; only a group frame it reshapes counts as a change.
    pub fn set_measured(&mut self, id: NodeId, size: Size) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else { return false };
        node.measured = Some(size);
        if self.refresh_group_of(id) {
            self.touch();
        }
        true
    }

    /// Remove nodes, cascading to their edges and group membership.
    /// Returns how many nodes were actually removed.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> usize {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(node) = self.nodes.shift_remove(id) {
                removed.push(node);
            }
        }
        if removed.is_empty() {
            return 0;
        }
        // Cascade delete edges involving these nodes
        let gone: Vec<NodeId> = removed.iter().map(|n| n.id).collect();
        self.edges.retain(|_, e| !gone.iter().any(|id| e.touches(*id)));
        let mut affected_groups = Vec::new();
        for node in &removed {
            if let Some(gid) = node.data.group_id
                && let Some(group) = self.groups.get_mut(&gid)
            {
                group.members.retain(|m| *m != node.id);
                if !affected_groups.contains(&gid) { affected_groups.push(gid); }
            }
        }
        for gid in affected_groups {
            let empty = self.groups.get(&gid).is_some_and(|g| g.members.is_empty());
            if empty {
                debug!("removing group {} after its last member was deleted", gid);
                self.groups.shift_remove(&gid);
            } else {
                self.refresh_group(gid);
            }
        }
        self.touch();
        removed.len()
    }

    /// Connect two ports. Fails if an endpoint is missing, the same edge
    /// already exists, or the port policy rejects the pairing.
    pub fn add_edge(&mut self, source: PortRef, target: PortRef, policy: &dyn PortPolicy) -> BoardResult<EdgeId> {
        let src = self.nodes.get(&source.node).ok_or(BoardError::MissingNode(source.node))?;
        let tgt = self.nodes.get(&target.node).ok_or(BoardError::MissingNode(target.node))?;
        if self.edges.values().any(|e| e.connects(&source, &target)) {
            return Err(BoardError::Validation("an identical connection already exists".into()));
        }
        policy
            .check(src, &source.handle, tgt, &target.handle)
            .map_err(|reason| BoardError::IncompatiblePorts {
                source_handle: source.handle.clone(),
                target_handle: target.handle.clone(),
                reason,
            })?;
        let id = Uuid::now_v7();
        // an edge into a collapsed group starts hidden like its siblings
        let hidden = src.hidden || tgt.hidden;
        let edge = Edge {
            id,
            source: source.node,
            source_handle: source.handle,
            target: target.node,
            target_handle: target.handle,
            hidden,
            style: None,
        };
        self.edges.insert(id, edge);
        self.touch();
        Ok(id)
    }

    pub fn delete_edges(&mut self, ids: &[EdgeId]) -> usize {
        let removed = ids.iter().filter(|id| self.edges.shift_remove(*id).is_some()).count();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    // Selection helpers. Selection is UI state: no revision bump.
    pub fn select_only(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        for node in self.nodes.values_mut() {
            node.selected = node.id == id;
        }
        true
    }

    pub fn set_selection(&mut self, ids: &[NodeId]) {
        for node in self.nodes.values_mut() {
            node.selected = ids.contains(&node.id);
        }
    }

    pub fn deselect_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.selected = false;
        }
    }

    pub fn selected_ids(&self) -> Vec<NodeId> {
        self.nodes.values().filter_map(|n| if n.selected { Some(n.id) } else { None }).collect()
    }

    /// Copy out the persistable parts, in store order.
    pub fn to_document(&self, id: &str, meta: BoardMeta) -> BoardDocument {
        BoardDocument {
            id: id.to_string(),
            meta,
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
            groups: self.groups.values().cloned().collect(),
        }
    }

    // Swap in restored contents wholesale (history replay)
    pub(crate) fn replace_contents(&mut self, nodes: Vec<Node>, edges: Vec<Edge>, groups: Vec<Group>) {
        self.nodes = nodes.into_iter().map(|n| (n.id, n)).collect();
        self.edges = edges.into_iter().map(|e| (e.id, e)).collect();
        self.groups = groups.into_iter().map(|g| (g.id, g)).collect();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ports::{AcceptAll, TypedPorts};
    use serde_json::json;

    fn store_with(n: usize) -> (GraphStore, Vec<NodeId>) {
        let mut store = GraphStore::new();
        let ids = (0..n)
            .map(|i| store.add_node(NodeKind::Text, Position::new(i as f32 * 10.0, 0.0), None, NodeData::default()))
            .collect();
        (store, ids)
    }

    #[test]
    fn add_node_uses_registry_size_and_increasing_z() {
        let (mut store, ids) = store_with(2);
        let a = store.node(ids[0]).unwrap();
        assert_eq!(a.size, Some(Size::new(340.0, 200.0)));
        assert!(store.node(ids[1]).unwrap().z_index > a.z_index);
        let custom = store.add_node(NodeKind::Unknown("sticker".into()), Position::default(), Some(Size::new(1.0, 2.0)), NodeData::default());
        assert_eq!(store.node(custom).unwrap().size, Some(Size::new(1.0, 2.0)));
    }

    #[test]
    fn update_merges_and_ignores_missing() {
        let (mut store, ids) = store_with(1);
        let rev = store.revision();
        let mut patch = NodePatch::label("Hero");
        patch.extra.insert("text".into(), json!("hello"));
        assert!(store.update_node_data(ids[0], &patch));
        let node = store.node(ids[0]).unwrap();
        assert_eq!(node.data.label, "Hero");
        assert_eq!(node.data.extra["text"], json!("hello"));
        assert!(store.revision() > rev);

        let rev = store.revision();
        assert!(store.update_node_data(ids[0], &patch));
        assert_eq!(store.revision(), rev, "identical patch must not count as a change");
        assert!(!store.update_node_data(Uuid::now_v7(), &patch));
    }

    #[test]
    fn delete_cascades_edges() {
        let (mut store, ids) = store_with(3);
        let e1 = store.add_edge(PortRef::new(ids[0], "text_out"), PortRef::new(ids[1], "text_in"), &TypedPorts).unwrap();
        let e2 = store.add_edge(PortRef::new(ids[1], "text_out"), PortRef::new(ids[2], "text_in"), &TypedPorts).unwrap();
        assert_eq!(store.delete_nodes(&[ids[1]]), 1);
        assert!(store.edge(e1).is_none());
        assert!(store.edge(e2).is_none());
        assert_eq!(store.delete_nodes(&[ids[1]]), 0);
    }

    #[test]
    fn duplicate_and_incompatible_edges_are_rejected() {
        let (mut store, ids) = store_with(2);
        let a = PortRef::new(ids[0], "text_out");
        let b = PortRef::new(ids[1], "text_in");
        store.add_edge(a.clone(), b.clone(), &TypedPorts).unwrap();
        let rev = store.revision();
        assert!(matches!(store.add_edge(a, b, &TypedPorts), Err(BoardError::Validation(_))));
        assert!(matches!(
            store.add_edge(PortRef::new(ids[0], "image_out"), PortRef::new(ids[1], "text_in"), &TypedPorts),
            Err(BoardError::IncompatiblePorts { .. })
        ));
        assert!(matches!(
            store.add_edge(PortRef::new(Uuid::now_v7(), "x"), PortRef::new(ids[1], "y"), &AcceptAll),
            Err(BoardError::MissingNode(_))
        ));
        assert_eq!(store.revision(), rev);
    }

    #[test]
    fn selection_does_not_bump_revision() {
        let (mut store, ids) = store_with(2);
        let rev = store.revision();
        assert!(store.select_only(ids[1]));
        assert_eq!(store.selected_ids(), vec![ids[1]]);
        store.deselect_all();
        assert!(store.selected_ids().is_empty());
        assert_eq!(store.revision(), rev);
    }

    #[test]
    fn from_document_repairs_broken_references() {
        let (mut store, ids) = store_with(2);
        store.add_edge(PortRef::new(ids[0], "a"), PortRef::new(ids[1], "b"), &AcceptAll).unwrap();
        let mut doc = store.to_document("b1", Default::default());
        doc.nodes.push(doc.nodes[0].clone());
        doc.edges.push(Edge {
            id: Uuid::now_v7(),
            source: ids[0],
            source_handle: "a".into(),
            target: Uuid::now_v7(),
            target_handle: "b".into(),
            hidden: false,
            style: None,
        });
        doc.nodes[1].data.group_id = Some(Uuid::now_v7());
        let repaired = GraphStore::from_document(doc);
        assert_eq!(repaired.node_count(), 2);
        assert_eq!(repaired.edge_count(), 1);
        assert!(repaired.node(ids[1]).unwrap().data.group_id.is_none());
    }

    fn edge(source: NodeId, source_handle: &str, target: NodeId, target_handle: &str) -> Edge {
        Edge {
            id: Uuid::now_v7(),
            source,
            source_handle: source_handle.into(),
            target,
            target_handle: target_handle.into(),
            hidden: false,
            style: None,
        }
    }

    #[test]
    fn from_document_drops_repeated_connections() {
        let (store, ids) = store_with(2);
        let mut doc = store.to_document("b1", Default::default());
        doc.edges.push(edge(ids[0], "text_out", ids[1], "text_in"));
        doc.edges.push(edge(ids[0], "text_out", ids[1], "text_in"));
        doc.edges.push(edge(ids[1], "text_out", ids[0], "text_in"));
        let kept = doc.edges[0].id;
        let repaired = GraphStore::from_document(doc);
        assert_eq!(repaired.edge_count(), 2);
        assert!(repaired.edge(kept).is_some());
    }

    #[test]
    fn from_document_gives_shared_member_to_first_group() {
        let (store, ids) = store_with(4);
        let mut doc = store.to_document("b1", Default::default());
        let group = |members: Vec<NodeId>| Group {
            id: Uuid::now_v7(),
            name: "G".into(),
            color: "#000000".into(),
            members,
            collapsed: false,
            position: Position::default(),
            size: Size::default(),
        };
        let first = group(vec![ids[0], ids[1]]);
        let second = group(vec![ids[1], ids[2]]);
        let swallowed = group(vec![ids[0], ids[2]]);
        let (first_id, second_id, swallowed_id) = (first.id, second.id, swallowed.id);
        doc.groups = vec![first, second, swallowed];

        let repaired = GraphStore::from_document(doc);
        assert_eq!(repaired.group(first_id).unwrap().members, vec![ids[0], ids[1]]);
        assert_eq!(repaired.group(second_id).unwrap().members, vec![ids[2]]);
        assert!(repaired.group(swallowed_id).is_none());
        assert_eq!(repaired.groups().filter(|g| g.contains(ids[1])).count(), 1);
        assert_eq!(repaired.node(ids[1]).unwrap().data.group_id, Some(first_id));
        assert_eq!(repaired.node(ids[2]).unwrap().data.group_id, Some(second_id));
        assert!(repaired.node(ids[3]).unwrap().data.group_id.is_none());
    }

    #[test]
    fn measurement_bumps_revision_only_when_a_group_frame_changes() {
        let (mut store, ids) = store_with(3);
        store.create_group(&ids[..2], None).unwrap();
        let gid = store.node(ids[0]).unwrap().data.group_id.unwrap();
        let frame = store.group(gid).unwrap().bounds();
        let rev = store.revision();

        // inside the frame already spanned by the other member
        assert!(store.set_measured(ids[0], Size::new(10.0, 10.0)));
        assert_eq!(store.revision(), rev);
        assert_eq!(store.group(gid).unwrap().bounds(), frame);

        // ungrouped node
        assert!(store.set_measured(ids[2], Size::new(900.0, 900.0)));
        assert_eq!(store.revision(), rev);

        assert!(store.set_measured(ids[1], Size::new(600.0, 500.0)));
        assert!(store.revision() > rev);
        let grown = store.group(gid).unwrap().bounds();
        assert!(grown.contains_rect(&store.node(ids[1]).unwrap().rect()));
    }
}

