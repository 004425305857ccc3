use log::{debug, info};
use uuid::Uuid;

use super::geometry::Rect;
use super::model::{Group, GroupId, NodeId};
use super::store::GraphStore;
use crate::error::{BoardError, BoardResult};

/// Margin between member rectangles and the group frame.
pub const GROUP_PADDING: f32 = 20.0;
/// Extra room above the members for the group title bar.
pub const GROUP_HEADER: f32 = 40.0;

pub const GROUP_COLORS: [&str; 8] = [
    "#6366F1", "#EC4899", "#F59E0B", "#10B981", "#3B82F6", "#EF4444", "#8B5CF6", "#14B8A6",
];

/// Rename and/or recolor a group.
#[derive(Clone, Debug, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl GraphStore {
    fn member_bounds(&self, members: &[NodeId]) -> Option<Rect> {
        Rect::bounding(members.iter().filter_map(|id| self.nodes.get(id)).map(|n| n.rect()))
            .map(|r| r.expand(GROUP_PADDING, GROUP_HEADER))
    }

    /// Group at least two existing nodes. Nodes already in another group are
    /// moved out of it.
    pub fn create_group(&mut self, ids: &[NodeId], name: Option<&str>) -> BoardResult<GroupId> {
        let mut members: Vec<NodeId> = Vec::with_capacity(ids.len());
        for id in ids {
            if self.nodes.contains_key(id) && !members.contains(id) {
                members.push(*id);
            }
        }
        if members.len() < 2 {
            return Err(BoardError::Validation(format!(
                "a group needs at least 2 existing nodes, got {}",
                members.len()
            )));
        }
        let Some(bounds) = self.member_bounds(&members) else {
            return Err(BoardError::Validation("group members have no geometry".into()));
        };

        for id in &members {
            self.detach_member(*id);
        }
        let index = self.groups.len();
        let id = Uuid::now_v7();
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Group {}", index + 1));
        for member in &members {
            if let Some(node) = self.nodes.get_mut(member) {
                node.data.group_id = Some(id);
            }
        }
        info!("created group '{}' with {} members", name, members.len());
        self.groups.insert(
            id,
            Group {
                id,
                name,
                color: GROUP_COLORS[index % GROUP_COLORS.len()].to_string(),
                members,
                collapsed: false,
                position: bounds.min,
                size: bounds.size(),
            },
        );
        self.touch();
        Ok(id)
    }

    // Pull a node out of whatever group holds it; an emptied group goes away
    fn detach_member(&mut self, id: NodeId) {
        let Some(gid) = self.nodes.get(&id).and_then(|n| n.data.group_id) else { return };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.data.group_id = None;
            node.hidden = false;
        }
        let Some(group) = self.groups.get_mut(&gid) else { return };
        group.members.retain(|m| *m != id);
        if group.members.is_empty() {
            self.groups.shift_remove(&gid);
        } else {
            self.refresh_group(gid);
        }
        self.sync_edge_visibility();
    }

    /// Dissolve a group, releasing (not deleting) its members. Returns the
    /// released ids, or None if the group no longer exists.
    pub fn ungroup_nodes(&mut self, group_id: GroupId) -> Option<Vec<NodeId>> {
        let Some(group) = self.groups.shift_remove(&group_id) else {
            debug!("ungroup ignored for missing group {}", group_id);
            return None;
        };
        for member in &group.members {
            if let Some(node) = self.nodes.get_mut(member) {
                node.data.group_id = None;
                if group.collapsed {
                    node.hidden = false;
                }
            }
        }
        if group.collapsed {
            self.sync_edge_visibility();
        }
        self.touch();
        Some(group.members)
    }

    /// Flip the collapsed flag, returning the new state. Collapsing hides the
    /// members and every edge touching them; expanding reveals them and
    /// recomputes the frame.
    pub fn toggle_collapse(&mut self, group_id: GroupId) -> Option<bool> {
        let group = self.groups.get_mut(&group_id)?;
        group.collapsed = !group.collapsed;
        let collapsed = group.collapsed;
        let members = group.members.clone();
        for member in &members {
            if let Some(node) = self.nodes.get_mut(member) {
                node.hidden = collapsed;
            }
        }
        self.sync_edge_visibility();
        if !collapsed {
            self.refresh_group(group_id);
        }
        self.touch();
        Some(collapsed)
    }

    pub fn update_group(&mut self, group_id: GroupId, patch: &GroupPatch) -> bool {
        let Some(group) = self.groups.get_mut(&group_id) else { return false };
        let mut changed = false;
        if let Some(name) = &patch.name
            && *name != group.name
        {
            group.name = name.clone();
            changed = true;
        }
        if let Some(color) = &patch.color
            && *color != group.color
        {
            group.color = color.clone();
            changed = true;
        }
        if changed {
            self.touch();
        }
        true
    }

    /// Remove the group record; members survive and become visible again.
    pub fn delete_group(&mut self, group_id: GroupId) -> bool {
        let Some(released) = self.ungroup_nodes(group_id) else { return false };
        // hidden flags can outlive a collapse in documents written by older builds
        let mut revealed = false;
        for id in &released {
            if let Some(node) = self.nodes.get_mut(id)
                && node.hidden
            {
                node.hidden = false;
                revealed = true;
            }
        }
        if revealed {
            self.sync_edge_visibility();
        }
        info!("deleted group {} releasing {} nodes", group_id, released.len());
        true
    }

    /// Edges are hidden exactly when one of their endpoints is hidden.
    fn sync_edge_visibility(&mut self) {
        let nodes = &self.nodes;
        for edge in self.edges.values_mut() {
            let src_hidden = nodes.get(&edge.source).is_some_and(|n| n.hidden);
            let tgt_hidden = nodes.get(&edge.target).is_some_and(|n| n.hidden);
            edge.hidden = src_hidden || tgt_hidden;
        }
    }

    /// Recompute the frame of one expanded group. Collapsed frames stay
    /// frozen. Returns whether the frame moved or resized.
    pub(crate) fn refresh_group(&mut self, group_id: GroupId) -> bool {
        let Some(group) = self.groups.get(&group_id) else { return false };
        if group.collapsed {
            return false;
        }
        let Some(bounds) = self.member_bounds(&group.members) else { return false };
        let Some(group) = self.groups.get_mut(&group_id) else { return false };
        if group.bounds() == bounds {
            return false;
        }
        group.position = bounds.min;
        group.size = bounds.size();
        true
    }

    pub(crate) fn refresh_group_of(&mut self, node_id: NodeId) -> bool {
        match self.nodes.get(&node_id).and_then(|n| n.data.group_id) {
            Some(gid) => self.refresh_group(gid),
            None => false,
        }
    }

    pub fn refresh_group_bounds(&mut self) {
        let ids: Vec<GroupId> = self.groups.keys().copied().collect();
        for gid in ids {
            self.refresh_group(gid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::geometry::{Position, Size};
    use crate::board::model::{NodeData, NodeKind, PortRef};
    use crate::board::ports::AcceptAll;

    fn board_of(positions: &[(f32, f32)]) -> (GraphStore, Vec<NodeId>) {
        let mut store = GraphStore::new();
        let ids = positions
            .iter()
            .map(|(x, y)| store.add_node(NodeKind::Note, Position::new(*x, *y), Some(Size::new(100.0, 50.0)), NodeData::default()))
            .collect();
        (store, ids)
    }

    #[test]
    fn create_group_requires_two_nodes() {
        let (mut store, ids) = board_of(&[(0.0, 0.0)]);
        let rev = store.revision();
        assert!(matches!(store.create_group(&[ids[0]], None), Err(BoardError::Validation(_))));
        assert!(matches!(store.create_group(&[ids[0], ids[0]], None), Err(BoardError::Validation(_))));
        assert_eq!(store.revision(), rev);
    }

    #[test]
    fn bounds_include_padding_and_header() {
        let (mut store, ids) = board_of(&[(0.0, 0.0), (200.0, 100.0)]);
        let gid = store.create_group(&ids, Some("Hero shots")).unwrap();
        let g = store.group(gid).unwrap();
        assert_eq!(g.name, "Hero shots");
        assert_eq!(g.color, GROUP_COLORS[0]);
        assert_eq!(g.position, Position::new(-20.0, -60.0));
        assert_eq!(g.size, Size::new(340.0, 230.0));
        assert!(ids.iter().all(|id| store.node(*id).unwrap().data.group_id == Some(gid)));
    }

    #[test]
    fn moving_a_member_refreshes_bounds_unless_collapsed() {
        let (mut store, ids) = board_of(&[(0.0, 0.0), (200.0, 100.0)]);
        let gid = store.create_group(&ids, None).unwrap();
        store.move_node(ids[1], Position::new(500.0, 500.0));
        let g = store.group(gid).unwrap();
        assert!(g.bounds().contains_rect(&store.node(ids[1]).unwrap().rect().expand(GROUP_PADDING, 0.0)));

        store.toggle_collapse(gid);
        let frozen = store.group(gid).unwrap().bounds();
        store.move_node(ids[1], Position::new(900.0, 900.0));
        assert_eq!(store.group(gid).unwrap().bounds(), frozen);
    }

    #[test]
    fn collapse_hides_members_and_incident_edges() {
        let (mut store, ids) = board_of(&[(0.0, 0.0), (200.0, 0.0), (400.0, 0.0)]);
        let inner = store.add_edge(PortRef::new(ids[0], "o"), PortRef::new(ids[1], "i"), &AcceptAll).unwrap();
        let outer = store.add_edge(PortRef::new(ids[1], "o"), PortRef::new(ids[2], "i"), &AcceptAll).unwrap();
        let gid = store.create_group(&ids[..2], None).unwrap();

        assert_eq!(store.toggle_collapse(gid), Some(true));
        assert!(store.node(ids[0]).unwrap().hidden);
        assert!(!store.node(ids[2]).unwrap().hidden);
        assert!(store.edge(inner).unwrap().hidden);
        assert!(store.edge(outer).unwrap().hidden);

        assert_eq!(store.toggle_collapse(gid), Some(false));
        assert!(!store.edge(outer).unwrap().hidden);
        assert!(!store.node(ids[1]).unwrap().hidden);
        assert_eq!(store.toggle_collapse(Uuid::now_v7()), None);
    }

    #[test]
    fn ungroup_collapsed_group_reveals_everything() {
        let (mut store, ids) = board_of(&[(0.0, 0.0), (200.0, 0.0)]);
        let e = store.add_edge(PortRef::new(ids[0], "o"), PortRef::new(ids[1], "i"), &AcceptAll).unwrap();
        let gid = store.create_group(&ids, None).unwrap();
        store.toggle_collapse(gid);
        let released = store.ungroup_nodes(gid).unwrap();
        assert_eq!(released, ids);
        assert!(store.group(gid).is_none());
        assert!(!store.edge(e).unwrap().hidden);
        assert!(ids.iter().all(|id| {
            let n = store.node(*id).unwrap();
            !n.hidden && n.data.group_id.is_none()
        }));
        assert!(store.ungroup_nodes(gid).is_none());
    }

    #[test]
    fn regrouping_moves_members_and_drops_empty_groups() {
        let (mut store, ids) = board_of(&[(0.0, 0.0), (200.0, 0.0), (400.0, 0.0), (600.0, 0.0)]);
        let first = store.create_group(&ids[..2], None).unwrap();
        let second = store.create_group(&[ids[0], ids[1], ids[2]], None).unwrap();
        assert!(store.group(first).is_none());
        assert_eq!(store.group(second).unwrap().members.len(), 3);
        assert_eq!(store.group_count(), 1);
    }

    #[test]
    fn update_and_delete_group() {
        let (mut store, ids) = board_of(&[(0.0, 0.0), (200.0, 0.0)]);
        let gid = store.create_group(&ids, None).unwrap();
        let patch = GroupPatch { name: Some("Moodboard".into()), color: Some("#000000".into()) };
        assert!(store.update_group(gid, &patch));
        assert_eq!(store.group(gid).unwrap().name, "Moodboard");
        assert!(store.delete_group(gid));
        assert!(!store.delete_group(gid));
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn deleting_all_members_removes_group() {
        let (mut store, ids) = board_of(&[(0.0, 0.0), (200.0, 0.0)]);
        let gid = store.create_group(&ids, None).unwrap();
        store.delete_nodes(&[ids[0]]);
        assert_eq!(store.group(gid).unwrap().members, vec![ids[1]]);
        store.delete_nodes(&[ids[1]]);
        assert!(store.group(gid).is_none());
    }
}
