use log::debug;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::geometry::{CoordinateTransform, Position, Size, golden_spiral_position};
use super::model::{NodeData, NodeId, NodeKind};
use super::registry::{self, SeedContext};
use super::store::GraphStore;

// Spacing between successive fallback placements
const FALLBACK_SPACING: f32 = 120.0;

/// What came along with a drag-and-drop onto the canvas.
#[derive(Clone, Debug, Default)]
pub struct DropPayload {
    pub label: Option<String>,
    /// Kind-specific fields copied onto the new node, e.g. `src` for images.
    pub fields: Map<String, Value>,
}

impl DropPayload {
    pub fn image(src: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("src".into(), Value::String(src.into()));
        Self { label: None, fields }
    }
}

fn seeded_data(kind: &NodeKind, ctx: &SeedContext<'_>) -> NodeData {
    let spec = registry::spec_for(kind);
    NodeData {
        label: spec.label.to_string(),
        extra: (spec.seed)(ctx),
        ..NodeData::default()
    }
}

impl GraphStore {
    /// Create a node with its kind's seeded data and default size. Without a
    /// position the node lands on a golden-angle spiral around the origin.
    pub fn spawn_node(&mut self, kind: NodeKind, position: Option<Position>, size: Option<Size>, ctx: &SeedContext<'_>) -> NodeId {
        let position = position.unwrap_or_else(|| {
            golden_spiral_position(Position::default(), self.node_count() as u32, FALLBACK_SPACING)
        });
        let data = seeded_data(&kind, ctx);
        debug!("spawning {} node at ({}, {})", kind, position.x, position.y);
        self.add_node(kind, position, size, data)
    }

    /// Clone a node next to the original and make the clone the only selected
    /// node. The clone starts outside any group.
    pub fn duplicate_node(&mut self, id: NodeId, offset: f32) -> Option<NodeId> {
        let mut clone = self.node(id)?.clone();
        clone.id = Uuid::now_v7();
        clone.position = clone.position.offset(offset, offset);
        clone.data.group_id = None;
        clone.hidden = false;
        let new_id = self.insert_node(clone);
        self.select_only(new_id);
        Some(new_id)
    }

    /// Create a node where something was dropped, converting the screen point
    /// through the caller's viewport transform.
    pub fn drop_node(
        &mut self,
        kind: NodeKind,
        payload: &DropPayload,
        screen: Position,
        transform: &dyn CoordinateTransform,
        ctx: &SeedContext<'_>,
    ) -> NodeId {
        let position = transform.screen_to_canvas(screen);
        let mut data = seeded_data(&kind, ctx);
        if let Some(label) = &payload.label {
            data.label = label.clone();
        }
        for (k, v) in &payload.fields {
            data.extra.insert(k.clone(), v.clone());
        }
        self.add_node(kind, position, None, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::geometry::Viewport;
    use serde_json::json;

    #[test]
    fn spawn_seeds_kind_defaults() {
        let mut store = GraphStore::new();
        let palette = vec!["#AA0000".to_string()];
        let ctx = SeedContext { palette: &palette };
        let p = store.spawn_node(NodeKind::Palette, Some(Position::new(1.0, 1.0)), None, &ctx);
        let node = store.node(p).unwrap();
        assert_eq!(node.data.label, "Palette");
        assert_eq!(node.data.extra["colors"], json!(["#AA0000"]));
        assert_eq!(node.size, Some(Size::new(300.0, 160.0)));

        let t = store.spawn_node(NodeKind::Texture, None, None, &ctx);
        assert_eq!(store.node(t).unwrap().data.extra["intensity"], json!(0.5));
        // the second fallback placement is off the origin
        assert_ne!(store.node(t).unwrap().position, Position::default());
    }

    #[test]
    fn duplicate_offsets_and_takes_selection() {
        let mut store = GraphStore::new();
        let ctx = SeedContext::default();
        let a = store.spawn_node(NodeKind::Note, Some(Position::new(10.0, 10.0)), None, &ctx);
        let b = store.spawn_node(NodeKind::Note, Some(Position::new(500.0, 10.0)), None, &ctx);
        store.set_selection(&[a, b]);
        store.create_group(&[a, b], None).unwrap();

        let copy = store.duplicate_node(a, 40.0).unwrap();
        let node = store.node(copy).unwrap();
        assert_eq!(node.position, Position::new(50.0, 50.0));
        assert_eq!(node.data.label, store.node(a).unwrap().data.label);
        assert!(node.data.group_id.is_none());
        assert_eq!(store.selected_ids(), vec![copy]);
        assert!(store.duplicate_node(Uuid::now_v7(), 40.0).is_none());
    }

    #[test]
    fn drop_converts_screen_coordinates() {
        let mut store = GraphStore::new();
        let vp = Viewport { pan: Position::new(100.0, 100.0), zoom: 2.0 };
        let id = store.drop_node(
            NodeKind::Image,
            &DropPayload::image("https://cdn.example/cat.png"),
            Position::new(300.0, 500.0),
            &vp,
            &SeedContext::default(),
        );
        let node = store.node(id).unwrap();
        assert_eq!(node.position, Position::new(100.0, 200.0));
        assert_eq!(node.data.extra["src"], json!("https://cdn.example/cat.png"));
    }
}
