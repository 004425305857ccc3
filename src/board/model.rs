use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::geometry::{Position, Rect, Size};
use super::registry;

// Basic type aliases for clarity
pub type NodeId = Uuid;
pub type EdgeId = Uuid;
pub type GroupId = Uuid;

/// Node kinds the board knows how to seed and size. Tags it does not
/// recognise are kept verbatim in `Unknown` so they survive a save.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Text,
    Image,
    Palette,
    Texture,
    Note,
    Prompt,
    Generator,
    Video,
    Unknown(String),
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Text,
        NodeKind::Image,
        NodeKind::Palette,
        NodeKind::Texture,
        NodeKind::Note,
        NodeKind::Prompt,
        NodeKind::Generator,
        NodeKind::Video,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Text => "text",
            NodeKind::Image => "image",
            NodeKind::Palette => "palette",
            NodeKind::Texture => "texture",
            NodeKind::Note => "note",
            NodeKind::Prompt => "prompt",
            NodeKind::Generator => "generator",
            NodeKind::Video => "video",
            NodeKind::Unknown(tag) => tag,
        }
    }

    /// Map a wire tag to a kind; exact match only, anything else is kept
    /// as `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == tag)
            .unwrap_or_else(|| NodeKind::Unknown(tag.to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, NodeKind::Unknown(_))
    }
}

impl Serialize for NodeKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(NodeKind::from_tag(&tag))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown node kind: {}", s))
    }
}

fn default_true() -> bool { true }
fn is_false(b: &bool) -> bool { !*b }

/// Common node payload plus whatever kind-specific fields the node carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            label: String::new(),
            is_active: true,
            is_locked: false,
            group_id: None,
            custom_color: None,
            extra: Map::new(),
        }
    }
}

/// Size declared through styling rather than set explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default)]
    pub data: NodeData,
    // UI-only state, never persisted nor captured in history
    #[serde(skip)]
    pub selected: bool,
    #[serde(skip)]
    pub measured: Option<Size>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, position: Position) -> Self {
        Self {
            id,
            kind,
            position,
            size: None,
            style: None,
            z_index: 0,
            hidden: false,
            data: NodeData::default(),
            selected: false,
            measured: None,
        }
    }

    /// Resolve the size layout and grouping should use, per axis:
    /// renderer measurement, then explicit size, then declared style size,
    /// then the kind's registry default.
    pub fn effective_size(&self) -> Size {
        let fallback = registry::spec_for(&self.kind);
        let style = self.style.unwrap_or_default();
        let width = self
            .measured
            .map(|s| s.width)
            .or(self.size.map(|s| s.width))
            .or(style.width)
            .unwrap_or(fallback.default_width);
        let height = self
            .measured
            .map(|s| s.height)
            .or(self.size.map(|s| s.height))
            .or(style.height)
            .unwrap_or(fallback.default_height);
        Size::new(width, height)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.position, self.effective_size())
    }
}

/// One end of a connection: a node and one of its ports.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub handle: String,
}

impl PortRef {
    pub fn new(node: NodeId, handle: impl Into<String>) -> Self {
        Self { node, handle: handle.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    #[serde(default)]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
}

impl Edge {
    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }

    pub fn connects(&self, source: &PortRef, target: &PortRef) -> bool {
        self.source == source.node
            && self.source_handle == source.handle
            && self.target == target.node
            && self.target_handle == target.handle
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub color: String,
    pub members: Vec<NodeId>,
    #[serde(default)]
    pub collapsed: bool,
    pub position: Position,
    pub size: Size,
}

impl Group {
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// The persisted unit: everything needed to rebuild a board.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub id: String,
    #[serde(default)]
    pub meta: BoardMeta,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl BoardDocument {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: BoardMeta { title: title.into(), updated_at: None },
            ..Default::default()
        }
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
