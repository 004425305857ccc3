use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use super::geometry::{Position, Rect, Size};
use super::model::NodeId;
use super::store::GraphStore;
use crate::error::{BoardError, BoardResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignDirection {
    Left,
    Right,
    Top,
    Bottom,
    /// Horizontal centers line up.
    Center,
    /// Vertical centers line up.
    Middle,
}

impl FromStr for AlignDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(AlignDirection::Left),
            "right" => Ok(AlignDirection::Right),
            "top" => Ok(AlignDirection::Top),
            "bottom" => Ok(AlignDirection::Bottom),
            "center" => Ok(AlignDirection::Center),
            "middle" => Ok(AlignDirection::Middle),
            other => Err(anyhow::anyhow!("unknown alignment: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorganizeMode {
    /// `count` is the number of rows to aim for.
    Rows,
    /// `count` is the number of columns.
    Cols,
}

impl FromStr for ReorganizeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rows" => Ok(ReorganizeMode::Rows),
            "cols" | "columns" => Ok(ReorganizeMode::Cols),
            other => Err(anyhow::anyhow!("unknown reorganize mode: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorganizeOptions {
    pub mode: ReorganizeMode,
    pub count: usize,
}

/// Spacing used by the grid pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub margin: f32,
    pub standard_width: f32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self { margin: 40.0, standard_width: 340.0 }
    }
}

/// Which nodes a layout command applies to.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutTarget {
    Selection,
    All,
    Nodes(Vec<NodeId>),
}

impl LayoutTarget {
    // Existing ids only, deduplicated, in store order for Selection/All
    pub fn resolve(&self, store: &GraphStore) -> Vec<NodeId> {
        match self {
            LayoutTarget::Selection => store.selected_ids(),
            LayoutTarget::All => store.nodes().map(|n| n.id).collect(),
            LayoutTarget::Nodes(ids) => {
                let mut out: Vec<NodeId> = Vec::with_capacity(ids.len());
                for id in ids {
                    if store.node(*id).is_some() && !out.contains(id) {
                        out.push(*id);
                    }
                }
                out
            }
        }
    }
}

impl GraphStore {
    /// Line nodes up along one edge or center of their common bounding box.
    /// Only the relevant axis moves. Locked nodes shape the box but stay put.
    /// Returns how many nodes moved.
    pub fn align_nodes(&mut self, direction: AlignDirection, ids: &[NodeId]) -> usize {
        let items: Vec<(NodeId, Rect, bool)> = ids
            .iter()
            .filter_map(|id| self.node(*id))
            .map(|n| (n.id, n.rect(), n.data.is_locked))
            .collect();
        if items.len() <= 1 {
            return 0;
        }
        let Some(bounds) = Rect::bounding(items.iter().map(|(_, r, _)| *r)) else { return 0 };
        let center = bounds.center();

        let mut moved = 0;
        for (id, rect, locked) in items {
            if locked {
                continue;
            }
            let target = match direction {
                AlignDirection::Left => Position::new(bounds.min.x, rect.min.y),
                AlignDirection::Right => Position::new(bounds.max.x - rect.width(), rect.min.y),
                AlignDirection::Top => Position::new(rect.min.x, bounds.min.y),
                AlignDirection::Bottom => Position::new(rect.min.x, bounds.max.y - rect.height()),
                AlignDirection::Center => Position::new(center.x - rect.width() * 0.5, rect.min.y),
                AlignDirection::Middle => Position::new(rect.min.x, center.y - rect.height() * 0.5),
            };
            if target != rect.min && self.move_node(id, target) {
                moved += 1;
            }
        }
        debug!("aligned {:?}: moved {} nodes", direction, moved);
        moved
    }

    /// Row-major grid pass in reading order. Every placed node is normalized
    /// to the standard width; rows advance by their tallest member. Locked
    /// nodes are left where they are. Returns how many nodes were placed.
    pub fn reorganize_nodes(&mut self, options: ReorganizeOptions, ids: &[NodeId], metrics: LayoutMetrics) -> BoardResult<usize> {
        if options.count == 0 {
            return Err(BoardError::Validation("reorganize count must be at least 1".into()));
        }
        let mut items: Vec<(NodeId, Rect)> = ids
            .iter()
            .filter_map(|id| self.node(*id))
            .filter(|n| !n.data.is_locked)
            .map(|n| (n.id, n.rect()))
            .collect();
        if items.is_empty() {
            return Ok(0);
        }
        items.sort_by(|(_, a), (_, b)| a.min.y.total_cmp(&b.min.y).then(a.min.x.total_cmp(&b.min.x)));

        let n = items.len();
        let columns = match options.mode {
            ReorganizeMode::Cols => options.count,
            ReorganizeMode::Rows => n.div_ceil(options.count),
        }
        .max(1);
        let origin = Position::new(
            items.iter().map(|(_, r)| r.min.x).fold(f32::INFINITY, f32::min),
            items.iter().map(|(_, r)| r.min.y).fold(f32::INFINITY, f32::min),
        );

        let mut cursor = origin;
        let mut row_height: f32 = 0.0;
        for (i, (id, rect)) in items.iter().enumerate() {
            if i > 0 && i % columns == 0 {
                cursor = Position::new(origin.x, cursor.y + row_height + metrics.margin);
                row_height = 0.0;
            }
            self.move_node(*id, cursor);
            self.resize_node(*id, Size::new(metrics.standard_width, rect.height()));
            row_height = row_height.max(rect.height());
            cursor.x += metrics.standard_width + metrics.margin;
        }
        debug!("reorganized {} nodes into {} columns", n, columns);
        Ok(n)
    }
}
