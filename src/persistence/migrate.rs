use log::info;

use crate::board::model::BoardDocument;

pub const TEXT_OUTPUT: &str = "text_out";
pub const TEXT_INPUT: &str = "text_in";

// Positional handle ids used before ports were typed
const LEGACY_HANDLES: [&str; 4] = ["l", "r", "t", "b"];

fn is_legacy(handle: &str) -> bool {
    LEGACY_HANDLES.contains(&handle)
}

/// Rewrite positional edge handles to typed text ports: any legacy id on a
/// source end becomes `text_out`, on a target end `text_in`. Returns the
/// number of handles rewritten.
pub fn migrate_legacy_handles(doc: &mut BoardDocument) -> usize {
    let mut rewritten = 0;
    for edge in &mut doc.edges {
        if is_legacy(&edge.source_handle) {
            edge.source_handle = TEXT_OUTPUT.to_string();
            rewritten += 1;
        }
        if is_legacy(&edge.target_handle) {
            edge.target_handle = TEXT_INPUT.to_string();
            rewritten += 1;
        }
    }
    if rewritten > 0 {
        info!("migrated {} legacy edge handles in board '{}'", rewritten, doc.id);
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::model::Edge;
    use uuid::Uuid;

    fn edge(src: &str, tgt: &str) -> Edge {
        Edge {
            id: Uuid::now_v7(),
            source: Uuid::now_v7(),
            source_handle: src.into(),
            target: Uuid::now_v7(),
            target_handle: tgt.into(),
            hidden: false,
            style: None,
        }
    }

    #[test]
    fn legacy_handles_become_typed() {
        let mut doc = BoardDocument::new("b", "B");
        doc.edges = vec![edge("r", "l"), edge("b", "t"), edge("image_out", "image_in")];
        assert_eq!(migrate_legacy_handles(&mut doc), 4);
        assert_eq!(doc.edges[0].source_handle, TEXT_OUTPUT);
        assert_eq!(doc.edges[0].target_handle, TEXT_INPUT);
        assert_eq!(doc.edges[1].target_handle, TEXT_INPUT);
        assert_eq!(doc.edges[2].source_handle, "image_out");
        assert_eq!(migrate_legacy_handles(&mut doc), 0);
    }
}
