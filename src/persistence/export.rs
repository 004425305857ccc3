use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::board::model::BoardDocument;

/// Write the document as pretty JSON with a trailing newline.
pub fn export_json(doc: &BoardDocument, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() { std::fs::create_dir_all(parent)?; }
    let mut f = File::create(path)?;
    serde_json::to_writer_pretty(&mut f, doc)?;
    f.write_all(b"\n")?;
    Ok(())
}

/// One row per node: id,type,label,x,y,width,height,group_id,data_json
pub fn export_nodes_csv(doc: &BoardDocument, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() { std::fs::create_dir_all(parent)?; }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["id", "type", "label", "x", "y", "width", "height", "group_id", "data_json"])?;
    for n in &doc.nodes {
        let size = n.effective_size();
        let data_json = serde_json::to_string(&n.data.extra).unwrap_or_else(|_| "{}".into());
        wtr.write_record(&[
            n.id.to_string(),
            n.kind.to_string(),
            n.data.label.clone(),
            n.position.x.to_string(),
            n.position.y.to_string(),
            size.width.to_string(),
            size.height.to_string(),
            n.data.group_id.map(|g| g.to_string()).unwrap_or_default(),
            data_json,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Default file name for an export of `doc` inside `dir`.
pub fn export_path(dir: &Path, doc: &BoardDocument, extension: &str) -> PathBuf {
    let stem: String = doc
        .id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("{}.{}", stem, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::geometry::Position;
    use crate::board::model::{Node, NodeKind};
    use uuid::Uuid;

    #[test]
    fn json_and_csv_exports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = BoardDocument::new("look book", "Look book");
        let mut node = Node::new(Uuid::now_v7(), NodeKind::Image, Position::new(1.0, 2.0));
        node.data.label = "Cover".into();
        node.selected = true;
        doc.nodes.push(node);

        let json_path = export_path(dir.path(), &doc, "json");
        assert!(json_path.ends_with("look_book.json"));
        export_json(&doc, &json_path).unwrap();
        let back = BoardDocument::from_json(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back.nodes[0].data.label, "Cover");
        assert!(!back.nodes[0].selected);

        let csv_path = export_path(dir.path(), &doc, "csv");
        export_nodes_csv(&doc, &csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert!(text.starts_with("id,type,label"));
        assert!(text.contains(",image,Cover,1,2,340,340,,"));
    }
}
