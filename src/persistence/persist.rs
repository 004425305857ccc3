use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ron::ser::PrettyConfig;
use time::OffsetDateTime;
use time::macros::format_description;

use super::PersistenceAdapter;
use super::settings::BoardSettings;
use crate::board::model::BoardDocument;

/// Boards stored as pretty RON files, one per board id, in the autosave
/// directory.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_settings(settings: &BoardSettings) -> Self {
        Self::new(settings.autosave_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Board ids become file names; keep them to a safe character set
    fn file_stem(id: &str) -> String {
        id.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }

    pub fn active_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.ron", Self::file_stem(id)))
    }

    pub fn versioned_path_now(&self, id: &str) -> PathBuf {
        let now = OffsetDateTime::now_utc();
        let fmt = format_description!("[year][month][day]_[hour][minute][second]");
        let stamp = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
        self.dir.join(format!("{}_v{}.ron", Self::file_stem(id), stamp))
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    fn encode(doc: &BoardDocument) -> anyhow::Result<String> {
        let pretty = PrettyConfig::new()
            .separate_tuple_members(true)
            .enumerate_arrays(true);
        Ok(ron::ser::to_string_pretty(doc, pretty)?)
    }

    /// Write a time-stamped copy next to the active file.
    pub fn save_versioned(&self, doc: &BoardDocument) -> anyhow::Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.versioned_path_now(&doc.id);
        write_replacing(&path, &Self::encode(doc)?)?;
        Ok(path)
    }

    /// `.ron` files in the board directory whose name passes `keep`.
    /// A missing directory holds no boards.
    fn ron_files(&self, keep: impl Fn(&str) -> bool) -> anyhow::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let Some(stem) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".ron"))
            else {
                continue;
            };
            if keep(stem) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Whether a board already has an active file.
    pub fn exists(&self, id: &str) -> bool {
        self.active_path(id).is_file()
    }

    /// Versioned copies of a board, newest first. Stamps sort lexically.
    pub fn list_versions(&self, id: &str) -> anyhow::Result<Vec<PathBuf>> {
        let prefix = format!("{}_v", Self::file_stem(id));
        let mut versions = self.ron_files(|stem| stem.starts_with(&prefix))?;
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    /// Ids of every board with an active file in the directory. Versioned
    /// copies and foreign files are skipped by checking that the stored id
    /// maps back to the same file.
    pub fn list_boards(&self) -> anyhow::Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .ron_files(|_| true)?
            .into_iter()
            .filter_map(|path| {
                let doc = read_board(&path).ok()?;
                (path == self.active_path(&doc.id)).then_some(doc.id)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

// Readers never see a half-written board: write beside it, then swap in.
fn write_replacing(path: &Path, contents: &str) -> std::io::Result<()> {
    let staged = path.with_extension("ron.tmp");
    fs::write(&staged, contents)?;
    fs::rename(&staged, path)
}

/// Parse one board file.
pub fn read_board(path: &Path) -> anyhow::Result<BoardDocument> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading board file {}", path.display()))?;
    ron::from_str(&text).with_context(|| format!("parsing board file {}", path.display()))
}

impl PersistenceAdapter for FilePersistence {
    fn load(&mut self, id: &str) -> anyhow::Result<Option<BoardDocument>> {
        let path = self.active_path(id);
        if !path.exists() {
            return Ok(None);
        }
        read_board(&path).map(Some)
    }

    fn save(&mut self, doc: &BoardDocument) -> anyhow::Result<()> {
        self.ensure_dir()?;
        write_replacing(&self.active_path(&doc.id), &Self::encode(doc)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::geometry::Position;
    use crate::board::model::{Node, NodeKind};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn save_then_load_preserves_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FilePersistence::new(dir.path());
        let mut doc = BoardDocument::new("spring/campaign", "Spring");
        let mut node = Node::new(Uuid::now_v7(), NodeKind::Texture, Position::new(3.0, 4.0));
        node.data.extra.insert("intensity".into(), json!(0.5));
        node.data.custom_color = Some("#abcdef".into());
        doc.nodes.push(node);

        files.save(&doc).unwrap();
        assert!(files.active_path("spring/campaign").ends_with("spring_campaign.ron"));
        let loaded = files.load("spring/campaign").unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(files.load("missing").unwrap().is_none());
        assert_eq!(files.list_boards().unwrap(), vec!["spring/campaign".to_string()]);
    }

    #[test]
    fn versions_are_listed_separately() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FilePersistence::new(dir.path());
        let doc = BoardDocument::new("b1", "Board");
        files.save(&doc).unwrap();
        let v = files.save_versioned(&doc).unwrap();
        assert_eq!(files.list_versions("b1").unwrap(), vec![v]);
        assert_eq!(files.list_boards().unwrap(), vec!["b1".to_string()]);
    }

    #[test]
    fn garbage_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FilePersistence::new(dir.path());
        fs::write(files.active_path("bad"), "not ron at all {{").unwrap();
        assert!(files.load("bad").is_err());
    }

    #[test]
    fn listing_ignores_other_boards_and_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FilePersistence::new(dir.path());
        assert!(files.list_boards().unwrap().is_empty());
        assert!(!files.exists("b1"));

        let b1 = BoardDocument::new("b1", "One");
        let b10 = BoardDocument::new("b10", "Ten");
        files.save(&b1).unwrap();
        files.save(&b10).unwrap();
        files.save_versioned(&b10).unwrap();
        fs::write(dir.path().join("b1_vnotes.txt"), "scratch").unwrap();
        fs::write(dir.path().join("b1.ron.tmp"), "half written").unwrap();

        assert!(files.exists("b1"));
        assert!(files.list_versions("b1").unwrap().is_empty());
        assert_eq!(files.list_versions("b10").unwrap().len(), 1);
        assert_eq!(files.list_boards().unwrap(), vec!["b1".to_string(), "b10".to_string()]);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = FilePersistence::new(dir.path().join("not-created"));
        assert!(files.list_versions("b1").unwrap().is_empty());
        assert!(files.list_boards().unwrap().is_empty());
    }
}
