//! Per-kind defaults. Adding a node kind means adding a variant and one
//! `KindSpec` entry here.

use serde_json::{Map, Value, json};

use super::model::NodeKind;

/// Inputs available to a kind's data seed.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeedContext<'a> {
    /// Active brand palette, most prominent color first.
    pub palette: &'a [String],
}

pub struct KindSpec {
    pub label: &'static str,
    pub default_width: f32,
    pub default_height: f32,
    pub seed: fn(&SeedContext<'_>) -> Map<String, Value>,
}

fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn seed_none(_: &SeedContext<'_>) -> Map<String, Value> { Map::new() }

fn seed_text(_: &SeedContext<'_>) -> Map<String, Value> {
    fields(&[("text", json!(""))])
}

fn seed_image(_: &SeedContext<'_>) -> Map<String, Value> {
    fields(&[("src", Value::Null), ("alt", json!(""))])
}

fn seed_palette(ctx: &SeedContext<'_>) -> Map<String, Value> {
    let first = ctx.palette.first().cloned().unwrap_or_else(|| "#000000".to_string());
    fields(&[("colors", json!([first]))])
}

fn seed_texture(_: &SeedContext<'_>) -> Map<String, Value> {
    fields(&[("intensity", json!(0.5)), ("src", Value::Null)])
}

fn seed_note(_: &SeedContext<'_>) -> Map<String, Value> {
    fields(&[("text", json!("")), ("tone", json!("neutral"))])
}

fn seed_prompt(_: &SeedContext<'_>) -> Map<String, Value> {
    fields(&[("prompt", json!("")), ("negativePrompt", json!(""))])
}

fn seed_generator(_: &SeedContext<'_>) -> Map<String, Value> {
    fields(&[("prompt", json!("")), ("outputs", json!([])), ("status", json!("idle"))])
}

fn seed_video(_: &SeedContext<'_>) -> Map<String, Value> {
    fields(&[("src", Value::Null), ("durationSecs", json!(0))])
}

static TEXT: KindSpec = KindSpec { label: "Text", default_width: 340.0, default_height: 200.0, seed: seed_text };
static IMAGE: KindSpec = KindSpec { label: "Image", default_width: 340.0, default_height: 340.0, seed: seed_image };
static PALETTE: KindSpec = KindSpec { label: "Palette", default_width: 300.0, default_height: 160.0, seed: seed_palette };
static TEXTURE: KindSpec = KindSpec { label: "Texture", default_width: 240.0, default_height: 240.0, seed: seed_texture };
static NOTE: KindSpec = KindSpec { label: "Note", default_width: 260.0, default_height: 180.0, seed: seed_note };
static PROMPT: KindSpec = KindSpec { label: "Prompt", default_width: 380.0, default_height: 260.0, seed: seed_prompt };
static GENERATOR: KindSpec = KindSpec { label: "Generator", default_width: 400.0, default_height: 420.0, seed: seed_generator };
static VIDEO: KindSpec = KindSpec { label: "Video", default_width: 480.0, default_height: 270.0, seed: seed_video };
// fallback for kinds the registry has no entry for
static GENERIC: KindSpec = KindSpec { label: "Node", default_width: 200.0, default_height: 100.0, seed: seed_none };

pub fn spec_for(kind: &NodeKind) -> &'static KindSpec {
    match kind {
        NodeKind::Text => &TEXT,
        NodeKind::Image => &IMAGE,
        NodeKind::Palette => &PALETTE,
        NodeKind::Texture => &TEXTURE,
        NodeKind::Note => &NOTE,
        NodeKind::Prompt => &PROMPT,
        NodeKind::Generator => &GENERATOR,
        NodeKind::Video => &VIDEO,
        NodeKind::Unknown(_) => &GENERIC,
    }
}
