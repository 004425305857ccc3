use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::info;
use uuid::Uuid;

use moodboard::Board;
use moodboard::board::geometry::Position;
use moodboard::board::layout::{AlignDirection, LayoutTarget, ReorganizeMode, ReorganizeOptions};
use moodboard::board::model::{NodeId, NodeKind, PortRef};
use moodboard::board::store::NodePatch;
use moodboard::persistence::export;
use moodboard::persistence::persist::FilePersistence;
use moodboard::persistence::settings::BoardSettings;

fn board_arg() -> Arg {
    Arg::new("board").required(true).help("Board id")
}

fn ids_arg(required: bool) -> Arg {
    Arg::new("ids").num_args(1..).required(required).help("Node ids")
}

fn cli() -> Command {
    Command::new("moodboard")
        .about("Edit moodboards stored in the autosave directory")
        .subcommand_required(true)
        .arg(Arg::new("dir").long("dir").global(true).value_name("DIR").help("Board directory (defaults to the autosave dir)"))
        .subcommand(
            Command::new("new")
                .about("Create an empty board")
                .arg(board_arg())
                .arg(Arg::new("title").long("title").value_name("TITLE"))
                .arg(Arg::new("force").long("force").action(ArgAction::SetTrue).help("Replace an existing board")),
        )
        .subcommand(
            Command::new("add")
                .about("Add a node of the given kind")
                .arg(board_arg())
                .arg(Arg::new("kind").required(true).help("text, image, palette, texture, note, prompt, generator, video"))
                .arg(Arg::new("x").long("x").allow_negative_numbers(true))
                .arg(Arg::new("y").long("y").allow_negative_numbers(true))
                .arg(Arg::new("label").long("label")),
        )
        .subcommand(
            Command::new("connect")
                .about("Connect an output port to an input port")
                .arg(board_arg())
                .arg(Arg::new("source").required(true))
                .arg(Arg::new("source_handle").required(true))
                .arg(Arg::new("target").required(true))
                .arg(Arg::new("target_handle").required(true)),
        )
        .subcommand(
            Command::new("group")
                .about("Group nodes")
                .arg(board_arg())
                .arg(Arg::new("name").long("name"))
                .arg(ids_arg(true)),
        )
        .subcommand(
            Command::new("align")
                .about("Align nodes (all nodes when no ids are given)")
                .arg(board_arg())
                .arg(Arg::new("direction").required(true).help("left, right, top, bottom, center, middle"))
                .arg(ids_arg(false)),
        )
        .subcommand(
            Command::new("reorganize")
                .about("Lay nodes out on a grid (all nodes when no ids are given)")
                .arg(board_arg())
                .arg(Arg::new("mode").required(true).help("rows or cols"))
                .arg(Arg::new("count").required(true))
                .arg(ids_arg(false)),
        )
        .subcommand(
            Command::new("collapse")
                .about("Toggle a group's collapsed state")
                .arg(board_arg())
                .arg(Arg::new("group").required(true)),
        )
        .subcommand(Command::new("show").about("Print the board as JSON").arg(board_arg()))
        .subcommand(
            Command::new("export")
                .about("Export the board to the export directory")
                .arg(board_arg())
                .arg(Arg::new("format").long("format").default_value("json").help("json or csv")),
        )
        .subcommand(
            Command::new("versions")
                .about("List versioned copies of a board")
                .arg(board_arg())
                .arg(Arg::new("create").long("create").action(ArgAction::SetTrue).help("Write a new versioned copy first")),
        )
}

fn arg<'a>(m: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument: {}", name))
}

fn parse_id(s: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("invalid id '{}'", s))
}

fn parse_ids(m: &ArgMatches) -> anyhow::Result<Vec<NodeId>> {
    m.get_many::<String>("ids")
        .map(|vals| vals.map(|s| parse_id(s)).collect())
        .unwrap_or_else(|| Ok(Vec::new()))
}

fn layout_target(m: &ArgMatches) -> anyhow::Result<LayoutTarget> {
    let ids = parse_ids(m)?;
    Ok(if ids.is_empty() { LayoutTarget::All } else { LayoutTarget::Nodes(ids) })
}

fn parse_coord(m: &ArgMatches, name: &str) -> anyhow::Result<Option<f32>> {
    m.get_one::<String>(name)
        .map(|s| s.parse::<f32>().with_context(|| format!("invalid --{} '{}'", name, s)))
        .transpose()
}

fn open(settings: &BoardSettings, files: &FilePersistence, id: &str) -> anyhow::Result<Board> {
    let mut board = Board::new(settings.clone(), files.clone());
    board.open(id)?;
    Ok(board)
}

fn ensure_new(files: &FilePersistence, id: &str, force: bool) -> anyhow::Result<()> {
    if files.exists(id) && !force {
        return Err(anyhow!(
            "board '{}' already exists at {} (use --force to replace it)",
            id,
            files.active_path(id).display()
        ));
    }
    Ok(())
}

fn finish(mut board: Board) -> anyhow::Result<()> {
    board.commit()?;
    if board.save()? {
        info!("board '{}' saved", board.document_id().unwrap_or_default());
    }
    Ok(())
}

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let settings = BoardSettings::load().unwrap_or_default();
    let files = match matches.get_one::<String>("dir") {
        Some(dir) => FilePersistence::new(PathBuf::from(dir)),
        None => FilePersistence::from_settings(&settings),
    };

    match matches.subcommand() {
        Some(("new", m)) => {
            let id = arg(m, "board")?;
            let title = m.get_one::<String>("title").map(String::as_str).unwrap_or(id);
            ensure_new(&files, id, m.get_flag("force"))?;
            let mut board = Board::new(settings.clone(), files.clone());
            board.create(id, title);
            finish(board)?;
            println!("{}", files.active_path(id).display());
        }
        Some(("add", m)) => {
            let mut board = open(&settings, &files, arg(m, "board")?)?;
            let kind: NodeKind = arg(m, "kind")?.parse()?;
            let position = match (parse_coord(m, "x")?, parse_coord(m, "y")?) {
                (None, None) => None,
                (x, y) => Some(Position::new(x.unwrap_or(0.0), y.unwrap_or(0.0))),
            };
            let id = board.add_node(kind, position, None)?;
            if let Some(label) = m.get_one::<String>("label") {
                board.update_node_data(id, &NodePatch::label(label.as_str()))?;
            }
            finish(board)?;
            println!("{}", id);
        }
        Some(("connect", m)) => {
            let mut board = open(&settings, &files, arg(m, "board")?)?;
            let source = PortRef::new(parse_id(arg(m, "source")?)?, arg(m, "source_handle")?);
            let target = PortRef::new(parse_id(arg(m, "target")?)?, arg(m, "target_handle")?);
            let id = board.connect(source, target)?;
            finish(board)?;
            println!("{}", id);
        }
        Some(("group", m)) => {
            let mut board = open(&settings, &files, arg(m, "board")?)?;
            let ids = parse_ids(m)?;
            let name = m.get_one::<String>("name").map(String::as_str);
            let gid = board.create_group(&ids, name)?;
            finish(board)?;
            println!("{}", gid);
        }
        Some(("align", m)) => {
            let mut board = open(&settings, &files, arg(m, "board")?)?;
            let direction: AlignDirection = arg(m, "direction")?.parse()?;
            let moved = board.align_nodes(direction, &layout_target(m)?)?;
            finish(board)?;
            println!("aligned {} nodes", moved);
        }
        Some(("reorganize", m)) => {
            let mut board = open(&settings, &files, arg(m, "board")?)?;
            let mode: ReorganizeMode = arg(m, "mode")?.parse()?;
            let count: usize = arg(m, "count")?.parse().context("count must be a positive integer")?;
            let moved = board.reorganize_nodes(ReorganizeOptions { mode, count }, &layout_target(m)?)?;
            finish(board)?;
            println!("placed {} nodes", moved);
        }
        Some(("collapse", m)) => {
            let mut board = open(&settings, &files, arg(m, "board")?)?;
            let gid = parse_id(arg(m, "group")?)?;
            let collapsed = board
                .toggle_collapse(gid)?
                .ok_or_else(|| anyhow!("group {} not found", gid))?;
            finish(board)?;
            println!("{}", if collapsed { "collapsed" } else { "expanded" });
        }
        Some(("show", m)) => {
            let board = open(&settings, &files, arg(m, "board")?)?;
            println!("{}", board.export_json()?);
        }
        Some(("export", m)) => {
            let board = open(&settings, &files, arg(m, "board")?)?;
            let doc = board.export_document()?;
            let format = arg(m, "format")?;
            let path = export::export_path(&settings.export_dir(), &doc, format);
            match format {
                "json" => export::export_json(&doc, &path)?,
                "csv" => export::export_nodes_csv(&doc, &path)?,
                other => return Err(anyhow!("unsupported export format: {}", other)),
            }
            println!("{}", path.display());
        }
        Some(("versions", m)) => {
            let id = arg(m, "board")?;
            if m.get_flag("create") {
                let board = open(&settings, &files, id)?;
                files.save_versioned(&board.export_document()?)?;
            }
            for path in files.list_versions(id)? {
                println!("{}", path.display());
            }
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = cli().get_matches();
    if let Err(e) = run(&matches) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
