//! ASG command-line tools.
//!
//! Provides the `asg` binary for inspecting graphs saved by `asg-storage`:
//! `info` prints the header and structural statistics, `hash` prints
//! structural hashes, `similar` compares two nodes and `check` runs the full
//! loader validation plus a reverse-index consistency pass.
//!
//! The catalogue is picked from the stream header's `FileType` entry.
//! Logging goes to stderr through `tracing-subscriber`; the filter is read
//! from `ASG_LOG`, then `RUST_LOG`, and raised by `-v` flags.
//!
//! Exit codes: 0 = success, 1 = graph or usage error, 3 = I/O error.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use asg_core::{catalog, Arena, AsgError, NodeId, ReverseEdges};
use asg_storage::{
    hash_roots, read_file_header, similarity, structural_hash, HashCache, HashConfig, Header, SimilarityConfig,
    StorageError,
};

/// Abstract semantic graph tools.
#[derive(Parser)]
#[command(name = "asg", about = "Inspect, hash and compare saved semantic graphs")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with `similarity` and `hash` settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the header, node count and per-kind statistics.
    Info {
        /// Saved graph file.
        file: PathBuf,
    },

    /// Print structural hashes of the roots, or of one node.
    Hash {
        /// Saved graph file.
        file: PathBuf,

        /// Hash only this node.
        #[arg(short, long)]
        node: Option<u32>,
    },

    /// Print the similarity of two nodes.
    Similar {
        /// Saved graph file.
        file: PathBuf,
        a: u32,
        b: u32,
    },

    /// Load with full validation and verify the reverse-edge index.
    Check {
        /// Saved graph file.
        file: PathBuf,
    },
}

/// Settings read from `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    similarity: SimilarityConfig,
    hash: HashConfig,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(code) => process::exit(code),
    };

    let exit_code = match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Hash { file, node } => run_hash(&file, node, &config),
        Commands::Similar { file, a, b } => run_similar(&file, a, b, &config),
        Commands::Check { file } => run_check(&file),
    };
    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let directive = match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    let filter = match directive {
        Some(level) => EnvFilter::new(level),
        None => std::env::var("ASG_LOG")
            .ok()
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CliConfig, i32> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read config '{}': {}", path.display(), e);
        3
    })?;
    serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error: invalid config '{}': {}", path.display(), e);
        1
    })
}

/// Exit code for a storage failure.
fn exit_code(err: &StorageError) -> i32 {
    match err {
        StorageError::Io(_) => 3,
        _ => 1,
    }
}

fn report(path: &Path, err: &StorageError) -> i32 {
    eprintln!("Error: {}: {}", path.display(), err);
    exit_code(err)
}

/// Loads a graph with the bundled catalogue named by its header.
fn open_graph(path: &Path) -> Result<(Header, Arena), StorageError> {
    let header = read_file_header(path)?;
    let file_type = header.file_type().unwrap_or("");
    let schema = catalog::by_name(file_type).ok_or_else(|| StorageError::SchemaMismatch {
        expected: "a bundled catalogue (python, java)".into(),
        found: file_type.to_string(),
    })?;
    let arena = asg_storage::load_file(path, schema)?;
    tracing::info!(path = %path.display(), nodes = arena.len(), "opened graph");
    Ok((header, arena))
}

fn run_info(path: &Path) -> i32 {
    match open_graph(path) {
        Ok((header, arena)) => {
            print!("{}", render_info(&header, &arena));
            0
        }
        Err(e) => report(path, &e),
    }
}

/// Header entries, node and edge totals, and per-kind histograms.
fn render_info(header: &Header, arena: &Arena) -> String {
    let schema = arena.schema();
    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    let mut edges: BTreeMap<String, usize> = BTreeMap::new();
    for node in arena.nodes() {
        *kinds.entry(node.kind_name()).or_default() += 1;
        for (edge, targets) in node.edges() {
            if targets.is_empty() {
                continue;
            }
            let name = match schema.edge(edge) {
                Some(def) => format!("{}.{}", schema.kind_name(def.owner), def.name),
                None => edge.to_string(),
            };
            *edges.entry(name).or_default() += targets.len();
        }
    }

    let mut out = String::new();
    for (key, value) in header.entries() {
        let _ = writeln!(out, "{key}: {value}");
    }
    let _ = writeln!(out, "nodes: {} ({} visible)", arena.len(), arena.visible_nodes().count());
    let _ = writeln!(out, "edges: {}", arena.edge_count());
    let _ = writeln!(out, "kinds:");
    for (name, count) in &kinds {
        let _ = writeln!(out, "  {name:<24} {count}");
    }
    if !edges.is_empty() {
        let _ = writeln!(out, "edge kinds:");
        for (name, count) in &edges {
            let _ = writeln!(out, "  {name:<24} {count}");
        }
    }
    out
}

fn run_hash(path: &Path, node: Option<u32>, config: &CliConfig) -> i32 {
    let (_, arena) = match open_graph(path) {
        Ok(opened) => opened,
        Err(e) => return report(path, &e),
    };
    match node {
        Some(id) => {
            let id = NodeId(id);
            let Some(node) = arena.get(id) else {
                eprintln!("Error: node {id} does not exist");
                return 1;
            };
            let hash = structural_hash(&arena, id, &config.hash, &mut HashSet::new());
            println!("{id}\t{}\t{}", node.kind_name(), hash.to_hex());
        }
        None => {
            let mut cache = HashCache::new();
            for (id, hash) in hash_roots(&arena, &config.hash, &mut cache) {
                let kind = arena.get(id).map(|n| n.kind_name()).unwrap_or("?");
                println!("{id}\t{kind}\t{}", hash.to_hex());
            }
            println!("graph\t{}", asg_storage::graph_hash(&arena, &config.hash).to_hex());
        }
    }
    0
}

fn run_similar(path: &Path, a: u32, b: u32, config: &CliConfig) -> i32 {
    let (_, arena) = match open_graph(path) {
        Ok(opened) => opened,
        Err(e) => return report(path, &e),
    };
    let (Some(left), Some(right)) = (arena.get(NodeId(a)), arena.get(NodeId(b))) else {
        eprintln!("Error: nodes {a} and {b} must both exist");
        return 1;
    };
    println!("{:.6}", similarity(left, right, &config.similarity));
    0
}

fn run_check(path: &Path) -> i32 {
    let (_, arena) = match open_graph(path) {
        Ok(opened) => opened,
        Err(e) => return report(path, &e),
    };
    let problems = check_graph(&arena);
    if problems.is_empty() {
        println!("ok: {} nodes, {} edges", arena.len(), arena.edge_count());
        0
    } else {
        for problem in &problems {
            eprintln!("{problem}");
        }
        eprintln!("{} problem(s) found", problems.len());
        1
    }
}

/// Cross-checks forward edges, parent pointers and the reverse index.
///
/// The index built in one pass is compared with one maintained edge by edge
/// while the graph is replayed into a fresh arena.
fn check_graph(arena: &Arena) -> Vec<String> {
    let mut problems = Vec::new();
    let index = ReverseEdges::build(arena);
    if index.edge_count() != arena.edge_count() {
        problems.push(format!(
            "reverse index holds {} edges, graph has {}",
            index.edge_count(),
            arena.edge_count()
        ));
    }
    match replay_edges(arena) {
        Ok(replayed) if replayed != index => {
            problems.push("incrementally maintained reverse index differs from a full build".to_string());
        }
        Ok(_) => {}
        Err(e) => problems.push(format!("replaying edges failed: {e}")),
    }

    let schema = arena.schema();
    for node in arena.nodes() {
        for (edge, targets) in node.edges() {
            let containment = schema.edge(edge).is_some_and(|def| def.is_containment());
            for &target in targets {
                if !index.sources(target, edge).any(|source| source == node.id()) {
                    problems.push(format!("edge {} -> {target} missing from reverse index", node.id()));
                }
                if containment && arena.parent(target).map(|p| (p.node, p.edge)) != Some((node.id(), edge)) {
                    problems.push(format!("node {target} does not record {} as its container", node.id()));
                }
            }
        }
    }
    problems
}

/// Rebuilds the node and edge structure of `arena` in a fresh arena whose
/// reverse index is enabled up front, and returns that index.
fn replay_edges(arena: &Arena) -> Result<ReverseEdges, AsgError> {
    let mut replay = Arena::new(arena.schema_arc().clone());
    replay.enable_reverse_edges();
    for node in arena.nodes() {
        replay.create_with_id(node.id(), node.kind())?;
    }
    let schema = arena.schema();
    for node in arena.nodes() {
        for (edge, targets) in node.edges() {
            let multi = schema.edge(edge).is_some_and(|def| def.is_multi());
            for &target in targets {
                if multi {
                    replay.add_edge(node.id(), edge, target)?;
                } else {
                    replay.set_edge(node.id(), edge, target)?;
                }
            }
        }
    }
    Ok(replay.reverse_edges()?.clone())
}
