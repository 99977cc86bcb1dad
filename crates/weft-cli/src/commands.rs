use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;
use weft_crypto::Host;
use weft_dag::{Link, Node as DagNode};
use weft_node::{Node, NodeConfig};
use weft_record::{Record, SignatureValidator, SignedRecord};
use weft_recordstore::{collect_valid, RecordKey};
use weft_types::{ContentAddress, HashAlgorithm, Path as ContentPath};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command, repo, format, ..
    } = cli;
    let out = Output { format };
    match command {
        Command::Init(args) => cmd_init(&repo, args, &out),
        Command::Id => cmd_id(&open(&repo)?, &out),
        Command::Block(cmd) => cmd_block(&open(&repo)?, cmd, &out).await,
        Command::Dag(cmd) => cmd_dag(&open(&repo)?, cmd, &out).await,
        Command::Record(cmd) => cmd_record(&open(&repo)?, cmd, &out).await,
        Command::Provide(args) => cmd_provide(&open(&repo)?, args, &out).await,
        Command::Providers(args) => cmd_providers(&open(&repo)?, args, &out).await,
    }
}

struct Output {
    format: OutputFormat,
}

impl Output {
    /// Print `value` as JSON, or run `text` for human output.
    fn emit(&self, value: Value, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }
}

fn open(repo: &Path) -> anyhow::Result<Node> {
    debug!(repo = %repo.display(), "opening repository");
    Node::open(repo).with_context(|| format!("opening repository {} (run `weft init`?)", repo.display()))
}

fn parse_key(s: &str) -> anyhow::Result<ContentAddress> {
    s.parse().with_context(|| format!("invalid content address {s:?}"))
}

fn preview(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<{} bytes>", bytes.len()),
    }
}

// ---------------------------------------------------------------------------
// init / id
// ---------------------------------------------------------------------------

fn cmd_init(repo: &Path, args: InitArgs, out: &Output) -> anyhow::Result<()> {
    let hash_algorithm: HashAlgorithm = args.hash.parse()?;
    let node = Node::init(
        repo,
        NodeConfig {
            hash_algorithm,
            ..NodeConfig::default()
        },
    )?;
    out.emit(
        json!({ "repo": repo.display().to_string(), "id": node.id().to_string() }),
        || {
            println!("{} Initialized weft repository in {}", "✓".green().bold(), repo.display().to_string().bold());
            println!("  Peer: {}", node.id().to_string().cyan());
            println!("  Hash: {}", hash_algorithm.to_string().yellow());
        },
    )
}

fn cmd_id(node: &Node, out: &Output) -> anyhow::Result<()> {
    let public_key = hex::encode(node.host().public_key().to_bytes());
    out.emit(
        json!({
            "id": node.id().to_string(),
            "public_key": public_key,
            "hash": node.config().hash_algorithm.to_string(),
        }),
        || {
            println!("Peer:       {}", node.id().to_string().cyan().bold());
            println!("Public key: {}", public_key.dimmed());
            println!("Hash:       {}", node.config().hash_algorithm.to_string().yellow());
        },
    )
}

// ---------------------------------------------------------------------------
// block
// ---------------------------------------------------------------------------

async fn cmd_block(node: &Node, cmd: BlockCommand, out: &Output) -> anyhow::Result<()> {
    match cmd {
        BlockCommand::Put { paths } => {
            let mut added = Vec::new();
            for file in expand_paths(&paths)? {
                let data = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
                let key = node.add_block(data)?;
                added.push((key, file));
            }
            out.emit(
                Value::Array(
                    added
                        .iter()
                        .map(|(k, p)| json!({ "key": k.to_hex(), "path": p.display().to_string() }))
                        .collect(),
                ),
                || {
                    for (key, path) in &added {
                        println!("{} {} {}", "added".green(), key.to_hex().yellow(), path.display());
                    }
                },
            )
        }
        BlockCommand::Get { key, output } => {
            let key = parse_key(&key)?;
            let block = node.get_block(&key, CancellationToken::new()).await?;
            if let Some(path) = output {
                fs::write(&path, block.data()).with_context(|| format!("writing {}", path.display()))?;
                return out.emit(json!({ "key": key.to_hex(), "written": path.display().to_string() }), || {
                    println!("{} {} bytes to {}", "wrote".green(), block.len(), path.display());
                });
            }
            match out.format {
                OutputFormat::Json => out.emit(json!({ "key": key.to_hex(), "data": hex::encode(block.data()) }), || {}),
                OutputFormat::Text => {
                    std::io::stdout().write_all(block.data())?;
                    Ok(())
                }
            }
        }
        BlockCommand::Stat { key } => {
            let key = parse_key(&key)?;
            let block = node.blocks().get(&key)?;
            let links = DagNode::decode(block.data()).ok().map(|n| n.links().len());
            out.emit(
                json!({
                    "key": key.to_hex(),
                    "algorithm": key.algorithm().to_string(),
                    "size": block.len(),
                    "links": links,
                }),
                || {
                    println!("Key:       {}", key.to_hex().yellow());
                    println!("Algorithm: {}", key.algorithm());
                    println!("Size:      {} bytes", block.len());
                    if let Some(n) = links {
                        println!("DAG node:  {n} links");
                    }
                },
            )
        }
        BlockCommand::Rm { keys } => {
            let mut removed = Vec::new();
            for key in &keys {
                let key = parse_key(key)?;
                node.block_service().delete(&key)?;
                removed.push(key.to_hex());
            }
            out.emit(json!(removed), || {
                for key in &removed {
                    println!("{} {}", "removed".red(), key.yellow());
                }
            })
        }
        BlockCommand::Ls => {
            let keys: Vec<String> = node.blocks().all_keys()?.map(|k| k.to_hex()).collect();
            out.emit(json!(keys), || {
                if keys.is_empty() {
                    println!("No blocks.");
                }
                for key in &keys {
                    println!("{key}");
                }
            })
        }
    }
}

/// Files named directly, plus every file under named directories.
fn expand_paths(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// dag
// ---------------------------------------------------------------------------

/// JSON description of a node for `dag put`.
#[derive(Debug, Deserialize)]
struct NodeSpec {
    #[serde(default)]
    data: String,
    #[serde(default)]
    links: Vec<LinkSpec>,
}

#[derive(Debug, Deserialize)]
struct LinkSpec {
    name: String,
    target: String,
}

/// Build a node from its JSON description. Link targets must be stored
/// locally so their sizes can be recorded.
fn build_node(node: &Node, spec: NodeSpec) -> anyhow::Result<DagNode> {
    let mut links = Vec::with_capacity(spec.links.len());
    for link in spec.links {
        let target = parse_key(&link.target)?;
        let block = node
            .blocks()
            .get(&target)
            .with_context(|| format!("link {:?} target is not stored locally", link.name))?;
        let size = match DagNode::decode(block.data()) {
            Ok(child) => child.cumulative_size()?,
            Err(_) => block.len() as u64,
        };
        links.push(Link::new(link.name, size, target));
    }
    Ok(DagNode::new(spec.data.into_bytes(), links)?)
}

async fn cmd_dag(node: &Node, cmd: DagCommand, out: &Output) -> anyhow::Result<()> {
    match cmd {
        DagCommand::Put { file } => {
            let text = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let spec: NodeSpec = serde_json::from_str(&text).context("parsing node description")?;
            let dag_node = build_node(node, spec)?;
            let key = node.dag().add(&dag_node)?;
            out.emit(json!({ "key": key.to_hex() }), || {
                println!("{} {}", "added".green(), key.to_hex().yellow());
            })
        }
        DagCommand::Get { target } => {
            let dag_node = resolve(node, &target).await?;
            out.emit(
                json!({ "data": preview(dag_node.data()), "links": links_json(&dag_node) }),
                || {
                    println!("{}", preview(dag_node.data()));
                    print_links(&dag_node);
                },
            )
        }
        DagCommand::Links { target } => {
            let dag_node = resolve(node, &target).await?;
            out.emit(links_json(&dag_node), || print_links(&dag_node))
        }
        DagCommand::Resolve { path } => {
            let parsed = ContentPath::parse(&path)?;
            let key = node.dag().resolve_address(&parsed, CancellationToken::new()).await?;
            out.emit(json!({ "path": path, "key": key.to_hex() }), || println!("{}", key.to_hex()))
        }
    }
}

async fn resolve(node: &Node, target: &str) -> anyhow::Result<DagNode> {
    let path = ContentPath::parse(target)?;
    Ok(node.dag().resolve_path(&path, CancellationToken::new()).await?)
}

fn links_json(dag_node: &DagNode) -> Value {
    Value::Array(
        dag_node
            .links()
            .iter()
            .map(|l| json!({ "name": l.name, "size": l.size, "target": l.target.to_hex() }))
            .collect(),
    )
}

fn print_links(dag_node: &DagNode) {
    for link in dag_node.links() {
        println!("  {} {} {}", link.name.bold(), link.size.to_string().dimmed(), link.target.to_hex().yellow());
    }
}

// ---------------------------------------------------------------------------
// record / provide
// ---------------------------------------------------------------------------

fn record_json(signed: &SignedRecord) -> Value {
    json!({
        "version": signed.record().version(),
        "value": preview(signed.record().value()),
        "signer": signed.signer_id().to_string(),
    })
}

fn print_record(signed: &SignedRecord) {
    println!(
        "{} {} {}",
        format!("v{}", signed.record().version()).yellow().bold(),
        preview(signed.record().value()),
        format!("(signed by {})", signed.signer_id().short_id()).dimmed()
    );
}

async fn cmd_record(node: &Node, cmd: RecordCommand, out: &Output) -> anyhow::Result<()> {
    match cmd {
        RecordCommand::Put { key, value, version } => {
            let key = RecordKey::new(key);
            let signed = node
                .publish(&key, Record::new(version, value.into_bytes(), Vec::new()))
                .await?;
            out.emit(record_json(&signed), || {
                print!("{} {} ", "published".green(), key.to_string().bold());
                print_record(&signed);
            })
        }
        RecordCommand::Get { key, all: false } => {
            let key = RecordKey::new(key);
            match node.resolve(&key, CancellationToken::new()).await? {
                Some(signed) => out.emit(record_json(&signed), || print_record(&signed)),
                None => bail!("no valid record under {key}"),
            }
        }
        RecordCommand::Get { key, all: true } => {
            let key = RecordKey::new(key);
            let stream = node.records().get(&key, CancellationToken::new());
            let (records, current) = collect_valid(stream, &SignatureValidator).await;
            let signed = records
                .iter()
                .map(SignedRecord::from_record)
                .collect::<Result<Vec<_>, _>>()?;
            out.emit(
                json!({
                    "current": current.map(|r| r.version()),
                    "records": signed.iter().map(record_json).collect::<Vec<_>>(),
                }),
                || {
                    if signed.is_empty() {
                        println!("No valid records under {key}.");
                    }
                    for s in &signed {
                        print_record(s);
                    }
                },
            )
        }
    }
}

async fn cmd_provide(node: &Node, args: ProvideArgs, out: &Output) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    if !node.blocks().has(&key)? {
        bail!("block {} is not stored locally", key.short_hex());
    }
    let record = node.provide(&key).await?;
    let published = record.claim().published_at().map(|t| t.to_rfc3339());
    out.emit(
        json!({ "key": key.to_hex(), "provider": node.id().to_string(), "published_at": published }),
        || {
            println!("{} Providing {}", "✓".green().bold(), key.to_hex().yellow());
        },
    )
}

async fn cmd_providers(node: &Node, args: ProvidersArgs, out: &Output) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    let timeout = Duration::from_millis(args.timeout_ms);
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        timer.cancel();
    });
    let providers: Vec<String> = node
        .find_providers(&key, cancel)
        .map(|p| p.to_string())
        .collect()
        .await;
    out.emit(json!(providers), || {
        if providers.is_empty() {
            println!("No providers for {}.", key.short_hex());
        }
        for p in &providers {
            println!("{}", p.cyan());
        }
    })
}
