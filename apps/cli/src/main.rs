use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value as SerdeValue};
use vaultview_core::{extract_references, RecordKind, ReferenceKind};
use vaultview_project::{
    BundleSource, DocumentView, ResolvedAsset, SessionAction, TreeNode, ViewerStore,
};
use vaultview_settings::{Preferences, PreferencesStore};

mod logging;

#[derive(Parser)]
#[command(
    name = "vaultview-cli",
    about = "Browse markdown vault bundles from the terminal",
    author,
    version
)]
struct Cli {
    /// 偏好設定檔路徑。 / Preferences file (defaults to `.vaultview/preferences.json`).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// 日誌層級或過濾字串。 / Log level or filter directive; `VAULTVIEW_LOG` overrides it.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 顯示資料夾樹。 / Print the bundle's folder tree.
    Tree(TreeArgs),
    /// 顯示文件內容與參照。 / Print a document and how each of its references resolves.
    Show(ShowArgs),
    /// 解析單一參照。 / Resolve one reference as written inside a document.
    Resolve(ResolveArgs),
    /// 匯入摘要與異常。 / Summarize ingestion and list anomalies.
    Check(CheckArgs),
    /// 套用工作階段動作。 / Apply session actions and print the resulting session.
    Session(SessionArgs),
    /// 檢視或修改偏好設定。 / Print the preferences, or change them with `--set`.
    Config(ConfigArgs),
}

#[derive(Args)]
struct BundleArg {
    /// `.zip` 壓縮檔或資料夾。 / A `.zip` archive or a folder.
    #[arg(value_name = "BUNDLE")]
    bundle: PathBuf,
}

#[derive(Args)]
struct TreeArgs {
    #[command(flatten)]
    source: BundleArg,
    /// 顯示隱藏項目。 / Include hidden entries.
    #[arg(long)]
    all: bool,
    /// 以 JSON 輸出。 / Emit JSON instead of an indented listing.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ShowArgs {
    #[command(flatten)]
    source: BundleArg,
    /// 文件路徑。 / Full path of the document inside the bundle.
    #[arg(value_name = "PATH")]
    path: String,
}

#[derive(Args)]
struct ResolveArgs {
    #[command(flatten)]
    source: BundleArg,
    /// 參照所在的文件。 / Document the reference appears in.
    #[arg(value_name = "DOCUMENT")]
    document: String,
    /// 要解析的參照。 / Reference exactly as written.
    #[arg(value_name = "URI")]
    uri: String,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    source: BundleArg,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SessionArgs {
    #[command(flatten)]
    source: BundleArg,
    /// `select=P`, `close=P`, `activate=P`, `reorder=P1,P2,...` or `reset`.
    #[arg(value_name = "ACTION", required = true, value_parser = parse_session_action)]
    actions: Vec<SessionAction>,
}

#[derive(Args)]
struct ConfigArgs {
    /// `KEY=VALUE`, e.g. `tree.show_hidden=true`; may repeat.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        log_level,
        command,
    } = Cli::parse();
    let mut store = load_preferences(config)?;
    let preferences = store.preferences().clone();
    logging::init_logging(log_level.as_deref(), &preferences.logging.level)?;

    match command {
        Commands::Tree(args) => execute_tree(args, &preferences),
        Commands::Show(args) => execute_show(args, &preferences),
        Commands::Resolve(args) => execute_resolve(args, &preferences),
        Commands::Check(args) => execute_check(args, &preferences),
        Commands::Session(args) => execute_session(args, &preferences),
        Commands::Config(args) => execute_config(args, &mut store),
    }
}

fn load_preferences(config: Option<PathBuf>) -> Result<PreferencesStore> {
    let path = match config {
        Some(path) => resolve_input_path(&path)?,
        None => std::env::current_dir()
            .context("determine current directory")?
            .join(".vaultview")
            .join("preferences.json"),
    };
    PreferencesStore::load(&path)
        .with_context(|| format!("load preferences from {}", path.display()))
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}

fn open_bundle(arg: &BundleArg, preferences: &Preferences) -> Result<ViewerStore> {
    let path = resolve_input_path(&arg.bundle)?;
    let source = if path.is_dir() {
        BundleSource::Folder(path)
    } else {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("'{}' is not a file or folder", path.display()))?;
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        BundleSource::Archive { name, bytes }
    };

    let mut store = ViewerStore::new(
        preferences.ingest_options(),
        preferences.resolver_options(),
    );
    if let Err(err) = store.load(source) {
        tracing::debug!(error = ?err, "load failed");
        bail!("{}", err.user_message());
    }
    Ok(store)
}

fn execute_tree(args: TreeArgs, preferences: &Preferences) -> Result<()> {
    let store = open_bundle(&args.source, preferences)?;
    let state = store.state();
    let bundle = state
        .bundle
        .as_ref()
        .ok_or_else(|| anyhow!("no bundle loaded"))?;

    let mut options = preferences.presentation_options();
    options.show_hidden |= args.all;
    let entries = bundle.tree.walk(&options);

    if args.json {
        let rows: Vec<SerdeValue> = entries
            .iter()
            .map(|entry| {
                json!({
                    "path": entry.path,
                    "name": entry.name,
                    "depth": entry.depth,
                    "kind": node_kind(entry.node),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for entry in &entries {
        let indent = "  ".repeat(entry.depth);
        if entry.node.is_folder() {
            println!("{indent}{}/", entry.name);
        } else {
            println!("{indent}{}", entry.name);
        }
    }
    Ok(())
}

fn node_kind(node: &TreeNode) -> &'static str {
    match node.record() {
        Some(record) => record.kind().name(),
        None => "folder",
    }
}

fn execute_show(args: ShowArgs, preferences: &Preferences) -> Result<()> {
    let mut store = open_bundle(&args.source, preferences)?;
    store
        .select(&args.path)
        .map_err(|rejection| anyhow!("{rejection}"))?;
    let view = store
        .document(&args.path)
        .ok_or_else(|| anyhow!("{} cannot be displayed", args.path))?;

    println!("{}", view.body());
    if let DocumentView::Markdown { text, .. } = &view {
        let references = extract_references(text);
        if !references.is_empty() {
            println!();
            println!("References:");
        }
        for reference in references {
            let kind = match reference.kind {
                ReferenceKind::Image => "image",
                ReferenceKind::Link => "link",
            };
            let resolved = store.resolve_asset(&args.path, &reference.target);
            println!("  [{kind}] {} -> {}", reference.target, describe(&resolved));
        }
    }
    Ok(())
}

fn execute_resolve(args: ResolveArgs, preferences: &Preferences) -> Result<()> {
    let mut store = open_bundle(&args.source, preferences)?;
    if let Err(rejection) = store.select(&args.document) {
        tracing::debug!(%rejection, "resolving without an open document");
    }
    let resolved = store.resolve_asset(&args.document, &args.uri);
    println!("{}", describe(&resolved));
    Ok(())
}

fn describe(resolved: &ResolvedAsset) -> String {
    match resolved {
        ResolvedAsset::External(uri) => format!("external {uri}"),
        ResolvedAsset::Record {
            record, strategy, ..
        } => format!("{} ({strategy}, {})", record.path(), record.kind()),
        ResolvedAsset::Unresolved { fallback } => format!("unresolved \"{fallback}\""),
    }
}

fn execute_check(args: CheckArgs, preferences: &Preferences) -> Result<()> {
    let store = open_bundle(&args.source, preferences)?;
    let state = store.state();
    let bundle = state
        .bundle
        .as_ref()
        .ok_or_else(|| anyhow!("no bundle loaded"))?;

    let count = |kind: RecordKind| bundle.index.iter().filter(|r| r.kind() == kind).count();
    let text = count(RecordKind::Text);
    let binary = count(RecordKind::Binary);
    let unclassified = count(RecordKind::Unclassified);

    if args.json {
        let anomalies: Vec<SerdeValue> = state
            .diagnostics
            .iter()
            .map(|anomaly| {
                json!({
                    "code": anomaly.code(),
                    "path": anomaly.path(),
                    "message": anomaly.to_string(),
                })
            })
            .collect();
        let report = json!({
            "records": bundle.index.len(),
            "text": text,
            "binary": binary,
            "unclassified": unclassified,
            "placed": bundle.placed_count(),
            "anomalies": anomalies,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} records ({text} text, {binary} binary, {unclassified} unclassified), {} in tree",
        bundle.index.len(),
        bundle.placed_count()
    );
    if state.diagnostics.is_empty() {
        println!("No anomalies.");
    } else {
        println!("{} anomalies:", state.diagnostics.len());
        for anomaly in state.diagnostics.iter() {
            println!("  {}: {anomaly}", anomaly.code());
        }
    }
    Ok(())
}

fn execute_session(args: SessionArgs, preferences: &Preferences) -> Result<()> {
    let mut store = open_bundle(&args.source, preferences)?;
    for action in args.actions {
        if let Err(rejection) = store.apply(action) {
            eprintln!("rejected: {rejection}");
        }
    }
    println!("{}", serde_json::to_string_pretty(store.session())?);
    Ok(())
}

fn execute_config(args: ConfigArgs, store: &mut PreferencesStore) -> Result<()> {
    if !args.set.is_empty() {
        let mut updated = store.preferences().clone();
        for assignment in &args.set {
            apply_setting(&mut updated, assignment)?;
        }
        store
            .update(|prefs| *prefs = updated.clone())
            .with_context(|| format!("save preferences to {}", store.path().display()))?;
        tracing::info!(path = %store.path().display(), "preferences saved");
    }
    println!("{}", serde_json::to_string_pretty(store.preferences())?);
    Ok(())
}

fn apply_setting(prefs: &mut Preferences, assignment: &str) -> Result<()> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got `{assignment}`"))?;
    let value = value.trim();
    match key.trim() {
        "ingest.max_path_components" => {
            prefs.ingest.max_path_components = value
                .parse()
                .with_context(|| format!("`{value}` is not a component count"))?;
        }
        "tree.hidden_prefix" => prefs.tree.hidden_prefix = value.to_string(),
        "tree.show_hidden" => {
            prefs.tree.show_hidden = value
                .parse()
                .with_context(|| format!("`{value}` is not true or false"))?;
        }
        "resolver.passthrough_schemes" => {
            prefs.resolver.passthrough_schemes = value.split(',').map(str::to_string).collect();
        }
        "logging.level" => prefs.logging.level = value.to_string(),
        other => bail!("unknown preference `{other}`"),
    }
    Ok(())
}

fn parse_session_action(raw: &str) -> Result<SessionAction, String> {
    if raw == "reset" {
        return Ok(SessionAction::Reset);
    }
    let (verb, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected VERB=PATH or `reset`, got `{raw}`"))?;
    if value.is_empty() {
        return Err(format!("`{verb}` needs a path"));
    }
    match verb {
        "select" => Ok(SessionAction::Select(value.to_string())),
        "close" => Ok(SessionAction::Close(value.to_string())),
        "activate" => Ok(SessionAction::Activate(value.to_string())),
        "reorder" => Ok(SessionAction::Reorder(
            value
                .split(',')
                .filter(|path| !path.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        other => Err(format!("unknown session action `{other}`")),
    }
}
