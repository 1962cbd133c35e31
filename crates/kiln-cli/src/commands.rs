use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use walkdir::WalkDir;

use kiln_scope::{
    get_component_logs, loopback_remote, LogEntry, Scope, ScopeConfig, TagRequest,
};
use kiln_sync::Remote;
use kiln_types::{BitId, ReleaseType};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let root = cli.scope.as_path();
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Init(args) => cmd_init(root, args),
        Command::Track(args) => cmd_track(root, args),
        Command::Tag(args) => cmd_tag(root, args, json).await,
        Command::Log(args) => cmd_log(root, args, json),
        Command::Symlink(args) => cmd_symlink(root, args),
        Command::Remove(args) => cmd_remove(root, args, json).await,
        Command::Remote(args) => cmd_remote(root, args, json).await,
        Command::Export(args) => cmd_export(root, args, json).await,
        Command::Import(args) => cmd_import(root, args, json).await,
    }
}

fn open(root: &Path) -> anyhow::Result<Scope> {
    Scope::open(root).with_context(|| format!("no scope at {}", root.display()))
}

fn parse_ids(ids: &[String]) -> anyhow::Result<Vec<BitId>> {
    ids.iter()
        .map(|s| BitId::parse(s).with_context(|| format!("invalid identifier {s}")))
        .collect()
}

/// A remote from the registry, served in-process from its scope directory.
fn connect(scope: &Scope, name: &str) -> anyhow::Result<Remote> {
    let entry = scope
        .remotes()
        .get(name)
        .with_context(|| format!("unknown remote {name}"))?;
    let served = Scope::open(Path::new(&entry.url))
        .with_context(|| format!("cannot open remote {name} at {}", entry.url))?;
    let timeout = Duration::from_millis(scope.config().request_timeout_ms);
    let (remote, _) = loopback_remote(name, Arc::new(served), timeout);
    Ok(remote)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(root: &Path, args: InitArgs) -> anyhow::Result<()> {
    let name = match args.name {
        Some(name) => name,
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .or_else(|| {
                let abs = root.canonicalize().ok()?;
                abs.file_name().map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| ScopeConfig::default().name),
    };
    let scope = Scope::init(root, ScopeConfig::new(name))?;
    println!(
        "{} Initialized scope {} in {}",
        "✓".green().bold(),
        scope.name().cyan(),
        root.display().to_string().bold()
    );
    Ok(())
}

fn cmd_track(root: &Path, args: TrackArgs) -> anyhow::Result<()> {
    let key = open(root)?.track(&args.name)?;
    println!("{} Tracking {}", "✓".green(), key.to_string().yellow());
    Ok(())
}

/// Files under `path` with paths relative to it; a plain file keeps the
/// path it was given.
fn collect_files(path: &Path) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    if path.is_file() {
        let contents = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        return Ok(vec![(slash_path(path), contents)]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(path)?;
        let contents = fs::read(entry.path())
            .with_context(|| format!("cannot read {}", entry.path().display()))?;
        files.push((slash_path(relative), contents));
    }
    Ok(files)
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

async fn cmd_tag(root: &Path, args: TagArgs, json: bool) -> anyhow::Result<()> {
    let scope = open(root)?;
    let mut request = TagRequest::new(&args.name, &args.message);
    for path in &args.files {
        for (relative, contents) in collect_files(path)? {
            request = request.file(relative, contents);
        }
    }
    for dep in parse_ids(&args.deps)? {
        request = request.dependency(dep);
    }
    if let Some(release) = &args.release {
        request = request.release(release.parse::<ReleaseType>()?);
    }
    request.username = args.author;
    request.email = args.email;
    request.compiler = args.compiler;
    request.tester = args.tester;

    let tagged = scope.tag(request).await?;
    if json {
        return print_json(&tagged);
    }
    match tagged.previous {
        Some(prev) => println!(
            "{} Tagged {} ({} → {})",
            "✓".green().bold(),
            tagged.id.to_string().yellow(),
            prev,
            tagged.version.to_string().green()
        ),
        None => println!("{} Tagged {}", "✓".green().bold(), tagged.id.to_string().yellow()),
    }
    Ok(())
}

fn print_entry(entry: &LogEntry) {
    println!("{}  {}", entry.version.to_string().yellow().bold(), entry.id.to_string().dimmed());
    if let Some(user) = &entry.username {
        match &entry.email {
            Some(email) => println!("  Author: {user} <{email}>"),
            None => println!("  Author: {user}"),
        }
    }
    println!("  Date:   {}", entry.date / 1000);
    println!("  Files:  {}", entry.files);
    println!("  {}\n", entry.message);
}

fn cmd_log(root: &Path, args: LogArgs, json: bool) -> anyhow::Result<()> {
    let scope = open(root)?;
    let mut entries = get_component_logs(&scope, &args.id)?;
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("{} has no tagged versions.", args.id.yellow());
    }
    entries.iter().for_each(print_entry);
    Ok(())
}

fn cmd_symlink(root: &Path, args: SymlinkArgs) -> anyhow::Result<()> {
    let link = open(root)?.symlink(&args.scope, &args.name, &args.real_scope)?;
    println!(
        "{} {} → {}",
        "✓".green(),
        link.id().to_string().yellow(),
        link.real_component_id().to_string().cyan()
    );
    Ok(())
}

async fn cmd_remove(root: &Path, args: RemoveArgs, json: bool) -> anyhow::Result<()> {
    let scope = open(root)?;
    let id = BitId::parse(&args.id).with_context(|| format!("invalid identifier {}", args.id))?;
    let report = scope.remove(&id).await?;
    if json {
        return print_json(&report);
    }
    for version in &report.versions {
        println!("  {} {}", "removed:".red(), version);
    }
    for link in &report.symlinks {
        println!("  {} {}", "unlinked:".red(), link);
    }
    println!("{} {} versions removed", "✓".green().bold(), report.versions.len());
    Ok(())
}

async fn cmd_remote(root: &Path, args: RemoteArgs, json: bool) -> anyhow::Result<()> {
    let scope = open(root)?;
    match args.action {
        Some(RemoteAction::Add { name, url }) => {
            scope.add_remote(&name, &url)?;
            println!("Added remote {} → {}", name.bold(), url.blue());
        }
        Some(RemoteAction::Remove { name }) => {
            scope.remove_remote(&name).await?;
            println!("Removed remote {}", name.bold());
        }
        Some(RemoteAction::Deprecate { name }) => {
            scope.deprecate_remote(&name).await?;
            println!("Deprecated remote {}", name.bold());
        }
        Some(RemoteAction::List) | None => {
            let remotes = scope.remotes().list();
            if json {
                return print_json(&remotes);
            }
            if remotes.is_empty() {
                println!("No remotes configured.");
            }
            for r in remotes {
                let marker = if r.deprecated { " (deprecated)".red().to_string() } else { String::new() };
                println!("{}\t{}{}", r.name.bold(), r.url.blue(), marker);
            }
        }
    }
    Ok(())
}

async fn cmd_export(root: &Path, args: TransferArgs, json: bool) -> anyhow::Result<()> {
    let scope = open(root)?;
    let ids = parse_ids(&args.ids)?;
    let remote = connect(&scope, &args.remote)?;
    let report = scope.export(&ids, &remote).await?;
    if json {
        return print_json(&report);
    }
    for id in &report.exported {
        println!("  {} {}", "exported:".green(), id);
    }
    for rejected in &report.rejected {
        println!(
            "  {} {} ({}: {})",
            "rejected:".red(),
            rejected.id,
            rejected.reason,
            rejected.detail
        );
    }
    if report.is_complete() {
        println!("{} {} objects accepted by {}", "✓".green().bold(), report.accepted.len(), args.remote.bold());
        Ok(())
    } else {
        anyhow::bail!("{} objects rejected by {}", report.rejected.len(), args.remote)
    }
}

async fn cmd_import(root: &Path, args: TransferArgs, json: bool) -> anyhow::Result<()> {
    let scope = open(root)?;
    let ids = parse_ids(&args.ids)?;
    let remote = connect(&scope, &args.remote)?;
    let report = scope.import(&ids, &remote).await?;
    if json {
        return print_json(&report);
    }
    for id in &report.already_local {
        println!("  {} {}", "up to date:".dimmed(), id);
    }
    for id in &report.imported {
        println!("  {} {}", "imported:".green(), id);
    }
    println!("{} {} objects written", "✓".green().bold(), report.objects_written);
    Ok(())
}
