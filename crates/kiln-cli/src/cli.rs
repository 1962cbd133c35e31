use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kiln",
    about = "Kiln: versioned source components, shared between scopes",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Scope directory to operate on
    #[arg(short = 'C', long = "scope", global = true, default_value = ".")]
    pub scope: PathBuf,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new scope
    Init(InitArgs),
    /// Register a component without tagging it
    Track(TrackArgs),
    /// Tag the next version of a component
    Tag(TagArgs),
    /// Show the version history of a component
    Log(LogArgs),
    /// Point a component name at the scope that now owns it
    Symlink(SymlinkArgs),
    /// Delete a version, or a whole component and the symlinks leading to it
    Remove(RemoveArgs),
    /// Manage remote scopes
    Remote(RemoteArgs),
    /// Send components to a remote
    Export(TransferArgs),
    /// Bring components in from a remote
    Import(TransferArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Scope name; defaults to the directory name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct TrackArgs {
    pub name: String,
}

#[derive(Args)]
pub struct TagArgs {
    pub name: String,
    #[arg(short, long)]
    pub message: String,
    /// Files or directories to include
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,
    /// Dependency identifiers, `[scope/]name[@version]`
    #[arg(short, long = "dep")]
    pub deps: Vec<String>,
    /// patch, minor or major
    #[arg(short, long)]
    pub release: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    /// Compiler environment reference recorded on the version
    #[arg(long)]
    pub compiler: Option<String>,
    #[arg(long)]
    pub tester: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    pub id: String,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct SymlinkArgs {
    pub scope: String,
    pub name: String,
    pub real_scope: String,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// `[scope/]name[@version]`; without a version every version goes
    pub id: String,
}

#[derive(Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub action: Option<RemoteAction>,
}

#[derive(Subcommand)]
pub enum RemoteAction {
    /// Register a remote; the url is the path of its scope directory
    Add { name: String, url: String },
    Remove { name: String },
    Deprecate { name: String },
    List,
}

#[derive(Args)]
pub struct TransferArgs {
    pub remote: String,
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["kiln", "init", "--name", "acme"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.name, Some("acme".into()));
        } else { panic!("wrong command"); }
        assert_eq!(cli.scope, PathBuf::from("."));
    }

    #[test]
    fn parse_tag() {
        let cli = Cli::try_parse_from([
            "kiln", "tag", "button", "-m", "first", "-f", "src", "--dep", "acme/base@0.0.1", "-r", "minor",
        ])
        .unwrap();
        if let Command::Tag(args) = cli.command {
            assert_eq!(args.name, "button");
            assert_eq!(args.message, "first");
            assert_eq!(args.files, vec![PathBuf::from("src")]);
            assert_eq!(args.deps, vec!["acme/base@0.0.1"]);
            assert_eq!(args.release.as_deref(), Some("minor"));
            assert_eq!(args.compiler, None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn tag_requires_message() {
        assert!(Cli::try_parse_from(["kiln", "tag", "button"]).is_err());
    }

    #[test]
    fn parse_log_limit() {
        let cli = Cli::try_parse_from(["kiln", "log", "acme/button", "-n", "5"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert_eq!(args.id, "acme/button");
            assert_eq!(args.limit, Some(5));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_remote_actions() {
        let cli = Cli::try_parse_from(["kiln", "remote", "add", "origin", "/srv/acme"]).unwrap();
        if let Command::Remote(args) = cli.command {
            assert!(matches!(args.action, Some(RemoteAction::Add { .. })));
        } else { panic!("wrong command"); }

        let cli = Cli::try_parse_from(["kiln", "remote", "deprecate", "origin"]).unwrap();
        if let Command::Remote(args) = cli.command {
            assert!(matches!(args.action, Some(RemoteAction::Deprecate { .. })));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_remove() {
        let cli = Cli::try_parse_from(["kiln", "remove", "acme/button@0.0.2"]).unwrap();
        if let Command::Remove(args) = cli.command {
            assert_eq!(args.id, "acme/button@0.0.2");
        } else { panic!("wrong command"); }
        assert!(Cli::try_parse_from(["kiln", "remove"]).is_err());
    }

    #[test]
    fn transfer_needs_ids() {
        assert!(Cli::try_parse_from(["kiln", "export", "origin"]).is_err());
        let cli = Cli::try_parse_from(["kiln", "import", "origin", "acme/a", "acme/b"]).unwrap();
        if let Command::Import(args) = cli.command {
            assert_eq!(args.ids.len(), 2);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["kiln", "--verbose", "-C", "/srv/home", "--format", "json", "remote"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.scope, PathBuf::from("/srv/home"));
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
