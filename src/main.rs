#![allow(dead_code)]

use crate::areas::repository::Repository;
use crate::commands::porcelain::init;
use crate::errors::exit_code_for;
use clap::{Parser, Subcommand};

mod areas;
mod artifacts;
mod commands;
mod errors;

#[derive(Parser)]
#[command(
    name = "sod",
    version = "0.1.0",
    about = "A digest tracker",
    long_about = "Sod is a special-purpose revision control system focused on efficient and \
    transparent large file support at the cost of limited rollback ability. \
    It tracks nothing but cryptographic digests of the actual data, keeps the \
    data itself intact, and relies on auxiliary data stores for rollback.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    #[arg(long, global = true, help = "Enable debugging output")]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Initialize a sod repository under the current working directory")]
    Init,
    #[command(about = "Summarize changes since last commit")]
    Status {
        #[arg(long, help = "Only check the index")]
        staged: bool,
        #[arg(short = 'r', long, help = "Do not use cached digests")]
        rehash: bool,
        #[arg(long, help = "Show ignored files")]
        ignored: bool,
        #[arg(long, overrides_with = "abbrev", help = "Do not abbreviate digests")]
        no_abbrev: bool,
        #[arg(long, help = "Abbreviate old content digests (default)")]
        abbrev: bool,
        #[arg(long, help = "Maximum number of file renames to try to detect")]
        rename_limit: Option<usize>,
        #[arg(help = "Patterns restricting the paths considered")]
        patterns: Vec<String>,
    },
    #[command(about = "Stage changes for recording with next commit")]
    Add {
        #[arg(help = "Patterns selecting working-tree or tracked paths")]
        patterns: Vec<String>,
    },
    #[command(about = "Reset changes staged for recording with next commit")]
    Reset {
        #[arg(help = "Patterns selecting staged paths")]
        patterns: Vec<String>,
    },
    #[command(about = "Record changes to the repository")]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(long, help = "Suppress automatic snapshot creation")]
        no_snapshot: bool,
    },
    #[command(about = "Show commit log")]
    Log {
        #[arg(long, overrides_with = "abbrev", help = "Do not abbreviate digests")]
        no_abbrev: bool,
        #[arg(long, help = "Abbreviate old content digests (default)")]
        abbrev: bool,
        #[arg(long, help = "Maximum number of file renames to try to detect")]
        rename_limit: Option<usize>,
    },
    #[command(
        about = "Show differences between two commits",
        long_about = "Show differences between two commits. NEW defaults to 'HEAD'.\n\n\
        With '--raw' each record is:\n\n\
        STATUS_LETTER ' ' OLD_DIGEST '<TAB>' OLD_PATH ['<TAB>' NEW_PATH] '<LF>'\n\n\
        and with '--null-terminated' the TAB and LF become NULs."
    )]
    Diff {
        #[arg(long, overrides_with = "abbrev", help = "Do not abbreviate digests")]
        no_abbrev: bool,
        #[arg(long, help = "Abbreviate old content digests (default)")]
        abbrev: bool,
        #[arg(long, help = "Output in a format suitable for parsing; implies --no-abbrev")]
        raw: bool,
        #[arg(long, help = "Use NULs as output field terminators; implies --raw")]
        null_terminated: bool,
        #[arg(
            long,
            help = "Limit output to Added (A), Copied (C), Deleted (D), Modified (M) or \
            Renamed (R) entries; lowercase letters select the complement"
        )]
        filter: Option<String>,
        #[arg(long, help = "Maximum number of file renames to try to detect")]
        rename_limit: Option<usize>,
        #[arg(help = "Old commit")]
        old: String,
        #[arg(help = "New commit (defaults to HEAD)")]
        new: Option<String>,
    },
    #[command(about = "Restore data from an auxiliary data store")]
    Restore {
        #[arg(help = "Path to restore")]
        path: String,
        #[arg(long, help = "Commit to restore from (defaults to the latest containing the path)")]
        at: Option<String>,
        #[arg(long, help = "Choose a particular auxiliary data store to restore from")]
        from: Option<String>,
    },
    #[command(about = "Show or set configuration options")]
    Config {
        #[arg(value_name = "NAME[=[VALUE]]", help = "Option to show, set or clear")]
        assignment: Option<String>,
    },
    #[command(about = "Manage auxiliary data stores")]
    Aux {
        #[command(subcommand)]
        command: AuxCommands,
    },
}

#[derive(Subcommand)]
enum AuxCommands {
    #[command(about = "Add an auxiliary data store")]
    Add {
        #[arg(long = "type", default_value = "plain", help = "Store type")]
        store_type: String,
        #[arg(help = "Store name")]
        name: String,
        #[arg(help = "Store URL: file://PATH or ssh://HOST/PATH, one '*' allowed in PATH")]
        url: String,
    },
    #[command(about = "List auxiliary data stores")]
    List,
    #[command(about = "Remove an auxiliary data store")]
    Remove {
        #[arg(help = "Store name")]
        name: String,
    },
    #[command(about = "Update auxiliary data store caches")]
    Update {
        #[arg(long = "all", help = "Update all auxiliary data stores")]
        update_all: bool,
        #[arg(help = "Store names")]
        names: Vec<String>,
    },
}

fn init_logging(debug: bool) {
    let filter = if debug { "sod=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

fn discover() -> anyhow::Result<Repository> {
    Repository::discover(Box::new(std::io::stdout()))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init => init::init(),
        Commands::Status {
            staged,
            rehash,
            ignored,
            no_abbrev,
            abbrev: _,
            rename_limit,
            patterns,
        } => {
            discover()?
                .status(&patterns, staged, rehash, ignored, !no_abbrev, rename_limit)
                .await
        }
        Commands::Add { patterns } => discover()?.add(&patterns).await,
        Commands::Reset { patterns } => discover()?.reset(&patterns).await,
        Commands::Commit {
            message,
            no_snapshot,
        } => discover()?.commit(&message, no_snapshot).await,
        Commands::Log {
            no_abbrev,
            abbrev: _,
            rename_limit,
        } => discover()?.log(!no_abbrev, rename_limit).await,
        Commands::Diff {
            no_abbrev,
            abbrev: _,
            raw,
            null_terminated,
            filter,
            rename_limit,
            old,
            new,
        } => {
            discover()?
                .diff(
                    &old,
                    new.as_deref(),
                    !no_abbrev,
                    raw,
                    null_terminated,
                    filter.as_deref(),
                    rename_limit,
                )
                .await
        }
        Commands::Restore { path, at, from } => {
            discover()?
                .restore(&path, at.as_deref(), from.as_deref())
                .await
        }
        Commands::Config { assignment } => discover()?.config_cmd(assignment.as_deref()).await,
        Commands::Aux { command } => match command {
            AuxCommands::Add {
                store_type,
                name,
                url,
            } => discover()?.aux_add(&name, &url, &store_type).await,
            AuxCommands::List => discover()?.aux_list().await,
            AuxCommands::Remove { name } => discover()?.aux_remove(&name).await,
            AuxCommands::Update { update_all, names } => {
                discover()?.aux_update(update_all, &names).await
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let debug = cli.debug || std::env::var("SOD_DEBUG").as_deref() == Ok("1");
    init_logging(debug);

    if let Err(error) = run(cli).await {
        eprintln!("error: {:#}", error);
        std::process::exit(exit_code_for(&error));
    }
}
