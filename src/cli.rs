use crate::command;
use crate::command::args::SlingArgs;
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "polecats")]
#[command(about = "Dispatch work into a pool of reusable git worktree sandboxes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch work into a polecat, reusing an idle one or creating a fresh one
    Sling(SlingArgs),

    /// List polecats and their states
    #[command(visible_alias = "ls")]
    List {
        /// Only show this rig
        rig: Option<String>,

        /// Only show idle polecats
        #[arg(long)]
        idle: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop a polecat's session and return it to the idle pool
    Release {
        /// Rig the polecat belongs to
        rig: String,

        /// Polecat name
        name: String,
    },

    /// Destroy a polecat: stop its session, remove its worktree and branch
    Destroy {
        /// Rig the polecat belongs to
        rig: String,

        /// Polecat name
        name: String,

        /// Leave the worktree and branch on disk
        #[arg(long)]
        keep_worktree: bool,
    },

    /// Show recent dispatch events
    Events {
        /// Only show this rig
        rig: Option<String>,

        /// Number of events to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Generate example .polecats.yaml configuration file
    Init,

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sling(args) => command::sling::run(args),
        Commands::List { rig, idle, json } => command::list::run(rig.as_deref(), idle, json),
        Commands::Release { rig, name } => command::release::run(&rig, &name),
        Commands::Destroy {
            rig,
            name,
            keep_worktree,
        } => command::destroy::run(&rig, &name, keep_worktree),
        Commands::Events { rig, limit } => command::events::run(rig.as_deref(), limit),
        Commands::Init => crate::config::Config::init(),
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
