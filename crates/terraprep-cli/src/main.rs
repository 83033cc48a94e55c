use clap::{Parser, Subcommand};
use terraprep::{
    commands::{
        config::{self, ConfigAction},
        infer, resolve, rewrite_tables,
    },
    init_tracing, logger, GlobalOpts,
};

#[derive(Parser)]
#[command(name = "terraprep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Workflow input preparation",
    long_about = "terraprep resolves workflow input manifests against lookup tables and stages remote objects locally."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a workflow input manifest and fetch the objects it needs
    Resolve(resolve::ResolveCommand),
    /// Copy a directory of tables, localizing remote values in selected tables
    RewriteTables(rewrite_tables::RewriteTablesCommand),
    /// Show the type inferred for each value
    Infer {
        /// Raw values to classify
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Configure terraprep
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level()) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing();

    let result = match cli.command {
        Commands::Resolve(cmd) => resolve::handle_resolve(cmd, &cli.global),
        Commands::RewriteTables(cmd) => rewrite_tables::handle_rewrite_tables(cmd, &cli.global),
        Commands::Infer { values } => {
            infer::handle_infer(&values);
            Ok(())
        }
        Commands::Config { action } => {
            config::handle_config(action.unwrap_or(ConfigAction::Show), &cli.global)
        }
    };

    if let Err(e) = result {
        logger::error(&e.to_string());
        std::process::exit(1);
    }
}
