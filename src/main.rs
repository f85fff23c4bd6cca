use anyhow::Result;
use clap::Parser;
use tabgroup::cli::{AppContext, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tabgroup::infra::logging::init(cli.verbose, cli.quiet);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        config: cli.config,
    };

    match cli.command {
        Commands::Cluster(args) => tabgroup::cli_ext::cluster_cmd::run(args, &ctx),
        Commands::Eval(args) => tabgroup::cli_ext::eval_cmd::run(args, &ctx),
        Commands::Init(args) => tabgroup::infra::config::init(args, &ctx),
        Commands::Completions(args) => tabgroup::completion::run(args, &ctx),
    }
}
