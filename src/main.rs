use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use branchbox::cli::{Cli, Commands};
use branchbox::commands;

#[tokio::main]
async fn main() {
    // Logs go to stderr so `list --json` stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_file = cli.global.config_file.as_deref();

    let result = match cli.command {
        Commands::Create { branch, repo } => commands::create::run(config_file, repo, &branch).await,
        Commands::Branch {
            environment,
            new_branch,
        } => commands::branch::run(config_file, &environment, &new_branch).await,
        Commands::Start { environment } => commands::lifecycle::start(config_file, &environment).await,
        Commands::Stop { environment } => commands::lifecycle::stop(config_file, &environment).await,
        Commands::List { json } => commands::list::run(config_file, json),
        Commands::Serve { port } => commands::serve::run(config_file, port).await,
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "branchbox", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
