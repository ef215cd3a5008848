use clap::Parser;
use ignition::cli::{check, rehearse, Cli, Commands};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let outcome = match &cli.command {
        Commands::Check(args) => check::run(args),
        Commands::Rehearse(args) => rehearse::run(args).await,
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
