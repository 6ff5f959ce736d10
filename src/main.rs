use clap::Parser;

use codecell::config::CliArgs;
use codecell::{ExecutionRequest, Executor, Outcome};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().expect("Failed to load configuration");
    let source_code = std::fs::read_to_string(&cli.source_path)?;

    let executor = Executor::new(config).expect("Failed to initialize executor");

    let result = executor
        .execute(ExecutionRequest {
            source_code,
            language: cli.language.clone(),
        })
        .await;

    println!(
        "{}",
        serde_json::to_string_pretty(&result).expect("result is serializable")
    );

    if result.outcome != Outcome::Success {
        std::process::exit(1);
    }
    Ok(())
}
