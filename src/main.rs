use anyhow::Result;
use clap::Parser;
use searchchat::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    searchchat::run(args).await
}
