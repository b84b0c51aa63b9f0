use token_counter::bootstrap;
use token_counter::cli::{self, CliOptions};
use token_counter::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches();
    let opts = CliOptions::from_matches(&matches);

    cli::init_logging(opts.log_level.as_deref());

    if opts.version {
        println!("token-counter {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let cfg = Config::load(&opts)?;
    bootstrap::run_program(cfg).await
}
