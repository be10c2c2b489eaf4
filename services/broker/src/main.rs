use broker::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone())),
        )
        .init();

    if let Err(err) = broker::run(cli).await {
        eprintln!("broker failed: {err}");
        std::process::exit(1);
    }
}
