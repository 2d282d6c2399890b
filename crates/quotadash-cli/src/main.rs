use clap::Parser;
use quotadash_cli::{run, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = std::io::stdout();
    if let Err(e) = run(cli, &mut stdout.lock()) {
        // ログのフィルタに関係なく必ず表示する
        eprintln!("error: {e:#}");
        tracing::debug!(error = ?e, "command failed");
        std::process::exit(1);
    }
}

/// `RUST_LOG` があればそれを使い、無ければ `-v` の回数でレベルを決める
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
