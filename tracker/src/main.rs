use clap::Parser;
use imgchain_tracker::Tracker;

#[derive(Parser)]
#[command(name = "imgchain-tracker")]
#[command(about = "Rendezvous tracker for imgchain peers", version)]
struct Args {
    /// Port to listen on, on all interfaces.
    port: u16,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let tracker = Tracker::new();
    if let Err(e) = tracker.run(args.port) {
        tracing::error!(error = %e, "tracker failed to start");
        std::process::exit(1);
    }
}
