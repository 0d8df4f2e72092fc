use std::sync::Arc;

use clap::Parser;
use fixtures::{hydra, run_server, FixtureArgs};

/// Mock Hydra identity provider fixture server
#[derive(Parser, Debug)]
#[clap(name = "hydra-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,

    /// Subject claim minted into issued tokens
    #[clap(long, default_value = "fixture-identity")]
    subject: String,

    /// Device polls that answer `authorization_pending` before approval
    #[clap(long, default_value = "1")]
    pending_polls: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut state = hydra::HydraState::new(&args.subject);
    state.base_url = format!("http://{}:{}", args.common.host, args.common.port);
    state.pending_device_polls = std::sync::atomic::AtomicU32::new(args.pending_polls);

    let app = hydra::router(Arc::new(state));

    run_server(args.common, app).await
}
