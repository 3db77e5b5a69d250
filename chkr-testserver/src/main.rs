use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;

/// Serves the chkr test routes until Ctrl-C.
#[derive(Debug, Parser)]
#[command(name = "chkr-testserver", version)]
struct Args {
    /// Address to listen on; port 0 picks a free one.
    #[arg(long, default_value = "127.0.0.1:0")]
    bind: SocketAddr,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let listener = TcpListener::bind(args.bind).await?;
    let app = chkr_testserver::router(chkr_testserver::TestServerStats::default());

    // Scripts wait for this line before pointing chkr at the server.
    println!("BASE_URL=http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
