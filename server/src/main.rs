mod repl;

use peril_client::{Console, GameServer};
use peril_pubsub::{Connection, amqp_url};
use tracing_subscriber::EnvFilter;

use crate::repl::Flow;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let connection = match Connection::connect(&amqp_url()).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!(error = %e, "failed to reach the broker");
            return;
        }
    };
    let server = match GameServer::start(connection).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start game server");
            return;
        }
    };

    println!("Peril server is running. Type 'help' for commands.");
    let mut console = Console::new();
    while let Some(line) = console.next_line().await {
        match repl::run_line(&server, &line).await {
            Ok(Flow::Continue(output)) => {
                if !output.is_empty() {
                    println!("{output}");
                }
            }
            Ok(Flow::Quit) => break,
            Err(e) => println!("error: {e}"),
        }
    }

    server.close().await;
    console.exit();
}
