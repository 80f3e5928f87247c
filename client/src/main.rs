mod repl;

use peril_client::{Console, Session};
use peril_pubsub::{Connection, amqp_url};
use tracing_subscriber::EnvFilter;

use crate::repl::Flow;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut console = Console::new();
    let username = match std::env::args().nth(1) {
        Some(username) => username,
        None => {
            println!("Enter your username:");
            match console.next_line().await {
                Some(line) => line.trim().to_string(),
                None => return,
            }
        }
    };

    let connection = match Connection::connect(&amqp_url()).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!(error = %e, "failed to reach the broker");
            return;
        }
    };
    let session = match Session::start(connection, &username).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(player = %username, error = %e, "failed to join the game");
            return;
        }
    };

    println!("Welcome to Peril, {username}. Type 'help' for commands.");
    while let Some(line) = console.next_line().await {
        match repl::run_line(&session, &line).await {
            Ok(Flow::Continue(output)) => {
                if !output.is_empty() {
                    println!("{output}");
                }
            }
            Ok(Flow::Quit) => break,
            Err(e) => println!("error: {e}"),
        }
    }

    session.close().await;
    console.exit();
}
