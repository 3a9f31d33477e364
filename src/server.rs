//! The accept loop.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::protocol::Framing;
use crate::storage::StorageEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::error;

/// Accepts connections forever, one task per client.
///
/// Accept failures are logged and the loop carries on. Stop it by dropping
/// the future (for example from a `tokio::select!` against a shutdown
/// signal).
pub async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    framing: Framing,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    handler,
                    framing.codec(),
                    stats,
                ));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
