//! Gateway - TCP listener that accepts incoming connections.
//!
//! The Gateway binds to a socket and spawns a Connection task for each
//! incoming client, tracking them so shutdown can drain in-flight RPCs.

use crate::handlers::Context;
use crate::network::Connection;
use crate::state::SessionIdGenerator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument};

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    ctx: Context,
    ids: Arc<SessionIdGenerator>,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        ctx: Context,
        shutdown: CancellationToken,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "gateway listening");
        Ok(Self {
            listener,
            ctx,
            ids: Arc::new(SessionIdGenerator::new()),
            shutdown,
        })
    }

    /// Run the gateway until cancelled, then drain live connections.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> std::io::Result<()> {
        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!(%addr, "connection accepted");

                        let connection = Connection::new(
                            stream,
                            addr,
                            self.ctx.clone(),
                            Arc::clone(&self.ids),
                            self.shutdown.child_token(),
                        );
                        tracker.spawn(async move {
                            if let Err(e) = connection.run().await {
                                error!(%addr, error = %e, "connection error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
        }

        info!("gateway draining connections");
        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}
