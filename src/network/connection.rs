//! Connection - drives a single RPC over one TCP connection.
//!
//! The first frame decides the call type. A unary request is answered with
//! exactly one response frame. A `join` or `tail` frame opens a stream:
//!
//! ```text
//! wire ──▶ Reader (this task) ──▶ inbound queue ──▶ Session task
//!                                                       │
//!             Stream Manager ──▶ outbound queue ──▶ Writer task ──▶ wire
//! ```
//!
//! The reader is the sole owner of the inbound sender: dropping it on EOF or
//! cancellation is the disconnect signal that makes the session task run its
//! leave sequence. The writer exits when the outbound queue drains and
//! closes, which happens once the session task has unregistered.

use crate::handlers::{self, Context};
use crate::proto::{ClientFrame, ServerFrame};
use crate::state::{SessionIdGenerator, StreamRequest};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Bound for the per-session inbound and outbound queues.
const SESSION_QUEUE_CAPACITY: usize = 32;

/// Upper bound on a single wire frame.
const MAX_FRAME_LENGTH: usize = 1024 * 1024;

type Reader = FramedRead<OwnedReadHalf, LinesCodec>;
type Writer = FramedWrite<OwnedWriteHalf, LinesCodec>;

/// A client connection handler.
pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Context,
    ids: Arc<SessionIdGenerator>,
    cancel: CancellationToken,
}

impl Connection {
    /// Create a new connection handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        ctx: Context,
        ids: Arc<SessionIdGenerator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            addr,
            ctx,
            ids,
            cancel,
        }
    }

    /// Run the connection to completion.
    #[instrument(skip(self), fields(addr = %self.addr), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let Connection {
            stream,
            addr,
            ctx,
            ids,
            cancel,
        } = self;

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(
            read_half,
            LinesCodec::new_with_max_length(MAX_FRAME_LENGTH),
        );
        let mut writer = FramedWrite::new(write_half, LinesCodec::new());

        // First frame decides the call type.
        let first = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            frame = reader.next() => frame,
        };
        let Some(first) = first else {
            debug!("closed before any frame");
            return Ok(());
        };
        let line = first?;

        let frame: ClientFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "undecodable frame");
                send_frame(
                    &mut writer,
                    &ServerFrame::Error {
                        message: format!("invalid frame: {e}"),
                    },
                )
                .await?;
                return Ok(());
            }
        };

        match frame {
            ClientFrame::Join { name, room } => {
                Self::run_stream(
                    ctx,
                    ids,
                    addr,
                    cancel,
                    reader,
                    writer,
                    StreamRequest::Join { name, room },
                )
                .await
            }
            ClientFrame::Tail { room_path } => {
                Self::run_stream(
                    ctx,
                    ids,
                    addr,
                    cancel,
                    reader,
                    writer,
                    StreamRequest::Tail { room: room_path },
                )
                .await
            }
            ClientFrame::Chat { .. } => {
                send_frame(
                    &mut writer,
                    &ServerFrame::Error {
                        message: "first frame must be join or tail".to_string(),
                    },
                )
                .await?;
                Ok(())
            }
            unary => {
                let response = handlers::dispatch(&ctx, unary).await;
                send_frame(&mut writer, &response).await?;
                Ok(())
            }
        }
    }

    /// Drive a bidirectional stream: writer task, session task, and the wire
    /// pump in this task. Returns the first non-nil error.
    async fn run_stream(
        ctx: Context,
        ids: Arc<SessionIdGenerator>,
        addr: SocketAddr,
        cancel: CancellationToken,
        mut reader: Reader,
        writer: Writer,
        first: StreamRequest,
    ) -> anyhow::Result<()> {
        let session_id = ids.next();
        info!(session = %session_id, "stream opened");

        let (request_tx, request_rx) = mpsc::channel::<StreamRequest>(SESSION_QUEUE_CAPACITY);
        let (event_tx, mut event_rx) = mpsc::channel::<crate::state::StreamEvent>(SESSION_QUEUE_CAPACITY);

        // Writer task: outbound queue → wire. Ends on queue close or send error.
        let write_handle = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(event) = event_rx.recv().await {
                let frame = ServerFrame::Event {
                    name: event.sender,
                    text: event.text,
                };
                if let Err(e) = send_frame(&mut writer, &frame).await {
                    warn!(error = %e, "write error");
                    break;
                }
            }
        });

        // Session task: runs the state machine against the stores.
        let session_ctx = ctx.clone();
        let remote = addr.to_string();
        let mut session_handle = tokio::spawn(async move {
            handlers::stream::handle_stream_session(
                session_ctx,
                request_rx,
                event_tx,
                session_id,
                remote,
            )
            .await
        });

        // Feed the opening frame, then pump the wire until EOF, a bad frame,
        // cancellation, or session termination.
        let mut read_result: anyhow::Result<()> = Ok(());
        let mut session_result = None;
        if request_tx.send(first).await.is_ok() {
            loop {
                tokio::select! {
                    // The session ending first means it hit an error; the RPC
                    // is over regardless of what the peer still has to say.
                    result = &mut session_handle => {
                        session_result = Some(result);
                        break;
                    }
                    _ = cancel.cancelled() => {
                        debug!(session = %session_id, "stream cancelled");
                        break;
                    }
                    frame = reader.next() => match frame {
                        None => break, // EOF
                        Some(Err(e)) => {
                            read_result = Err(e.into());
                            break;
                        }
                        Some(Ok(line)) => match serde_json::from_str::<ClientFrame>(&line) {
                            Ok(frame) => match stream_request(frame) {
                                Some(request) => {
                                    if request_tx.send(request).await.is_err() {
                                        break; // session task gone
                                    }
                                }
                                None => {
                                    read_result =
                                        Err(anyhow::anyhow!("unary frame inside a stream"));
                                    break;
                                }
                            },
                            Err(e) => {
                                read_result = Err(anyhow::anyhow!("invalid frame: {e}"));
                                break;
                            }
                        },
                    }
                }
            }
        }
        // Dropping the only inbound sender signals disconnect to the session.
        drop(request_tx);

        let session_result = match session_result {
            Some(result) => result,
            None => session_handle.await,
        };
        let _ = write_handle.await;
        info!(session = %session_id, "stream closed");

        match session_result {
            Ok(Ok(())) => read_result,
            Ok(Err(e)) => Err(e.into()),
            Err(join_error) => Err(join_error.into()),
        }
    }
}

fn stream_request(frame: ClientFrame) -> Option<StreamRequest> {
    match frame {
        ClientFrame::Join { name, room } => Some(StreamRequest::Join { name, room }),
        ClientFrame::Tail { room_path } => Some(StreamRequest::Tail { room: room_path }),
        ClientFrame::Chat { text } => Some(StreamRequest::Chat { text }),
        _ => None,
    }
}

async fn send_frame(writer: &mut Writer, frame: &ServerFrame) -> anyhow::Result<()> {
    let line = serde_json::to_string(frame)?;
    writer.send(line).await?;
    Ok(())
}
