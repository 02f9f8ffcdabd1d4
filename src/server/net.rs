use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};

use crate::api::{
    codec,
    event::{GameMessage, PlayerHello, PlayerQuit},
};
use crate::server::{ClientMessage, Event, error::ServerError, store::IdGenerator};

pub const WEBSOCKET_PATH: &str = "/websocket";

#[derive(Debug, Clone)]
pub enum SinkCommand {
    Frame(Bytes),
    Close,
}

/// Handle to one peer's outbound queue. The queue is drained by a writer
/// task owning the socket's write half, so the tick loop never blocks on a
/// slow peer.
#[derive(Debug, Clone)]
pub struct PeerSink {
    tx: UnboundedSender<SinkCommand>,
}

impl PeerSink {
    pub fn new() -> (Self, UnboundedReceiver<SinkCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, frame: Bytes) -> Result<(), ServerError> {
        self.tx
            .send(SinkCommand::Frame(frame))
            .map_err(|_| ServerError::PeerWriteFailed)
    }

    /// Asks the writer task to close the connection. The peer's read loop
    /// observes the close and enqueues the quit.
    pub fn close(&self) {
        let _ = self.tx.send(SinkCommand::Close);
    }
}

/// One agent per accepted peer: upgrade, assign an id, announce the hello,
/// then forward decoded frames onto the shared queue until the stream dies.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    queue: async_channel::Sender<Event>,
    ids: Arc<IdGenerator>,
) {
    let ws_stream = match accept_hdr_async(stream, check_path).await {
        Ok(stream) => stream,
        Err(err) => {
            log::debug!("rejected handshake: {err}");
            return;
        }
    };

    let (write, mut read) = ws_stream.split();
    let (sink, outbound) = PeerSink::new();
    tokio::spawn(run_writer(outbound, write));

    let player_id = ids.next();

    // The tick loop owns the hello reply; the handler only announces.
    if queue
        .send(Event {
            player_id,
            sink: sink.clone(),
            message: ClientMessage::Hello(PlayerHello { id: player_id }),
        })
        .await
        .is_err()
    {
        return;
    }

    loop {
        match read.next().await {
            Some(Ok(Message::Binary(data))) => match codec::parse_event_bytes(&data) {
                Ok((_, GameMessage::PlayerHelloConfirm(confirm))) => {
                    let event = Event {
                        player_id,
                        sink: sink.clone(),
                        message: ClientMessage::HelloConfirm(confirm),
                    };
                    if queue.send(event).await.is_err() {
                        break;
                    }
                }
                Ok((_, GameMessage::PlayerMoved(moved))) => {
                    let event = Event {
                        player_id,
                        sink: sink.clone(),
                        message: ClientMessage::Moved(moved),
                    };
                    if queue.send(event).await.is_err() {
                        break;
                    }
                }
                Ok((kind, _)) => {
                    log::warn!("player '{player_id}' sent unexpected '{kind:?}' frame, dropping");
                }
                Err(err) => {
                    log::error!("err: {err}");
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                log::debug!("{}: {err}", ServerError::PeerReadFailed);
                break;
            }
        }
    }

    let _ = queue
        .send(Event {
            player_id,
            sink: sink.clone(),
            message: ClientMessage::Quit(PlayerQuit { id: player_id }),
        })
        .await;
    sink.close();
}

// The asset server for every other path is an external collaborator; this
// process only speaks websocket.
fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WEBSOCKET_PATH {
        Ok(response)
    } else {
        let mut not_found = ErrorResponse::new(None);
        *not_found.status_mut() = StatusCode::NOT_FOUND;
        Err(not_found)
    }
}

async fn run_writer(
    mut outbound: UnboundedReceiver<SinkCommand>,
    mut write: SplitSink<WebSocketStream<TcpStream>, Message>,
) {
    while let Some(command) = outbound.recv().await {
        match command {
            SinkCommand::Frame(frame) => {
                if let Err(err) = write.send(Message::Binary(frame)).await {
                    log::debug!("{}: {err}", ServerError::PeerWriteFailed);
                    break;
                }
            }
            SinkCommand::Close => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
