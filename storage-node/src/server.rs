use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, info, warn};

use crate::{
    message::{Frame, Request, Response, read_frame, write_message},
    node::NodeState,
};

/// Accept loop for one storage node. Holds nothing but the listener and a
/// handle to the node's guarded data.
pub(crate) struct Server {
    listener: TcpListener,
    state: Arc<NodeState>,
}

impl Server {
    pub(crate) fn new(listener: TcpListener, state: Arc<NodeState>) -> Self {
        Self { listener, state }
    }

    pub(crate) async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener, state } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("accept loop shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &state);
                }
            }
        }
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    state: &Arc<NodeState>,
) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, state),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, state: &Arc<NodeState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        debug!(peer = %peer, "connection opened");
        match handle_connection(stream, &state).await {
            Ok(()) => debug!(peer = %peer, "connection closed"),
            Err(err) => warn!(peer = %peer, error = ?err, "connection closed with error"),
        }
    });
}

async fn handle_connection(stream: TcpStream, state: &NodeState) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(frame) = read_frame::<_, Request>(&mut reader).await? {
        let response = match frame {
            Frame::Message(request) => dispatch(request, state).await,
            Frame::Malformed(err) => Response::Error {
                message: format!("malformed request: {err}"),
            },
        };
        write_message(&mut writer, &response).await?;
    }

    Ok(())
}

async fn dispatch(request: Request, state: &NodeState) -> Response {
    match request {
        Request::Get => Response::Data {
            data: state.get().await,
        },
        Request::Set { data } => {
            debug!(len = data.len(), "replacing stored data");
            state.set(data).await;
            Response::Ok
        }
    }
}
