use std::net::SocketAddr;

use anyhow::{Context, Result, anyhow, bail};
use tokio::{
    io::BufReader,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};
use tracing::debug;

use crate::message::{Request, Response, read_message, write_message};

/// One connection to a storage node. Requests on a connection are answered
/// in order.
pub struct StorageClient {
    addr: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl StorageClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        debug!(%addr, "connected to storage node");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            addr,
            reader: BufReader::new(reader),
            writer,
        })
    }

    pub async fn get(&mut self) -> Result<Vec<String>> {
        match self.call(&Request::Get).await? {
            Response::Data { data } => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set(&mut self, data: Vec<String>) -> Result<()> {
        match self.call(&Request::Set { data }).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn call(&mut self, request: &Request) -> Result<Response> {
        write_message(&mut self.writer, request)
            .await
            .with_context(|| format!("failed to send request to {}", self.addr))?;

        let response = read_message::<_, Response>(&mut self.reader)
            .await
            .with_context(|| format!("failed to read response from {}", self.addr))?;
        match response {
            Some(Response::Error { message }) => bail!("storage node {}: {message}", self.addr),
            Some(response) => Ok(response),
            None => bail!("storage node {} closed the connection", self.addr),
        }
    }
}

fn unexpected(response: Response) -> anyhow::Error {
    anyhow!("unexpected response: {response:?}")
}
