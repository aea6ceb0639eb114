//! Wire envelope and framing, grounded on `relay::protocol::RelayMessage`
//! (the enum-of-messages shape) and `relay::client::send_and_receive_raw`
//! (the length-prefixed framing itself).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::identifier::Identifier;
use crate::node::NodeRef;
use crate::storage::FileList;

/// Largest frame this transport accepts, matching `relay::client`'s
/// 16 MiB cap.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("invalid frame length {0}")]
    InvalidFrameLength(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One variant per row of the RPC surface table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcRequest {
    GetInfo,
    GetLength,
    GetPredecessor,
    GetSuccessors,
    FindSuccessorStep { id: Identifier },
    Notify { node: NodeRef },
    NotifySuccessorLeave,
    NotifyPredecessorLeave { node: NodeRef },
    StoreFile { name: String, data: Vec<u8> },
    GetFile { name: String },
    StoreFiles { files: FileList },
    GetAllFiles,
    GetAllBackupFiles,
}

impl RpcRequest {
    pub fn method_name(&self) -> &'static str {
        match self {
            RpcRequest::GetInfo => "GetInfo",
            RpcRequest::GetLength => "GetLength",
            RpcRequest::GetPredecessor => "GetPredecessor",
            RpcRequest::GetSuccessors => "GetSuccessors",
            RpcRequest::FindSuccessorStep { .. } => "FindSuccessor",
            RpcRequest::Notify { .. } => "Notify",
            RpcRequest::NotifySuccessorLeave => "NotifySuccessorLeave",
            RpcRequest::NotifyPredecessorLeave { .. } => "NotifyPredecessorLeave",
            RpcRequest::StoreFile { .. } => "StoreFile",
            RpcRequest::GetFile { .. } => "GetFile",
            RpcRequest::StoreFiles { .. } => "StoreFiles",
            RpcRequest::GetAllFiles => "GetAllFiles",
            RpcRequest::GetAllBackupFiles => "GetAllBackupFiles",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcReply {
    Info(NodeRef),
    Length { m: u32, r: usize },
    Predecessor(NodeRef),
    Successors(Vec<NodeRef>),
    FindSuccessorStep { found: bool, node: NodeRef },
    Ack,
    StoreFile { success: bool },
    GetFile { success: bool, data: Vec<u8> },
    StoreFiles { success: bool },
    Files { success: bool, files: FileList },
    BackupFiles { success: bool, lists: Vec<FileList> },
}

fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn from_bytes<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Deserialization(e.to_string()))
}

/// Writes `value` as a `u32`-length-prefixed bincode frame.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), CodecError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = to_bytes(value)?;
    let len = payload.len() as u32;
    writer.write_u32(len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads a `u32`-length-prefixed bincode frame, rejecting zero-length and
/// oversized frames the way `send_and_receive_raw` does.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, CodecError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let len = reader.read_u32().await?;
    if len == 0 || len > MAX_FRAME_BYTES {
        return Err(CodecError::InvalidFrameLength(len));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    from_bytes(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trips_through_a_pipe() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let req = RpcRequest::FindSuccessorStep { id: 42 };
        write_frame(&mut client, &req).await.unwrap();
        let decoded: RpcRequest = read_frame(&mut server).await.unwrap();
        match decoded {
            RpcRequest::FindSuccessorStep { id } => assert_eq!(id, 42),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_round_trips_through_a_pipe() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let reply = RpcReply::FindSuccessorStep {
            found: true,
            node: NodeRef::new(7, "127.0.0.1", "9000"),
        };
        write_frame(&mut client, &reply).await.unwrap();
        let decoded: RpcReply = read_frame(&mut server).await.unwrap();
        match decoded {
            RpcReply::FindSuccessorStep { found, node } => {
                assert!(found);
                assert_eq!(node.id, 7);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
