pub mod client;
pub mod codec;
pub mod server;

pub use client::{call, ping};
pub use codec::{RpcReply, RpcRequest};
pub use server::{serve, RpcHandler};
