//! Channel transport
//!
//! The client only needs a way to open a duplex byte stream to a named
//! endpoint. Reading, writing and closing are the stream's own async read,
//! async write and drop.

use std::future::Future;
use std::io;
use std::path::Path;

use interprocess::local_socket::{
    tokio::prelude::*, GenericFilePath, GenericNamespaced, Name, ToFsName, ToNsName,
};
use tokio::io::{AsyncRead, AsyncWrite};

/// Opens transports to a named endpoint
///
/// Every call yields a fresh, independent stream; the client drops the
/// previous one before asking for a replacement.
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced by a successful connect
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Connect to `endpoint`
    fn connect(&self, endpoint: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Connector for OS local sockets: named pipes on Windows, Unix domain
/// sockets elsewhere
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSocketConnector;

impl Connector for LocalSocketConnector {
    type Stream = LocalSocketStream;

    fn connect(&self, endpoint: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let name = socket_name(endpoint);
        async move { LocalSocketStream::connect(name?).await }
    }
}

/// Whether the endpoint is a filesystem path rather than a bare pipe name
pub fn is_path_endpoint(endpoint: &str) -> bool {
    endpoint.contains('/') || endpoint.contains('\\')
}

/// Map an endpoint string to a local socket name
///
/// Paths (anything containing a separator) are used as-is. Bare names go to
/// the platform namespace: `\\.\pipe\<name>` on Windows, the abstract
/// namespace on Linux.
pub fn socket_name(endpoint: &str) -> io::Result<Name<'static>> {
    if endpoint.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "endpoint name is empty",
        ));
    }

    if is_path_endpoint(endpoint) {
        Path::new(endpoint)
            .to_path_buf()
            .to_fs_name::<GenericFilePath>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    } else {
        endpoint
            .to_string()
            .to_ns_name::<GenericNamespaced>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}
