//! Attached session: forward stdin lines until the peer exits or a signal
//! arrives

use std::future::Future;
use std::io::{self, BufRead};
use std::thread;

use libpipelink::{Connector, PipeClient};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error};

/// Lines waiting to be forwarded
pub type LineReceiver = mpsc::Receiver<io::Result<String>>;

/// Why an attached session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The peer sent the exit sentinel
    PeerExit,
    /// Ctrl+C or SIGTERM
    Signal,
}

/// Read lines from `reader` on a dedicated thread
///
/// The thread is detached. A read blocked on an idle stdin never holds up
/// runtime shutdown; the thread ends on EOF, a read error, or once the
/// receiver is dropped and the next line arrives.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<LineReceiver>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);

    thread::Builder::new()
        .name("pipelink-stdin".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;

    Ok(rx)
}

/// Forward lines to the peer until it sends the exit sentinel or `shutdown`
/// resolves
pub async fn run_until_exit<C, F>(
    client: &PipeClient<C>,
    exit_requested: &Notify,
    mut lines: Option<LineReceiver>,
    shutdown: F,
) -> ExitReason
where
    C: Connector,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = exit_requested.notified() => return ExitReason::PeerExit,
            _ = &mut shutdown => return ExitReason::Signal,
            line = next_line(&mut lines) => line,
        };

        match line {
            Some(Ok(line)) => client.send_message(&line).await,
            Some(Err(e)) => {
                error!("Failed to read stdin: {}", e);
                lines = None;
            }
            None => {
                debug!("stdin closed");
                lines = None;
            }
        }
    }
}

async fn next_line(lines: &mut Option<LineReceiver>) -> Option<io::Result<String>> {
    match lines {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libpipelink::{ClientConfig, Handlers};
    use std::io::{BufReader, Cursor, Read};
    use std::sync::{mpsc as std_mpsc, Arc};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::sync::mpsc::UnboundedSender;

    const ENDPOINT: &str = "pipelink-attach";

    /// Hands the far end of every transport to the test
    struct DuplexConnector {
        peers: UnboundedSender<DuplexStream>,
    }

    impl Connector for DuplexConnector {
        type Stream = DuplexStream;

        fn connect(&self, _endpoint: &str) -> impl Future<Output = io::Result<DuplexStream>> + Send {
            let (client, server) = tokio::io::duplex(4096);
            let _ = self.peers.send(server);
            std::future::ready(Ok(client))
        }
    }

    /// Reader that blocks until the test feeds it bytes, like an idle stdin
    struct HeldOpen(std_mpsc::Receiver<Vec<u8>>);

    impl Read for HeldOpen {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }

    fn attached_client(
        exit_requested: Arc<Notify>,
    ) -> (
        PipeClient<DuplexConnector>,
        tokio::sync::mpsc::UnboundedReceiver<DuplexStream>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handlers = Handlers::new().on_terminate(move || exit_requested.notify_one());
        let client = PipeClient::with_connector(
            DuplexConnector { peers: tx },
            ClientConfig::default(),
            handlers,
        )
        .unwrap();
        (client, rx)
    }

    #[tokio::test]
    async fn test_peer_exit_ends_session_while_stdin_is_idle() {
        let exit_requested = Arc::new(Notify::new());
        let (client, mut peers) = attached_client(exit_requested.clone());
        client.start(ENDPOINT).await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        let (stdin_tx, stdin_rx) = std_mpsc::channel();
        let lines = spawn_line_reader(BufReader::new(HeldOpen(stdin_rx))).unwrap();
        stdin_tx.send(b"ping\n".to_vec()).unwrap();

        let session = run_until_exit(
            &client,
            &exit_requested,
            Some(lines),
            std::future::pending(),
        );
        let peer_side = async {
            let mut buf = [0u8; 64];
            let n = peer.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"ping");
            peer.write_all(b"exit").await.unwrap();
        };

        // stdin stays open and silent; the session must still end
        let (reason, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(session, peer_side)
        })
        .await
        .expect("session did not end after exit");
        assert_eq!(reason, ExitReason::PeerExit);

        client.stop().await;
        drop(stdin_tx);
    }

    #[tokio::test]
    async fn test_shutdown_signal_ends_session() {
        let exit_requested = Arc::new(Notify::new());
        let (client, _peers) = attached_client(exit_requested.clone());

        let reason = run_until_exit(&client, &exit_requested, None, async {}).await;
        assert_eq!(reason, ExitReason::Signal);
    }

    #[tokio::test]
    async fn test_line_reader_stops_at_eof() {
        let mut lines = spawn_line_reader(Cursor::new("first\nsecond\n")).unwrap();

        assert_eq!(lines.recv().await.unwrap().unwrap(), "first");
        assert_eq!(lines.recv().await.unwrap().unwrap(), "second");
        assert!(lines.recv().await.is_none());
    }
}
