//! Unix-socket broadcast of captured output (spec §4.3, §6).
//!
//! Newly connected clients receive a replay of the ring, then subsequent
//! writes are pushed live. No framing, no handshake — newline-delimited raw
//! bytes. A per-write deadline drops slow clients rather than blocking the
//! broadcaster.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::ring::SegmentRing;

const WRITE_DEADLINE: Duration = Duration::from_millis(100);

pub struct BroadcastHub {
    tx: broadcast::Sender<Vec<u8>>,
    ring: Mutex<SegmentRing>,
}

impl BroadcastHub {
    pub fn new(ring_capacity: usize) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(1024);
        Arc::new(Self {
            tx,
            ring: Mutex::new(SegmentRing::new(ring_capacity)),
        })
    }

    /// Feed raw output bytes: stores completed lines in the ring and
    /// broadcasts them to any connected clients. Ignores the "no
    /// subscribers" send error.
    pub fn feed(&self, data: &[u8]) {
        let completed = {
            let mut ring = self.ring.lock().unwrap();
            ring.push(data)
        };
        for segment in completed {
            let _ = self.tx.send(segment);
        }
    }

    pub fn ring_contents(&self) -> Vec<u8> {
        self.ring.lock().unwrap().contents()
    }

    fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.tx.subscribe()
    }
}

/// On systems where Unix-domain paths are length-limited, substitute a
/// relative path computed from the current working directory.
///
/// This is documented as process-cwd-dependent in spec §9's Open Questions;
/// callers that need a stable path should bind short sockets under a short
/// temp directory instead.
pub fn resolve_socket_path(path: &Path) -> PathBuf {
    const MAX_SUN_PATH: usize = 100;
    let as_str = path.to_string_lossy();
    if as_str.len() <= MAX_SUN_PATH {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => pathdiff(&cwd, path).unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

fn pathdiff(base: &Path, target: &Path) -> Option<PathBuf> {
    let target = target.canonicalize().ok()?;
    let base = base.canonicalize().ok()?;
    target.strip_prefix(&base).ok().map(|p| p.to_path_buf())
}

/// Bind the broadcast socket and serve connections until the listener is
/// dropped. Spawned as a background task by the proxy's main run loop.
pub async fn serve(socket_path: &Path, hub: Arc<BroadcastHub>) -> std::io::Result<()> {
    let bind_path = resolve_socket_path(socket_path);
    if bind_path.exists() {
        let _ = std::fs::remove_file(&bind_path);
    }
    if let Some(parent) = bind_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(&bind_path)?;
    debug!(event = "proxy.broadcast.listening", path = %bind_path.display());

    loop {
        let (stream, _addr) = listener.accept().await?;
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, hub).await {
                debug!(event = "proxy.broadcast.client_closed", error = %e);
            }
        });
    }
}

async fn handle_client(mut stream: UnixStream, hub: Arc<BroadcastHub>) -> std::io::Result<()> {
    let replay = hub.ring_contents();
    if !replay.is_empty() {
        write_with_deadline(&mut stream, &replay).await?;
    }

    let mut rx = hub.subscribe();
    loop {
        match rx.recv().await {
            Ok(segment) => {
                if write_with_deadline(&mut stream, &segment).await.is_err() {
                    warn!(event = "proxy.broadcast.slow_client_dropped");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
        }
    }
    Ok(())
}

async fn write_with_deadline(stream: &mut UnixStream, data: &[u8]) -> std::io::Result<()> {
    tokio::time::timeout(WRITE_DEADLINE, stream.write_all(data))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "slow client write deadline exceeded"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn new_connection_replays_ring_then_streams_live() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("broadcast.sock");
        let hub = BroadcastHub::new(1000);
        hub.feed(b"replayed line\n");

        let hub_clone = Arc::clone(&hub);
        let socket_path_clone = socket_path.clone();
        let server = tokio::spawn(async move {
            let _ = serve(&socket_path_clone, hub_clone).await;
        });

        // Give the listener a moment to bind.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        let mut buf = vec![0u8; 1024];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"replayed line\n");

        hub.feed(b"live line\n");
        let n2 = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n2], b"live line\n");

        server.abort();
    }

    #[test]
    fn resolve_socket_path_leaves_short_paths_untouched() {
        let short = PathBuf::from("/tmp/a.sock");
        assert_eq!(resolve_socket_path(&short), short);
    }
}
