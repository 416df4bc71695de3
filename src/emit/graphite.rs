//! Graphite plaintext protocol: one `<path> <value> <timestamp>` per line.

use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{Emitter, Metric, metrics};
use crate::error::UlogError;
use crate::trace::Snapshot;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Render metrics in Graphite plaintext form.
pub fn format_plaintext(metrics: &[Metric]) -> String {
    metrics
        .iter()
        .map(|m| format!("{} {} {}\n", m.name, m.value, m.timestamp))
        .collect()
}

/// Pushes each window to a Carbon listener, opening a fresh connection per
/// window.
pub struct GraphiteEmitter {
    address: String,
    namespace: String,
}

impl GraphiteEmitter {
    pub fn new(address: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            namespace: namespace.into(),
        }
    }

    fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut last_err = None;
        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(mut stream) => {
                    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                    stream.write_all(payload)?;
                    return stream.flush();
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        }))
    }
}

impl Emitter for GraphiteEmitter {
    fn emit(&mut self, snapshot: &Snapshot, timestamp: u64) -> anyhow::Result<()> {
        let metrics = metrics(snapshot, &self.namespace, timestamp);
        if metrics.is_empty() {
            return Ok(());
        }
        let payload = format_plaintext(&metrics);
        log::debug!(
            "Sending {} metrics to graphite at {}",
            metrics.len(),
            self.address
        );
        self.send(payload.as_bytes())
            .map_err(|source| UlogError::Delivery {
                sink: format!("graphite {}", self.address),
                source,
            })?;
        Ok(())
    }
}
