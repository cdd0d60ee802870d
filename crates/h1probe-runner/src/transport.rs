//! Raw TCP transport
//!
//! Bytes in, bytes out. No HTTP knowledge lives here, and nothing is retried:
//! a server that does not answer is itself a result.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

/// Largest single read, matching a typical socket receive buffer
pub const READ_CHUNK: usize = 8192;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot resolve {target}: {error}")]
    Resolve { target: String, error: io::Error },
    #[error("connection to {addr} failed: {error}")]
    Refused { addr: SocketAddr, error: io::Error },
    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// The server was never reached (as opposed to failing mid-exchange).
    pub fn is_unreachable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Result of one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    Data(Vec<u8>),
    /// Peer closed (or reset) the connection
    Eof,
    /// Nothing arrived within the idle timeout
    TimedOut,
}

/// One TCP connection to the server under test
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Open a fresh connection, trying each resolved address in turn.
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Connection, TransportError> {
    let target = format!("{host}:{port}");
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|error| TransportError::Resolve {
            target: target.clone(),
            error,
        })?;

    let timeout = timeout.max(Duration::from_millis(1));
    let mut last = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(Connection { stream, peer: addr });
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                last = Some(TransportError::ConnectTimeout { addr, timeout });
            }
            Err(error) => last = Some(TransportError::Refused { addr, error }),
        }
    }

    Err(last.unwrap_or_else(|| TransportError::Resolve {
        target,
        error: io::Error::new(ErrorKind::NotFound, "no addresses"),
    }))
}

impl Connection {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Write every byte. The peer may close early; the caller decides whether
    /// that matters.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read at most `max_bytes`, waiting no longer than `idle`.
    pub fn recv_chunk(&mut self, max_bytes: usize, idle: Duration) -> Result<Recv, TransportError> {
        // A zero read timeout is rejected by the OS.
        self.stream
            .set_read_timeout(Some(idle.max(Duration::from_millis(1))))?;
        let mut buf = vec![0u8; max_bytes.clamp(1, READ_CHUNK)];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Ok(Recv::Eof),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Recv::Data(buf));
                }
                Err(e) => match e.kind() {
                    ErrorKind::Interrupted => continue,
                    ErrorKind::WouldBlock | ErrorKind::TimedOut => return Ok(Recv::TimedOut),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                        return Ok(Recv::Eof);
                    }
                    _ => return Err(e.into()),
                },
            }
        }
    }

    pub fn close(self) {
        // NotConnected when the peer is already gone
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn refused_port_is_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = connect("127.0.0.1", port, Duration::from_secs(1)).unwrap_err();
        assert!(err.is_unreachable(), "{err}");
    }

    #[test]
    fn unresolvable_host_is_unreachable() {
        let err = connect("host.invalid", 80, Duration::from_secs(1)).unwrap_err();
        assert!(err.is_unreachable());
    }

    #[test]
    fn reads_data_then_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"pong").unwrap();
        });

        let mut conn = connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        conn.send(b"ping").unwrap();
        let mut received = Vec::new();
        loop {
            match conn.recv_chunk(READ_CHUNK, Duration::from_secs(2)).unwrap() {
                Recv::Data(bytes) => received.extend(bytes),
                Recv::Eof => break,
                Recv::TimedOut => panic!("server should have closed"),
            }
        }
        assert_eq!(received, b"pong");
        server.join().unwrap();
    }

    #[test]
    fn silence_times_out_without_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut conn = connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        let (_held, _) = listener.accept().unwrap();

        let started = std::time::Instant::now();
        let recv = conn.recv_chunk(READ_CHUNK, Duration::from_millis(100)).unwrap();
        assert_eq!(recv, Recv::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn read_respects_max_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut conn = connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        server.write_all(b"0123456789").unwrap();

        match conn.recv_chunk(4, Duration::from_secs(1)).unwrap() {
            Recv::Data(bytes) => assert!(bytes.len() <= 4),
            other => panic!("unexpected {other:?}"),
        }
    }
}
