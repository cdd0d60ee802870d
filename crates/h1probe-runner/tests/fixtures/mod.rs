//! Local servers with fixed, known behavior

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// A listening fixture; threads live until the test process exits.
pub struct Fixture {
    pub port: u16,
    accepted: Arc<AtomicUsize>,
}

impl Fixture {
    /// Connections accepted so far (the preflight connect included)
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

pub fn serve<F>(handler: F) -> Fixture
where
    F: Fn(TcpStream) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    let handler = Arc::new(handler);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            counter.fetch_add(1, Ordering::SeqCst);
            let handler = Arc::clone(&handler);
            thread::spawn(move || handler(stream));
        }
    });
    Fixture { port, accepted }
}

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Read until the end of the request head, EOF, or a short quiet period.
pub fn read_head(stream: &mut TcpStream) -> Vec<u8> {
    stream
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    head
}

pub fn always_200() -> Fixture {
    serve(|mut stream| {
        if read_head(&mut stream).is_empty() {
            return;
        }
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
    })
}

pub fn close_terminated() -> Fixture {
    serve(|mut stream| {
        read_head(&mut stream);
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nBye");
    })
}

pub fn silent() -> Fixture {
    serve(|mut stream| {
        read_head(&mut stream);
        thread::sleep(Duration::from_secs(5));
    })
}

pub fn endless() -> Fixture {
    serve(|mut stream| {
        read_head(&mut stream);
        if stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").is_err() {
            return;
        }
        let chunk = [b'x'; 8192];
        while stream.write_all(&chunk).is_ok() {}
    })
}

/// Answers once, then a second response nobody asked for
pub fn double_response() -> Fixture {
    serve(|mut stream| {
        read_head(&mut stream);
        let _ = stream.write_all(
            b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\nHTTP/1.1 200 OK\r\n\
              Content-Length: 0\r\n\r\n",
        );
        thread::sleep(Duration::from_millis(200));
    })
}

/// Status from the request path: `GET /404` answers 404
pub fn echo_status() -> Fixture {
    serve(|mut stream| {
        let head = read_head(&mut stream);
        let line = String::from_utf8_lossy(&head);
        let status = line
            .split(' ')
            .nth(1)
            .and_then(|path| path.trim_start_matches('/').parse::<u16>().ok())
            .unwrap_or(200);
        let reply = format!("HTTP/1.1 {status} Whatever\r\nContent-Length: 0\r\n\r\n");
        let _ = stream.write_all(reply.as_bytes());
    })
}
