use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use warden_config::Config;

use super::{HOSTED_TARGET, HostedServer, HostedServerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_HEADER_LINES: usize = 100;

/// Minimal HTTP responder that greets every request by service name.
///
/// Any request receives `200 OK` with `{"message":"Hello, <name>!"}`.
#[derive(Debug)]
pub struct GreetingServer {
    name: String,
    host: String,
    port: u16,
    stop_requested: AtomicBool,
    serving: AtomicBool,
    local_addr: Mutex<Option<SocketAddr>>,
}

#[derive(Serialize)]
struct Greeting<'a> {
    message: &'a str,
}

impl GreetingServer {
    /// Builds a server that binds `host:port` when run.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            stop_requested: AtomicBool::new(false),
            serving: AtomicBool::new(false),
            local_addr: Mutex::new(None),
        }
    }

    /// Builds a server from the configured name, host, and port.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.name(), config.host(), config.port())
    }

    /// Address actually bound by the current run, if serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn body(&self) -> String {
        let message = format!("Hello, {}!", self.name);
        serde_json::to_string(&Greeting { message: &message })
            .unwrap_or_else(|_| String::from("{}"))
    }

    fn set_local_addr(&self, addr: Option<SocketAddr>) {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = addr;
    }
}

impl HostedServer for GreetingServer {
    fn run(&self) -> Result<(), HostedServerError> {
        let listener = bind_tcp(&self.host, self.port)?;
        listener
            .set_nonblocking(true)
            .map_err(|source| HostedServerError::NonBlocking { source })?;
        let addr = listener.local_addr().ok();
        self.set_local_addr(addr);
        self.serving.store(true, Ordering::SeqCst);
        info!(
            target: HOSTED_TARGET,
            name = %self.name,
            addr = ?addr,
            "greeting server listening"
        );

        let body = self.body();
        let mut last_error = None::<io::ErrorKind>;
        while !self.stop_requested.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    last_error = None;
                    let body = body.clone();
                    thread::spawn(move || {
                        if let Err(error) = respond(stream, &body) {
                            debug!(
                                target: HOSTED_TARGET,
                                peer = %peer,
                                error = %error,
                                "connection closed with error"
                            );
                        }
                    });
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(target: HOSTED_TARGET, error = %error, "accept error");
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        self.serving.store(false, Ordering::SeqCst);
        self.set_local_addr(None);
        // A stop request targets one run; the next run starts fresh.
        self.stop_requested.store(false, Ordering::SeqCst);
        info!(target: HOSTED_TARGET, name = %self.name, "greeting server stopped");
        Ok(())
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }
}

fn respond(stream: TcpStream, body: &str) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    for _ in 0..MAX_HEADER_LINES {
        line.clear();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, HostedServerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| HostedServerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = addrs
        .next()
        .ok_or_else(|| HostedServerError::ResolveEmpty {
            host: host.to_string(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| HostedServerError::Bind { addr, source })
}
