//! Name resolution and TCP connection setup.

use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;

/// Byte stream the HTTP client talks over (plain TCP or TLS).
pub trait IoStream: Read + Write + Send {}
impl<T> IoStream for T where T: Read + Write + Send {}

pub type BoxedIoStream = Box<dyn IoStream>;

/// Name resolution abstraction.
pub trait Resolver: Send {
    fn resolve(&self, host: &str, port: u16) -> TrawlResult<Vec<SocketAddr>>;
}

/// Uses the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> TrawlResult<Vec<SocketAddr>> {
        let addresses: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|error| {
                TrawlError::transport(
                    "net.dns.resolve_failed",
                    format!("failed to resolve `{host}:{port}`: {error}"),
                )
            })?
            .collect();

        if addresses.is_empty() {
            return Err(TrawlError::transport(
                "net.dns.no_results",
                format!("resolver returned no addresses for `{host}:{port}`"),
            ));
        }

        Ok(addresses)
    }
}

/// Opens TCP connections.
pub trait Connector: Send {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> TrawlResult<TcpStream>;
}

/// Standard library TCP connector with read/write timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> TrawlResult<TcpStream> {
        let stream = TcpStream::connect_timeout(&address, timeout).map_err(|error| {
            TrawlError::transport(
                "net.connect.failed",
                format!("failed to connect to `{address}`: {error}"),
            )
        })?;

        let configure = |result: std::io::Result<()>, what: &str| {
            result.map_err(|error| {
                TrawlError::transport(
                    "net.connect.socket_option_failed",
                    format!("failed to set {what} for `{address}`: {error}"),
                )
            })
        };
        configure(stream.set_nodelay(true), "TCP_NODELAY")?;
        configure(stream.set_read_timeout(Some(timeout)), "read timeout")?;
        configure(stream.set_write_timeout(Some(timeout)), "write timeout")?;

        Ok(stream)
    }
}

/// Tries each address in order and returns the first connection that succeeds.
pub fn connect_first_available<C: Connector>(
    connector: &C,
    addresses: &[SocketAddr],
    timeout: Duration,
) -> TrawlResult<TcpStream> {
    let mut last_error = None;

    for address in addresses {
        match connector.connect(*address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        TrawlError::transport(
            "net.connect.no_addresses",
            "no addresses available to open a connection",
        )
    }))
}
