//! Binds the UDP and TCP listeners and runs them against one shared handler.
//! Each listener is independent; one failing to bind does not prevent the
//! other from running (the two `register_*` calls are made on the same
//! `ServerFuture`, and hickory-server itself owns them independently from
//! then on).

use std::net::SocketAddr;
use std::time::Duration;

use hickory_server::server::ServerFuture;
use tokio::net::{TcpListener, UdpSocket};

use crate::handler::Handler;

const TCP_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn serve(addr: SocketAddr, handler: Handler) -> std::io::Result<()> {
    let mut server = ServerFuture::new(handler);

    log::info!("binding UDP listener on {}", addr);
    let udp_ok = match UdpSocket::bind(addr).await {
        Ok(socket) => {
            server.register_socket(socket);
            true
        }
        Err(err) => {
            log::warn!("failed to bind UDP listener on {}: {}", addr, err);
            false
        }
    };

    log::info!("binding TCP listener on {}", addr);
    let tcp_ok = match TcpListener::bind(addr).await {
        Ok(listener) => {
            server.register_listener(listener, TCP_TIMEOUT);
            true
        }
        Err(err) => {
            log::warn!("failed to bind TCP listener on {}: {}", addr, err);
            false
        }
    };

    if !udp_ok && !tcp_ok {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            format!("failed to bind both UDP and TCP listeners on {}", addr),
        ));
    }

    server.block_until_done().await
}
