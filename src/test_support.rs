//! Shared helpers for tests that talk to an in-process stub server

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::shared::settings::ClientSettings;

/// Serve `app` on an ephemeral localhost port
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn settings_for(addr: SocketAddr) -> ClientSettings {
    ClientSettings {
        server_address: addr.to_string(),
        ..ClientSettings::default()
    }
}

/// Settings pointing at a port nothing listens on
pub async fn unreachable_settings() -> ClientSettings {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    settings_for(addr)
}
