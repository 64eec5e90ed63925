//! Server host (§2 "Server host", §5 "one listener thread; one worker per
//! connection"): accepts TCP connections and serves each one concurrently,
//! reading requests and writing responses through the `host-wire` codec
//! while every request passes through the dispatcher's global service
//! mutex. The listener itself holds no locks — all serialization happens
//! inside `Dispatcher::dispatch`.

use host_auth::Session;
use host_dispatch::Dispatcher;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub async fn serve(bind_addr: &str, dispatcher: Arc<Dispatcher>, mut shutdown: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    log::info!("[listener] bound on {bind_addr}");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let dispatcher = dispatcher.clone();
                log::debug!("[listener] accepted connection from {peer}");
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher).await {
                        log::warn!("[listener] connection from {peer} ended: {e}");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    log::info!("[listener] shutting down, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut session = Session::admin();

    loop {
        let request = match host_wire::read_request(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                let _ = host_wire::write_response(&mut write_half, &Err(e)).await;
                return Ok(());
            }
        };
        if request.is_empty() {
            continue;
        }
        let result = dispatcher.dispatch(&mut session, &request).await;
        host_wire::write_response(&mut write_half, &result).await?;
        write_half.flush().await?;
    }
}
