use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use tracing::debug;

use crate::adapters::http::routes::rendered_png;
use crate::adapters::http::state::HttpState;
use crate::application::dto::{SnapshotResponse, WsSnapshotMessage};

pub async fn ws_handler(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

/// Envía el estado actual y después cada cambio: JSON en texto y, si existe, el PNG en binario.
async fn handle_socket(mut socket: WebSocket, st: HttpState) {
    let mut rx = st.session.subscribe();

    loop {
        let snap = rx.borrow_and_update().clone();
        let msg = WsSnapshotMessage {
            r#type: "snapshot".into(),
            snapshot: SnapshotResponse::build(&snap, st.session.catalog(), None),
        };
        let json = serde_json::to_string(&msg).unwrap_or_default();
        if socket.send(Message::Text(json.into())).await.is_err() {
            break;
        }
        if let Ok(Some(png)) = rendered_png(&snap).await {
            if socket.send(Message::Binary(png.into())).await.is_err() {
                break;
            }
        }

        let closed = tokio::select! {
            changed = rx.changed() => changed.is_err(),
            incoming = wait_for_close(&mut socket) => incoming,
        };
        if closed {
            break;
        }
    }
    debug!("WebSocket de sesión cerrado");
}

/// Consume mensajes del cliente hasta que cierre la conexión.
async fn wait_for_close(socket: &mut WebSocket) -> bool {
    loop {
        match socket.recv().await {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
            Some(Ok(_)) => continue,
        }
    }
}
