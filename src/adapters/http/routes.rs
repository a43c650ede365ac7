use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::adapters::http::state::HttpState;
use crate::application::dto::{encode_png, png_data_url, OkResponse, SnapshotResponse};
use crate::domain::session::SessionSnapshot;
use crate::domain::source::ImageFile;

#[derive(Deserialize)]
pub struct UploadQuery {
    name: Option<String>,
}

/// Codifica la superficie renderizada (si la hay) fuera del runtime.
pub(crate) async fn rendered_png(snap: &SessionSnapshot) -> Result<Option<Vec<u8>>, String> {
    let Some(overlay) = snap.overlay.clone() else {
        return Ok(None);
    };
    tokio::task::spawn_blocking(move || encode_png(&overlay.image))
        .await
        .map_err(|e| e.to_string())?
        .map(Some)
        .map_err(|e| e.to_string())
}

fn internal_error(msg: String) -> axum::response::Response {
    error!("Error al codificar PNG: {}", msg);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))).into_response()
}

pub async fn get_config(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.config.as_ref().clone())
}

pub async fn upload_image(
    State(st): State<HttpState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let name = query.name.unwrap_or_else(|| "upload".into());
    st.session.select_image(ImageFile::new(name, mime, body.to_vec()));
    Json(OkResponse { ok: true })
}

pub async fn reset_session(State(st): State<HttpState>) -> impl IntoResponse {
    st.session.reset();
    Json(OkResponse { ok: true })
}

pub async fn get_snapshot(State(st): State<HttpState>) -> impl IntoResponse {
    let snap = st.session.snapshot();
    match rendered_png(&snap).await {
        Ok(png) => {
            let image = png.as_deref().map(png_data_url);
            Json(SnapshotResponse::build(&snap, st.session.catalog(), image)).into_response()
        }
        Err(e) => internal_error(e),
    }
}

pub async fn get_render_png(State(st): State<HttpState>) -> impl IntoResponse {
    match rendered_png(&st.session.snapshot()).await {
        Ok(Some(png)) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "no hay imagen renderizada" }))).into_response(),
        Err(e) => internal_error(e),
    }
}
