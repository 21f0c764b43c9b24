//! Picture routes under `/images` and raw bytes under `/objects`.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;

use super::error::{HttpError, HttpResult};
use super::AppState;
use crate::cache::{detail_key, CachedResponse};
use crate::db::{Picture, PictureId};
use crate::edit::EditOperation;
use crate::error::{PixlyError, PixlyResult};
use crate::storage::ObjectKey;
use crate::upload::UploadRequest;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/add", post(add_image))
        .route("/images/{id}", get(image_detail))
        .route("/images/{id}/{operation}", get(edit_image).post(edit_image))
        .route("/objects/{id}", get(download_object))
        .with_state(app_state)
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, self.content_type)], self.body.to_string()).into_response()
    }
}

/// Run blocking catalogue, store or pixel work off the async runtime.
async fn blocking<T, F>(work: F) -> HttpResult<T>
where
    F: FnOnce() -> PixlyResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|e| HttpError::Internal(e.to_string()))?
        .map_err(HttpError::from)
}

fn to_json<T: Serialize>(value: &T) -> PixlyResult<CachedResponse> {
    serde_json::to_string(value)
        .map(CachedResponse::json)
        .map_err(|e| PixlyError::Encode(e.to_string()))
}

#[derive(Deserialize)]
struct ListQuery {
    search: Option<String>,
}

#[derive(Serialize)]
struct PictureSummary<'a> {
    id: PictureId,
    url: String,
    photographer: &'a str,
    caption: &'a str,
}

#[derive(Serialize)]
struct PictureDetail<'a> {
    url: String,
    #[serde(flatten)]
    picture: &'a Picture,
}

async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> HttpResult<CachedResponse> {
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let key = match &search {
        Some(term) => format!("/images?search={term}"),
        None => "/images".to_string(),
    };

    blocking(move || {
        state.cache.get_or_render(&key, || {
            let pictures = state
                .db
                .list_pictures(search.as_deref())
                .map_err(PixlyError::backend)?;
            let summaries: Vec<_> = pictures
                .iter()
                .map(|p| PictureSummary {
                    id: p.id,
                    url: p.display_url(),
                    photographer: &p.photographer,
                    caption: &p.caption,
                })
                .collect();
            to_json(&summaries)
        })
    })
    .await
}

async fn image_detail(
    State(state): State<AppState>,
    Path(id): Path<PictureId>,
) -> HttpResult<CachedResponse> {
    blocking(move || {
        state.cache.get_or_render(&detail_key(id), || {
            let picture = state
                .db
                .get_picture(id)
                .map_err(PixlyError::backend)?
                .ok_or(PixlyError::NotFound(id))?;
            to_json(&PictureDetail {
                url: picture.display_url(),
                picture: &picture,
            })
        })
    })
    .await
}

async fn add_image(State(state): State<AppState>, mut payload: Multipart) -> HttpResult<Redirect> {
    let mut request = UploadRequest {
        file_name: String::new(),
        photographer: String::new(),
        caption: String::new(),
        bytes: Vec::new(),
    };

    while let Some(field) = payload.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                request.file_name = field.file_name().unwrap_or_default().to_string();
                request.bytes = field.bytes().await?.to_vec();
            }
            "photographer" => request.photographer = field.text().await?,
            "caption" => request.caption = field.text().await?,
            other => debug!("Ignoring form field {other:?}"),
        }
    }

    let uploader = state.uploader.clone();
    let picture = blocking(move || uploader.upload(request)).await?;
    Ok(Redirect::to(&format!("/images/{}", picture.id)))
}

async fn edit_image(
    State(state): State<AppState>,
    Path((id, operation)): Path<(PictureId, String)>,
) -> HttpResult<Redirect> {
    let op: EditOperation = operation.parse()?;
    let orchestrator = state.orchestrator.clone();
    blocking(move || orchestrator.edit_and_publish(id, op)).await?;
    Ok(Redirect::to(&format!("/images/{id}")))
}

async fn download_object(
    State(state): State<AppState>,
    Path(id): Path<PictureId>,
) -> HttpResult<Response> {
    let store = state.store.clone();
    let bytes = blocking(move || Ok(store.get(&ObjectKey::for_picture(id))?)).await?;
    let content_type = image::guess_format(&bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
