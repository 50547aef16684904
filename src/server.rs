//! HTTP API and static image serving.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    Json,
    Router,
    extract::{
        DefaultBodyLimit,
        Path as UrlPath,
        Query,
        State,
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    category::Category,
    data_dir::DataDir,
    error::{Error, Result},
    gallery::{Card, Gallery, NewCard},
    greeting::{CardDraft, CardStyle, resolve_persons},
    matching::{self, PageMatchReport},
    settings::Settings,
    store::{Person, StoreHandle},
};

/// Card images arrive as base64 data URLs.
const BODY_LIMIT: usize = 50 * 1024 * 1024;

pub struct AppState {
    pub store: StoreHandle,
    pub gallery: Gallery,
    pub image_base_url: String,
    /// Root of locally served page images.
    pub pages_dir: Option<PathBuf>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/persons", get(list_persons))
        .route("/api/persons/{id}", get(get_person))
        .route("/api/categories", get(list_categories))
        .route("/api/find-page-with-persons", post(find_pages))
        .route("/api/generate", post(generate))
        .route("/api/cards", get(list_cards).post(save_card))
        .route("/api/cards/{id}", get(get_card).delete(delete_card))
        .route("/gallery/{file}", get(gallery_image))
        .route("/pages/{*path}", get(page_image))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

/// Load state from `settings` and serve until Ctrl-C.
pub fn run_server(settings: &Settings, data_dir: &DataDir) -> Result<()> {
    let state = Arc::new(AppState {
        store: StoreHandle::load(&settings.persons_path),
        gallery: Gallery::open(data_dir.gallery_dir()?)?,
        image_base_url: settings.image_base_url.clone(),
        pages_dir: settings.pages_dir.clone(),
    });
    let app = router(state);
    let bind = settings.bind;

    if settings.page_images_unserved() {
        tracing::warn!(
            image_base_url = %settings.image_base_url,
            "no pages directory configured, page image links will 404; \
             pass --pages-dir or set an absolute image_base_url"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("server stopped");
        Ok(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

struct ApiError(Error);

type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidRequest(_) | Error::Image(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn json_body<T>(
    payload: std::result::Result<Json<T>, JsonRejection>,
) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| Error::InvalidRequest(rejection.body_text()))
}

/// Run blocking gallery I/O off the async workers.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
        .map_err(ApiError)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "personsLoaded": state.store.is_ready(),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct PersonsQuery {
    search: Option<String>,
    category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonsView<'a> {
    last_updated: Option<&'a str>,
    total_persons: usize,
    categories: &'a [Category],
    persons: Vec<&'a Person>,
}

async fn list_persons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PersonsQuery>,
) -> ApiResult<Response> {
    let store = state.store.get()?;

    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) if name.eq_ignore_ascii_case("all") => None,
        Some(name) => Some(name.parse::<Category>().map_err(|_| {
            Error::InvalidRequest(format!("unknown category '{name}'"))
        })?),
    };

    let view = PersonsView {
        last_updated: store.last_updated(),
        total_persons: store.list_persons().len(),
        categories: store.list_categories(),
        persons: store.filter_persons(query.search.as_deref(), category),
    };
    Ok(Json(view).into_response())
}

async fn get_person(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<Person>> {
    let store = state.store.get()?;
    let person = store.get_person(&id).ok_or_else(|| Error::NotFound {
        kind: "person",
        name: id.clone(),
    })?;
    Ok(Json(person.clone()))
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Category>>> {
    let store = state.store.get()?;
    Ok(Json(store.list_categories().to_vec()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindPagesRequest {
    person_ids: Option<Vec<String>>,
}

async fn find_pages(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<FindPagesRequest>, JsonRejection>,
) -> ApiResult<Json<PageMatchReport>> {
    let request = json_body(payload)?;
    let person_ids = request.person_ids.unwrap_or_default();
    let store = state.store.get()?;

    let report = matching::find_matching_pages(
        store,
        &state.image_base_url,
        &person_ids,
    )?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    person_ids: Vec<String>,
    #[serde(default)]
    style: CardStyle,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<CardDraft>> {
    let request = json_body(payload)?;
    let store = state.store.get()?;

    let persons = resolve_persons(store, &request.person_ids)?;
    let draft = CardDraft::new(&persons, request.style);
    tracing::info!(
        id = %draft.id,
        style = %draft.style,
        persons = persons.len(),
        "drafted card"
    );
    Ok(Json(draft))
}

async fn list_cards(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Card>>> {
    let gallery = state.gallery.clone();
    Ok(Json(blocking(move || gallery.list()).await?))
}

async fn save_card(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<NewCard>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Card>)> {
    let card = json_body(payload)?;
    let gallery = state.gallery.clone();
    let saved = blocking(move || gallery.save(card)).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_card(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<Card>> {
    let gallery = state.gallery.clone();
    Ok(Json(blocking(move || gallery.get(&id)).await?))
}

async fn delete_card(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<StatusCode> {
    let gallery = state.gallery.clone();
    blocking(move || gallery.delete(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn gallery_image(
    State(state): State<Arc<AppState>>,
    UrlPath(file): UrlPath<String>,
) -> ApiResult<Response> {
    let path = state.gallery.image_file(&file)?;
    send_file(&path).await
}

async fn page_image(
    State(state): State<Arc<AppState>>,
    UrlPath(path): UrlPath<String>,
) -> ApiResult<Response> {
    let not_found = || Error::NotFound {
        kind: "page image",
        name: path.clone(),
    };
    let root = state.pages_dir.as_deref().ok_or_else(not_found)?;
    let file = resolve_below(root, &path).ok_or_else(not_found)?;
    send_file(&file).await
}

/// Join `relative` onto `root`, refusing anything but plain path segments.
fn resolve_below(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    (plain && relative.components().next().is_some())
        .then(|| root.join(relative))
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn send_file(path: &Path) -> ApiResult<Response> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NotFound {
                kind: "image",
                name: path.display().to_string(),
            }
            .into());
        }
        Err(e) => return Err(Error::Io(e).into()),
    };
    Ok(([(header::CONTENT_TYPE, content_type(path))], bytes).into_response())
}
