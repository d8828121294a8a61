use super::access::AccessChecker;
use super::error::FileServiceError;
use super::FileService;
use crate::domain::FileId;
use crate::library::EmptyResult;
use async_trait::async_trait;
use bytes::Bytes;
use jatsl::{Job, JobManager};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

/// Header carrying the session on whose behalf a file is downloaded
pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Deserialize)]
struct UploadQuery {
    name: Option<String>,
}

fn error_response(error: FileServiceError) -> Response {
    let status = error.status();

    if status.is_server_error() {
        error!(?error, "Request failed");
    }

    warp::reply::with_status(
        warp::reply::json(&json!({ "error": error.to_string() })),
        status,
    )
    .into_response()
}

async fn upload<A: AccessChecker>(
    query: UploadQuery,
    mime: Option<String>,
    content: Bytes,
    service: Arc<FileService<A>>,
) -> Result<Response, Infallible> {
    Ok(match service.upload(query.name, mime, &content).await {
        Ok(metadata) => {
            warp::reply::with_status(warp::reply::json(&metadata), StatusCode::CREATED)
                .into_response()
        }
        Err(error) => error_response(error),
    })
}

async fn metadata<A: AccessChecker>(
    id: FileId,
    service: Arc<FileService<A>>,
) -> Result<Response, Infallible> {
    Ok(match service.metadata(&id).await {
        Ok(metadata) => warp::reply::json(&metadata).into_response(),
        Err(error) => error_response(error),
    })
}

async fn download<A: AccessChecker>(
    id: FileId,
    session_id: Option<String>,
    service: Arc<FileService<A>>,
) -> Result<Response, Infallible> {
    Ok(match service.download(session_id.as_deref(), &id).await {
        Ok((metadata, content)) => {
            warp::reply::with_header(content, "content-type", metadata.mime).into_response()
        }
        Err(error) => error_response(error),
    })
}

/// HTTP routes of the file service
///
/// - `POST /files?name=<name>` stores the request body
/// - `GET /files/<id>/metadata` returns the record of a file
/// - `GET /files/<id>` returns the content of a file, requires the [`SESSION_HEADER`]
pub fn routes<A: AccessChecker>(
    service: Arc<FileService<A>>,
    upload_limit: u64,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let service = warp::any().map(move || service.clone());

    let upload_route = warp::post()
        .and(warp::path!("files"))
        .and(warp::query::<UploadQuery>())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(upload_limit))
        .and(warp::body::bytes())
        .and(service.clone())
        .and_then(upload);

    let metadata_route = warp::get()
        .and(warp::path!("files" / FileId / "metadata"))
        .and(service.clone())
        .and_then(metadata);

    let download_route = warp::get()
        .and(warp::path!("files" / FileId))
        .and(warp::header::optional::<String>(SESSION_HEADER))
        .and(service)
        .and_then(download);

    upload_route
        .or(metadata_route)
        .unify()
        .or(download_route)
        .unify()
}

/// Job serving the [`routes`] over HTTP
pub struct ServerJob<A: AccessChecker> {
    port: u16,
    upload_limit: u64,
    service: Arc<FileService<A>>,
}

impl<A: AccessChecker> ServerJob<A> {
    /// Creates a new instance from raw parts
    pub fn new(port: u16, upload_limit: u64, service: FileService<A>) -> Self {
        Self {
            port,
            upload_limit,
            service: Arc::new(service),
        }
    }
}

#[async_trait]
impl<A: AccessChecker> Job for ServerJob<A> {
    const NAME: &'static str = module_path!();
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let routes = routes(self.service.clone(), self.upload_limit).with(warp::trace::request());

        let source_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(source_addr, manager.termination_signal())?;

        info!(?addr, "Serving files");
        manager.ready().await;
        server.await;

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::super::service::does::{service, SingleSession};
    use super::*;
    use crate::domain::FileMetadata;
    use pretty_assertions::assert_eq;
    use warp::test::request;

    const LIMIT: u64 = 1024;

    #[tokio::test]
    async fn upload_and_serve_files() {
        let (_directory, service) = service(SingleSession("s1")).await;
        let routes = routes(Arc::new(service), LIMIT);

        let response = request()
            .method("POST")
            .path("/files?name=hello.txt")
            .header("content-type", "text/plain")
            .body("hello")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let uploaded: FileMetadata = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(uploaded.name.as_str(), "hello.txt");
        assert_eq!(uploaded.mime.as_str(), "text/plain");
        assert_eq!(uploaded.size, 5);

        let response = request()
            .path(&format!("/files/{}/metadata", uploaded.id))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<FileMetadata>(response.body()).unwrap(),
            uploaded
        );

        let response = request()
            .path(&format!("/files/{}", uploaded.id))
            .header(SESSION_HEADER, "s1")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"].to_str().unwrap(), "text/plain");
        assert_eq!(response.body().as_ref(), &b"hello"[..]);
    }

    #[tokio::test]
    async fn map_failures_to_status_codes() {
        let (_directory, service) = service(SingleSession("s1")).await;
        let uploaded = service.upload(None, None, b"secret").await.unwrap();
        let routes = routes(Arc::new(service), LIMIT);
        let path = format!("/files/{}", uploaded.id);

        let forbidden = request()
            .path(&path)
            .header(SESSION_HEADER, "s2")
            .reply(&routes)
            .await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let anonymous = request().path(&path).reply(&routes).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let unknown = request()
            .path(&format!("/files/{}/metadata", uuid::Uuid::new_v4()))
            .reply(&routes)
            .await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reject_oversized_uploads() {
        let (_directory, service) = service(SingleSession("s1")).await;
        let routes = routes(Arc::new(service), 4);

        let rejected = request()
            .method("POST")
            .path("/files")
            .body("too large")
            .filter(&routes)
            .await;

        assert!(rejected.is_err());
    }
}
