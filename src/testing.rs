//! In-memory test client.
//!
//! Drives an [`App`] without opening a socket:
//!
//! ```rust
//! use bough::testing::TestClient;
//! use bough::{App, Blueprint, RequestContext, Response, Route, StatusCode};
//!
//! async fn ping(_: RequestContext) -> Response { Response::text("pong") }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut root = Blueprint::new("app");
//! root.add_route(Route::get("/ping", ping)).unwrap();
//! let client = TestClient::new(App::new(root).unwrap());
//!
//! let res = client.get("/ping").await;
//! assert_eq!(res.status_code(), StatusCode::OK);
//! assert_eq!(res.text_body(), "pong");
//! # }
//! ```

use bytes::Bytes;
use http::Method;

use crate::app::App;
use crate::request::{Request, RequestBuilder};
use crate::response::Response;

#[derive(Clone, Debug)]
pub struct TestClient {
    app: App,
}

impl TestClient {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Starts a request; finish it with [`send`](Self::send).
    pub fn request(&self, method: Method, uri: &str) -> RequestBuilder {
        Request::builder(method, uri)
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder(Method::GET, uri).build()).await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Bytes>) -> Response {
        self.send(Request::builder(Method::POST, uri).body(body).build()).await
    }

    pub async fn send(&self, request: Request) -> Response {
        self.app.handle(request).await
    }
}
