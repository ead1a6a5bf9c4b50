//! A small blueprint tree served over HTTP.
//!
//! ```bash
//! cargo run --example basic
//! curl -i localhost:4444/api/v1/users/7
//! curl -i -X DELETE localhost:4444/api/v1/users/7
//! curl -i localhost:4444/api/missing
//! ```

use bough::{
    App, Blueprint, HandlerError, HttpError, Json, RequestContext, Response, Route, Server, Settings,
    StatusCode,
};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct User {
    id: i64,
    name: String,
}

async fn show_user(ctx: RequestContext) -> Result<Json<User>, HttpError> {
    let id = ctx
        .param("id")
        .and_then(|v| v.as_int())
        .ok_or_else(HttpError::bad_request)?;
    Ok(Json(User { id, name: format!("user-{id}") }))
}

async fn list_users(ctx: RequestContext) -> Result<Response, HandlerError> {
    let first = ctx.url_for("v1.show_user", &[("id", "1")])?;
    Ok(Response::text(format!("first user lives at {first}")))
}

async fn index(_ctx: RequestContext) -> &'static str {
    "bough demo"
}

async fn log_request(ctx: RequestContext) -> Result<RequestContext, HandlerError> {
    info!(path = %ctx.request().path(), endpoint = ?ctx.endpoint(), "api request");
    Ok(ctx)
}

async fn tag_version(_ctx: RequestContext, mut res: Response) -> Result<Response, HandlerError> {
    res.set_header("x-api-version", "1");
    Ok(res)
}

async fn api_not_found(ctx: RequestContext, _err: HttpError) -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .json(format!(r#"{{"error":"no api route for {}"}}"#, ctx.request().path()))
}

#[tokio::main]
async fn main() -> Result<(), bough::Error> {
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    bough::logging::init(&settings.logging);

    let mut v1 = Blueprint::new("v1").prefix("/v1");
    v1.add_route(Route::get("/users", list_users).exact())?;
    v1.add_route(Route::get("/users/<id:int>", show_user).exact())?;
    v1.after_request(tag_version);

    let mut api = Blueprint::new("api").prefix("/api");
    api.before_request(log_request);
    api.error_handler(StatusCode::NOT_FOUND, api_not_found);
    api.register_child(v1)?;

    let mut root = Blueprint::new("app");
    root.add_route(Route::get("/", index).exact())?;
    root.register_child(api)?;

    let app = App::with_settings(root, &settings)?;
    Server::from_settings(&settings.server)?.serve(app).await
}
