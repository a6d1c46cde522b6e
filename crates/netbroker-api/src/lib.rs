pub mod handlers;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::{ApiResponse, ApiState, ANONYMOUS_UID, INTERFACE_HEADER, UID_HEADER};

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/suppliers", post(handlers::handle_register_supplier))
        .route(
            "/suppliers/{id}",
            get(handlers::handle_get_supplier).delete(handlers::handle_unregister_supplier),
        )
        .route("/suppliers/{id}/info", put(handlers::handle_update_info))
        .route(
            "/suppliers/{id}/capabilities",
            put(handlers::handle_update_capabilities),
        )
        .route("/suppliers/{id}/link", put(handlers::handle_update_link))
        .route("/networks", get(handlers::handle_networks))
        .route(
            "/networks/type/{net_type}",
            get(handlers::handle_networks_by_type),
        )
        .route("/networks/{id}/link", get(handlers::handle_link_info))
        .route(
            "/networks/{id}/capabilities",
            get(handlers::handle_capabilities),
        )
        .route("/default", get(handlers::handle_default_network))
        .route("/default/exists", get(handlers::handle_default_exists))
        .route("/requests", post(handlers::handle_activate_network))
        .route("/requests/{id}", delete(handlers::handle_deactivate))
        .route("/callbacks", post(handlers::handle_register_callback))
        .route(
            "/callbacks/default",
            get(handlers::handle_register_default_callback),
        )
        .route("/callbacks/{id}", delete(handlers::handle_deactivate))
        .route(
            "/policy/uid/{uid}",
            get(handlers::handle_get_uid_policy).put(handlers::handle_set_uid_policy),
        )
        .route("/policy/uid/{uid}/allowed", get(handlers::handle_uid_allowed))
        .route("/policy/uid/{uid}/state", put(handlers::handle_set_uid_state))
        .route("/policy/uids/{policy}", get(handlers::handle_uids_by_policy))
        .route(
            "/policy/background",
            get(handlers::handle_get_background).put(handlers::handle_set_background),
        )
        .route(
            "/policy/background/{uid}",
            get(handlers::handle_background_for_uid),
        )
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Serve on an already bound listener until the connection loop ends.
pub async fn serve_on(state: ApiState, listener: TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    serve_on(state, listener).await
}
