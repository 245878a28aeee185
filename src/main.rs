use gophr::{app, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gophr=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    if app_state.config.destructive_reset {
        tracing::warn!("DESTRUCTIVE_RESET is set; rebuilding users table");
        app_state.users.destructive_reset().await?;
    } else {
        app_state.users.auto_migrate().await?;
    }

    let users = app_state.users.clone();
    let result = app::serve(app::build_app(app_state)).await;
    users.close().await;
    result
}
