use tokio::net::TcpListener;

use partyserver::config::Config;
use partyserver::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partyserver=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = partyserver::db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("failed to create database pool");

    let state = AppState::new(db, config.rate_limit_per_minute, config.allow_registration);
    let app = partyserver::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let rate_limit = match config.rate_limit_per_minute {
        0 => "off".to_string(),
        n => format!("{n}/min"),
    };

    eprintln!();
    eprintln!("  \x1b[1;35mpartyserver\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!("  \x1b[2mpool\x1b[0m         {}", config.db_max_connections);
    eprintln!("  \x1b[2mrate limit\x1b[0m   {rate_limit}");

    if !config.allow_registration {
        eprintln!();
        eprintln!("  \x1b[33m! admin registration disabled\x1b[0m");
    }

    eprintln!();
}
