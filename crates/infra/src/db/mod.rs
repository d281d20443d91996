use surrealdb::{
    Surreal,
    engine::remote::ws::{Client, Ws},
    opt::auth::Root,
};
use url::Url;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.surreal_endpoint.clone(),
            namespace: config.surreal_ns.clone(),
            database: config.surreal_db.clone(),
            username: config.surreal_user.clone(),
            password: config.surreal_pass.clone(),
        }
    }
}

/// Opens an authenticated websocket session scoped to the configured namespace and database.
pub async fn connect(db_config: &DbConfig) -> anyhow::Result<Surreal<Client>> {
    let address = socket_address(&db_config.endpoint)?;
    let db = Surreal::<Client>::init();
    db.connect::<Ws>(address.as_str()).await?;
    db.signin(Root {
        username: db_config.username.clone(),
        password: db_config.password.clone(),
    })
    .await?;
    db.use_ns(&db_config.namespace)
        .use_db(&db_config.database)
        .await?;
    tracing::info!(
        address,
        namespace = %db_config.namespace,
        database = %db_config.database,
        "connected to surrealdb"
    );
    Ok(db)
}

/// `host:port` for the websocket engine, which takes no scheme.
pub fn socket_address(endpoint: &str) -> anyhow::Result<String> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    };
    let parsed = Url::parse(&normalized)
        .map_err(|err| anyhow::anyhow!("invalid surreal endpoint '{endpoint}': {err}"))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("missing surreal host in endpoint '{endpoint}'"))?;
    let port = parsed.port().unwrap_or(match parsed.scheme() {
        "wss" | "https" => 443,
        _ => 8000,
    });
    Ok(format!("{host}:{port}"))
}
