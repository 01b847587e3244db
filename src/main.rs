use std::sync::Arc;

use ridex::config::Config;
use ridex::engine::Engine;
use ridex::server::serve;
use ridex::store::{DynStore, PgStore};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().unwrap();

    let store = PgStore::new(&config.database_url, config.pg_max_connections)
        .await
        .unwrap();

    let engine = Engine::new(Arc::new(store) as DynStore);

    serve(engine, config.bind_addr).await;
}
