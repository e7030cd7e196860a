use verde_server::*;

use badges::{badge_worker, BadgeRecheck};
use db::{init_db_pool, DBWrapper};
use dotenv::dotenv;
use futures_channel::mpsc;
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let db_url =
        env::var("DATABASE_URL").expect("DATABASE_URL must be set to the postgres database url");
    let sweep_secs = env::var("EXPIRY_SWEEP_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60);

    let pool = init_db_pool(&db_url).expect("can't open database");

    let (recheck_tx, recheck_rx) = mpsc::unbounded::<BadgeRecheck>();
    tokio::spawn(badge_worker(pool.clone(), recheck_tx.clone(), recheck_rx));

    log::info!("sweeping expired tournaments every {}s", sweep_secs);
    let mut interval = tokio::time::interval(Duration::from_secs(sweep_secs));
    loop {
        interval.tick().await;
        let swept = DBWrapper::from_pg_pool(&pool, recheck_tx.clone())
            .and_then(|db| db.finalizar_torneos_vencidos());
        match swept {
            Ok(0) => {}
            Ok(n) => log::info!("finalized {} expired tournament(s)", n),
            Err(e) => log::error!("expiry sweep failed: {}", e),
        }
    }
}
