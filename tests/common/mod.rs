use diesel::{Connection, PgConnection, RunQueryDsl};
use dotenv::dotenv;
use std::env;

embed_migrations!("migrations/");

// postgres database test helper
// the helper creates a new database for tests and drops it once done
pub struct PgTestContext {
    default_url: String,
    db_name: String,
}

impl PgTestContext {
    /// Create a fresh database named after the test and run migrations.
    /// Returns None (with a notice) when the test database env vars are
    /// not configured, so the suite can run without a Postgres server.
    pub fn new(test_name: &str) -> Option<(PgTestContext, String)> {
        dotenv().ok();
        let base_url = match env::var("DATABASE_TEST_BASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("skipping {}: DATABASE_TEST_BASE_URL is not set", test_name);
                return None;
            }
        };
        let default_url = match env::var("DATABASE_TEST_DEFAULT_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("skipping {}: DATABASE_TEST_DEFAULT_URL is not set", test_name);
                return None;
            }
        };
        let db_name = format!("verde_test_{}_{}", test_name, std::process::id());

        // connect to default db and create test db
        let conn =
            PgConnection::establish(&default_url).expect("cannot connect to default pg database");
        diesel::sql_query(format!("DROP DATABASE IF EXISTS {}", db_name))
            .execute(&conn)
            .ok();
        diesel::sql_query(format!("CREATE DATABASE {}", db_name))
            .execute(&conn)
            .expect("couldn't create test database");

        // connect to test db and run migrations
        let test_url = format!("{}/{}", base_url, db_name);
        let conn_test =
            PgConnection::establish(&test_url).expect("cannot connect to test database");
        embedded_migrations::run(&conn_test).expect("running migrations failed");

        Some((
            PgTestContext {
                default_url,
                db_name,
            },
            test_url,
        ))
    }

    pub fn remove(&mut self) {
        let conn = PgConnection::establish(&self.default_url)
            .expect("cannot connect to default pg database");
        diesel::sql_query(format!(
            "SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = '{}';",
            self.db_name
        ))
        .execute(&conn)
        .expect("cannot disconnect db users");
        diesel::sql_query(format!("DROP DATABASE {}", self.db_name))
            .execute(&conn)
            .expect("cannot drop test database");
    }
}
