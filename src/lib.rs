#[macro_use]
extern crate rocket;

pub mod accounts;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;

use crate::auth::{AuthConfig, AuthState, BootstrapAdmin};
use crate::db::BoardDb;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::Once;
use std::time::Duration;

static LOGGER: Once = Once::new();
static MIGRATOR: rocket_db_pools::sqlx::migrate::Migrator =
    rocket_db_pools::sqlx::migrate!("./migrations");

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Where sessions and administrator accounts live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn from_env() -> Self {
        match std::env::var("BOARD_SESSION_STORE") {
            Ok(value) if value.eq_ignore_ascii_case("memory") => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        }
    }
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Put, Method::Delete]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&["Authorization", "Content-Type"]))
        .expose_headers(["Authorization".to_string()].into_iter().collect())
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    let backend = StoreBackend::from_env();
    let mut rocket = rocket::build().attach(RequestLogger).attach(cors);

    rocket = match backend {
        StoreBackend::Postgres => rocket
            .attach(BoardDb::init())
            .attach(AdHoc::try_on_ignite("Run Migrations", |rocket| async move {
                let Some(db) = BoardDb::fetch(&rocket) else {
                    log::error!("database pool not available for migrations");
                    return Err(rocket);
                };
                match MIGRATOR.run(&**db).await {
                    Ok(()) => {
                        log::info!("database migrations successful");
                        Ok(rocket)
                    }
                    Err(e) => {
                        log::error!("database migrations failed: {}", e);
                        Err(rocket)
                    }
                }
            })),
        StoreBackend::Memory => {
            log::warn!("using in-memory session store; sessions will not survive a restart");
            rocket
        }
    };

    rocket
        .attach(AdHoc::try_on_ignite("Auth State", move |rocket| async move {
            let (config, bootstrap) = match AuthConfig::from_env()
                .and_then(|config| Ok((config, BootstrapAdmin::from_env()?)))
            {
                Ok(loaded) => loaded,
                Err(e) => {
                    log::error!("invalid auth configuration: {}", e);
                    return Err(rocket);
                }
            };

            let state = match backend {
                StoreBackend::Memory => AuthState::in_memory(config),
                StoreBackend::Postgres => match BoardDb::fetch(&rocket) {
                    Some(db) => AuthState::postgres(config, (**db).clone()),
                    None => {
                        log::error!("database pool not available for auth state");
                        return Err(rocket);
                    }
                },
            };

            let state = match state {
                Ok(state) => state,
                Err(e) => {
                    log::error!("failed to initialise auth state: {}", e);
                    return Err(rocket);
                }
            };

            if let Some(admin) = bootstrap {
                if let Err(e) = state.ensure_bootstrap_admin(&admin).await {
                    log::error!("failed to create bootstrap admin {}: {}", admin.id, e);
                    return Err(rocket);
                }
            } else if backend == StoreBackend::Memory {
                log::warn!("no bootstrap admin configured; the in-memory store starts empty");
            }

            Ok(rocket.manage(state))
        }))
        .attach(AdHoc::on_liftoff("Spawn Session Purger", |rocket| {
            Box::pin(async move {
                let Some(state) = rocket.state::<AuthState>().cloned() else {
                    log::error!("failed to spawn session purger: auth state not found");
                    return;
                };
                let shutdown = rocket.shutdown();
                tokio::spawn(async move {
                    let period = Duration::from_secs(state.config.session_purge_interval_secs);
                    log::info!("session purger running every {}s", period.as_secs());
                    let mut ticker = tokio::time::interval(period);
                    tokio::pin!(shutdown);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => match state.authenticator.purge_expired().await {
                                Ok(0) => {}
                                Ok(purged) => log::info!("purged {} expired sessions", purged),
                                Err(e) => log::error!("session purge failed: {}", e),
                            },
                            _ = &mut shutdown => break,
                        }
                    }
                });
            })
        }))
        .register("/", catchers![auth::guards::unauthorized])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Auth routes
                auth::routes::login,
                auth::routes::reissue,
                auth::routes::logout,
                auth::routes::session,
                // Admin routes
                routes::admin::register_admin,
                routes::admin::update_admin,
                routes::admin::delete_admin,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Board API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route, catchers};

    use crate::auth::credentials::Identity;
    use crate::auth::{AuthConfig, AuthResult, AuthState};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Auth configuration with fixed secrets and production-like TTLs.
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            issuer: "board-test".into(),
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 3 * 24 * 60 * 60,
            session_purge_interval_secs: 60 * 60,
        }
    }

    /// Insert an administrator with a hashed password, bypassing validation.
    pub async fn seed_admin(state: &AuthState, id: &str, password: &str) -> AuthResult<Identity> {
        let identity = Identity {
            id: id.to_string(),
            secret_hash: state.password_service.hash_password(password)?,
            display_name: format!("Admin {id}"),
            email: Some(format!("{id}@example.com")),
            phone: None,
        };
        state
            .authenticator
            .credentials()
            .insert_identity(&identity)
            .await?;
        Ok(identity)
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("neither TEST_DATABASE_URL nor TEST_DATABASE_CONTAINER is set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database for integration tests, created inside an
        /// existing server or a disposable container.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Uses `TEST_DATABASE_URL` when set, otherwise starts a Postgres
            /// container if `TEST_DATABASE_CONTAINER=1`.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::with_base_url(&url, None).await;
                }
                if std::env::var("TEST_DATABASE_CONTAINER").is_ok_and(|v| v == "1") {
                    return Self::in_container().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            pub async fn in_container() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag("16-alpine").start().await?;
                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
                Self::with_base_url(&url, Some(container)).await
            }

            async fn with_base_url(
                url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.database(&new_db_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database_with_fallback(admin_options, &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ =
                                        drop_database_with_fallback(admin_options, &db_name).await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        auth_state: Option<AuthState>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                auth_state: None,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        pub fn manage_auth_state(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        /// Finish building the Rocket instance. The 401 catcher is always
        /// registered so gate rejections carry their reason.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment)
                .register("/", catchers![crate::auth::guards::unauthorized]);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
