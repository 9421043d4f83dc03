//! Connection pool construction.

use crate::config::{ConnectionConfig, Recycling};
use crate::error::{SqlError, SqlResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Build a pool from `config` using `NoTls`.
///
/// No connection is opened here; the first one is established when a
/// statement first needs it.
pub fn create_pool(config: &ConnectionConfig) -> SqlResult<Pool> {
    create_pool_with_tls(config, NoTls)
}

/// Build a pool from `config` with a custom TLS connector.
pub fn create_pool_with_tls<T>(config: &ConnectionConfig, tls: T) -> SqlResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    config.validate()?;
    let manager_config = ManagerConfig {
        recycling_method: recycling_method(config.recycling),
    };
    let max_size = config.max_pool_size;
    let wait_timeout = config.acquire_timeout;
    create_pool_with_manager_config(&config.database_url, tls, manager_config, |builder| {
        builder.max_size(max_size).wait_timeout(wait_timeout)
    })
}

/// Build a pool with an explicit `ManagerConfig` and `PoolBuilder` tweaks.
pub fn create_pool_with_manager_config<T>(
    database_url: &str,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> SqlResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| SqlError::Connection(e.to_string()))?;

    let mgr = Manager::from_config(pg_config, tls, manager_config);
    // Timeouts need a runtime to drive them.
    configure_pool(Pool::builder(mgr).runtime(Runtime::Tokio1))
        .build()
        .map_err(|e| SqlError::Pool(e.to_string()))
}

fn recycling_method(recycling: Recycling) -> RecyclingMethod {
    match recycling {
        Recycling::Fast => RecyclingMethod::Fast,
        Recycling::Verified => RecyclingMethod::Verified,
        Recycling::Clean => RecyclingMethod::Clean,
    }
}
