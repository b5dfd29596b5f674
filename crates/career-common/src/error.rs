/// Error types shared across career service crates.
///
/// These errors represent failures in infrastructure components (Redis and local blob
/// files). Backends log them and degrade; they do not cross the crate boundary. The
/// remote catalog client reports its own `CatalogApiError`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}
