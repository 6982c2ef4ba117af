//! Scoped database sessions: commit when the body succeeds, roll back when it fails.
//!
//! Application code normally only needs [`get_session`] or [`with_session`]:
//!
//! ```ignore
//! let count: i64 = get_session(&pool, |tx| {
//!     Box::pin(async move {
//!         let (n,): (i64,) = sqlx::query_as("SELECT count(*) FROM \"Part\"")
//!             .fetch_one(&mut **tx)
//!             .await?;
//!         Ok::<_, DbError>(n)
//!     })
//! })
//! .await?;
//! ```

use crate::error::DbError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};

/// Opens sessions and ends them. `PgPool` is the production implementation; a session is
/// a database transaction.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Send;

    async fn begin(&self) -> Result<Self::Session, DbError>;
    async fn commit(&self, session: Self::Session) -> Result<(), DbError>;
    async fn rollback(&self, session: Self::Session) -> Result<(), DbError>;
}

#[async_trait]
impl SessionFactory for PgPool {
    type Session = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Session, DbError> {
        Ok(sqlx::Pool::begin(self).await?)
    }

    async fn commit(&self, session: Self::Session) -> Result<(), DbError> {
        session.commit().await?;
        Ok(())
    }

    async fn rollback(&self, session: Self::Session) -> Result<(), DbError> {
        session.rollback().await?;
        Ok(())
    }
}

/// Run `body` in a new session.
///
/// If `body` returns `Ok`, the session is committed and a commit failure is returned.
/// If `body` returns `Err`, the session is rolled back and that same error is returned
/// unchanged; a failing rollback is only logged. The session is released on every path.
pub async fn get_session<F, B, T, E>(factory: &F, body: B) -> Result<T, E>
where
    F: SessionFactory + ?Sized,
    B: for<'s> FnOnce(&'s mut F::Session) -> BoxFuture<'s, Result<T, E>>,
    E: From<DbError>,
{
    tracing::debug!(session = std::any::type_name::<F::Session>(), "making session");
    let mut session = factory.begin().await?;
    match body(&mut session).await {
        Ok(value) => {
            factory.commit(session).await?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!(result = std::any::type_name::<T>(), "rolling back session");
            if let Err(rollback_err) = factory.rollback(session).await {
                tracing::warn!(error = %rollback_err, "session rollback failed");
            }
            Err(err)
        }
    }
}

/// Run `body` against `session` if the caller has one, otherwise in a fresh session
/// from [`get_session`].
///
/// A caller-supplied session is neither committed nor rolled back here; its owner decides.
/// Pass the caller's session whenever values returned by `body` are used within it.
pub async fn with_session<F, B, T, E>(
    factory: &F,
    session: Option<&mut F::Session>,
    body: B,
) -> Result<T, E>
where
    F: SessionFactory + ?Sized,
    B: for<'s> FnOnce(&'s mut F::Session) -> BoxFuture<'s, Result<T, E>>,
    E: From<DbError>,
{
    match session {
        Some(session) => body(session).await,
        None => get_session(factory, body).await,
    }
}
