use std::sync::Arc;

use crate::{
    application::error::AppError,
    session::{Session, SessionFactory},
};

#[derive(Clone)]
pub struct HttpState {
    factory: Arc<SessionFactory>,
}

impl HttpState {
    pub fn new(factory: Arc<SessionFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }

    /// Run `work` in one session on a blocking worker thread.
    ///
    /// The session is committed and closed when `work` succeeds. On failure it
    /// is dropped, which closes it and rolls back any pending write.
    pub async fn run<T, F>(&self, work: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> Result<T, AppError> + Send + 'static,
    {
        let factory = Arc::clone(&self.factory);
        tokio::task::spawn_blocking(move || {
            let mut session = factory.open_session();
            let value = work(&mut session)?;
            session.commit(false)?;
            session.close()?;
            Ok(value)
        })
        .await
        .map_err(|err| AppError::unexpected(format!("session worker failed: {err}")))?
    }
}
