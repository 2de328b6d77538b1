//! Connection-scoped control plane sessions.

use tracing::debug;

use crate::error::Result;

use super::client::ControlPlane;

/// A model session that is released when dropped.
///
/// Every read or upload batch holds exactly one session, so release happens
/// on success, on error, and when the owning future is dropped.
pub struct Session<'a, C: ControlPlane + ?Sized> {
    client: &'a C,
    model: String,
}

impl<'a, C: ControlPlane + ?Sized> Session<'a, C> {
    /// Opens a session on `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane refuses the session.
    pub async fn open(client: &'a C, model: &str) -> Result<Self> {
        client.open_session(model).await?;
        debug!("Session opened for model {model}");

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }

    /// Returns the client the session was opened on.
    #[must_use]
    pub const fn client(&self) -> &'a C {
        self.client
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl<C: ControlPlane + ?Sized> Drop for Session<'_, C> {
    fn drop(&mut self) {
        self.client.close_session(&self.model);
        debug!("Session released for model {}", self.model);
    }
}

impl<C: ControlPlane + ?Sized> std::fmt::Debug for Session<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("model", &self.model).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::MockControlPlane;
    use crate::error::{ControlPlaneError, RemoteCall};

    #[tokio::test]
    async fn test_session_released_on_drop() {
        let mut client = MockControlPlane::new();
        client
            .expect_open_session()
            .withf(|model| model == "testmodel")
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_close_session()
            .withf(|model| model == "testmodel")
            .times(1)
            .return_const(());

        let session = Session::open(&client, "testmodel").await.unwrap();
        assert_eq!(session.model(), "testmodel");
        drop(session);

        client.checkpoint();
    }

    #[tokio::test]
    async fn test_failed_open_does_not_release() {
        let mut client = MockControlPlane::new();
        client.expect_open_session().times(1).returning(|_| {
            Err(ControlPlaneError::network(RemoteCall::OpenSession, "connection refused").into())
        });
        client.expect_close_session().never();

        assert!(Session::open(&client, "testmodel").await.is_err());
    }
}
