use super::{BackendClient, BackendError};
use crate::model::User;

impl BackendClient {
    /// The signed-in user, or `None` when there is no valid session.
    pub async fn current_user(&self) -> Result<Option<User>, BackendError> {
        if !self.has_session() {
            return Ok(None);
        }

        let url = self.endpoint("/auth/v1/user")?;
        let body = match self.send_text(self.get(url)).await {
            Ok(body) => body,
            Err(BackendError::Unauthorized) => {
                tracing::info!("Access token rejected, treating as signed out");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let user: User =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        tracing::debug!(user_id = %user.id, "Resolved current user");
        Ok(Some(user))
    }

    /// Revoke the current session. An already-invalid session counts as
    /// signed out.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        if !self.has_session() {
            return Ok(());
        }

        let url = self.endpoint("/auth/v1/logout")?;
        match self.send(self.post(url)).await {
            Ok(_) | Err(BackendError::Unauthorized) => {
                tracing::info!("Signed out");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
