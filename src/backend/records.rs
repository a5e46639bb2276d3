use super::{with_retry, BackendClient, BackendError};
use crate::model::{Bookmark, BookmarkId, NewBookmark, OwnerId};

const BOOKMARKS_PATH: &str = "/rest/v1/bookmarks";

impl BackendClient {
    /// All bookmarks for `owner`, newest first.
    ///
    /// Rows that fail to decode or validate are skipped with a warning rather
    /// than failing the whole load.
    pub async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Bookmark>, BackendError> {
        let url = self.endpoint(BOOKMARKS_PATH)?;
        let owner_filter = format!("eq.{}", owner);

        let body = with_retry("list_bookmarks", || {
            let request = self.get(url.clone()).query(&[
                ("select", "*"),
                ("user_id", owner_filter.as_str()),
                ("order", "created_at.desc"),
            ]);
            self.send_text(request)
        })
        .await?;

        let rows: Vec<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        let total = rows.len();

        let bookmarks: Vec<Bookmark> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Bookmark>(row) {
                Ok(bookmark) => match bookmark.validate() {
                    Ok(()) => Some(bookmark),
                    Err(e) => {
                        tracing::warn!(id = %bookmark.id, error = %e, "Skipping invalid bookmark row");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable bookmark row");
                    None
                }
            })
            .collect();

        if bookmarks.len() < total {
            tracing::warn!(
                skipped = total - bookmarks.len(),
                total,
                "Some bookmark rows were skipped"
            );
        }
        tracing::debug!(owner = %owner, count = bookmarks.len(), "Loaded bookmarks");
        Ok(bookmarks)
    }

    /// Create a bookmark and return the stored record.
    ///
    /// Not retried: a timed-out insert may have landed, and the change feed
    /// will deliver it if so.
    pub async fn insert(&self, new: &NewBookmark) -> Result<Bookmark, BackendError> {
        let url = self.endpoint(BOOKMARKS_PATH)?;
        let request = self
            .post(url)
            .header("Prefer", "return=representation")
            .json(new);

        let body = self.send_text(request).await?;
        let mut rows: Vec<Bookmark> =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        if rows.is_empty() {
            return Err(BackendError::EmptyInsertResponse);
        }
        let created = rows.swap_remove(0);
        created
            .validate()
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        tracing::info!(id = %created.id, "Bookmark created");
        Ok(created)
    }

    /// Delete one bookmark owned by `owner`. Deleting an id that no longer
    /// exists succeeds.
    pub async fn delete_bookmark(&self, owner: &OwnerId, id: &BookmarkId) -> Result<(), BackendError> {
        let url = self.endpoint(BOOKMARKS_PATH)?;
        let id_filter = format!("eq.{}", id);
        let owner_filter = format!("eq.{}", owner);

        with_retry("delete_bookmark", || {
            let request = self
                .delete(url.clone())
                .query(&[("id", id_filter.as_str()), ("user_id", owner_filter.as_str())]);
            async move { self.send(request).await.map(|_| ()) }
        })
        .await?;

        tracing::info!(id = %id, "Bookmark deleted");
        Ok(())
    }
}
