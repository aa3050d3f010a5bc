//! Typed HTTP client for the feed API.
//!
//! Every call needs an access token. Calls made without one fail with
//! [`AppError::Unauthenticated`] before any request is sent, and error
//! bodies returned by the server are mapped back onto [`AppError`] by code.
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    models::{
        ContentItem, FeedEntry, NotificationId, NotificationView, ParentChildLink, TagKind, UserId,
    },
    routes::notifications::{CountResponse, UpdatedResponse},
    services::{
        links::ChildSummary,
        notifications::UserSuggestion,
        tags::{ChildTagsView, TagsView},
    },
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

#[derive(Clone)]
pub struct FeedClient {
    http_client: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl FeedClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Forgets the access token, e.g. on sign-out
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    fn bearer(&self) -> AppResult<&str> {
        self.token.as_deref().ok_or(AppError::Unauthenticated)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> AppResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => AppError::from_code(&parsed.code, parsed.error),
            Err(_) => AppError::RemoteFailure(format!("Server returned status {}: {}", status, body)),
        };

        tracing::debug!(status = %status, code = error.code(), "Request failed");
        Err(error)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> AppResult<()> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    fn get(&self, path: &str) -> AppResult<RequestBuilder> {
        Ok(self.http_client.get(self.url(path)).bearer_auth(self.bearer()?))
    }

    fn post(&self, path: &str) -> AppResult<RequestBuilder> {
        Ok(self.http_client.post(self.url(path)).bearer_auth(self.bearer()?))
    }

    fn put(&self, path: &str) -> AppResult<RequestBuilder> {
        Ok(self.http_client.put(self.url(path)).bearer_auth(self.bearer()?))
    }

    fn delete(&self, path: &str) -> AppResult<RequestBuilder> {
        Ok(self.http_client.delete(self.url(path)).bearer_auth(self.bearer()?))
    }

    // Feed and tags

    pub async fn get_feed(&self) -> AppResult<Vec<FeedEntry>> {
        self.send(self.get("/feeds/feed")?).await
    }

    pub async fn get_tags(&self, kind: TagKind) -> AppResult<TagsView> {
        self.send(self.get(&format!("/feeds/tags/{}", kind))?).await
    }

    pub async fn add_tag(&self, kind: TagKind, tag: &str) -> AppResult<TagsView> {
        let request = self.post(&format!("/feeds/tags/{}", kind))?;
        self.send(request.json(&json!({ "tag": tag }))).await
    }

    pub async fn remove_tag(&self, kind: TagKind, tag: &str) -> AppResult<TagsView> {
        let request = self.delete(&format!("/feeds/tags/{}", kind))?;
        self.send(request.json(&json!({ "tag": tag }))).await
    }

    pub async fn record_interaction(&self, tags: &[String]) -> AppResult<TagsView> {
        let request = self.post("/feeds/tags/interaction")?;
        self.send(request.json(&json!({ "tags": tags }))).await
    }

    pub async fn publish_content(&self, title: &str, tags: &[String]) -> AppResult<ContentItem> {
        let request = self.post("/content")?;
        self.send(request.json(&json!({ "title": title, "tags": tags }))).await
    }

    // Parental controls

    pub async fn children(&self) -> AppResult<Vec<ChildSummary>> {
        self.send(self.get("/feeds/parent/children")?).await
    }

    pub async fn child_tags(&self, child: UserId) -> AppResult<ChildTagsView> {
        self.send(self.get(&format!("/feeds/parent/child/{}/tags", child))?)
            .await
    }

    pub async fn add_child_excluded_tag(&self, child: UserId, tag: &str) -> AppResult<TagsView> {
        self.update_child_excluded_tag(child, tag, "add").await
    }

    pub async fn remove_child_excluded_tag(&self, child: UserId, tag: &str) -> AppResult<TagsView> {
        self.update_child_excluded_tag(child, tag, "remove").await
    }

    async fn update_child_excluded_tag(
        &self,
        child: UserId,
        tag: &str,
        action: &str,
    ) -> AppResult<TagsView> {
        let request = self.post(&format!("/feeds/parent/child/{}/excluded-tags", child))?;
        self.send(request.json(&json!({ "tag": tag, "action": action })))
            .await
    }

    pub async fn unlink_child(&self, child: UserId) -> AppResult<ParentChildLink> {
        self.send(self.delete(&format!("/feeds/parent/unlink-child/{}", child))?)
            .await
    }

    pub async fn unlink(&self, other: UserId) -> AppResult<ParentChildLink> {
        self.send(self.delete(&format!("/feeds/links/{}", other))?)
            .await
    }

    // Notifications

    pub async fn notifications(&self) -> AppResult<Vec<NotificationView>> {
        self.send(self.get("/notifications")?).await
    }

    pub async fn unread_count(&self) -> AppResult<u64> {
        let body: CountResponse = self.send(self.get("/notifications/count")?).await?;
        Ok(body.count)
    }

    pub async fn send_parent_request(&self, child: UserId) -> AppResult<ParentChildLink> {
        let request = self.post("/notifications/parent-request")?;
        self.send(request.json(&json!({ "child_user_id": child })))
            .await
    }

    pub async fn respond_to_request(
        &self,
        notification: NotificationId,
        accept: bool,
    ) -> AppResult<NotificationView> {
        let request = self.post(&format!(
            "/notifications/parent-request/{}/respond",
            notification
        ))?;
        self.send(request.json(&json!({ "accept": accept }))).await
    }

    pub async fn mark_read(&self, notification: NotificationId) -> AppResult<NotificationView> {
        self.send(self.put(&format!("/notifications/{}/read", notification))?)
            .await
    }

    pub async fn mark_all_read(&self) -> AppResult<u64> {
        let body: UpdatedResponse = self.send(self.put("/notifications/read-all")?).await?;
        Ok(body.updated)
    }

    pub async fn delete_notification(&self, notification: NotificationId) -> AppResult<()> {
        self.send_empty(self.delete(&format!("/notifications/{}", notification))?)
            .await
    }

    pub async fn username_suggestions(&self, query: &str) -> AppResult<Vec<UserSuggestion>> {
        let request = self.get("/notifications/username-suggestions")?;
        self.send(request.query(&[("query", query)])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens here; a request that reached the network would fail
    // with HttpClient rather than Unauthenticated.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[tokio::test]
    async fn test_calls_without_token_fail_before_network() {
        let client = FeedClient::new(UNREACHABLE);

        assert!(matches!(client.get_feed().await, Err(AppError::Unauthenticated)));
        assert!(matches!(
            client.add_tag(TagKind::Exclude, "violence").await,
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            client.send_parent_request(UserId::new()).await,
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            client.delete_notification(NotificationId::new()).await,
            Err(AppError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_cleared_token_fails_fast() {
        let mut client = FeedClient::new(UNREACHABLE).with_token("abc");
        client.clear_token();
        assert!(matches!(client.unread_count().await, Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = FeedClient::new("http://localhost:3000/");
        assert_eq!(client.url("/feeds/feed"), "http://localhost:3000/feeds/feed");
    }
}
