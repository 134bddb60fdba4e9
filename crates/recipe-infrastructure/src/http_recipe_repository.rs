//! HTTP-backed [`RecipeRepository`] implementation.
//!
//! Talks to the processing-recipe endpoints of a remote API:
//!
//! ```text
//! GET    {base}/processing-recipes        -> [RecipeSummary]
//! GET    {base}/processing-recipes/{id}   -> Recipe (404 when absent)
//! POST   {base}/processing-recipes/{id}   <- Recipe
//! DELETE {base}/processing-recipes/{id}
//! ```

use async_trait::async_trait;
use recipe_core::config::DEFAULT_TIMEOUT_SECS;
use recipe_core::error::{RecipeError, Result};
use recipe_core::recipe::{Recipe, RecipeRepository, RecipeSummary};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

const COLLECTION: &str = "processing-recipes";

/// Recipe repository that talks to a remote recipe API.
#[derive(Clone)]
pub struct HttpRecipeRepository {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpRecipeRepository {
    /// Creates a repository for the API rooted at `base_url`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RecipeError::config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RecipeError::config(format!(
                "Base URL cannot carry a path: '{}'",
                base_url
            )));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            api_key,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds `{base}/processing-recipes[/{id}]` with the id percent-encoded.
    fn url(&self, id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(COLLECTION);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    /// Makes an authenticated request with the configured timeout.
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(self.timeout);
        if let Some(api_key) = &self.api_key {
            request.header("Authorization", format!("Bearer {}", api_key))
        } else {
            request
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        self.auth_request(request)
            .send()
            .await
            .map_err(|e| RecipeError::backend(format!("Failed to {}: {}", what, e)))
    }

    async fn error_for(response: reqwest::Response, what: &str) -> RecipeError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        RecipeError::backend(format!("Failed to {} ({}): {}", what, status, error_text))
    }
}

#[async_trait]
impl RecipeRepository for HttpRecipeRepository {
    async fn load_all(&self) -> Result<Vec<RecipeSummary>> {
        let response = self
            .send(self.client.get(self.url(None)), "list recipes")
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response, "list recipes").await);
        }

        let summaries: Vec<RecipeSummary> = response
            .json()
            .await
            .map_err(|e| RecipeError::serialization("JSON", e.to_string()))?;
        tracing::debug!("[HttpRecipeRepository] Listed {} recipes", summaries.len());
        Ok(summaries)
    }

    async fn load(&self, id: &str) -> Result<Option<Recipe>> {
        let response = self
            .send(self.client.get(self.url(Some(id))), "load recipe")
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let recipe = response
                    .json()
                    .await
                    .map_err(|e| RecipeError::serialization("JSON", e.to_string()))?;
                Ok(Some(recipe))
            }
            _ => Err(Self::error_for(response, "load recipe").await),
        }
    }

    async fn save(&self, recipe: &Recipe) -> Result<()> {
        let request = self
            .client
            .post(self.url(Some(&recipe.id)))
            .json(&recipe.without_ui());
        let response = self.send(request, "save recipe").await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response, "save recipe").await);
        }
        tracing::debug!("[HttpRecipeRepository] Saved recipe {}", recipe.id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .send(self.client.delete(self.url(Some(id))), "delete recipe")
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(RecipeError::not_found("Recipe", id)),
            status if status.is_success() => {
                tracing::debug!("[HttpRecipeRepository] Deleted recipe {}", id);
                Ok(())
            }
            _ => Err(Self::error_for(response, "delete recipe").await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let repo = HttpRecipeRepository::new("https://example.org/api/", None).unwrap();
        assert_eq!(
            repo.url(None).as_str(),
            "https://example.org/api/processing-recipes"
        );
        assert_eq!(
            repo.url(Some("a b")).as_str(),
            "https://example.org/api/processing-recipes/a%20b"
        );

        let repo = HttpRecipeRepository::new("https://example.org/api", None).unwrap();
        assert_eq!(
            repo.url(Some("r1")).as_str(),
            "https://example.org/api/processing-recipes/r1"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = HttpRecipeRepository::new("not a url", None)
            .err()
            .unwrap();
        assert!(matches!(err, RecipeError::Config(_)));

        assert!(HttpRecipeRepository::new("mailto:someone@example.org", None).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_backend_error() {
        let repo = HttpRecipeRepository::new("http://127.0.0.1:9", None)
            .unwrap()
            .with_timeout(Duration::from_millis(500));

        let err = repo.load("r1").await.unwrap_err();
        assert!(err.is_backend());
    }
}
