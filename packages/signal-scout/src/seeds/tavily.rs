//! Tavily-backed web search for the query seed strategy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SearchError;
use crate::security::ApiKey;
use crate::traits::searcher::{SearchResult, WebSearcher};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
}

/// Open-web search through the Tavily API.
pub struct TavilySearcher {
    client: reqwest::Client,
    api_key: ApiKey,
    search_depth: String,
}

impl TavilySearcher {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            search_depth: "basic".to_string(),
        }
    }

    /// Set search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        let request = TavilyRequest {
            query,
            search_depth: &self.search_depth,
            max_results: limit,
        };

        let response = self
            .api_key
            .authorize(self.client.post(TAVILY_SEARCH_URL))
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Status {
                status: response.status().as_u16(),
            });
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(into_results(body, limit))
    }
}

fn into_results(response: TavilyResponse, limit: usize) -> Vec<SearchResult> {
    response
        .results
        .into_iter()
        .filter_map(|r| {
            let mut result = SearchResult::new(Url::parse(&r.url).ok()?);
            result.title = r.title;
            result.snippet = r.content;
            Some(result)
        })
        .take(limit)
        .collect()
}
