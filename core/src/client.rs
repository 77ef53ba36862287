//! Stateless HTTP request builder and response parser for the chirp backend.
//!
//! # Design
//! `ChirpClient` holds only the API root and no mutable state. Every backend
//! operation is split into a `build_*` method that produces an `HttpRequest`
//! and a `parse_*` method that consumes an `HttpResponse`; the host runs the
//! round-trip in between. Authentication is explicit: operations that need it
//! take a `&Session`, and building fails with `ApiError::MissingToken` when
//! the session is empty, so no request without credentials ever exists.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::search::{SearchKind, SearchOutcome};
use crate::session::Session;
use crate::types::{
    Account, Credentials, Hashtag, LikedTweet, NewAccount, SearchQuery, TokenResponse, Tweet,
    TweetInput,
};

/// Origin used when the host does not configure one.
pub const DEFAULT_ORIGIN: &str = "http://localhost";

const API_PREFIX: &str = "/api";
const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Whether a request carries the session's bearer token.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    Public,
    Bearer(&'a Session),
}

/// Client for the chirp backend. Builds requests, parses responses, never
/// touches the network.
#[derive(Debug, Clone)]
pub struct ChirpClient {
    api_root: String,
}

impl Default for ChirpClient {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN)
    }
}

impl ChirpClient {
    pub fn new(origin: &str) -> Self {
        Self {
            api_root: format!("{}{API_PREFIX}", origin.trim_end_matches('/')),
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Generic request for `path` (relative to the API root).
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        auth: Auth<'_>,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = Vec::new();
        if let Auth::Bearer(session) = auth {
            let token = session.token().ok_or(ApiError::MissingToken)?;
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        let url = format!("{}{path}", self.api_root);
        debug!(method = method.as_str(), %url, "built request");
        Ok(HttpRequest {
            method,
            url,
            headers,
            body: None,
        })
    }

    /// Generic request with a JSON payload.
    pub fn request_json<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        auth: Auth<'_>,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let mut req = self.request(method, path, auth)?;
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        req.headers.push(("content-type".to_string(), JSON.to_string()));
        req.body = Some(body);
        Ok(req)
    }

    // --- accounts ---

    pub fn build_register(&self, input: &NewAccount) -> Result<HttpRequest, ApiError> {
        self.request_json(HttpMethod::Post, "/accounts", Auth::Public, input)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<Account, ApiError> {
        parse_required(response)
    }

    /// The login endpoint takes a form body, not JSON, and is never
    /// authenticated.
    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        let mut req = self.request(HttpMethod::Post, "/accounts/login", Auth::Public)?;
        let body = serde_urlencoded::to_string(credentials)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        req.headers.push(("content-type".to_string(), FORM.to_string()));
        req.body = Some(body);
        Ok(req)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<TokenResponse, ApiError> {
        parse_required(response)
    }

    pub fn build_current_user(&self, session: &Session) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, "/accounts/me", Auth::Bearer(session))
    }

    pub fn parse_current_user(&self, response: HttpResponse) -> Result<Account, ApiError> {
        parse_required(response)
    }

    pub fn build_list_accounts(&self) -> HttpRequest {
        self.public(HttpMethod::Get, "/accounts".to_string())
    }

    pub fn parse_list_accounts(&self, response: HttpResponse) -> Result<Vec<Account>, ApiError> {
        Ok(parse_json(response)?.unwrap_or_default())
    }

    pub fn build_get_account(&self, username: &str) -> HttpRequest {
        self.public(
            HttpMethod::Get,
            format!("/accounts/{}", urlencoding::encode(username)),
        )
    }

    pub fn parse_get_account(&self, response: HttpResponse) -> Result<Account, ApiError> {
        parse_required(response)
    }

    // --- tweets ---

    pub fn build_post_tweet(
        &self,
        session: &Session,
        input: &TweetInput,
    ) -> Result<HttpRequest, ApiError> {
        self.request_json(HttpMethod::Post, "/tweets", Auth::Bearer(session), input)
    }

    pub fn parse_post_tweet(&self, response: HttpResponse) -> Result<Tweet, ApiError> {
        parse_required(response)
    }

    pub fn build_edit_tweet(
        &self,
        session: &Session,
        account_id: i64,
        tweet_id: i64,
        input: &TweetInput,
    ) -> Result<HttpRequest, ApiError> {
        self.request_json(
            HttpMethod::Put,
            &format!("/{account_id}/tweets/{tweet_id}"),
            Auth::Bearer(session),
            input,
        )
    }

    pub fn parse_edit_tweet(&self, response: HttpResponse) -> Result<Tweet, ApiError> {
        parse_required(response)
    }

    pub fn build_delete_tweet(
        &self,
        session: &Session,
        account_id: i64,
        tweet_id: i64,
    ) -> Result<HttpRequest, ApiError> {
        self.request(
            HttpMethod::Delete,
            &format!("/{account_id}/tweets/{tweet_id}"),
            Auth::Bearer(session),
        )
    }

    /// Any 2xx counts; the backend may answer 204 or a JSON message.
    pub fn parse_delete_tweet(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    /// All tweets, or those matching `query` when it is not blank.
    pub fn build_list_tweets(&self, query: Option<&str>) -> HttpRequest {
        let path = match query.filter(|q| !q.trim().is_empty()) {
            Some(q) => format!("/tweets?q={}", urlencoding::encode(q)),
            None => "/tweets".to_string(),
        };
        self.public(HttpMethod::Get, path)
    }

    pub fn parse_list_tweets(&self, response: HttpResponse) -> Result<Vec<Tweet>, ApiError> {
        Ok(parse_json(response)?.unwrap_or_default())
    }

    pub fn build_like_tweet(
        &self,
        session: &Session,
        tweet_id: i64,
    ) -> Result<HttpRequest, ApiError> {
        self.request(
            HttpMethod::Post,
            &format!("/tweets/{tweet_id}/like"),
            Auth::Bearer(session),
        )
    }

    pub fn parse_like_tweet(&self, response: HttpResponse) -> Result<LikedTweet, ApiError> {
        parse_required(response)
    }

    // --- search ---

    pub fn build_search(&self, kind: SearchKind, query: &str) -> Result<HttpRequest, ApiError> {
        let body = SearchQuery {
            query: query.to_string(),
        };
        self.request_json(HttpMethod::Post, kind.path(), Auth::Public, &body)
    }

    pub fn parse_search_accounts(
        &self,
        response: HttpResponse,
    ) -> Result<SearchOutcome<Account>, ApiError> {
        parse_search(SearchKind::Accounts, response)
    }

    pub fn parse_search_hashtags(
        &self,
        response: HttpResponse,
    ) -> Result<SearchOutcome<Hashtag>, ApiError> {
        parse_search(SearchKind::Hashtags, response)
    }

    pub fn parse_search_tweets(
        &self,
        response: HttpResponse,
    ) -> Result<SearchOutcome<Tweet>, ApiError> {
        parse_search(SearchKind::Tweets, response)
    }

    fn public(&self, method: HttpMethod, path: String) -> HttpRequest {
        let url = format!("{}{path}", self.api_root);
        debug!(method = method.as_str(), %url, "built request");
        HttpRequest {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Parse a 2xx JSON body. 204 and empty bodies yield `None`.
pub fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<Option<T>, ApiError> {
    check_status(&response)?;
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| ApiError::Deserialization(e.to_string()))
}

fn parse_required<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    parse_json(response)?.ok_or_else(|| ApiError::Deserialization("empty response body".to_string()))
}

fn parse_search<T: DeserializeOwned>(
    kind: SearchKind,
    response: HttpResponse,
) -> Result<SearchOutcome<T>, ApiError> {
    if response.status == 404 {
        warn!(path = kind.path(), "search returned 404, treating as no results");
        return Ok(SearchOutcome::Empty);
    }
    let items: Option<Vec<T>> = parse_json(response)?;
    Ok(SearchOutcome::from_vec(items.unwrap_or_default()))
}

/// Map non-success status codes to `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        status_text: response.status_text().to_string(),
        body: response.body.clone(),
    })
}
