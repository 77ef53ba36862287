use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hashtag {
    pub id: i64,
    pub tag: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    pub id: i64,
    pub url: String,
    pub media_type: String,
    pub tweet_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRef {
    pub id: i64,
    pub username: String,
    pub handle: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tweet {
    pub id: i64,
    pub account: AccountRef,
    pub account_id: i64,
    pub content: String,
    pub hashtags: Vec<Hashtag>,
    pub media: Vec<Media>,
    pub likes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub handle: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub tweets: Vec<Tweet>,
}

#[derive(Deserialize)]
pub struct CreateAccount {
    pub username: String,
    pub handle: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenBody {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize)]
pub struct CreateTweet {
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub media: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateTweet {
    pub content: Option<String>,
    pub hashtags: Option<Vec<String>>,
    pub media: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Deserialize)]
pub struct TweetQuery {
    pub q: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LikeBody {
    pub id: i64,
    pub likes: u64,
}

/// Failures reported to the client as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("You don't have access to edit or delete tweets on this account")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = match self {
            ApiFailure::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiFailure::Forbidden => StatusCode::FORBIDDEN,
            ApiFailure::NotFound(_) => StatusCode::NOT_FOUND,
            ApiFailure::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

struct AccountRecord {
    id: i64,
    username: String,
    handle: String,
    email: String,
    password: String,
    created_at: DateTime<Utc>,
}

struct TweetRecord {
    id: i64,
    account_id: i64,
    content: String,
    hashtag_ids: Vec<i64>,
    media: Vec<Media>,
    likes: u64,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct Store {
    accounts: Vec<AccountRecord>,
    tweets: Vec<TweetRecord>,
    hashtags: Vec<Hashtag>,
    tokens: HashMap<String, i64>,
    next_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn intern_tag(&mut self, tag: &str) -> i64 {
        if let Some(existing) = self.hashtags.iter().find(|h| h.tag == tag) {
            return existing.id;
        }
        let id = self.next_id();
        self.hashtags.push(Hashtag {
            id,
            tag: tag.to_string(),
        });
        id
    }

    fn media_for(&mut self, tweet_id: i64, urls: &[String]) -> Vec<Media> {
        urls.iter()
            .map(|url| Media {
                id: self.next_id(),
                url: url.clone(),
                media_type: "image".to_string(),
                tweet_id,
            })
            .collect()
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<i64, ApiFailure> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiFailure::Unauthorized)?;
        self.tokens.get(token).copied().ok_or(ApiFailure::Unauthorized)
    }

    fn account_ref(&self, account_id: i64) -> Option<AccountRef> {
        self.accounts
            .iter()
            .find(|a| a.id == account_id)
            .map(|a| AccountRef {
                id: a.id,
                username: a.username.clone(),
                handle: a.handle.clone(),
            })
    }

    fn render_tweet(&self, record: &TweetRecord) -> Option<Tweet> {
        Some(Tweet {
            id: record.id,
            account: self.account_ref(record.account_id)?,
            account_id: record.account_id,
            content: record.content.clone(),
            hashtags: record
                .hashtag_ids
                .iter()
                .filter_map(|id| self.hashtags.iter().find(|h| h.id == *id).cloned())
                .collect(),
            media: record.media.clone(),
            likes: record.likes,
            created_at: record.created_at,
        })
    }

    fn render_account(&self, record: &AccountRecord) -> Account {
        Account {
            id: record.id,
            username: record.username.clone(),
            handle: record.handle.clone(),
            email: record.email.clone(),
            created_at: record.created_at,
            tweets: self
                .tweets
                .iter()
                .filter(|t| t.account_id == record.id)
                .filter_map(|t| self.render_tweet(t))
                .collect(),
        }
    }

    fn tweets_matching(&self, query: &str) -> Vec<Tweet> {
        let needle = query.to_lowercase();
        self.tweets
            .iter()
            .filter(|t| t.content.to_lowercase().contains(&needle))
            .filter_map(|t| self.render_tweet(t))
            .collect()
    }

    /// The caller's tweet at `(account_id, tweet_id)`, after the auth and
    /// ownership checks.
    fn owned_tweet(
        &mut self,
        headers: &HeaderMap,
        account_id: i64,
        tweet_id: i64,
    ) -> Result<&mut TweetRecord, ApiFailure> {
        let caller = self.authenticate(headers)?;
        if caller != account_id {
            return Err(ApiFailure::Forbidden);
        }
        self.tweets
            .iter_mut()
            .find(|t| t.id == tweet_id && t.account_id == account_id)
            .ok_or(ApiFailure::NotFound("Tweet not found"))
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/login", post(login))
        .route("/accounts/me", get(current_account))
        .route("/accounts/search", post(search_accounts))
        .route("/accounts/{username}", get(get_account))
        .route("/tweets", get(list_tweets).post(create_tweet))
        .route("/tweets/search", post(search_tweets))
        .route("/tweets/{tweet_id}/like", post(like_tweet))
        .route("/hashtags/search", post(search_hashtags))
        .route(
            "/{account_id}/tweets/{tweet_id}",
            put(edit_tweet).delete(delete_tweet),
        );
    Router::new().nest("/api", api).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn create_account(
    State(db): State<Db>,
    Json(input): Json<CreateAccount>,
) -> Result<(StatusCode, Json<Account>), ApiFailure> {
    let mut store = db.write().await;
    if store.accounts.iter().any(|a| a.username == input.username) {
        return Err(ApiFailure::BadRequest("Username already registered".to_string()));
    }
    let record = AccountRecord {
        id: store.next_id(),
        username: input.username,
        handle: input.handle,
        email: input.email,
        password: input.password,
        created_at: Utc::now(),
    };
    info!(username = %record.username, "account created");
    let account = store.render_account(&record);
    store.accounts.push(record);
    Ok((StatusCode::CREATED, Json(account)))
}

async fn login(
    State(db): State<Db>,
    Form(input): Form<LoginForm>,
) -> Result<Json<TokenBody>, ApiFailure> {
    let mut store = db.write().await;
    let account_id = store
        .accounts
        .iter()
        .find(|a| a.username == input.username && a.password == input.password)
        .map(|a| a.id)
        .ok_or_else(|| ApiFailure::BadRequest("Incorrect username or password".to_string()))?;
    let token = Uuid::new_v4().to_string();
    store.tokens.insert(token.clone(), account_id);
    info!(username = %input.username, "login");
    Ok(Json(TokenBody {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

async fn list_accounts(State(db): State<Db>) -> Json<Vec<Account>> {
    let store = db.read().await;
    Json(store.accounts.iter().map(|a| store.render_account(a)).collect())
}

async fn current_account(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Account>, ApiFailure> {
    let store = db.read().await;
    let id = store.authenticate(&headers)?;
    store
        .accounts
        .iter()
        .find(|a| a.id == id)
        .map(|a| Json(store.render_account(a)))
        .ok_or(ApiFailure::NotFound("User not found"))
}

async fn get_account(
    State(db): State<Db>,
    Path(username): Path<String>,
) -> Result<Json<Account>, ApiFailure> {
    let store = db.read().await;
    store
        .accounts
        .iter()
        .find(|a| a.username == username)
        .map(|a| Json(store.render_account(a)))
        .ok_or(ApiFailure::NotFound("Account not found"))
}

async fn search_accounts(
    State(db): State<Db>,
    Json(input): Json<SearchRequest>,
) -> Json<Vec<Account>> {
    let store = db.read().await;
    let needle = input.query.to_lowercase();
    debug!(query = %input.query, "search accounts");
    Json(
        store
            .accounts
            .iter()
            .filter(|a| {
                a.username.to_lowercase().contains(&needle)
                    || a.email.to_lowercase().contains(&needle)
            })
            .map(|a| store.render_account(a))
            .collect(),
    )
}

async fn list_tweets(
    State(db): State<Db>,
    Query(params): Query<TweetQuery>,
) -> Result<Json<Vec<Tweet>>, ApiFailure> {
    let store = db.read().await;
    let tweets = store.tweets_matching(params.q.as_deref().unwrap_or(""));
    if tweets.is_empty() {
        return Err(ApiFailure::NotFound("No tweets found"));
    }
    Ok(Json(tweets))
}

async fn create_tweet(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateTweet>,
) -> Result<(StatusCode, Json<Tweet>), ApiFailure> {
    let mut store = db.write().await;
    let account_id = store.authenticate(&headers)?;
    let id = store.next_id();
    let hashtag_ids: Vec<i64> = input.hashtags.iter().map(|t| store.intern_tag(t)).collect();
    let media = store.media_for(id, &input.media);
    let record = TweetRecord {
        id,
        account_id,
        content: input.content,
        hashtag_ids,
        media,
        likes: 0,
        created_at: Utc::now(),
    };
    let tweet = store
        .render_tweet(&record)
        .ok_or(ApiFailure::NotFound("User not found"))?;
    store.tweets.push(record);
    debug!(tweet_id = id, account_id, "tweet posted");
    Ok((StatusCode::CREATED, Json(tweet)))
}

async fn edit_tweet(
    State(db): State<Db>,
    Path((account_id, tweet_id)): Path<(i64, i64)>,
    headers: HeaderMap,
    Json(input): Json<UpdateTweet>,
) -> Result<Json<Tweet>, ApiFailure> {
    let mut store = db.write().await;
    store.owned_tweet(&headers, account_id, tweet_id)?;
    let hashtag_ids: Option<Vec<i64>> = input
        .hashtags
        .map(|tags| tags.iter().map(|t| store.intern_tag(t)).collect());
    let media = input.media.map(|urls| store.media_for(tweet_id, &urls));

    let record = store.owned_tweet(&headers, account_id, tweet_id)?;
    if let Some(content) = input.content {
        record.content = content;
    }
    if let Some(ids) = hashtag_ids {
        record.hashtag_ids = ids;
    }
    if let Some(media) = media {
        record.media = media;
    }

    let store = &*store;
    store
        .tweets
        .iter()
        .find(|t| t.id == tweet_id)
        .and_then(|t| store.render_tweet(t))
        .map(Json)
        .ok_or(ApiFailure::NotFound("Tweet not found"))
}

async fn delete_tweet(
    State(db): State<Db>,
    Path((account_id, tweet_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiFailure> {
    let mut store = db.write().await;
    store.owned_tweet(&headers, account_id, tweet_id)?;
    store.tweets.retain(|t| t.id != tweet_id);
    debug!(tweet_id, account_id, "tweet deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn like_tweet(
    State(db): State<Db>,
    Path(tweet_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<LikeBody>, ApiFailure> {
    let mut store = db.write().await;
    store.authenticate(&headers)?;
    let tweet = store
        .tweets
        .iter_mut()
        .find(|t| t.id == tweet_id)
        .ok_or(ApiFailure::NotFound("Tweet not found"))?;
    tweet.likes += 1;
    Ok(Json(LikeBody {
        id: tweet.id,
        likes: tweet.likes,
    }))
}

async fn search_hashtags(
    State(db): State<Db>,
    Json(input): Json<SearchRequest>,
) -> Result<Json<Vec<Hashtag>>, ApiFailure> {
    let store = db.read().await;
    let needle = input.query.to_lowercase();
    let found: Vec<Hashtag> = store
        .hashtags
        .iter()
        .filter(|h| h.tag.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    if found.is_empty() {
        return Err(ApiFailure::NotFound("No hashtags found"));
    }
    Ok(Json(found))
}

async fn search_tweets(
    State(db): State<Db>,
    Json(input): Json<SearchRequest>,
) -> Result<Json<Vec<Tweet>>, ApiFailure> {
    let store = db.read().await;
    let found = store.tweets_matching(&input.query);
    if found.is_empty() {
        return Err(ApiFailure::NotFound("No tweets found"));
    }
    Ok(Json(found))
}
