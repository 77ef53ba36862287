//! API and session layer for the chirp microblogging client.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The host executes the
//! round-trip, keeping this crate deterministic and testable.
//!
//! # Design
//! - `ChirpClient` is stateless; it holds only the API root.
//! - Authentication is explicit: a `Session` is passed to every operation
//!   that needs a bearer token, and an empty session fails before any request
//!   exists.
//! - The three search endpoints return `SearchOutcome`, which turns the
//!   backend's "no results" 404 into `Empty`. Nothing else swallows errors.
//! - `view` holds the screen state that hosts update after each call.

pub mod client;
pub mod error;
pub mod http;
pub mod search;
pub mod session;
pub mod text;
pub mod types;
pub mod view;

pub use client::{parse_json, Auth, ChirpClient, DEFAULT_ORIGIN};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use search::{SearchKind, SearchOutcome};
pub use session::{MemoryTokenStore, Session, StoreError, TokenStore};
pub use text::{display_handle, extract_hashtags, relative_time};
pub use types::{
    Account, AccountRef, Credentials, Hashtag, LikedTweet, Media, NewAccount, SearchQuery,
    TokenResponse, Tweet, TweetInput,
};
pub use view::{FeedEntry, FormError, HomeFeed, LoginForm, ProfileFeed, RegistrationForm, SearchPanel};
