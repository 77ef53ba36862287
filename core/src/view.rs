//! Local state behind the feeds, search panel and forms.
//!
//! These models hold what a screen shows and apply the optimistic updates
//! that follow a successful mutating call. They do no I/O; hosts run the
//! request, then feed the parsed result back in.

use std::cmp::Reverse;

use thiserror::Error;

use crate::search::SearchOutcome;
use crate::text::extract_hashtags;
use crate::types::{Account, Credentials, Hashtag, LikedTweet, NewAccount, Tweet, TweetInput};

/// A tweet together with the author details a feed displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub tweet: Tweet,
    pub author_username: String,
    pub author_handle: String,
}

impl FeedEntry {
    pub fn new(tweet: Tweet, author: &Account) -> Self {
        Self {
            tweet,
            author_username: author.username.clone(),
            author_handle: author.handle.clone(),
        }
    }
}

/// Newest first; undated tweets sink to the end in their original order.
fn sort_newest_first(entries: &mut [FeedEntry]) {
    entries.sort_by_key(|e| Reverse(e.tweet.created_at));
}

/// The home timeline: every account's tweets merged.
#[derive(Debug, Clone, Default)]
pub struct HomeFeed {
    entries: Vec<FeedEntry>,
}

impl HomeFeed {
    pub fn from_accounts(accounts: &[Account]) -> Self {
        let mut entries: Vec<FeedEntry> = accounts
            .iter()
            .flat_map(|account| {
                account
                    .tweets
                    .iter()
                    .cloned()
                    .map(move |tweet| FeedEntry::new(tweet, account))
            })
            .collect();
        sort_newest_first(&mut entries);
        Self { entries }
    }

    /// Payload for a new tweet, or `None` when there is nothing to post.
    pub fn compose(text: &str) -> Option<TweetInput> {
        if text.trim().is_empty() {
            return None;
        }
        Some(TweetInput {
            content: text.to_string(),
            hashtags: extract_hashtags(text),
            media: Vec::new(),
        })
    }

    /// Put a freshly posted tweet at the head of the feed.
    pub fn insert_posted(&mut self, tweet: Tweet, author: &Account) {
        self.entries.insert(0, FeedEntry::new(tweet, author));
    }

    /// Take the server's like count. Returns false when the tweet is not
    /// shown.
    pub fn apply_like(&mut self, liked: &LikedTweet) -> bool {
        match self.entries.iter_mut().find(|e| e.tweet.id == liked.id) {
            Some(entry) => {
                entry.tweet.likes = liked.likes;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, tweet_id: i64) -> Option<&FeedEntry> {
        self.entries.iter().find(|e| e.tweet.id == tweet_id)
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One account's profile page.
#[derive(Debug, Clone)]
pub struct ProfileFeed {
    account: Account,
    entries: Vec<FeedEntry>,
}

impl ProfileFeed {
    pub fn new(account: Account) -> Self {
        let mut entries: Vec<FeedEntry> = account
            .tweets
            .iter()
            .cloned()
            .map(|tweet| FeedEntry::new(tweet, &account))
            .collect();
        sort_newest_first(&mut entries);
        Self { account, entries }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Replace the content and hashtags of an edited tweet. The account's own
    /// tweet list follows the feed.
    pub fn apply_edit(&mut self, tweet_id: i64, input: &TweetInput) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.tweet.id == tweet_id) else {
            return false;
        };
        entry.tweet.content = input.content.clone();
        entry.tweet.hashtags = input
            .hashtags
            .iter()
            .map(|tag| {
                let id = entry
                    .tweet
                    .hashtags
                    .iter()
                    .find(|h| &h.tag == tag)
                    .map_or(0, |h| h.id);
                Hashtag {
                    id,
                    tag: tag.clone(),
                }
            })
            .collect();
        if let Some(tweet) = self.account.tweets.iter_mut().find(|t| t.id == tweet_id) {
            *tweet = entry.tweet.clone();
        }
        true
    }

    pub fn remove(&mut self, tweet_id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.tweet.id != tweet_id);
        self.account.tweets.retain(|t| t.id != tweet_id);
        self.entries.len() != before
    }

    pub fn post_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }
}

/// Result lists of the search sidebar, replaced wholesale on every query.
#[derive(Debug, Clone, Default)]
pub struct SearchPanel {
    pub accounts: Vec<Account>,
    pub hashtags: Vec<Hashtag>,
    pub tweets: Vec<Tweet>,
}

impl SearchPanel {
    pub fn apply(
        &mut self,
        accounts: SearchOutcome<Account>,
        hashtags: SearchOutcome<Hashtag>,
        tweets: SearchOutcome<Tweet>,
    ) {
        self.accounts = accounts.into_vec();
        self.hashtags = hashtags.into_vec();
        self.tweets = tweets.into_vec();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.hashtags.is_empty() && self.tweets.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Passwords don't match")]
    PasswordMismatch,
}

fn required(value: &str, field: &'static str) -> Result<String, FormError> {
    if value.trim().is_empty() {
        return Err(FormError::MissingField(field));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn credentials(&self) -> Result<Credentials, FormError> {
        Ok(Credentials {
            username: required(&self.username, "username")?,
            password: required(&self.password, "password")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub handle: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    /// The registration payload, without the confirmation field.
    pub fn validate(&self) -> Result<NewAccount, FormError> {
        let account = NewAccount {
            username: required(&self.username, "username")?,
            handle: required(&self.handle, "handle")?,
            email: required(&self.email, "email")?,
            password: required(&self.password, "password")?,
        };
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        Ok(account)
    }
}
