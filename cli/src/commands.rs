use std::io::Write;

use anyhow::{bail, Context, Result};
use chirp_core::{
    display_handle, relative_time, Account, ApiError, ChirpClient, FeedEntry, HomeFeed, LoginForm,
    ProfileFeed, RegistrationForm, SearchKind, SearchPanel, Session, TokenStore,
};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::transport::Transport;

/// Everything a command needs: the request builder, the transport that runs
/// the requests, the token store behind the session, and where output goes.
pub struct Runner<S, W> {
    pub client: ChirpClient,
    pub transport: Transport,
    pub store: S,
    pub out: W,
}

impl<S: TokenStore, W: Write> Runner<S, W> {
    fn session(&self) -> Result<Session> {
        Session::restore(&self.store).context("loading session token")
    }

    fn current_user(&self, session: &Session) -> Result<Account> {
        let req = self.client.build_current_user(session).map_err(not_logged_in)?;
        Ok(self.client.parse_current_user(self.transport.execute(req)?)?)
    }

    fn home_feed(&self) -> Result<HomeFeed> {
        let req = self.client.build_list_accounts();
        let accounts = self.client.parse_list_accounts(self.transport.execute(req)?)?;
        Ok(HomeFeed::from_accounts(&accounts))
    }

    fn profile(&self, username: &str) -> Result<ProfileFeed> {
        let req = self.client.build_get_account(username);
        let account = self.client.parse_get_account(self.transport.execute(req)?)?;
        Ok(ProfileFeed::new(account))
    }

    pub fn register(&mut self, form: RegistrationForm) -> Result<()> {
        let input = form.validate()?;
        let req = self.client.build_register(&input)?;
        let account = self.client.parse_register(self.transport.execute(req)?)?;
        info!(username = %account.username, "registered");
        writeln!(
            self.out,
            "Registered {} {}. Log in with `chirp login {}`.",
            account.username,
            display_handle(&account.handle),
            account.username
        )?;
        Ok(())
    }

    pub fn login(&mut self, form: LoginForm) -> Result<()> {
        let req = self.client.build_login(&form.credentials()?)?;
        let token = self.client.parse_login(self.transport.execute(req)?)?;
        let mut session = self.session()?;
        session.sign_in(&token);
        session.persist(&self.store).context("saving session token")?;
        writeln!(self.out, "Logged in as {}.", form.username)?;
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        let mut session = self.session()?;
        session.sign_out();
        session.persist(&self.store).context("clearing session token")?;
        writeln!(self.out, "Logged out.")?;
        Ok(())
    }

    pub fn whoami(&mut self) -> Result<()> {
        let me = self.current_user(&self.session()?)?;
        writeln!(
            self.out,
            "{} {} <{}>, {} posts",
            me.username,
            display_handle(&me.handle),
            me.email,
            me.tweets.len()
        )?;
        Ok(())
    }

    pub fn accounts(&mut self) -> Result<()> {
        let req = self.client.build_list_accounts();
        for account in self.client.parse_list_accounts(self.transport.execute(req)?)? {
            writeln!(self.out, "{} {}", account.username, display_handle(&account.handle))?;
        }
        Ok(())
    }

    pub fn feed(&mut self) -> Result<()> {
        let feed = self.home_feed()?;
        print_entries(&mut self.out, feed.entries(), Utc::now())?;
        Ok(())
    }

    pub fn show_profile(&mut self, username: &str) -> Result<()> {
        let profile = self.profile(username)?;
        print_profile(&mut self.out, &profile, Utc::now())?;
        Ok(())
    }

    pub fn post(&mut self, text: &str) -> Result<()> {
        let Some(input) = HomeFeed::compose(text) else {
            bail!("nothing to post");
        };
        let session = self.session()?;
        let me = self.current_user(&session)?;
        let mut feed = self.home_feed()?;

        let req = self.client.build_post_tweet(&session, &input)?;
        let tweet = self.client.parse_post_tweet(self.transport.execute(req)?)?;
        info!(tweet_id = tweet.id, "posted");
        feed.insert_posted(tweet, &me);
        print_entries(&mut self.out, feed.entries(), Utc::now())?;
        Ok(())
    }

    pub fn like(&mut self, tweet_id: i64) -> Result<()> {
        let req = self
            .client
            .build_like_tweet(&self.session()?, tweet_id)
            .map_err(not_logged_in)?;
        let mut feed = self.home_feed()?;

        let liked = self.client.parse_like_tweet(self.transport.execute(req)?)?;
        feed.apply_like(&liked);
        match feed.get(tweet_id) {
            Some(entry) => print_entries(&mut self.out, std::slice::from_ref(entry), Utc::now())?,
            None => writeln!(self.out, "#{tweet_id} now has {} likes", liked.likes)?,
        }
        Ok(())
    }

    pub fn edit(&mut self, tweet_id: i64, text: &str) -> Result<()> {
        let Some(input) = HomeFeed::compose(text) else {
            bail!("a tweet cannot be empty");
        };
        let session = self.session()?;
        let me = self.current_user(&session)?;
        let mut profile = self.profile(&me.username)?;

        let req = self.client.build_edit_tweet(&session, me.id, tweet_id, &input)?;
        self.client.parse_edit_tweet(self.transport.execute(req)?)?;
        profile.apply_edit(tweet_id, &input);
        print_profile(&mut self.out, &profile, Utc::now())?;
        Ok(())
    }

    pub fn delete(&mut self, tweet_id: i64) -> Result<()> {
        let session = self.session()?;
        let me = self.current_user(&session)?;
        let mut profile = self.profile(&me.username)?;

        let req = self.client.build_delete_tweet(&session, me.id, tweet_id)?;
        self.client.parse_delete_tweet(self.transport.execute(req)?)?;
        profile.remove(tweet_id);
        print_profile(&mut self.out, &profile, Utc::now())?;
        Ok(())
    }

    pub fn tweets(&mut self, query: Option<&str>) -> Result<()> {
        let req = self.client.build_list_tweets(query);
        let now = Utc::now();
        for tweet in self.client.parse_list_tweets(self.transport.execute(req)?)? {
            let author = tweet
                .account
                .as_ref()
                .and_then(|a| a.username.clone())
                .unwrap_or_else(|| "unknown".to_string());
            writeln!(
                self.out,
                "#{} {} - {}: {}",
                tweet.id,
                author,
                relative_time(tweet.created_at, now),
                tweet.content
            )?;
        }
        Ok(())
    }

    pub fn search(&mut self, query: &str) -> Result<()> {
        let accounts = self.client.parse_search_accounts(
            self.transport
                .execute(self.client.build_search(SearchKind::Accounts, query)?)?,
        )?;
        let hashtags = self.client.parse_search_hashtags(
            self.transport
                .execute(self.client.build_search(SearchKind::Hashtags, query)?)?,
        )?;
        let tweets = self.client.parse_search_tweets(
            self.transport
                .execute(self.client.build_search(SearchKind::Tweets, query)?)?,
        )?;

        let mut panel = SearchPanel::default();
        panel.apply(accounts, hashtags, tweets);
        write!(self.out, "{}", render_search(&panel))?;
        Ok(())
    }
}

fn not_logged_in(err: ApiError) -> anyhow::Error {
    match err {
        ApiError::MissingToken => anyhow::anyhow!("not logged in; run `chirp login <username>` first"),
        other => other.into(),
    }
}

pub fn render_entry(entry: &FeedEntry, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "{} {} - {}  [#{}]\n  {}\n  {} likes",
        entry.author_username,
        display_handle(&entry.author_handle),
        relative_time(entry.tweet.created_at, now),
        entry.tweet.id,
        entry.tweet.content,
        entry.tweet.likes,
    );
    let tags: Vec<String> = entry.tweet.tags().map(|t| format!("#{t}")).collect();
    if !tags.is_empty() {
        out.push_str("  ");
        out.push_str(&tags.join(" "));
    }
    out
}

fn print_entries(out: &mut impl Write, entries: &[FeedEntry], now: DateTime<Utc>) -> Result<()> {
    if entries.is_empty() {
        writeln!(out, "Nothing here yet.")?;
        return Ok(());
    }
    for entry in entries {
        writeln!(out, "{}\n", render_entry(entry, now))?;
    }
    Ok(())
}

fn print_profile(out: &mut impl Write, profile: &ProfileFeed, now: DateTime<Utc>) -> Result<()> {
    let account = profile.account();
    writeln!(
        out,
        "{} {}, joined {}, {} posts\n",
        account.username,
        display_handle(&account.handle),
        account.created_at.format("%Y-%m-%d"),
        profile.post_count()
    )?;
    print_entries(out, profile.entries(), now)
}

pub fn render_search(panel: &SearchPanel) -> String {
    let mut out = String::from("Accounts\n");
    for account in &panel.accounts {
        out.push_str(&format!("  {}\n", account.username));
    }
    out.push_str("Hashtags\n");
    for hashtag in &panel.hashtags {
        out.push_str(&format!("  #{}\n", hashtag.tag));
    }
    out.push_str("Tweets\n");
    for tweet in &panel.tweets {
        let author = tweet
            .account
            .as_ref()
            .and_then(|a| a.username.as_deref())
            .unwrap_or("unknown");
        out.push_str(&format!("  {} - @{}\n", tweet.content, author));
    }
    out
}

#[cfg(test)]
mod tests {
    use chirp_core::{AccountRef, Hashtag, Tweet};
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::store::FileTokenStore;

    fn tweet() -> Tweet {
        Tweet {
            id: 5,
            account: Some(AccountRef {
                id: 1,
                username: Some("ada".to_string()),
                handle: Some("ada_l".to_string()),
            }),
            account_id: None,
            content: "hello #rust".to_string(),
            hashtags: vec![Hashtag {
                id: 1,
                tag: "rust".to_string(),
            }],
            media: Vec::new(),
            likes: 2,
            created_at: None,
        }
    }

    #[test]
    fn entry_rendering() {
        let now = Utc::now();
        let mut tweet = tweet();
        tweet.created_at = Some(now - Duration::minutes(3));
        let entry = FeedEntry {
            tweet,
            author_username: "ada".to_string(),
            author_handle: "ada_l".to_string(),
        };
        assert_eq!(
            render_entry(&entry, now),
            "ada @ada_l - 3m  [#5]\n  hello #rust\n  2 likes  #rust"
        );
    }

    #[test]
    fn search_rendering_lists_every_section() {
        let panel = SearchPanel {
            accounts: Vec::new(),
            hashtags: vec![Hashtag {
                id: 1,
                tag: "rust".to_string(),
            }],
            tweets: vec![tweet()],
        };
        assert_eq!(
            render_search(&panel),
            "Accounts\nHashtags\n  #rust\nTweets\n  hello #rust - @ada\n"
        );
    }

    #[test]
    fn missing_token_gets_login_hint() {
        let err = not_logged_in(ApiError::MissingToken);
        assert!(err.to_string().contains("chirp login"));
    }

    fn start_server() -> String {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });

        format!("http://{addr}")
    }

    fn runner(origin: &str, dir: &TempDir) -> Runner<FileTokenStore, Vec<u8>> {
        Runner {
            client: ChirpClient::new(origin),
            transport: Transport::new(),
            store: FileTokenStore::new(dir.path().join("token")),
            out: Vec::new(),
        }
    }

    /// Everything written since the last call.
    fn take_output(runner: &mut Runner<FileTokenStore, Vec<u8>>) -> String {
        String::from_utf8(std::mem::take(&mut runner.out)).unwrap()
    }

    fn sign_up(runner: &mut Runner<FileTokenStore, Vec<u8>>, username: &str) {
        runner
            .register(RegistrationForm {
                username: username.to_string(),
                handle: format!("{username}_h"),
                email: format!("{username}@example.com"),
                password: "hunter2".to_string(),
                confirm_password: "hunter2".to_string(),
            })
            .unwrap();
        runner
            .login(LoginForm {
                username: username.to_string(),
                password: "hunter2".to_string(),
            })
            .unwrap();
    }

    fn tweet_id(runner: &Runner<FileTokenStore, Vec<u8>>, content: &str) -> i64 {
        let req = runner.client.build_list_tweets(None);
        let tweets = runner
            .client
            .parse_list_tweets(runner.transport.execute(req).unwrap())
            .unwrap();
        tweets.iter().find(|t| t.content == content).unwrap().id
    }

    #[test]
    fn signed_out_commands_fail_before_any_request() {
        // Nothing listens here; reaching the network would surface a
        // connection error instead of the login hint.
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner("http://127.0.0.1:9", &dir);

        for result in [
            runner.like(1),
            runner.post("hello"),
            runner.edit(1, "hello"),
            runner.delete(1),
            runner.whoami(),
        ] {
            let err = result.unwrap_err();
            assert!(err.to_string().contains("chirp login"), "{err:#}");
        }
        assert!(take_output(&mut runner).is_empty());
    }

    #[test]
    fn command_session_against_mock_server() {
        let origin = start_server();
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(&origin, &dir);

        sign_up(&mut runner, "ada");
        let out = take_output(&mut runner);
        assert!(out.contains("Registered ada @ada_h."), "{out}");
        assert!(out.contains("Logged in as ada."), "{out}");
        assert!(runner.store.load().unwrap().is_some());

        runner.whoami().unwrap();
        assert_eq!(take_output(&mut runner), "ada @ada_h <ada@example.com>, 0 posts\n");

        // A new post is printed at the head of the feed.
        runner.post("first post").unwrap();
        take_output(&mut runner);
        runner.post("second post #rust").unwrap();
        let out = take_output(&mut runner);
        let second = out.find("second post").unwrap();
        let first = out.find("first post").unwrap();
        assert!(second < first, "{out}");
        assert!(out.starts_with("ada @ada_h - "), "{out}");
        assert!(out.contains("#rust"), "{out}");

        // The printed count is the server's.
        let first_id = tweet_id(&runner, "first post");
        runner.like(first_id).unwrap();
        assert!(take_output(&mut runner).contains("1 likes"));
        runner.like(first_id).unwrap();
        assert!(take_output(&mut runner).contains("2 likes"));

        runner.search("rust").unwrap();
        let out = take_output(&mut runner);
        assert!(out.contains("Hashtags\n  #rust\n"), "{out}");
        assert!(out.contains("  second post #rust - @ada\n"), "{out}");

        runner.edit(first_id, "first post, edited #fixed").unwrap();
        let out = take_output(&mut runner);
        assert!(out.starts_with("ada @ada_h, joined "), "{out}");
        assert!(out.contains("2 posts"), "{out}");
        assert!(out.contains("first post, edited #fixed"), "{out}");

        // Edit and delete target the logged-in account, so bob cannot reach
        // ada's tweet.
        sign_up(&mut runner, "bob");
        take_output(&mut runner);
        let err = runner.delete(first_id).unwrap_err();
        assert!(
            matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Http { status: 404, .. })),
            "{err:#}"
        );
        runner.logout().unwrap();
        assert_eq!(take_output(&mut runner), "Logged out.\n");
        assert!(runner.store.load().unwrap().is_none());

        runner
            .login(LoginForm {
                username: "ada".to_string(),
                password: "hunter2".to_string(),
            })
            .unwrap();
        take_output(&mut runner);
        runner.delete(first_id).unwrap();
        let out = take_output(&mut runner);
        assert!(out.contains("1 posts"), "{out}");
        assert!(!out.contains("first post"), "{out}");

        runner.logout().unwrap();
        let err = runner.whoami().unwrap_err();
        assert!(err.to_string().contains("chirp login"));
    }
}
