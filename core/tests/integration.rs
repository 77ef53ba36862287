//! End-to-end session against the live mock server.
//!
//! Starts the mock server on a random port, then drives register, login,
//! post, like, edit and delete over real HTTP with ureq, feeding every
//! parsed result through the view models the way a host would.

use chirp_core::{
    ApiError, ChirpClient, HomeFeed, HttpMethod, HttpRequest, HttpResponse, LoginForm,
    MemoryTokenStore, ProfileFeed, RegistrationForm, SearchKind, SearchPanel, Session, TokenStore,
};

/// Execute an `HttpRequest` with ureq and return an `HttpResponse`.
///
/// Status-as-error is off so 4xx/5xx come back as data and the core does
/// the interpreting.
fn execute(req: HttpRequest) -> HttpResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut response = match (req.method, req.body) {
        (HttpMethod::Get, _) => with_headers(agent.get(&req.url), &req.headers).call(),
        (HttpMethod::Delete, _) => with_headers(agent.delete(&req.url), &req.headers).call(),
        (HttpMethod::Post, Some(body)) => {
            with_headers(agent.post(&req.url), &req.headers).send(body.as_bytes())
        }
        (HttpMethod::Post, None) => with_headers(agent.post(&req.url), &req.headers).send_empty(),
        (HttpMethod::Put, Some(body)) => {
            with_headers(agent.put(&req.url), &req.headers).send(body.as_bytes())
        }
        (HttpMethod::Put, None) => with_headers(agent.put(&req.url), &req.headers).send_empty(),
    }
    .expect("HTTP transport error");

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();
    HttpResponse::new(status, body)
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn start_server() -> ChirpClient {
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

    ChirpClient::new(&format!("http://{addr}"))
}

fn register(client: &ChirpClient, username: &str) {
    let form = RegistrationForm {
        username: username.to_string(),
        handle: format!("{username}_h"),
        email: format!("{username}@example.com"),
        password: "hunter2".to_string(),
        confirm_password: "hunter2".to_string(),
    };
    let req = client.build_register(&form.validate().unwrap()).unwrap();
    let account = client.parse_register(execute(req)).unwrap();
    assert_eq!(account.username, username);
}

fn login(client: &ChirpClient, username: &str, store: &dyn TokenStore) -> Session {
    let form = LoginForm {
        username: username.to_string(),
        password: "hunter2".to_string(),
    };
    let req = client.build_login(&form.credentials().unwrap()).unwrap();
    let token = client.parse_login(execute(req)).unwrap();
    assert_eq!(token.token_type, "bearer");

    let mut session = Session::anonymous();
    session.sign_in(&token);
    session.persist(store).unwrap();
    session
}

#[test]
fn session_lifecycle() {
    let client = start_server();
    let store = MemoryTokenStore::new();

    // Step 1: anonymous calls fail locally, before any request exists.
    let anon = Session::restore(&store).unwrap();
    assert!(matches!(
        client.build_current_user(&anon),
        Err(ApiError::MissingToken)
    ));

    // Step 2: register and log in; the token lands in the store.
    register(&client, "ada");
    login(&client, "ada", &store);
    let session = Session::restore(&store).unwrap();
    assert!(session.is_authenticated());

    let req = client.build_current_user(&session).unwrap();
    let me = client.parse_current_user(execute(req)).unwrap();
    assert_eq!(me.username, "ada");

    // Step 3: wrong password surfaces the status and body.
    let bad = LoginForm {
        username: "ada".to_string(),
        password: "wrong".to_string(),
    };
    let req = client.build_login(&bad.credentials().unwrap()).unwrap();
    let err = client.parse_login(execute(req)).unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("Incorrect username or password"));

    // Step 4: empty home feed, then post; the tweet goes to the head with
    // the author attached.
    let req = client.build_list_accounts();
    let mut feed = HomeFeed::from_accounts(&client.parse_list_accounts(execute(req)).unwrap());
    assert!(feed.is_empty());

    let input = HomeFeed::compose("first post #Rust #a1_b").unwrap();
    assert_eq!(input.hashtags, vec!["Rust", "a1_b"]);
    let req = client.build_post_tweet(&session, &input).unwrap();
    let posted = client.parse_post_tweet(execute(req)).unwrap();
    assert_eq!(posted.author_id(), Some(me.id));
    feed.insert_posted(posted.clone(), &me);
    assert_eq!(feed.entries()[0].tweet.id, posted.id);
    assert_eq!(feed.entries()[0].author_username, "ada");
    assert_eq!(feed.entries()[0].author_handle, "ada_h");

    // Step 5: like; the shown count is the server's count.
    let req = client.build_like_tweet(&session, posted.id).unwrap();
    let liked = client.parse_like_tweet(execute(req)).unwrap();
    assert!(feed.apply_like(&liked));
    assert_eq!(feed.get(posted.id).unwrap().tweet.likes, liked.likes);
    assert_eq!(liked.likes, 1);

    // Step 6: search; no-hit searches come back empty instead of failing.
    let mut panel = SearchPanel::default();
    let accounts = client
        .parse_search_accounts(execute(client.build_search(SearchKind::Accounts, "ad").unwrap()))
        .unwrap();
    let hashtags = client
        .parse_search_hashtags(execute(client.build_search(SearchKind::Hashtags, "rust").unwrap()))
        .unwrap();
    let tweets = client
        .parse_search_tweets(execute(client.build_search(SearchKind::Tweets, "nothing-like-this").unwrap()))
        .unwrap();
    panel.apply(accounts, hashtags, tweets);
    assert_eq!(panel.accounts.len(), 1);
    assert_eq!(panel.hashtags[0].tag, "Rust");
    assert!(panel.tweets.is_empty());

    // Step 7: edit on the profile page.
    let req = client.build_get_account("ada");
    let mut profile = ProfileFeed::new(client.parse_get_account(execute(req)).unwrap());
    assert_eq!(profile.post_count(), 1);
    let edit = HomeFeed::compose("first post, edited").unwrap();
    let req = client.build_edit_tweet(&session, me.id, posted.id, &edit).unwrap();
    let edited = client.parse_edit_tweet(execute(req)).unwrap();
    assert_eq!(edited.content, "first post, edited");
    assert!(profile.apply_edit(posted.id, &edit));
    assert_eq!(profile.entries()[0].tweet.content, "first post, edited");

    // Step 8: another account may not delete it.
    register(&client, "bob");
    let bob_store = MemoryTokenStore::new();
    let bob = login(&client, "bob", &bob_store);
    let req = client.build_delete_tweet(&bob, me.id, posted.id).unwrap();
    let err = client.parse_delete_tweet(execute(req)).unwrap_err();
    assert_eq!(err.status(), Some(403));

    // Step 9: the owner deletes it and it leaves the profile feed.
    let req = client.build_delete_tweet(&session, me.id, posted.id).unwrap();
    client.parse_delete_tweet(execute(req)).unwrap();
    assert!(profile.remove(posted.id));

    let req = client.build_get_account("ada");
    let refreshed = ProfileFeed::new(client.parse_get_account(execute(req)).unwrap());
    assert!(refreshed.entries().iter().all(|e| e.tweet.id != posted.id));

    // Step 10: listing tweets is not on the soft-failure list; 404 is an error.
    let req = client.build_list_tweets(None);
    let err = client.parse_list_tweets(execute(req)).unwrap_err();
    assert_eq!(err.status(), Some(404));

    // Step 11: sign out clears the store; authenticated calls fail locally again.
    let mut session = session;
    session.sign_out();
    session.persist(&store).unwrap();
    assert!(store.load().unwrap().is_none());
    assert!(matches!(
        client.build_like_tweet(&session, posted.id),
        Err(ApiError::MissingToken)
    ));
}
