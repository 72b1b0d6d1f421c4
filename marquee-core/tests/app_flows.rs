//! End-to-end flows through `App::handle`, without sockets

mod common;

use common::*;
use marquee_core::orders::PurchaseItem;
use marquee_core::RequestContext;
use serde_json::Value;

fn ids(list: &Value, key: &str) -> Vec<u64> {
    list[key].as_array().unwrap().iter().map(|m| m["id"].as_u64().unwrap()).collect()
}

#[tokio::test]
async fn test_anonymous_browsing_and_login_redirect() {
    let app = app();
    add_movie(&app, "Alien").await;
    add_movie(&app, "Aliens").await;
    add_movie(&app, "Heat").await;

    let response = app.handle(RequestContext::get("/movies/?search=ALIEN")).await;
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(ids(&response.body, "movies"), vec![1, 2]);
    assert_eq!(response.body["search"], "ALIEN");

    let response = app.handle(RequestContext::get("/movies/?search=%20%20")).await;
    assert_eq!(ids(&response.body, "movies"), vec![1, 2, 3]);
    assert!(response.body["search"].is_null());

    let response = app.handle(RequestContext::get("/movies/hidden/")).await;
    assert_eq!(response.status.as_u16(), 303);
    assert_eq!(response.location(), Some("/accounts/login/?next=%2Fmovies%2Fhidden%2F"));

    let response = app.handle(RequestContext::get("/movies/99/")).await;
    assert_eq!(response.status.as_u16(), 404);
    assert_eq!(response.body["error"], "not_found");

    let response = app.handle(RequestContext::get("/movies/abc/")).await;
    assert_eq!(response.status.as_u16(), 404);
}

#[tokio::test]
async fn test_unknown_route_and_wrong_method() {
    let app = app();
    assert_eq!(app.handle(RequestContext::get("/nowhere/")).await.status.as_u16(), 404);

    let response = app.handle(RequestContext::get("/movies/hide/1/")).await;
    assert_eq!(response.status.as_u16(), 405);
    assert_eq!(response.header(http::header::ALLOW), Some("POST"));
}

#[tokio::test]
async fn test_hidden_movies_are_filtered_per_user() {
    let app = app();
    add_movie(&app, "Alien").await;
    add_movie(&app, "Heat").await;
    let ana = login_as(&app, "ana", false).await;
    let bob = login_as(&app, "bob", false).await;

    let response = app.handle(post("/movies/hide/1/", &ana)).await;
    assert_eq!(response.status.as_u16(), 303);
    assert_eq!(response.location(), Some("/movies/"));
    assert!(message_texts(&response).contains(&"'Alien' has been hidden".to_string()));

    let response = app.handle(post("/movies/hide/1/", &ana)).await;
    assert!(message_texts(&response).contains(&"'Alien' is already hidden".to_string()));
    assert_eq!(app.store().stats().hidden, 1);

    let listing = app.handle(get("/movies/?search=alien", &ana)).await;
    assert!(ids(&listing.body, "movies").is_empty());
    // The page drained the queued messages
    assert_eq!(listing.body["messages"].as_array().unwrap().len(), 2);

    let listing = app.handle(get("/movies/", &bob)).await;
    assert_eq!(ids(&listing.body, "movies"), vec![1, 2]);

    let hidden = app.handle(get("/movies/hidden/", &ana)).await;
    assert_eq!(ids(&hidden.body, "movies"), vec![1]);

    let detail = app.handle(get("/movies/1/", &ana)).await;
    assert_eq!(detail.body["is_hidden"], true);

    let response = app.handle(post("/movies/unhide/1/", &ana)).await;
    assert_eq!(response.location(), Some("/movies/hidden/"));
    let response = app.handle(post("/movies/unhide/1/", &ana)).await;
    assert_eq!(response.status.as_u16(), 404);

    let listing = app.handle(get("/movies/", &ana)).await;
    assert_eq!(ids(&listing.body, "movies"), vec![1, 2]);

    let response = app.handle(post("/movies/hide/42/", &ana)).await;
    assert_eq!(response.status.as_u16(), 404);
}

#[tokio::test]
async fn test_review_ownership_is_enforced_as_not_found() {
    let app = app();
    add_movie(&app, "Alien").await;
    let ana = login_as(&app, "ana", false).await;
    let bob = login_as(&app, "bob", false).await;

    let response =
        app.handle(post("/movies/1/review/create/", &ana).with_field("comment", "  Great  ")).await;
    assert_eq!(response.status.as_u16(), 303);
    assert_eq!(response.location(), Some("/movies/1/"));

    let detail = app.handle(get("/movies/1/", &bob)).await;
    let review = &detail.body["reviews"][0];
    assert_eq!(review["comment"], "Great");
    assert_eq!(review["username"], "ana");
    assert_eq!(review["is_owner"], false);
    let review_id = review["id"].as_u64().unwrap();
    let edit_path = format!("/movies/1/review/{}/edit/", review_id);
    let delete_path = format!("/movies/1/review/{}/delete/", review_id);

    assert_eq!(app.handle(get(&edit_path, &bob)).await.status.as_u16(), 404);
    let response = app.handle(post(&edit_path, &bob).with_field("comment", "Hacked")).await;
    assert_eq!(response.status.as_u16(), 404);
    assert_eq!(app.handle(post(&delete_path, &bob)).await.status.as_u16(), 404);

    // Review exists but belongs to another movie path
    add_movie(&app, "Heat").await;
    let wrong_movie = format!("/movies/2/review/{}/edit/", review_id);
    assert_eq!(app.handle(get(&wrong_movie, &ana)).await.status.as_u16(), 404);

    let form = app.handle(get(&edit_path, &ana)).await;
    assert_eq!(form.status.as_u16(), 200);
    assert_eq!(form.body["review"]["comment"], "Great");

    let response = app.handle(post(&edit_path, &ana).with_field("comment", "   ")).await;
    assert_eq!(response.status.as_u16(), 303);
    assert!(message_texts(&response).contains(&"Review comment cannot be empty".to_string()));

    let detail = app.handle(get("/movies/1/", &ana)).await;
    assert_eq!(detail.body["reviews"][0]["comment"], "Great");
    assert_eq!(detail.body["reviews"][0]["is_owner"], true);

    let response = app.handle(post(&edit_path, &ana).with_field("comment", "Even better")).await;
    assert!(message_texts(&response).contains(&"Review updated".to_string()));

    let response = app.handle(post(&delete_path, &ana)).await;
    assert_eq!(response.location(), Some("/movies/1/"));
    let detail = app.handle(get("/movies/1/", &ana)).await;
    assert!(detail.body["reviews"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_review_persists_nothing() {
    let app = app();
    add_movie(&app, "Alien").await;
    let ana = login_as(&app, "ana", false).await;

    let response = app.handle(post("/movies/1/review/create/", &ana).with_field("comment", "")).await;
    assert_eq!(response.status.as_u16(), 303);
    assert_eq!(response.location(), Some("/movies/1/"));
    assert_eq!(response.messages()[0].level, marquee_core::views::FlashLevel::Error);
    assert_eq!(app.store().stats().reviews, 0);

    let response = app.handle(post("/movies/7/review/create/", &ana).with_field("comment", "x")).await;
    assert_eq!(response.status.as_u16(), 404);
}

#[tokio::test]
async fn test_petition_create_vote_and_rank() {
    let app = app();
    let ana = login_as(&app, "ana", false).await;

    let response = app
        .handle(
            post("/movies/petitions/create/", &ana)
                .with_field("movie_title", "  ")
                .with_field("description", "Because"),
        )
        .await;
    assert_eq!(response.status.as_u16(), 422);
    assert_eq!(response.body["errors"][0], "Movie title is required");
    assert_eq!(response.body["description"], "Because");
    assert_eq!(app.store().stats().petitions, 0);

    for title in ["P1", "P2", "P3"] {
        let response = app
            .handle(
                post("/movies/petitions/create/", &ana)
                    .with_field("movie_title", title)
                    .with_field("description", "Please"),
            )
            .await;
        assert_eq!(response.status.as_u16(), 303);
        assert_eq!(response.location(), Some("/movies/petitions/"));
    }

    let mut voters = vec![ana.clone()];
    for name in ["bob", "cy"] {
        voters.push(login_as(&app, name, false).await);
    }
    // P1 and P3 get three votes, P2 one
    for token in &voters {
        app.handle(post("/movies/petitions/1/vote/", token)).await;
        app.handle(post("/movies/petitions/3/vote/", token)).await;
    }
    app.handle(post("/movies/petitions/2/vote/", &voters[1])).await;

    let response = app.handle(post("/movies/petitions/1/vote/", &ana)).await;
    assert!(message_texts(&response)
        .contains(&"You have already voted for this petition".to_string()));

    let list = app.handle(get("/movies/petitions/", &ana)).await;
    let petitions = list.body["petitions"].as_array().unwrap();
    let titles: Vec<&str> = petitions.iter().map(|p| p["movie_title"].as_str().unwrap()).collect();
    let counts: Vec<u64> = petitions.iter().map(|p| p["vote_count"].as_u64().unwrap()).collect();
    assert_eq!(titles, vec!["P3", "P1", "P2"]);
    assert_eq!(counts, vec![3, 3, 1]);
    assert_eq!(petitions[2]["user_has_voted"], false);
    assert_eq!(petitions[0]["user_has_voted"], true);
    assert_eq!(petitions[0]["petitioner"], "ana");

    let anonymous = app.handle(RequestContext::get("/movies/petitions/")).await;
    assert!(anonymous.body["petitions"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["user_has_voted"] == false));

    let response = app.handle(post("/movies/petitions/2/unvote/", &ana)).await;
    assert!(message_texts(&response).contains(&"You have not voted for this petition".to_string()));
    let response = app.handle(post("/movies/petitions/1/unvote/", &ana)).await;
    assert!(message_texts(&response).contains(&"Your vote has been removed".to_string()));
    assert_eq!(app.store().stats().votes, 6);

    assert_eq!(app.handle(post("/movies/petitions/9/vote/", &ana)).await.status.as_u16(), 404);
    assert_eq!(app.handle(post("/movies/petitions/9/unvote/", &ana)).await.status.as_u16(), 404);
}

#[tokio::test]
async fn test_staff_decisions_close_petitions() {
    let app = app();
    let ana = login_as(&app, "ana", false).await;
    let staff = login_as(&app, "sam", true).await;

    app.handle(
        post("/movies/petitions/create/", &ana)
            .with_field("movie_title", "Dune")
            .with_field("description", "Spice"),
    )
    .await;

    assert_eq!(app.handle(post("/movies/petitions/1/approve/", &ana)).await.status.as_u16(), 403);

    let response = app.handle(post("/movies/petitions/1/approve/", &staff)).await;
    assert_eq!(response.status.as_u16(), 303);
    assert!(message_texts(&response).contains(&"Petition for 'Dune' approved".to_string()));

    let response = app.handle(post("/movies/petitions/1/reject/", &staff)).await;
    assert!(message_texts(&response)
        .contains(&"Petition for 'Dune' was already approved".to_string()));

    let response = app.handle(post("/movies/petitions/1/vote/", &ana)).await;
    assert!(message_texts(&response).contains(&"This petition was already approved".to_string()));
    assert_eq!(app.store().stats().votes, 0);

    let list = app.handle(get("/movies/petitions/", &ana)).await;
    assert!(list.body["petitions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_top_customer_is_staff_only() {
    let item = |order_id, username: &str, quantity| PurchaseItem {
        order_id,
        username: username.into(),
        movie_id: 1,
        quantity,
    };
    let app = app_with_orders(vec![item(1, "zoe", 3), item(2, "amy", 2), item(3, "amy", 1)]);
    let ana = login_as(&app, "ana", false).await;
    let staff = login_as(&app, "sam", true).await;

    assert_eq!(app.handle(get("/movies/top_customer/", &ana)).await.status.as_u16(), 403);

    let response = app.handle(get("/movies/top_customer/", &staff)).await;
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.body["top_customer"]["username"], "amy");
    assert_eq!(response.body["top_customer"]["total_quantity"], 3);

    let empty = app_with_store(marquee_core::Store::in_memory());
    let staff = login_as(&empty, "sam", true).await;
    let response = empty.handle(get("/movies/top_customer/", &staff)).await;
    assert!(response.body["top_customer"].is_null());
}

#[tokio::test]
async fn test_admin_movie_management_cascades() {
    let app = app();
    let ana = login_as(&app, "ana", false).await;
    let staff = login_as(&app, "sam", true).await;

    let response = app
        .handle(
            post("/movies/admin/movies/", &staff)
                .with_field("name", "Alien")
                .with_field("price", "12")
                .with_field("description", "In space"),
        )
        .await;
    assert_eq!(response.status.as_u16(), 201);
    assert_eq!(response.body["id"], 1);

    let response = app
        .handle(post("/movies/admin/movies/", &staff).with_field("name", "X").with_field("price", "-1"))
        .await;
    assert_eq!(response.status.as_u16(), 422);
    let response = app
        .handle(post("/movies/admin/movies/", &staff).with_field("name", "X").with_field("price", "ten"))
        .await;
    assert_eq!(response.status.as_u16(), 422);
    let response = app
        .handle(post("/movies/admin/movies/", &ana).with_field("name", "X").with_field("price", "1"))
        .await;
    assert_eq!(response.status.as_u16(), 403);

    app.handle(post("/movies/1/review/create/", &ana).with_field("comment", "Scary")).await;
    app.handle(post("/movies/hide/1/", &ana)).await;

    let response = app.handle(post("/movies/admin/movies/1/delete/", &staff)).await;
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.body["removed"]["name"], "Alien");

    let stats = app.store().stats();
    assert_eq!((stats.movies, stats.reviews, stats.hidden), (0, 0, 0));
}

#[tokio::test]
async fn test_signup_login_and_logout() {
    let app = app();

    let response = app
        .handle(
            RequestContext::post("/accounts/signup/")
                .with_field("username", "ana")
                .with_field("password", "short"),
        )
        .await;
    assert_eq!(response.status.as_u16(), 422);

    let response = app
        .handle(
            RequestContext::post("/accounts/signup/")
                .with_field("username", "ana")
                .with_field("password", "long enough"),
        )
        .await;
    assert_eq!(response.status.as_u16(), 201);
    assert!(response.set_cookie().unwrap().starts_with("marquee_session="));
    let token = response.body["token"].as_str().unwrap().to_string();
    assert_eq!(app.handle(get("/movies/hidden/", &token)).await.status.as_u16(), 200);

    let response = app
        .handle(
            RequestContext::post("/accounts/login/")
                .with_field("username", "ana")
                .with_field("password", "wrong password"),
        )
        .await;
    assert_eq!(response.status.as_u16(), 401);

    let response = app
        .handle(
            RequestContext::post("/accounts/login/?next=/movies/hidden/")
                .with_field("username", "ana")
                .with_field("password", "long enough"),
        )
        .await;
    assert_eq!(response.status.as_u16(), 303);
    assert_eq!(response.location(), Some("/movies/hidden/"));

    let form = app.handle(RequestContext::get("/accounts/login/?next=//evil.example")).await;
    assert!(form.body["next"].is_null());

    let response = app.handle(post("/accounts/logout/", &token)).await;
    assert_eq!(response.status.as_u16(), 303);
    assert!(response.set_cookie().unwrap().contains("Max-Age=0"));
    assert_eq!(app.handle(get("/movies/hidden/", &token)).await.status.as_u16(), 303);
}

#[tokio::test]
async fn test_cookie_session_carries_flash_messages() {
    let app = app();
    add_movie(&app, "Alien").await;
    let token = login_as(&app, "ana", false).await;
    let cookie = format!("marquee_session={}", token);

    let response = app
        .handle(RequestContext::post("/movies/hide/1/").with_header("cookie", &cookie))
        .await;
    assert_eq!(response.status.as_u16(), 303);

    let page = app.handle(RequestContext::get("/movies/hidden/").with_header("cookie", &cookie)).await;
    assert_eq!(page.body["messages"][0]["text"], "'Alien' has been hidden");

    let page = app.handle(RequestContext::get("/movies/hidden/").with_header("cookie", &cookie)).await;
    assert!(page.body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_reports_tables() {
    let app = app();
    add_movie(&app, "Alien").await;
    let response = app.handle(RequestContext::get("/health")).await;
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["stats"]["movies"], 1);
    assert_eq!(response.body["journal_events"], 1);
}

#[tokio::test]
async fn test_login_redirect_keeps_query() {
    let app = app();
    app.accounts().register("ana", "password123", false).await.unwrap();

    let response = app.handle(RequestContext::get("/movies/hidden/?page=2&sort=name")).await;
    assert_eq!(response.status.as_u16(), 303);
    let location = response.location().unwrap().to_string();
    assert_eq!(location, "/accounts/login/?next=%2Fmovies%2Fhidden%2F%3Fpage%3D2%26sort%3Dname");

    let response = app
        .handle(
            RequestContext::post(&location)
                .with_field("username", "ana")
                .with_field("password", "password123"),
        )
        .await;
    assert_eq!(response.location(), Some("/movies/hidden/?page=2&sort=name"));

    let form = app.handle(RequestContext::get("/accounts/login/?next=%2F%5Cevil.example%2F")).await;
    assert!(form.body["next"].is_null());
}

#[tokio::test]
async fn test_visit_records_last_access() {
    use marquee_core::session::SessionStore;

    let app = app();
    let token = login_as(&app, "ana", false).await;
    let sessions = app.session_store();

    let mut session = sessions.get(&token).await.unwrap().unwrap();
    let stale = session.last_accessed_at - chrono::Duration::hours(1);
    session.last_accessed_at = stale;
    sessions.set(session).await.unwrap();

    let response = app.handle(get("/movies/", &token)).await;
    assert_eq!(response.status.as_u16(), 200);

    let session = sessions.get(&token).await.unwrap().unwrap();
    assert!(session.last_accessed_at > stale);
    assert_eq!(session.user_id().map(|id| id.0), Some(1));
}
