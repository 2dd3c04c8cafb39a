use std::time::Duration;

use actix_web::{cookie::Cookie, http::StatusCode, test, web::Data, App};
use ideawheel_server::{
    auth::UserType,
    config::Config,
    crypto, csrf, db,
    db::Database,
    modules,
    request_scope::RequestScope,
    session::Session,
};

async fn test_db() -> Data<Database> {
    let db = Database::connect_in_memory().await.unwrap();
    db.init().await.unwrap();
    Data::new(db)
}

async fn seed_user(db: &Database, username: &str, password: &str, user_type: UserType) {
    let mut conn = db.acquire().await.unwrap();
    let created = db::create_user(&mut *conn, username, &crypto::hash(password), user_type)
        .await
        .unwrap();
    assert!(created);
}

fn session_cookie(config: &Config, entries: &[(&str, &str)]) -> Cookie<'static> {
    let mut session = Session::new();
    for (key, value) in entries {
        session.insert(key, *value);
    }
    session.to_cookie(&config.secret_key)
}

fn response_session(resp: &actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>, config: &Config) -> Option<Session> {
    let cookie = resp
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")?;
    Session::decode(cookie.value(), &config.secret_key)
}

async fn idea_count(db: &Database) -> i64 {
    let mut conn = db.acquire().await.unwrap();
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ideas")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    count.0
}

#[actix_web::test]
async fn test_post_without_token_is_rejected() {
    let config = Data::new(Config::for_tests(false));
    let db = test_db().await;
    seed_user(&db, "alice", "password123", UserType::User).await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ideas/create")
        .cookie(session_cookie(&config, &[("username", "alice")]))
        .set_form([("text", "an idea")])
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // no handler side effects
    assert_eq!(idea_count(&db).await, 0);
}

#[actix_web::test]
async fn test_post_with_mismatched_token_is_rejected() {
    let config = Data::new(Config::for_tests(false));
    let db = test_db().await;
    seed_user(&db, "alice", "password123", UserType::User).await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ideas/create")
        .cookie(session_cookie(
            &config,
            &[("username", "alice"), (csrf::CSRF_SESSION_KEY, "tok123")],
        ))
        .set_form([("text", "an idea"), (csrf::CSRF_FORM_FIELD, "wrong")])
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(idea_count(&db).await, 0);

    // validation popped the token even though it failed; the session the
    // client gets back no longer holds one
    let session = response_session(&resp, &config).expect("session cookie on 403");
    assert!(session.get(csrf::CSRF_SESSION_KEY).is_none());
    assert_eq!(session.get("username"), Some("alice"));
}

#[actix_web::test]
async fn test_post_with_matching_token_is_dispatched_and_token_consumed() {
    let config = Data::new(Config::for_tests(false));
    let db = test_db().await;
    seed_user(&db, "alice", "password123", UserType::User).await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ideas/create")
        .cookie(session_cookie(
            &config,
            &[("username", "alice"), (csrf::CSRF_SESSION_KEY, "tok123")],
        ))
        .set_form([("text", "an idea"), (csrf::CSRF_FORM_FIELD, "tok123")])
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(idea_count(&db).await, 1);

    // single use: the stored token is gone after a successful validation
    let session = response_session(&resp, &config).expect("session cookie");
    assert!(session.get(csrf::CSRF_SESSION_KEY).is_none());
    assert_eq!(session.get("username"), Some("alice"));
}

#[actix_web::test]
async fn test_connection_released_on_every_exit_path() {
    let config = Data::new(Config::for_tests(false));
    let db = test_db().await;
    seed_user(&db, "alice", "password123", UserType::User).await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    // the pool holds a single connection, so a single leaked request
    // connection would make every following request hang on acquire

    // normal completion
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // csrf abort
    let req = test::TestRequest::post()
        .uri("/ideas/create")
        .set_form([("text", "an idea")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // handler failure (anonymous client asking for its own user info)
    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/users/me").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // and the connection is back where it started
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    actix_rt::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(db.pool.size(), 1);
    assert_eq!(db.pool.num_idle(), 1);
}

#[actix_web::test]
async fn test_test_mode_disables_enforcement_and_minting() {
    let config = Data::new(Config::for_tests(true));
    let db = test_db().await;
    seed_user(&db, "alice", "password123", UserType::User).await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    // a tokenless POST goes straight through
    let req = test::TestRequest::post()
        .uri("/ideas/create")
        .cookie(session_cookie(&config, &[("username", "alice")]))
        .set_form([("text", "an idea")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(idea_count(&db).await, 1);

    // the accessor renders an empty token and mints nothing, so the
    // session is untouched and no cookie is written
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(response_session(&resp, &config).is_none());
    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains("value=\"\""));
}

#[actix_web::test]
async fn test_session_without_username_is_anonymous() {
    let config = Data::new(Config::for_tests(false));
    let db = test_db().await;
    seed_user(&db, "alice", "password123", UserType::User).await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    // no cookie at all
    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/users/me").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // session names a user the lookup does not know
    let req = test::TestRequest::get()
        .uri("/users/me")
        .cookie(session_cookie(&config, &[("username", "ghost")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_staff_user_is_loaded_into_the_context() {
    let config = Data::new(Config::for_tests(false));
    let db = test_db().await;
    seed_user(&db, "alice", "password123", UserType::Staff).await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/users/me")
        .cookie(session_cookie(&config, &[("username", "alice")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["user_type"], "staff");
    assert_eq!(body["label"], "staff");
}

#[actix_web::test]
async fn test_get_requests_never_trigger_csrf_validation() {
    let config = Data::new(Config::for_tests(false));
    let db = test_db().await;

    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .wrap(RequestScope)
            .configure(modules::configure_all),
    )
    .await;

    // no session, no token: a GET sails through and mints a token for the
    // rendered page
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let session = response_session(&resp, &config).expect("session cookie");
    let minted = session.get(csrf::CSRF_SESSION_KEY).expect("minted token");
    assert_eq!(minted.len(), 64);

    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains(minted));
}
