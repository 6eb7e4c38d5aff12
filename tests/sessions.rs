//! Login, logout and session cookies.

mod support;

use axum::http::{StatusCode, header};

use support::{PASSWORD, TestApp, body_text, location};

fn set_cookie(response: &axum::http::Response<axum::body::Body>) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

#[tokio::test]
async fn login_page_keeps_next_in_the_form() {
    let app = TestApp::new();
    let response = app.get("/auth/login/?next=/create/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("value=\"/create/\""));
}

#[tokio::test]
async fn correct_credentials_start_a_session() {
    let app = TestApp::new();
    app.create_user("leo").await;

    let form = format!("username=leo&password={PASSWORD}&next=/create/");
    let response = app.post_form("/auth/login/", None, &form).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/create/");
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("yatube_session=ys_"));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(app.store.session_count(), 1);

    let session = cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string();
    let response = app.get("/create/", Some(&session)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_rerenders_login() {
    let app = TestApp::new();
    app.create_user("leo").await;

    let response = app
        .post_form("/auth/login/", None, "username=leo&password=wrong-password")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_empty());
    let body = body_text(response).await;
    assert!(body.contains("Пожалуйста, введите правильные имя пользователя и пароль"));
    assert_eq!(app.store.session_count(), 0);
}

#[tokio::test]
async fn external_next_falls_back_to_home() {
    let app = TestApp::new();
    app.create_user("leo").await;

    let form = format!("username=leo&password={PASSWORD}&next=https://evil.example/");
    let response = app.post_form("/auth/login/", None, &form).await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;
    assert_eq!(app.store.session_count(), 1);

    let response = app.post_form("/auth/logout/", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response).contains("yatube_session="));
    assert_eq!(app.store.session_count(), 0);

    // The old cookie no longer authenticates.
    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn forged_cookie_is_treated_as_anonymous() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;
    let forged = format!("{}tampered", cookie);

    let response = app.get("/follow/", Some(&forged)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.get("/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn navigation_reflects_the_viewer() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;

    let anonymous = body_text(app.get("/", None).await).await;
    assert!(anonymous.contains("href=\"/auth/login/\""));
    assert!(!anonymous.contains("href=\"/create/\""));

    let signed_in = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(signed_in.contains("href=\"/create/\""));
    assert!(signed_in.contains("href=\"/profile/leo/\""));
}
