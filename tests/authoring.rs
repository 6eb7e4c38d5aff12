//! Creating and editing posts, comments and image uploads.

mod support;

use axum::http::{StatusCode, header};

use support::{MultipartForm, SMALL_GIF, TestApp, body_text, location};

#[tokio::test]
async fn guests_are_sent_to_login_with_next() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let post_id = app.store.add_post(leo.id, "Текст", None);

    let response = app.get("/create/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/create/");

    let edit = format!("/posts/{post_id}/edit/");
    let response = app.get(&edit, None).await;
    assert_eq!(location(&response), format!("/auth/login/?next={edit}"));

    let response = app
        .post_multipart("/create/", None, MultipartForm::new().text("text", "Гость"))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.post_count(), 1);
}

#[tokio::test]
async fn create_form_lists_groups() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    app.store.add_group("Коты", "cats");
    let cookie = app.session_cookie(&leo).await;

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Новый пост"));
    assert!(body.contains("Коты"));
}

#[tokio::test]
async fn valid_post_is_saved_and_redirects_to_profile() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let work = app.store.add_group("Работа", "work");
    app.store.add_post(leo.id, "Текст с картинкой", Some(work.id));
    let cookie = app.session_cookie(&leo).await;
    let before = app.store.post_count();

    let form = MultipartForm::new()
        .text("text", "Отправить текст")
        .text("group", &work.id.to_string());
    let response = app.post_multipart("/create/", Some(&cookie), form).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");
    assert_eq!(app.store.post_count(), before + 1);

    let created = app.store.latest_post().expect("post saved");
    assert_eq!(created.text, "Отправить текст");
    assert_eq!(created.group.map(|group| group.slug).as_deref(), Some("work"));
    assert_eq!(created.author.username, "leo");

    let body = body_text(app.get("/group/work/", None).await).await;
    assert!(body.contains("Отправить текст"));
}

#[tokio::test]
async fn blank_text_rerenders_the_form() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;

    let form = MultipartForm::new().text("text", "   ").text("group", "");
    let response = app.post_multipart("/create/", Some(&cookie), form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("class=\"errorlist\""));
    assert_eq!(app.store.post_count(), 0);
}

#[tokio::test]
async fn unknown_group_is_a_form_error() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;

    let form = MultipartForm::new().text("text", "Текст").text("group", "404");
    let response = app.post_multipart("/create/", Some(&cookie), form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("class=\"errorlist\""));
    assert_eq!(app.store.post_count(), 0);
}

#[tokio::test]
async fn author_can_edit_their_post() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cats = app.store.add_group("Коты", "cats");
    let post_id = app.store.add_post(leo.id, "Черновик", None);
    let cookie = app.session_cookie(&leo).await;

    let edit = format!("/posts/{post_id}/edit/");
    let page = body_text(app.get(&edit, Some(&cookie)).await).await;
    assert!(page.contains("Редактировать пост"));
    assert!(page.contains("Черновик"));

    let form = MultipartForm::new()
        .text("text", "Чистовик")
        .text("group", &cats.id.to_string());
    let response = app.post_multipart(&edit, Some(&cookie), form).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{post_id}/"));
    let post = app.store.post(post_id).expect("post exists");
    assert_eq!(post.text, "Чистовик");
    assert_eq!(post.group.map(|group| group.slug).as_deref(), Some("cats"));
}

#[tokio::test]
async fn non_author_edit_changes_nothing() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let anna = app.create_user("anna").await;
    let post_id = app.store.add_post(leo.id, "Оригинал", None);
    let cookie = app.session_cookie(&anna).await;

    let edit = format!("/posts/{post_id}/edit/");
    let response = app.get(&edit, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{post_id}/"));

    let form = MultipartForm::new().text("text", "Подделка");
    let response = app.post_multipart(&edit, Some(&cookie), form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{post_id}/"));
    assert_eq!(app.store.post(post_id).expect("post exists").text, "Оригинал");
}

#[tokio::test]
async fn editing_a_missing_post_is_not_found() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;

    let response = app.get("/posts/777/edit/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_upload_is_stored_rendered_and_served() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;

    let form = MultipartForm::new()
        .text("text", "Пост с картинкой")
        .file("image", "small.gif", "image/gif", SMALL_GIF);
    let response = app.post_multipart("/create/", Some(&cookie), form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let image = app.store.latest_post().expect("post saved").image;
    let image = image.expect("image path saved");
    assert!(image.starts_with("posts/"));
    assert!(image.ends_with("-small.gif"));

    for page in ["/", "/profile/leo/"] {
        let body = body_text(app.get(page, None).await).await;
        assert!(body.contains(&format!("/media/{image}")), "{page}");
    }

    let media = app.get(&format!("/media/{image}"), None).await;
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(media.headers()[header::CONTENT_TYPE], "image/gif");
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let cookie = app.session_cookie(&leo).await;

    let form = MultipartForm::new()
        .text("text", "Не картинка")
        .file("image", "notes.txt", "text/plain", b"just some text");
    let response = app.post_multipart("/create/", Some(&cookie), form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Загрузите правильное изображение"));
    assert_eq!(app.store.post_count(), 0);
}

#[tokio::test]
async fn missing_media_is_not_found() {
    let app = TestApp::new();
    let response = app.get("/media/posts/missing.gif", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signed_in_user_comments_on_a_post() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let anna = app.create_user("anna").await;
    let post_id = app.store.add_post(leo.id, "Обсудим", None);
    let cookie = app.session_cookie(&anna).await;

    let comment = format!("/posts/{post_id}/comment/");
    let response = app.post_form(&comment, Some(&cookie), "text=Отличный+пост").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{post_id}/"));
    assert_eq!(app.store.comment_count(post_id), 1);

    let body = body_text(app.get(&format!("/posts/{post_id}/"), Some(&cookie)).await).await;
    assert!(body.contains("Отличный пост"));
    assert!(body.contains("comment-form"));
}

#[tokio::test]
async fn guest_and_blank_comments_are_not_saved() {
    let app = TestApp::new();
    let leo = app.create_user("leo").await;
    let post_id = app.store.add_post(leo.id, "Обсудим", None);
    let comment = format!("/posts/{post_id}/comment/");

    let response = app.post_form(&comment, None, "text=Гость").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login/?next="));
    assert_eq!(app.store.comment_count(post_id), 0);

    let cookie = app.session_cookie(&leo).await;
    let response = app.post_form(&comment, Some(&cookie), "text=++").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.comment_count(post_id), 0);
}
