use chrono::Timelike;
use journal::db::{Db, NowRepo, PageRepo, PostRepo, UserRepo};
use journal::model::{Now, Page, PageUpdate, Post, PostUpdate, User, UserUpdate};
use journal::service::{NowService, PageService, PostService, UserService};
use journal::{error_code, error_message, ErrorCode};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

async fn setup_db() -> (TempDir, Db) {
    let td = tempdir().unwrap();
    let mut db = Db::new(td.path().join("journal.db").to_string_lossy());
    db.open().await.unwrap();
    (td, db)
}

#[tokio::test]
async fn created_post_is_found_by_permalink() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db.clone());

    let mut post = Post::new("hello", "Hello", "World");
    posts.create_post(&mut post).await.unwrap();
    assert!(post.id > 0);

    let found = posts.find_post_by_permalink("hello").await.unwrap();
    assert_eq!(found.id, post.id);
    assert_eq!(found.permalink, "hello");
    assert_eq!(found.title, "Hello");
    assert_eq!(found.content, "World");
    assert_eq!(found.created_at, found.updated_at);
    assert_eq!(found.created_at, post.created_at);

    let by_id = posts.find_post_by_id(post.id).await.unwrap();
    assert_eq!(by_id, found);
}

#[tokio::test]
async fn find_posts_on_empty_table_is_not_found() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db);

    let err = posts.find_posts().await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);
    assert_eq!(error_message(&err), "no posts available");
}

#[tokio::test]
async fn find_posts_lists_newest_first() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db);

    for (permalink, title) in [("first", "One"), ("second", "Two"), ("third", "Three")] {
        posts
            .create_post(&mut Post::new(permalink, title, "body"))
            .await
            .unwrap();
    }

    let all = posts.find_posts().await.unwrap();
    let permalinks: Vec<&str> = all.iter().map(|p| p.permalink.as_str()).collect();
    assert_eq!(permalinks, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn missing_key_is_not_found_and_closed_store_is_internal() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db.clone());

    let err = posts.find_post_by_permalink("nope").await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);
    assert_eq!(error_message(&err), "post not found");

    let err = posts.find_post_by_id(42).await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);

    db.close().await;
    let err = posts.find_post_by_permalink("nope").await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::Internal);
    assert_eq!(error_message(&err), "Internal Error");
}

#[tokio::test]
async fn partial_post_update_keeps_other_fields() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db);

    let mut post = Post::new("draft", "Original title", "Original content");
    posts.create_post(&mut post).await.unwrap();

    let update = PostUpdate {
        content: Some("New content".into()),
        ..Default::default()
    };
    posts.update_post("draft", &update).await.unwrap();

    let stored = posts.find_post_by_permalink("draft").await.unwrap();
    assert_eq!(stored.title, "Original title");
    assert_eq!(stored.content, "New content");
    assert_eq!(stored.created_at, post.created_at);
}

#[tokio::test]
async fn update_stamps_the_transaction_timestamp() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db);

    let mut post = Post::new("clock", "Clock", "tick");
    posts.create_post(&mut post).await.unwrap();

    // Next transaction lands on a later whole second.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let update = PostUpdate {
        title: Some("Clock v2".into()),
        ..Default::default()
    };
    let updated = posts.update_post("clock", &update).await.unwrap();
    let stored = posts.find_post_by_permalink("clock").await.unwrap();

    assert_eq!(stored.updated_at, updated.updated_at);
    assert_eq!(stored.updated_at.nanosecond(), 0);
    assert!(stored.updated_at > stored.created_at);
    assert_eq!(stored.created_at, post.created_at);
    assert_eq!(stored.content, "tick");
}

#[tokio::test]
async fn update_missing_post_is_not_found() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db);

    let err = posts
        .update_post("ghost", &PostUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);
}

#[tokio::test]
async fn page_create_find_update() {
    let (_td, db) = setup_db().await;
    let pages = PageRepo::new(db);

    let mut about = Page::new("about", "Hi, I write things.");
    pages.create_page(&mut about).await.unwrap();
    assert!(about.id > 0);

    let found = pages.find_page_by_name("about").await.unwrap();
    assert_eq!(found.content, "Hi, I write things.");

    let updated = pages
        .update_page(
            "about",
            &PageUpdate {
                content: Some("Now with more words.".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, about.id);

    let found = pages.find_page_by_name("about").await.unwrap();
    assert_eq!(found.content, "Now with more words.");
    assert_eq!(found.name, "about");
}

#[tokio::test]
async fn empty_page_update_only_restamps() {
    let (_td, db) = setup_db().await;
    let pages = PageRepo::new(db);

    pages
        .create_page(&mut Page::new("contact", "mail me"))
        .await
        .unwrap();
    let updated = pages
        .update_page("contact", &PageUpdate::default())
        .await
        .unwrap();
    assert_eq!(updated.content, "mail me");
}

#[tokio::test]
async fn updating_unknown_page_does_not_create_it() {
    let (_td, db) = setup_db().await;
    let pages = PageRepo::new(db.clone());

    let update = PageUpdate {
        content: Some("surprise".into()),
    };
    let err = pages.update_page("about", &update).await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);
    assert_eq!(error_message(&err), "page not found");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM page")
        .fetch_one(db.pool().unwrap())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn latest_now_is_the_most_recent_row() {
    let (_td, db) = setup_db().await;
    let nows = NowRepo::new(db);

    let err = nows.find_latest_now().await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);

    let mut first = Now::new("Reading about SQLite", "Lisbon");
    nows.create_now(&mut first).await.unwrap();
    let mut second = Now::new("Writing Rust", "Porto");
    nows.create_now(&mut second).await.unwrap();
    assert!(second.id > first.id);

    let latest = nows.find_latest_now().await.unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.content, "Writing Rust");
    assert_eq!(latest.location, "Porto");
}

#[tokio::test]
async fn concurrent_creates_get_distinct_ids() {
    let (_td, db) = setup_db().await;
    let nows = NowRepo::new(db);

    let mut handles = Vec::new();
    for i in 0..8 {
        let nows = nows.clone();
        handles.push(tokio::spawn(async move {
            let mut now = Now::new(format!("entry {i}"), "");
            nows.create_now(&mut now).await.map(|_| now.id)
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    let latest = nows.find_latest_now().await.unwrap();
    assert_eq!(Some(&latest.id), ids.last());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_to_one_post_all_succeed() {
    let (_td, db) = setup_db().await;
    let posts = PostRepo::new(db);

    let mut post = Post::new("c", "Busy", "v0");
    posts.create_post(&mut post).await.unwrap();

    let mut handles = Vec::new();
    for i in 1..=16 {
        let posts = posts.clone();
        handles.push(tokio::spawn(async move {
            let update = PostUpdate {
                content: Some(format!("v{i}")),
                ..Default::default()
            };
            posts.update_post("c", &update).await
        }));
    }

    let mut written = Vec::new();
    for handle in handles {
        let updated = handle.await.unwrap().unwrap();
        assert_eq!(updated.id, post.id);
        written.push(updated.content);
    }

    let stored = posts.find_post_by_permalink("c").await.unwrap();
    assert_eq!(stored.title, "Busy");
    assert!(written.contains(&stored.content));
    assert_eq!(posts.find_posts().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_user_updates_and_deletes_do_not_fail() {
    let (_td, db) = setup_db().await;
    let users = UserRepo::new(db);

    let mut ids = Vec::new();
    for i in 0..8 {
        let mut user = User::new(format!("user {i}"), format!("u{i}@example.com"), "secret");
        users.create_user(&mut user).await.unwrap();
        ids.push(user.id);
    }

    let mut handles = Vec::new();
    for (i, id) in ids.iter().copied().enumerate() {
        let users = users.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                users.delete_user(id).await
            } else {
                let update = UserUpdate {
                    name: Some(format!("renamed {i}")),
                    ..Default::default()
                };
                users.update_user(id, &update).await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let remaining = users.find_users().await.unwrap();
    assert_eq!(remaining.len(), 4);
    assert!(remaining.iter().all(|u| u.name.starts_with("renamed")));
}

#[tokio::test]
async fn in_memory_store_shares_one_database_across_the_pool() {
    let mut db = Db::new("sqlite::memory:");
    db.open().await.unwrap();
    let posts = PostRepo::new(db.clone());
    let nows = NowRepo::new(db.clone());

    let mut post = Post::new("mem", "In memory", "first");
    posts.create_post(&mut post).await.unwrap();
    let update = PostUpdate {
        content: Some("second".into()),
        ..Default::default()
    };
    posts.update_post("mem", &update).await.unwrap();
    assert_eq!(
        posts.find_post_by_permalink("mem").await.unwrap().content,
        "second"
    );

    for i in 0..5 {
        nows.create_now(&mut Now::new(format!("n{i}"), "")).await.unwrap();
    }
    assert_eq!(nows.find_latest_now().await.unwrap().content, "n4");
    db.close().await;
}

#[tokio::test]
async fn user_lookup_by_unknown_email_is_not_found() {
    let (_td, db) = setup_db().await;
    let users = UserRepo::new(db);

    let mut user = User::new("A", "a@b.com", "hashed-password");
    users.create_user(&mut user).await.unwrap();

    let err = users.find_user_by_email("x@y.com").await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);
    assert_eq!(error_message(&err), "user not found");

    let found = users.find_user_by_email("a@b.com").await.unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(found.api_key, user.api_key);
    assert_eq!(found.password, "hashed-password");
}

#[tokio::test]
async fn duplicate_emails_resolve_to_newest_user() {
    let (_td, db) = setup_db().await;
    let users = UserRepo::new(db);

    let mut older = User::new("Old", "same@b.com", "x");
    users.create_user(&mut older).await.unwrap();
    let mut newer = User::new("New", "same@b.com", "y");
    users.create_user(&mut newer).await.unwrap();

    let found = users.find_user_by_email("same@b.com").await.unwrap();
    assert_eq!(found.id, newer.id);
    assert_eq!(users.find_users().await.unwrap().len(), 2);
}

#[tokio::test]
async fn user_update_and_delete() {
    let (_td, db) = setup_db().await;
    let users = UserRepo::new(db);

    let err = users.find_users().await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);
    assert_eq!(error_message(&err), "no users available");

    let mut user = User::new("Ada", "ada@example.com", "hash-1");
    users.create_user(&mut user).await.unwrap();

    let update = UserUpdate {
        name: Some("Ada L.".into()),
        ..Default::default()
    };
    let updated = users.update_user(user.id, &update).await.unwrap();
    assert_eq!(updated.name, "Ada L.");
    assert_eq!(updated.email, "ada@example.com");
    assert_eq!(updated.password, "hash-1");

    let stored = users.find_user_by_id(user.id).await.unwrap();
    assert_eq!(stored, updated);

    users.delete_user(user.id).await.unwrap();
    let err = users.find_user_by_id(user.id).await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);

    let err = users.delete_user(user.id).await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);

    let err = users.update_user(user.id, &update).await.unwrap_err();
    assert_eq!(error_code(&err), ErrorCode::NotFound);
}

#[tokio::test]
async fn services_work_behind_trait_objects() {
    let (_td, db) = setup_db().await;
    let posts: Box<dyn PostService> = Box::new(PostRepo::new(db.clone()));
    let pages: Box<dyn PageService> = Box::new(PageRepo::new(db));

    posts
        .create_post(&mut Post::new("dyn", "Dyn", "dispatch"))
        .await
        .unwrap();
    assert_eq!(posts.find_posts().await.unwrap().len(), 1);

    let err = pages.find_page_by_name("about").await.unwrap_err();
    assert_eq!(error_code(&err).http_status(), 404);
}
