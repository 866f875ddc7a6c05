#![allow(dead_code)]

use blog::{BlogClient, Post, PostEdgeSetters, PostSetters, User, UserSetters};
use lumen::Client;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub async fn setup() -> Client {
    init_logger();
    blog::open_in_memory().await.unwrap()
}

pub async fn create_user(client: &Client, name: &str) -> User {
    client.user().create().set_name(name).save().await.unwrap()
}

pub async fn create_post(client: &Client, name: &str, creator: &User) -> Post {
    client
        .post()
        .create()
        .set_name(name)
        .set_creator(creator)
        .save()
        .await
        .unwrap()
}

/// A user named `name` with `posts` posts named `<name>-<n>`
pub async fn user_with_posts(client: &Client, name: &str, posts: usize) -> User {
    let user = create_user(client, name).await;
    for i in 0..posts {
        create_post(client, &format!("{}-{}", name, i), &user).await;
    }
    user
}
