// Two-entity schema shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, MockDatabase, Transaction, Value};

use crate::client::Client;
use crate::config::Config;
use crate::driver::Driver;

use crate::entity::{Edge, Loaded, LoadedMany};
use crate::schema::fixtures::{CREATOR, POSTS};
use crate::schema::EdgeSpec;

const USER_EDGES: &[&EdgeSpec] = &[&POSTS];
const POST_EDGES: &[&EdgeSpec] = &[&CREATOR];

#[derive(Debug, Clone, Default)]
pub struct UserEdges {
    pub posts: LoadedMany<Post>,
}

#[derive(Debug, Clone, Default, crate::Entity)]
#[lumen(table = "users", label = "User", edges = "USER_EDGES")]
pub struct User {
    #[lumen(id)]
    pub id: i64,
    pub name: String,
    #[lumen(skip)]
    pub edges: UserEdges,
}

#[derive(Debug, Clone, Default)]
pub struct PostEdges {
    pub creator: Loaded<User>,
}

#[derive(Debug, Clone, Default, crate::Entity)]
#[lumen(table = "posts", label = "Post", edges = "POST_EDGES")]
pub struct Post {
    #[lumen(id)]
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    #[lumen(skip)]
    pub edges: PostEdges,
}

pub const CREATOR_EDGE: Edge<Post, User> =
    Edge::many_to_one(&CREATOR, post_creator_id, post_creator);

pub const POSTS_EDGE: Edge<User, Post> = Edge::one_to_many(&POSTS, post_creator_id, user_posts);

fn post_creator_id(post: &Post) -> Option<i64> {
    Some(post.user_id)
}

fn post_creator(post: &mut Post) -> &mut Loaded<User> {
    &mut post.edges.creator
}

fn user_posts(user: &mut User) -> &mut LoadedMany<Post> {
    &mut user.edges.posts
}

pub fn user_row(id: i64, name: &str) -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("id".to_string(), Value::BigInt(Some(id))),
        ("name".to_string(), Value::from(name)),
    ])
}

pub fn post_row(id: i64, name: &str, user_id: i64) -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("id".to_string(), Value::BigInt(Some(id))),
        ("name".to_string(), Value::from(name)),
        ("user_id".to_string(), Value::BigInt(Some(user_id))),
    ])
}

/// Client over a mock connection plus a handle for reading the statement log
pub fn mock_client(db: MockDatabase) -> (Client, Arc<DatabaseConnection>) {
    let conn = Arc::new(db.into_connection());
    (Client::from_shared(Arc::clone(&conn), Config::default()), conn)
}

pub fn mock_driver(db: MockDatabase) -> (Driver, Arc<DatabaseConnection>) {
    let conn = Arc::new(db.into_connection());
    (Driver::shared(Arc::clone(&conn), Config::default()), conn)
}

/// Statements sent so far; every client and builder on `conn` must be dropped
pub fn transaction_log(conn: Arc<DatabaseConnection>) -> Vec<Transaction> {
    match Arc::try_unwrap(conn) {
        Ok(conn) => conn.into_transaction_log(),
        Err(_) => panic!("mock connection is still shared"),
    }
}
