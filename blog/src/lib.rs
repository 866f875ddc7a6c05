//! The two-entity blog schema: a `User` owns many `Post`s through `posts.user_id`.

pub mod post;
pub mod schema;
pub mod user;

use lumen::{Client, EntityClient};

pub use post::{Post, PostColumn, PostEdgeSetters, PostSetters, CREATOR};
pub use user::{User, UserColumn, UserEdgeSetters, UserSetters, POSTS};

/// Typed accessors for the blog entities
pub trait BlogClient {
    fn user(&self) -> EntityClient<User>;
    fn post(&self) -> EntityClient<Post>;
}

impl BlogClient for Client {
    fn user(&self) -> EntityClient<User> {
        self.entity::<User>()
    }

    fn post(&self) -> EntityClient<Post> {
        self.entity::<Post>()
    }
}

/// Client over a fresh in-memory database with the blog tables in place
pub async fn open_in_memory() -> lumen::Result<Client> {
    let conn = schema::open_in_memory().await?;
    Ok(Client::new(conn))
}
