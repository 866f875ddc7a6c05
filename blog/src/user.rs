use lumen::{Edge, EdgeSpec, LoadedMany, MutationBuilder, Rel};

use crate::post::{self, Post};

pub const POSTS_SPEC: EdgeSpec = EdgeSpec {
    name: "posts",
    rel: Rel::O2M,
    owner: "User",
    owner_table: "users",
    owner_id: "id",
    target: "Post",
    target_table: "posts",
    target_id: "id",
    column: "user_id",
    required: false,
};

const EDGES: &[&EdgeSpec] = &[&POSTS_SPEC];

/// Posts written by the user
pub const POSTS: Edge<User, Post> = Edge::one_to_many(&POSTS_SPEC, post::creator_id, posts_slot);

#[derive(Debug, Clone, Default)]
pub struct UserEdges {
    pub posts: LoadedMany<Post>,
}

#[derive(Debug, Clone, Default, lumen::Entity)]
#[lumen(table = "users", label = "User", edges = "EDGES")]
pub struct User {
    #[lumen(id)]
    pub id: i64,
    pub name: String,
    #[lumen(skip)]
    pub edges: UserEdges,
}

impl User {
    /// Eager-loaded posts, `NotLoaded` unless the query asked for them
    pub fn posts(&self) -> lumen::Result<&[Post]> {
        self.edges.posts.get(&POSTS_SPEC)
    }
}

fn posts_slot(user: &mut User) -> &mut LoadedMany<Post> {
    &mut user.edges.posts
}

/// Edge setters for builders over `User`
pub trait UserEdgeSetters: MutationBuilder<User> {
    fn add_post_ids(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.add_edge_ids(POSTS, ids)
    }

    fn add_posts(self, posts: &[Post]) -> Self {
        self.add_edge_nodes(POSTS, posts)
    }

    fn remove_post_ids(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.remove_edge_ids(POSTS, ids)
    }

    fn clear_posts(self) -> Self {
        self.clear_edge(POSTS)
    }
}

impl<B: MutationBuilder<User>> UserEdgeSetters for B {}
