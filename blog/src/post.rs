use lumen::{Edge, EdgeSpec, Loaded, MutationBuilder, Rel};

use crate::user::User;

pub const CREATOR_SPEC: EdgeSpec = EdgeSpec {
    name: "creator",
    rel: Rel::M2O,
    owner: "Post",
    owner_table: "posts",
    owner_id: "id",
    target: "User",
    target_table: "users",
    target_id: "id",
    column: "user_id",
    required: true,
};

const EDGES: &[&EdgeSpec] = &[&CREATOR_SPEC];

/// The user who wrote the post
pub const CREATOR: Edge<Post, User> = Edge::many_to_one(&CREATOR_SPEC, creator_id, creator_slot);

#[derive(Debug, Clone, Default)]
pub struct PostEdges {
    pub creator: Loaded<User>,
}

#[derive(Debug, Clone, Default, lumen::Entity)]
#[lumen(table = "posts", label = "Post", edges = "EDGES")]
pub struct Post {
    #[lumen(id)]
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    #[lumen(skip)]
    pub edges: PostEdges,
}

impl Post {
    pub fn creator(&self) -> lumen::Result<&User> {
        self.edges.creator.get(&CREATOR_SPEC)
    }
}

pub(crate) fn creator_id(post: &Post) -> Option<i64> {
    Some(post.user_id)
}

fn creator_slot(post: &mut Post) -> &mut Loaded<User> {
    &mut post.edges.creator
}

/// Edge setters for builders over `Post`
pub trait PostEdgeSetters: MutationBuilder<Post> {
    fn set_creator_id(self, id: i64) -> Self {
        self.set_edge(CREATOR, id)
    }

    fn set_creator(self, user: &User) -> Self {
        self.set_edge_node(CREATOR, user)
    }

    fn clear_creator(self) -> Self {
        self.clear_edge(CREATOR)
    }
}

impl<B: MutationBuilder<Post>> PostEdgeSetters for B {}
