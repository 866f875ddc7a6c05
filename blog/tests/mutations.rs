mod helpers;

use blog::{
    BlogClient, PostColumn, PostEdgeSetters, PostSetters, UserColumn, UserEdgeSetters,
    UserSetters, POSTS,
};
use lumen::{predicate, LumenError, MutationBuilder};

use helpers::{create_post, create_user, setup, user_with_posts};

#[tokio::test]
async fn create_returns_node_with_id() {
    let client = setup().await;
    let a = create_user(&client, "A").await;
    let post = create_post(&client, "hello", &a).await;

    assert!(a.id > 0);
    assert_eq!(post.user_id, a.id);
    assert_eq!(client.post().get(post.id).await.unwrap().name, "hello");
}

#[tokio::test]
async fn create_rejects_missing_required_values() {
    let client = setup().await;
    let a = create_user(&client, "A").await;

    let err = client.user().create().save().await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "lumen: missing required field \"User.name\"");

    let err = client.post().create().set_name("orphan").save().await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "lumen: missing required edge \"Post.creator\"");

    // assigning the foreign key column directly satisfies the edge
    let post = client
        .post()
        .create()
        .set_name("direct")
        .set_user_id(a.id)
        .save()
        .await
        .unwrap();
    assert_eq!(post.user_id, a.id);
}

#[tokio::test]
async fn dangling_creator_is_a_constraint_error() {
    let client = setup().await;
    let err = client
        .post()
        .create()
        .set_name("p")
        .set_creator_id(404)
        .save()
        .await
        .unwrap_err();
    assert!(err.is_constraint(), "{:?}", err);
}

#[tokio::test]
async fn bulk_create_saves_in_order() {
    let client = setup().await;
    let users = client.user();
    let created = users
        .create_bulk(vec![
            users.create().set_name("x"),
            users.create().set_name("y"),
        ])
        .save()
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    assert!(created[0].id < created[1].id);
    assert_eq!(users.query().count().await.unwrap(), 2);
}

#[tokio::test]
async fn update_reports_matched_rows() {
    let client = setup().await;
    user_with_posts(&client, "A", 3).await;
    user_with_posts(&client, "B", 2).await;

    let n = client
        .post()
        .update()
        .filter(predicate::has_prefix(PostColumn::Name, "A-"))
        .set_name("renamed")
        .save()
        .await
        .unwrap();
    assert_eq!(n, 3);

    let renamed = client
        .post()
        .query()
        .filter(predicate::eq(PostColumn::Name, "renamed"))
        .count()
        .await
        .unwrap();
    assert_eq!(renamed, 3);

    let none = client
        .post()
        .update()
        .filter(predicate::eq(PostColumn::Name, "missing"))
        .set_name("x")
        .save()
        .await
        .unwrap();
    assert_eq!(none, 0);
}

#[tokio::test]
async fn update_one_moves_post_to_another_creator() {
    let client = setup().await;
    let a = user_with_posts(&client, "A", 1).await;
    let b = create_user(&client, "B").await;
    let post = client.post().query().only().await.unwrap();

    let moved = client
        .post()
        .update_one(&post)
        .set_creator(&b)
        .save()
        .await
        .unwrap();
    assert_eq!(moved.user_id, b.id);
    assert_eq!(client.user().query_edge_of(&a, POSTS).count().await.unwrap(), 0);
}

#[tokio::test]
async fn update_one_rereads_selected_fields() {
    let client = setup().await;
    let a = create_user(&client, "A").await;

    let user = client
        .user()
        .update_one(&a)
        .set_name("Ada")
        .select([UserColumn::Name])
        .save()
        .await
        .unwrap();
    assert_eq!(user.id, a.id);
    assert_eq!(user.name, "Ada");
}

#[tokio::test]
async fn update_one_errors() {
    let client = setup().await;
    let a = user_with_posts(&client, "A", 1).await;
    let post = client.post().query().only().await.unwrap();

    let err = client.post().update_one(&post).clear_creator().save().await.unwrap_err();
    assert!(err.is_validation());

    let err = client
        .user()
        .update_one_id(a.id + 1)
        .set_name("ghost")
        .save()
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = client
        .user()
        .update_one(&a)
        .set(UserColumn::Id, 99i64)
        .save()
        .await
        .unwrap_err();
    assert!(matches!(err, LumenError::Validation { .. }));
}

#[tokio::test]
async fn update_one_with_unknown_selection_writes_nothing() {
    let client = setup().await;
    let a = create_user(&client, "A").await;

    let err = client
        .user()
        .update_one(&a)
        .set_name("CHANGED")
        .select(["nickname"])
        .save()
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(client.user().get(a.id).await.unwrap().name, "A");
}

#[tokio::test]
async fn bulk_update_cannot_share_children() {
    let client = setup().await;
    create_user(&client, "A").await;
    create_user(&client, "B").await;
    let d = user_with_posts(&client, "D", 2).await;
    let d_posts = client.user().query_edge_of(&d, POSTS).ids().await.unwrap();

    let err = client
        .user()
        .update()
        .filter(predicate::ne(UserColumn::Name, "D"))
        .set_name("CHANGED")
        .add_post_ids(d_posts)
        .save()
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let changed = client
        .user()
        .query()
        .filter(predicate::eq(UserColumn::Name, "CHANGED"))
        .count()
        .await
        .unwrap();
    assert_eq!(changed, 0);
    assert_eq!(client.user().query_edge_of(&d, POSTS).count().await.unwrap(), 2);
}

#[tokio::test]
async fn adding_posts_reassigns_unowned_children_only() {
    let client = setup().await;
    let a = user_with_posts(&client, "A", 2).await;
    let b = create_user(&client, "B").await;
    let a_posts = client.user().query_edge_of(&a, POSTS).ids().await.unwrap();

    // the posts already belong to A
    let err = client
        .user()
        .update_one(&b)
        .add_post_ids(a_posts.clone())
        .save()
        .await
        .unwrap_err();
    assert!(err.is_constraint(), "{:?}", err);

    // re-adding A's own posts is a no-op
    client
        .user()
        .update_one(&a)
        .add_post_ids(a_posts)
        .save()
        .await
        .unwrap();
    assert_eq!(client.user().query_edge_of(&a, POSTS).count().await.unwrap(), 2);
}

#[tokio::test]
async fn detaching_required_children_violates_not_null() {
    let client = setup().await;
    let a = user_with_posts(&client, "A", 1).await;
    let post = client.post().query().only().await.unwrap();

    let err = client
        .user()
        .update_one(&a)
        .remove_post_ids([post.id])
        .save()
        .await
        .unwrap_err();
    assert!(err.is_constraint(), "{:?}", err);
}

#[tokio::test]
async fn deletes() {
    let client = setup().await;
    let a = user_with_posts(&client, "A", 3).await;

    let n = client
        .post()
        .delete()
        .filter(predicate::ne(PostColumn::Name, "A-0"))
        .exec()
        .await
        .unwrap();
    assert_eq!(n, 2);

    let err = client.user().delete_one(&a).exec().await.unwrap_err();
    assert!(err.is_constraint(), "{:?}", err);

    client.post().delete().exec().await.unwrap();
    client.user().delete_one(&a).exec().await.unwrap();
    assert!(client.user().delete_one_id(a.id).exec().await.unwrap_err().is_not_found());
}
