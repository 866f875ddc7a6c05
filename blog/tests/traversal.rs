mod helpers;

use blog::{BlogClient, PostColumn, UserColumn, CREATOR, POSTS};
use lumen::order;
use lumen::predicate;

use helpers::{create_user, setup, user_with_posts};

#[tokio::test]
async fn posts_of_one_user() {
    let client = setup().await;
    let a = user_with_posts(&client, "A", 5).await;
    user_with_posts(&client, "B", 3).await;

    assert_eq!(client.user().query_edge_of(&a, POSTS).count().await.unwrap(), 5);

    let names: Vec<String> = client
        .user()
        .query()
        .filter(predicate::eq(UserColumn::Name, "B"))
        .query_edge(POSTS)
        .order(order::asc(PostColumn::Name))
        .select([PostColumn::Name])
        .values()
        .await
        .unwrap();
    assert_eq!(names, ["B-0", "B-1", "B-2"]);
}

#[tokio::test]
async fn creators_are_distinct() {
    let client = setup().await;
    user_with_posts(&client, "A", 3).await;
    user_with_posts(&client, "B", 2).await;
    create_user(&client, "C").await;

    let creators = client
        .post()
        .query()
        .query_edge(CREATOR)
        .order(order::asc(UserColumn::Name))
        .all()
        .await
        .unwrap();

    let names: Vec<&str> = creators.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
}

#[tokio::test]
async fn edge_predicates() {
    let client = setup().await;
    user_with_posts(&client, "A", 2).await;
    user_with_posts(&client, "B", 0).await;

    let with_posts = client
        .user()
        .query()
        .filter(predicate::has_edge(POSTS))
        .all()
        .await
        .unwrap();
    assert_eq!(with_posts.len(), 1);
    assert_eq!(with_posts[0].name, "A");

    let without = client
        .user()
        .query()
        .filter(predicate::not(predicate::has_edge(POSTS)))
        .only()
        .await
        .unwrap();
    assert_eq!(without.name, "B");

    let by_a = client
        .post()
        .query()
        .filter(predicate::has_edge_with(
            CREATOR,
            vec![predicate::eq(UserColumn::Name, "A")],
        ))
        .count()
        .await
        .unwrap();
    assert_eq!(by_a, 2);
}
