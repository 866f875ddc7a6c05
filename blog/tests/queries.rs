mod helpers;

use std::time::Duration;

use blog::{BlogClient, PostColumn, UserColumn};
use lumen::aggregate;
use lumen::order::{self, Order};
use lumen::predicate;
use lumen::{Client, Config, LumenError};
use sea_orm::{DbBackend, FromQueryResult, Statement};

use helpers::{create_user, setup, user_with_posts};

#[derive(Debug, FromQueryResult)]
struct PostsPerUser {
    user_id: i64,
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct NameOnly {
    name: String,
}

#[tokio::test]
async fn cardinality_helpers() {
    let client = setup().await;
    let users = client.user();

    assert!(!users.query().exist().await.unwrap());
    assert!(users.query().first().await.unwrap_err().is_not_found());
    assert!(users.query().first_x().await.is_none());
    assert!(users.query().only().await.unwrap_err().is_not_found());

    let a = create_user(&client, "A").await;
    assert!(users.query().exist().await.unwrap());
    assert_eq!(users.query().only_id().await.unwrap(), a.id);
    assert_eq!(users.query().first_id().await.unwrap(), a.id);

    create_user(&client, "B").await;
    assert!(users.query().only().await.unwrap_err().is_not_singular());
    assert!(users.query().only_id().await.unwrap_err().is_not_singular());
    assert_eq!(users.get(a.id).await.unwrap().name, "A");
    assert!(users.get(a.id + 100).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn count_respects_predicates_and_ignores_order() {
    let client = setup().await;
    user_with_posts(&client, "A", 3).await;
    user_with_posts(&client, "B", 4).await;

    let posts = client.post();
    assert_eq!(posts.query().count().await.unwrap(), 7);
    assert_eq!(
        posts
            .query()
            .filter(predicate::has_prefix(PostColumn::Name, "B-"))
            .order(order::desc(PostColumn::Name))
            .count()
            .await
            .unwrap(),
        4
    );
    assert_eq!(posts.query().limit(5).count().await.unwrap(), 5);
}

#[tokio::test]
async fn limit_and_offset_page_through_rows() {
    let client = setup().await;
    user_with_posts(&client, "A", 5).await;

    let page: Vec<String> = client
        .post()
        .query()
        .order(order::asc(PostColumn::Name))
        .offset(1)
        .limit(2)
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(page, ["A-1", "A-2"]);

    let tail: Vec<String> = client
        .post()
        .query()
        .order_by("name", Order::Asc)
        .offset(3)
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(tail, ["A-3", "A-4"]);
}

#[tokio::test]
async fn statement_timeout_cancels_slow_queries() {
    helpers::init_logger();
    let conn = blog::schema::open_in_memory().await.unwrap();
    let config = Config::default().with_statement_timeout(Duration::from_millis(1));
    let client = Client::with_config(conn, config);

    let slow = Statement::from_string(
        DbBackend::Sqlite,
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 10000000) \
         SELECT count(*) FROM c",
    );
    let err = client.driver().query(slow).await.unwrap_err();
    assert!(matches!(err, LumenError::Timeout { after } if after == Duration::from_millis(1)), "{:?}", err);
}

#[tokio::test]
async fn boolean_combinators() {
    let client = setup().await;
    for name in ["ann", "bob", "carl", "dora"] {
        create_user(&client, name).await;
    }

    let mut names: Vec<String> = client
        .user()
        .query()
        .filter(predicate::or(vec![
            predicate::eq(UserColumn::Name, "ann"),
            predicate::contains(UserColumn::Name, "ar"),
        ]))
        .select([UserColumn::Name])
        .values()
        .await
        .unwrap();
    names.sort();
    assert_eq!(names, ["ann", "carl"]);

    let rest = client
        .user()
        .query()
        .filter(predicate::not(predicate::is_in(
            UserColumn::Name,
            ["ann", "bob"],
        )))
        .count()
        .await
        .unwrap();
    assert_eq!(rest, 2);
}

#[tokio::test]
async fn projections_scan_custom_rows() {
    let client = setup().await;
    create_user(&client, "A").await;

    let rows: Vec<NameOnly> = client
        .user()
        .query()
        .select([UserColumn::Name])
        .scan()
        .await
        .unwrap();
    assert_eq!(rows[0].name, "A");

    let users = client
        .user()
        .query()
        .select([UserColumn::Name])
        .all()
        .await
        .unwrap();
    assert!(users[0].id > 0);
    assert_eq!(users[0].name, "A");
}

#[tokio::test]
async fn group_by_with_aggregates() {
    let client = setup().await;
    let a = user_with_posts(&client, "A", 3).await;
    let b = user_with_posts(&client, "B", 1).await;

    let mut rows: Vec<PostsPerUser> = client
        .post()
        .query()
        .group_by([PostColumn::UserId])
        .aggregate(aggregate::count())
        .scan()
        .await
        .unwrap();
    rows.sort_by_key(|r| r.user_id);

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].user_id, rows[0].count), (a.id, 3));
    assert_eq!((rows[1].user_id, rows[1].count), (b.id, 1));
}

#[tokio::test]
async fn unknown_columns_fail_before_any_statement() {
    let client = setup().await;

    let err = client
        .user()
        .query()
        .fields(["nickname"])
        .all()
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = client
        .user()
        .query()
        .order_by("nickname", Order::Desc)
        .all()
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = client
        .post()
        .query()
        .group_by(["user_id"])
        .aggregate(aggregate::sum("likes"))
        .statement()
        .unwrap_err();
    assert!(err.is_validation());
}
