use sea_orm::sea_query::{Alias, ColumnDef, ForeignKey, ForeignKeyAction, Table};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};

/// Opens a private in-memory SQLite database holding the blog tables.
///
/// The pool is capped at one connection: every SQLite memory connection is its
/// own database.
pub async fn open_in_memory() -> Result<DatabaseConnection, DbErr> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opts).await?;
    create_tables(&conn).await?;
    Ok(conn)
}

pub async fn create_tables(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();

    let users = Table::create()
        .table(Alias::new("users"))
        .if_not_exists()
        .col(
            ColumnDef::new(Alias::new("id"))
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Alias::new("name")).string().not_null())
        .to_owned();
    conn.execute(backend.build(&users)).await?;

    let posts = Table::create()
        .table(Alias::new("posts"))
        .if_not_exists()
        .col(
            ColumnDef::new(Alias::new("id"))
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Alias::new("name")).string().not_null())
        .col(ColumnDef::new(Alias::new("user_id")).integer().not_null())
        .foreign_key(
            ForeignKey::create()
                .name("fk_posts_user_id")
                .from(Alias::new("posts"), Alias::new("user_id"))
                .to(Alias::new("users"), Alias::new("id"))
                .on_delete(ForeignKeyAction::NoAction),
        )
        .to_owned();
    conn.execute(backend.build(&posts)).await?;

    log::debug!(target: "blog::schema", "created users and posts tables");
    Ok(())
}
