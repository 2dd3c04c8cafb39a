use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite, SqliteConnection,
};

use crate::auth::{User, UserType};

const SCHEMA: &str = include_str!("../schema.sql");

const POOL_MAX_CONNS: u32 = 5;

pub struct Database {
    pub pool: Pool<Sqlite>,
}

impl Database {
    pub async fn connect(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_MAX_CONNS)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database. Used by the test suite; a
    /// leaked request connection makes the next acquire hang.
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// Applies `schema.sql`. Every statement in there is idempotent.
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&mut *conn).await?;
        }

        Ok(())
    }

    /// Checks a connection out of the pool for exclusive use by one
    /// request. Dropping it checks it back in.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }
}

pub async fn get_user_by_name(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT username, user_type FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(conn)
            .await?;

    Ok(row.and_then(|(username, code)| {
        UserType::from_code(code).map(|user_type| User {
            username,
            user_type,
        })
    }))
}

pub async fn get_password_hash(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(|(hash,)| hash))
}

/// Returns false when the username is already taken.
pub async fn create_user(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
    user_type: UserType,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (username, password, user_type) \
         SELECT ?, ?, ? \
         WHERE NOT EXISTS (SELECT 1 FROM users WHERE username = ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(user_type.code())
    .bind(username)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
