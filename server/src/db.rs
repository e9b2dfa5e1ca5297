use std::{path::PathBuf, str::FromStr, time::Duration};

use async_trait::async_trait;
use shared::types::ClientId;
use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Executor, Row, SqlitePool,
};
use tracing::{info, warn};

use crate::handlers::Error;

const CONNECT_ATTEMPTS: u32 = 5;

/// SQLite extended result code for a violated `unique` constraint.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub client_id: ClientId,
    pub name: String,
    pub path: PathBuf,
    pub verified: bool,
}

/// Durable client and file metadata. Every call is a single atomic operation.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn client_exists(&self, client_id: ClientId) -> Result<bool, Error>;
    async fn name_exists(&self, name: &str) -> Result<bool, Error>;
    async fn get_name(&self, client_id: ClientId) -> Result<Option<String>, Error>;
    async fn get_public_key(&self, client_id: ClientId) -> Result<Option<Vec<u8>>, Error>;
    async fn get_symmetric_key(&self, client_id: ClientId) -> Result<Option<Vec<u8>>, Error>;
    async fn insert_client(&self, client_id: ClientId, name: &str, last_seen: i64) -> Result<(), Error>;
    async fn set_keys(
        &self,
        client_id: ClientId,
        public_key: &[u8],
        symmetric_key: &[u8],
        last_seen: i64,
    ) -> Result<(), Error>;
    async fn set_last_seen(&self, client_id: ClientId, last_seen: i64) -> Result<(), Error>;

    async fn file_exists(&self, client_id: ClientId, name: &str) -> Result<bool, Error>;
    async fn get_file(&self, client_id: ClientId, name: &str) -> Result<Option<FileRecord>, Error>;
    /// Inserts the record, or replaces path and verified flag of an existing one.
    async fn upsert_file(&self, file: &FileRecord) -> Result<(), Error>;
    async fn set_verified(&self, client_id: ClientId, name: &str, verified: bool) -> Result<(), Error>;
    async fn delete_file(&self, client_id: ClientId, name: &str) -> Result<(), Error>;
}

#[derive(Clone, Debug)]
pub struct Database {
    conn_pool: SqlitePool,
}

impl Database {
    pub async fn init(db_url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(db_url)?;

        let mut attempts = CONNECT_ATTEMPTS;
        let db = loop {
            let pool = SqlitePoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options.clone())
                .await;

            match pool {
                Ok(p) => break Self { conn_pool: p },
                Err(e) => {
                    attempts -= 1;
                    if attempts == 0 {
                        return Err(e.into());
                    }
                    warn!("connecting to database failed: {e}, will try {attempts} more times");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        };

        info!("connected to database");
        db.create_schema().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub async fn in_memory() -> Self {
        // every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let db = Self { conn_pool: pool };
        db.create_schema().await.unwrap();
        db
    }

    async fn create_schema(&self) -> Result<(), Error> {
        let result = query("select value from metadata where key = 'schema_version'")
            .fetch_optional(&self.conn_pool)
            .await;

        // errors are matched, because the metadata table might not exist yet
        match result {
            Ok(Some(_)) => Ok(()),
            Err(_) | Ok(None) => {
                info!("creating database schema");

                let schema = include_str!("schema/schema.sql");
                (&self.conn_pool).execute(schema).await?;

                query("insert into metadata (key, value) values ('schema_version', '1')")
                    .execute(&self.conn_pool)
                    .await?;

                Ok(())
            }
        }
    }
}

fn to_client_id(bytes: Vec<u8>) -> Result<ClientId, Error> {
    bytes.try_into().map_err(|_| Error::DatabaseTypeMismatch)
}

#[async_trait]
impl Repository for Database {
    async fn client_exists(&self, client_id: ClientId) -> Result<bool, Error> {
        let result = query("select id from clients where id = ?")
            .bind(client_id.to_vec())
            .fetch_optional(&self.conn_pool)
            .await
            .map(|result| result.is_some())?;

        Ok(result)
    }

    async fn name_exists(&self, name: &str) -> Result<bool, Error> {
        let result = query("select id from clients where name = ?")
            .bind(name)
            .fetch_optional(&self.conn_pool)
            .await
            .map(|result| result.is_some())?;

        Ok(result)
    }

    async fn get_name(&self, client_id: ClientId) -> Result<Option<String>, Error> {
        let row = query("select name from clients where id = ?")
            .bind(client_id.to_vec())
            .fetch_optional(&self.conn_pool)
            .await?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn get_public_key(&self, client_id: ClientId) -> Result<Option<Vec<u8>>, Error> {
        let row = query("select public_key from clients where id = ?")
            .bind(client_id.to_vec())
            .fetch_optional(&self.conn_pool)
            .await?;

        Ok(row.and_then(|row| row.get(0)))
    }

    async fn get_symmetric_key(&self, client_id: ClientId) -> Result<Option<Vec<u8>>, Error> {
        let row = query("select symmetric_key from clients where id = ?")
            .bind(client_id.to_vec())
            .fetch_optional(&self.conn_pool)
            .await?;

        Ok(row.and_then(|row| row.get(0)))
    }

    async fn insert_client(&self, client_id: ClientId, name: &str, last_seen: i64) -> Result<(), Error> {
        let result = query("insert into clients (id, name, last_seen) values (?, ?, ?)")
            .bind(client_id.to_vec())
            .bind(name)
            .bind(last_seen)
            .execute(&self.conn_pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(SQLITE_CONSTRAINT_UNIQUE) => {
                Err(Error::NameTaken(name.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_keys(
        &self,
        client_id: ClientId,
        public_key: &[u8],
        symmetric_key: &[u8],
        last_seen: i64,
    ) -> Result<(), Error> {
        let result = query("update clients set public_key = ?, symmetric_key = ?, last_seen = ? where id = ?")
            .bind(public_key)
            .bind(symmetric_key)
            .bind(last_seen)
            .bind(client_id.to_vec())
            .execute(&self.conn_pool)
            .await?;

        match result.rows_affected() {
            0 => Err(Error::ClientNotFound),
            _ => Ok(()),
        }
    }

    async fn set_last_seen(&self, client_id: ClientId, last_seen: i64) -> Result<(), Error> {
        let result = query("update clients set last_seen = ? where id = ?")
            .bind(last_seen)
            .bind(client_id.to_vec())
            .execute(&self.conn_pool)
            .await?;

        match result.rows_affected() {
            0 => Err(Error::ClientNotFound),
            _ => Ok(()),
        }
    }

    async fn file_exists(&self, client_id: ClientId, name: &str) -> Result<bool, Error> {
        let result = query("select name from files where client_id = ? and name = ?")
            .bind(client_id.to_vec())
            .bind(name)
            .fetch_optional(&self.conn_pool)
            .await
            .map(|result| result.is_some())?;

        Ok(result)
    }

    async fn get_file(&self, client_id: ClientId, name: &str) -> Result<Option<FileRecord>, Error> {
        let row = query("select client_id, name, path, verified from files where client_id = ? and name = ?")
            .bind(client_id.to_vec())
            .bind(name)
            .fetch_optional(&self.conn_pool)
            .await?;

        match row {
            Some(row) => Ok(Some(FileRecord {
                client_id: to_client_id(row.get(0))?,
                name: row.get(1),
                path: PathBuf::from(row.get::<String, usize>(2)),
                verified: row.get(3),
            })),
            None => Ok(None),
        }
    }

    async fn upsert_file(&self, file: &FileRecord) -> Result<(), Error> {
        query(
            "insert into files (client_id, name, path, verified) values (?, ?, ?, ?)
               on conflict (client_id, name) do update set path = excluded.path, verified = excluded.verified",
        )
        .bind(file.client_id.to_vec())
        .bind(&file.name)
        .bind(file.path.to_string_lossy().into_owned())
        .bind(file.verified)
        .execute(&self.conn_pool)
        .await?;

        Ok(())
    }

    async fn set_verified(&self, client_id: ClientId, name: &str, verified: bool) -> Result<(), Error> {
        let result = query("update files set verified = ? where client_id = ? and name = ?")
            .bind(verified)
            .bind(client_id.to_vec())
            .bind(name)
            .execute(&self.conn_pool)
            .await?;

        match result.rows_affected() {
            0 => Err(Error::FileNotFound),
            _ => Ok(()),
        }
    }

    async fn delete_file(&self, client_id: ClientId, name: &str) -> Result<(), Error> {
        let result = query("delete from files where client_id = ? and name = ?")
            .bind(client_id.to_vec())
            .bind(name)
            .execute(&self.conn_pool)
            .await?;

        match result.rows_affected() {
            0 => Err(Error::FileNotFound),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(client_id: ClientId, name: &str) -> FileRecord {
        FileRecord {
            client_id,
            name: name.to_owned(),
            path: PathBuf::from(format!("/blobs/{name}")),
            verified: false,
        }
    }

    #[tokio::test]
    async fn clients() {
        let db = Database::in_memory().await;
        let id = [1; 16];

        assert!(!db.client_exists(id).await.unwrap());
        db.insert_client(id, "alice", 100).await.unwrap();

        assert!(db.client_exists(id).await.unwrap());
        assert!(db.name_exists("alice").await.unwrap());
        assert!(!db.name_exists("bob").await.unwrap());
        assert_eq!(db.get_name(id).await.unwrap().as_deref(), Some("alice"));
        assert_eq!(db.get_name([2; 16]).await.unwrap(), None);

        // keys are absent until the exchange
        assert_eq!(db.get_public_key(id).await.unwrap(), None);
        assert_eq!(db.get_symmetric_key(id).await.unwrap(), None);

        db.set_keys(id, &[7; 160], &[8; 16], 200).await.unwrap();
        assert_eq!(db.get_public_key(id).await.unwrap(), Some(vec![7; 160]));
        assert_eq!(db.get_symmetric_key(id).await.unwrap(), Some(vec![8; 16]));
    }

    #[tokio::test]
    async fn duplicate_names_are_refused() {
        let db = Database::in_memory().await;

        db.insert_client([1; 16], "alice", 0).await.unwrap();
        assert!(matches!(
            db.insert_client([2; 16], "alice", 0).await,
            Err(Error::NameTaken(name)) if name == "alice"
        ));
    }

    #[tokio::test]
    async fn updates_of_unknown_rows() {
        let db = Database::in_memory().await;

        assert!(matches!(db.set_keys([1; 16], &[], &[], 0).await, Err(Error::ClientNotFound)));
        assert!(matches!(db.set_last_seen([1; 16], 0).await, Err(Error::ClientNotFound)));
        assert!(matches!(db.set_verified([1; 16], "a", true).await, Err(Error::FileNotFound)));
        assert!(matches!(db.delete_file([1; 16], "a").await, Err(Error::FileNotFound)));
    }

    #[tokio::test]
    async fn files() {
        let db = Database::in_memory().await;
        let id = [3; 16];
        db.insert_client(id, "carol", 0).await.unwrap();

        db.upsert_file(&file(id, "a.txt")).await.unwrap();
        assert!(db.file_exists(id, "a.txt").await.unwrap());
        assert!(!db.file_exists(id, "b.txt").await.unwrap());

        db.set_verified(id, "a.txt", true).await.unwrap();
        assert!(db.get_file(id, "a.txt").await.unwrap().unwrap().verified);

        // uploading again resets verification
        db.upsert_file(&file(id, "a.txt")).await.unwrap();
        assert_eq!(db.get_file(id, "a.txt").await.unwrap(), Some(file(id, "a.txt")));

        db.delete_file(id, "a.txt").await.unwrap();
        assert_eq!(db.get_file(id, "a.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let db = Database::in_memory().await;
        db.insert_client([4; 16], "dave", 0).await.unwrap();

        db.create_schema().await.unwrap();
        assert!(db.client_exists([4; 16]).await.unwrap());
    }
}
