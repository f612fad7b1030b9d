pub use sea_orm;

mod connection;
pub use connection::{establish_connection, DbConnection};

mod repository;
pub use repository::{DigestUpdate, PreferenceUpdate, Repository, SendableUser};

mod sea_orm_repository;
pub use sea_orm_repository::SeaOrmRepository;

pub mod test_utils;

#[cfg(test)]
mod tests {
    use super::test_utils::TestDatabase;

    #[tokio::test]
    async fn can_connect_and_migrate() {
        let _db = TestDatabase::new().await.with_migrations().await;
    }
}
