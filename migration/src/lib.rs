pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_store;
mod m20250901_000002_create_coupons;
mod m20250902_000001_create_directory;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_store::Migration),
            Box::new(m20250901_000002_create_coupons::Migration),
            Box::new(m20250902_000001_create_directory::Migration),
        ]
    }
}
