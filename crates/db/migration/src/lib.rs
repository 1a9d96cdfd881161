use sea_orm_migration::prelude::*;

mod columns;
mod m20250101000000_baseline;
mod m20250215000000_automation;
mod m20260227000000_idempotency_keys;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101000000_baseline::Migration),
            Box::new(m20250215000000_automation::Migration),
            Box::new(m20260227000000_idempotency_keys::Migration),
        ]
    }
}
