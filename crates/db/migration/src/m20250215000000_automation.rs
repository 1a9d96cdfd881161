use sea_orm_migration::prelude::*;

use crate::columns::{status_col, timestamp_col, timestamp_nullable_col, uuid_col, uuid_pk_col};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Workflows::Table)
                    .col(uuid_pk_col(Workflows::Id))
                    .col(ColumnDef::new(Workflows::Name).string().not_null())
                    .col(
                        ColumnDef::new(Workflows::TriggerType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Workflows::MinutesDelay)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(Workflows::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(ColumnDef::new(Workflows::Conditions).json().not_null())
                    .col(ColumnDef::new(Workflows::Actions).json().not_null())
                    .col(timestamp_col(Workflows::CreatedAt))
                    .col(timestamp_col(Workflows::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workflows_trigger_type")
                    .table(Workflows::Table)
                    .col(Workflows::TriggerType)
                    .col(Workflows::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(WorkflowRuns::Table)
                    .col(uuid_pk_col(WorkflowRuns::Id))
                    .col(uuid_col(WorkflowRuns::WorkflowId))
                    .col(
                        ColumnDef::new(WorkflowRuns::TriggerType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(WorkflowRuns::Payload).json().not_null())
                    .col(status_col(WorkflowRuns::Status, "queued"))
                    .col(ColumnDef::new(WorkflowRuns::Error).text())
                    .col(timestamp_col(WorkflowRuns::QueuedAt))
                    .col(timestamp_col(WorkflowRuns::ScheduledFor))
                    .col(timestamp_nullable_col(WorkflowRuns::FinishedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workflow_runs_workflow_id")
                            .from(WorkflowRuns::Table, WorkflowRuns::WorkflowId)
                            .to(Workflows::Table, Workflows::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workflow_runs_workflow_id")
                    .table(WorkflowRuns::Table)
                    .col(WorkflowRuns::WorkflowId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(SlaTargets::Table)
                    .col(
                        ColumnDef::new(SlaTargets::Key)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SlaTargets::Name).string().not_null())
                    .col(
                        ColumnDef::new(SlaTargets::ThresholdMinutes)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SlaTargets::WarningMinutes)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(status_col(SlaTargets::Severity, "medium"))
                    .col(
                        ColumnDef::new(SlaTargets::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(timestamp_col(SlaTargets::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(SlaIncidents::Table)
                    .col(uuid_pk_col(SlaIncidents::Id))
                    .col(
                        ColumnDef::new(SlaIncidents::TargetKey)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SlaIncidents::EntityType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(uuid_col(SlaIncidents::EntityId))
                    .col(status_col(SlaIncidents::Severity, "medium"))
                    .col(status_col(SlaIncidents::Status, "open"))
                    .col(timestamp_col(SlaIncidents::OpenedAt))
                    .col(timestamp_nullable_col(SlaIncidents::ClosedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sla_incidents_target_entity_status")
                    .table(SlaIncidents::Table)
                    .col(SlaIncidents::TargetKey)
                    .col(SlaIncidents::EntityId)
                    .col(SlaIncidents::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SlaIncidents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SlaTargets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WorkflowRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Workflows::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Workflows {
    Table,
    Id,
    Name,
    TriggerType,
    MinutesDelay,
    IsActive,
    Conditions,
    Actions,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum WorkflowRuns {
    Table,
    Id,
    WorkflowId,
    TriggerType,
    Payload,
    Status,
    Error,
    QueuedAt,
    ScheduledFor,
    FinishedAt,
}

#[derive(Iden)]
enum SlaTargets {
    Table,
    Key,
    Name,
    ThresholdMinutes,
    WarningMinutes,
    Severity,
    IsActive,
    UpdatedAt,
}

#[derive(Iden)]
enum SlaIncidents {
    Table,
    Id,
    TargetKey,
    EntityType,
    EntityId,
    Severity,
    Status,
    OpenedAt,
    ClosedAt,
}
