use sea_orm_migration::prelude::*;

use crate::columns::{
    status_col, timestamp_col, timestamp_nullable_col, uuid_col, uuid_nullable_col, uuid_pk_col,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Users::Table)
                    .col(uuid_pk_col(Users::Id))
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::FullName).string().not_null())
                    .col(ColumnDef::new(Users::Phone).string())
                    .col(status_col(Users::Role, "customer"))
                    .col(ColumnDef::new(Users::AvatarUrl).string())
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Pets::Table)
                    .col(uuid_pk_col(Pets::Id))
                    .col(uuid_col(Pets::OwnerId))
                    .col(ColumnDef::new(Pets::Name).string().not_null())
                    .col(ColumnDef::new(Pets::Species).string().not_null())
                    .col(ColumnDef::new(Pets::Breed).string())
                    .col(ColumnDef::new(Pets::WeightKg).double())
                    .col(ColumnDef::new(Pets::BirthDate).date())
                    .col(ColumnDef::new(Pets::Notes).text())
                    .col(ColumnDef::new(Pets::PhotoUrl).string())
                    .col(timestamp_col(Pets::CreatedAt))
                    .col(timestamp_col(Pets::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pets_owner_id")
                            .from(Pets::Table, Pets::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pets_owner_id")
                    .table(Pets::Table)
                    .col(Pets::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Services::Table)
                    .col(uuid_pk_col(Services::Id))
                    .col(ColumnDef::new(Services::Name).string().not_null())
                    .col(ColumnDef::new(Services::Description).text())
                    .col(
                        ColumnDef::new(Services::PriceCents)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(Services::DurationMinutes)
                            .integer()
                            .not_null()
                            .default(Expr::val(30)),
                    )
                    .col(
                        ColumnDef::new(Services::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(timestamp_col(Services::CreatedAt))
                    .col(timestamp_col(Services::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Appointments::Table)
                    .col(uuid_pk_col(Appointments::Id))
                    .col(uuid_col(Appointments::CustomerId))
                    .col(uuid_col(Appointments::PetId))
                    .col(uuid_nullable_col(Appointments::StaffId))
                    .col(
                        ColumnDef::new(Appointments::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Appointments::DurationMinutes)
                            .integer()
                            .not_null()
                            .default(Expr::val(60)),
                    )
                    .col(
                        ColumnDef::new(Appointments::TotalPriceCents)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(status_col(Appointments::Status, "pending"))
                    .col(ColumnDef::new(Appointments::Notes).text())
                    .col(ColumnDef::new(Appointments::InternalNotes).text())
                    .col(timestamp_col(Appointments::CreatedAt))
                    .col(timestamp_col(Appointments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointments_customer_id")
                            .from(Appointments::Table, Appointments::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointments_pet_id")
                            .from(Appointments::Table, Appointments::PetId)
                            .to(Pets::Table, Pets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointments_staff_id")
                            .from(Appointments::Table, Appointments::StaffId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_appointments_customer_id", Appointments::CustomerId),
            ("idx_appointments_staff_id", Appointments::StaffId),
            ("idx_appointments_scheduled_at", Appointments::ScheduledAt),
            ("idx_appointments_status", Appointments::Status),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Appointments::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(AppointmentServices::Table)
                    .col(uuid_pk_col(AppointmentServices::Id))
                    .col(uuid_col(AppointmentServices::AppointmentId))
                    .col(uuid_col(AppointmentServices::ServiceId))
                    .col(
                        ColumnDef::new(AppointmentServices::PriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AppointmentServices::DurationMinutes)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointment_services_appointment_id")
                            .from(
                                AppointmentServices::Table,
                                AppointmentServices::AppointmentId,
                            )
                            .to(Appointments::Table, Appointments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointment_services_service_id")
                            .from(AppointmentServices::Table, AppointmentServices::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_appointment_services_appointment_service")
                    .table(AppointmentServices::Table)
                    .col(AppointmentServices::AppointmentId)
                    .col(AppointmentServices::ServiceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Payments::Table)
                    .col(uuid_pk_col(Payments::Id))
                    .col(uuid_col(Payments::AppointmentId))
                    .col(uuid_col(Payments::CustomerId))
                    .col(ColumnDef::new(Payments::AmountCents).big_integer().not_null())
                    .col(status_col(Payments::Method, "card"))
                    .col(status_col(Payments::Status, "pending"))
                    .col(ColumnDef::new(Payments::Reference).string())
                    .col(timestamp_col(Payments::CreatedAt))
                    .col(timestamp_col(Payments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_appointment_id")
                            .from(Payments::Table, Payments::AppointmentId)
                            .to(Appointments::Table, Appointments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_customer_id")
                            .from(Payments::Table, Payments::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payments_appointment_id")
                    .table(Payments::Table)
                    .col(Payments::AppointmentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Conversations::Table)
                    .col(uuid_pk_col(Conversations::Id))
                    .col(uuid_col(Conversations::CustomerId))
                    .col(ColumnDef::new(Conversations::Subject).string())
                    .col(
                        ColumnDef::new(Conversations::AwaitingReply)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_col(Conversations::LastMessageAt))
                    .col(timestamp_col(Conversations::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_conversations_customer_id")
                            .from(Conversations::Table, Conversations::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Messages::Table)
                    .col(uuid_pk_col(Messages::Id))
                    .col(uuid_col(Messages::ConversationId))
                    .col(uuid_col(Messages::SenderId))
                    .col(status_col(Messages::SenderRole, "customer"))
                    .col(ColumnDef::new(Messages::Body).text().not_null())
                    .col(timestamp_nullable_col(Messages::ReadAt))
                    .col(timestamp_col(Messages::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_conversation_id")
                            .from(Messages::Table, Messages::ConversationId)
                            .to(Conversations::Table, Conversations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_sender_id")
                            .from(Messages::Table, Messages::SenderId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_messages_conversation_id")
                    .table(Messages::Table)
                    .col(Messages::ConversationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(StaffAvailability::Table)
                    .col(uuid_pk_col(StaffAvailability::Id))
                    .col(uuid_col(StaffAvailability::StaffId))
                    .col(ColumnDef::new(StaffAvailability::DayOfWeek).integer().not_null())
                    .col(
                        ColumnDef::new(StaffAvailability::StartMinute)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StaffAvailability::EndMinute).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_staff_availability_staff_id")
                            .from(StaffAvailability::Table, StaffAvailability::StaffId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_staff_availability_staff_day")
                    .table(StaffAvailability::Table)
                    .col(StaffAvailability::StaffId)
                    .col(StaffAvailability::DayOfWeek)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Notifications::Table)
                    .col(uuid_pk_col(Notifications::Id))
                    .col(uuid_col(Notifications::UserId))
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Body).text().not_null())
                    .col(
                        ColumnDef::new(Notifications::Category)
                            .string_len(64)
                            .not_null()
                            .default(Expr::val("general")),
                    )
                    .col(ColumnDef::new(Notifications::Metadata).json().not_null())
                    .col(status_col(Notifications::Status, "new"))
                    .col(timestamp_nullable_col(Notifications::SnoozedUntil))
                    .col(timestamp_col(Notifications::CreatedAt))
                    .col(timestamp_col(Notifications::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user_id")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_user_status")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(NotificationPreferences::Table)
                    .col(uuid_pk_col(NotificationPreferences::Id))
                    .col(uuid_col(NotificationPreferences::UserId))
                    .col(
                        ColumnDef::new(NotificationPreferences::Category)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(status_col(NotificationPreferences::Channel, "in_app"))
                    .col(
                        ColumnDef::new(NotificationPreferences::Enabled)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(timestamp_col(NotificationPreferences::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_preferences_user_id")
                            .from(
                                NotificationPreferences::Table,
                                NotificationPreferences::UserId,
                            )
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notification_preferences_user_category_channel")
                    .table(NotificationPreferences::Table)
                    .col(NotificationPreferences::UserId)
                    .col(NotificationPreferences::Category)
                    .col(NotificationPreferences::Channel)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationPreferences::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StaffAvailability::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Conversations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppointmentServices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Appointments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Services::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    FullName,
    Phone,
    Role,
    AvatarUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Pets {
    Table,
    Id,
    OwnerId,
    Name,
    Species,
    Breed,
    WeightKg,
    BirthDate,
    Notes,
    PhotoUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Services {
    Table,
    Id,
    Name,
    Description,
    PriceCents,
    DurationMinutes,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
enum Appointments {
    Table,
    Id,
    CustomerId,
    PetId,
    StaffId,
    ScheduledAt,
    DurationMinutes,
    TotalPriceCents,
    Status,
    Notes,
    InternalNotes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum AppointmentServices {
    Table,
    Id,
    AppointmentId,
    ServiceId,
    PriceCents,
    DurationMinutes,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    AppointmentId,
    CustomerId,
    AmountCents,
    Method,
    Status,
    Reference,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Conversations {
    Table,
    Id,
    CustomerId,
    Subject,
    AwaitingReply,
    LastMessageAt,
    CreatedAt,
}

#[derive(Iden)]
enum Messages {
    Table,
    Id,
    ConversationId,
    SenderId,
    SenderRole,
    Body,
    ReadAt,
    CreatedAt,
}

#[derive(Iden)]
enum StaffAvailability {
    Table,
    Id,
    StaffId,
    DayOfWeek,
    StartMinute,
    EndMinute,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Title,
    Body,
    Category,
    Metadata,
    Status,
    SnoozedUntil,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum NotificationPreferences {
    Table,
    Id,
    UserId,
    Category,
    Channel,
    Enabled,
    UpdatedAt,
}
