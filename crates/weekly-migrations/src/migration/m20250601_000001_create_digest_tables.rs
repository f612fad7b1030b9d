use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========================================
        // PROFILES TABLE (host-app fixture)
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Profiles::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Profiles::Email).string_len(255).not_null())
                    .col(ColumnDef::new(Profiles::DisplayName).string_len(255))
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAIL_PREFERENCES TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailPreferences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailPreferences::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailPreferences::WeeklyDigestEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(EmailPreferences::Timezone)
                            .string_len(64)
                            .not_null()
                            .default("UTC"),
                    )
                    .col(
                        ColumnDef::new(EmailPreferences::PreferredDay)
                            .small_integer()
                            .not_null()
                            .default(6),
                    )
                    .col(
                        ColumnDef::new(EmailPreferences::PreferredHour)
                            .small_integer()
                            .not_null()
                            .default(20),
                    )
                    .col(
                        ColumnDef::new(EmailPreferences::WeekStartDay)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(EmailPreferences::NoActivityPolicy)
                            .string_len(32)
                            .not_null()
                            .default("brief"),
                    )
                    .col(ColumnDef::new(EmailPreferences::UnsubscribeToken).string_len(64))
                    .col(
                        ColumnDef::new(EmailPreferences::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EmailPreferences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAIL_DIGESTS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailDigests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailDigests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailDigests::UserId).uuid().not_null())
                    .col(ColumnDef::new(EmailDigests::WeekStart).date().not_null())
                    .col(
                        ColumnDef::new(EmailDigests::Status)
                            .string_len(32)
                            .not_null()
                            .default("queued"),
                    )
                    .col(ColumnDef::new(EmailDigests::MessageId).string_len(255))
                    .col(
                        ColumnDef::new(EmailDigests::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(EmailDigests::LastError).text())
                    .col(ColumnDef::new(EmailDigests::Payload).json_binary())
                    .col(
                        ColumnDef::new(EmailDigests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EmailDigests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(EmailDigests::SentAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_digests_user_id")
                            .from(EmailDigests::Table, EmailDigests::UserId)
                            .to(EmailPreferences::Table, EmailPreferences::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_digests_user_week")
                    .table(EmailDigests::Table)
                    .col(EmailDigests::UserId)
                    .col(EmailDigests::WeekStart)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAIL_EVENTS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailEvents::DigestId).uuid())
                    .col(ColumnDef::new(EmailEvents::UserId).uuid())
                    .col(
                        ColumnDef::new(EmailEvents::MessageId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailEvents::EventType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailEvents::RecipientEmail).string_len(255))
                    .col(
                        ColumnDef::new(EmailEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(EmailEvents::Raw).json_binary())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_events_digest_id")
                            .from(EmailEvents::Table, EmailEvents::DigestId)
                            .to(EmailDigests::Table, EmailDigests::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_events_message_id")
                    .table(EmailEvents::Table)
                    .col(EmailEvents::MessageId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // UNSUBSCRIBE_TOKENS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(UnsubscribeTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UnsubscribeTokens::Token)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UnsubscribeTokens::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(UnsubscribeTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(UnsubscribeTokens::UsedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_unsubscribe_tokens_user_id")
                            .from(UnsubscribeTokens::Table, UnsubscribeTokens::UserId)
                            .to(EmailPreferences::Table, EmailPreferences::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // SUPPRESSION_ENTRIES TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(SuppressionEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SuppressionEntries::Email)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SuppressionEntries::UserId).uuid())
                    .col(
                        ColumnDef::new(SuppressionEntries::Reason)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SuppressionEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ========================================
        // INSIGHTS TABLE (host-app fixture)
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Insights::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Insights::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Insights::UserId).uuid().not_null())
                    .col(ColumnDef::new(Insights::Title).string_len(255))
                    .col(ColumnDef::new(Insights::Description).text())
                    .col(ColumnDef::new(Insights::Summary).text())
                    .col(ColumnDef::new(Insights::Url).string_len(2048))
                    .col(ColumnDef::new(Insights::ImageUrl).string_len(2048))
                    .col(ColumnDef::new(Insights::Thought).text())
                    .col(
                        ColumnDef::new(Insights::Tags)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Insights::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Insights::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_insights_user_id")
                            .from(Insights::Table, Insights::UserId)
                            .to(Profiles::Table, Profiles::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_insights_user_id")
                    .table(Insights::Table)
                    .col(Insights::UserId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // STACKS TABLE (host-app fixture)
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(Stacks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Stacks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Stacks::UserId).uuid().not_null())
                    .col(ColumnDef::new(Stacks::Name).string_len(255))
                    .col(ColumnDef::new(Stacks::Description).text())
                    .col(
                        ColumnDef::new(Stacks::ItemCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Stacks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Stacks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stacks_user_id")
                            .from(Stacks::Table, Stacks::UserId)
                            .to(Profiles::Table, Profiles::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stacks_user_id")
                    .table(Stacks::Table)
                    .col(Stacks::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Stacks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Insights::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SuppressionEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UnsubscribeTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailDigests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailPreferences::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Profiles::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    UserId,
    Email,
    DisplayName,
}

#[derive(DeriveIden)]
enum EmailPreferences {
    Table,
    UserId,
    WeeklyDigestEnabled,
    Timezone,
    PreferredDay,
    PreferredHour,
    WeekStartDay,
    NoActivityPolicy,
    UnsubscribeToken,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmailDigests {
    Table,
    Id,
    UserId,
    WeekStart,
    Status,
    MessageId,
    RetryCount,
    LastError,
    Payload,
    CreatedAt,
    UpdatedAt,
    SentAt,
}

#[derive(DeriveIden)]
enum EmailEvents {
    Table,
    Id,
    DigestId,
    UserId,
    MessageId,
    EventType,
    RecipientEmail,
    OccurredAt,
    Raw,
}

#[derive(DeriveIden)]
enum UnsubscribeTokens {
    Table,
    Token,
    UserId,
    CreatedAt,
    UsedAt,
}

#[derive(DeriveIden)]
enum SuppressionEntries {
    Table,
    Email,
    UserId,
    Reason,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Insights {
    Table,
    Id,
    UserId,
    Title,
    Description,
    Summary,
    Url,
    ImageUrl,
    Thought,
    Tags,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Stacks {
    Table,
    Id,
    UserId,
    Name,
    Description,
    ItemCount,
    CreatedAt,
    UpdatedAt,
}
