//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for Estimo:
//!
//! - `estimations`: the estimation record aggregate, one JSON text column per
//!   section so a corrupt section never takes the row down with it
//! - `comparables`: comparable past sales, looked up by normalized city

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Estimations {
    Table,
    Id,
    Status,
    Revision,
    CreatedAt,
    UpdatedAt,
    Identification,
    Characteristics,
    TerrainAnalysis,
    PreEstimation,
    StrategyPitch,
    Timeline,
    Photos,
}

#[derive(Iden)]
enum Comparables {
    Table,
    Id,
    City,
    CityKey,
    PostalCode,
    SurfaceM2,
    Rooms,
    SalePriceMinor,
    SoldAt,
    Luxury,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Estimations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Estimations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Estimations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Estimations::Status)
                            .string()
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Estimations::Revision)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Estimations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Estimations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Estimations::Identification).text())
                    .col(ColumnDef::new(Estimations::Characteristics).text())
                    .col(ColumnDef::new(Estimations::TerrainAnalysis).text())
                    .col(ColumnDef::new(Estimations::PreEstimation).text())
                    .col(ColumnDef::new(Estimations::StrategyPitch).text())
                    .col(ColumnDef::new(Estimations::Timeline).text())
                    .col(ColumnDef::new(Estimations::Photos).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-estimations-updated_at")
                    .table(Estimations::Table)
                    .col(Estimations::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Comparables
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Comparables::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Comparables::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Comparables::City).string().not_null())
                    .col(ColumnDef::new(Comparables::CityKey).string().not_null())
                    .col(
                        ColumnDef::new(Comparables::PostalCode)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Comparables::SurfaceM2).double().not_null())
                    .col(ColumnDef::new(Comparables::Rooms).integer().not_null())
                    .col(
                        ColumnDef::new(Comparables::SalePriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Comparables::SoldAt).date().not_null())
                    .col(
                        ColumnDef::new(Comparables::Luxury)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-comparables-city_key")
                    .table(Comparables::Table)
                    .col(Comparables::CityKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comparables::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Estimations::Table).to_owned())
            .await?;
        Ok(())
    }
}
