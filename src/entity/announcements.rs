use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "announcements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub message: String,
    pub scheduled_at: DateTimeWithTimeZone,
    #[sea_orm(column_type = "JsonBinary")]
    pub product_ids: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub collage_images: Json,
    pub is_sent: bool,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub sent_count: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
