//! Category tags attached to a scope.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::util;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scope_categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub scope_id: String,
    pub category: String,
    pub category_key: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scopes::Entity",
        from = "Column::ScopeId",
        to = "super::scopes::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Scope,
}

impl Related<super::scopes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scope.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Builds the rows for a scope's tag set.
pub(crate) fn rows_for(scope_id: Uuid, categories: &[String]) -> Vec<ActiveModel> {
    categories
        .iter()
        .map(|category| ActiveModel {
            id: ActiveValue::Set(Uuid::now_v7().to_string()),
            scope_id: ActiveValue::Set(scope_id.to_string()),
            category: ActiveValue::Set(category.clone()),
            category_key: ActiveValue::Set(util::category_key(category)),
        })
        .collect()
}
