use huddle_core::entities::User;
use huddle_core::value_objects::Snowflake;

use crate::models::UserModel;

impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        User {
            id: Snowflake::new(model.id),
            username: model.username,
            display_name: model.display_name,
            email: model.email,
            avatar: model.avatar,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
