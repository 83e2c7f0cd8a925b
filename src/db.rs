use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("board_db")]
pub struct BoardDb(sqlx::PgPool);
