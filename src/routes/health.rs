use actix_web::{web, HttpResponse};
use diesel::prelude::*;

use crate::db::DbPool;

pub async fn health(pool: web::Data<DbPool>) -> HttpResponse {
    let database = match pool.get() {
        Ok(mut conn) => diesel::sql_query("SELECT 1").execute(&mut conn).is_ok(),
        Err(_) => false,
    };

    let body = serde_json::json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
    });

    if database {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
