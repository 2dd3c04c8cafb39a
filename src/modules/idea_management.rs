/*

   - Update an idea's status (staff and above)
   - Delete an idea (staff and above)

*/

use actix_web::{
    post,
    web::{self, Form, Path, ServiceConfig},
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::UserType,
    context::Ctx,
    error::{macros::err, HResult},
};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope());
}

pub fn scope() -> actix_web::Scope {
    web::scope("/manage").service(set_status).service(delete_idea)
}

#[derive(Deserialize)]
pub struct StatusForm {
    status: i64,
}

#[post("/ideas/{id}/status")]
async fn set_status(ctx: Ctx, path: Path<String>, form: Form<StatusForm>) -> HResult<HttpResponse> {
    ctx.require_type(UserType::Staff)?;

    let id = path.into_inner();
    let result = sqlx::query("UPDATE ideas SET status = ? WHERE id = ?")
        .bind(form.status)
        .bind(&id)
        .execute(&mut *ctx.db()?)
        .await?;

    if result.rows_affected() == 0 {
        return err!(404, "No such idea");
    }

    Ok(HttpResponse::Ok().json(json!({ "id": id, "status": form.status })))
}

#[post("/ideas/{id}/delete")]
async fn delete_idea(ctx: Ctx, path: Path<String>) -> HResult<HttpResponse> {
    ctx.require_type(UserType::Staff)?;

    let id = path.into_inner();
    let result = sqlx::query("DELETE FROM ideas WHERE id = ?")
        .bind(&id)
        .execute(&mut *ctx.db()?)
        .await?;

    if result.rows_affected() == 0 {
        return err!(404, "No such idea");
    }

    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}
