/*

   - Create an idea (any signed-in user)
   - List recent ideas

*/

use actix_web::{
    get, post,
    web::{self, Form, ServiceConfig},
    HttpResponse,
};
use chrono::Utc;
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{context::Ctx, error::HResult};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope());
}

pub fn scope() -> actix_web::Scope {
    web::scope("/ideas").service(create_idea).service(list_ideas)
}

#[derive(Deserialize)]
pub struct CreateIdeaForm {
    text: String,
}

#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct IdeaItem {
    pub id: String,
    pub author: String,
    pub text: String,
    pub status: i64,
    pub created_at: String,
}

#[post("/create")]
async fn create_idea(ctx: Ctx, form: Form<CreateIdeaForm>) -> HResult<HttpResponse> {
    let user = ctx.require_user()?;

    let id = nanoid!();
    sqlx::query(
        "INSERT INTO ideas (id, author, text, status, created_at) VALUES (?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(&user.username)
    .bind(&form.text)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *ctx.db()?)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}

#[get("/list")]
async fn list_ideas(ctx: Ctx) -> HResult<HttpResponse> {
    let ideas: Vec<IdeaItem> = sqlx::query_as(
        "SELECT id, author, text, status, created_at FROM ideas \
         ORDER BY created_at DESC LIMIT 20",
    )
    .fetch_all(&mut *ctx.db()?)
    .await?;

    Ok(HttpResponse::Ok().json(ideas))
}
