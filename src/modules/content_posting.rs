/*

   - Post a content item (staff and above)
   - List recent content

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

use crate::{auth::UserType, context::Ctx, error::HResult};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope());
}

pub fn scope() -> actix_web::Scope {
    web::scope("/content").service(post_content).service(list_content)
}

#[derive(Deserialize)]
pub struct PostContentForm {
    title: String,
    body: String,
}

#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct ContentItem {
    pub id: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub posted_at: String,
}

#[post("/post")]
async fn post_content(ctx: Ctx, form: Form<PostContentForm>) -> HResult<HttpResponse> {
    let user = ctx.require_type(UserType::Staff)?;

    let id = nanoid!();
    sqlx::query(
        "INSERT INTO content (id, author, title, body, posted_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&user.username)
    .bind(&form.title)
    .bind(&form.body)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *ctx.db()?)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}

#[get("/list")]
async fn list_content(ctx: Ctx) -> HResult<HttpResponse> {
    let items: Vec<ContentItem> = sqlx::query_as(
        "SELECT id, author, title, body, posted_at FROM content \
         ORDER BY posted_at DESC LIMIT 20",
    )
    .fetch_all(&mut *ctx.db()?)
    .await?;

    Ok(HttpResponse::Ok().json(items))
}
