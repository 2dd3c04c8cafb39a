/*

   - Register a new account
   - Log in / log out (the session's `username` key is the login state)
   - Let a client get their own user info

*/

use actix_web::{
    get, post,
    web::{self, Data, Form, ServiceConfig},
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{self, UserType},
    config::Config,
    context::Ctx,
    crypto, db,
    error::{macros::err, HResult, HandlerError},
};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope());
}

pub fn scope() -> actix_web::Scope {
    web::scope("/users")
        .service(register)
        .service(login)
        .service(logout)
        .service(me)
}

#[derive(Deserialize)]
pub struct CredentialsForm {
    username: String,
    password: String,
}

#[post("/register")]
async fn register(ctx: Ctx, form: Form<CredentialsForm>) -> HResult<HttpResponse> {
    if form.username.is_empty() || form.password.is_empty() {
        return err!(400, "Username and password are required");
    }

    let hashed = crypto::hash(&form.password);
    let created = db::create_user(&mut *ctx.db()?, &form.username, &hashed, UserType::User).await?;

    if !created {
        return err!(409, "Username is taken");
    }

    ctx.session_mut()
        .insert(auth::USERNAME_KEY, form.username.clone());

    Ok(HttpResponse::Ok().json(json!({ "username": form.username })))
}

#[post("/login")]
async fn login(ctx: Ctx, form: Form<CredentialsForm>) -> HResult<HttpResponse> {
    let stored = db::get_password_hash(&mut *ctx.db()?, &form.username).await?;

    match stored {
        Some(hash) if crypto::verify(&form.password, &hash) => {
            ctx.session_mut()
                .insert(auth::USERNAME_KEY, form.username.clone());

            Ok(HttpResponse::Ok().json(json!({ "username": form.username })))
        }
        _ => Err(HandlerError::with_code(
            401,
            "Invalid username or password".into(),
        )),
    }
}

#[post("/logout")]
async fn logout(ctx: Ctx) -> HResult<HttpResponse> {
    ctx.session_mut().remove(auth::USERNAME_KEY);

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

// Let a client get their own user info
#[get("/me")]
async fn me(ctx: Ctx, config: Data<Config>) -> HResult<HttpResponse> {
    let user = ctx.require_user()?;

    Ok(HttpResponse::Ok().json(json!({
        "username": user.username,
        "user_type": user.user_type,
        "label": config.user_type_label(user.user_type),
    })))
}
