use actix_web::{
    get,
    http::header::ContentType,
    web::{Data, ServiceConfig},
    HttpResponse,
};
use log::debug;

use crate::{config::Config, context::Ctx, csrf, error::HResult};

pub mod content_posting;
pub mod idea_building;
pub mod idea_management;
pub mod user_management;

/// A module contributes its routes through a plain function, so the set of
/// modules is fixed once the server is built.
pub type ModuleRoutes = fn(&mut ServiceConfig);

/// All feature modules, by name. Route prefixes are disjoint by
/// convention; the registry makes no precedence promises beyond
/// registration order.
pub static MODULES: &[(&str, ModuleRoutes)] = &[
    ("content_posting", content_posting::configure),
    ("idea_building", idea_building::configure),
    ("idea_management", idea_management::configure),
    ("user_management", user_management::configure),
];

pub fn configure_all(cfg: &mut ServiceConfig) {
    cfg.service(index);

    for (name, routes) in MODULES {
        debug!("registering module `{}`", name);
        routes(cfg);
    }
}

// Default landing view. The real templating lives elsewhere; this only has
// to exercise the rendering globals (csrf token, user type labels).
#[get("/")]
async fn index(ctx: Ctx, config: Data<Config>) -> HResult<HttpResponse> {
    let token = csrf::token(&mut ctx.session_mut(), &config, &mut rand::thread_rng());

    let greeting = match ctx.user() {
        Some(user) => format!(
            "Signed in as {} ({})",
            user.username,
            config.user_type_label(user.user_type)
        ),
        None => "Browsing anonymously".to_owned(),
    };

    let html = format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>ideawheel</title></head>\n\
         <body>\n\
         <h1>ideawheel</h1>\n\
         <p>{greeting}</p>\n\
         <form method=\"post\" action=\"/ideas/create\">\n\
         <input type=\"hidden\" name=\"{field}\" value=\"{token}\">\n\
         <input type=\"text\" name=\"text\" placeholder=\"Share an idea\">\n\
         <button type=\"submit\">Post</button>\n\
         </form>\n\
         </body>\n\
         </html>\n",
        field = csrf::CSRF_FORM_FIELD,
    );

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(html))
}
