use std::{
    cell::RefCell,
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    http::{header, Method},
    web::{self, Data},
    Error, HttpMessage, ResponseError,
};
use futures::{future::LocalBoxFuture, StreamExt};
use log::{debug, error};

use crate::{
    auth,
    config::Config,
    context::{Ctx, RequestContext},
    csrf,
    db::{self, Database},
    error::HandlerError,
    session::Session,
};

/// Upper bound on buffered form bodies when looking for the CSRF field.
const FORM_BUFFER_LIMIT: usize = 64 * 1024;

/// Middleware that brackets every request:
///
/// 1. checks a database connection out of the pool (exclusive to this
///    request),
/// 2. decodes the session cookie,
/// 3. loads the user the session names, if any,
/// 4. enforces CSRF on mutating methods before any handler runs,
/// 5. dispatches, and
/// 6. unconditionally releases the connection and writes the session
///    cookie back if it was mutated.
///
/// The release in step 6 happens on every exit path: normal completion,
/// a handler error and a CSRF rejection all converge on the same teardown.
pub struct RequestScope;

impl<S, B> Transform<S, ServiceRequest> for RequestScope
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequestScopeMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestScopeMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestScopeMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestScopeMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let config = req
                .app_data::<Data<Config>>()
                .cloned()
                .ok_or_else(|| ErrorInternalServerError("app config missing"))?;
            let database = req
                .app_data::<Data<Database>>()
                .cloned()
                .ok_or_else(|| ErrorInternalServerError("database missing"))?;

            // nothing below may run without a connection; a failure here
            // aborts the request before any handler is reached
            let mut conn = database.acquire().await.map_err(|e| {
                error!("failed to open database connection: {}", e);
                HandlerError::internal_error()
            })?;

            let mut session = Session::from_request(req.request(), &config.secret_key);

            let user = match session.get(auth::USERNAME_KEY) {
                Some(name) => db::get_user_by_name(&mut conn, name)
                    .await
                    .map_err(HandlerError::from)?,
                None => None,
            };

            let guarded = is_mutating(req.method()) && !config.testing;

            let csrf_outcome = if guarded {
                let submitted = read_form_token(&mut req).await?;
                csrf::validate(&mut session, submitted.as_deref())
            } else {
                Ok(())
            };

            let ctx = Rc::new(RefCell::new(RequestContext::new(conn, session, user)));
            req.extensions_mut().insert(Ctx::from_shared(Rc::clone(&ctx)));

            let res = match csrf_outcome {
                Ok(()) => service
                    .call(req)
                    .await
                    .map(|res| res.map_into_left_body()),
                Err(denied) => {
                    debug!("csrf validation failed, rejecting without dispatch");
                    let response = denied.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            };

            // teardown: the connection is taken out of the context and
            // dropped exactly once, whatever happened above
            drop(ctx.borrow_mut().release_db());

            match res {
                Ok(mut res) => {
                    let context = ctx.borrow();
                    if context.session.is_dirty() {
                        let cookie = context.session.to_cookie(&config.secret_key);
                        res.response_mut()
                            .add_cookie(&cookie)
                            .map_err(ErrorInternalServerError)?;
                    }
                    Ok(res)
                }
                Err(e) => Err(e),
            }
        })
    }
}

fn is_mutating(method: &Method) -> bool {
    method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE
}

/// Buffers a urlencoded form body and pulls the CSRF field out of it, then
/// hands the bytes back to the request so `web::Form` extractors still
/// work downstream.
async fn read_form_token(req: &mut ServiceRequest) -> Result<Option<String>, Error> {
    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if !is_form {
        return Ok(None);
    }

    let mut payload = req.take_payload();
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            error!("failed to read request body: {}", e);
            HandlerError::with_code(400, "Failed to read request body".into())
        })?;
        if body.len() + chunk.len() > FORM_BUFFER_LIMIT {
            return Err(HandlerError::with_code(413, "Form body too large".into()).into());
        }
        body.extend_from_slice(&chunk);
    }
    let body = body.freeze();

    let token = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body)
        .unwrap_or_default()
        .into_iter()
        .find(|(name, _)| name == csrf::CSRF_FORM_FIELD)
        .map(|(_, value)| value);

    let (_, mut restored) = actix_http::h1::Payload::create(true);
    restored.unread_data(body);
    req.set_payload(Payload::from(restored));

    Ok(token)
}
