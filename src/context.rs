use std::{
    cell::{Ref, RefCell, RefMut},
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{dev::Payload, error::ErrorInternalServerError, FromRequest, HttpMessage, HttpRequest};
use sqlx::{pool::PoolConnection, Sqlite, SqliteConnection};

use crate::{
    auth::{User, UserType},
    error::{HResult, HandlerError},
    session::Session,
};

/// Everything that lives exactly as long as one request: the exclusively
/// owned database connection, the authenticated user (if any) and the
/// decoded session. Built by the request scope middleware, dropped when
/// the request ends, never persisted.
pub struct RequestContext {
    db: Option<PoolConnection<Sqlite>>,
    pub user: Option<User>,
    pub session: Session,
}

impl RequestContext {
    pub fn new(db: PoolConnection<Sqlite>, session: Session, user: Option<User>) -> Self {
        Self {
            db: Some(db),
            user,
            session,
        }
    }

    /// Takes the connection out of the context so it returns to the pool.
    /// Returns `None` if it was already released.
    pub fn release_db(&mut self) -> Option<PoolConnection<Sqlite>> {
        self.db.take()
    }
}

/// Handler-side handle to the request context, extracted from the request
/// extensions where the request scope middleware stashed it.
#[derive(Clone)]
pub struct Ctx(Rc<RefCell<RequestContext>>);

impl Ctx {
    pub fn from_shared(inner: Rc<RefCell<RequestContext>>) -> Self {
        Self(inner)
    }

    pub fn user(&self) -> Option<User> {
        self.0.borrow().user.clone()
    }

    pub fn require_user(&self) -> HResult<User> {
        self.user().ok_or_else(|| HandlerError::from(401))
    }

    pub fn require_type(&self, minimum: UserType) -> HResult<User> {
        let user = self.require_user()?;
        if user.user_type >= minimum {
            Ok(user)
        } else {
            Err(HandlerError::from(403))
        }
    }

    /// The request's database connection. Errors with a 500 if the
    /// connection was already torn down, which no handler should observe.
    pub fn db(&self) -> HResult<RefMut<'_, SqliteConnection>> {
        RefMut::filter_map(self.0.borrow_mut(), |ctx| ctx.db.as_deref_mut())
            .map_err(|_| HandlerError::internal_error())
    }

    pub fn session(&self) -> Ref<'_, Session> {
        Ref::map(self.0.borrow(), |ctx| &ctx.session)
    }

    pub fn session_mut(&self) -> RefMut<'_, Session> {
        RefMut::map(self.0.borrow_mut(), |ctx| &mut ctx.session)
    }
}

impl FromRequest for Ctx {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Ctx>()
                .cloned()
                .ok_or_else(|| ErrorInternalServerError("request context missing")),
        )
    }
}
