use std::sync::Arc;

use async_trait::async_trait;
use salvo::{Depot, FlowCtrl, Handler, Request, Response};

use super::context::AppContext;
use crate::{
    app::use_case,
    domain::entity::{iam::User, Entity},
    error::{app::ApplicationError, security::UnauthorizedError},
};

macro_rules! map_res_err {
    ($result:ident, $response:ident) => {
        match $result {
            Err(err) => {
                $response.render(err);
                return;
            }
            Ok(ok) => ok,
        }
    };
}

/// Endpoint handlers holding the shared [`AppContext`].
macro_rules! controller {
    ($($name:ident),+ $(,)?) => {
        $(
            pub struct $name {
                ctx: std::sync::Arc<crate::infra::context::AppContext>,
            }

            impl $name {
                pub fn new(ctx: std::sync::Arc<crate::infra::context::AppContext>) -> Self {
                    Self { ctx }
                }
            }
        )+
    };
}

pub mod auth;
pub mod place;
pub mod user;

const SESSION_USER: &str = "session_user";

/// Extract a authorization token from a request.
///
/// Token must be formated in the Bearer authentication scheme
/// described in [RFC 6750](https://datatracker.ietf.org/doc/html/rfc6750)
fn extract_token(req: &Request) -> Result<&str, UnauthorizedError> {
    let scheme: Option<&str> = req.header("authorization");
    scheme
        .ok_or(UnauthorizedError::TokenNotPresent)?
        .strip_prefix("Bearer ")
        .ok_or(UnauthorizedError::MalformattedToken)
}

/// User attached to the request by [`AuthGuard`].
fn session_user(depot: &Depot) -> Result<&User, ApplicationError<()>> {
    depot
        .get::<User>(SESSION_USER)
        .ok_or(ApplicationError::Unauthorized(UnauthorizedError::TokenNotPresent))
}

/// Rejects requests without a valid access token of an active user.
pub struct AuthGuard {
    ctx: Arc<AppContext>,
}

impl AuthGuard {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Handler for AuthGuard {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        let result = match extract_token(req) {
            Ok(token) => {
                use_case::auth::authenticate(&self.ctx.users, &self.ctx.encrypter, token).await
            }
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(user) => {
                tracing::debug!(user = user.id(), "request authenticated");
                depot.insert(SESSION_USER, user);
            }
            Err(err) => {
                res.render(err);
                ctrl.skip_rest();
            }
        }
    }
}
