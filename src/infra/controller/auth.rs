use async_trait::async_trait;
use salvo::{http::StatusCode, writer::Json, Depot, FlowCtrl, Handler, Request, Response};

use super::session_user;
use crate::{
    app::{
        resource::{
            auth::{
                ChangePassword, ForgotPassword, LoginCredentials, RefreshTokenBody,
                RegisterCredentials, ResetPassword, UpdateProfile, VerifyTokenBody,
            },
            base::DetailResponse,
        },
        use_case,
    },
    error::http::BadRequest,
};

controller!(
    LoginCredentialsController,
    RegisterCredentialsController,
    LogoutController,
    AccessTokenController,
    RefreshTokenController,
    VerifyTokenController,
    ChangePasswordController,
    ForgotPasswordController,
    ResetPasswordController,
    UserDetailsController,
    UpdateProfileController,
);

#[async_trait]
impl Handler for LoginCredentialsController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<LoginCredentials, _> = req.parse_body().await.map_err(BadRequest::from);
        let credentials = map_res_err!(result, res);

        let result = use_case::auth::login_credentials(
            &self.ctx.users,
            &self.ctx.hasher,
            &self.ctx.encrypter,
            &self.ctx.lifetimes,
            credentials,
        )
        .await;
        let tokens = map_res_err!(result, res);

        res.render(Json(tokens));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for RegisterCredentialsController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<RegisterCredentials, _> =
            req.parse_body().await.map_err(BadRequest::from);
        let credentials = map_res_err!(result, res);

        let result = use_case::auth::register_credentials(
            &self.ctx.users,
            &self.ctx.hasher,
            &self.ctx.encrypter,
            &self.ctx.lifetimes,
            credentials,
        )
        .await;
        let tokens = map_res_err!(result, res);

        res.render(Json(tokens));
        res.set_status_code(StatusCode::CREATED);
    }
}

#[async_trait]
impl Handler for LogoutController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<RefreshTokenBody, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::auth::logout(&self.ctx.blacklist, &self.ctx.encrypter, dto).await;
        map_res_err!(result, res);

        res.render(Json(DetailResponse::new("Successfully logged out.")));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for AccessTokenController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<RefreshTokenBody, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::auth::access_token(
            &self.ctx.users,
            &self.ctx.blacklist,
            &self.ctx.encrypter,
            &self.ctx.lifetimes,
            dto,
        )
        .await;
        let token = map_res_err!(result, res);

        res.render(Json(token));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for RefreshTokenController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<LoginCredentials, _> = req.parse_body().await.map_err(BadRequest::from);
        let credentials = map_res_err!(result, res);

        let result = use_case::auth::refresh_token(
            &self.ctx.users,
            &self.ctx.hasher,
            &self.ctx.encrypter,
            &self.ctx.lifetimes,
            credentials,
        )
        .await;
        let token = map_res_err!(result, res);

        res.render(Json(token));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for VerifyTokenController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<VerifyTokenBody, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::auth::verify_token(&self.ctx.encrypter, dto);
        map_res_err!(result, res);

        res.render(Json(DetailResponse::new("Token is valid.")));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for ChangePasswordController {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        _: &mut FlowCtrl,
    ) {
        let result = session_user(depot);
        let user = map_res_err!(result, res);

        let result: Result<ChangePassword, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result =
            use_case::auth::change_password(&self.ctx.users, &self.ctx.hasher, user, dto).await;
        map_res_err!(result, res);

        res.render(Json(DetailResponse::new("New password has been saved.")));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for ForgotPasswordController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<ForgotPassword, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::auth::forgot_password(
            &self.ctx.users,
            &self.ctx.encrypter,
            &self.ctx.mailer,
            &self.ctx.lifetimes,
            &self.ctx.frontend_url,
            dto,
        )
        .await;
        map_res_err!(result, res);

        res.render(Json(DetailResponse::new("Password reset e-mail has been sent.")));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for ResetPasswordController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<ResetPassword, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::auth::reset_password(
            &self.ctx.users,
            &self.ctx.hasher,
            &self.ctx.encrypter,
            dto,
        )
        .await;
        map_res_err!(result, res);

        res.render(Json(DetailResponse::new(
            "Password has been reset with the new password.",
        )));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UserDetailsController {
    async fn handle(&self, _: &mut Request, depot: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = session_user(depot);
        let user = map_res_err!(result, res);

        res.render(Json(use_case::auth::user_details(user.clone())));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UpdateProfileController {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        _: &mut FlowCtrl,
    ) {
        let result = session_user(depot);
        let user = map_res_err!(result, res);

        let result: Result<UpdateProfile, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::auth::update_profile(&self.ctx.users, user, dto).await;
        let user = map_res_err!(result, res);

        res.render(Json(user));
        res.set_status_code(StatusCode::OK);
    }
}
