use async_trait::async_trait;
use salvo::{http::StatusCode, writer::Json, Depot, FlowCtrl, Handler, Request, Response};

use crate::{
    app::{
        resource::{
            base::{IdQuery, IdsQuery, RemoveMany, RemoveOne},
            iam::{CreateUser, UpdateUser, UserFindOneQuery, UserListQuery, UserSearchQuery},
        },
        use_case,
    },
    error::http::BadRequest,
};

controller!(
    FindAllUsersController,
    SearchUsersController,
    FindOneUserController,
    FindUserByIdController,
    FindUsersByIdsController,
    UserExistsByIdController,
    UsersExistByIdsController,
    CreateUserController,
    CreateManyUsersController,
    UpdateUserController,
    UpdateManyUsersController,
    RemoveUserController,
    RemoveManyUsersController,
);

#[async_trait]
impl Handler for FindAllUsersController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<UserListQuery, _> = req.parse_queries().map_err(BadRequest::from);
        let query = map_res_err!(result, res);

        let result = use_case::iam::find_all(&self.ctx.users, query).await;
        let users = map_res_err!(result, res);

        res.render(Json(users));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for SearchUsersController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<UserSearchQuery, _> = req.parse_queries().map_err(BadRequest::from);
        let query = map_res_err!(result, res);

        let result = use_case::iam::search(&self.ctx.users, query).await;
        let users = map_res_err!(result, res);

        res.render(Json(users));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for FindOneUserController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<UserFindOneQuery, _> = req.parse_queries().map_err(BadRequest::from);
        let query = map_res_err!(result, res);

        let result = use_case::iam::find_one(&self.ctx.users, query).await;
        let user = map_res_err!(result, res);

        res.render(Json(user));
        res.set_status_code(StatusCode::OK);
    }
}

/// Serves both `/users/find_by_id?id=` and `/users/<id>`.
#[async_trait]
impl Handler for FindUserByIdController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let query = match req.params().get("id").cloned() {
            Some(id) => IdQuery { id: Some(id) },
            None => {
                let result: Result<IdQuery, _> = req.parse_queries().map_err(BadRequest::from);
                map_res_err!(result, res)
            }
        };

        let result = use_case::iam::find_by_id(&self.ctx.users, query).await;
        let user = map_res_err!(result, res);

        res.render(Json(user));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for FindUsersByIdsController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<IdsQuery, _> = req.parse_queries().map_err(BadRequest::from);
        let query = map_res_err!(result, res);

        let result = use_case::iam::find_by_ids(&self.ctx.users, query).await;
        let users = map_res_err!(result, res);

        res.render(Json(users));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UserExistsByIdController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<IdQuery, _> = req.parse_queries().map_err(BadRequest::from);
        let query = map_res_err!(result, res);

        let result = use_case::iam::exists_by_id(&self.ctx.users, query).await;
        let exists = map_res_err!(result, res);

        res.render(Json(exists));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UsersExistByIdsController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<IdsQuery, _> = req.parse_queries().map_err(BadRequest::from);
        let query = map_res_err!(result, res);

        let result = use_case::iam::exists_by_ids(&self.ctx.users, query).await;
        let exists = map_res_err!(result, res);

        res.render(Json(exists));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for CreateUserController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<CreateUser, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::iam::create_one(&self.ctx.users, &self.ctx.hasher, dto).await;
        let user = map_res_err!(result, res);

        res.render(Json(user));
        res.set_status_code(StatusCode::CREATED);
    }
}

#[async_trait]
impl Handler for CreateManyUsersController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<Vec<CreateUser>, _> = req.parse_body().await.map_err(BadRequest::from);
        let dtos = map_res_err!(result, res);

        let result = use_case::iam::create_many(&self.ctx.users, &self.ctx.hasher, dtos).await;
        let report = map_res_err!(result, res);

        res.render(Json(report));
        res.set_status_code(StatusCode::CREATED);
    }
}

#[async_trait]
impl Handler for UpdateUserController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<UpdateUser, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::iam::update_one(&self.ctx.users, dto).await;
        let user = map_res_err!(result, res);

        res.render(Json(user));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UpdateManyUsersController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<Vec<UpdateUser>, _> = req.parse_body().await.map_err(BadRequest::from);
        let dtos = map_res_err!(result, res);

        let result = use_case::iam::update_many(&self.ctx.users, dtos).await;
        let report = map_res_err!(result, res);

        res.render(Json(report));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for RemoveUserController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<RemoveOne, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::iam::remove_one(&self.ctx.users, dto).await;
        map_res_err!(result, res);

        res.set_status_code(StatusCode::NO_CONTENT);
    }
}

#[async_trait]
impl Handler for RemoveManyUsersController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<RemoveMany, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::iam::remove_many(&self.ctx.users, dto).await;
        let removed = map_res_err!(result, res);

        res.render(Json(removed));
        res.set_status_code(StatusCode::OK);
    }
}
