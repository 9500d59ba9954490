pub mod context;
pub mod controller;
pub mod database;
#[cfg(test)]
pub mod memory;
pub mod service;

pub mod router {
    use std::sync::Arc;

    use salvo::{
        cors::Cors,
        logging::Logger,
        prelude::empty_handler,
        routing::PathFilter,
        Router,
    };

    use super::{
        context::AppContext,
        controller::{auth::*, place::*, user::*, AuthGuard},
    };
    use crate::config::env_var::EnvVar;

    fn cors(env: &EnvVar) -> Cors {
        let builder = Cors::builder()
            .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allow_headers(vec!["authorization", "content-type"]);

        if env.cors_allow_all_origins {
            builder.allow_any_origin().build()
        } else {
            builder
                .allow_origins(env.cors_allowed_origins.iter().map(String::as_str))
                .build()
        }
    }

    fn auth(ctx: &Arc<AppContext>) -> Router {
        Router::with_path("auth")
            .push(Router::with_path("login_credentials").post(LoginCredentialsController::new(ctx.clone())))
            .push(
                Router::with_path("register_credentials")
                    .post(RegisterCredentialsController::new(ctx.clone())),
            )
            .push(Router::with_path("access_token").post(AccessTokenController::new(ctx.clone())))
            .push(Router::with_path("refresh_token").post(RefreshTokenController::new(ctx.clone())))
            .push(Router::with_path("verify_token").post(VerifyTokenController::new(ctx.clone())))
            .push(
                Router::with_path("forgot_password")
                    .post(ForgotPasswordController::new(ctx.clone())),
            )
            .push(Router::with_path("reset_password").post(ResetPasswordController::new(ctx.clone())))
            .push(
                Router::new()
                    .hoop(AuthGuard::new(ctx.clone()))
                    .push(Router::with_path("logout").post(LogoutController::new(ctx.clone())))
                    .push(
                        Router::with_path("change_password")
                            .post(ChangePasswordController::new(ctx.clone())),
                    )
                    .push(
                        Router::with_path("user")
                            .get(UserDetailsController::new(ctx.clone()))
                            .put(UpdateProfileController::new(ctx.clone())),
                    ),
            )
    }

    fn users(ctx: &Arc<AppContext>) -> Router {
        Router::with_path("users")
            .hoop(AuthGuard::new(ctx.clone()))
            .get(FindAllUsersController::new(ctx.clone()))
            .push(Router::with_path("filter").get(FindAllUsersController::new(ctx.clone())))
            .push(Router::with_path("search").get(SearchUsersController::new(ctx.clone())))
            .push(Router::with_path("find_one").get(FindOneUserController::new(ctx.clone())))
            .push(Router::with_path("find_by_id").get(FindUserByIdController::new(ctx.clone())))
            .push(Router::with_path("find_by_ids").get(FindUsersByIdsController::new(ctx.clone())))
            .push(Router::with_path("exists_by_id").get(UserExistsByIdController::new(ctx.clone())))
            .push(
                Router::with_path("exists_by_ids").get(UsersExistByIdsController::new(ctx.clone())),
            )
            .push(Router::with_path("create_one").post(CreateUserController::new(ctx.clone())))
            .push(Router::with_path("create_many").post(CreateManyUsersController::new(ctx.clone())))
            .push(Router::with_path("update_one").put(UpdateUserController::new(ctx.clone())))
            .push(Router::with_path("update_many").put(UpdateManyUsersController::new(ctx.clone())))
            .push(Router::with_path("remove_one").delete(RemoveUserController::new(ctx.clone())))
            .push(
                Router::with_path("remove_many").delete(RemoveManyUsersController::new(ctx.clone())),
            )
            .push(Router::with_path("<id:int>").get(FindUserByIdController::new(ctx.clone())))
    }

    fn places(ctx: &Arc<AppContext>) -> Router {
        Router::with_path("places")
            .get(FindAllPlacesController::new(ctx.clone()))
            .push(Router::with_path("filter").get(FindAllPlacesController::new(ctx.clone())))
            .push(Router::with_path("search").get(SearchPlacesController::new(ctx.clone())))
            .push(Router::with_path("nearby").get(NearbyPlacesController::new(ctx.clone())))
            .push(Router::with_path("within_box").get(PlacesWithinBoxController::new(ctx.clone())))
            .push(Router::with_path("k_nearest").get(KNearestPlacesController::new(ctx.clone())))
            .push(Router::with_path("cluster").get(ClusterPlacesController::new(ctx.clone())))
            .push(Router::with_path("find_one").get(FindOnePlaceController::new(ctx.clone())))
            .push(Router::with_path("find_by_id").get(FindPlaceByIdController::new(ctx.clone())))
            .push(Router::with_path("find_by_ids").get(FindPlacesByIdsController::new(ctx.clone())))
            .push(Router::with_path("exists_by_id").get(PlaceExistsByIdController::new(ctx.clone())))
            .push(
                Router::with_path("exists_by_ids")
                    .get(PlacesExistByIdsController::new(ctx.clone())),
            )
            .push(
                Router::new()
                    .hoop(AuthGuard::new(ctx.clone()))
                    .push(Router::with_path("create_one").post(CreatePlaceController::new(ctx.clone())))
                    .push(
                        Router::with_path("create_many")
                            .post(CreateManyPlacesController::new(ctx.clone())),
                    )
                    .push(Router::with_path("update_one").put(UpdatePlaceController::new(ctx.clone())))
                    .push(
                        Router::with_path("update_many")
                            .put(UpdateManyPlacesController::new(ctx.clone())),
                    )
                    .push(
                        Router::with_path("remove_one").delete(RemovePlaceController::new(ctx.clone())),
                    )
                    .push(
                        Router::with_path("remove_many")
                            .delete(RemoveManyPlacesController::new(ctx.clone())),
                    ),
            )
            .push(Router::with_path("<id:int>").get(FindPlaceByIdController::new(ctx.clone())))
    }

    pub fn app(ctx: Arc<AppContext>, env: &EnvVar) -> Router {
        PathFilter::register_wisp_regex(
            "int",
            regex::Regex::new("^[0-9]+$").expect("Expect a valid integer id regex"),
        );

        Router::new()
            .hoop(Logger)
            .hoop(cors(env))
            .push(auth(&ctx))
            .push(users(&ctx))
            .push(places(&ctx))
            .push(preflight())
    }

    /// Unmatched requests skip the root hoops, so preflights need a route of their own.
    fn preflight() -> Router {
        Router::with_path("<**rest>").options(empty_handler)
    }

}
