use async_trait::async_trait;
use salvo::{http::StatusCode, writer::Json, Depot, FlowCtrl, Handler, Request, Response};

use crate::{
    app::{
        resource::{
            base::{IdQuery, IdsQuery, RemoveMany, RemoveOne},
            place::{
                ClusterQuery, CreatePlace, KNearestQuery, NearbyQuery, PlaceFindOneQuery,
                PlaceListQuery, PlaceSearchQuery, UpdatePlace, WithinBoxQuery,
            },
        },
        use_case,
    },
    error::http::BadRequest,
};

controller!(
    FindAllPlacesController,
    SearchPlacesController,
    NearbyPlacesController,
    PlacesWithinBoxController,
    KNearestPlacesController,
    ClusterPlacesController,
    FindOnePlaceController,
    FindPlaceByIdController,
    FindPlacesByIdsController,
    PlaceExistsByIdController,
    PlacesExistByIdsController,
    CreatePlaceController,
    CreateManyPlacesController,
    UpdatePlaceController,
    UpdateManyPlacesController,
    RemovePlaceController,
    RemoveManyPlacesController,
);

/// Query-string endpoints differ only in the query type and use case.
macro_rules! query_handler {
    ($controller:ident, $query:ty, $use_case:path) => {
        #[async_trait]
        impl Handler for $controller {
            async fn handle(
                &self,
                req: &mut Request,
                _: &mut Depot,
                res: &mut Response,
                _: &mut FlowCtrl,
            ) {
                let result: Result<$query, _> = req.parse_queries().map_err(BadRequest::from);
                let query = map_res_err!(result, res);

                let result = $use_case(&self.ctx.places, query).await;
                let output = map_res_err!(result, res);

                res.render(Json(output));
                res.set_status_code(StatusCode::OK);
            }
        }
    };
}

query_handler!(FindAllPlacesController, PlaceListQuery, use_case::place::find_all);
query_handler!(SearchPlacesController, PlaceSearchQuery, use_case::place::search);
query_handler!(NearbyPlacesController, NearbyQuery, use_case::place::nearby);
query_handler!(PlacesWithinBoxController, WithinBoxQuery, use_case::place::within_box);
query_handler!(KNearestPlacesController, KNearestQuery, use_case::place::k_nearest);
query_handler!(ClusterPlacesController, ClusterQuery, use_case::place::cluster);
query_handler!(FindOnePlaceController, PlaceFindOneQuery, use_case::place::find_one);
query_handler!(FindPlacesByIdsController, IdsQuery, use_case::place::find_by_ids);
query_handler!(PlaceExistsByIdController, IdQuery, use_case::place::exists_by_id);
query_handler!(PlacesExistByIdsController, IdsQuery, use_case::place::exists_by_ids);

/// Serves both `/places/find_by_id?id=` and `/places/<id>`.
#[async_trait]
impl Handler for FindPlaceByIdController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let query = match req.params().get("id").cloned() {
            Some(id) => IdQuery { id: Some(id) },
            None => {
                let result: Result<IdQuery, _> = req.parse_queries().map_err(BadRequest::from);
                map_res_err!(result, res)
            }
        };

        let result = use_case::place::find_by_id(&self.ctx.places, query).await;
        let place = map_res_err!(result, res);

        res.render(Json(place));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for CreatePlaceController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<CreatePlace, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::place::create_one(&self.ctx.places, dto).await;
        let place = map_res_err!(result, res);

        res.render(Json(place));
        res.set_status_code(StatusCode::CREATED);
    }
}

#[async_trait]
impl Handler for CreateManyPlacesController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<Vec<CreatePlace>, _> = req.parse_body().await.map_err(BadRequest::from);
        let dtos = map_res_err!(result, res);

        let result = use_case::place::create_many(&self.ctx.places, dtos).await;
        let report = map_res_err!(result, res);

        res.render(Json(report));
        res.set_status_code(StatusCode::CREATED);
    }
}

#[async_trait]
impl Handler for UpdatePlaceController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<UpdatePlace, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::place::update_one(&self.ctx.places, dto).await;
        let place = map_res_err!(result, res);

        res.render(Json(place));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UpdateManyPlacesController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<Vec<UpdatePlace>, _> = req.parse_body().await.map_err(BadRequest::from);
        let dtos = map_res_err!(result, res);

        let result = use_case::place::update_many(&self.ctx.places, dtos).await;
        let report = map_res_err!(result, res);

        res.render(Json(report));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for RemovePlaceController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<RemoveOne, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::place::remove_one(&self.ctx.places, dto).await;
        map_res_err!(result, res);

        res.set_status_code(StatusCode::NO_CONTENT);
    }
}

#[async_trait]
impl Handler for RemoveManyPlacesController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<RemoveMany, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::place::remove_many(&self.ctx.places, dto).await;
        let removed = map_res_err!(result, res);

        res.render(Json(removed));
        res.set_status_code(StatusCode::OK);
    }
}
