//! HTTP handler functions for the landslide risk API.

use actix_web::{HttpResponse, web};
use landslide_features::ResolveError;
use landslide_inference::{FeatureVectorBuilder, InferenceError};
use landslide_server_models::{
    ApiError, ApiGeoAttributes, ApiHealth, ApiPrediction, ApiResources, GeoQueryParams,
};

use crate::AppState;

/// `GET /health`
///
/// Reports which startup resources are available.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let resources = ApiResources {
        soil_index: state.resolver.soil_available(),
        slope_raster: state.resolver.slope_available(),
        model: state.engine.is_available(),
    };

    HttpResponse::Ok().json(ApiHealth {
        healthy: resources.all_available(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        resources,
    })
}

/// `GET /get_geo_data?lon=..&lat=..`
///
/// Returns the slope and soil type at a WGS84 position.
pub async fn get_geo_data(
    state: web::Data<AppState>,
    params: web::Query<GeoQueryParams>,
) -> HttpResponse {
    let Some((lon, lat)) = params.coordinates() else {
        return HttpResponse::BadRequest().json(ApiError::new("Missing or invalid coordinates"));
    };

    // Raster reads touch the file system.
    let resolver = state.resolver.clone();
    match web::block(move || resolver.resolve(lon, lat)).await {
        Ok(Ok(attrs)) => HttpResponse::Ok().json(ApiGeoAttributes::from(attrs)),
        Ok(Err(e)) => resolve_error_response(&e),
        Err(e) => {
            log::error!("Geo lookup task failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
        }
    }
}

fn resolve_error_response(e: &ResolveError) -> HttpResponse {
    match e {
        ResolveError::InvalidCoordinate(_) | ResolveError::InvalidGeometry(_) => {
            log::debug!("Rejected geo query: {e}");
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        ResolveError::ResourceUnavailable { .. } => {
            log::warn!("Geo query failed: {e}");
            HttpResponse::ServiceUnavailable().json(ApiError::new(e.to_string()))
        }
        ResolveError::Raster(_) => {
            log::error!("Slope sampling failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
        }
    }
}

/// `POST /predict`
///
/// Classifies a JSON object of the 15 model features. Missing fields count
/// as `0`.
pub async fn predict(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    if !state.engine.is_available() {
        return HttpResponse::ServiceUnavailable().json(ApiError::new(
            "Machine learning models are not loaded on the server",
        ));
    }

    let json: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(json) => json,
        Err(e) => {
            log::debug!("Rejected prediction body: {e}");
            return HttpResponse::BadRequest().json(ApiError::new(format!("Invalid JSON: {e}")));
        }
    };

    let result = FeatureVectorBuilder::from_json(&json)
        .and_then(|vector| state.engine.predict(&vector));

    match result {
        Ok(result) => {
            log::debug!(
                "Predicted {} ({:.4})",
                result.label,
                result.confidence
            );
            HttpResponse::Ok().json(ApiPrediction::from(result))
        }
        Err(e) => inference_error_response(&e),
    }
}

fn inference_error_response(e: &InferenceError) -> HttpResponse {
    match e {
        InferenceError::InvalidFeatureInput(_) => {
            log::debug!("Rejected prediction input: {e}");
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        InferenceError::ModelUnavailable(_) => {
            HttpResponse::ServiceUnavailable().json(ApiError::new(e.to_string()))
        }
        InferenceError::InvalidArtifact(_)
        | InferenceError::Model(_)
        | InferenceError::Io(_)
        | InferenceError::Json(_) => {
            log::error!("Prediction failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use landslide_features::{GeoFeatureResolver, Resource};
    use landslide_inference::{Classifier, FEATURE_COUNT, InferenceEngine, Scaler};
    use landslide_projection::Crs;
    use landslide_raster::{
        AffineTransform, GridPixels, PixelSource, RasterDataset, RasterError, RasterSampler,
    };
    use landslide_spatial::PolygonAttributeIndex;
    use serde_json::{Value, json};

    use super::*;

    const SOIL: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "SNUM": 523 },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-98.0, 29.0], [-97.0, 29.0], [-97.0, 30.0], [-98.0, 30.0], [-98.0, 29.0]]]
            }
        }]
    }"#;

    struct BrokenPixels;

    impl PixelSource for BrokenPixels {
        fn read_pixel(&self, _row: u32, _col: u32) -> Result<f64, RasterError> {
            Err(RasterError::Io(std::io::Error::other("disk gone")))
        }
    }

    fn soil() -> Resource<PolygonAttributeIndex> {
        Resource::Loaded(Arc::new(
            PolygonAttributeIndex::from_geojson_str(SOIL, "SNUM", Crs::WGS84).unwrap(),
        ))
    }

    /// 2x2 geographic raster over lon -98..-97, lat 29..30.
    fn slope(pixels: Box<dyn PixelSource>) -> Resource<RasterSampler> {
        let dataset = RasterDataset::new(
            Crs::WGS84,
            AffineTransform::north_up(-98.0, 30.0, 0.5, -0.5).unwrap(),
            2,
            2,
            Some(-9999.0),
        )
        .unwrap();
        Resource::Loaded(Arc::new(RasterSampler::new(dataset, pixels)))
    }

    fn grid() -> Box<dyn PixelSource> {
        Box::new(GridPixels::new(2, 2, vec![1.5, 2.5, 4.7, -9999.0]).unwrap())
    }

    fn engine() -> InferenceEngine {
        let mut coef = vec![0.0; FEATURE_COUNT];
        coef[0] = 0.5;
        InferenceEngine::new(
            Scaler::identity(),
            Classifier::LogisticRegression {
                coef,
                intercept: -1.0,
            },
        )
        .unwrap()
    }

    fn state(
        soil: Resource<PolygonAttributeIndex>,
        slope: Resource<RasterSampler>,
        engine: InferenceEngine,
    ) -> AppState {
        AppState::new(GeoFeatureResolver::new(soil, slope), engine)
    }

    fn healthy_state() -> AppState {
        state(soil(), slope(grid()), engine())
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::configure),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = resp.status();
        (status, test::read_body_json(resp).await)
    }

    async fn post(state: AppState, body: &'static str) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/predict")
            .insert_header(("content-type", "application/json"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        (status, test::read_body_json(resp).await)
    }

    #[actix_web::test]
    async fn geo_data_inside_both_layers() {
        let (status, body) = get(healthy_state(), "/get_geo_data?lon=-97.75&lat=29.25").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "slope": 4.7, "soil_type": "523" }));
    }

    #[actix_web::test]
    async fn geo_data_nodata_and_outside() {
        let (status, body) = get(healthy_state(), "/get_geo_data?lon=-97.25&lat=29.25").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "slope": null, "soil_type": "523" }));

        let (status, body) = get(healthy_state(), "/get_geo_data?lon=10&lat=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "slope": null, "soil_type": "Unknown" }));
    }

    #[actix_web::test]
    async fn geo_data_missing_or_bad_coordinates() {
        for uri in [
            "/get_geo_data",
            "/get_geo_data?lon=-97.5",
            "/get_geo_data?lon=abc&lat=29.5",
        ] {
            let (status, body) = get(healthy_state(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, json!({ "error": "Missing or invalid coordinates" }));
        }
    }

    #[actix_web::test]
    async fn geo_data_out_of_range_is_bad_request() {
        let (status, body) = get(healthy_state(), "/get_geo_data?lon=-97.5&lat=95").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid coordinate"));
    }

    #[actix_web::test]
    async fn geo_data_unavailable_layer() {
        let state = state(
            Resource::Unavailable("hays.geojson not found".to_string()),
            slope(grid()),
            engine(),
        );
        let (status, body) = get(state, "/get_geo_data?lon=-97.75&lat=29.25").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("hays.geojson not found"));
    }

    #[actix_web::test]
    async fn geo_data_read_failure_is_internal_error() {
        let state = state(soil(), slope(Box::new(BrokenPixels)), engine());
        let (status, body) = get(state, "/get_geo_data?lon=-97.75&lat=29.25").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("disk gone"));
    }

    #[actix_web::test]
    async fn predict_pinned_fixture() {
        let (status, body) = post(healthy_state(), r#"{ "soil_type": 1 }"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "prediction": "No Landslide", "confidence": "62.25%" })
        );
    }

    #[actix_web::test]
    async fn predict_accepts_numeric_strings() {
        let (status, body) = post(healthy_state(), r#"{ "soil_type": "5", "slope": "3.2" }"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Landslide");
    }

    #[actix_web::test]
    async fn predict_rejects_bad_input() {
        let (status, body) = post(healthy_state(), r#"{ "slope": "steep" }"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("slope"));

        let (status, _) = post(healthy_state(), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(healthy_state(), "[1, 2, 3]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn predict_without_model() {
        let state = state(
            soil(),
            slope(grid()),
            InferenceEngine::unavailable("model_4.json not found"),
        );
        let (status, body) = post(state, r#"{ "soil_type": 1 }"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body,
            json!({ "error": "Machine learning models are not loaded on the server" })
        );
    }

    #[actix_web::test]
    async fn health_reports_resources() {
        let (status, body) = get(healthy_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        let degraded = state(
            soil(),
            Resource::Unavailable("slope.tif not found".to_string()),
            engine(),
        );
        let (status, body) = get(degraded, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], false);
        assert_eq!(
            body["resources"],
            json!({ "soilIndex": true, "slopeRaster": false, "model": true })
        );
    }
}
