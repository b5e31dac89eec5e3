//! HTTP front end for the lot manager
//!
//! JSON over HTTP/1.1 on hyper. Every handler answers with a JSON body;
//! failures use the `{"status":"error","description":...}` envelope.
//!
//! Routes:
//! - `GET /` - liveness
//! - `GET /add?car=&tariff=` - check in
//! - `GET /remove?location=` - check out
//! - `GET /list?start=&limit=` - occupied spots page
//! - `GET /config`, `POST /config` - read or change lot settings
//! - `GET /metrics` - Prometheus exposition

use crate::domain::error::LotError;
use crate::domain::types::SpotId;
use crate::io::prometheus::{self, format_prometheus_metrics};
use crate::io::query::{Query, QueryError};
use crate::services::lot_manager::{
    LotManager, LotUpdate, DEFAULT_PAGE_LIMIT, DEFAULT_PAGE_START,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Largest accepted request body (POST /config)
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state handed to every request
pub struct HttpContext {
    lot: Arc<LotManager>,
    date_time_format: String,
}

impl HttpContext {
    pub fn new(lot: Arc<LotManager>, date_time_format: &str) -> Self {
        Self { lot, date_time_format: date_time_format.to_string() }
    }
}

#[derive(Serialize)]
struct Success<T: Serialize> {
    status: &'static str,
    #[serde(flatten)]
    body: T,
}

fn success<T: Serialize>(body: T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &Success { status: "success", body })
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "http_response_serialize_failed");
            let mut response = Response::new(Full::new(Bytes::from_static(b"internal error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn error_response(status: StatusCode, description: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({ "status": "error", "description": description }))
}

/// HTTP status for each lot failure
fn lot_error_status(error: &LotError) -> StatusCode {
    match error {
        LotError::LotFull => StatusCode::INSUFFICIENT_STORAGE,
        LotError::LocationEmpty { .. } => StatusCode::NOT_FOUND,
        LotError::ShrinkBelowOccupied { .. } => StatusCode::CONFLICT,
        LotError::InvalidInterval { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        LotError::PaginationStart { .. }
        | LotError::PaginationLimit
        | LotError::UnknownTariff { .. }
        | LotError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
    }
}

fn lot_error_response(error: &LotError) -> Response<Full<Bytes>> {
    error_response(lot_error_status(error), &error.to_string())
}

fn query_error_response(error: &QueryError) -> Response<Full<Bytes>> {
    error_response(StatusCode::BAD_REQUEST, &error.to_string())
}

fn index() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
    )
}

fn add_car(ctx: &HttpContext, query: &Query) -> Result<Response<Full<Bytes>>, QueryError> {
    let car = query.required("car")?;
    let tariff = query.required("tariff")?;

    Ok(match ctx.lot.check_in(car, tariff) {
        Ok(ticket) => success(ticket.to_record(&ctx.date_time_format)),
        Err(e) => lot_error_response(&e),
    })
}

fn remove_car(ctx: &HttpContext, query: &Query) -> Result<Response<Full<Bytes>>, QueryError> {
    let location: i64 = query.required_int("location")?;
    // Integers outside the spot range can never hold a car; spot 0 is never allocated
    let spot = SpotId(u32::try_from(location).unwrap_or(0));

    Ok(match ctx.lot.check_out(spot) {
        Ok(ticket) => success(ticket.to_record(&ctx.date_time_format)),
        Err(e) => lot_error_response(&e),
    })
}

fn list_cars(ctx: &HttpContext, query: &Query) -> Result<Response<Full<Bytes>>, QueryError> {
    let start: i64 = query.int_or("start", DEFAULT_PAGE_START)?;
    let limit: i64 = query.int_or("limit", DEFAULT_PAGE_LIMIT)?;

    Ok(match ctx.lot.list_occupied(start, limit) {
        Ok(tickets) => {
            let cars: Vec<_> =
                tickets.iter().map(|t| t.to_record(&ctx.date_time_format)).collect();
            success(json!({ "cars": cars }))
        }
        Err(e) => lot_error_response(&e),
    })
}

fn get_config(ctx: &HttpContext) -> Response<Full<Bytes>> {
    success(ctx.lot.configuration())
}

async fn update_config<B>(ctx: &HttpContext, body: B) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "http_body_rejected");
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    let update: LotUpdate = match serde_json::from_slice(&bytes) {
        Ok(update) => update,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid configuration: {e}"),
            )
        }
    };

    match ctx.lot.reconfigure(update) {
        Ok(config) => success(json!({ "config": config })),
        Err(e) => lot_error_response(&e),
    }
}

fn metrics(ctx: &HttpContext) -> Response<Full<Bytes>> {
    let (occupied, total) = ctx.lot.occupancy();
    let body = format_prometheus_metrics(&ctx.lot.metrics().snapshot(occupied, total));

    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::CONTENT_TYPE));
    response
}

/// Route one request
pub async fn handle_request<B>(
    req: Request<B>,
    ctx: Arc<HttpContext>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let query = Query::parse(req.uri().query());

    let routed = match (&method, path.as_str()) {
        (&Method::GET, "/") => Ok(index()),
        (&Method::GET, "/add") => add_car(&ctx, &query),
        (&Method::GET, "/remove") => remove_car(&ctx, &query),
        (&Method::GET, "/list") => list_cars(&ctx, &query),
        (&Method::GET, "/config") => Ok(get_config(&ctx)),
        (&Method::POST, "/config") => Ok(update_config(&ctx, req.into_body()).await),
        (&Method::GET, "/metrics") => Ok(metrics(&ctx)),
        _ => Ok(error_response(StatusCode::NOT_FOUND, "Not Found")),
    };
    let response = routed.unwrap_or_else(|e| query_error_response(&e));

    debug!(method = %method, path = %path, status = %response.status().as_u16(), "http_request");
    Ok(response)
}

/// Start the HTTP server
pub async fn start_http_server(
    addr: SocketAddr,
    ctx: Arc<HttpContext>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    info!(addr = %addr, "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _peer)) => {
                        let io = TokioIo::new(stream);
                        let ctx = ctx.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle_request(req, ctx.clone()));

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Tariff, TariffTable};
    use crate::infra::metrics::Metrics;
    use crate::services::clock::ManualClock;
    use crate::services::fee::FeeCalculator;
    use crate::services::lot_manager::Lot;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::Value;

    struct TestServer {
        ctx: Arc<HttpContext>,
        clock: Arc<ManualClock>,
    }

    impl TestServer {
        fn new(total_spots: u32) -> Self {
            let mut tariffs = TariffTable::new();
            tariffs.insert("hourly", Tariff::new(dec!(1), dec!(10)));
            tariffs.insert("daily", Tariff::new(dec!(24), dec!(100)));

            let clock = Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            ));
            let lot = LotManager::new(
                Lot::new(total_spots, tariffs).unwrap(),
                FeeCalculator::new(15),
                clock.clone(),
                Arc::new(Metrics::new()),
            );
            let ctx = Arc::new(HttpContext::new(Arc::new(lot), "%Y-%m-%d %H:%M:%S"));
            Self { ctx, clock }
        }

        async fn send(&self, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Full::new(Bytes::from(body.to_string())))
                .unwrap();
            let response = handle_request(req, self.ctx.clone()).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Method::GET, uri, "").await
        }

        async fn post(&self, uri: &str, body: &str) -> (StatusCode, Value) {
            self.send(Method::POST, uri, body).await
        }
    }

    #[tokio::test]
    async fn test_index() {
        let server = TestServer::new(2);
        let (status, json) = server.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_add_car() {
        let server = TestServer::new(2);
        let (status, json) = server.get("/add?car=ABC-123&tariff=Hourly").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["car"], "ABC-123");
        assert_eq!(json["tariff"], "hourly");
        assert_eq!(json["location"], 1);
        assert_eq!(json["start"], "2024-06-01 09:00:00");
        assert_eq!(json["base_cost"], "10");
        assert!(json["ticket_id"].is_string());
        assert!(json.get("fee").is_none());
    }

    #[tokio::test]
    async fn test_add_car_unknown_tariff() {
        let server = TestServer::new(2);
        let (status, json) = server.get("/add?car=ABC-123&tariff=weekly").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
        assert_eq!(json["description"], "Invalid tariff (Available options: daily, hourly)");
    }

    #[tokio::test]
    async fn test_add_car_lot_full() {
        let server = TestServer::new(1);
        server.get("/add?car=A&tariff=hourly").await;
        let (status, json) = server.get("/add?car=B&tariff=hourly").await;

        assert_eq!(status, StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(json, json!({ "status": "error", "description": "No free space" }));
    }

    #[tokio::test]
    async fn test_add_car_missing_param() {
        let server = TestServer::new(1);
        let (status, json) = server.get("/add?car=A").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "Missing query parameter 'tariff'");
    }

    #[tokio::test]
    async fn test_remove_car_with_fee() {
        let server = TestServer::new(2);
        server.get("/add?car=ABC-123&tariff=hourly").await;
        server.clock.advance(Duration::minutes(61));

        let (status, json) = server.get("/remove?location=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["car"], "ABC-123");
        assert_eq!(json["location"], 1);
        assert_eq!(json["finish"], "2024-06-01 10:01:00");
        assert_eq!(json["fee"], "20.00");
    }

    #[tokio::test]
    async fn test_remove_empty_location() {
        let server = TestServer::new(2);
        let (status, json) = server.get("/remove?location=2").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json,
            json!({ "status": "error", "description": "Vehicle not found in location." })
        );
    }

    #[tokio::test]
    async fn test_remove_non_integer_location() {
        let server = TestServer::new(2);
        let (status, json) = server.get("/remove?location=first").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "Query parameter 'location' must be an integer, got 'first'");
    }

    #[tokio::test]
    async fn test_remove_out_of_range_location() {
        let server = TestServer::new(2);
        server.get("/add?car=A&tariff=hourly").await;

        for location in ["0", "-1", "3", "99999999999"] {
            let (status, json) = server.get(&format!("/remove?location={location}")).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "location {location}");
            assert_eq!(json["description"], "Vehicle not found in location.");
        }
        let (_, json) = server.get("/config").await;
        assert_eq!(json["occupied_spots"], 1);
    }

    #[tokio::test]
    async fn test_repeated_parameter_uses_last_value() {
        let server = TestServer::new(2);
        let (status, json) = server.get("/add?car=A&tariff=hourly&tariff=weekly").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "Invalid tariff (Available options: daily, hourly)");

        let (status, json) = server.get("/add?car=A&car=B&tariff=daily").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["car"], "B");
    }

    #[tokio::test]
    async fn test_list_cars() {
        let server = TestServer::new(5);
        let (status, json) = server.get("/list").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "status": "success", "cars": [] }));

        for car in ["A", "B", "C"] {
            server.get(&format!("/add?car={car}&tariff=daily")).await;
        }
        let (_, json) = server.get("/list?start=2&limit=5").await;
        let cars = json["cars"].as_array().unwrap();
        assert_eq!(cars.len(), 2);
        assert_eq!(cars[0]["car"], "B");
        assert_eq!(cars[1]["location"], 3);
    }

    #[tokio::test]
    async fn test_list_pagination_errors() {
        let server = TestServer::new(5);

        let (status, json) = server.get("/list?start=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "Start must be between 1 and 5");

        let (status, json) = server.get("/list?limit=101").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "Limit must be between 1 and 100");

        let (status, _) = server.get("/list?limit=ten").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_config() {
        let server = TestServer::new(3);
        let (status, json) = server.get("/config").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_spots"], 3);
        assert_eq!(json["free_spots"], 3);
        assert_eq!(json["tariffs"]["hourly"]["cost"], "10");
    }

    #[tokio::test]
    async fn test_post_config() {
        let server = TestServer::new(3);
        let (status, json) = server
            .post(
                "/config",
                r#"{"total_spots": 6, "tariffs": {"Weekend": {"time_frame_hours": 2, "cost": "5"}}}"#,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["config"]["total_spots"], 6);
        assert!(json["config"]["tariffs"]["weekend"].is_object());
        assert!(json["config"]["tariffs"].get("hourly").is_none());

        let (status, _) = server.get("/add?car=A&tariff=hourly").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_config_errors() {
        let server = TestServer::new(3);
        server.get("/add?car=A&tariff=hourly").await;
        server.get("/add?car=B&tariff=hourly").await;

        let (status, _) = server.post("/config", r#"{"total_spots": 1}"#).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = server.post("/config", r#"{"total_spots": 0}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = server.post("/config", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, json) = server.get("/config").await;
        assert_eq!(json["total_spots"], 3);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let server = TestServer::new(3);
        server.get("/add?car=A&tariff=hourly").await;

        let req = Request::builder().uri("/metrics").body(Full::new(Bytes::new())).unwrap();
        let response = handle_request(req, server.ctx.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("parking_check_ins_total 1\n"));
        assert!(text.contains("parking_occupied_spots 1\n"));
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let server = TestServer::new(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let handle = tokio::spawn(start_http_server(addr, server.ctx.clone(), shutdown_rx));
        shutdown_tx.send(true).unwrap();

        let result: Result<(), Box<dyn std::error::Error + Send + Sync>> = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let server = TestServer::new(1);
        let (status, json) = server.get("/parking").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["status"], "error");

        let (status, _) = server.post("/add?car=A&tariff=hourly", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
