use dashcore::protocol::{ExportFormat, MonitoringParameters, StatusReply};
use dashcore::transport::http::{EVENTS_PATH, EXPORT_PATH, START_PATH, STOP_PATH};
use log::{error, warn};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::sse::Event;
use warp::Filter;

use crate::server::state::{Simulator, NO_DATA};

/// Every endpoint the dashboard talks to.
pub fn routes(
    sim: Simulator,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let with_sim = warp::any().map(move || sim.clone());

    let start = warp::path(START_PATH)
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_sim.clone())
        .and_then(start_monitoring);

    let stop = warp::path(STOP_PATH)
        .and(warp::path::end())
        .and(warp::post())
        .and(with_sim.clone())
        .and_then(stop_monitoring);

    let export = warp::path(EXPORT_PATH)
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_sim.clone())
        .and_then(export_data);

    let events = warp::path(EVENTS_PATH)
        .and(warp::path::end())
        .and(warp::get())
        .and(with_sim)
        .map(event_stream);

    start.or(stop).unify().or(export).unify().or(events).unify()
}

fn status_reply(code: StatusCode, reply: &StatusReply) -> Response {
    warp::reply::with_status(warp::reply::json(reply), code).into_response()
}

async fn start_monitoring(
    parameters: MonitoringParameters,
    sim: Simulator,
) -> Result<Response, Infallible> {
    if let Err(err) = parameters.validate() {
        return Ok(status_reply(
            StatusCode::BAD_REQUEST,
            &StatusReply::error(err.to_string()),
        ));
    }
    Ok(status_reply(StatusCode::OK, &sim.start(parameters).await))
}

async fn stop_monitoring(sim: Simulator) -> Result<Response, Infallible> {
    Ok(status_reply(StatusCode::OK, &sim.stop().await))
}

async fn export_data(format: String, sim: Simulator) -> Result<Response, Infallible> {
    let format: ExportFormat = match format.parse() {
        Ok(format) => format,
        Err(message) => {
            return Ok(status_reply(
                StatusCode::BAD_REQUEST,
                &StatusReply::error(message),
            ))
        }
    };
    let response = match sim.export(format).await {
        Ok(Some(body)) => {
            warp::reply::with_header(body, "content-type", content_type(format)).into_response()
        }
        Ok(None) => status_reply(StatusCode::NOT_FOUND, &StatusReply::error(NO_DATA)),
        Err(err) => {
            error!("building {} export: {:#}", format, err);
            status_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                &StatusReply::error(err.to_string()),
            )
        }
    };
    Ok(response)
}

fn content_type(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Json => "application/json",
        ExportFormat::Csv => "text/csv",
    }
}

fn event_stream(sim: Simulator) -> Response {
    let stream = BroadcastStream::new(sim.subscribe()).filter_map(|item| {
        let event = match item {
            Ok(event) => event,
            Err(lagged) => {
                warn!("push subscriber fell behind: {}", lagged);
                return None;
            }
        };
        match event.encode() {
            Ok(Some((name, data))) => Some(Ok::<_, Infallible>(Event::default().event(name).data(data))),
            Ok(None) => None,
            Err(err) => {
                error!("encoding {} event: {}", event.kind(), err);
                None
            }
        }
    });
    warp::sse::reply(warp::sse::keep_alive().stream(stream)).into_response()
}
