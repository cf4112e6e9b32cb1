//! In-process stand-in for the remote classification service, for tests.

use actix_multipart::Multipart;
use actix_web::dev::ServerHandle;
use actix_web::{App, Error, HttpResponse, HttpServer, web};
use futures_util::TryStreamExt;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum FakeReply {
    /// Success with this category (per-image) or result label (batch).
    Category(&'static str),
    Status(u16),
    /// Success with a verbatim JSON body.
    Body(&'static str),
}

struct FakeState {
    replies: HashMap<String, FakeReply>,
    batch: FakeReply,
    received: Mutex<Vec<String>>,
}

pub struct FakeClassifier {
    pub base_url: String,
    state: web::Data<FakeState>,
    handle: ServerHandle,
}

impl FakeClassifier {
    /// `replies` answers per-image requests by uploaded filename; `batch`
    /// answers every batch request.
    pub async fn start(replies: Vec<(&str, FakeReply)>, batch: FakeReply) -> Self {
        let state = web::Data::new(FakeState {
            replies: replies
                .into_iter()
                .map(|(name, reply)| (name.to_string(), reply))
                .collect(),
            batch,
            received: Mutex::new(Vec::new()),
        });

        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .route("/api/ai/object_detection", web::post().to(object_detection))
                .route("/api/b2b/classify", web::post().to(classify))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind fake classifier");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    /// Filenames of every uploaded image, in arrival order.
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn drain_filenames(mut payload: Multipart) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or_default()
            .to_string();
        while field.try_next().await?.is_some() {}
        names.push(filename);
    }
    Ok(names)
}

fn respond(reply: &FakeReply, body: impl FnOnce(&str) -> serde_json::Value) -> HttpResponse {
    match reply {
        FakeReply::Category(label) => HttpResponse::Ok().json(body(label)),
        FakeReply::Status(code) => {
            let status = actix_web::http::StatusCode::from_u16(*code)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).body("classifier unavailable")
        }
        FakeReply::Body(raw) => HttpResponse::Ok()
            .content_type("application/json")
            .body(*raw),
    }
}

async fn object_detection(
    payload: Multipart,
    state: web::Data<FakeState>,
) -> Result<HttpResponse, Error> {
    let names = drain_filenames(payload).await?;
    state.received.lock().unwrap().extend(names.iter().cloned());

    let reply = names
        .first()
        .and_then(|name| state.replies.get(name))
        .cloned()
        .unwrap_or(FakeReply::Status(400));

    Ok(respond(&reply, |category| {
        serde_json::json!({
            "detected_object": {
                category: { "bbox": [10, 20, 110, 220] }
            }
        })
    }))
}

async fn classify(payload: Multipart, state: web::Data<FakeState>) -> Result<HttpResponse, Error> {
    let names = drain_filenames(payload).await?;
    state.received.lock().unwrap().extend(names);

    Ok(respond(&state.batch, |label| {
        serde_json::json!({ "result": label, "confidence": 0.93 })
    }))
}
