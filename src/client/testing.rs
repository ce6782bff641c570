//! Transporte em memória para os testes do pipeline

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::transport::{RawResponse, Transport, TransportRequest};
use crate::error::{ApiError, ApiResult};

/// Devolve respostas enfileiradas e grava cada requisição recebida
///
/// Com `delay`, cada chamada cede o executor antes de responder e o pico de
/// chamadas simultâneas fica registrado em `max_in_flight`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<ApiResult<RawResponse>>>,
    requests: Mutex<Vec<TransportRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status_code: u16, raw_headers: &str, raw_body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(RawResponse::new(status_code, raw_headers, raw_body)));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ApiError::transport_error(message)));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> TransportRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was recorded")
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: TransportRequest) -> ApiResult<RawResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(200, "", "")));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}
