//! Recording stub transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{MailchimpError, Result};
use crate::http::{HttpRequest, HttpResponse, Transport};

#[derive(Default)]
struct StubState {
    responses: VecDeque<HttpResponse>,
    requests: Vec<HttpRequest>,
}

/// Replays queued responses in order and records every request it sees.
/// Runs dry with a `Transport` error.
#[derive(Clone, Default)]
pub(crate) struct StubTransport {
    state: Arc<Mutex<StubState>>,
}

impl StubTransport {
    pub(crate) fn respond(self, status: u16, body: &str) -> Self {
        self.state.lock().unwrap().responses.push_back(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        });
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub(crate) fn last_request(&self) -> HttpRequest {
        self.requests().pop().expect("no request was sent")
    }
}

impl Transport for StubTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        state
            .responses
            .pop_front()
            .ok_or_else(|| MailchimpError::Transport("no stubbed response left".to_string()))
    }
}
