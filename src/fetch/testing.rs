// src/fetch/testing.rs
//
// In-memory transport for unit tests.

use reqwest::StatusCode;
use serde_json::Value;
use std::{cell::RefCell, collections::VecDeque};

use super::transport::{HttpResponse, Transport};
use crate::error::FetchError;

pub enum Reply {
    Json(Value),
    Status(u16),
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Replies are served per route in order; the last reply of a route repeats.
/// Routes are matched by substring, first registered wins.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: RefCell<Vec<(String, VecDeque<Reply>)>>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, fragment: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .borrow_mut()
            .push((fragment.to_string(), replies.into()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

fn render(url: &str, reply: &Reply) -> Result<HttpResponse, FetchError> {
    match reply {
        Reply::Json(v) => Ok(HttpResponse {
            status: StatusCode::OK,
            body: serde_json::to_vec(v).unwrap_or_default(),
        }),
        Reply::Status(code) => Ok(HttpResponse {
            status: StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: Vec::new(),
        }),
        Reply::Fail(message) => Err(FetchError::Transport {
            url: url.to_string(),
            message: message.clone(),
        }),
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
        self.calls.borrow_mut().push(Call {
            url: url.to_string(),
            query: query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        });

        let mut routes = self.routes.borrow_mut();
        let Some((_, replies)) = routes.iter_mut().find(|(frag, _)| url.contains(frag.as_str()))
        else {
            return Err(FetchError::Transport {
                url: url.to_string(),
                message: "no scripted route".into(),
            });
        };
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            None
        };
        match reply {
            Some(r) => render(url, &r),
            None => match replies.front() {
                Some(r) => render(url, r),
                None => Err(FetchError::Transport {
                    url: url.to_string(),
                    message: "no scripted reply".into(),
                }),
            },
        }
    }
}
