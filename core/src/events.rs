//! Listeners registered with `on_progress`, `on_response`, `on_error` and
//! `on_redirect`.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::progress::ProgressEvent;
use crate::response::Response;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectEvent {
    pub status: u16,
    pub from: String,
    pub to: String,
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Listeners {
    pub progress: Vec<Listener<ProgressEvent>>,
    pub response: Vec<Listener<Response>>,
    pub error: Vec<Listener<Error>>,
    pub redirect: Vec<Listener<RedirectEvent>>,
}

impl Listeners {
    pub fn progress(&self, event: &ProgressEvent) {
        self.progress.iter().for_each(|listener| listener(event));
    }

    pub fn response(&self, response: &Response) {
        self.response.iter().for_each(|listener| listener(response));
    }

    pub fn error(&self, err: &Error) {
        self.error.iter().for_each(|listener| listener(err));
    }

    pub fn redirect(&self, event: &RedirectEvent) {
        self.redirect.iter().for_each(|listener| listener(event));
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("progress", &self.progress.len())
            .field("response", &self.response.len())
            .field("error", &self.error.len())
            .field("redirect", &self.redirect.len())
            .finish()
    }
}
