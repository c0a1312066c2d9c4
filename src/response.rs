//! Result envelopes returned by every repository method.
//!
//! A method returns exactly one of two shapes: a [`SingleResponse`] for
//! reads of one row, writes and existence checks, or a
//! [`PaginatedResponse`] for list reads. [`Envelope`] tags the two when a
//! caller needs to carry either one through a single channel.

use serde::{Deserialize, Serialize};

use crate::pagination::PageWindow;

/// Single-item envelope `{success, data, message}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

impl<T> SingleResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }

    /// Unwraps the payload of a successful response.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

impl SingleResponse<bool> {
    /// Successful call whose boolean answer is `false`: "no", "nothing changed".
    pub fn ok_false(message: impl Into<String>) -> Self {
        Self::ok(false, message)
    }
}

/// Paginated envelope for list reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, window: &PageWindow, total_count: i64) -> Self {
        let meta = window.metadata(total_count);
        Self {
            data,
            total_count,
            page: meta.page,
            page_size: meta.page_size,
            total_pages: meta.total_pages,
            has_previous: meta.has_previous,
            has_next: meta.has_next,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Empty page used when a filter argument is rejected before the store is queried.
    pub fn rejected(window: &PageWindow, message: impl Into<String>) -> Self {
        Self::new(Vec::new(), window, 0).with_message(message)
    }
}

/// Either envelope shape, tagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope<T> {
    Single(SingleResponse<T>),
    Paginated(PaginatedResponse<T>),
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        match self {
            Envelope::Single(single) => single.success,
            // a paginated read always completes; rejected filters just yield no rows
            Envelope::Paginated(_) => true,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Envelope::Single(single) => Some(single.message.as_str()),
            Envelope::Paginated(page) => page.message.as_deref(),
        }
    }
}

impl<T> From<SingleResponse<T>> for Envelope<T> {
    fn from(value: SingleResponse<T>) -> Self {
        Envelope::Single(value)
    }
}

impl<T> From<PaginatedResponse<T>> for Envelope<T> {
    fn from(value: PaginatedResponse<T>) -> Self {
        Envelope::Paginated(value)
    }
}
