// ABOUTME: Learning platform REST API client for course and lesson management
// ABOUTME: Forwards already-authenticated calls with the caller's upstream access token
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::errors::LearningApiError;
use crate::config::LearningApiConfig;
use crate::utils::http_client::api_client;

/// Paging parameters for list calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
}

/// Course and lesson operations of the learning platform.
///
/// Every call carries the upstream access token explicitly; the
/// implementation keeps no per-user state.
#[async_trait]
pub trait LearningApi: Send + Sync {
    /// List the caller's courses
    async fn list_courses(&self, access_token: &str, page: Page) -> Result<Value, LearningApiError>;

    /// Fetch one course
    async fn get_course(
        &self,
        access_token: &str,
        course_id: &str,
    ) -> Result<Value, LearningApiError>;

    /// Create a course
    async fn create_course(
        &self,
        access_token: &str,
        course: &Value,
    ) -> Result<Value, LearningApiError>;

    /// Apply a partial update to a course
    async fn update_course(
        &self,
        access_token: &str,
        course_id: &str,
        changes: &Value,
    ) -> Result<Value, LearningApiError>;

    /// Delete a course
    async fn delete_course(
        &self,
        access_token: &str,
        course_id: &str,
    ) -> Result<Value, LearningApiError>;

    /// List the lessons of a course
    async fn list_lessons(
        &self,
        access_token: &str,
        course_id: &str,
        page: Page,
    ) -> Result<Value, LearningApiError>;

    /// Fetch one lesson
    async fn get_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Value, LearningApiError>;

    /// Create a lesson inside a course
    async fn create_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson: &Value,
    ) -> Result<Value, LearningApiError>;

    /// Apply a partial update to a lesson
    async fn update_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
        changes: &Value,
    ) -> Result<Value, LearningApiError>;

    /// Delete a lesson
    async fn delete_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Value, LearningApiError>;
}

/// `reqwest` implementation of [`LearningApi`]
#[derive(Clone)]
pub struct LearningApiClient {
    base_url: Url,
    client: Client,
}

impl LearningApiClient {
    /// Create a client for the configured API base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path
    pub fn new(config: &LearningApiConfig) -> Result<Self, LearningApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| LearningApiError::Decode(format!("invalid API base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LearningApiError::Decode(format!(
                "API base URL cannot carry a path: {base_url}"
            )));
        }
        Ok(Self {
            base_url,
            client: api_client(),
        })
    }

    fn endpoint(&self, segments: &[&str], page: Page) -> Result<Url, LearningApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LearningApiError::Decode("API base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        if page.page.is_some() || page.per_page.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(number) = page.page {
                query.append_pair("page", &number.to_string());
            }
            if let Some(size) = page.per_page {
                query.append_pair("per_page", &size.to_string());
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
        body: Option<&Value>,
        resource: &str,
    ) -> Result<Value, LearningApiError> {
        debug!(%method, path = url.path(), "Calling learning API");

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LearningApiError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LearningApiError::Network(e.to_string()))?;

        match status {
            StatusCode::UNAUTHORIZED => Err(LearningApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(LearningApiError::NotFound {
                resource: resource.to_owned(),
            }),
            StatusCode::NO_CONTENT => Ok(json!({ "success": true })),
            s if s.is_success() && text.trim().is_empty() => Ok(json!({ "success": true })),
            s if s.is_success() => {
                serde_json::from_str(&text).map_err(|e| LearningApiError::Decode(e.to_string()))
            }
            s => {
                warn!(status = s.as_u16(), "Learning API call failed");
                Err(LearningApiError::Rejected {
                    status: s.as_u16(),
                    message: error_message(&text),
                })
            }
        }
    }
}

/// Prefer the API's own `error`/`message` field over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[async_trait]
impl LearningApi for LearningApiClient {
    async fn list_courses(
        &self,
        access_token: &str,
        page: Page,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(&["courses"], page)?;
        self.send(Method::GET, url, access_token, None, "Courses").await
    }

    async fn get_course(
        &self,
        access_token: &str,
        course_id: &str,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(&["courses", course_id], Page::default())?;
        self.send(
            Method::GET,
            url,
            access_token,
            None,
            &format!("Course {course_id}"),
        )
            .await
    }

    async fn create_course(
        &self,
        access_token: &str,
        course: &Value,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(&["courses"], Page::default())?;
        self.send(Method::POST, url, access_token, Some(course), "Courses")
            .await
    }

    async fn update_course(
        &self,
        access_token: &str,
        course_id: &str,
        changes: &Value,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(&["courses", course_id], Page::default())?;
        self.send(
            Method::PATCH,
            url,
            access_token,
            Some(changes),
            &format!("Course {course_id}"),
        )
        .await
    }

    async fn delete_course(
        &self,
        access_token: &str,
        course_id: &str,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(&["courses", course_id], Page::default())?;
        self.send(
            Method::DELETE,
            url,
            access_token,
            None,
            &format!("Course {course_id}"),
        )
            .await
    }

    async fn list_lessons(
        &self,
        access_token: &str,
        course_id: &str,
        page: Page,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(&["courses", course_id, "lessons"], page)?;
        self.send(
            Method::GET,
            url,
            access_token,
            None,
            &format!("Course {course_id}"),
        )
            .await
    }

    async fn get_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(
            &["courses", course_id, "lessons", lesson_id],
            Page::default(),
        )?;
        self.send(
            Method::GET,
            url,
            access_token,
            None,
            &format!("Lesson {lesson_id}"),
        )
            .await
    }

    async fn create_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson: &Value,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(&["courses", course_id, "lessons"], Page::default())?;
        self.send(
            Method::POST,
            url,
            access_token,
            Some(lesson),
            &format!("Course {course_id}"),
        )
        .await
    }

    async fn update_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
        changes: &Value,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(
            &["courses", course_id, "lessons", lesson_id],
            Page::default(),
        )?;
        self.send(
            Method::PATCH,
            url,
            access_token,
            Some(changes),
            &format!("Lesson {lesson_id}"),
        )
        .await
    }

    async fn delete_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Value, LearningApiError> {
        let url = self.endpoint(
            &["courses", course_id, "lessons", lesson_id],
            Page::default(),
        )?;
        self.send(
            Method::DELETE,
            url,
            access_token,
            None,
            &format!("Lesson {lesson_id}"),
        )
            .await
    }
}
