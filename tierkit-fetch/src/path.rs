//! Request shapes: paths, methods and parameters.

use bytes::Bytes;

/// An endpoint described as a type.
///
/// # Example
/// ```ignore
/// struct UserProfile { id: u64 }
///
/// impl ApiPath for UserProfile {
///     fn path_string(&self) -> String {
///         format!("/users/{}", self.id)
///     }
/// }
///
/// let spec = FetchSpec::from_path(&UserProfile { id: 7 }, HttpMethod::Get);
/// ```
pub trait ApiPath {
    /// Absolute path component, starting with `/`.
    fn path_string(&self) -> String;

    /// Query parameters, used only by `GET`.
    fn parameters(&self) -> Option<Vec<(String, String)>> {
        None
    }
}

/// HTTP method of a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpMethod {
    /// Parameters are sent as query items.
    #[default]
    Get,
    /// Opaque body; parameters are ignored.
    Post { body: Option<Bytes> },
}

impl HttpMethod {
    pub fn post(body: impl Into<Bytes>) -> Self {
        HttpMethod::Post {
            body: Some(body.into()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post { .. } => "POST",
        }
    }
}

/// Everything needed to issue one request against a configured domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchSpec {
    pub path: String,
    pub method: HttpMethod,
    pub parameters: Option<Vec<(String, String)>>,
}

impl FetchSpec {
    /// A `GET` for `path` without parameters.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
            parameters: None,
        }
    }

    /// A `POST` of `body` to `path`.
    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::post(body),
            parameters: None,
        }
    }

    /// Build from a typed endpoint.
    pub fn from_path<P: ApiPath + ?Sized>(path: &P, method: HttpMethod) -> Self {
        Self {
            path: path.path_string(),
            method,
            parameters: path.parameters(),
        }
    }

    /// Add a query parameter. Ignored for `POST`.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }
}

impl ApiPath for FetchSpec {
    fn path_string(&self) -> String {
        self.path.clone()
    }

    fn parameters(&self) -> Option<Vec<(String, String)>> {
        self.parameters.clone()
    }
}
