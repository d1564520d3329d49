use bytes::Bytes;
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};

/// HTTP Response representation
#[derive(Debug, Clone)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl Response {
	/// Create a new Response with the given status code
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo_server::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	/// Create a Response with HTTP 200 OK status
	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	/// Create a Response with HTTP 400 Bad Request status
	pub fn bad_request() -> Self {
		Self::new(StatusCode::BAD_REQUEST)
	}

	/// Create a Response with HTTP 404 Not Found status
	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	/// Create a Response with HTTP 405 Method Not Allowed status
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo_server::Response;
	///
	/// let response = Response::method_not_allowed("GET, POST");
	/// assert_eq!(response.headers.get("allow").unwrap(), "GET, POST");
	/// ```
	pub fn method_not_allowed(allow: &str) -> Self {
		Self::new(StatusCode::METHOD_NOT_ALLOWED).with_header("allow", allow)
	}

	/// Create a Response with HTTP 500 Internal Server Error status
	pub fn internal_server_error() -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR)
	}

	/// Create a Response with HTTP 504 Gateway Timeout status
	pub fn gateway_timeout() -> Self {
		Self::new(StatusCode::GATEWAY_TIMEOUT)
	}

	/// Set the response body
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo_server::Response;
	/// use bytes::Bytes;
	///
	/// let response = Response::ok().with_body("Hello, World!");
	/// assert_eq!(response.body, Bytes::from("Hello, World!"));
	/// ```
	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Add a custom header to the response
	///
	/// Invalid header names or values are ignored.
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			HeaderName::from_bytes(name.as_bytes()),
			HeaderValue::from_str(value),
		) {
			self.headers.insert(name, value);
		}
		self
	}

	/// Set the `Content-Type` header
	pub fn with_content_type(mut self, content_type: &'static str) -> Self {
		self.headers
			.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
		self
	}

	/// Mark the response as not cacheable by intermediaries
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo_server::Response;
	///
	/// let response = Response::not_found().with_no_cache();
	/// assert_eq!(response.headers.get("cache-control").unwrap(), "no-cache");
	/// ```
	pub fn with_no_cache(mut self) -> Self {
		self.headers
			.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
		self
	}

	/// Returns `true` if the response carries `Cache-Control: no-cache`
	pub fn is_no_cache(&self) -> bool {
		self.headers
			.get(CACHE_CONTROL)
			.is_some_and(|value| value == "no-cache")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_content_type_header() {
		let response = Response::ok().with_content_type("text/css");
		assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "text/css");
		assert!(!response.is_no_cache());
	}

	#[test]
	fn test_invalid_header_is_ignored() {
		let response = Response::ok().with_header("bad header", "value");
		assert!(response.headers.is_empty());
	}
}
