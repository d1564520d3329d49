//! HTTP request representation and parameter access

use crate::error::{Error, Result};
use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Uri, Version};
use std::net::SocketAddr;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP Request representation
#[derive(Debug, Clone)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub version: Version,
	pub headers: HeaderMap,
	pub body: Bytes,
	pub remote_addr: Option<SocketAddr>,
}

impl Request {
	/// Creates a new request from its parts
	pub fn new(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: Bytes) -> Self {
		Self {
			method,
			uri,
			version,
			headers,
			body,
			remote_addr: None,
		}
	}

	/// Creates a bodiless GET request for a static URI
	///
	/// # Panics
	///
	/// Panics if `uri` is not a valid URI.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo_server::Request;
	///
	/// let request = Request::get("/combo?m=app.js");
	/// assert_eq!(request.path(), "/combo");
	/// ```
	pub fn get(uri: &'static str) -> Self {
		Self::new(
			Method::GET,
			Uri::from_static(uri),
			Version::HTTP_11,
			HeaderMap::new(),
			Bytes::new(),
		)
	}

	/// Starts building a request
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	/// Get the request path
	pub fn path(&self) -> &str {
		self.uri.path()
	}

	/// URL-decoded query string pairs, in the order they appear
	///
	/// Repeated keys are kept; malformed query strings yield no pairs.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo_server::Request;
	///
	/// let request = Request::get("/combo?m=a.js&m=b%20c.js&p=/html");
	/// let pairs = request.query_pairs();
	/// assert_eq!(pairs[1], ("m".to_string(), "b c.js".to_string()));
	/// assert_eq!(pairs.len(), 3);
	/// ```
	pub fn query_pairs(&self) -> Vec<(String, String)> {
		self.uri
			.query()
			.map(decode_pairs)
			.unwrap_or_default()
	}

	/// URL-decoded pairs from an `application/x-www-form-urlencoded` body
	///
	/// Returns an empty list for any other content type.
	pub fn form_pairs(&self) -> Vec<(String, String)> {
		let is_form = self
			.headers
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.is_some_and(|value| {
				value
					.split(';')
					.next()
					.is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
			});

		if !is_form || self.body.is_empty() {
			return Vec::new();
		}

		decode_pairs(&String::from_utf8_lossy(&self.body))
	}

	/// All values for `name`, query string first, then form body
	pub fn param_values(&self, name: &str) -> Vec<String> {
		self.query_pairs()
			.into_iter()
			.chain(self.form_pairs())
			.filter(|(key, _)| key == name)
			.map(|(_, value)| value)
			.collect()
	}

	/// First value for `name`, if any
	pub fn param(&self, name: &str) -> Option<String> {
		self.param_values(name).into_iter().next()
	}
}

fn decode_pairs(input: &str) -> Vec<(String, String)> {
	serde_urlencoded::from_str::<Vec<(String, String)>>(input).unwrap_or_default()
}

/// Builder for [`Request`]
#[derive(Debug, Default)]
pub struct RequestBuilder {
	method: Option<Method>,
	uri: Option<String>,
	headers: Vec<(String, String)>,
	body: Bytes,
	remote_addr: Option<SocketAddr>,
}

impl RequestBuilder {
	/// Sets the request method (defaults to GET)
	pub fn method(mut self, method: Method) -> Self {
		self.method = Some(method);
		self
	}

	/// Sets the request URI (defaults to `/`)
	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = Some(uri.into());
		self
	}

	/// Appends a header
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	/// Sets the request body
	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Sets the peer address
	pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
		self.remote_addr = Some(addr);
		self
	}

	/// Builds the request
	///
	/// # Errors
	///
	/// Returns an error if the URI or a header is invalid.
	pub fn build(self) -> Result<Request> {
		let uri: Uri = self
			.uri
			.as_deref()
			.unwrap_or("/")
			.parse()
			.map_err(|e: hyper::http::uri::InvalidUri| Error::Http(e.into()))?;

		let mut headers = HeaderMap::new();
		for (name, value) in self.headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|e| Error::Http(e.into()))?;
			let value = HeaderValue::from_str(&value).map_err(|e| Error::Http(e.into()))?;
			headers.append(name, value);
		}

		let mut request = Request::new(
			self.method.unwrap_or(Method::GET),
			uri,
			Version::HTTP_11,
			headers,
			self.body,
		);
		request.remote_addr = self.remote_addr;
		Ok(request)
	}
}
