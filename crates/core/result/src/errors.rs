use std::{error::Error, fmt};

pub type BoxedErr = Box<dyn Error + Sync + Send>;
pub type OptionalErr = Option<BoxedErr>;

#[derive(Debug, Clone)]
pub enum ErrorType {
  // General errors
  LabelMe,
  NotFound,
  NoRows,
  InvalidData,
  MissingField,

  // Database errors
  DatabaseError { operation: String, collection: String },

  // External service errors
  InternalError,
  Connection,
  ConfigError,
  HttpRequestError,
  HttpResponseError,

  // Task & async errors
  TimedOut,
  TaskFailed,

  // JSON errors
  JsonUnmarshal,
}

impl fmt::Display for ErrorType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorType::LabelMe => write!(f, "This error was not labeled"),
      ErrorType::NotFound => write!(f, "Resource not found"),
      ErrorType::NoRows => write!(f, "No rows returned"),
      ErrorType::InvalidData => write!(f, "Invalid data"),
      ErrorType::MissingField => write!(f, "Missing required field"),
      ErrorType::DatabaseError { operation, collection } => {
        write!(f, "Database error during {} on {}", operation, collection)
      }
      ErrorType::InternalError => write!(f, "Internal error"),
      ErrorType::Connection => write!(f, "Connection error"),
      ErrorType::ConfigError => write!(f, "Configuration error"),
      ErrorType::HttpRequestError => write!(f, "HTTP request error"),
      ErrorType::HttpResponseError => write!(f, "HTTP response error"),
      ErrorType::TimedOut => write!(f, "Operation timed out"),
      ErrorType::TaskFailed => write!(f, "Task failed"),
      ErrorType::JsonUnmarshal => write!(f, "JSON unmarshaling error"),
    }
  }
}

/// Startup and wiring failures, carries the phase that failed
#[derive(Debug)]
pub struct SimpleError {
  pub message: String,
  pub err_type: ErrorType,
  pub err: BoxedErr,
}

impl fmt::Display for SimpleError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.err_type, self.message)
  }
}

impl Error for SimpleError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    Some(self.err.as_ref())
  }
}

/// Processing failures, `path` names the originating module
#[derive(Debug)]
pub struct InternalError {
  pub err_type: ErrorType,
  /// whether the failure is temporary and a redelivery may succeed
  pub temp: bool,
  pub err: BoxedErr,
  pub msg: String,
  pub path: String,
}

impl fmt::Display for InternalError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut parts = Vec::new();

    if !self.path.is_empty() {
      parts.push(format!("path: {}", self.path));
    }
    parts.push(format!("err_type: {}", self.err_type));
    if !self.msg.is_empty() {
      parts.push(format!("msg: {}", self.msg));
    }
    parts.push(format!("err: {}", self.err));

    write!(f, "{}", parts.join(", "))
  }
}

impl Error for InternalError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    Some(self.err.as_ref())
  }
}

#[derive(Debug)]
pub struct DBError {
  pub err_type: ErrorType,
  pub err: BoxedErr,
  pub msg: String,
  pub path: String,
}

impl fmt::Display for DBError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut parts = Vec::new();

    if !self.path.is_empty() {
      parts.push(format!("path: {}", self.path));
    }
    parts.push(format!("err_type: {}", self.err_type));
    if !self.msg.is_empty() {
      parts.push(format!("msg: {}", self.msg));
    }
    parts.push(format!("err: {}", self.err));

    write!(f, "{}", parts.join(", "))
  }
}

impl Error for DBError {}

impl DBError {
  pub fn new(
    path: impl Into<String>,
    err: BoxedErr,
    err_type: ErrorType,
    msg: impl Into<String>,
  ) -> Self {
    Self { err_type, err, msg: msg.into(), path: path.into() }
  }

  /// Whether the error represents an absent document rather than a transport fault
  pub fn is_not_found(&self) -> bool {
    matches!(self.err_type, ErrorType::NotFound | ErrorType::NoRows)
  }
}

#[cfg(test)]
mod tests {
  use std::io::{Error, ErrorKind};

  use super::*;

  #[test]
  fn test_internal_error_display() {
    let err = InternalError {
      err_type: ErrorType::HttpResponseError,
      temp: false,
      err: Box::new(Error::new(ErrorKind::Other, "boom")),
      msg: "segment returned error".to_string(),
      path: "telemetry-worker.controller.segment".to_string(),
    };

    let rendered = format!("{}", err);
    assert!(rendered.contains("path: telemetry-worker.controller.segment"));
    assert!(rendered.contains("HTTP response error"));
    assert!(rendered.contains("msg: segment returned error"));
  }

  #[test]
  fn test_db_error_not_found() {
    let err = DBError::new(
      "database.drivers.firestore",
      Box::new(Error::new(ErrorKind::NotFound, "no match")),
      ErrorType::NotFound,
      "no user document for uid",
    );
    assert!(err.is_not_found());

    let err = DBError::new(
      "database.drivers.firestore",
      Box::new(Error::new(ErrorKind::Other, "timeout")),
      ErrorType::Connection,
      "",
    );
    assert!(!err.is_not_found());
  }
}
