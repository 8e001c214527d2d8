//! Mapping of I/O failures onto SFTP status codes

use std::io::ErrorKind;

use russh_sftp::protocol::{Status, StatusCode};

/// Translate an I/O error into the status code reported to the client
pub fn status_from_io(error: std::io::Error) -> StatusCode {
    match error.kind() {
        ErrorKind::NotFound => StatusCode::NoSuchFile,
        ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
        ErrorKind::UnexpectedEof => StatusCode::Eof,
        _ => StatusCode::Failure,
    }
}

/// Successful status reply for request `id`
pub(crate) fn ok(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_string(),
        language_tag: "en-US".to_string(),
    }
}
