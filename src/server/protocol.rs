//! Wire-level helpers
//!
//! Payloads are relayed verbatim as text frames; the hub adds no envelope. This
//! module sorts inbound frames into the cases the receive loop cares about and
//! builds the few frames and HTTP responses the server writes on its own.

use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Default upgrade path
pub const DEFAULT_PATH: &str = "/ws";

/// Default listen port
pub const DEFAULT_PORT: u16 = 5263;

/// Reason sent with the close frame when the server shuts down
pub const SHUTDOWN_REASON: &str = "server shutting down";

/// Response written to plain HTTP requests that are not upgrade requests
pub const BAD_REQUEST_RESPONSE: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// An inbound frame, as seen by the receive loop
#[derive(Debug)]
pub enum Inbound {
    /// Broadcastable text payload
    Text(String),
    /// Binary payload of the given size; never broadcast
    Binary(usize),
    /// Ping that needs a pong
    Ping(Vec<u8>),
    /// Peer started the close handshake
    Close(Option<CloseFrame<'static>>),
    /// Pong or raw frame
    Ignored,
    /// Read error on the transport
    Failed(WsError),
    /// Stream ended without a close frame
    Ended,
}

impl From<Option<Result<Message, WsError>>> for Inbound {
    fn from(next: Option<Result<Message, WsError>>) -> Self {
        match next {
            Some(Ok(Message::Text(text))) => Inbound::Text(text),
            Some(Ok(Message::Binary(data))) => Inbound::Binary(data.len()),
            Some(Ok(Message::Ping(data))) => Inbound::Ping(data),
            Some(Ok(Message::Close(frame))) => Inbound::Close(frame),
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => Inbound::Ignored,
            Some(Err(e)) => Inbound::Failed(e),
            None => Inbound::Ended,
        }
    }
}

/// Close frame sent when the server initiates the close
pub fn shutdown_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Away,
        reason: SHUTDOWN_REASON.into(),
    }))
}

/// Accept upgrades on `path` only; everything else gets a 404
pub fn check_path(
    request: &Request,
    response: Response,
    path: &str,
) -> Result<Response, ErrorResponse> {
    if request.uri().path() == path {
        return Ok(response);
    }

    let mut error = ErrorResponse::new(Some(format!(
        "No WebSocket endpoint at {}",
        request.uri().path()
    )));
    *error.status_mut() = StatusCode::NOT_FOUND;
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upgrade_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[test]
    fn test_classify_text() {
        let inbound = Inbound::from(Some(Ok(Message::Text("hello".to_string()))));
        assert!(matches!(inbound, Inbound::Text(t) if t == "hello"));
    }

    #[test]
    fn test_classify_binary_reports_size() {
        let inbound = Inbound::from(Some(Ok(Message::Binary(vec![1, 2, 3]))));
        assert!(matches!(inbound, Inbound::Binary(3)));
    }

    #[test]
    fn test_classify_control_frames() {
        assert!(matches!(
            Inbound::from(Some(Ok(Message::Ping(vec![7])))),
            Inbound::Ping(d) if d == vec![7]
        ));
        assert!(matches!(
            Inbound::from(Some(Ok(Message::Pong(vec![])))),
            Inbound::Ignored
        ));
        assert!(matches!(Inbound::from(None), Inbound::Ended));
        assert!(matches!(
            Inbound::from(Some(Err(WsError::ConnectionClosed))),
            Inbound::Failed(_)
        ));
    }

    #[test]
    fn test_classify_close_keeps_frame() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        let inbound = Inbound::from(Some(Ok(Message::Close(Some(frame.clone())))));
        match inbound {
            Inbound::Close(Some(f)) => assert_eq!(f, frame),
            other => panic!("Expected Close, got {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_close() {
        match shutdown_close() {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, CloseCode::Away);
                assert_eq!(frame.reason, SHUTDOWN_REASON);
            }
            other => panic!("Expected Close, got {:?}", other),
        }
    }

    #[test]
    fn test_check_path_accepts_endpoint() {
        let request = upgrade_request("/ws");
        assert!(check_path(&request, Response::new(()), DEFAULT_PATH).is_ok());

        let request = upgrade_request("/ws?room=lobby");
        assert!(check_path(&request, Response::new(()), DEFAULT_PATH).is_ok());
    }

    #[test]
    fn test_check_path_rejects_other_paths() {
        let request = upgrade_request("/chat");
        let error = check_path(&request, Response::new(()), DEFAULT_PATH).unwrap_err();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert!(error.body().as_deref().unwrap().contains("/chat"));
    }
}
