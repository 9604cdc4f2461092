//! `device_connect` → `device_connect_response` exchange.

use std::time::Duration;

use mg_protocol::{Message, ResponseType, ServerMessage, ServerPayload};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::transport::send_request;
use crate::types::{ClientError, Rejection};

/// Send the pre-encoded connect envelope and check the gateway's verdict.
pub async fn perform<S>(
    stream: &mut S,
    connect_message: &[u8],
    timeout: Duration,
    max_frame_bytes: usize,
) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let response = send_request(stream, connect_message, timeout, max_frame_bytes).await?;
    interpret_response(&response)
}

/// `Ok` only for [`ResponseType::Ok`].  Known refusals become
/// [`ClientError::Rejected`]; anything else is malformed.
pub fn interpret_response(response: &[u8]) -> Result<(), ClientError> {
    let message = ServerMessage::decode(response)?;
    let connect_response = match message.payload {
        Some(ServerPayload::DeviceConnectResponse(r)) => r,
        _ => {
            tracing::error!("device_connect_response missing in server message");
            return Err(ClientError::MalformedResponse(
                "device_connect_response missing in server message".into(),
            ));
        }
    };

    let code = ResponseType::try_from(connect_response.response_type).map_err(|_| {
        ClientError::MalformedResponse(format!(
            "invalid response_type {} in device_connect_response",
            connect_response.response_type
        ))
    })?;

    match Rejection::from_response(code) {
        None => Ok(()),
        Some(rejection) => Err(ClientError::Rejected(rejection)),
    }
}
