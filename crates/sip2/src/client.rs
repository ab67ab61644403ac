//! Request/response exchange with retries for SIP2 error detection.

use stacks_core::config::Sip2Config;
use stacks_core::error::{Result, StacksError};
use tracing::{debug, warn};

use crate::message::{Sip2Request, Sip2Response, REQUEST_SC_RESEND};
use crate::transport::Sip2Transport;

/// A SIP2 session over an open transport.
pub struct Sip2Client {
    transport: Box<dyn Sip2Transport>,
    error_detection: bool,
    max_retries: u32,
    sequence: u8,
}

impl Sip2Client {
    pub fn new(transport: Box<dyn Sip2Transport>, config: &Sip2Config) -> Self {
        Self {
            transport,
            error_detection: config.error_detection,
            max_retries: config.max_retries,
            sequence: 0,
        }
    }

    fn next_sequence(&mut self) -> Option<u8> {
        if !self.error_detection {
            return None;
        }
        let seq = self.sequence;
        self.sequence = (seq + 1) % 10;
        Some(seq)
    }

    /// Send a request and return the parsed reply.
    ///
    /// The same message is sent again when the ACS asks for a resend or, with
    /// error detection on, when the reply fails its checksum. After
    /// `max_retries` further attempts the exchange fails.
    pub async fn send(&mut self, request: &Sip2Request) -> Result<Sip2Response> {
        let message = self.encode(request);
        let mut retries = 0;
        loop {
            let raw = self.transport.exchange(&message).await?;
            let response = Sip2Response::parse(&raw)?;

            let problem = if response.command() == REQUEST_SC_RESEND {
                "resend requested"
            } else if self.error_detection && !response.checksum_valid() {
                "checksum mismatch"
            } else {
                if self.error_detection && !response.has_checksum() {
                    debug!(reply = %response.command(), "SIP2 reply carried no checksum");
                }
                debug!(
                    command = %request.command(),
                    reply = %response.command(),
                    sequence = ?response.sequence(),
                    "SIP2 exchange complete"
                );
                return Ok(response);
            };

            if retries >= self.max_retries {
                return Err(StacksError::Backend(format!(
                    "SIP2 {} failed: {problem} after {} attempts",
                    request.command(),
                    retries + 1
                )));
            }
            retries += 1;
            warn!(command = %request.command(), attempt = retries, "SIP2 {problem}, resending");
        }
    }

    fn encode(&mut self, request: &Sip2Request) -> String {
        let sequence = self.next_sequence();
        request.encode(sequence)
    }

    /// End the session. Consumes the client so the transport is closed once.
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}
