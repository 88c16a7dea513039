//! Push notifications over the classroom WebSocket.
//!
//! Every packet starts with a 16 byte big-endian header:
//!
//! | bytes | field                       |
//! |-------|-----------------------------|
//! | 0..4  | packet length incl. header  |
//! | 4..6  | header length (`0x0010`)    |
//! | 6..8  | protocol version (`0x0001`) |
//! | 8..12 | operation                   |
//! | 12..16| sequence                    |
//!
//! Slide notifications carry one or more nested packets whose bodies are JSON.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde::Serialize;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::Connector;

use crate::client::ClassroomClient;
use crate::config::Config;
use crate::display::SlideSink;
use crate::error::{Error, Result};
use crate::slides::SlideStore;

pub const HEADER_LEN: u16 = 16;
pub const PROTOCOL_VERSION: u16 = 1;
pub const OP_HEARTBEAT: u32 = 2;
pub const OP_AUTH: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub packet_len: u32,
    pub header_len: u16,
    pub version: u16,
    pub operation: u32,
    pub sequence: u32,
}

impl FrameHeader {
    pub fn parse(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < usize::from(HEADER_LEN) {
            return Err(Error::Frame(format!("{} bytes is shorter than a header", buf.len())));
        }
        let header = Self {
            packet_len: buf.get_u32(),
            header_len: buf.get_u16(),
            version: buf.get_u16(),
            operation: buf.get_u32(),
            sequence: buf.get_u32(),
        };
        if header.header_len < HEADER_LEN || header.packet_len < u32::from(header.header_len) {
            return Err(Error::Frame(format!(
                "inconsistent lengths: packet {} header {}",
                header.packet_len, header.header_len
            )));
        }
        Ok(header)
    }

    fn body_len(&self) -> usize {
        (self.packet_len - u32::from(self.header_len)) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Empty reply to the auth packet.
    AuthAck,
    /// Reply to a heartbeat, carrying the room's online count.
    HeartbeatAck { online: u32 },
    /// JSON payloads of the nested packets.
    Messages(Vec<Value>),
    Unknown(FrameHeader),
}

#[derive(Debug, Serialize)]
struct AuthBody<'a> {
    mid: i64,
    room_id: &'a str,
    platform: &'a str,
    accepts: [i64; 1],
}

pub fn encode(operation: u32, sequence: u32, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(usize::from(HEADER_LEN) + body.len());
    buf.put_u32(u32::from(HEADER_LEN) + body.len() as u32);
    buf.put_u16(HEADER_LEN);
    buf.put_u16(PROTOCOL_VERSION);
    buf.put_u32(operation);
    buf.put_u32(sequence);
    buf.put_slice(body);
    buf.freeze()
}

/// Joins the slide room of a course session.
pub fn encode_auth(user_id: i64, course_real_id: i64) -> Result<Bytes> {
    let room_id = format!("live_ppt://{course_real_id}");
    let body = serde_json::to_vec(&AuthBody {
        mid: user_id,
        room_id: &room_id,
        platform: "web",
        accepts: [course_real_id],
    })
    .map_err(|source| Error::Json {
        path: "auth".to_string(),
        source,
    })?;
    Ok(encode(OP_AUTH, 1, &body))
}

pub fn encode_heartbeat() -> Bytes {
    encode(OP_HEARTBEAT, 1, &[])
}

pub fn decode(data: &[u8]) -> Result<Frame> {
    let header = FrameHeader::parse(data)?;
    let end = header.packet_len as usize;
    if data.len() < end {
        return Err(Error::Frame(format!(
            "truncated packet: expected {end} bytes, got {}",
            data.len()
        )));
    }
    let body = &data[usize::from(header.header_len)..end];

    match body.len() {
        0 => Ok(Frame::AuthAck),
        4 => {
            let mut online = body;
            Ok(Frame::HeartbeatAck {
                online: online.get_u32(),
            })
        }
        _ => {
            let messages = nested_messages(body);
            if !messages.is_empty() {
                return Ok(Frame::Messages(messages));
            }
            match serde_json::from_slice(body) {
                Ok(value) => Ok(Frame::Messages(vec![value])),
                Err(_) => Ok(Frame::Unknown(header)),
            }
        }
    }
}

fn nested_messages(mut body: &[u8]) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(inner) = FrameHeader::parse(body) {
        let end = inner.packet_len as usize;
        if body.len() < end {
            break;
        }
        let payload = &body[usize::from(inner.header_len)..end];
        match serde_json::from_slice(payload) {
            Ok(value) => messages.push(value),
            Err(e) => tracing::debug!(len = inner.body_len(), "Nested packet is not JSON: {e}"),
        }
        body = &body[end..];
    }
    messages
}

/// Finds the slide image URL in a push message, either at the top level or
/// inside its `content` (object or JSON string).
pub fn ppt_url(message: &Value) -> Option<String> {
    let direct = |value: &Value| {
        value
            .get("pptimgurl")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    };

    direct(message).or_else(|| match message.get("content")? {
        Value::String(raw) => serde_json::from_str::<Value>(raw).ok().as_ref().and_then(direct),
        content => direct(content),
    })
}

/// Certificate verifier that trusts any server certificate, used when
/// `acceptInvalidCerts` is set. Handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// TLS connector for the WebSocket. `None` keeps the default verifying connector.
fn tls_connector(config: &Config) -> Result<Option<Connector>> {
    if !config.accept_invalid_certs {
        return Ok(None);
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
        .with_no_client_auth();
    Ok(Some(Connector::Rustls(Arc::new(tls))))
}

/// Heartbeat ticker; a stalled tick is pushed back instead of burst-fired.
fn heartbeat_ticker(config: &Config) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(config.heartbeat_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn ws_header(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::WebSocket(WsError::HttpFormat(e.into())))
}

/// Listens for pushed slides until the server closes the connection.
pub async fn listen(
    config: &Config,
    client: &ClassroomClient,
    store: &mut SlideStore,
    sink: &mut dyn SlideSink,
    user_id: i64,
    course_real_id: i64,
) -> Result<()> {
    let mut request = config.ws_url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(header::USER_AGENT, ws_header(&config.user_agent)?);
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::COOKIE, ws_header(&client.credentials().cookie_header)?);

    let connector = tls_connector(config)?;
    if connector.is_some() {
        tracing::warn!("TLS certificate verification is disabled for the WebSocket");
    }
    let (stream, _) =
        tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector).await?;
    let (mut write, mut read) = stream.split();
    tracing::info!(url = %config.ws_url, "WebSocket connected");

    let auth = encode_auth(user_id, course_real_id)?;
    tracing::debug!(packet = %hex::encode(&auth), "Sending auth packet");
    write.send(Message::Binary(auth.to_vec())).await?;

    loop {
        match read.next().await {
            Some(Ok(Message::Binary(data))) => match decode(&data)? {
                Frame::AuthAck => break,
                other => {
                    tracing::error!(reply = ?other, "Unexpected reply to auth packet");
                    return Err(Error::AuthRejected);
                }
            },
            Some(Ok(Message::Close(_))) | None => return Err(Error::AuthRejected),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
    tracing::info!(course_real_id, "Joined PPT room");

    let mut heartbeat = heartbeat_ticker(config);
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                write.send(Message::Binary(encode_heartbeat().to_vec())).await?;
            }
            message = read.next() => {
                let data = match message {
                    Some(Ok(Message::Binary(data))) => data,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "WebSocket closed by server");
                        return Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                };
                match decode(&data) {
                    Ok(Frame::HeartbeatAck { online }) => tracing::debug!(online, "Heartbeat acknowledged"),
                    Ok(Frame::Messages(messages)) => {
                        for message in messages {
                            handle_message(client, store, sink, &message).await;
                        }
                    }
                    Ok(Frame::AuthAck) => {}
                    Ok(Frame::Unknown(_)) | Err(_) => {
                        tracing::warn!(packet = %hex::encode(&data), "Failed to parse push packet");
                    }
                }
            }
        }
    }
}

async fn handle_message(
    client: &ClassroomClient,
    store: &mut SlideStore,
    sink: &mut dyn SlideSink,
    message: &Value,
) {
    let Some(url) = ppt_url(message) else {
        tracing::info!(%message, "Push message");
        return;
    };
    let index = store.seen_count() + 1;
    match store.fetch(client, index, &url).await {
        Ok(Some(slide)) => {
            if let Err(e) = sink.show(&slide) {
                tracing::warn!("Failed to display slide: {e}");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(%url, "Failed to download pushed slide: {e}"),
    }
}
