// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::net::SocketAddr;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, error};

use crate::constants::MAX_REPLY_SIZE;
use crate::error::{DeviceErrorCode, DoHomeError, Result};

/// Malformed key emitted by some firmware in the router-connection reply.
const ROUTER_REPLY_QUIRK: &str = "\"cmd\":19\",ip\"";
const ROUTER_REPLY_FIXED: &str = "\"cmd\":19,\"ip\"";

/// Direct TCP request/response channel to one device.
///
/// The connection is opened on first use and kept for later commands. An I/O
/// error or timeout drops it so the next command reconnects. The stream lock is
/// held for the whole exchange: one command in flight per device.
pub struct DeviceSession {
    addr: SocketAddr,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl DeviceSession {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            addr,
            timeout,
            stream: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Send one JSON command line and wait for the JSON reply.
    ///
    /// A reply carrying a non-zero `res` is returned as an error.
    pub async fn send_command(&self, command: &str) -> Result<Value> {
        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            debug!(addr = %self.addr, "Connecting to device");
            let stream = timeout(self.timeout, TcpStream::connect(self.addr))
                .await
                .map_err(|_| DoHomeError::CommandTimeout {
                    command: command.to_string(),
                })??;
            *guard = Some(stream);
        }
        let Some(stream) = guard.as_mut() else {
            return Err(DoHomeError::Disconnected);
        };

        debug!(addr = %self.addr, "Sending command: {}", command);
        let reply = match timeout(self.timeout, exchange(stream, command)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!(addr = %self.addr, "Command failed: {}", e);
                *guard = None;
                return Err(e);
            }
            Err(_) => {
                *guard = None;
                return Err(DoHomeError::CommandTimeout {
                    command: command.to_string(),
                });
            }
        };
        drop(guard);

        debug!(addr = %self.addr, "Received reply: {}", reply);
        parse_reply(&reply)
    }

    /// Close the connection, if open.
    pub async fn close(&self) {
        if let Some(mut stream) = self.stream.lock().await.take() {
            let _ = stream.shutdown().await;
        }
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("addr", &self.addr)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Write one command line and read the reply with a single read.
async fn exchange(stream: &mut TcpStream, command: &str) -> Result<String> {
    let mut line = command.to_string();
    if !line.ends_with("\r\n") {
        line.push_str("\r\n");
    }
    stream.write_all(line.as_bytes()).await?;

    let mut buf = vec![0u8; MAX_REPLY_SIZE];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(DoHomeError::Disconnected);
    }
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

/// Decode a device reply and check its `res` field.
pub fn parse_reply(reply: &str) -> Result<Value> {
    let fixed = reply.trim().replace(ROUTER_REPLY_QUIRK, ROUTER_REPLY_FIXED);
    let value: Value = serde_json::from_str(&fixed)?;

    if let Some(res) = value.get("res") {
        let code = res.as_i64().ok_or_else(|| DoHomeError::InvalidResponse {
            details: format!("non-numeric res: {res}"),
        })?;
        if code != 0 {
            return Err(match DeviceErrorCode::from_code(code) {
                Some(err) => DoHomeError::DeviceError(err),
                None => DoHomeError::UnknownDeviceError(code),
            });
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_reply_ok() {
        let value = parse_reply(r#"{"res":0,"cmd":20,"ver":"1.1.0"}"#).unwrap();
        assert_eq!(value["ver"], "1.1.0");
    }

    #[test]
    fn test_parse_reply_repairs_router_quirk() {
        let value = parse_reply(r#"{"res":0,"cmd":19",ip":"192.168.1.42"}"#).unwrap();
        assert_eq!(value["cmd"], 19);
        assert_eq!(value["ip"], "192.168.1.42");
    }

    #[test]
    fn test_parse_reply_device_error() {
        let err = parse_reply(r#"{"res":26,"cmd":99}"#).unwrap_err();
        assert!(matches!(err, DoHomeError::DeviceError(DeviceErrorCode::UnknownCmd)));

        let err = parse_reply(r#"{"res":200,"cmd":3}"#).unwrap_err();
        assert!(matches!(err, DoHomeError::UnknownDeviceError(200)));
    }

    #[test]
    fn test_parse_reply_bad_json() {
        assert!(matches!(parse_reply("garbage"), Err(DoHomeError::Json(_))));
    }

    /// A fake device that answers each line with the given replies in order.
    async fn fake_device(replies: Vec<&'static str>) -> (SocketAddr, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let mut seen = Vec::new();
            for reply in replies {
                let Some(line) = lines.next_line().await.unwrap() else { break };
                seen.push(line);
                writer.write_all(reply.as_bytes()).await.unwrap();
            }
            seen
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_session_reuses_connection() {
        let (addr, device) = fake_device(vec![
            r#"{"res":0,"cmd":20,"ver":"1.1.0"}"#,
            r#"{"res":0,"cmd":25,"r":1,"g":2,"b":3,"w":4,"m":5}"#,
        ])
        .await;

        let session = DeviceSession::new(addr, Duration::from_secs(2));
        let version = session.send_command(r#"{"cmd":20}"#).await.unwrap();
        assert_eq!(version["ver"], "1.1.0");
        assert!(session.is_connected().await);

        let status = session.send_command(r#"{"cmd":25}"#).await.unwrap();
        assert_eq!(status["g"], 2);

        let seen = device.await.unwrap();
        assert_eq!(seen, vec![r#"{"cmd":20}"#.to_string(), r#"{"cmd":25}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_close_then_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = tokio::spawn(async move {
            let mut accepted = 0;
            for _ in 0..2 {
                let (stream, _) = listener.accept().await.unwrap();
                accepted += 1;
                let (reader, mut writer) = stream.into_split();
                let mut lines = BufReader::new(reader).lines();
                if lines.next_line().await.unwrap().is_some() {
                    writer.write_all(br#"{"res":0,"cmd":20,"ver":"1.1.0"}"#).await.unwrap();
                }
            }
            accepted
        });

        let session = DeviceSession::new(addr, Duration::from_secs(2));
        session.send_command(r#"{"cmd":20}"#).await.unwrap();
        session.close().await;
        assert!(!session.is_connected().await);

        // Next command opens a fresh connection
        session.send_command(r#"{"cmd":20}"#).await.unwrap();
        assert!(session.is_connected().await);
        assert_eq!(device.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_session_drops_connection_on_close() {
        let (addr, _device) = fake_device(vec![]).await;
        let session = DeviceSession::new(addr, Duration::from_secs(2));

        let err = session.send_command(r#"{"cmd":3}"#).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!session.is_connected().await);
    }
}
