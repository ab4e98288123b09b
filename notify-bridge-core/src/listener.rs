/*
 * If not stated otherwise in this file or this component's LICENSE file the
 * following copyright and licenses apply:
 *
 * Copyright 2025 RDK Management
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
*/

#![deny(warnings)]
// Internal modules
use crate::frame_codec::{NotificationFrameCodec, MAX_FRAME_LEN};
use crate::next_task_id;
use crate::notification_codec::{DecodeError, PushGrammar};
use crate::notification_observer::NotificationObserver;

// External crates
use futures::StreamExt;
use sd_notify::NotifyState;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9998;
pub const READ_CHUNK_SIZE: usize = 1024;

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },
    #[error("Failed to accept connection: {0}")]
    Accept(io::Error),
    #[error("Failed to read from {peer}: {source}")]
    Read { peer: SocketAddr, source: io::Error },
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub address: String,
    pub port: u16,
    /// Deadline for the peer to connect and for each frame, none by default
    pub read_timeout: Option<Duration>,
    pub grammar: PushGrammar,
    /// Initial read buffer capacity
    pub chunk_size: usize,
    /// Longest unterminated frame kept before it is discarded
    pub max_frame_len: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            read_timeout: None,
            grammar: PushGrammar::default(),
            chunk_size: READ_CHUNK_SIZE,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerSummary {
    pub peer: Option<SocketAddr>,
    pub delivered: usize,
    pub rejected: usize,
}

///
/// Single-connection notification endpoint.
///
/// The listening socket is released as soon as a peer is accepted. The byte
/// stream of that peer is split into frames by [`NotificationFrameCodec`].
///
#[derive(Debug)]
pub struct NotificationListener {
    listener: TcpListener,
    config: ListenerConfig,
}

impl NotificationListener {
    pub async fn bind(config: ListenerConfig) -> Result<Self, ListenerError> {
        let address = format!("{}:{}", config.address, config.port);
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                error!(%address, %source, "failed to bind notification listener");
                return Err(ListenerError::Bind { address, source });
            }
        };

        info!(local_addr = ?listener.local_addr().ok(), "notification listener bound");
        if let Err(e) = sd_notify::notify(false, &[NotifyState::Ready]) {
            debug!("sd_notify failed: {e}");
        }

        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[instrument(skip_all, name = "notification_listener", fields(task = next_task_id()))]
    pub async fn run(
        self,
        mut observer: impl NotificationObserver,
        token: CancellationToken,
    ) -> Result<ListenerSummary, ListenerError> {
        let Self { listener, config } = self;
        let mut summary = ListenerSummary::default();

        let (stream, peer) = tokio::select! {
            _ = token.cancelled() => {
                info!("listener cancelled before a peer connected");
                return Ok(summary);
            }
            accepted = with_deadline(config.read_timeout, "a peer to connect", listener.accept()) => {
                accepted?.map_err(ListenerError::Accept)?
            }
        };
        drop(listener);

        info!(%peer, "peer connected");
        summary.peer = Some(peer);

        let codec = NotificationFrameCodec::new(config.grammar).with_max_length(config.max_frame_len);
        let mut frames = FramedRead::with_capacity(stream, codec, config.chunk_size.max(1));
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    info!(%peer, "listener cancelled");
                    break;
                }
                next = with_deadline(config.read_timeout, "peer data", frames.next()) => next?,
            };

            let Some(frame) = next else {
                info!(%peer, "peer closed the connection");
                break;
            };
            match frame.map_err(|source| ListenerError::Read { peer, source })? {
                Ok(message) => {
                    summary.delivered += 1;
                    observer.on_notification(message);
                }
                Err(DecodeError::EmptyFrame) => {}
                Err(e) => {
                    summary.rejected += 1;
                    warn!(%peer, "discarding frame: {e}");
                }
            }
        }

        debug!(?summary, "listener finished");
        Ok(summary)
    }
}

///
/// Binds on `address:port` and serves one peer with the default grammar
///
pub async fn start(
    address: &str,
    port: u16,
    observer: impl NotificationObserver,
    token: CancellationToken,
) -> Result<ListenerSummary, ListenerError> {
    let config = ListenerConfig {
        address: address.to_string(),
        port,
        ..Default::default()
    };
    NotificationListener::bind(config)
        .await?
        .run(observer, token)
        .await
}

async fn with_deadline<F: Future>(
    deadline: Option<Duration>,
    what: &'static str,
    future: F,
) -> Result<F::Output, ListenerError> {
    let Some(deadline) = deadline else {
        return Ok(future.await);
    };
    tokio::time::timeout(deadline, future).await.map_err(|_| {
        warn!("timed out after {deadline:?} waiting for {what}");
        ListenerError::Timeout(what)
    })
}
