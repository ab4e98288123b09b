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
use crate::control_codec::{ControlReply, NotifierCommand};
use crate::frame_codec::NotificationFrameCodec;
use crate::notification_codec::{NotificationMessage, PushGrammar};

// External crates
use anyhow::{anyhow, Context};
use bytes::BytesMut;
use futures::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Encoder, FramedRead, LinesCodec};
use tracing::{debug, info};

/// How long a control command waits for the daemon reply
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REPLY_LEN: usize = 4096;

///
/// Peer side of the notification socket
///
#[derive(Debug)]
pub struct NotificationSender {
    stream: TcpStream,
    codec: NotificationFrameCodec,
    peer: SocketAddr,
}

impl NotificationSender {
    pub async fn connect(address: impl ToSocketAddrs) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .context("Failed to connect to the notification listener")?;
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        info!(%peer, "connected to notification listener");
        Ok(Self {
            stream,
            codec: NotificationFrameCodec::default(),
            peer,
        })
    }

    pub fn with_grammar(mut self, grammar: PushGrammar) -> Self {
        self.codec = NotificationFrameCodec::new(grammar);
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    ///
    /// Writes one terminated frame, so the listener can tell it from the next
    ///
    pub async fn send(&mut self, message: &NotificationMessage) -> anyhow::Result<()> {
        let mut frame = BytesMut::new();
        self.codec.encode(message, &mut frame)?;
        self.send_raw(&frame).await
    }

    pub async fn send_raw(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        self.stream
            .write_all(frame)
            .await
            .with_context(|| format!("Failed to write frame to {}", self.peer))?;
        debug!(len = frame.len(), "frame sent");
        Ok(())
    }

    ///
    /// Writes a control command as one line and waits for the reply line
    ///
    pub async fn request(&mut self, command: &NotifierCommand) -> anyhow::Result<ControlReply> {
        let mut frame = command.serialize();
        frame.push(b'\n');
        self.send_raw(&frame).await?;

        let peer = self.peer;
        let mut replies = FramedRead::new(
            &mut self.stream,
            LinesCodec::new_with_max_length(MAX_REPLY_LEN),
        );
        let line = tokio::time::timeout(REPLY_TIMEOUT, replies.next())
            .await
            .with_context(|| format!("No reply from {peer} within {REPLY_TIMEOUT:?}"))?
            .ok_or_else(|| anyhow!("{peer} closed the connection before replying"))??;

        let reply = ControlReply::decode(line.as_bytes())
            .with_context(|| format!("Invalid reply {line:?} from {peer}"))?;
        debug!(?command, ?reply, "control command answered");
        Ok(reply)
    }

    ///
    /// Closes the write half so the listener sees the end of the stream
    ///
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
