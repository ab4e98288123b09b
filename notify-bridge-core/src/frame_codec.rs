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
use crate::notification_codec::{
    DecodeError, NotificationMessage, PushGrammar, PUSH_COMMAND, SENTINEL,
};

// External crates
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

/// Longest frame kept while waiting for its terminator
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    /// Ends after `:ENDNOT:`, its expiry digits and an optional line end
    Push,
    /// Ends after `\n`
    Line,
}

impl FrameKind {
    ///
    /// Classifies the frame at the head of `buffer`, `None` while a `PUSH`
    /// prefix could still turn out either way
    ///
    fn of(buffer: &[u8]) -> Option<Self> {
        let head = &buffer[..buffer.len().min(PUSH_COMMAND.len() + 1)];
        if head.len() == PUSH_COMMAND.len() + 1 && head.starts_with(PUSH_COMMAND) && head.ends_with(b" ") {
            return Some(Self::Push);
        }
        if head.len() <= PUSH_COMMAND.len() && PUSH_COMMAND.starts_with(head) {
            return None;
        }
        Some(Self::Line)
    }

    /// Length of the complete frame at the head of `buffer`
    fn frame_len(self, buffer: &[u8]) -> Option<usize> {
        match self {
            Self::Line => buffer.iter().position(|b| *b == b'\n').map(|i| i + 1),
            Self::Push => {
                let mut end = buffer
                    .windows(SENTINEL.len())
                    .position(|window| window == SENTINEL)?
                    + SENTINEL.len();
                end += count_while(&buffer[end..], |b| b.is_ascii_digit());
                end += count_while(&buffer[end..], |b| matches!(b, b' ' | b'\t' | b'\r'));
                if buffer.get(end) == Some(&b'\n') {
                    end += 1;
                }
                Some(end)
            }
        }
    }
}

fn count_while(buffer: &[u8], predicate: impl Fn(u8) -> bool) -> usize {
    buffer.iter().take_while(|b| predicate(**b)).count()
}

///
/// Splits the notification byte stream into frames and decodes each one.
///
/// A PUSH frame runs up to its sentinel (and the expiry digits and line end
/// written with it), so its payload may span reads and hold newlines. Any
/// other frame is one line. A frame still unterminated at end of stream is
/// decoded as is. Decode failures are items, so a bad frame never ends the
/// stream.
///
#[derive(Debug, Clone)]
pub struct NotificationFrameCodec {
    grammar: PushGrammar,
    max_length: usize,
    discarding: Option<FrameKind>,
}

impl NotificationFrameCodec {
    pub fn new(grammar: PushGrammar) -> Self {
        Self {
            grammar,
            max_length: MAX_FRAME_LEN,
            discarding: None,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length.max(1);
        self
    }

    pub fn grammar(&self) -> PushGrammar {
        self.grammar
    }

    fn decode_frame(&self, frame: &[u8]) -> Result<NotificationMessage, DecodeError> {
        trace!(len = frame.len(), "frame {:?}", String::from_utf8_lossy(frame));
        self.grammar.decode(frame)
    }

    /// Drops the rest of an oversized frame, returns false while its end is missing
    fn skip_discarded(&mut self, src: &mut BytesMut) -> bool {
        let Some(kind) = self.discarding else {
            return true;
        };
        match kind.frame_len(src) {
            Some(len) => {
                src.advance(len);
                self.discarding = None;
                true
            }
            None => {
                // the sentinel may be split across reads
                let keep = (SENTINEL.len() - 1).min(src.len());
                src.advance(src.len() - keep);
                false
            }
        }
    }
}

impl Default for NotificationFrameCodec {
    fn default() -> Self {
        Self::new(PushGrammar::default())
    }
}

impl Decoder for NotificationFrameCodec {
    type Item = Result<NotificationMessage, DecodeError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !self.skip_discarded(src) {
            return Ok(None);
        }

        let blank = count_while(src, |b| matches!(b, b'\r' | b'\n'));
        src.advance(blank);

        let Some(kind) = FrameKind::of(src) else {
            return Ok(None);
        };
        match kind.frame_len(src) {
            Some(len) => {
                let frame = src.split_to(len);
                Ok(Some(self.decode_frame(&frame)))
            }
            None if src.len() > self.max_length => {
                warn!(buffered = src.len(), "discarding unterminated frame");
                self.discarding = Some(kind);
                Ok(Some(Err(DecodeError::FrameTooLong(self.max_length))))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if self.discarding.take().is_some() {
            src.clear();
            return Ok(None);
        }
        if src.is_empty() {
            return Ok(None);
        }

        let frame = src.split();
        Ok(Some(self.decode_frame(&frame)))
    }
}

impl<'a> Encoder<&'a NotificationMessage> for NotificationFrameCodec {
    type Error = io::Error;

    fn encode(&mut self, message: &'a NotificationMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&self.grammar.encode(message));
        match message {
            NotificationMessage::Push(push) if push.expiry.is_none() => {}
            _ => dst.put_u8(b'\n'),
        }
        Ok(())
    }
}
