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
// External crates
use bytes::Bytes;
use nom::{
    bytes::complete::{tag, take, take_until},
    character::complete::digit1,
    error::{ErrorKind, FromExternalError, ParseError},
    Err as NomErr, IResult,
};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const PUSH_COMMAND: &[u8] = b"PUSH";
pub const SENTINEL: &[u8] = b":ENDNOT:";
pub const SENDER_ID_LEN: usize = 17;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty frame")]
    EmptyFrame,
    #[error("Unrecognized frame")]
    UnrecognizedFrame,
    #[error("Truncated frame")]
    TruncatedFrame,
    #[error("Frame exceeds {0} bytes without a terminator")]
    FrameTooLong(usize),
}

impl ParseError<&[u8]> for DecodeError {
    fn from_error_kind(_input: &[u8], kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Eof => Self::TruncatedFrame,
            _ => Self::UnrecognizedFrame,
        }
    }

    fn append(_input: &[u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<E> FromExternalError<&[u8], E> for DecodeError {
    fn from_external_error(_input: &[u8], _kind: ErrorKind, _e: E) -> Self {
        Self::UnrecognizedFrame
    }
}

type ParseResult<'a, T> = IResult<&'a [u8], T, DecodeError>;

fn fail<'a, T>(error: DecodeError) -> ParseResult<'a, T> {
    Err(NomErr::Failure(error))
}

fn finish<T>(result: ParseResult<'_, T>) -> Result<T, DecodeError> {
    match result {
        Ok((_, value)) => Ok(value),
        Err(NomErr::Error(e) | NomErr::Failure(e)) => Err(e),
        Err(NomErr::Incomplete(_)) => Err(DecodeError::TruncatedFrame),
    }
}

///
/// Fixed-width identifier of the station a push is addressed to.
///
/// Usually a colon separated MAC address, but only its width is checked.
///
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId([u8; SENDER_ID_LEN]);

impl SenderId {
    pub const BROADCAST: Self = Self(*b"ff:ff:ff:ff:ff:ff");

    pub const fn new(raw: [u8; SENDER_ID_LEN]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, DecodeError> {
        let (input, raw) = take(SENDER_ID_LEN)(input)?;
        let mut id = [0u8; SENDER_ID_LEN];
        id.copy_from_slice(raw);
        Ok((input, Self(id)))
    }
}

impl TryFrom<&[u8]> for SenderId {
    type Error = DecodeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value.len() {
            SENDER_ID_LEN => finish(Self::parse(value)),
            n if n < SENDER_ID_LEN => Err(DecodeError::TruncatedFrame),
            _ => Err(DecodeError::UnrecognizedFrame),
        }
    }
}

impl FromStr for SenderId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.as_bytes())
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SenderId({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub sender_id: SenderId,
    pub query_kind: u8,
    pub payload: Bytes,
    /// Seconds the daemon keeps the message, written after the sentinel
    pub expiry: Option<u32>,
}

impl PushNotification {
    pub fn new(sender_id: SenderId, query_kind: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sender_id,
            query_kind,
            payload: payload.into(),
            expiry: None,
        }
    }

    pub fn with_expiry(mut self, seconds: u32) -> Self {
        self.expiry = Some(seconds);
        self
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, DecodeError> {
        PushGrammar::default().parse_push(input)
    }

    pub fn serialize(&self) -> Vec<u8> {
        PushGrammar::default().serialize_push(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCommand {
    pub token: String,
}

impl PlainCommand {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, DecodeError> {
        let token = trim_trailing_whitespace(input);
        let Some(first) = token.first() else {
            return fail(DecodeError::EmptyFrame);
        };
        if first.is_ascii_whitespace() || !token.iter().all(|b| is_token_byte(*b)) {
            return fail(DecodeError::UnrecognizedFrame);
        }

        let token = String::from_utf8_lossy(token).into_owned();
        Ok((&input[input.len()..], Self { token }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.token.as_bytes().to_vec()
    }
}

impl fmt::Display for PlainCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationMessage {
    Push(PushNotification),
    Plain(PlainCommand),
}

impl NotificationMessage {
    pub fn plain(token: impl Into<String>) -> Self {
        Self::Plain(PlainCommand::new(token))
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Self::Push(_))
    }

    pub fn serialize(&self) -> Vec<u8> {
        PushGrammar::default().encode(self)
    }
}

impl From<PushNotification> for NotificationMessage {
    fn from(value: PushNotification) -> Self {
        Self::Push(value)
    }
}

impl From<PlainCommand> for NotificationMessage {
    fn from(value: PlainCommand) -> Self {
        Self::Plain(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryKindRule {
    /// Any single byte is accepted
    #[default]
    AnyByte,
    /// Only an ASCII digit is accepted
    Digit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadBoundary {
    /// The payload runs up to the sentinel, including the space before it
    #[default]
    KeepSeparator,
    /// The single space before the sentinel separates payload and sentinel
    TrimSeparator,
}

///
/// Decoding rules of the PUSH frame which differ between daemons
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushGrammar {
    pub query_kind: QueryKindRule,
    pub payload_boundary: PayloadBoundary,
}

impl PushGrammar {
    pub fn decode(&self, buffer: &[u8]) -> Result<NotificationMessage, DecodeError> {
        if buffer.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::EmptyFrame);
        }

        if buffer.starts_with(PUSH_COMMAND) {
            finish(self.parse_push(buffer)).map(NotificationMessage::Push)
        } else {
            finish(PlainCommand::parse(buffer)).map(NotificationMessage::Plain)
        }
    }

    pub fn encode(&self, message: &NotificationMessage) -> Vec<u8> {
        match message {
            NotificationMessage::Push(push) => self.serialize_push(push),
            NotificationMessage::Plain(plain) => plain.serialize(),
        }
    }

    pub fn parse_push<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], PushNotification, DecodeError> {
        let (input, _) = tag(PUSH_COMMAND)(input)?;
        if trim_trailing_whitespace(input).is_empty() {
            return fail(DecodeError::TruncatedFrame);
        }

        let (input, _) = separator(input)?;
        let (input, sender_id) = SenderId::parse(input)?;
        let (input, _) = separator(input)?;
        let (input, query_kind) = nom::number::complete::u8(input)?;
        if self.query_kind == QueryKindRule::Digit && !query_kind.is_ascii_digit() {
            return fail(DecodeError::UnrecognizedFrame);
        }

        let (input, (payload, expiry)) = self.parse_body(input)?;
        Ok((
            input,
            PushNotification {
                sender_id,
                query_kind,
                payload: Bytes::copy_from_slice(payload),
                expiry,
            },
        ))
    }

    fn parse_body<'a>(&self, input: &'a [u8]) -> ParseResult<'a, (&'a [u8], Option<u32>)> {
        if trim_trailing_whitespace(input).is_empty() {
            return Ok((&input[input.len()..], (&input[..0], None)));
        }
        let (input, _) = separator(input)?;

        let Ok((input, mut payload)) = take_until::<_, _, DecodeError>(SENTINEL)(input) else {
            let payload = trim_trailing_newline(input);
            return Ok((&input[input.len()..], (payload, None)));
        };

        let (input, _) = tag(SENTINEL)(input)?;
        let (input, expiry) = parse_expiry(input)?;

        if self.payload_boundary == PayloadBoundary::TrimSeparator {
            payload = payload.strip_suffix(b" ").unwrap_or(payload);
        }
        Ok((input, (payload, expiry)))
    }

    fn serialize_push(&self, push: &PushNotification) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(
            PUSH_COMMAND.len() + SENDER_ID_LEN + push.payload.len() + SENTINEL.len() + 16,
        );
        buffer.extend_from_slice(PUSH_COMMAND);
        buffer.push(b' ');
        buffer.extend_from_slice(push.sender_id.as_bytes());
        buffer.push(b' ');
        buffer.push(push.query_kind);
        buffer.push(b' ');
        buffer.extend_from_slice(&push.payload);
        if self.payload_boundary == PayloadBoundary::TrimSeparator {
            buffer.push(b' ');
        }
        buffer.extend_from_slice(SENTINEL);
        if let Some(expiry) = push.expiry {
            buffer.extend_from_slice(expiry.to_string().as_bytes());
        }
        buffer
    }
}

fn separator(input: &[u8]) -> ParseResult<'_, ()> {
    match input.split_first() {
        None => fail(DecodeError::TruncatedFrame),
        Some((b' ', rest)) => Ok((rest, ())),
        Some(_) => fail(DecodeError::UnrecognizedFrame),
    }
}

fn parse_expiry(input: &[u8]) -> ParseResult<'_, Option<u32>> {
    let trailer = trim_trailing_whitespace(input);
    if trailer.is_empty() {
        return Ok((&input[input.len()..], None));
    }

    let (rest, digits) = digit1(trailer)?;
    if !rest.is_empty() {
        return fail(DecodeError::UnrecognizedFrame);
    }
    let expiry = std::str::from_utf8(digits)
        .ok()
        .and_then(|digits| digits.parse().ok());
    match expiry {
        Some(expiry) => Ok((&input[input.len()..], Some(expiry))),
        None => fail(DecodeError::UnrecognizedFrame),
    }
}

fn is_token_byte(byte: u8) -> bool {
    byte == b'\t' || (b' '..=b'~').contains(&byte)
}

fn trim_trailing_whitespace(input: &[u8]) -> &[u8] {
    let end = input
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &input[..end]
}

fn trim_trailing_newline(input: &[u8]) -> &[u8] {
    let input = input.strip_suffix(b"\n").unwrap_or(input);
    input.strip_suffix(b"\r").unwrap_or(input)
}

///
/// Decodes one frame with the default grammar
///
pub fn decode(buffer: &[u8]) -> Result<NotificationMessage, DecodeError> {
    PushGrammar::default().decode(buffer)
}

///
/// Encodes one frame with the default grammar, always terminating PUSH
/// frames with the sentinel
///
pub fn encode(message: &NotificationMessage) -> Vec<u8> {
    PushGrammar::default().encode(message)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCENARIO_FRAME: &[u8] = b"PUSH 00:e0:4c:7d:f1:ac 0 I am good, thank you! :ENDNOT:";
    // "PUSH <sender id> <kind>"
    const MINIMUM_PUSH_LEN: usize = PUSH_COMMAND.len() + 1 + SENDER_ID_LEN + 2;

    fn station() -> SenderId {
        "00:e0:4c:7d:f1:ac".parse().unwrap()
    }

    fn digit_grammar() -> PushGrammar {
        PushGrammar {
            query_kind: QueryKindRule::Digit,
            ..Default::default()
        }
    }

    fn trim_grammar() -> PushGrammar {
        PushGrammar {
            payload_boundary: PayloadBoundary::TrimSeparator,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_scenario_push() {
        let NotificationMessage::Push(push) = decode(SCENARIO_FRAME).unwrap() else {
            panic!("expected a push notification");
        };
        assert_eq!(push.sender_id.as_bytes(), b"00:e0:4c:7d:f1:ac");
        assert_eq!(push.query_kind, b'0');
        assert_eq!(push.payload, &b"I am good, thank you! "[..]);
        assert_eq!(push.expiry, None);
    }

    #[test]
    fn test_trim_separator_drops_space_before_sentinel() {
        let NotificationMessage::Push(push) = trim_grammar().decode(SCENARIO_FRAME).unwrap() else {
            panic!("expected a push notification");
        };
        assert_eq!(push.payload, &b"I am good, thank you!"[..]);
        assert_eq!(trim_grammar().serialize_push(&push), SCENARIO_FRAME);
    }

    #[test]
    fn test_decode_expiry_after_sentinel() {
        let frame = b"PUSH ff:ff:ff:ff:ff:ff 1 hello :ENDNOT:30\n";
        let NotificationMessage::Push(push) = decode(frame).unwrap() else {
            panic!("expected a push notification");
        };
        assert!(push.sender_id.is_broadcast());
        assert_eq!(push.expiry, Some(30));
        assert_eq!(push.payload, &b"hello "[..]);

        assert_eq!(
            decode(b"PUSH ff:ff:ff:ff:ff:ff 1 hello :ENDNOT:soon"),
            Err(DecodeError::UnrecognizedFrame)
        );
    }

    #[test]
    fn test_decode_without_sentinel() {
        let push = PushNotification::new(station(), b'1', &b"no sentinel"[..]);
        assert_eq!(
            decode(b"PUSH 00:e0:4c:7d:f1:ac 1 no sentinel\r\n"),
            Ok(push.into())
        );

        let empty = PushNotification::new(station(), b'1', Bytes::new());
        assert_eq!(decode(b"PUSH 00:e0:4c:7d:f1:ac 1"), Ok(empty.clone().into()));
        assert_eq!(decode(b"PUSH 00:e0:4c:7d:f1:ac 1\n"), Ok(empty.into()));
    }

    #[test]
    fn test_decode_truncated_push() {
        for frame in [
            &b"PUSH"[..],
            b"PUSH\n",
            b"PUSH ",
            b"PUSH 00:e0:4c:7d",
            b"PUSH 00:e0:4c:7d:f1:ac",
            b"PUSH 00:e0:4c:7d:f1:ac ",
        ] {
            assert_eq!(decode(frame), Err(DecodeError::TruncatedFrame), "{frame:?}");
        }
    }

    #[test]
    fn test_decode_unrecognized() {
        for frame in [
            &b"PUSHED"[..],
            b"PUSH 00:e0:4c:7d:f1:ac-0 hi",
            b"PUSH 00:e0:4c:7d:f1:ac 0hi",
            b" prob_req",
            b"prob\x01req",
            b"\xffprob_req",
        ] {
            assert_eq!(decode(frame), Err(DecodeError::UnrecognizedFrame), "{frame:?}");
        }
    }

    #[test]
    fn test_query_kind_rule() {
        let frame = b"PUSH 00:e0:4c:7d:f1:ac x hello :ENDNOT:";
        assert!(decode(frame).is_ok());
        assert_eq!(digit_grammar().decode(frame), Err(DecodeError::UnrecognizedFrame));
        assert!(digit_grammar().decode(SCENARIO_FRAME).is_ok());
    }

    #[test]
    fn test_decode_plain_tokens() {
        assert_eq!(decode(b"prob_req"), Ok(NotificationMessage::plain("prob_req")));
        assert_eq!(decode(b"hl_query\r\n"), Ok(NotificationMessage::plain("hl_query")));
        assert_eq!(decode(b"PING"), Ok(NotificationMessage::plain("PING")));
        assert_eq!(decode(b"DELETE 12"), Ok(NotificationMessage::plain("DELETE 12")));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode(b""), Err(DecodeError::EmptyFrame));
        assert_eq!(decode(b" \r\n\t"), Err(DecodeError::EmptyFrame));
    }

    #[test]
    fn test_encode_appends_sentinel() {
        let push = PushNotification::new(station(), b'0', &b"I am good, thank you! "[..]);
        assert_eq!(encode(&push.clone().into()), SCENARIO_FRAME);
        assert_eq!(
            push.with_expiry(5).serialize(),
            b"PUSH 00:e0:4c:7d:f1:ac 0 I am good, thank you! :ENDNOT:5"
        );
    }

    #[test]
    fn test_sender_id_width() {
        assert_eq!(SenderId::try_from(&b"00:e0"[..]), Err(DecodeError::TruncatedFrame));
        assert_eq!(
            SenderId::try_from(&b"00:e0:4c:7d:f1:ac:00"[..]),
            Err(DecodeError::UnrecognizedFrame)
        );
        assert_eq!(station().to_string(), "00:e0:4c:7d:f1:ac");
    }

    #[test]
    fn test_check_consumption_of_push_parser() {
        let (rest, _) = PushNotification::parse(SCENARIO_FRAME).unwrap();
        assert!(rest.is_empty());
    }

    fn push_strategy() -> impl Strategy<Value = PushNotification> {
        (
            any::<[u8; SENDER_ID_LEN]>(),
            any::<u8>(),
            proptest::collection::vec(any::<u8>(), 0..256),
            proptest::option::of(any::<u32>()),
        )
            .prop_map(|(sender_id, query_kind, payload, expiry)| PushNotification {
                sender_id: SenderId::new(sender_id),
                query_kind,
                payload: payload.into(),
                expiry,
            })
            // the first sentinel in the frame must be the terminating one
            .prop_filter("payload overlaps the sentinel", |push| {
                let mut body = push.payload.to_vec();
                body.extend_from_slice(SENTINEL);
                body.windows(SENTINEL.len()).position(|w| w == SENTINEL)
                    == Some(push.payload.len())
            })
    }

    proptest! {
        #[test]
        fn prop_push_round_trip(push in push_strategy()) {
            let message = NotificationMessage::Push(push);
            prop_assert_eq!(decode(&encode(&message)), Ok(message.clone()));
        }

        #[test]
        fn prop_trimmed_push_round_trip(push in push_strategy()) {
            let grammar = trim_grammar();
            let message = NotificationMessage::Push(push);
            prop_assert_eq!(grammar.decode(&grammar.encode(&message)), Ok(message.clone()));
        }

        #[test]
        fn prop_short_push_is_truncated(push in push_strategy(), cut in PUSH_COMMAND.len()..MINIMUM_PUSH_LEN) {
            let frame = push.serialize();
            prop_assert_eq!(decode(&frame[..cut]), Err(DecodeError::TruncatedFrame));
        }
    }
}
