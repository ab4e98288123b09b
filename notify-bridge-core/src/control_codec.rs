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
    DecodeError, PayloadBoundary, PushGrammar, PushNotification, QueryKindRule, SenderId,
};

// External crates
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, one_of, space0, space1},
    combinator::{map, map_res, rest, value},
    sequence::preceded,
    Err as NomErr, IResult,
};

/// Grammar of the access point daemon control socket
pub const DAEMON_GRAMMAR: PushGrammar = PushGrammar {
    query_kind: QueryKindRule::Digit,
    payload_boundary: PayloadBoundary::TrimSeparator,
};

type ParseResult<'a, T> = IResult<&'a [u8], T, DecodeError>;

fn finish<T>(input: &[u8], result: ParseResult<'_, T>) -> Result<T, DecodeError> {
    match result {
        Ok((rest, value)) if trim(rest).is_empty() => Ok(value),
        Ok(_) => Err(DecodeError::UnrecognizedFrame),
        Err(NomErr::Error(e) | NomErr::Failure(e)) => Err(e),
        Err(NomErr::Incomplete(_)) if input.is_empty() => Err(DecodeError::EmptyFrame),
        Err(NomErr::Incomplete(_)) => Err(DecodeError::TruncatedFrame),
    }
}

fn trim(input: &[u8]) -> &[u8] {
    let end = input
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &input[..end]
}

fn decimal<T: std::str::FromStr>(input: &[u8]) -> ParseResult<'_, T> {
    map_res(digit1, |digits: &[u8]| {
        std::str::from_utf8(digits)
            .map_err(|_| ())
            .and_then(|digits| digits.parse::<T>().map_err(|_| ()))
    })(input)
}

fn sender_id(input: &[u8]) -> ParseResult<'_, SenderId> {
    let (input, _) = tag("Addr:")(input)?;
    SenderId::parse(input)
}

fn daemon_push(input: &[u8]) -> ParseResult<'_, PushNotification> {
    DAEMON_GRAMMAR.parse_push(input)
}

fn message_id(input: &[u8]) -> ParseResult<'_, u32> {
    preceded(tag("MID:"), preceded(space0, decimal))(input)
}

///
/// Commands written by the notifier to the daemon control socket
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCommand {
    Attach,
    Detach,
    Push(PushNotification),
    /// Default lifetime in seconds of pushed messages
    SetTime { seconds: u32 },
    Delete { message_id: u32 },
    DeleteAll,
    Ping,
    CheckFast(bool),
    /// Seconds an inactive node is remembered
    SetNodeTime { seconds: u32 },
}

impl NotifierCommand {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, DecodeError> {
        alt((
            map(daemon_push, NotifierCommand::Push),
            map(preceded(tag("SETTIME "), decimal), |seconds| {
                NotifierCommand::SetTime { seconds }
            }),
            map(preceded(tag("DELETE "), decimal), |message_id| {
                NotifierCommand::Delete { message_id }
            }),
            value(NotifierCommand::DeleteAll, tag("DELETEALL")),
            value(NotifierCommand::Attach, tag("ATTACH")),
            value(NotifierCommand::Detach, tag("DETACH")),
            value(NotifierCommand::Ping, tag("PING")),
            map(preceded(tag("CHECK_FAST "), one_of("01")), |fast| {
                NotifierCommand::CheckFast(fast == '1')
            }),
            map(preceded(tag("SETNODETIME "), decimal), |seconds| {
                NotifierCommand::SetNodeTime { seconds }
            }),
        ))(input)
    }

    pub fn decode(input: &[u8]) -> Result<Self, DecodeError> {
        if trim(input).is_empty() {
            return Err(DecodeError::EmptyFrame);
        }
        finish(input, Self::parse(input))
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::Attach => b"ATTACH".to_vec(),
            Self::Detach => b"DETACH".to_vec(),
            Self::Push(push) => DAEMON_GRAMMAR.encode(&push.clone().into()),
            Self::SetTime { seconds } => format!("SETTIME {seconds}").into_bytes(),
            Self::Delete { message_id } => format!("DELETE {message_id}").into_bytes(),
            Self::DeleteAll => b"DELETEALL".to_vec(),
            Self::Ping => b"PING".to_vec(),
            Self::CheckFast(fast) => format!("CHECK_FAST {}", u8::from(*fast)).into_bytes(),
            Self::SetNodeTime { seconds } => format!("SETNODETIME {seconds}").into_bytes(),
        }
    }
}

///
/// Daemon answer to a [`NotifierCommand`], written as one line
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    /// Identifier assigned to an accepted push
    MessageId(u32),
    Ok,
    Fail,
    Pong,
}

impl ControlReply {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, DecodeError> {
        alt((
            map(message_id, ControlReply::MessageId),
            value(ControlReply::Ok, tag("OK")),
            value(ControlReply::Fail, tag("FAIL")),
            value(ControlReply::Pong, tag("PONG")),
        ))(input)
    }

    pub fn decode(input: &[u8]) -> Result<Self, DecodeError> {
        if trim(input).is_empty() {
            return Err(DecodeError::EmptyFrame);
        }
        finish(input, Self::parse(input))
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::MessageId(id) => format!("MID: {id}\n").into_bytes(),
            Self::Ok => b"OK\n".to_vec(),
            Self::Fail => b"FAIL\n".to_vec(),
            Self::Pong => b"PONG\n".to_vec(),
        }
    }

    pub fn is_failure(&self) -> bool {
        *self == Self::Fail
    }
}

///
/// Unsolicited events the daemon reports about stations
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    /// A station started probing within range
    NewNode { addr: SenderId },
    /// A station was forgotten after inactivity
    OldNode { addr: SenderId },
    /// A station answered the notification `message_id`
    Response {
        addr: SenderId,
        message_id: u32,
        text: String,
    },
    /// A notification was transmitted to a station
    Sent {
        addr: SenderId,
        message_id: u32,
        unicast: bool,
    },
}

impl NotifierEvent {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, DecodeError> {
        alt((
            map(preceded(tag("NEWNODE"), preceded(space0, sender_id)), |addr| {
                NotifierEvent::NewNode { addr }
            }),
            map(preceded(tag("OLDNODE"), preceded(space0, sender_id)), |addr| {
                NotifierEvent::OldNode { addr }
            }),
            preceded(tag("NOT_RESP"), preceded(space0, Self::parse_response)),
            preceded(tag("SENDMSG"), preceded(space0, Self::parse_sent)),
        ))(input)
    }

    fn parse_response(input: &[u8]) -> ParseResult<'_, Self> {
        let (input, addr) = sender_id(input)?;
        let (input, _) = space0(input)?;
        let (input, message_id) = message_id(input)?;
        let (input, _) = tag("-")(input)?;
        let (input, text) = rest(input)?;
        let text = String::from_utf8_lossy(trim(text)).into_owned();
        Ok((
            input,
            Self::Response {
                addr,
                message_id,
                text,
            },
        ))
    }

    fn parse_sent(input: &[u8]) -> ParseResult<'_, Self> {
        let (input, addr) = sender_id(input)?;
        let (input, _) = space1(input)?;
        let (input, message_id) = message_id(input)?;
        let (input, _) = preceded(space1, tag("Type:"))(input)?;
        let (input, kind) = decimal::<u8>(input)?;
        Ok((
            input,
            Self::Sent {
                addr,
                message_id,
                unicast: kind != 0,
            },
        ))
    }

    pub fn decode(input: &[u8]) -> Result<Self, DecodeError> {
        if trim(input).is_empty() {
            return Err(DecodeError::EmptyFrame);
        }
        finish(input, Self::parse(input))
    }

    ///
    /// Serializes the event the way the daemon writes it on its socket,
    /// with no separator between event name and body
    ///
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::NewNode { addr } => format!("NEWNODEAddr:{addr}").into_bytes(),
            Self::OldNode { addr } => format!("OLDNODEAddr:{addr}").into_bytes(),
            Self::Response {
                addr,
                message_id,
                text,
            } => format!("NOT_RESPAddr:{addr}MID:{message_id}-{text}").into_bytes(),
            Self::Sent {
                addr,
                message_id,
                unicast,
            } => format!(
                "SENDMSGAddr:{addr} MID:{message_id} Type:{}",
                u8::from(*unicast)
            )
            .into_bytes(),
        }
    }

    pub fn addr(&self) -> SenderId {
        match self {
            Self::NewNode { addr }
            | Self::OldNode { addr }
            | Self::Response { addr, .. }
            | Self::Sent { addr, .. } => *addr,
        }
    }
}
