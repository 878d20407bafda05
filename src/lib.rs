//! typed-channel - typed message dispatch over pluggable transports
//!
//! A [`TypedChannel`] sends `{type, payload}` envelopes through one or more
//! [`Transport`]s and routes inbound envelopes to handlers by their `type`.
//! Which kinds may be received and which may be emitted is checked at
//! compile time through [`MessageSet`]s declared with [`message_kind!`] and
//! [`message_set!`].
//!
//! ```
//! use std::sync::Arc;
//! use typed_channel::{EventTargetTransport, TypedChannel};
//!
//! typed_channel::message_kind! {
//!     pub Ready = "ready";
//! }
//! typed_channel::message_set! {
//!     pub Lifecycle { Ready }
//! }
//!
//! let channel: TypedChannel<Lifecycle> = TypedChannel::new(EventTargetTransport::new()).unwrap();
//! let _subscription = channel.on(Ready, |()| println!("ready"));
//! channel.emit(Ready, ()).unwrap();
//! ```
pub mod codec;
pub mod error;
pub mod message;
pub mod subscription;
pub mod transport;
pub mod typed_channel;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{Codec, JsonCodec};
#[cfg(feature = "codec-cbor")]
pub use codec::CborCodec;
#[cfg(feature = "codec-messagepack")]
pub use codec::MessagePackCodec;
pub use error::{ChannelError, CodecError, Result, TransportError, TransportResult};
pub use message::Envelope;
pub use message::kind::{AnyMessages, Carries, MessageKind, MessageSet};
pub use subscription::Subscription;
pub use transport::broadcast::{BroadcastHub, BroadcastPort};
pub use transport::event_target::{CustomEvent, EventTarget, EventTargetTransport};
pub use transport::listeners::{ListenerId, ListenerList};
pub use transport::post_message::{MessageEvent, PostMessageTarget, PostMessageTransport};
pub use transport::worker::{LinkConfig, WorkerLink};
pub use transport::{EnvelopeHandler, Transport, TransportStats};
pub use typed_channel::{ChannelConfig, TypedChannel};
