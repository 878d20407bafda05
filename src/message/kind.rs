//! Type-level message kinds and kind sets.
//!
//! A kind pairs a wire `type` string with a payload type. A set is the closed
//! group of kinds a channel accepts in one direction. Both exist only for the
//! compiler: at runtime a channel routes on the plain `type` string.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// One message kind: its wire name and payload type.
///
/// Kinds without data use `Payload = ()`, which travels as an absent payload.
pub trait MessageKind: 'static {
    const TYPE: &'static str;
    type Payload: Serialize + DeserializeOwned + Send + 'static;
}

/// Marker for a closed set of message kinds.
pub trait MessageSet: 'static {}

/// `Self` accepts kind `K`.
pub trait Carries<K: MessageKind>: MessageSet {}

/// Set accepting every kind. Useful for bridges and dynamic routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyMessages;

impl MessageSet for AnyMessages {}

impl<K: MessageKind> Carries<K> for AnyMessages {}

/// Declare message kinds as unit marker types.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// pub struct Notify {
///     pub message: String,
/// }
///
/// typed_channel::message_kind! {
///     pub Ready = "ready";
///     pub NotifyKind = "notify": Notify;
/// }
///
/// use typed_channel::MessageKind;
/// assert_eq!(<Ready as MessageKind>::TYPE, "ready");
/// ```
#[macro_export]
macro_rules! message_kind {
    (@payload) => { () };
    (@payload $payload:ty) => { $payload };
    ($($(#[$meta:meta])* $vis:vis $kind:ident = $name:literal $(: $payload:ty)?;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            $vis struct $kind;

            impl $crate::MessageKind for $kind {
                const TYPE: &'static str = $name;
                type Payload = $crate::message_kind!(@payload $($payload)?);
            }
        )+
    };
}

/// Declare a message set over existing kinds.
///
/// ```
/// typed_channel::message_kind! {
///     pub StartTimer = "startTimer";
///     pub StopTimer = "stopTimer";
/// }
///
/// typed_channel::message_set! {
///     pub ClientMessages { StartTimer, StopTimer }
/// }
/// ```
#[macro_export]
macro_rules! message_set {
    ($(#[$meta:meta])* $vis:vis $set:ident { $($kind:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $set;

        impl $crate::MessageSet for $set {}

        $(impl $crate::Carries<$kind> for $set {})*
    };
}
