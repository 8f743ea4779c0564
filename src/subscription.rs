use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::frame::{Frame, Headers};

/// Subscription acknowledgement modes as defined by STOMP 1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(AckMode::Auto),
            "client" => Ok(AckMode::Client),
            "client-individual" => Ok(AckMode::ClientIndividual),
            other => Err(format!("unknown ack mode '{}'", other)),
        }
    }
}

/// Callback invoked for each MESSAGE delivered to a subscription, with the
/// frame and its body.
pub type MessageHandler = Box<dyn FnMut(&Frame, Option<&str>) + Send + 'static>;

/// A standing registration of interest in a destination.
pub struct Subscription {
    id: u64,
    destination: String,
    ack: AckMode,
    extra_headers: Headers,
    handler: MessageHandler,
}

impl Subscription {
    /// Returns the local subscription id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the destination this subscription listens to.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn ack(&self) -> AckMode {
        self.ack
    }

    pub fn extra_headers(&self) -> &Headers {
        &self.extra_headers
    }

    /// Build the SUBSCRIBE frame for this subscription.
    ///
    /// Extra headers are applied last and may override `id`, `destination`
    /// or `ack`.
    pub fn subscribe_frame(&self) -> Frame {
        let mut frame = Frame::new("SUBSCRIBE")
            .header("id", self.id.to_string())
            .header("destination", self.destination.as_str())
            .header("ack", self.ack.as_str());
        for (k, v) in &self.extra_headers {
            frame.headers.insert(k.clone(), v.clone());
        }
        frame
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("ack", &self.ack)
            .field("extra_headers", &self.extra_headers)
            .finish_non_exhaustive()
    }
}

/// Active subscriptions keyed by the decimal rendering of their id.
///
/// Ids start at 1, strictly increase and are never reused. There is no
/// removal: a subscription lives as long as the registry.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Subscription>,
    last_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and store the subscription. Returns the new id.
    pub fn register(
        &mut self,
        destination: impl Into<String>,
        ack: AckMode,
        extra_headers: Headers,
        handler: MessageHandler,
    ) -> u64 {
        self.last_id += 1;
        let id = self.last_id;
        self.entries.insert(
            id.to_string(),
            Subscription {
                id,
                destination: destination.into(),
                ack,
                extra_headers,
                handler,
            },
        );
        id
    }

    /// Look up a subscription by its string id (as found in the
    /// `subscription` header of a MESSAGE).
    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SUBSCRIBE frames for every registered subscription, ascending by id.
    pub fn subscribe_frames(&self) -> Vec<Frame> {
        let mut subs: Vec<&Subscription> = self.entries.values().collect();
        subs.sort_by_key(|s| s.id);
        subs.into_iter().map(Subscription::subscribe_frame).collect()
    }

    /// Deliver a MESSAGE frame to the subscription named by its
    /// `subscription` header.
    ///
    /// Returns `false` when no such subscription exists; the frame is not
    /// delivered anywhere in that case.
    pub fn dispatch(&mut self, frame: &Frame) -> bool {
        let Some(sub) = frame
            .get_header("subscription")
            .and_then(|id| self.entries.get_mut(id))
        else {
            return false;
        };
        (sub.handler)(frame, frame.body.as_deref());
        true
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("len", &self.entries.len())
            .field("last_id", &self.last_id)
            .finish()
    }
}
