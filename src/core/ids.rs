//! Identifier, reference, and delta-id model (specification §3).
//!
//! A [`Guid`] is `(client id, client delta id, within-delta id)`. A [`DeltaId`]
//! is the `(client id, client delta id)` prefix of a `Guid` that names a
//! single delta application. [`Id<A>`] tags a `Guid` with a phantom model
//! type; [`Ref<A>`] is an `Id<A>` that may additionally carry the revision
//! `Guid` it was resolved against.

use crate::core::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wire shape shared by every bare numeric id: `{"id": N}`, matching the
/// specification's `{"clientId": {"id": N}}` / `{"id": {"id": MID}}` forms.
#[derive(Serialize, Deserialize)]
struct IdField {
    id: u64,
}

macro_rules! wire_object_id {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                IdField { id: self.0 }.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                IdField::deserialize(deserializer).map(|f| $ty(f.id))
            }
        }
    };
}

/// Opaque 64-bit client identifier, assigned by the server on first full update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClientId(pub u64);
wire_object_id!(ClientId);

/// Per-client monotone delta counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClientDeltaId(pub u64);
wire_object_id!(ClientDeltaId);

/// Within-delta counter, reset to zero at the start of each delta execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WithinDeltaId(pub u64);
wire_object_id!(WithinDeltaId);

/// `(client id, client delta id)` — globally unique across all deltas ever applied.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaId {
    /// The connection that minted this delta.
    pub client_id: ClientId,
    /// The delta's sequence number within that connection.
    pub client_delta_id: ClientDeltaId,
}

impl DeltaId {
    /// Construct a delta id.
    pub fn new(client_id: ClientId, client_delta_id: ClientDeltaId) -> Self {
        Self { client_id, client_delta_id }
    }
}

impl fmt::Debug for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeltaId({}, {})", self.client_id.0, self.client_delta_id.0)
    }
}

/// `(client id, client delta id, within-delta id)` — a globally unique identifier
/// minted while interpreting one delta.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Guid {
    /// The delta that minted this guid.
    pub delta_id: DeltaId,
    /// The sequence number within that delta's execution.
    pub within_delta_id: WithinDeltaId,
}

impl Guid {
    /// Construct a guid directly.
    pub fn new(delta_id: DeltaId, within_delta_id: WithinDeltaId) -> Self {
        Self { delta_id, within_delta_id }
    }

    fn hex_parts(&self) -> (String, String, String) {
        (
            format!("{:x}", self.delta_id.client_id.0),
            format!("{:x}", self.delta_id.client_delta_id.0),
            format!("{:x}", self.within_delta_id.0),
        )
    }

    /// Render as `guid-<hex>-<hex>-<hex>`.
    pub fn to_canonical_string(&self) -> String {
        let (a, b, c) = self.hex_parts();
        format!("guid-{a}-{b}-{c}")
    }

    fn parse_hex_triplet(tag: &str, s: &str) -> Result<(u64, u64, u64), CodecError> {
        let rest = s
            .strip_prefix(tag)
            .ok_or_else(|| CodecError::UnknownTag(s.to_string()))?;
        let parts: Vec<&str> = rest.splitn(3, '-').collect();
        if parts.len() != 3 {
            return Err(CodecError::MalformedIdentifier(s.to_string()));
        }
        let parse = |seg: &str| {
            u64::from_str_radix(seg, 16)
                .map_err(|e| CodecError::InvalidHex(seg.to_string(), e))
        };
        Ok((parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }

    /// Parse a `guid-...` string, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        let lower = s.to_ascii_lowercase();
        let (client, delta, within) = Self::parse_hex_triplet("guid-", &lower)?;
        Ok(Guid::new(
            DeltaId::new(ClientId(client), ClientDeltaId(delta)),
            WithinDeltaId(within),
        ))
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl Serialize for Guid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Guid::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A `Guid` tagged with a phantom model type `A`.
pub struct Id<A> {
    guid: Guid,
    _marker: PhantomData<fn() -> A>,
}

impl<A> Id<A> {
    /// Wrap a guid as a typed id.
    pub fn new(guid: Guid) -> Self {
        Self { guid, _marker: PhantomData }
    }

    /// The underlying guid.
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// Render as `id-<hex>-<hex>-<hex>`.
    pub fn to_canonical_string(&self) -> String {
        let s = self.guid.to_canonical_string();
        format!("id-{}", &s["guid-".len()..])
    }

    /// Parse an `id-...` string, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        let lower = s.to_ascii_lowercase();
        let (client, delta, within) = Guid::parse_hex_triplet("id-", &lower)?;
        Ok(Id::new(Guid::new(
            DeltaId::new(ClientId(client), ClientDeltaId(delta)),
            WithinDeltaId(within),
        )))
    }

    /// Promote to a resolved reference at the given revision.
    pub fn resolved_at(self, revision: Guid) -> Ref<A> {
        Ref { id: self.guid, revision: Some(revision), _marker: PhantomData }
    }

    /// Promote to an unresolved reference.
    pub fn unresolved(self) -> Ref<A> {
        Ref { id: self.guid, revision: None, _marker: PhantomData }
    }
}

impl<A> Clone for Id<A> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<A> Copy for Id<A> {}
impl<A> PartialEq for Id<A> {
    fn eq(&self, other: &Self) -> bool {
        self.guid == other.guid
    }
}
impl<A> Eq for Id<A> {}
impl<A> fmt::Debug for Id<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}
impl<A> Serialize for Id<A> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_canonical_string())
    }
}
impl<'de, A> Deserialize<'de> for Id<A> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Id::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A reference to a registered value of type `A`: either unresolved (just an
/// id) or resolved (an id plus the revision it was resolved at).
pub struct Ref<A> {
    id: Guid,
    revision: Option<Guid>,
    _marker: PhantomData<fn() -> A>,
}

impl<A> Ref<A> {
    /// The id this reference points at.
    pub fn id(&self) -> Id<A> {
        Id::new(self.id)
    }

    /// The revision this reference was resolved at, if any.
    pub fn revision(&self) -> Option<Guid> {
        self.revision
    }

    /// Whether this reference is resolved.
    pub fn is_resolved(&self) -> bool {
        self.revision.is_some()
    }

    /// Render as `ref-<hex>-<hex>-<hex>`. Unresolved and resolved references
    /// share the same wire form (the revision is carried out-of-band by the
    /// registry, not encoded in the string) since the string form only ever
    /// names the id component.
    pub fn to_canonical_string(&self) -> String {
        let s = self.id.to_canonical_string();
        format!("ref-{}", &s["guid-".len()..])
    }

    /// Parse a `ref-...` string as an unresolved reference, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        let lower = s.to_ascii_lowercase();
        let (client, delta, within) = Guid::parse_hex_triplet("ref-", &lower)?;
        Ok(Ref {
            id: Guid::new(DeltaId::new(ClientId(client), ClientDeltaId(delta)), WithinDeltaId(within)),
            revision: None,
            _marker: PhantomData,
        })
    }
}

impl<A> Clone for Ref<A> {
    fn clone(&self) -> Self {
        Ref { id: self.id, revision: self.revision, _marker: PhantomData }
    }
}
impl<A> PartialEq for Ref<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.revision == other.revision
    }
}
impl<A> fmt::Debug for Ref<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.to_canonical_string(), self.revision)
    }
}
impl<A> Serialize for Ref<A> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_canonical_string())
    }
}
impl<'de, A> Deserialize<'de> for Ref<A> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ref::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Likely-unique identifier for a model snapshot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ModelId(pub u64);
wire_object_id!(ModelId);

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelId({})", self.0)
    }
}

/// Generates strictly increasing client ids, one per connection.
#[derive(Default)]
pub struct ClientIdAllocator {
    next: AtomicU64,
}

impl ClientIdAllocator {
    /// Build an allocator starting at zero.
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    /// Allocate the next client id.
    pub fn allocate(&self) -> ClientId {
        ClientId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_guid() -> Guid {
        Guid::new(DeltaId::new(ClientId(42), ClientDeltaId(7)), WithinDeltaId(3))
    }

    #[test]
    fn guid_round_trips_through_canonical_string() {
        let g = sample_guid();
        let s = g.to_canonical_string();
        assert_eq!(s, "guid-2a-7-3");
        assert_eq!(Guid::parse(&s).unwrap(), g);
    }

    #[test]
    fn guid_parse_is_case_insensitive() {
        let g = sample_guid();
        let upper = g.to_canonical_string().to_ascii_uppercase();
        assert_eq!(Guid::parse(&upper).unwrap(), g);
    }

    #[test]
    fn id_and_ref_share_hex_body_with_guid() {
        struct Marker;
        let g = sample_guid();
        let id: Id<Marker> = Id::new(g);
        assert_eq!(id.to_canonical_string(), "id-2a-7-3");
        let r: Ref<Marker> = Ref::parse("ref-2a-7-3").unwrap();
        assert_eq!(r.id(), id);
        assert!(!r.is_resolved());
    }

    #[test]
    fn malformed_identifier_is_rejected() {
        assert!(Guid::parse("guid-2a-7").is_err());
        assert!(Guid::parse("nope-2a-7-3").is_err());
        assert!(Guid::parse("guid-zz-7-3").is_err());
    }

    #[test]
    fn client_id_allocator_is_strictly_increasing() {
        let alloc = ClientIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(a.0 < b.0);
    }
}
