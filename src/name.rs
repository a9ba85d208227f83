use core::{cmp::Ordering, fmt, num::NonZeroU16, str::FromStr};

use crate::{
    error::NameError,
    tlv::{Encode, Write, TLV},
};

/// A hierarchical NDN name, owned.
///
/// The empty name is the root `/`. Every initial run of components is a
/// prefix of the name.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn from_components<I: IntoIterator<Item = NameComponent>>(components: I) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    pub fn last(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    pub fn components(&self) -> impl DoubleEndedIterator<Item = &NameComponent> + '_ {
        self.components.iter()
    }

    /// The first `len` components; the whole name if `len` is larger.
    pub fn prefix(&self, len: usize) -> Name {
        let len = len.min(self.components.len());
        Name {
            components: self.components[..len].to_vec(),
        }
    }

    pub fn dropping_last_component(&self) -> Option<Self> {
        if self.components.is_empty() {
            None
        } else {
            Some(self.prefix(self.components.len() - 1))
        }
    }

    pub fn adding_component(&self, component: NameComponent) -> Self {
        let mut ret = self.clone();
        ret.push(component);
        ret
    }

    pub fn push(&mut self, component: NameComponent) {
        self.components.push(component)
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self.components[..] == other.components[..self.components.len()]
    }

    /// Whether the first `prefix_len` components of `self` form exactly `other`.
    pub fn prefix_eq(&self, prefix_len: usize, other: &Name) -> bool {
        let prefix_len = prefix_len.min(self.components.len());
        prefix_len == other.components.len()
            && self.components[..prefix_len] == other.components[..]
    }

    pub fn ends_with_implicit_digest(&self) -> bool {
        self.components
            .last()
            .is_some_and(|c| c.typ.get() == NAME_COMPONENT_TYPE_IMPLICIT_SHA256)
    }
}

/// SHA-256 over the complete wire encoding of a Data packet.
#[cfg(feature = "sha2")]
pub fn implicit_digest(packet: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(packet).into()
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Canonical order: component by component, a shorter prefix first.
impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let uri = uri.trim();
        let uri = uri.strip_prefix("ndn:").unwrap_or(uri);
        let mut components = Vec::new();
        for segment in uri.split('/').filter(|s| !s.is_empty()) {
            components.push(NameComponent::from_uri(segment)?);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in self.components.iter() {
            f.write_str("/")?;
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NameComponent {
    pub typ: NonZeroU16,
    pub bytes: Box<[u8]>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NameComponentType {
    Generic,
    ImplicitSha256Digest,
    ParameterSha256Digest,
    Other(NonZeroU16),
}

const NAME_COMPONENT_TYPE_GENERIC: u16 = 8;
const NAME_COMPONENT_TYPE_IMPLICIT_SHA256: u16 = 1;
const NAME_COMPONENT_TYPE_PARAMETER_SHA256: u16 = 2;

const fn non_zero(v: u16) -> NonZeroU16 {
    match NonZeroU16::new(v) {
        Some(v) => v,
        None => panic!("component type must not be zero"),
    }
}

impl From<NonZeroU16> for NameComponentType {
    fn from(value: NonZeroU16) -> Self {
        match value.get() {
            NAME_COMPONENT_TYPE_GENERIC => NameComponentType::Generic,
            NAME_COMPONENT_TYPE_IMPLICIT_SHA256 => NameComponentType::ImplicitSha256Digest,
            NAME_COMPONENT_TYPE_PARAMETER_SHA256 => NameComponentType::ParameterSha256Digest,
            _ => NameComponentType::Other(value),
        }
    }
}

impl From<NameComponentType> for NonZeroU16 {
    fn from(value: NameComponentType) -> Self {
        match value {
            NameComponentType::Generic => non_zero(NAME_COMPONENT_TYPE_GENERIC),
            NameComponentType::ImplicitSha256Digest => {
                non_zero(NAME_COMPONENT_TYPE_IMPLICIT_SHA256)
            }
            NameComponentType::ParameterSha256Digest => {
                non_zero(NAME_COMPONENT_TYPE_PARAMETER_SHA256)
            }
            NameComponentType::Other(v) => v,
        }
    }
}

impl NameComponent {
    pub fn new(typ: NameComponentType, bytes: &[u8]) -> Self {
        Self {
            typ: typ.into(),
            bytes: Box::from(bytes),
        }
    }

    pub fn generic(bytes: &[u8]) -> Self {
        Self::new(NameComponentType::Generic, bytes)
    }

    pub fn implicit_digest(digest: [u8; 32]) -> Self {
        Self::new(NameComponentType::ImplicitSha256Digest, &digest)
    }

    pub fn component_type(&self) -> NameComponentType {
        self.typ.into()
    }

    fn as_tlv(&self) -> TLV<'_> {
        TLV {
            typ: self.typ.into(),
            val: &self.bytes,
        }
    }

    fn from_uri(segment: &str) -> Result<Self, NameError> {
        let (typ, value) = match segment.split_once('=') {
            Some(("sha256digest", hex)) => {
                let digest = decode_digest(hex)
                    .ok_or_else(|| NameError::InvalidDigest(segment.to_owned()))?;
                return Ok(Self::new(NameComponentType::ImplicitSha256Digest, &digest));
            }
            Some(("params-sha256", hex)) => {
                let digest = decode_digest(hex)
                    .ok_or_else(|| NameError::InvalidDigest(segment.to_owned()))?;
                return Ok(Self::new(NameComponentType::ParameterSha256Digest, &digest));
            }
            Some((typ, value)) if !typ.is_empty() && typ.bytes().all(|b| b.is_ascii_digit()) => {
                let parsed: u64 = typ
                    .parse()
                    .map_err(|_| NameError::InvalidComponentType(u64::MAX))?;
                let typ = u16::try_from(parsed)
                    .ok()
                    .and_then(NonZeroU16::new)
                    .ok_or(NameError::InvalidComponentType(parsed))?;
                (typ, value)
            }
            _ => (non_zero(NAME_COMPONENT_TYPE_GENERIC), segment),
        };

        let mut bytes = percent_decode(value)
            .ok_or_else(|| NameError::InvalidPercentEncoding(segment.to_owned()))?;
        if bytes.iter().all(|b| *b == b'.') {
            // "..." is the empty component, "...." is ".", and so on
            if bytes.len() < 3 {
                return Err(NameError::InvalidComponent(segment.to_owned()));
            }
            bytes.truncate(bytes.len() - 3);
        }
        Ok(Self {
            typ,
            bytes: bytes.into_boxed_slice(),
        })
    }
}

impl Encode for NameComponent {
    fn encoded_length(&self) -> usize {
        self.as_tlv().encoded_length()
    }

    fn encode<W: Write>(&self, writer: &mut W) {
        self.as_tlv().encode(writer)
    }
}

impl PartialOrd for NameComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NameComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then(self.bytes.len().cmp(&other.bytes.len()))
            .then_with(|| self.bytes.cmp(&other.bytes))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component_type() {
            NameComponentType::ImplicitSha256Digest if self.bytes.len() == 32 => {
                f.write_str("sha256digest=")?;
                return write_hex(f, &self.bytes);
            }
            NameComponentType::ParameterSha256Digest if self.bytes.len() == 32 => {
                f.write_str("params-sha256=")?;
                return write_hex(f, &self.bytes);
            }
            NameComponentType::Generic => {}
            _ => write!(f, "{}=", self.typ)?,
        }
        if self.bytes.iter().all(|b| *b == b'.') {
            f.write_str("...")?;
        }
        for b in self.bytes.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", *b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn decode_digest(hex: &str) -> Option<[u8; 32]> {
    let hex = hex.as_bytes();
    if hex.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, pair) in hex.chunks(2).enumerate() {
        out[i] = hex_value(pair[0])? << 4 | hex_value(pair[1])?;
    }
    Some(out)
}

fn percent_decode(value: &str) -> Option<Vec<u8>> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_parse_and_print() {
        assert_eq!(name("/").len(), 0);
        assert_eq!(name("ndn:/").len(), 0);
        assert_eq!(name("/a/b/c").len(), 3);
        assert_eq!(name("a/b/c/d").len(), 4);
        assert_eq!(name("/a/e/"), name("/a/e"));
        assert_eq!(name("ndn:/named-data/research").to_string(), "/named-data/research");
        assert_eq!(name("/hello%20world").get(0).unwrap().bytes.as_ref(), b"hello world");
        assert_eq!(name("/hello%20world").to_string(), "/hello%20world");
        assert_eq!(Name::new().to_string(), "/");
    }

    #[test]
    fn test_typed_components() {
        let n = name("/a/32=b/...");
        assert_eq!(n.get(1).unwrap().typ.get(), 32);
        assert_eq!(n.get(2).unwrap().bytes.len(), 0);
        assert_eq!(n.to_string(), "/a/32=b/...");

        let hex = "28bad4b5275bd392dbb670c75cf0b66f13f7942b21e80f55c0e86b374753a548";
        let n = name(&format!("/a/sha256digest={hex}"));
        assert!(n.ends_with_implicit_digest());
        assert_eq!(n.to_string(), format!("/a/sha256digest={hex}"));
    }

    #[test]
    fn test_invalid_uris() {
        assert!(matches!(
            "/a/%zz".parse::<Name>(),
            Err(NameError::InvalidPercentEncoding(_))
        ));
        assert!(matches!(
            "/a/..".parse::<Name>(),
            Err(NameError::InvalidComponent(_))
        ));
        assert!(matches!(
            "/sha256digest=abcd".parse::<Name>(),
            Err(NameError::InvalidDigest(_))
        ));
        assert!(matches!(
            "/0=a".parse::<Name>(),
            Err(NameError::InvalidComponentType(0))
        ));
        assert!(matches!(
            "/70000=a".parse::<Name>(),
            Err(NameError::InvalidComponentType(70000))
        ));
    }

    #[test]
    fn test_prefixes() {
        let n = name("/a/b/c");
        assert_eq!(n.prefix(0), Name::new());
        assert_eq!(n.prefix(2), name("/a/b"));
        assert_eq!(n.prefix(10), n);
        assert_eq!(n.dropping_last_component(), Some(name("/a/b")));
        assert_eq!(Name::new().dropping_last_component(), None);
        assert!(name("/a").is_prefix_of(&n));
        assert!(Name::new().is_prefix_of(&n));
        assert!(!name("/a/c").is_prefix_of(&n));
        assert!(n.prefix_eq(2, &name("/a/b")));
        assert!(!n.prefix_eq(2, &name("/a/b/c")));
        assert!(n.prefix_eq(0, &Name::new()));
    }

    #[test]
    fn test_component_encoding() {
        let mut buf = Vec::new();
        for component in name("/a/32=bc/...").components() {
            component.encode(&mut buf);
        }
        assert_eq!(buf, [8, 1, b'a', 32, 2, b'b', b'c', 8, 0]);

        let long = NameComponent::new(NameComponentType::Other(non_zero(300)), &[7u8; 300]);
        let mut buf = Vec::new();
        long.encode(&mut buf);
        assert_eq!(buf.len(), long.encoded_length());
        assert_eq!(&buf[..6], &[253, 1, 44, 253, 1, 44]);
    }

    #[test]
    fn test_canonical_order() {
        let mut names = vec![name("/b"), name("/a/b"), name("/aa"), name("/a"), Name::new()];
        names.sort();
        assert_eq!(
            names,
            vec![Name::new(), name("/a"), name("/a/b"), name("/b"), name("/aa")]
        );
    }

    #[cfg(feature = "sha2")]
    #[test]
    fn test_implicit_digest() {
        // SHA-256 of the empty input
        assert_eq!(
            NameComponent::implicit_digest(implicit_digest(b"")).to_string(),
            "sha256digest=e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(implicit_digest(b"packet"), implicit_digest(b"packets"));
    }
}
