//! Codecs for postings, map entries and full posting lists.
//!
//! ```text
//! Posting:     [uid: varint][kind: u8][value_type: u8][len: varint][value]
//!              ValueLang adds [lang_len: varint][lang]
//! MapEntry:    [key_len: varint][key][tag: u8] then
//!              tag 0: [uid: varint]    tag 1: [Posting]
//! PostingList: [n: varint][Posting; n][uids_len: varint][packed uids]
//! ```

use super::traits::{Decoder, Encoder};
use super::varint::{decode_varint, encode_varint, varint_len};
use crate::types::{MapEntry, Posting, PostingKind, PostingList, Uid, ValueType};
use crate::CoreError;

const ENTRY_BARE: u8 = 0;
const ENTRY_POSTING: u8 = 1;

fn read_u8(bytes: &[u8], pos: &mut usize, what: &'static str) -> Result<u8, CoreError> {
    let b = *bytes.get(*pos).ok_or(CoreError::UnexpectedEof(what))?;
    *pos += 1;
    Ok(b)
}

fn read_len(bytes: &[u8], pos: &mut usize) -> Result<usize, CoreError> {
    let len = decode_varint(bytes, pos)?;
    usize::try_from(len).map_err(|_| CoreError::Encoding(format!("length {len} overflows usize")))
}

fn read_bytes<'a>(
    bytes: &'a [u8],
    pos: &mut usize,
    what: &'static str,
) -> Result<&'a [u8], CoreError> {
    let len = read_len(bytes, pos)?;
    let end = pos.checked_add(len).ok_or(CoreError::UnexpectedEof(what))?;
    let slice = bytes.get(*pos..end).ok_or(CoreError::UnexpectedEof(what))?;
    *pos = end;
    Ok(slice)
}

fn ensure_consumed(bytes: &[u8], pos: usize, what: &str) -> Result<(), CoreError> {
    if pos == bytes.len() {
        Ok(())
    } else {
        Err(CoreError::Encoding(format!("{} trailing bytes after {what}", bytes.len() - pos)))
    }
}

fn encode_posting(posting: &Posting, buf: &mut Vec<u8>) -> Result<(), CoreError> {
    posting.validate()?;
    encode_varint(posting.uid.as_u64(), buf);
    buf.push(posting.kind.as_u8());
    buf.push(posting.value_type.as_u8());
    encode_varint(posting.value.len() as u64, buf);
    buf.extend_from_slice(&posting.value);
    if let Some(lang) = &posting.lang {
        encode_varint(lang.len() as u64, buf);
        buf.extend_from_slice(lang.as_bytes());
    }
    Ok(())
}

pub(crate) fn decode_posting_at(bytes: &[u8], pos: &mut usize) -> Result<Posting, CoreError> {
    let uid = Uid::new(decode_varint(bytes, pos)?);
    let kind = PostingKind::try_from(read_u8(bytes, pos, "posting kind")?)?;
    let value_type = ValueType::try_from(read_u8(bytes, pos, "value type")?)?;
    let value = read_bytes(bytes, pos, "posting value")?.to_vec();
    let lang = if kind == PostingKind::ValueLang {
        let raw = read_bytes(bytes, pos, "language tag")?;
        let lang = std::str::from_utf8(raw)
            .map_err(|e| CoreError::Encoding(format!("invalid UTF-8 language tag: {e}")))?;
        Some(lang.to_owned())
    } else {
        None
    };
    let posting = Posting { uid, kind, value_type, value, lang };
    posting.validate()?;
    Ok(posting)
}

impl Encoder for Posting {
    fn encoded_len(&self) -> usize {
        let lang = self.lang.as_ref().map_or(0, |l| varint_len(l.len() as u64) + l.len());
        varint_len(self.uid.as_u64())
            + 2
            + varint_len(self.value.len() as u64)
            + self.value.len()
            + lang
    }

    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CoreError> {
        encode_posting(self, buf)
    }
}

impl Decoder for Posting {
    fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut pos = 0;
        let posting = decode_posting_at(bytes, &mut pos)?;
        ensure_consumed(bytes, pos, "posting")?;
        Ok(posting)
    }
}

impl Encoder for MapEntry {
    fn encoded_len(&self) -> usize {
        let body = match &self.posting {
            None => varint_len(self.uid.as_u64()),
            Some(p) => p.encoded_len(),
        };
        varint_len(self.key.len() as u64) + self.key.len() + 1 + body
    }

    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CoreError> {
        encode_varint(self.key.len() as u64, buf);
        buf.extend_from_slice(&self.key);
        match &self.posting {
            None => {
                buf.push(ENTRY_BARE);
                encode_varint(self.uid.as_u64(), buf);
                Ok(())
            }
            Some(posting) => {
                buf.push(ENTRY_POSTING);
                encode_posting(posting, buf)
            }
        }
    }
}

impl Decoder for MapEntry {
    fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut entry = Self::default();
        entry.decode_into(bytes)?;
        Ok(entry)
    }
}

impl MapEntry {
    /// Decode `bytes` into `self`, reusing the key allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed. `self` is left in an
    /// unspecified but valid state.
    pub fn decode_into(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        let mut pos = 0;
        let key = read_bytes(bytes, &mut pos, "entry key")?;
        self.key.clear();
        self.key.extend_from_slice(key);
        match read_u8(bytes, &mut pos, "entry tag")? {
            ENTRY_BARE => {
                self.uid = Uid::new(decode_varint(bytes, &mut pos)?);
                self.posting = None;
            }
            ENTRY_POSTING => {
                let posting = decode_posting_at(bytes, &mut pos)?;
                self.uid = posting.uid;
                self.posting = Some(posting);
            }
            other => {
                return Err(CoreError::Encoding(format!("unknown entry tag {other:#04x}")));
            }
        }
        ensure_consumed(bytes, pos, "map entry")
    }
}

impl Encoder for PostingList {
    fn encoded_len(&self) -> usize {
        varint_len(self.postings.len() as u64)
            + self.postings.iter().map(Encoder::encoded_len).sum::<usize>()
            + varint_len(self.uids.len() as u64)
            + self.uids.len()
    }

    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CoreError> {
        encode_varint(self.postings.len() as u64, buf);
        for posting in &self.postings {
            if !posting.is_value_bearing() {
                return Err(CoreError::invariant(format!(
                    "reference posting {} in full posting list",
                    posting.uid
                )));
            }
            encode_posting(posting, buf)?;
        }
        encode_varint(self.uids.len() as u64, buf);
        buf.extend_from_slice(&self.uids);
        Ok(())
    }
}

impl Decoder for PostingList {
    fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut pos = 0;
        let n = read_len(bytes, &mut pos)?;
        // A posting takes at least four bytes.
        let mut postings = Vec::with_capacity(n.min(bytes.len() / 4));
        for _ in 0..n {
            postings.push(decode_posting_at(bytes, &mut pos)?);
        }
        let uids = read_bytes(bytes, &mut pos, "packed uids")?.to_vec();
        ensure_consumed(bytes, pos, "posting list")?;
        Ok(Self { postings, uids })
    }
}
