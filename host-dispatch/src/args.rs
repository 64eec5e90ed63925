//! Argument-list helpers shared by every family handler. A request's
//! argument vector arrives as raw bytes (§4.8 "length-prefixed bulk
//! strings"); this wraps it with the small set of conversions the verb
//! table (§6) actually needs and the `[KEYWORD value]` bracket-option
//! scanning used by `TRN` and friends.

use bytes::Bytes;
use host_core::{HostError, HostResult};

pub struct Args<'a> {
    items: &'a [Bytes],
    pos: usize,
}

impl<'a> Args<'a> {
    pub fn new(items: &'a [Bytes]) -> Self {
        Self { items, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn advance(&mut self) -> HostResult<&'a Bytes> {
        let item = self
            .items
            .get(self.pos)
            .ok_or_else(|| HostError::BadRequest("not enough arguments".into()))?;
        self.pos += 1;
        Ok(item)
    }

    pub fn string(&mut self) -> HostResult<String> {
        let bytes = self.advance()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| HostError::BadRequest("argument is not valid utf-8".into()))
    }

    pub fn bytes(&mut self) -> HostResult<Vec<u8>> {
        Ok(self.advance()?.to_vec())
    }

    pub fn i64(&mut self) -> HostResult<i64> {
        self.string()?
            .parse()
            .map_err(|_| HostError::BadRequest("expected an integer argument".into()))
    }

    pub fn u16(&mut self) -> HostResult<u16> {
        self.string()?
            .parse()
            .map_err(|_| HostError::BadRequest("expected a slot number argument".into()))
    }

    pub fn bool_flag(&mut self) -> HostResult<bool> {
        let raw = self.string()?;
        Ok(raw == "1" || raw.eq_ignore_ascii_case("true"))
    }

    /// Remaining raw items, case-sensitive, as `(keyword, value)` pairs for
    /// the `[GAME gid] [SLOT n] [MAIL addr] [INFO s]`-style bracket options
    /// `TRN` and the schedule verbs accept after their positional arguments.
    pub fn remaining_pairs(&mut self) -> HostResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        while !self.is_empty() {
            let key = self.string()?;
            let value = self.string()?;
            out.push((key, value));
        }
        Ok(out)
    }

    pub fn rest_strings(&mut self) -> HostResult<Vec<String>> {
        let mut out = Vec::new();
        while !self.is_empty() {
            out.push(self.string()?);
        }
        Ok(out)
    }
}

pub fn find_opt<'a>(pairs: &'a [(String, String)], keyword: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
        .map(|(_, v)| v.as_str())
}
