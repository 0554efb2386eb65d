//! Versioned binary entry codec.
//!
//! One record encodes one [`Entry`]:
//!
//! ```text
//! [version: u8 = 1]
//! [entry type tag: u8]
//! [name:   u16 BE length + UTF-8 bytes]
//! [issuer: u8 present flag, then u16 BE length + UTF-8 bytes if 1]
//! [secret: u16 BE length + raw bytes]
//! [algorithm tag: u8]
//! [digits: u8]
//! [period: u32 BE]
//! [counter: u64 BE]
//! [note:   u8 present flag, then u16 BE length + UTF-8 bytes if 1]
//! ```
//!
//! All multi-byte integers are big-endian. Unknown trailing bytes after
//! the note field are tolerated so a newer writer can append fields; an
//! unknown version byte is rejected outright. Every decode failure is
//! [`OtpErrorKind::MalformedRecord`].

use crate::otp::types::*;

/// Current record format version.
pub const CODEC_VERSION: u8 = 1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Serialize
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Serialize an entry to its binary record form.
pub fn serialize_entry(entry: &Entry) -> Result<Vec<u8>, OtpError> {
    entry.validate()?;

    let mut out = Vec::with_capacity(64 + entry.name.len() + entry.secret.len());
    out.push(CODEC_VERSION);
    out.push(entry.entry_type.wire_tag());
    write_str(&mut out, &entry.name)?;
    write_opt_str(&mut out, entry.issuer.as_deref())?;
    write_bytes(&mut out, &entry.secret)?;
    out.push(entry.algorithm.wire_tag());
    out.push(entry.digits);
    out.extend_from_slice(&entry.period.to_be_bytes());
    out.extend_from_slice(&entry.counter.to_be_bytes());
    write_opt_str(&mut out, entry.note.as_deref())?;
    Ok(out)
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), OtpError> {
    let len = u16::try_from(bytes.len()).map_err(|_| {
        OtpError::new(
            OtpErrorKind::MalformedRecord,
            format!("field of {} bytes exceeds the u16 length prefix", bytes.len()),
        )
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_str(out: &mut Vec<u8>, s: &str) -> Result<(), OtpError> {
    write_bytes(out, s.as_bytes())
}

fn write_opt_str(out: &mut Vec<u8>, s: Option<&str>) -> Result<(), OtpError> {
    match s {
        Some(s) => {
            out.push(1);
            write_str(out, s)
        }
        None => {
            out.push(0);
            Ok(())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Deserialize
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deserialize a binary record back into an [`Entry`].
pub fn deserialize_entry(bytes: &[u8]) -> Result<Entry, OtpError> {
    let mut reader = Reader::new(bytes);

    let version = reader.u8("version")?;
    if version != CODEC_VERSION {
        return Err(OtpError::new(
            OtpErrorKind::MalformedRecord,
            format!("unknown record version {}", version),
        ));
    }

    let type_tag = reader.u8("entry type")?;
    let entry_type = EntryType::from_wire_tag(type_tag).ok_or_else(|| {
        OtpError::new(
            OtpErrorKind::MalformedRecord,
            format!("unknown entry type tag {}", type_tag),
        )
    })?;

    let name = reader.string("name")?;
    let issuer = reader.opt_string("issuer")?;
    let secret = reader.bytes("secret")?;
    let algo_tag = reader.u8("algorithm")?;
    let algorithm = Algorithm::from_wire_tag(algo_tag).ok_or_else(|| {
        OtpError::new(
            OtpErrorKind::MalformedRecord,
            format!("unknown algorithm tag {}", algo_tag),
        )
    })?;
    let digits = reader.u8("digits")?;
    let period = reader.u32("period")?;
    let counter = reader.u64("counter")?;
    let note = reader.opt_string("note")?;
    // Trailing bytes are tolerated: a later version may append fields.

    let entry = Entry {
        name,
        issuer,
        secret,
        algorithm,
        digits,
        entry_type,
        period,
        counter,
        note,
    };
    entry
        .validate()
        .map_err(|e| OtpError::new(OtpErrorKind::MalformedRecord, e.message))?;
    Ok(entry)
}

/// Deserialize a batch of records, all-or-nothing.
///
/// Output order matches input order exactly; the first bad record fails
/// the whole batch. The repository layer relies on this strictness for
/// its count-parity check.
pub fn deserialize_entries<B: AsRef<[u8]>>(records: &[B]) -> Result<Vec<Entry>, OtpError> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            deserialize_entry(record.as_ref()).map_err(|e| {
                OtpError::new(e.kind, format!("record {}: {}", i, e.message))
            })
        })
        .collect()
}

/// Bounds-checked big-endian reader over a record.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8], OtpError> {
        if self.pos + n > self.bytes.len() {
            return Err(OtpError::new(
                OtpErrorKind::MalformedRecord,
                format!("record truncated reading {}", field),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, field: &str) -> Result<u8, OtpError> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &str) -> Result<u32, OtpError> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, field: &str) -> Result<u64, OtpError> {
        let b = self.take(8, field)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn bytes(&mut self, field: &str) -> Result<Vec<u8>, OtpError> {
        let b = self.take(2, field)?;
        let len = u16::from_be_bytes([b[0], b[1]]) as usize;
        Ok(self.take(len, field)?.to_vec())
    }

    fn string(&mut self, field: &str) -> Result<String, OtpError> {
        String::from_utf8(self.bytes(field)?).map_err(|_| {
            OtpError::new(
                OtpErrorKind::MalformedRecord,
                format!("{} is not valid UTF-8", field),
            )
        })
    }

    fn opt_string(&mut self, field: &str) -> Result<Option<String>, OtpError> {
        match self.u8(field)? {
            0 => Ok(None),
            1 => Ok(Some(self.string(field)?)),
            flag => Err(OtpError::new(
                OtpErrorKind::MalformedRecord,
                format!("bad presence flag {} for {}", flag, field),
            )),
        }
    }
}
