use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::types::{FriendSet, UserId};

const SUBJECT_DELIM: char = '#';
const FRIEND_DELIM: char = ',';

/// One sampled node and its friend list.
///
/// Serialized as `<subject>#<friend>,<friend>,...`; a node without friends
/// leaves the segment after `#` empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleRecord {
    /// Sampled user.
    pub subject: UserId,
    /// Friends of the sampled user, in upstream order.
    pub friends: FriendSet,
}

impl SampleRecord {
    /// Creates a record.
    pub fn new(subject: UserId, friends: FriendSet) -> Self {
        Self { subject, friends }
    }
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = RecordLine {
            subject: self.subject,
            friends: &self.friends,
        };
        fmt::Display::fmt(&line, f)
    }
}

/// Borrowed view of a record, formatted without copying the friend list.
struct RecordLine<'a> {
    subject: UserId,
    friends: &'a [UserId],
}

impl fmt::Display for RecordLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SUBJECT_DELIM}", self.subject)?;
        for (idx, friend) in self.friends.iter().enumerate() {
            if idx > 0 {
                write!(f, "{FRIEND_DELIM}")?;
            }
            write!(f, "{friend}")?;
        }
        Ok(())
    }
}

/// A line that is not a valid record.
#[derive(Debug, Error)]
pub enum RecordParseError {
    /// The `#` separating subject and friends is missing.
    #[error("line {line}: missing '#' delimiter")]
    MissingDelimiter {
        /// 1-based line number, 0 when parsing a lone string.
        line: usize,
    },
    /// A field is not a user ID.
    #[error("line {line}: invalid user id '{value}'")]
    InvalidId {
        /// 1-based line number, 0 when parsing a lone string.
        line: usize,
        /// Offending field.
        value: String,
    },
    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RecordParseError {
    fn at_line(self, line: usize) -> Self {
        match self {
            RecordParseError::MissingDelimiter { .. } => RecordParseError::MissingDelimiter { line },
            RecordParseError::InvalidId { value, .. } => RecordParseError::InvalidId { line, value },
            other => other,
        }
    }
}

impl FromStr for SampleRecord {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        let (subject, friends) = line
            .split_once(SUBJECT_DELIM)
            .ok_or(RecordParseError::MissingDelimiter { line: 0 })?;
        let subject = parse_id(subject)?;
        let friends = if friends.is_empty() {
            Vec::new()
        } else {
            friends
                .split(FRIEND_DELIM)
                .map(parse_id)
                .collect::<Result<_, _>>()?
        };
        Ok(Self { subject, friends })
    }
}

fn parse_id(field: &str) -> Result<UserId, RecordParseError> {
    field.parse().map_err(|_| RecordParseError::InvalidId {
        line: 0,
        value: field.to_string(),
    })
}

/// Reads every record from `reader`, skipping blank lines.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<SampleRecord>, RecordParseError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(line.parse().map_err(|err: RecordParseError| err.at_line(idx + 1))?);
    }
    Ok(records)
}

/// Append-only sink for sample records, one line each.
pub struct SampleRecorder<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> SampleRecorder<W> {
    /// Wraps an output stream.
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
        }
    }

    /// Appends one record.
    pub fn append(&mut self, subject: UserId, friends: &[UserId]) -> io::Result<()> {
        writeln!(self.out, "{}", RecordLine { subject, friends })?;
        self.written += 1;
        Ok(())
    }

    /// Records appended through this recorder.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes buffered records to the underlying stream.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl SampleRecorder<BufWriter<File>> {
    /// Opens `path` for recording, truncating it unless `append` is set.
    pub fn create(path: impl AsRef<Path>, append: bool) -> io::Result<Self> {
        let mut opts = OpenOptions::new();
        opts.create(true);
        if append {
            opts.append(true);
        } else {
            opts.write(true).truncate(true);
        }
        let file = opts.open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}
