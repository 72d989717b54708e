use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::warn;

use crate::types::{
    RowPosition,
    error::{DatabaseError, Result},
};

struct LogState {
    writer: Option<BufWriter<File>>,
    base_position: RowPosition,
    next_position: RowPosition,
    /// Positions below this one are visible to readers of the file
    flushed_position: RowPosition,
    next_offset: u64,
    /// Byte offset of every record written or found, indexed by `position - base_position`
    offsets: Vec<u64>,
}

impl LogState {
    fn flush(&mut self) -> io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(closed_error)?;
        writer.flush()?;
        self.flushed_position = self.next_position;
        Ok(())
    }

    fn offset_of(&self, position: RowPosition) -> Option<u64> {
        if position < self.base_position || position >= self.next_position {
            return None;
        }
        self.offsets
            .get((position - self.base_position) as usize)
            .copied()
    }
}

/// Append-only CSV file handing out a zero-based position for every record.
///
/// All mutation happens under one mutex per log: assigning the position,
/// writing the encoded bytes and advancing the counter form a single critical
/// section, so concurrent callers never share a position or interleave bytes.
pub struct AppendLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl AppendLog {
    /// Create (or truncate) the file at `path`, numbering records from `start_position`
    pub fn create<P: AsRef<Path>>(path: P, start_position: RowPosition) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| DatabaseError::write_failure(path, e))?;
        Ok(Self::from_parts(path, file, start_position, Vec::new(), 0))
    }

    /// Create the file at `path`, failing if it already exists
    pub fn create_new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| DatabaseError::write_failure(path, e))?;
        Ok(Self::from_parts(path, file, 0, Vec::new(), 0))
    }

    /// Reopen an existing log for appending. Positions continue after the
    /// last complete record already in the file.
    ///
    /// A trailing record cut short by an interrupted write is truncated away,
    /// so the next append starts on a fresh line.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = record_reader(path)?;
        let mut record = csv::ByteRecord::new();
        let mut offsets = Vec::new();
        while reader
            .read_byte_record(&mut record)
            .map_err(|e| DatabaseError::read_failure(path, e))?
        {
            if let Some(position) = record.position() {
                offsets.push(position.byte() - SENTINEL.len() as u64);
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| DatabaseError::write_failure(path, e))?;
        let mut next_offset = file
            .metadata()
            .map_err(|e| DatabaseError::read_failure(path, e))?
            .len();

        if let Some(&last) = offsets.last() {
            if is_torn(&file, last).map_err(|e| DatabaseError::read_failure(path, e))? {
                file.set_len(last)
                    .map_err(|e| DatabaseError::write_failure(path, e))?;
                warn!(
                    path = %path.display(),
                    dropped_bytes = next_offset - last,
                    "truncated incomplete trailing record"
                );
                offsets.pop();
                next_offset = last;
            }
        }

        Ok(Self::from_parts(path, file, 0, offsets, next_offset))
    }

    fn from_parts(
        path: &Path,
        file: File,
        base_position: RowPosition,
        offsets: Vec<u64>,
        next_offset: u64,
    ) -> Self {
        let next_position = base_position + offsets.len() as RowPosition;
        Self {
            path: path.to_path_buf(),
            state: Mutex::new(LogState {
                writer: Some(BufWriter::new(file)),
                base_position,
                next_position,
                flushed_position: next_position,
                next_offset,
                offsets,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and return the position assigned to it
    pub fn write_line<I, T>(&self, fields: I) -> Result<RowPosition>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let bytes = encode_record(fields).map_err(|e| DatabaseError::write_failure(&self.path, e))?;

        let mut state = self.state.lock();
        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| DatabaseError::write_failure(&self.path, closed_error()))?;
        if let Err(e) = writer.write_all(&bytes) {
            // Part of the record may have reached the file; the offset table
            // can no longer be trusted, so the log refuses further writes.
            state.writer = None;
            state.flushed_position = state.next_position;
            return Err(DatabaseError::write_failure(&self.path, e));
        }

        let position = state.next_position;
        let offset = state.next_offset;
        state.offsets.push(offset);
        state.next_offset += bytes.len() as u64;
        state.next_position += 1;
        Ok(position)
    }

    /// Push buffered records to the file. The position counter is untouched.
    pub fn flush(&self) -> Result<()> {
        self.state
            .lock()
            .flush()
            .map_err(|e| DatabaseError::write_failure(&self.path, e))
    }

    /// Flush and release the file handle. Later writes fail; closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        let Some(writer) = state.writer.take() else {
            return Ok(());
        };
        state.flushed_position = state.next_position;
        writer
            .into_inner()
            .map(drop)
            .map_err(|e| DatabaseError::write_failure(&self.path, e.into_error()))
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().writer.is_none()
    }

    /// Position the next record will receive
    pub fn next_position(&self) -> RowPosition {
        self.state.lock().next_position
    }

    /// Read the record stored at `position`, or `None` if no such record was written
    pub fn read_record(&self, position: RowPosition) -> Result<Option<Vec<String>>> {
        let offset = {
            let mut state = self.state.lock();
            let Some(offset) = state.offset_of(position) else {
                return Ok(None);
            };
            if position >= state.flushed_position && state.writer.is_some() {
                state
                    .flush()
                    .map_err(|e| DatabaseError::write_failure(&self.path, e))?;
            }
            offset
        };

        let mut file = File::open(&self.path).map_err(|e| DatabaseError::read_failure(&self.path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| DatabaseError::read_failure(&self.path, e))?;
        let mut reader = sentinel_reader(&self.path, file)?;
        let mut record = csv::StringRecord::new();
        let found = reader
            .read_record(&mut record)
            .map_err(|e| DatabaseError::read_failure(&self.path, e))?;
        Ok(found.then(|| record.iter().map(String::from).collect()))
    }
}

/// Record fed to every reader ahead of the file contents. The csv reader
/// strips a UTF-8 BOM from the start of its input, which would eat a leading
/// U+FEFF of the first field. With the sentinel in front, file bytes never
/// start the input.
const SENTINEL: &[u8] = b"-\n";

/// Reader over `SENTINEL` followed by a log file's bytes
pub type RecordReader = csv::Reader<io::Chain<&'static [u8], File>>;

fn sentinel_reader(path: &Path, file: File) -> Result<RecordReader> {
    let mut reader = reader_builder().from_reader(SENTINEL.chain(file));
    let mut sentinel = csv::ByteRecord::new();
    reader
        .read_byte_record(&mut sentinel)
        .map_err(|e| DatabaseError::read_failure(path, e))?;
    Ok(reader)
}

/// Whether the record starting at `offset` runs to end of file without being
/// terminated: no final newline, or an unclosed quoted field.
fn is_torn(mut file: &File, offset: u64) -> io::Result<bool> {
    file.seek(SeekFrom::Start(offset))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail)?;
    let quotes = tail.iter().filter(|&&b| b == b'"').count();
    Ok(tail.last() != Some(&b'\n') || quotes % 2 == 1)
}

fn closed_error() -> io::Error {
    io::Error::other("append log is closed")
}

fn encode_record<I, T>(fields: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer.into_inner().map_err(|e| e.into_error())
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(false).flexible(true);
    builder
}

/// Open a sequential reader over every record in the CSV file at `path`
pub fn record_reader(path: &Path) -> Result<RecordReader> {
    let file = File::open(path).map_err(|e| DatabaseError::read_failure(path, e))?;
    sentinel_reader(path, file)
}
