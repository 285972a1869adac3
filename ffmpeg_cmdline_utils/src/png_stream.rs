use std::{
    collections::VecDeque,
    io::{self, BufReader, Read},
};

use image::{ImageFormat, RgbImage};

/// Every PNG file starts with these 8 bytes.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// Attempt to prevent OOM on very implausible chunk lengths.
const MAX_RECORD_BYTES: usize = 256 * 1024 * 1024;

/// A reader that can hand bytes it has already produced back to itself. Bytes
/// given to [`PushbackReader::unread`] are returned by subsequent reads before
/// anything new is taken from the inner reader.
#[derive(Debug)]
pub struct PushbackReader<R> {
    inner: R,
    pushed: VecDeque<u8>,
    limit: usize,
}

impl<R: Read> PushbackReader<R> {
    /// `limit` bounds the number of bytes that may be waiting to be re-read.
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            pushed: VecDeque::new(),
            limit,
        }
    }

    /// Place `bytes` in front of whatever is left to read.
    pub fn unread(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.pushed.len() + bytes.len() > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "pushback buffer limit exceeded",
            ));
        }

        let mut front = bytes.iter().copied().collect::<VecDeque<_>>();
        front.append(&mut self.pushed);
        self.pushed = front;

        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8];
        match self.read_up_to(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    // Fill as much of buf as possible. Only returns less than buf.len() at the end of the stream.
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(amount) => filled += amount,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Read for PushbackReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pushed.is_empty() {
            return self.inner.read(buf);
        }

        let amount = buf.len().min(self.pushed.len());
        for (slot, byte) in buf.iter_mut().zip(self.pushed.drain(..amount)) {
            *slot = byte;
        }
        Ok(amount)
    }
}

/// One image record found in the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PngRecord {
    Image(RgbImage),

    /// A signature was found but no usable image followed it. Contains the reason.
    Corrupt(String),
}

/// Counters kept while reading a stream of concatenated PNGs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PngStreamStats {
    /// Bytes which were not part of any PNG record.
    pub skipped_bytes: u64,
    pub decoded: u32,
    pub corrupt: u32,
}

enum RawRecord {
    Complete(Vec<u8>),
    Broken(Vec<u8>, &'static str),
}

/// Recovers PNG images from a byte stream which contains concatenated PNG files
/// mixed with arbitrary other bytes (e.g the output of `ffmpeg -f image2pipe -c:v png`).
///
/// The stream is scanned for the PNG signature. Each record is then delimited by walking
/// its chunks up to `IEND`, so nothing past the end of an image is consumed. If a record
/// turns out to be broken, everything after its signature is pushed back and scanned
/// again, so an image whose start was swallowed by the broken record is still found.
#[derive(Debug)]
pub struct PngStreamReader<R> {
    src: PushbackReader<BufReader<R>>,
    stats: PngStreamStats,
    finished: bool,
}

impl<R: Read> PngStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            src: PushbackReader::new(BufReader::new(inner), MAX_RECORD_BYTES * 2),
            stats: PngStreamStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> PngStreamStats {
        self.stats
    }

    /// Read the next record. `Ok(None)` means the stream ended without another signature.
    pub fn next_record(&mut self) -> io::Result<Option<PngRecord>> {
        if !self.scan_to_signature()? {
            return Ok(None);
        }

        let record = match self.read_record()? {
            RawRecord::Complete(bytes) => decode_png(&bytes),
            RawRecord::Broken(bytes, reason) => {
                self.src
                    .unread(bytes.get(PNG_SIGNATURE.len()..).unwrap_or_default())?;
                PngRecord::Corrupt(reason.to_string())
            }
        };

        match record {
            PngRecord::Image(_) => self.stats.decoded += 1,
            PngRecord::Corrupt(_) => self.stats.corrupt += 1,
        }

        Ok(Some(record))
    }

    // Discard bytes up to the next signature, then push the signature back so that the
    // record reader sees a whole PNG file. Returns false if the stream ended first.
    fn scan_to_signature(&mut self) -> io::Result<bool> {
        let mut matched = 0usize;
        while matched < PNG_SIGNATURE.len() {
            let Some(byte) = self.src.read_byte()? else {
                self.stats.skipped_bytes += matched as u64;
                return Ok(false);
            };

            if byte == PNG_SIGNATURE[matched] {
                matched += 1;
            } else {
                self.stats.skipped_bytes += matched as u64;

                // 0x89 only occurs at the start of the signature, so a mismatching byte
                // can only ever begin a new candidate if it is 0x89.
                if byte == PNG_SIGNATURE[0] {
                    matched = 1;
                } else {
                    matched = 0;
                    self.stats.skipped_bytes += 1;
                }
            }
        }

        self.src.unread(&PNG_SIGNATURE)?;
        Ok(true)
    }

    fn read_record(&mut self) -> io::Result<RawRecord> {
        let mut record = vec![0u8; PNG_SIGNATURE.len()];
        let amount = self.src.read_up_to(&mut record)?;
        if amount < record.len() {
            record.truncate(amount);
            return Ok(RawRecord::Broken(record, "stream ended inside the signature"));
        }

        loop {
            let mut header = [0u8; 8];
            let amount = self.src.read_up_to(&mut header)?;
            record.extend_from_slice(&header[..amount]);
            if amount < header.len() {
                return Ok(RawRecord::Broken(
                    record,
                    "stream ended inside a chunk header",
                ));
            }

            let chunk_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            let chunk_type = &header[4..];
            if chunk_len > 0x7FFF_FFFF || !chunk_type.iter().all(u8::is_ascii_alphabetic) {
                return Ok(RawRecord::Broken(record, "invalid chunk header"));
            }

            // chunk data followed by its crc
            let body_len = chunk_len as usize + 4;
            if record.len() + body_len > MAX_RECORD_BYTES {
                return Ok(RawRecord::Broken(record, "image record is implausibly large"));
            }

            let is_end = chunk_type == b"IEND";

            let start = record.len();
            record.resize(start + body_len, 0);
            let amount = self.src.read_up_to(&mut record[start..])?;
            if amount < body_len {
                record.truncate(start + amount);
                return Ok(RawRecord::Broken(record, "stream ended inside a chunk"));
            }

            if is_end {
                return Ok(RawRecord::Complete(record));
            }
        }
    }
}

impl<R: Read> Iterator for PngStreamReader<R> {
    type Item = io::Result<PngRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn decode_png(record: &[u8]) -> PngRecord {
    match image::load_from_memory_with_format(record, ImageFormat::Png) {
        Ok(img) if img.width() > 0 && img.height() > 0 => PngRecord::Image(img.into_rgb8()),
        Ok(_) => PngRecord::Corrupt("decoded an empty image".to_string()),
        Err(e) => PngRecord::Corrupt(format!("{e}")),
    }
}
