//! Binary trajectory files
//!
//! Frames are stored as raw complex amplitudes so the file can be replayed or
//! plotted offline. Layout (all integers and floats little-endian):
//!
//! ```text
//! magic      4 bytes  "SCHR"
//! width      i32
//! height     i32
//! frames     i32
//! payload    frames × height × width × (f64 re, f64 im), row-major
//! ```
//!
//! The writer emits a frame count of 0 up front and patches it in
//! [`TrajectoryWriter::finish`]; a writer dropped without `finish` leaves a
//! file that reads back as empty.

use super::sampler::Frame;
use super::FrameSink;
use crate::error::{SolverError, SolverResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// File signature
pub const MAGIC: [u8; 4] = *b"SCHR";

/// Byte offset of the frame count field
const FRAME_COUNT_OFFSET: u64 = 12;

/// Bytes per stored cell: two `f64`
const CELL_BYTES: usize = 16;

/// Dimensions and frame count read from a file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrajectoryHeader {
    /// Width in cells
    pub width: usize,
    /// Height in cells
    pub height: usize,
    /// Number of frames in the payload
    pub frames: usize,
}

fn to_i32(value: usize, what: &str) -> SolverResult<i32> {
    i32::try_from(value)
        .map_err(|_| SolverError::InvalidTrajectory(format!("{what} {value} does not fit in i32")))
}

/// Streams frames into a trajectory file
pub struct TrajectoryWriter<W: Write + Seek> {
    inner: W,
    width: usize,
    height: usize,
    frames: usize,
}

impl TrajectoryWriter<BufWriter<File>> {
    /// Create (or truncate) a trajectory file at `path`
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be created, otherwise as [`TrajectoryWriter::new`].
    pub fn create<P: AsRef<Path>>(path: P, width: usize, height: usize) -> SolverResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), width, height)
    }
}

impl<W: Write + Seek> TrajectoryWriter<W> {
    /// Write the header to `inner`
    ///
    /// # Errors
    ///
    /// `InvalidDimension` for a zero-sized lattice, `InvalidTrajectory` if a
    /// dimension does not fit the header, `Io` on write failure.
    pub fn new(mut inner: W, width: usize, height: usize) -> SolverResult<Self> {
        SolverError::check_dimensions(width, height)?;
        let w = to_i32(width, "width")?;
        let h = to_i32(height, "height")?;

        inner.write_all(&MAGIC)?;
        inner.write_all(&w.to_le_bytes())?;
        inner.write_all(&h.to_le_bytes())?;
        inner.write_all(&0_i32.to_le_bytes())?;

        Ok(Self {
            inner,
            width,
            height,
            frames: 0,
        })
    }

    /// Append one frame
    ///
    /// # Errors
    ///
    /// `MissingAmplitude` if the frame was sampled as density only,
    /// `ShapeMismatch` if its dimensions differ from the header, `Io` on
    /// write failure.
    pub fn write_frame(&mut self, frame: &Frame) -> SolverResult<()> {
        SolverError::check_shape((self.width, self.height), (frame.width, frame.height))?;
        let amplitude = frame.amplitude.as_ref().ok_or(SolverError::MissingAmplitude)?;

        let mut bytes = Vec::with_capacity(amplitude.len() * CELL_BYTES);
        for &[re, im] in amplitude {
            bytes.extend_from_slice(&f64::from(re).to_le_bytes());
            bytes.extend_from_slice(&f64::from(im).to_le_bytes());
        }
        self.inner.write_all(&bytes)?;
        self.frames += 1;
        Ok(())
    }

    /// Frames appended so far
    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.frames
    }

    /// Patch the frame count, flush and hand back the underlying writer
    ///
    /// # Errors
    ///
    /// `InvalidTrajectory` if more frames were written than the header can
    /// count, `Io` on seek or write failure.
    pub fn finish(mut self) -> SolverResult<W> {
        let count = to_i32(self.frames, "frame count")?;
        self.inner.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
        self.inner.write_all(&count.to_le_bytes())?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        debug!(
            "Trajectory finished: {} frames of {}x{}",
            self.frames, self.width, self.height
        );
        Ok(self.inner)
    }
}

impl<W: Write + Seek> FrameSink for TrajectoryWriter<W> {
    fn consume(&mut self, frame: Frame) -> SolverResult<()> {
        self.write_frame(&frame)
    }
}

/// Reads frames back from a trajectory file
///
/// The header carries no timing, so frames come back with `step` and `time`
/// zero unless [`with_timing`](Self::with_timing) supplies them.
pub struct TrajectoryReader<R: Read> {
    inner: R,
    header: TrajectoryHeader,
    timing: Option<(usize, f32)>,
    next: usize,
}

impl TrajectoryReader<BufReader<File>> {
    /// Open a trajectory file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be opened, otherwise as [`TrajectoryReader::new`].
    pub fn open<P: AsRef<Path>>(path: P) -> SolverResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

fn read_i32<R: Read>(reader: &mut R) -> SolverResult<i32> {
    let mut buf = [0_u8; 4];
    reader.read_exact(&mut buf).map_err(truncated("header"))?;
    Ok(i32::from_le_bytes(buf))
}

fn truncated(what: &'static str) -> impl Fn(std::io::Error) -> SolverError {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            SolverError::InvalidTrajectory(format!("file truncated in {what}"))
        } else {
            SolverError::Io(e)
        }
    }
}

impl<R: Read> TrajectoryReader<R> {
    /// Validate the magic and read the header
    ///
    /// # Errors
    ///
    /// `InvalidTrajectory` for a bad magic, a truncated header or
    /// non-positive dimensions, `Io` on read failure.
    pub fn new(mut inner: R) -> SolverResult<Self> {
        let mut magic = [0_u8; 4];
        inner.read_exact(&mut magic).map_err(truncated("magic"))?;
        if magic != MAGIC {
            return Err(SolverError::InvalidTrajectory(format!(
                "bad magic {magic:?}, expected {MAGIC:?}"
            )));
        }

        let width = read_i32(&mut inner)?;
        let height = read_i32(&mut inner)?;
        let frames = read_i32(&mut inner)?;
        if width <= 0 || height <= 0 || frames < 0 {
            return Err(SolverError::InvalidTrajectory(format!(
                "bad header: {width}x{height}, {frames} frames"
            )));
        }

        Ok(Self {
            inner,
            header: TrajectoryHeader {
                width: width as usize,
                height: height as usize,
                frames: frames as usize,
            },
            timing: None,
            next: 0,
        })
    }

    /// Attach the run's frame stride and time step so frames carry `step` and `time`
    #[must_use]
    pub fn with_timing(mut self, steps_per_frame: usize, dt: f32) -> Self {
        self.timing = Some((steps_per_frame, dt));
        self
    }

    /// Header fields
    #[must_use]
    pub fn header(&self) -> TrajectoryHeader {
        self.header
    }

    /// Read the next frame, or `None` after the last one
    ///
    /// A failed read ends the stream: later calls return `None`.
    ///
    /// # Errors
    ///
    /// `InvalidTrajectory` if the payload ends early, `Io` on read failure.
    pub fn read_frame(&mut self) -> SolverResult<Option<Frame>> {
        if self.next >= self.header.frames {
            return Ok(None);
        }
        let TrajectoryHeader { width, height, .. } = self.header;
        let mut bytes = vec![0_u8; width * height * CELL_BYTES];
        if let Err(e) = self.inner.read_exact(&mut bytes) {
            self.next = self.header.frames;
            return Err(truncated("frame payload")(e));
        }

        let amplitude = bytes
            .chunks_exact(CELL_BYTES)
            .map(|cell| {
                let mut re = [0_u8; 8];
                let mut im = [0_u8; 8];
                re.copy_from_slice(&cell[..8]);
                im.copy_from_slice(&cell[8..]);
                [f64::from_le_bytes(re) as f32, f64::from_le_bytes(im) as f32]
            })
            .collect();

        let index = self.next;
        let (step, time) = match self.timing {
            Some((stride, dt)) => (index * stride, (index * stride) as f32 * dt),
            None => (0, 0.0),
        };
        self.next += 1;
        Ok(Some(Frame::from_amplitude(
            index, step, time, width, height, amplitude,
        )))
    }

    /// Read every remaining frame
    ///
    /// # Errors
    ///
    /// As [`read_frame`](Self::read_frame).
    pub fn read_all(self) -> SolverResult<Vec<Frame>> {
        self.collect()
    }
}

impl<R: Read> Iterator for TrajectoryReader<R> {
    type Item = SolverResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}
