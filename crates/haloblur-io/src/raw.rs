//! Seek-based reader and writer for raw matrix files.
//!
//! No header, no delimiters: `N²` cells of [`ELEMENT_SIZE`] bytes each, in
//! row-major order. Every access seeks to the computed offset first, so rows
//! may be read or written in any order.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{MatrixIoError, MatrixSink, MatrixSource};

/// Bytes per stored cell.
pub const ELEMENT_SIZE: usize = std::mem::size_of::<i32>();

/// Byte offset of 1-based cell (`row`, `col`).
fn slot_offset(matrix_size: usize, row: usize, col: usize) -> Result<u64, MatrixIoError> {
    if row == 0 || col == 0 || row > matrix_size || col > matrix_size {
        return Err(MatrixIoError::SlotOutOfRange {
            row,
            col,
            matrix_size,
        });
    }
    (row - 1)
        .checked_mul(matrix_size)
        .and_then(|cells| cells.checked_add(col - 1))
        .and_then(|cells| cells.checked_mul(ELEMENT_SIZE))
        .map(|bytes| bytes as u64)
        .ok_or(MatrixIoError::OffsetOverflow { row, col })
}

fn row_offset(matrix_size: usize, row: usize) -> Result<u64, MatrixIoError> {
    if row == 0 || row > matrix_size {
        return Err(MatrixIoError::RowOutOfRange { row, matrix_size });
    }
    slot_offset(matrix_size, row, 1)
}

/// Total bytes of an `N×N` matrix file.
pub fn matrix_bytes(matrix_size: usize) -> u64 {
    (matrix_size as u64) * (matrix_size as u64) * ELEMENT_SIZE as u64
}

/// [`MatrixSource`] over any seekable byte stream.
#[derive(Debug)]
pub struct RawMatrixReader<R> {
    inner: R,
    matrix_size: usize,
}

impl<R: Read + Seek> RawMatrixReader<R> {
    pub fn new(inner: R, matrix_size: usize) -> Self {
        Self { inner, matrix_size }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn seek_to(&mut self, offset: u64) -> Result<(), MatrixIoError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

fn short_read(row: usize) -> impl FnOnce(io::Error) -> MatrixIoError {
    move |e| match e.kind() {
        ErrorKind::UnexpectedEof => MatrixIoError::ShortRead { row },
        _ => MatrixIoError::Io(e),
    }
}

impl RawMatrixReader<BufReader<File>> {
    /// Open `path` for reading, checking it holds at least `N²` cells.
    pub fn open(path: &Path, matrix_size: usize) -> Result<Self, MatrixIoError> {
        let file = File::open(path)?;
        let actual = file.metadata()?.len();
        let expected = matrix_bytes(matrix_size);
        if actual < expected {
            return Err(MatrixIoError::Truncated {
                matrix_size,
                expected,
                actual,
            });
        }
        log::debug!("Opened {} for reading ({} bytes)", path.display(), actual);
        Ok(Self::new(BufReader::new(file), matrix_size))
    }
}

impl<R: Read + Seek> MatrixSource for RawMatrixReader<R> {
    fn matrix_size(&self) -> usize {
        self.matrix_size
    }

    fn read_row(&mut self, row: usize) -> Result<Vec<i32>, MatrixIoError> {
        let offset = row_offset(self.matrix_size, row)?;
        self.seek_to(offset)?;
        let mut values = vec![0i32; self.matrix_size];
        self.inner
            .read_i32_into::<LittleEndian>(&mut values)
            .map_err(short_read(row))?;
        Ok(values)
    }

    fn read_slot(&mut self, row: usize, col: usize) -> Result<i32, MatrixIoError> {
        let offset = slot_offset(self.matrix_size, row, col)?;
        self.seek_to(offset)?;
        self.inner.read_i32::<LittleEndian>().map_err(short_read(row))
    }
}

/// [`MatrixSink`] over any seekable byte stream.
#[derive(Debug)]
pub struct RawMatrixWriter<W: Write> {
    inner: W,
    matrix_size: usize,
}

impl<W: Write + Seek> RawMatrixWriter<W> {
    pub fn new(inner: W, matrix_size: usize) -> Self {
        Self { inner, matrix_size }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_at(&mut self, offset: u64, values: &[i32]) -> Result<(), MatrixIoError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        for &value in values {
            self.inner.write_i32::<LittleEndian>(value)?;
        }
        Ok(())
    }
}

impl RawMatrixWriter<BufWriter<File>> {
    /// Create (or truncate) `path` for writing.
    pub fn create(path: &Path, matrix_size: usize) -> Result<Self, MatrixIoError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        log::debug!("Opened {} for writing", path.display());
        Ok(Self::new(BufWriter::new(file), matrix_size))
    }

    /// Open `path` for writing without discarding what it holds.
    ///
    /// Existing contents survive until [`set_matrix_len`](Self::set_matrix_len)
    /// or a write replaces them.
    pub fn open(path: &Path, matrix_size: usize) -> Result<Self, MatrixIoError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        log::debug!("Opened {} for writing (contents kept)", path.display());
        Ok(Self::new(BufWriter::new(file), matrix_size))
    }

    /// Resize the file to exactly `N²` cells.
    pub fn set_matrix_len(&mut self) -> Result<(), MatrixIoError> {
        self.inner.flush()?;
        self.inner.get_ref().set_len(matrix_bytes(self.matrix_size))?;
        Ok(())
    }
}

impl<W: Write + Seek> MatrixSink for RawMatrixWriter<W> {
    fn matrix_size(&self) -> usize {
        self.matrix_size
    }

    fn write_row(&mut self, row: usize, values: &[i32]) -> Result<(), MatrixIoError> {
        let offset = row_offset(self.matrix_size, row)?;
        if values.len() != self.matrix_size {
            return Err(MatrixIoError::RowLength {
                row,
                expected: self.matrix_size,
                actual: values.len(),
            });
        }
        self.write_at(offset, values)
    }

    fn write_slot(&mut self, row: usize, col: usize, value: i32) -> Result<(), MatrixIoError> {
        let offset = slot_offset(self.matrix_size, row, col)?;
        self.write_at(offset, &[value])
    }

    fn flush(&mut self) -> Result<(), MatrixIoError> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(values: &[i32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * ELEMENT_SIZE);
        for &v in values {
            bytes.write_i32::<LittleEndian>(v).unwrap();
        }
        bytes
    }

    #[test]
    fn test_offsets_are_one_based() {
        assert_eq!(slot_offset(3, 1, 1).unwrap(), 0);
        assert_eq!(slot_offset(3, 2, 3).unwrap(), 5 * 4);
        assert_eq!(row_offset(3, 3).unwrap(), 6 * 4);
        assert!(matches!(row_offset(3, 0), Err(MatrixIoError::RowOutOfRange { .. })));
        assert!(matches!(row_offset(3, 4), Err(MatrixIoError::RowOutOfRange { .. })));
        assert!(matches!(slot_offset(3, 1, 4), Err(MatrixIoError::SlotOutOfRange { .. })));
    }

    #[test]
    fn test_read_rows_in_any_order() {
        let bytes = encode(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let mut reader = RawMatrixReader::new(Cursor::new(bytes), 3);
        assert_eq!(reader.read_row(3).unwrap(), vec![7, 8, 9]);
        assert_eq!(reader.read_row(1).unwrap(), vec![1, 2, 3]);
        assert_eq!(reader.read_slot(2, 2).unwrap(), 5);
    }

    #[test]
    fn test_short_read_detected() {
        let bytes = encode(&[1, 2, 3, 4, 5]);
        let mut reader = RawMatrixReader::new(Cursor::new(bytes), 3);
        assert_eq!(reader.read_row(1).unwrap(), vec![1, 2, 3]);
        assert!(matches!(reader.read_row(2), Err(MatrixIoError::ShortRead { row: 2 })));
    }

    #[test]
    fn test_negative_values_survive() {
        let bytes = encode(&[-1, i32::MIN, i32::MAX, 0]);
        let mut reader = RawMatrixReader::new(Cursor::new(bytes), 2);
        assert_eq!(reader.read_row(1).unwrap(), vec![-1, i32::MIN]);
        assert_eq!(reader.read_row(2).unwrap(), vec![i32::MAX, 0]);
    }

    #[test]
    fn test_write_rows_out_of_order_and_slots() {
        let mut writer = RawMatrixWriter::new(Cursor::new(Vec::new()), 2);
        writer.write_row(2, &[3, 4]).unwrap();
        writer.write_row(1, &[1, 2]).unwrap();
        writer.write_slot(2, 1, -9).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.into_inner().into_inner(), encode(&[1, 2, -9, 4]));
    }

    #[test]
    fn test_write_row_length_checked() {
        let mut writer = RawMatrixWriter::new(Cursor::new(Vec::new()), 3);
        assert!(matches!(
            writer.write_row(1, &[1, 2]),
            Err(MatrixIoError::RowLength { row: 1, expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_matrix_bytes() {
        assert_eq!(matrix_bytes(4), 64);
    }

    #[test]
    fn test_cells_are_little_endian() {
        let mut writer = RawMatrixWriter::new(Cursor::new(Vec::new()), 1);
        writer.write_slot(1, 1, 0x0102_0304).unwrap();
        assert_eq!(writer.into_inner().into_inner(), vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_short_slot_read_detected() {
        let bytes = encode(&[1, 2, 3]);
        let mut reader = RawMatrixReader::new(Cursor::new(bytes), 2);
        assert_eq!(reader.read_slot(2, 1).unwrap(), 3);
        assert!(matches!(reader.read_slot(2, 2), Err(MatrixIoError::ShortRead { row: 2 })));
    }

    #[test]
    fn test_open_keeps_contents_until_resized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let old = encode(&[9; 9]);
        std::fs::write(&path, &old).unwrap();

        drop(RawMatrixWriter::open(&path, 2).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), old);

        let mut writer = RawMatrixWriter::open(&path, 2).unwrap();
        writer.set_matrix_len().unwrap();
        writer.write_row(1, &[1, 2]).unwrap();
        writer.write_row(2, &[3, 4]).unwrap();
        writer.flush().unwrap();
        drop(writer);
        assert_eq!(std::fs::read(&path).unwrap(), encode(&[1, 2, 3, 4]));
    }
}
