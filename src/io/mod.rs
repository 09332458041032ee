
use std::io::{self, BufReader, Read};
use std::marker::PhantomData;

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

pub const BUFFER_SIZE:usize = 2048;

/// Sample encodings found in raw capture files
pub trait SampleFormat: Copy + Sized {
	fn read_from<R: Read>(src:&mut R) -> io::Result<Self>;
}

impl SampleFormat for i8 {
	fn read_from<R: Read>(src:&mut R) -> io::Result<i8> { src.read_i8() }
}

impl SampleFormat for i16 {
	fn read_from<R: Read>(src:&mut R) -> io::Result<i16> { src.read_i16::<LittleEndian>() }
}

/// Reduces a 16-bit sample to the 8-bit range the tracking channel takes, saturating at the rails
pub fn requantize(x:i16, shift:u32) -> i8 {
	let y:i16 = x >> shift.min(15);
	y.max(i8::MIN as i16).min(i8::MAX as i16) as i8
}

/// Yields `(sample, index)` pairs from a raw capture until the data runs out.  A trailing partial
/// sample is dropped.
pub struct BufferedSource<S: Read, T: SampleFormat> {
	src: BufReader<S>,
	idx: usize,
	_format: PhantomData<T>,
}

impl<S: Read, T: SampleFormat> BufferedSource<S, T> {

	pub fn new(src:S) -> Self {
		let src = BufReader::with_capacity(BUFFER_SIZE * std::mem::size_of::<T>(), src);
		Self { src, idx: 0, _format: PhantomData }
	}

	/// Number of samples read so far
	pub fn samples_read(&self) -> usize { self.idx }

}

impl<S: Read, T: SampleFormat> Iterator for BufferedSource<S, T> {
	type Item = (T, usize);

	fn next(&mut self) -> Option<(T, usize)> {
		match T::read_from(&mut self.src) {
			Ok(x) => {
				let ans = (x, self.idx);
				self.idx += 1;
				Some(ans)
			},
			Err(e) => {
				if e.kind() != io::ErrorKind::UnexpectedEof {
					warn!("Stopped reading samples after {}: {}", self.idx, e);
				}
				None
			}
		}
	}
}

#[cfg(test)]
mod tests {

	use std::io::Cursor;

	use super::*;

	#[test]
	fn reads_signed_bytes_with_indices() {
		let bytes:Vec<u8> = vec![0x01, 0xFF, 0x80, 0x7F];
		let src:BufferedSource<_, i8> = BufferedSource::new(Cursor::new(bytes));
		let samples:Vec<(i8, usize)> = src.collect();
		assert_eq!(samples, vec![(1, 0), (-1, 1), (-128, 2), (127, 3)]);
	}

	#[test]
	fn reads_little_endian_shorts_and_drops_partial_sample() {
		let bytes:Vec<u8> = vec![0x34, 0x12, 0xFE, 0xFF, 0x00, 0x80, 0x01];
		let mut src:BufferedSource<_, i16> = BufferedSource::new(Cursor::new(bytes));
		assert_eq!(src.next(), Some((0x1234, 0)));
		assert_eq!(src.next(), Some((-2, 1)));
		assert_eq!(src.next(), Some((i16::MIN, 2)));
		assert_eq!(src.next(), None);
		assert_eq!(src.samples_read(), 3);
	}

	#[test]
	fn requantize_saturates() {
		assert_eq!(requantize(1000, 4), 62);
		assert_eq!(requantize(-1000, 4), -63);
		assert_eq!(requantize(i16::MAX, 2), 127);
		assert_eq!(requantize(i16::MIN, 0), -128);
		assert_eq!(requantize(-5, 0), -5);
	}

}
